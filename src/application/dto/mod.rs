// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod campaign_response;
pub mod create_campaign_request;
pub mod geoname_response;
pub mod place_response;
pub mod task_response;

use chrono::{DateTime, Utc};

/// 线上时间戳格式
///
/// `YYYY-MM-DDTHH:MM:SS.ffffffZ`，始终为UTC
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// 解析线上时间戳
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_format_is_utc_iso() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 5).unwrap();
        assert_eq!(format_timestamp(at), "2026-03-01T09:30:05.000000Z");
    }

    #[test]
    fn test_timestamp_round_trip() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 5).unwrap()
            + chrono::Duration::microseconds(123456);
        let parsed = parse_timestamp(&format_timestamp(at)).unwrap();
        assert_eq!(parsed, at);
    }
}
