// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 命令处理器
//!
//! 变更类操作。每条命令返回 `command_result` 信封，
//! 同一会话内命令串行执行（至多一条在途）。

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::application::dto::create_campaign_request::CreateCampaignRequest;
use crate::application::services::campaign_service::{CampaignService, ServiceError};
use crate::domain::models::ids::CampaignId;
use crate::presentation::ws::messages::command_result;

/// 分发命令
pub async fn handle(service: &Arc<CampaignService>, command: &str, data: &Value) -> Value {
    info!(command, "websocket command received");
    match command {
        "start_extraction" => start_extraction(service, data).await,
        "pause_extraction" => pause_extraction(service, data),
        "cancel_extraction" => cancel_extraction(service, data),
        other => command_result(false, Value::String(format!("Unknown command: {}", other))),
    }
}

/// 解析命令载荷为待启动的活动ID
///
/// 载荷携带 `campaign_id` 时直接使用；否则将载荷（或其 `spec` 字段）
/// 视为创建请求，机器人数量接受 `max_bots` / `num_bots` /
/// `extraction_bots` 三种键名，规范形式为 `max_bots`。
pub async fn resolve_campaign_id(
    service: &Arc<CampaignService>,
    data: &Value,
) -> Result<CampaignId, ServiceError> {
    if let Some(raw) = data.get("campaign_id").and_then(Value::as_str) {
        return raw.parse().map_err(|_| ServiceError::NotFound);
    }

    let spec = normalize_spec(data);
    let request: CreateCampaignRequest = serde_json::from_value(spec)
        .map_err(|e| ServiceError::Validation(format!("invalid extraction spec: {}", e)))?;
    request
        .validate()
        .map_err(|e| ServiceError::Validation(e.to_string()))?;

    let campaign = service.create(request).await?;
    Ok(campaign.id)
}

async fn start_extraction(service: &Arc<CampaignService>, data: &Value) -> Value {
    let campaign_id = match resolve_campaign_id(service, data).await {
        Ok(id) => id,
        Err(e) => return command_result(false, Value::String(e.to_string())),
    };

    match service.start(&campaign_id).await {
        Ok(()) => command_result(
            true,
            json!({ "campaign_id": campaign_id.to_string(), "status": "started" }),
        ),
        Err(e) => command_result(false, Value::String(e.to_string())),
    }
}

fn pause_extraction(service: &Arc<CampaignService>, data: &Value) -> Value {
    match campaign_id_of(data) {
        Some(campaign_id) => match service.pause(&campaign_id) {
            Ok(()) => command_result(
                true,
                json!({ "campaign_id": campaign_id.to_string(), "status": "paused" }),
            ),
            Err(e) => command_result(false, Value::String(e.to_string())),
        },
        None => command_result(false, Value::String("campaign_id is required".to_string())),
    }
}

fn cancel_extraction(service: &Arc<CampaignService>, data: &Value) -> Value {
    match campaign_id_of(data) {
        Some(campaign_id) => match service.cancel(&campaign_id) {
            Ok(()) => command_result(
                true,
                json!({ "campaign_id": campaign_id.to_string(), "status": "cancelled" }),
            ),
            Err(e) => command_result(false, Value::String(e.to_string())),
        },
        None => command_result(false, Value::String("campaign_id is required".to_string())),
    }
}

fn campaign_id_of(data: &Value) -> Option<CampaignId> {
    data.get("campaign_id")
        .or_else(|| data.get("id"))
        .and_then(Value::as_str)
        .and_then(|raw| raw.parse().ok())
}

fn normalize_spec(data: &Value) -> Value {
    let mut spec = data.get("spec").cloned().unwrap_or_else(|| data.clone());
    if let Some(obj) = spec.as_object_mut() {
        if !obj.contains_key("max_bots") {
            for key in ["num_bots", "extraction_bots"] {
                let aliased = data.get(key).cloned().or_else(|| obj.get(key).cloned());
                if let Some(value) = aliased {
                    obj.insert("max_bots".to_string(), value);
                    break;
                }
            }
        }
        obj.remove("num_bots");
        obj.remove("extraction_bots");
    }
    spec
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_spec_accepts_bot_count_aliases() {
        for key in ["max_bots", "num_bots", "extraction_bots"] {
            let data = json!({ key: 4, "activity": "restaurants" });
            let spec = normalize_spec(&data);
            assert_eq!(spec["max_bots"], 4, "alias {} must normalize", key);
        }
    }

    #[test]
    fn test_normalize_spec_prefers_canonical_key() {
        let data = json!({ "max_bots": 2, "num_bots": 9 });
        let spec = normalize_spec(&data);
        assert_eq!(spec["max_bots"], 2);
        assert!(spec.get("num_bots").is_none());
    }

    #[test]
    fn test_normalize_spec_unwraps_nested_spec() {
        let data = json!({ "spec": { "activity": "cafes", "country_code": "ES" }, "num_bots": 3 });
        let spec = normalize_spec(&data);
        assert_eq!(spec["activity"], "cafes");
        assert_eq!(spec["max_bots"], 3);
    }
}
