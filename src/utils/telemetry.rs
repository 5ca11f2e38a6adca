// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::LoggingSettings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 初始化遥测系统
///
/// 根据配置选择文本或JSON日志格式，日志级别来自配置，
/// RUST_LOG 环境变量优先
pub fn init_telemetry(settings: &LoggingSettings) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{},extractrs=debug", settings.level).into());

    let registry = tracing_subscriber::registry().with(filter);

    if settings.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
