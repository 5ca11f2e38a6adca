// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// 应用程序配置设置
///
/// 包含数据库、服务器、日志、地名服务、提取引擎和浏览器驱动等所有配置项
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 数据库配置
    pub database: DatabaseSettings,
    /// 服务器配置
    pub server: ServerSettings,
    /// 日志配置
    pub logging: LoggingSettings,
    /// 地名服务配置
    pub geonames: GeonamesSettings,
    /// 提取配置
    pub extraction: ExtractionSettings,
    /// 浏览器驱动配置
    pub driver: DriverSettings,
}

/// 数据库配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// 数据库连接URL
    pub url: String,
    /// 最大连接数
    pub max_connections: Option<u32>,
    /// 最小连接数
    pub min_connections: Option<u32>,
    /// 连接超时时间（秒）
    pub connect_timeout: Option<u64>,
    /// 空闲连接超时时间（秒）
    pub idle_timeout: Option<u64>,
    /// 连接最大生命周期（秒）
    pub max_lifetime: Option<u64>,
    /// 是否记录SQL日志
    pub sqlx_logging: bool,
}

/// 服务器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// 服务器监听主机地址
    pub host: String,
    /// 服务器监听端口
    pub port: u16,
}

/// 日志配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// 日志级别 (trace, debug, info, warn, error)
    pub level: String,
    /// 日志格式 (text, json)
    pub format: String,
}

/// 地名服务配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct GeonamesSettings {
    /// 地名微服务基础URL
    pub base_url: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
    /// 缓存有效期（秒）
    pub cache_ttl_secs: u64,
}

/// 提取配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionSettings {
    /// 默认机器人数量
    pub max_bots_default: u32,
    /// 快照推送间隔（毫秒）
    pub snapshot_interval_ms: u64,
    /// 单任务重试预算
    pub task_retry_budget: u32,
    /// 会话打开重试次数
    pub pool_open_retries: u32,
    /// 取消后的宽限窗口（秒）
    pub grace_period_secs: u64,
    /// 每个会话的出站消息缓冲大小
    pub outbound_buffer: usize,
}

/// 浏览器驱动配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct DriverSettings {
    /// 是否无头模式
    pub headless: bool,
    /// 浏览器区域设置
    pub locale: String,
    /// 页面导航超时（秒）
    pub navigate_timeout_secs: u64,
    /// 元素等待超时（秒）
    pub wait_timeout_secs: u64,
    /// 列表滚动超时（秒）
    pub scroll_timeout_secs: u64,
    /// 结果解析超时（秒）
    pub parse_timeout_secs: u64,
    /// 截图超时（秒）
    pub capture_timeout_secs: u64,
    /// 会话打开超时（秒）
    pub open_timeout_secs: u64,
    /// 会话关闭超时（秒）
    pub close_timeout_secs: u64,
}

impl ExtractionSettings {
    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_millis(self.snapshot_interval_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 从配置文件和环境变量加载配置，支持默认值。
    /// 部署环境使用的扁平变量（DATABASE_URL、SERVER_PORT 等）
    /// 覆盖对应的嵌套配置项。
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let mut builder = Config::builder()
            // Server defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            // Database pool defaults
            .set_default("database.url", "sqlite://extraction.db?mode=rwc")?
            .set_default("database.max_connections", 50)?
            .set_default("database.min_connections", 5)?
            .set_default("database.connect_timeout", 10)?
            .set_default("database.idle_timeout", 300)?
            .set_default("database.max_lifetime", 3600)?
            .set_default("database.sqlx_logging", false)?
            // Logging defaults
            .set_default("logging.level", "info")?
            .set_default("logging.format", "text")?
            // Geonames defaults
            .set_default("geonames.base_url", "http://localhost:8080")?
            .set_default("geonames.timeout_secs", 30)?
            .set_default("geonames.cache_ttl_secs", 3600)?
            // Extraction defaults
            .set_default("extraction.max_bots_default", 3)?
            .set_default("extraction.snapshot_interval_ms", 1000)?
            .set_default("extraction.task_retry_budget", 2)?
            .set_default("extraction.pool_open_retries", 3)?
            .set_default("extraction.grace_period_secs", 10)?
            .set_default("extraction.outbound_buffer", 64)?
            // Driver defaults
            .set_default("driver.headless", true)?
            .set_default("driver.locale", "en-US")?
            .set_default("driver.navigate_timeout_secs", 30)?
            .set_default("driver.wait_timeout_secs", 20)?
            .set_default("driver.scroll_timeout_secs", 15)?
            .set_default("driver.parse_timeout_secs", 10)?
            .set_default("driver.capture_timeout_secs", 5)?
            .set_default("driver.open_timeout_secs", 45)?
            .set_default("driver.close_timeout_secs", 10)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("EXTRACTRS").separator("__"));

        // 部署环境识别的扁平变量
        for (var, key) in [
            ("DATABASE_URL", "database.url"),
            ("LOG_LEVEL", "logging.level"),
            ("LOG_FORMAT", "logging.format"),
            ("SERVER_HOST", "server.host"),
            ("SERVER_PORT", "server.port"),
            ("GEONAMES_BASE_URL", "geonames.base_url"),
            ("MAX_BOTS_DEFAULT", "extraction.max_bots_default"),
            ("SNAPSHOT_INTERVAL_MS", "extraction.snapshot_interval_ms"),
            ("DRIVER_HEADLESS", "driver.headless"),
        ] {
            builder = builder.set_override_option(key, std::env::var(var).ok())?;
        }

        builder.build()?.try_deserialize()
    }
}
