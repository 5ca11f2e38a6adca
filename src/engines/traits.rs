// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// 驱动错误类型
///
/// 失败分类是驱动实现的职责：网络和超时归为瞬态，
/// 选择器缺失或页面无法识别归为永久
#[derive(Error, Debug, Clone)]
pub enum DriverError {
    /// 瞬态失败（网络、超时），可重试
    #[error("Transient driver failure: {0}")]
    Transient(String),
    /// 永久失败（选择器缺失、页面无法识别）
    #[error("Permanent driver failure: {0}")]
    Permanent(String),
    /// 操作被取消
    #[error("Driver operation cancelled")]
    Cancelled,
}

impl DriverError {
    /// 判断错误是否可重试
    pub fn is_transient(&self) -> bool {
        matches!(self, DriverError::Transient(_))
    }
}

/// 浏览器驱动配置
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// 是否无头模式
    pub headless: bool,
    /// 区域设置
    pub locale: String,
    /// 页面导航超时
    pub navigate_timeout: Duration,
    /// 元素等待超时
    pub wait_timeout: Duration,
    /// 列表滚动超时
    pub scroll_timeout: Duration,
    /// 结果解析超时
    pub parse_timeout: Duration,
    /// 截图超时
    pub capture_timeout: Duration,
    /// 会话打开超时
    pub open_timeout: Duration,
    /// 会话关闭超时
    pub close_timeout: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            headless: true,
            locale: "en-US".to_string(),
            navigate_timeout: Duration::from_secs(30),
            wait_timeout: Duration::from_secs(20),
            scroll_timeout: Duration::from_secs(15),
            parse_timeout: Duration::from_secs(10),
            capture_timeout: Duration::from_secs(5),
            open_timeout: Duration::from_secs(45),
            close_timeout: Duration::from_secs(10),
        }
    }
}

/// 驱动解析出的地点记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceRecord {
    /// 名称
    pub name: String,
    /// 地址
    pub address: String,
    /// 城市
    pub city: Option<String>,
    /// 类别
    pub category: Option<String>,
    /// 评分
    pub rating: Option<f64>,
    /// 评论数量
    pub review_count: Option<i32>,
    /// 电话
    pub phone: Option<String>,
    /// 网站
    pub website: Option<String>,
    /// 纬度
    pub latitude: Option<f64>,
    /// 经度
    pub longitude: Option<f64>,
    /// 评论
    #[serde(default)]
    pub reviews: Vec<ReviewRecord>,
}

/// 驱动解析出的评论记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    /// 作者
    pub author: String,
    /// 评分
    pub rating: Option<f64>,
    /// 评论内容
    pub text: Option<String>,
    /// 发布时间
    pub posted_at: Option<DateTime<Utc>>,
}

/// 浏览器驱动特质
///
/// 对"一个无头浏览器上下文"的抽象。实现不得向外暴露
/// 驱动特有的状态。
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// 导航到指定URL
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    /// 等待选择器出现
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), DriverError>;

    /// 填充搜索输入框
    async fn fill_query(&self, text: &str) -> Result<(), DriverError>;

    /// 滚动结果列表
    ///
    /// # 返回值
    ///
    /// 返回实际执行的滚动次数
    async fn scroll_result_list(&self, max_scrolls: u32) -> Result<u32, DriverError>;

    /// 解析结果列表
    async fn parse_results(&self, max_results: u32) -> Result<Vec<PlaceRecord>, DriverError>;

    /// 捕获当前页面截图 (PNG)
    async fn capture_image(&self) -> Result<Vec<u8>, DriverError>;

    /// 当前页面URL
    async fn current_url(&self) -> Option<String>;

    /// 会话健康探测
    ///
    /// 返回false表示会话已死亡，需要由池替换
    async fn is_alive(&self) -> bool;

    /// 关闭会话
    async fn close(&self) -> Result<(), DriverError>;
}

/// 驱动工厂特质
#[async_trait]
pub trait DriverFactory: Send + Sync {
    /// 打开新的浏览器会话
    async fn open(&self) -> Result<Box<dyn BrowserDriver>, DriverError>;
}
