// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 脚本化的驱动模拟实现
//!
//! 测试与本地开发使用。按导航URL中出现的城市名选择脚本化行为，
//! 不触碰真实浏览器。

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::engines::traits::{
    BrowserDriver, DriverError, DriverFactory, PlaceRecord, ReviewRecord,
};

/// 模拟行为脚本
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// 成功并返回指定数量的地点
    Success { places: u32 },
    /// 前N次尝试瞬态失败，之后成功
    TransientThenSuccess { failures: u32, places: u32 },
    /// 永久失败
    Permanent,
    /// 会话崩溃（瞬态错误且会话死亡），替换后成功
    CrashThenSuccess { places: u32 },
    /// 每次都崩溃
    CrashAlways,
}

#[derive(Default)]
struct MockState {
    /// 每个城市已观察到的尝试次数
    attempts: HashMap<String, u32>,
}

/// 模拟驱动工厂
pub struct MockDriverFactory {
    behaviors: HashMap<String, MockBehavior>,
    default_behavior: MockBehavior,
    /// 前N次 `open` 调用失败
    failing_opens: AtomicU32,
    opened: AtomicU32,
    /// 剩余允许成功的 `open` 次数
    open_successes_left: AtomicU32,
    /// 每次解析前附加的人工延迟
    latency: Duration,
    state: Arc<Mutex<MockState>>,
}

impl MockDriverFactory {
    /// 创建默认成功的工厂
    pub fn new() -> Self {
        Self {
            behaviors: HashMap::new(),
            default_behavior: MockBehavior::Success { places: 10 },
            failing_opens: AtomicU32::new(0),
            opened: AtomicU32::new(0),
            open_successes_left: AtomicU32::new(u32::MAX),
            latency: Duration::ZERO,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// 设置默认行为
    pub fn with_default(mut self, behavior: MockBehavior) -> Self {
        self.default_behavior = behavior;
        self
    }

    /// 为包含指定城市名的URL设置行为
    pub fn with_behavior(mut self, city: &str, behavior: MockBehavior) -> Self {
        self.behaviors.insert(city.to_string(), behavior);
        self
    }

    /// 令前N次会话打开失败
    pub fn with_failing_opens(self, failures: u32) -> Self {
        self.failing_opens.store(failures, Ordering::SeqCst);
        self
    }

    /// 为每次解析附加人工延迟
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// 限制会话打开的成功次数
    ///
    /// 超出配额后的每次 `open` 都以瞬态错误失败，
    /// 用于演练替换路径的打开失败
    pub fn limit_successful_opens(&self, successes: u32) {
        self.open_successes_left.store(successes, Ordering::SeqCst);
    }

    /// 已成功打开的会话数
    pub fn opened_sessions(&self) -> u32 {
        self.opened.load(Ordering::SeqCst)
    }
}

impl Default for MockDriverFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DriverFactory for MockDriverFactory {
    async fn open(&self) -> Result<Box<dyn BrowserDriver>, DriverError> {
        let remaining = self.failing_opens.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_opens.store(remaining - 1, Ordering::SeqCst);
            return Err(DriverError::Transient("scripted open failure".to_string()));
        }

        let successes = self.open_successes_left.load(Ordering::SeqCst);
        if successes == 0 {
            return Err(DriverError::Transient("scripted open exhaustion".to_string()));
        }
        if successes != u32::MAX {
            self.open_successes_left.store(successes - 1, Ordering::SeqCst);
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockDriver {
            behaviors: self.behaviors.clone(),
            default_behavior: self.default_behavior.clone(),
            state: self.state.clone(),
            latency: self.latency,
            current_url: Mutex::new(None),
            alive: AtomicBool::new(true),
        }))
    }
}

/// 模拟浏览器驱动
pub struct MockDriver {
    behaviors: HashMap<String, MockBehavior>,
    default_behavior: MockBehavior,
    state: Arc<Mutex<MockState>>,
    latency: Duration,
    current_url: Mutex<Option<String>>,
    alive: AtomicBool,
}

impl MockDriver {
    fn city_of(url: &str) -> String {
        // URL形如 https://.../maps/search/restaurants+in+Madrid?hl=es
        let path = url.split('?').next().unwrap_or(url);
        path.rsplit('+').next().unwrap_or("unknown").to_string()
    }

    fn behavior_for(&self, city: &str) -> MockBehavior {
        self.behaviors
            .get(city)
            .cloned()
            .unwrap_or_else(|| self.default_behavior.clone())
    }

    fn scripted_outcome(&self) -> Result<u32, DriverError> {
        let url = self
            .current_url
            .lock()
            .expect("mock url poisoned")
            .clone()
            .ok_or_else(|| DriverError::Permanent("no page loaded".to_string()))?;
        let city = Self::city_of(&url);

        let attempt = {
            let mut state = self.state.lock().expect("mock state poisoned");
            let counter = state.attempts.entry(city.clone()).or_insert(0);
            *counter += 1;
            *counter
        };

        match self.behavior_for(&city) {
            MockBehavior::Success { places } => Ok(places),
            MockBehavior::TransientThenSuccess { failures, places } => {
                if attempt <= failures {
                    Err(DriverError::Transient(format!(
                        "scripted transient failure ({}/{})",
                        attempt, failures
                    )))
                } else {
                    Ok(places)
                }
            }
            MockBehavior::Permanent => Err(DriverError::Permanent(
                "scripted permanent failure".to_string(),
            )),
            MockBehavior::CrashThenSuccess { places } => {
                if attempt == 1 {
                    self.alive.store(false, Ordering::SeqCst);
                    Err(DriverError::Transient("scripted session crash".to_string()))
                } else {
                    Ok(places)
                }
            }
            MockBehavior::CrashAlways => {
                self.alive.store(false, Ordering::SeqCst);
                Err(DriverError::Transient("scripted session crash".to_string()))
            }
        }
    }

    fn place(city: &str, index: u32) -> PlaceRecord {
        PlaceRecord {
            name: format!("Place {} {}", index, city),
            address: format!("{} Example Street {}", index, city),
            city: Some(city.to_string()),
            category: Some("restaurant".to_string()),
            rating: Some(3.5 + (index % 3) as f64 * 0.5),
            review_count: Some(10 + index as i32),
            phone: Some(format!("+34 600 000 {:03}", index)),
            website: Some(format!("https://place-{}.example.com", index)),
            latitude: Some(40.0 + index as f64 * 0.001),
            longitude: Some(-3.7 - index as f64 * 0.001),
            reviews: vec![ReviewRecord {
                author: format!("Reviewer {}", index),
                rating: Some(4.0),
                text: Some("Solid choice".to_string()),
                posted_at: None,
            }],
        }
    }
}

#[async_trait]
impl BrowserDriver for MockDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(DriverError::Transient("session is dead".to_string()));
        }
        *self.current_url.lock().expect("mock url poisoned") = Some(url.to_string());
        Ok(())
    }

    async fn wait_for(&self, _selector: &str, _timeout: Duration) -> Result<(), DriverError> {
        Ok(())
    }

    async fn fill_query(&self, _text: &str) -> Result<(), DriverError> {
        Ok(())
    }

    async fn scroll_result_list(&self, max_scrolls: u32) -> Result<u32, DriverError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(DriverError::Transient("session is dead".to_string()));
        }
        Ok(max_scrolls)
    }

    async fn parse_results(&self, max_results: u32) -> Result<Vec<PlaceRecord>, DriverError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(DriverError::Transient("session is dead".to_string()));
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let places = self.scripted_outcome()?;
        let url = self.current_url.lock().expect("mock url poisoned").clone();
        let city = url.as_deref().map(Self::city_of).unwrap_or_default();

        Ok((1..=places.min(max_results))
            .map(|i| Self::place(&city, i))
            .collect())
    }

    async fn capture_image(&self) -> Result<Vec<u8>, DriverError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(DriverError::Transient("session is dead".to_string()));
        }
        // 最小PNG头，足以在线上被识别为图像数据
        Ok(vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A])
    }

    async fn current_url(&self) -> Option<String> {
        self.current_url.lock().expect("mock url poisoned").clone()
    }

    async fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.alive.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_transient_then_success_script() {
        let factory = MockDriverFactory::new()
            .with_behavior("Madrid", MockBehavior::TransientThenSuccess { failures: 1, places: 3 });

        let driver = factory.open().await.unwrap();
        driver
            .navigate("https://www.google.com/maps/search/restaurants+in+Madrid")
            .await
            .unwrap();

        let first = driver.parse_results(10).await;
        assert!(matches!(first, Err(DriverError::Transient(_))));

        let second = driver.parse_results(10).await.unwrap();
        assert_eq!(second.len(), 3);
    }

    #[tokio::test]
    async fn test_crash_marks_session_dead() {
        let factory =
            MockDriverFactory::new().with_behavior("Madrid", MockBehavior::CrashAlways);

        let driver = factory.open().await.unwrap();
        driver
            .navigate("https://www.google.com/maps/search/restaurants+in+Madrid")
            .await
            .unwrap();

        let result = driver.parse_results(10).await;
        assert!(matches!(result, Err(DriverError::Transient(_))));
        assert!(!driver.is_alive().await);
    }

    #[tokio::test]
    async fn test_failing_opens_budget() {
        let factory = MockDriverFactory::new().with_failing_opens(2);

        assert!(factory.open().await.is_err());
        assert!(factory.open().await.is_err());
        assert!(factory.open().await.is_ok());
        assert_eq!(factory.opened_sessions(), 1);
    }

    #[tokio::test]
    async fn test_parse_respects_max_results() {
        let factory = MockDriverFactory::new().with_default(MockBehavior::Success { places: 50 });
        let driver = factory.open().await.unwrap();
        driver
            .navigate("https://www.google.com/maps/search/cafes+in+Valencia")
            .await
            .unwrap();

        let records = driver.parse_results(5).await.unwrap();
        assert_eq!(records.len(), 5);
        assert!(records[0].name.contains("Valencia"));
    }
}
