// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::bus::EventBus;
use crate::domain::events::DomainEvent;
use crate::domain::models::ids::{BotId, CampaignId};
use crate::engines::traits::{BrowserDriver, DriverFactory};
use crate::utils::retry_policy::RetryPolicy;

/// 池错误类型
#[derive(Error, Debug)]
pub enum PoolError {
    /// 池初始化失败（重试预算耗尽）
    #[error("Bot pool initialization failed: {0}")]
    InitFailed(String),
    /// 会话替换失败（重试预算耗尽）
    #[error("Bot pool replacement failed: {0}")]
    ReplaceFailed(String),
    /// 池已排空
    #[error("Bot pool is drained")]
    Drained,
    /// 获取被取消
    #[error("Bot pool acquire cancelled")]
    Cancelled,
}

/// 机器人状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotState {
    /// 初始化中
    Initializing,
    /// 空闲就绪
    Ready,
    /// 处理任务中
    Processing,
    /// 错误
    Error,
    /// 已关闭
    Closed,
}

impl fmt::Display for BotState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BotState::Initializing => write!(f, "initializing"),
            BotState::Ready => write!(f, "ready"),
            BotState::Processing => write!(f, "processing"),
            BotState::Error => write!(f, "error"),
            BotState::Closed => write!(f, "closed"),
        }
    }
}

/// 机器人会话
///
/// 一个驱动支撑的无头浏览器上下文
pub struct BotSession {
    /// 机器人标识符
    pub id: BotId,
    /// 浏览器驱动
    pub driver: Box<dyn BrowserDriver>,
}

/// 机器人池
///
/// 固定容量的驱动会话集合。所有驱动访问都经由池分配，
/// 任何组件不得绕过池直接调用驱动。
///
/// 不变量：free + in_use = total；total 等于配置容量，
/// 仅在替换期间瞬时偏离。
pub struct BotPool {
    factory: Arc<dyn DriverFactory>,
    bus: Arc<EventBus>,
    campaign_id: CampaignId,
    size: usize,
    free: Mutex<VecDeque<BotSession>>,
    notify: Notify,
    states: Mutex<HashMap<BotId, BotState>>,
    drained: AtomicBool,
    retry_policy: RetryPolicy,
}

impl BotPool {
    /// 创建新的机器人池
    ///
    /// # 参数
    ///
    /// * `factory` - 驱动工厂
    /// * `bus` - 事件总线
    /// * `campaign_id` - 所属活动
    /// * `size` - 池容量
    /// * `open_retries` - 会话打开重试预算
    pub fn new(
        factory: Arc<dyn DriverFactory>,
        bus: Arc<EventBus>,
        campaign_id: CampaignId,
        size: usize,
        open_retries: u32,
    ) -> Self {
        Self {
            factory,
            bus,
            campaign_id,
            size,
            free: Mutex::new(VecDeque::with_capacity(size)),
            notify: Notify::new(),
            states: Mutex::new(HashMap::new()),
            drained: AtomicBool::new(false),
            retry_policy: RetryPolicy::session_open(open_retries),
        }
    }

    /// 并行初始化全部会话
    ///
    /// 每个会话的启动带有随机错峰延迟。任一会话在重试预算内
    /// 无法打开时，整个初始化失败，已打开的会话被关闭，
    /// 不开始任何工作。
    pub async fn initialize(&self) -> Result<(), PoolError> {
        let launches = (0..self.size).map(|slot| async move {
            // 错峰启动
            if slot > 0 {
                let stagger = rand::random_range(500..1500) as u64 * slot as u64;
                tokio::time::sleep(Duration::from_millis(stagger)).await;
            }
            self.open_session().await
        });

        let opened = futures::future::join_all(launches).await;

        let mut failure = None;
        for result in opened {
            match result {
                Ok(session) => {
                    self.set_state(&session.id, BotState::Ready);
                    self.free.lock().expect("pool free list poisoned").push_back(session);
                }
                Err(e) => failure = Some(e),
            }
        }

        if let Some(e) = failure {
            warn!(campaign_id = %self.campaign_id, error = %e, "pool initialization failed, draining");
            self.drain().await;
            return Err(PoolError::InitFailed(e.to_string()));
        }

        info!(campaign_id = %self.campaign_id, size = self.size, "bot pool initialized");
        Ok(())
    }

    /// 获取一个就绪会话
    ///
    /// 没有空闲会话时挂起调用者；等待者按FIFO顺序被满足。
    /// 取消信号使等待提前返回。
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<BotSession, PoolError> {
        loop {
            if self.drained.load(Ordering::SeqCst) {
                return Err(PoolError::Drained);
            }
            if cancel.is_cancelled() {
                return Err(PoolError::Cancelled);
            }

            if let Some(session) = self.free.lock().expect("pool free list poisoned").pop_front() {
                self.set_state(&session.id, BotState::Processing);
                return Ok(session);
            }

            tokio::select! {
                _ = self.notify.notified() => {}
                _ = cancel.cancelled() => return Err(PoolError::Cancelled),
            }
        }
    }

    /// 归还会话并唤醒一个等待者
    ///
    /// 池已排空时直接关闭会话
    pub async fn release(&self, session: BotSession) {
        if self.drained.load(Ordering::SeqCst) {
            self.close_session(session).await;
            return;
        }

        self.set_state(&session.id, BotState::Ready);
        self.free
            .lock()
            .expect("pool free list poisoned")
            .push_back(session);
        self.notify.notify_one();
    }

    /// 替换崩溃的会话
    ///
    /// 销毁死亡会话并在原位创建新会话，保持池容量。
    /// 新会话以使用中状态返回给调用者。
    pub async fn replace(&self, session: BotSession) -> Result<BotSession, PoolError> {
        warn!(bot_id = %session.id, "replacing crashed session");
        self.set_state(&session.id, BotState::Error);
        self.close_session(session).await;

        match self.open_session().await {
            Ok(replacement) => {
                self.set_state(&replacement.id, BotState::Processing);
                Ok(replacement)
            }
            Err(e) => {
                self.drain().await;
                Err(PoolError::ReplaceFailed(e.to_string()))
            }
        }
    }

    /// 排空池
    ///
    /// 关闭全部空闲会话并唤醒所有等待者；幂等
    pub async fn drain(&self) {
        if self.drained.swap(true, Ordering::SeqCst) {
            return;
        }

        loop {
            let session = self.free.lock().expect("pool free list poisoned").pop_front();
            match session {
                Some(session) => self.close_session(session).await,
                None => break,
            }
        }

        self.notify.notify_waiters();
        info!(campaign_id = %self.campaign_id, "bot pool drained");
    }

    /// 池容量
    pub fn size(&self) -> usize {
        self.size
    }

    /// 空闲会话数
    pub fn free_count(&self) -> usize {
        self.free.lock().expect("pool free list poisoned").len()
    }

    /// 池是否已排空
    pub fn is_drained(&self) -> bool {
        self.drained.load(Ordering::SeqCst)
    }

    /// 全部机器人的当前状态
    pub fn bot_states(&self) -> Vec<(BotId, BotState)> {
        self.states
            .lock()
            .expect("pool state table poisoned")
            .iter()
            .map(|(id, state)| (id.clone(), *state))
            .collect()
    }

    async fn open_session(&self) -> Result<BotSession, PoolError> {
        let bot_id = BotId::new();
        self.set_state(&bot_id, BotState::Initializing);

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.factory.open().await {
                Ok(driver) => {
                    self.bus
                        .publish(DomainEvent::BotInitialized {
                            campaign_id: self.campaign_id.clone(),
                            bot_id: bot_id.clone(),
                            occurred_at: Utc::now(),
                        })
                        .await;
                    return Ok(BotSession {
                        id: bot_id,
                        driver,
                    });
                }
                Err(e) if self.retry_policy.should_retry(attempt) => {
                    let backoff = self.retry_policy.calculate_backoff(attempt);
                    warn!(
                        bot_id = %bot_id,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "session open failed, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    self.set_state(&bot_id, BotState::Error);
                    self.bus
                        .publish(DomainEvent::BotError {
                            campaign_id: self.campaign_id.clone(),
                            bot_id: bot_id.clone(),
                            error: e.to_string(),
                            occurred_at: Utc::now(),
                        })
                        .await;
                    return Err(PoolError::InitFailed(e.to_string()));
                }
            }
        }
    }

    async fn close_session(&self, session: BotSession) {
        if let Err(e) = session.driver.close().await {
            warn!(bot_id = %session.id, error = %e, "session close failed");
        }
        self.set_state(&session.id, BotState::Closed);
        self.bus
            .publish(DomainEvent::BotClosed {
                campaign_id: self.campaign_id.clone(),
                bot_id: session.id.clone(),
                occurred_at: Utc::now(),
            })
            .await;
    }

    fn set_state(&self, bot_id: &BotId, state: BotState) {
        self.states
            .lock()
            .expect("pool state table poisoned")
            .insert(bot_id.clone(), state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::EventKind;
    use crate::engines::mock::MockDriverFactory;

    fn pool_with(factory: MockDriverFactory, size: usize, retries: u32) -> (Arc<BotPool>, Arc<EventBus>) {
        let bus = Arc::new(EventBus::new());
        let pool = Arc::new(BotPool::new(
            Arc::new(factory),
            bus.clone(),
            CampaignId::new(),
            size,
            retries,
        ));
        (pool, bus)
    }

    fn count_events(bus: &Arc<EventBus>, kind: EventKind) -> Arc<std::sync::Mutex<u32>> {
        let counter = Arc::new(std::sync::Mutex::new(0u32));
        let seen = counter.clone();
        bus.subscribe(
            kind,
            Arc::new(move |_event| {
                let seen = seen.clone();
                Box::pin(async move {
                    *seen.lock().unwrap() += 1;
                    Ok(())
                })
            }),
        );
        counter
    }

    #[tokio::test]
    async fn test_initialize_fills_free_set_and_emits_events() {
        let (pool, bus) = pool_with(MockDriverFactory::new(), 2, 3);
        let initialized = count_events(&bus, EventKind::BotInitialized);

        pool.initialize().await.unwrap();

        assert_eq!(pool.free_count(), 2);
        assert_eq!(*initialized.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_acquire_release_preserves_size_invariant() {
        let (pool, _bus) = pool_with(MockDriverFactory::new(), 2, 3);
        pool.initialize().await.unwrap();
        let cancel = CancellationToken::new();

        let first = pool.acquire(&cancel).await.unwrap();
        let second = pool.acquire(&cancel).await.unwrap();
        assert_eq!(pool.free_count(), 0);

        pool.release(first).await;
        assert_eq!(pool.free_count(), 1);
        pool.release(second).await;
        assert_eq!(pool.free_count(), 2);
    }

    #[tokio::test]
    async fn test_acquire_suspends_until_release() {
        let (pool, _bus) = pool_with(MockDriverFactory::new(), 1, 3);
        pool.initialize().await.unwrap();
        let cancel = CancellationToken::new();

        let session = pool.acquire(&cancel).await.unwrap();

        let waiter = {
            let pool = pool.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { pool.acquire(&cancel).await })
        };
        // 等待者应挂起
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        pool.release(session).await;
        let acquired = waiter.await.unwrap().unwrap();
        pool.release(acquired).await;
    }

    #[tokio::test]
    async fn test_acquire_observes_cancellation() {
        let (pool, _bus) = pool_with(MockDriverFactory::new(), 1, 3);
        pool.initialize().await.unwrap();
        let cancel = CancellationToken::new();

        let _held = pool.acquire(&cancel).await.unwrap();

        let waiter = {
            let pool = pool.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { pool.acquire(&cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        assert!(matches!(waiter.await.unwrap(), Err(PoolError::Cancelled)));
    }

    #[tokio::test]
    async fn test_initialize_retries_within_budget() {
        let factory = MockDriverFactory::new().with_failing_opens(2);
        let (pool, _bus) = pool_with(factory, 1, 3);

        pool.initialize().await.unwrap();
        assert_eq!(pool.free_count(), 1);
    }

    #[tokio::test]
    async fn test_initialize_exhaustion_is_fatal() {
        let factory = MockDriverFactory::new().with_failing_opens(10);
        let (pool, _bus) = pool_with(factory, 1, 2);

        let result = pool.initialize().await;
        assert!(matches!(result, Err(PoolError::InitFailed(_))));
        assert!(pool.is_drained());
    }

    #[tokio::test]
    async fn test_drain_is_idempotent_and_closes_sessions() {
        let (pool, bus) = pool_with(MockDriverFactory::new(), 2, 3);
        let closed = count_events(&bus, EventKind::BotClosed);
        pool.initialize().await.unwrap();

        pool.drain().await;
        pool.drain().await;

        assert_eq!(pool.free_count(), 0);
        assert_eq!(*closed.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_release_after_drain_closes_session() {
        let (pool, bus) = pool_with(MockDriverFactory::new(), 1, 3);
        let closed = count_events(&bus, EventKind::BotClosed);
        pool.initialize().await.unwrap();
        let cancel = CancellationToken::new();

        let session = pool.acquire(&cancel).await.unwrap();
        pool.drain().await;
        pool.release(session).await;

        assert_eq!(pool.free_count(), 0);
        assert_eq!(*closed.lock().unwrap(), 1);
    }
}
