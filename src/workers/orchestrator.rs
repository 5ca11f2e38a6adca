// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::Utc;
use sea_orm::DatabaseConnection;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::bus::EventBus;
use crate::config::settings::Settings;
use crate::domain::events::DomainEvent;
use crate::domain::models::campaign::Campaign;
use crate::domain::models::ids::{BotId, CampaignId, TaskId};
use crate::domain::models::place::ExtractedPlace;
use crate::domain::models::task::{PlaceExtractionTask, TaskStatus};
use crate::engines::traits::{BrowserDriver, DriverError, DriverFactory, PlaceRecord};
use crate::infrastructure::persistence::uow::UnitOfWork;
use crate::infrastructure::repositories::RepositoryError;
use crate::queue::task_queue::TaskQueue;
use crate::workers::bot_pool::{BotPool, BotSession, PoolError};

/// 结果列表容器选择器
const RESULT_FEED_SELECTOR: &str = "div[role='feed']";
/// 一次滚动大致带来的结果条数
const RESULTS_PER_SCROLL: u32 = 7;

/// 编排器错误类型
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// 存储错误（致命）
    #[error("Storage failure: {0}")]
    Repository(#[from] RepositoryError),
    /// 池错误（致命）
    #[error("Pool failure: {0}")]
    Pool(#[from] PoolError),
    /// 活动不存在
    #[error("Campaign {0} not found")]
    CampaignNotFound(CampaignId),
    /// 活动状态不允许执行
    #[error("Campaign {0} is not runnable: {1}")]
    IllegalState(CampaignId, String),
}

/// 提取编排器
///
/// 协调核心：将队列中的任务分发给池中的机器人会话，
/// 驱动提取流水线，并在工作单元内持久化任务与地点状态。
/// 每个实例对应一次活动执行。
pub struct ExtractionOrchestrator {
    db: Arc<DatabaseConnection>,
    bus: Arc<EventBus>,
    factory: Arc<dyn DriverFactory>,
    settings: Arc<Settings>,
    campaign_id: CampaignId,
    cancel: CancellationToken,
    queue: Arc<TaskQueue>,
    pool: OnceCell<Arc<BotPool>>,
    started_at: chrono::DateTime<Utc>,
}

impl ExtractionOrchestrator {
    /// 创建新的编排器
    pub fn new(
        db: Arc<DatabaseConnection>,
        bus: Arc<EventBus>,
        factory: Arc<dyn DriverFactory>,
        settings: Arc<Settings>,
        campaign_id: CampaignId,
    ) -> Arc<Self> {
        Arc::new(Self {
            db,
            bus,
            factory,
            settings,
            campaign_id,
            cancel: CancellationToken::new(),
            queue: Arc::new(TaskQueue::new()),
            pool: OnceCell::new(),
            started_at: Utc::now(),
        })
    }

    /// 本次执行的取消令牌
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// 所属活动
    pub fn campaign_id(&self) -> &CampaignId {
        &self.campaign_id
    }

    /// 执行开始时间
    pub fn started_at(&self) -> chrono::DateTime<Utc> {
        self.started_at
    }

    /// 本次执行的机器人池（初始化完成后可用）
    pub fn pool(&self) -> Option<Arc<BotPool>> {
        self.pool.get().cloned()
    }

    /// 队列中剩余的任务数
    pub fn queued_tasks(&self) -> usize {
        self.queue.remaining()
    }

    /// 执行活动直至完成
    ///
    /// 1. 在工作单元内将活动置为进行中并装载待处理任务
    /// 2. 初始化机器人池
    /// 3. 启动工作循环，逐个消费队列
    /// 4. 全部工作循环退出后计算最终活动状态并排空池
    #[instrument(skip(self), fields(campaign_id = %self.campaign_id))]
    pub async fn run(self: Arc<Self>) -> Result<(), OrchestratorError> {
        let campaign = self.claim_campaign().await?;
        let total_queued = self.queue.remaining();
        info!(tasks = total_queued, bots = campaign.max_bots, "extraction starting");

        if total_queued == 0 {
            self.finalize_campaign().await?;
            return Ok(());
        }

        let pool = Arc::new(BotPool::new(
            self.factory.clone(),
            self.bus.clone(),
            self.campaign_id.clone(),
            campaign.max_bots.max(1) as usize,
            self.settings.extraction.pool_open_retries,
        ));

        if let Err(e) = pool.initialize().await {
            error!(error = %e, "pool initialization exhausted, failing campaign");
            self.fail_campaign(&format!("pool initialization failed: {}", e))
                .await?;
            return Err(e.into());
        }
        let _ = self.pool.set(pool.clone());

        let fatal = Arc::new(AtomicBool::new(false));
        let campaign = Arc::new(campaign);
        let mut handles = Vec::new();
        for worker in 0..pool.size() {
            let this = self.clone();
            let pool = pool.clone();
            let campaign = campaign.clone();
            let fatal = fatal.clone();
            handles.push(tokio::spawn(async move {
                this.worker_loop(worker, pool, campaign, fatal).await;
            }));
        }

        let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();
        let join_all = futures::future::join_all(handles);
        tokio::pin!(join_all);

        tokio::select! {
            _ = &mut join_all => {}
            _ = self.cancel.cancelled() => {
                // 宽限窗口：在途任务允许完成或中止当前步骤
                let grace = self.settings.extraction.grace_period();
                if tokio::time::timeout(grace, &mut join_all).await.is_err() {
                    warn!(grace_secs = grace.as_secs(), "grace window elapsed, forcing drain");
                    for abort in aborts {
                        abort.abort();
                    }
                }
            }
        }

        pool.drain().await;

        if fatal.load(Ordering::SeqCst) {
            self.fail_campaign("extraction aborted by fatal worker error")
                .await?;
            return Ok(());
        }

        if self.cancel.is_cancelled() {
            // 取消时在途任务保持进行中状态，恢复路径负责对账
            let dropped = self.queue.drain();
            info!(dropped, "extraction cancelled, campaign left in progress");
            return Ok(());
        }

        self.finalize_campaign().await?;
        Ok(())
    }

    /// 在工作单元内认领活动并装载待处理任务
    async fn claim_campaign(&self) -> Result<Campaign, OrchestratorError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        let mut campaign = uow
            .campaigns()
            .get(self.campaign_id.as_str())
            .await?
            .ok_or_else(|| OrchestratorError::CampaignNotFound(self.campaign_id.clone()))?;

        campaign
            .mark_in_progress()
            .map_err(|e| OrchestratorError::IllegalState(self.campaign_id.clone(), e.to_string()))?;
        uow.campaigns().save(&campaign).await?;

        let ids = uow.tasks().pending_ids_of(self.campaign_id.as_str()).await?;
        uow.commit().await?;

        self.queue.enqueue_all(ids);
        Ok(campaign)
    }

    /// 单个工作循环
    ///
    /// 队列非空且未请求取消时持续迭代
    async fn worker_loop(
        &self,
        worker: usize,
        pool: Arc<BotPool>,
        campaign: Arc<Campaign>,
        fatal: Arc<AtomicBool>,
    ) {
        debug!(worker, "worker loop started");
        loop {
            if self.cancel.is_cancelled() || fatal.load(Ordering::SeqCst) {
                break;
            }

            let Some(task_id) = self.queue.dequeue() else {
                break;
            };

            let session = match pool.acquire(&self.cancel).await {
                Ok(session) => session,
                Err(PoolError::Cancelled) | Err(PoolError::Drained) => {
                    self.queue.enqueue(task_id);
                    break;
                }
                Err(e) => {
                    warn!(worker, error = %e, "acquire failed");
                    self.queue.enqueue(task_id);
                    break;
                }
            };

            match self.process_task(task_id, session, &pool, &campaign).await {
                Ok(session) => pool.release(session).await,
                Err(e) => {
                    error!(worker, error = %e, "fatal worker error");
                    fatal.store(true, Ordering::SeqCst);
                    self.cancel.cancel();
                    break;
                }
            }
        }
        debug!(worker, "worker loop exited");
    }

    /// 处理单个任务
    ///
    /// 返回应归还给池的会话（驱动崩溃时已被替换）
    async fn process_task(
        &self,
        task_id: TaskId,
        session: BotSession,
        pool: &Arc<BotPool>,
        campaign: &Campaign,
    ) -> Result<BotSession, OrchestratorError> {
        // 认领任务：置为进行中并记录一次尝试
        let mut task = {
            let uow = UnitOfWork::begin(&self.db).await?;
            let Some(mut task) = uow.tasks().get(task_id.as_str()).await? else {
                warn!(task_id = %task_id, "queued task vanished from storage");
                return Ok(session);
            };
            if task.status != TaskStatus::Pending {
                debug!(task_id = %task_id, status = %task.status, "task no longer pending, skipping");
                return Ok(session);
            }
            if task.mark_in_progress().is_err() {
                return Ok(session);
            }
            task.record_attempt();
            uow.tasks().save(&task).await?;
            uow.commit().await?;
            task
        };

        self.bus
            .publish(DomainEvent::TaskStarted {
                campaign_id: self.campaign_id.clone(),
                task_id: task.id.clone(),
                search_seed: task.search_seed.clone(),
                location: task.geoname_name.clone(),
                occurred_at: Utc::now(),
            })
            .await;
        self.bus
            .publish(DomainEvent::BotTaskAssigned {
                campaign_id: self.campaign_id.clone(),
                bot_id: session.id.clone(),
                task_id: task.id.clone(),
                occurred_at: Utc::now(),
            })
            .await;

        let outcome = self
            .run_pipeline(session.driver.as_ref(), &session.id, &task, campaign)
            .await;

        match outcome {
            Ok(records) => {
                self.complete_task(&mut task, &session.id, campaign, records)
                    .await?;
                Ok(session)
            }
            Err(DriverError::Cancelled) => {
                // 取消时任务在存储中保持进行中，由恢复路径对账
                debug!(task_id = %task.id, "pipeline cancelled mid-task");
                Ok(session)
            }
            Err(e) => {
                let session = if !session.driver.is_alive().await {
                    // 会话死亡：替换并按瞬态失败处理
                    self.bus
                        .publish(DomainEvent::BotError {
                            campaign_id: self.campaign_id.clone(),
                            bot_id: session.id.clone(),
                            error: e.to_string(),
                            occurred_at: Utc::now(),
                        })
                        .await;
                    match pool.replace(session).await {
                        Ok(replacement) => replacement,
                        Err(replace_err) => {
                            self.record_task_failure(&mut task, e.to_string(), true).await?;
                            return Err(replace_err.into());
                        }
                    }
                } else {
                    session
                };

                self.record_task_failure(&mut task, e.to_string(), e.is_transient())
                    .await?;
                Ok(session)
            }
        }
    }

    /// 执行提取流水线并周期性推送快照
    async fn run_pipeline(
        &self,
        driver: &dyn BrowserDriver,
        bot_id: &BotId,
        task: &PlaceExtractionTask,
        campaign: &Campaign,
    ) -> Result<Vec<PlaceRecord>, DriverError> {
        let url = search_url(&task.search_seed, &task.geoname_name, &campaign.locale);
        let wait_timeout = std::time::Duration::from_secs(self.settings.driver.wait_timeout_secs);
        let max_results = campaign.max_results.max(1) as u32;
        let max_scrolls = max_results.div_ceil(RESULTS_PER_SCROLL);

        let work = async {
            driver.navigate(&url).await?;
            driver.wait_for(RESULT_FEED_SELECTOR, wait_timeout).await?;
            driver.scroll_result_list(max_scrolls).await?;
            driver.parse_results(max_results).await
        };
        tokio::pin!(work);

        let mut ticker = tokio::time::interval(self.settings.extraction.snapshot_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let records = loop {
            tokio::select! {
                result = &mut work => break result?,
                _ = ticker.tick() => {
                    self.capture_snapshot(driver, bot_id, task).await;
                }
                _ = self.cancel.cancelled() => return Err(DriverError::Cancelled),
            }
        };

        // 任务收尾截图
        self.capture_snapshot(driver, bot_id, task).await;
        Ok(records)
    }

    /// 捕获并发布一张快照；失败只记录不中断流水线
    async fn capture_snapshot(
        &self,
        driver: &dyn BrowserDriver,
        bot_id: &BotId,
        task: &PlaceExtractionTask,
    ) {
        match driver.capture_image().await {
            Ok(image) => {
                let current_url = driver.current_url().await.unwrap_or_default();
                self.bus
                    .publish(DomainEvent::BotSnapshotCaptured {
                        campaign_id: self.campaign_id.clone(),
                        bot_id: bot_id.clone(),
                        task_id: task.id.clone(),
                        screenshot: Arc::new(image),
                        current_url,
                        occurred_at: Utc::now(),
                    })
                    .await;
            }
            Err(e) => debug!(bot_id = %bot_id, error = %e, "snapshot capture failed"),
        }
    }

    /// 持久化解析结果并完成任务
    async fn complete_task(
        &self,
        task: &mut PlaceExtractionTask,
        bot_id: &BotId,
        campaign: &Campaign,
        records: Vec<PlaceRecord>,
    ) -> Result<(), OrchestratorError> {
        let mut saved = Vec::new();
        {
            let uow = UnitOfWork::begin(&self.db).await?;
            let places = uow.places();

            for record in records {
                if campaign.min_rating > 0.0 && record.rating.unwrap_or(0.0) < campaign.min_rating {
                    continue;
                }

                let mut place = ExtractedPlace::new(
                    task.id.clone(),
                    campaign.id.clone(),
                    record.name,
                    record.address,
                );
                place.city = record.city;
                place.category = record.category;
                place.rating = record.rating;
                place.review_count = record.review_count;
                place.phone = record.phone;
                place.website = record.website;
                place.latitude = record.latitude;
                place.longitude = record.longitude;
                for review in record.reviews {
                    place.add_review(review.author, review.rating, review.text, review.posted_at);
                }

                // 指纹重复的记录被折叠，不再发布事件
                if places.upsert(&place).await? {
                    saved.push(place);
                }
            }

            task.mark_completed()
                .map_err(|e| OrchestratorError::IllegalState(self.campaign_id.clone(), e.to_string()))?;
            uow.tasks().save(task).await?;
            uow.campaigns()
                .increment_completed_tasks(self.campaign_id.as_str())
                .await?;
            uow.commit().await?;
        }

        for (index, place) in saved.iter().enumerate() {
            self.bus
                .publish(DomainEvent::PlaceExtracted {
                    campaign_id: self.campaign_id.clone(),
                    task_id: task.id.clone(),
                    place_id: place.id.clone(),
                    place_name: place.name.clone(),
                    current_progress: index as u32 + 1,
                    occurred_at: Utc::now(),
                })
                .await;
        }
        self.bus
            .publish(DomainEvent::TaskCompleted {
                campaign_id: self.campaign_id.clone(),
                task_id: task.id.clone(),
                total_places_extracted: saved.len() as u32,
                duration_seconds: task.duration_seconds(),
                occurred_at: Utc::now(),
            })
            .await;
        self.bus
            .publish(DomainEvent::BotTaskCompleted {
                campaign_id: self.campaign_id.clone(),
                bot_id: bot_id.clone(),
                task_id: task.id.clone(),
                occurred_at: Utc::now(),
            })
            .await;

        info!(task_id = %task.id, places = saved.len(), "task completed");
        Ok(())
    }

    /// 记录任务失败
    ///
    /// 瞬态失败且尝试次数未超预算时重置任务并重新入队，
    /// 否则转入失败终态并计入活动失败计数
    async fn record_task_failure(
        &self,
        task: &mut PlaceExtractionTask,
        error: String,
        transient: bool,
    ) -> Result<(), OrchestratorError> {
        let retry_budget = self.settings.extraction.task_retry_budget as i32;
        let retry = transient && task.attempts < retry_budget;

        {
            let uow = UnitOfWork::begin(&self.db).await?;
            if retry {
                task.last_error = Some(error.clone());
                task.mark_pending().map_err(|e| {
                    OrchestratorError::IllegalState(self.campaign_id.clone(), e.to_string())
                })?;
                uow.tasks().save(task).await?;
            } else {
                task.mark_failed(Some(error.clone())).map_err(|e| {
                    OrchestratorError::IllegalState(self.campaign_id.clone(), e.to_string())
                })?;
                uow.tasks().save(task).await?;
                uow.campaigns()
                    .increment_failed_tasks(self.campaign_id.as_str())
                    .await?;
            }
            uow.commit().await?;
        }

        if retry {
            info!(task_id = %task.id, attempts = task.attempts, "transient failure, requeued");
            self.queue.enqueue(task.id.clone());
        } else {
            warn!(task_id = %task.id, attempts = task.attempts, error = %error, "task failed");
            self.bus
                .publish(DomainEvent::TaskFailed {
                    campaign_id: self.campaign_id.clone(),
                    task_id: task.id.clone(),
                    error,
                    occurred_at: Utc::now(),
                })
                .await;
        }
        Ok(())
    }

    /// 计算并持久化最终活动状态
    async fn finalize_campaign(&self) -> Result<(), OrchestratorError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        let mut campaign = uow
            .campaigns()
            .get(self.campaign_id.as_str())
            .await?
            .ok_or_else(|| OrchestratorError::CampaignNotFound(self.campaign_id.clone()))?;

        let tasks = uow.tasks();
        let total = campaign.total_tasks as u64;
        let completed = tasks
            .count_by_status(self.campaign_id.as_str(), TaskStatus::Completed)
            .await?;
        let skipped = tasks
            .count_by_status(self.campaign_id.as_str(), TaskStatus::Skipped)
            .await?;

        if completed + skipped >= total {
            campaign
                .mark_completed()
                .map_err(|e| OrchestratorError::IllegalState(self.campaign_id.clone(), e.to_string()))?;
            info!(campaign_id = %campaign.id, "campaign completed");
        } else {
            campaign
                .mark_failed()
                .map_err(|e| OrchestratorError::IllegalState(self.campaign_id.clone(), e.to_string()))?;
            warn!(campaign_id = %campaign.id, failed = campaign.failed_tasks, "campaign failed");
        }

        uow.campaigns().save(&campaign).await?;
        uow.commit().await?;
        Ok(())
    }

    /// 以致命错误终止活动
    async fn fail_campaign(&self, reason: &str) -> Result<(), OrchestratorError> {
        error!(campaign_id = %self.campaign_id, reason, "campaign aborted");
        let uow = UnitOfWork::begin(&self.db).await?;
        if let Some(mut campaign) = uow.campaigns().get(self.campaign_id.as_str()).await? {
            if campaign.mark_failed().is_ok() {
                uow.campaigns().save(&campaign).await?;
                uow.commit().await?;
            }
        }
        Ok(())
    }
}

/// 构造地图搜索URL
///
/// 形如 `https://www.google.com/maps/search/restaurants+in+Madrid?hl=es`
pub fn search_url(seed: &str, city: &str, locale: &str) -> String {
    let query = format!("{} in {}", seed, city).replace(' ', "+");
    let lang = locale.split('-').next().unwrap_or("en");
    format!("https://www.google.com/maps/search/{}?hl={}", query, lang)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_url_shape() {
        let url = search_url("restaurants", "Madrid", "es-ES");
        assert_eq!(
            url,
            "https://www.google.com/maps/search/restaurants+in+Madrid?hl=es"
        );
    }

    #[test]
    fn test_search_url_defaults_language() {
        let url = search_url("cafes", "Alcalá de Henares", "en-US");
        assert!(url.ends_with("?hl=en"));
        assert!(url.contains("cafes+in+Alcalá+de+Henares"));
    }
}
