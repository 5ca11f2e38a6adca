// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::DatabaseConnection;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument};

use crate::application::dto::create_campaign_request::CreateCampaignRequest;
use crate::application::services::extraction_registry::ExtractionRegistry;
use crate::application::services::geoname_selection::{
    GeonameSelectionParams, GeonameSelectionService,
};
use crate::bus::EventBus;
use crate::config::settings::Settings;
use crate::domain::models::campaign::{Campaign, CampaignDraft, CampaignStatus};
use crate::domain::models::ids::CampaignId;
use crate::domain::models::place::ExtractedPlace;
use crate::domain::models::task::{PlaceExtractionTask, TaskStatus};
use crate::engines::traits::DriverFactory;
use crate::infrastructure::geonames::client::GeonamesError;
use crate::infrastructure::licensing::{LicenseError, LicenseValidator};
use crate::infrastructure::persistence::uow::UnitOfWork;
use crate::infrastructure::repositories::campaign_repo::CampaignRepository;
use crate::infrastructure::repositories::place_repo::PlaceRepository;
use crate::infrastructure::repositories::task_repo::TaskRepository;
use crate::infrastructure::repositories::RepositoryError;
use crate::workers::bot_pool::BotState;
use crate::workers::orchestrator::ExtractionOrchestrator;

/// 应用服务错误类型
#[derive(Error, Debug)]
pub enum ServiceError {
    /// 输入校验失败
    #[error("{0}")]
    Validation(String),
    /// 资源不存在
    #[error("Resource not found")]
    NotFound,
    /// 非法状态转换
    #[error("{0}")]
    Conflict(String),
    /// 存储错误
    #[error("Storage failure: {0}")]
    Repository(#[from] RepositoryError),
    /// 地名服务错误
    #[error("Geonames lookup failed: {0}")]
    Geonames(#[from] GeonamesError),
    /// 许可校验失败
    #[error("{0}")]
    License(#[from] LicenseError),
}

/// 活动状态视图
#[derive(Debug, Clone)]
pub struct CampaignStatusView {
    pub campaign: Campaign,
    pub running: bool,
    pub queued_tasks: usize,
}

/// 活动统计视图
#[derive(Debug, Clone)]
pub struct CampaignStatisticsView {
    pub campaign_id: CampaignId,
    pub total_places_extracted: u64,
    pub completed_tasks: i32,
    pub failed_tasks: i32,
    pub total_tasks: i32,
    pub average_task_seconds: Option<f64>,
    pub success_rate: f64,
}

/// 机器人信息视图
#[derive(Debug, Clone)]
pub struct BotInfoView {
    pub campaign_id: CampaignId,
    pub bot_id: String,
    pub state: BotState,
}

/// 活动应用服务
///
/// 负责活动创建、任务物化与生命周期转换，并作为读侧入口。
/// 所有依赖在启动阶段注入。
pub struct CampaignService {
    db: Arc<DatabaseConnection>,
    bus: Arc<EventBus>,
    factory: Arc<dyn DriverFactory>,
    selection: GeonameSelectionService,
    registry: Arc<ExtractionRegistry>,
    license: Arc<dyn LicenseValidator>,
    settings: Arc<Settings>,
}

impl CampaignService {
    /// 创建新的活动服务
    pub fn new(
        db: Arc<DatabaseConnection>,
        bus: Arc<EventBus>,
        factory: Arc<dyn DriverFactory>,
        selection: GeonameSelectionService,
        registry: Arc<ExtractionRegistry>,
        license: Arc<dyn LicenseValidator>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            db,
            bus,
            factory,
            selection,
            registry,
            license,
            settings,
        }
    }

    /// 进程内注册表
    pub fn registry(&self) -> &Arc<ExtractionRegistry> {
        &self.registry
    }

    /// 创建活动并物化任务集
    ///
    /// 解析地理范围为城市列表，自动生成标题，并在单个工作单元内
    /// 持久化活动与其全部任务
    #[instrument(skip(self, request), fields(activity = %request.activity))]
    pub async fn create(&self, request: CreateCampaignRequest) -> Result<Campaign, ServiceError> {
        self.validate_request(&request)?;

        let max_bots = request
            .max_bots
            .unwrap_or(self.settings.extraction.max_bots_default as i32);
        let min_population = request.min_population.unwrap_or(15000);

        let params = GeonameSelectionParams {
            country_code: request.country_code.to_uppercase(),
            admin1_code: request.admin1_code.clone(),
            admin2_code: request.admin2_code.clone(),
            city_geoname_id: request.city_geoname_id,
            min_population,
        };
        let cities = self.selection.resolve(&params).await?;
        if cities.is_empty() {
            return Err(ServiceError::Validation(
                "geographic scope resolves to no cities".to_string(),
            ));
        }

        let mut campaign = Campaign::create(CampaignDraft {
            title: None,
            activity: request.activity.clone(),
            country_code: params.country_code.clone(),
            admin1_code: request.admin1_code.clone(),
            admin2_code: request.admin2_code.clone(),
            city_geoname_id: request.city_geoname_id,
            location_name: request.location_name.clone(),
            iso_language: request.iso_language.clone(),
            locale: request.locale.clone().unwrap_or_else(|| "en-US".to_string()),
            max_results: request.max_results.unwrap_or(50),
            min_rating: request.min_rating.unwrap_or(0.0),
            min_population,
            max_bots,
        });

        let tasks: Vec<PlaceExtractionTask> = cities
            .iter()
            .map(|city| {
                PlaceExtractionTask::create(
                    campaign.id.clone(),
                    city.geoname_id,
                    city.name.clone(),
                    campaign.activity.clone(),
                )
            })
            .collect();
        campaign.total_tasks = tasks.len() as i32;

        let uow = UnitOfWork::begin(&self.db).await?;
        uow.campaigns().save(&campaign).await?;
        uow.tasks().insert_many(&tasks).await?;
        uow.commit().await?;

        info!(
            campaign_id = %campaign.id,
            title = %campaign.title,
            tasks = campaign.total_tasks,
            "campaign created"
        );
        Ok(campaign)
    }

    /// 启动活动的提取执行
    ///
    /// 仅待处理状态的活动可启动；同一活动至多一次在途执行
    pub async fn start(&self, campaign_id: &CampaignId) -> Result<(), ServiceError> {
        self.license.validate().await?;

        if self.registry.is_running(campaign_id) {
            return Err(ServiceError::Conflict(format!(
                "campaign {} is already running",
                campaign_id
            )));
        }

        let campaign = self.get(campaign_id).await?;
        if campaign.status != CampaignStatus::Pending {
            return Err(ServiceError::Conflict(format!(
                "campaign {} cannot be started from {}",
                campaign_id, campaign.status
            )));
        }

        self.spawn_run(campaign_id.clone());
        Ok(())
    }

    /// 恢复活动
    ///
    /// 将遗留的进行中任务对账为待处理，重置失败任务，
    /// 然后重新启动执行。已完成的任务不会重跑。
    pub async fn resume(&self, campaign_id: &CampaignId) -> Result<(), ServiceError> {
        self.license.validate().await?;

        if self.registry.is_running(campaign_id) {
            return Err(ServiceError::Conflict(format!(
                "campaign {} is already running",
                campaign_id
            )));
        }

        {
            let uow = UnitOfWork::begin(&self.db).await?;
            let mut campaign = uow
                .campaigns()
                .get(campaign_id.as_str())
                .await?
                .ok_or(ServiceError::NotFound)?;

            if !matches!(
                campaign.status,
                CampaignStatus::Failed | CampaignStatus::InProgress
            ) {
                return Err(ServiceError::Conflict(format!(
                    "campaign {} cannot be resumed from {}",
                    campaign_id, campaign.status
                )));
            }

            let reconciled = uow.tasks().reconcile_in_progress(campaign_id.as_str()).await?;
            let reset = uow.tasks().reset_failed(campaign_id.as_str()).await?;
            campaign
                .resume()
                .map_err(|e| ServiceError::Conflict(e.to_string()))?;
            uow.campaigns().save(&campaign).await?;
            uow.commit().await?;

            info!(
                campaign_id = %campaign_id,
                reconciled,
                reset,
                "campaign reconciled for resume"
            );
        }

        self.spawn_run(campaign_id.clone());
        Ok(())
    }

    /// 归档活动
    ///
    /// 仅已完成或已失败的活动可归档；重复归档为无操作成功。
    /// 已提取的地点在归档后仍可查询。
    pub async fn archive(&self, campaign_id: &CampaignId) -> Result<(), ServiceError> {
        let uow = UnitOfWork::begin(&self.db).await?;
        let mut campaign = uow
            .campaigns()
            .get(campaign_id.as_str())
            .await?
            .ok_or(ServiceError::NotFound)?;

        campaign
            .mark_archived()
            .map_err(|e| ServiceError::Conflict(e.to_string()))?;
        uow.campaigns().save(&campaign).await?;
        uow.commit().await?;
        Ok(())
    }

    /// 取消在途执行
    pub fn cancel(&self, campaign_id: &CampaignId) -> Result<(), ServiceError> {
        if self.registry.cancel(campaign_id) {
            info!(campaign_id = %campaign_id, "cancellation requested");
            Ok(())
        } else {
            Err(ServiceError::Conflict(format!(
                "campaign {} has no running extraction",
                campaign_id
            )))
        }
    }

    /// 暂停在途执行
    ///
    /// 协作式停止；之后可通过恢复继续
    pub fn pause(&self, campaign_id: &CampaignId) -> Result<(), ServiceError> {
        self.cancel(campaign_id)
    }

    /// 列出全部活动
    pub async fn list(&self) -> Result<Vec<Campaign>, ServiceError> {
        Ok(CampaignRepository::new(self.db.as_ref()).list().await?)
    }

    /// 查询单个活动
    pub async fn get(&self, campaign_id: &CampaignId) -> Result<Campaign, ServiceError> {
        CampaignRepository::new(self.db.as_ref())
            .get(campaign_id.as_str())
            .await?
            .ok_or(ServiceError::NotFound)
    }

    /// 查询活动的地点
    pub async fn places_of(
        &self,
        campaign_id: &CampaignId,
    ) -> Result<Vec<ExtractedPlace>, ServiceError> {
        self.get(campaign_id).await?;
        Ok(PlaceRepository::new(self.db.as_ref())
            .places_of(campaign_id.as_str())
            .await?)
    }

    /// 查询活动的任务
    pub async fn tasks_of(
        &self,
        campaign_id: &CampaignId,
    ) -> Result<Vec<PlaceExtractionTask>, ServiceError> {
        self.get(campaign_id).await?;
        Ok(TaskRepository::new(self.db.as_ref())
            .list_of(campaign_id.as_str())
            .await?)
    }

    /// 活动状态视图
    pub async fn status_of(
        &self,
        campaign_id: &CampaignId,
    ) -> Result<CampaignStatusView, ServiceError> {
        let campaign = self.get(campaign_id).await?;
        let running = self.registry.is_running(campaign_id);
        let queued_tasks = self
            .registry
            .get(campaign_id)
            .map(|o| o.queued_tasks())
            .unwrap_or(0);

        Ok(CampaignStatusView {
            campaign,
            running,
            queued_tasks,
        })
    }

    /// 活动统计视图
    pub async fn statistics_of(
        &self,
        campaign_id: &CampaignId,
    ) -> Result<CampaignStatisticsView, ServiceError> {
        let campaign = self.get(campaign_id).await?;
        let total_places = PlaceRepository::new(self.db.as_ref())
            .count_of(campaign_id.as_str())
            .await?;

        let tasks = TaskRepository::new(self.db.as_ref())
            .list_of(campaign_id.as_str())
            .await?;
        let durations: Vec<f64> = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .filter_map(|t| t.duration_seconds())
            .collect();
        let average_task_seconds = if durations.is_empty() {
            None
        } else {
            Some(durations.iter().sum::<f64>() / durations.len() as f64)
        };
        let attempted = campaign.completed_tasks + campaign.failed_tasks;
        let success_rate = if attempted == 0 {
            0.0
        } else {
            campaign.completed_tasks as f64 / attempted as f64
        };

        Ok(CampaignStatisticsView {
            campaign_id: campaign.id.clone(),
            total_places_extracted: total_places,
            completed_tasks: campaign.completed_tasks,
            failed_tasks: campaign.failed_tasks,
            total_tasks: campaign.total_tasks,
            average_task_seconds,
            success_rate,
        })
    }

    /// 全部在途执行的机器人信息
    pub fn bot_info(&self) -> Vec<BotInfoView> {
        let mut views = Vec::new();
        for orchestrator in self.registry.running() {
            if let Some(pool) = orchestrator.pool() {
                for (bot_id, state) in pool.bot_states() {
                    views.push(BotInfoView {
                        campaign_id: orchestrator.campaign_id().clone(),
                        bot_id: bot_id.to_string(),
                        state,
                    });
                }
            }
        }
        views
    }

    fn validate_request(&self, request: &CreateCampaignRequest) -> Result<(), ServiceError> {
        if request.activity.trim().is_empty() {
            return Err(ServiceError::Validation("activity must not be empty".to_string()));
        }
        if request.country_code.len() != 2 {
            return Err(ServiceError::Validation(
                "country_code must be a 2-letter ISO code".to_string(),
            ));
        }
        if request.admin2_code.is_some() && request.admin1_code.is_none() {
            return Err(ServiceError::Validation(
                "admin1_code is required when admin2_code is set".to_string(),
            ));
        }
        if request.city_geoname_id.is_some() && request.admin1_code.is_none() {
            return Err(ServiceError::Validation(
                "admin1_code is required when city_geoname_id is set".to_string(),
            ));
        }
        if let Some(bots) = request.max_bots {
            if bots < 1 {
                return Err(ServiceError::Validation("max_bots must be >= 1".to_string()));
            }
        }
        if let Some(rating) = request.min_rating {
            if !(0.0..=5.0).contains(&rating) {
                return Err(ServiceError::Validation(
                    "min_rating must be between 0.0 and 5.0".to_string(),
                ));
            }
        }
        if let Some(population) = request.min_population {
            if population < 0 {
                return Err(ServiceError::Validation(
                    "min_population must be >= 0".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn spawn_run(&self, campaign_id: CampaignId) {
        let orchestrator = ExtractionOrchestrator::new(
            self.db.clone(),
            self.bus.clone(),
            self.factory.clone(),
            self.settings.clone(),
            campaign_id.clone(),
        );

        if !self.registry.insert(orchestrator.clone()) {
            // 竞态下的双重启动被注册表拒绝
            return;
        }

        let registry = self.registry.clone();
        tokio::spawn(async move {
            if let Err(e) = orchestrator.clone().run().await {
                error!(campaign_id = %campaign_id, error = %e, "extraction run failed");
            }
            registry.remove(&campaign_id);
        });
    }
}
