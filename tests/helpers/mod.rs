// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 集成测试辅助工具
//!
//! 内存SQLite数据库、脚本化地名桩、事件记录器与服务装配

#![allow(dead_code)]

use async_trait::async_trait;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use extractrs::application::services::campaign_service::CampaignService;
use extractrs::application::services::extraction_registry::ExtractionRegistry;
use extractrs::application::services::geoname_selection::{GeonameQuery, GeonameSelectionService};
use extractrs::bus::EventBus;
use extractrs::config::settings::Settings;
use extractrs::domain::events::DomainEvent;
use extractrs::domain::models::campaign::CampaignStatus;
use extractrs::domain::models::geoname::Geoname;
use extractrs::domain::models::ids::CampaignId;
use extractrs::engines::traits::DriverFactory;
use extractrs::infrastructure::geonames::client::GeonamesError;
use extractrs::infrastructure::licensing::PermissiveLicenseValidator;
use migration::{Migrator, MigratorTrait};

/// 打开一个独立的内存数据库并应用迁移
///
/// 内存SQLite按连接隔离，连接池必须收敛到单连接
pub async fn setup_db() -> Arc<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options)
        .await
        .expect("in-memory sqlite must open");
    Migrator::up(&db, None).await.expect("migrations must apply");
    Arc::new(db)
}

/// 适合测试的配置：快照间隔短、宽限窗口小
pub fn test_settings() -> Arc<Settings> {
    let mut settings = Settings::new().expect("defaults must load");
    settings.extraction.snapshot_interval_ms = 25;
    settings.extraction.task_retry_budget = 2;
    settings.extraction.pool_open_retries = 3;
    settings.extraction.grace_period_secs = 2;
    settings.database.max_connections = Some(1);
    settings.database.min_connections = Some(1);
    Arc::new(settings)
}

/// 脚本化的城市桩
pub struct StaticGeonames {
    pub cities: Vec<Geoname>,
}

impl StaticGeonames {
    pub fn with_cities(cities: Vec<(i64, &str)>) -> Arc<Self> {
        Arc::new(Self {
            cities: cities
                .into_iter()
                .map(|(geoname_id, name)| Geoname {
                    geoname_id,
                    name: name.to_string(),
                    latitude: 40.0,
                    longitude: -3.0,
                    country_code: "ES".to_string(),
                    population: 100_000,
                    feature_code: Some("PPL".to_string()),
                    admin1_code: Some("MD".to_string()),
                    admin2_code: None,
                })
                .collect(),
        })
    }

    pub fn empty() -> Arc<Self> {
        Arc::new(Self { cities: Vec::new() })
    }
}

#[async_trait]
impl GeonameQuery for StaticGeonames {
    async fn cities(
        &self,
        _country_code: &str,
        _admin1_code: Option<&str>,
        _admin2_code: Option<&str>,
        min_population: i64,
    ) -> Result<Vec<Geoname>, GeonamesError> {
        Ok(self
            .cities
            .iter()
            .filter(|city| city.population >= min_population)
            .cloned()
            .collect())
    }
}

/// 记录总线上全部事件的订阅者
pub struct EventRecorder {
    events: Arc<Mutex<Vec<DomainEvent>>>,
}

impl EventRecorder {
    pub fn attach(bus: &Arc<EventBus>) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        bus.subscribe_all(Arc::new(move |event| {
            let sink = sink.clone();
            Box::pin(async move {
                sink.lock().unwrap().push(event);
                Ok(())
            })
        }));
        Self { events }
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count<F: Fn(&DomainEvent) -> bool>(&self, predicate: F) -> usize {
        self.events().iter().filter(|e| predicate(e)).count()
    }
}

/// 装配活动服务
pub fn build_service(
    db: Arc<DatabaseConnection>,
    bus: Arc<EventBus>,
    factory: Arc<dyn DriverFactory>,
    geonames: Arc<dyn GeonameQuery>,
    settings: Arc<Settings>,
) -> Arc<CampaignService> {
    Arc::new(CampaignService::new(
        db,
        bus,
        factory,
        GeonameSelectionService::new(geonames),
        Arc::new(ExtractionRegistry::new()),
        Arc::new(PermissiveLicenseValidator),
        settings,
    ))
}

/// 轮询直到活动达到期望状态或超时
pub async fn wait_for_status(
    service: &Arc<CampaignService>,
    campaign_id: &CampaignId,
    status: CampaignStatus,
    timeout: Duration,
) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if let Ok(campaign) = service.get(campaign_id).await {
            if campaign.status == status {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    false
}
