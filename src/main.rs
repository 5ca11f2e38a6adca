// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::Extension;
use axum::{
    routing::{get, post},
    Router,
};
use extractrs::application::services::campaign_service::CampaignService;
use extractrs::application::services::extraction_registry::ExtractionRegistry;
use extractrs::application::services::geoname_selection::GeonameSelectionService;
use extractrs::bus::EventBus;
use extractrs::config::settings::Settings;
use extractrs::engines::chromium::ChromiumDriverFactory;
use extractrs::engines::traits::{DriverConfig, DriverFactory};
use extractrs::infrastructure::database::connection;
use extractrs::infrastructure::geonames::client::GeonamesClient;
use extractrs::infrastructure::licensing::{LicenseValidator, PermissiveLicenseValidator};
use extractrs::presentation::handlers::{campaign_handler, geonames_handler};
use extractrs::presentation::routes;
use extractrs::presentation::ws;
use extractrs::utils::telemetry;
use migration::{Migrator, MigratorTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// 收到SIGINT时置位，用于进程退出码
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

#[tokio::main]
async fn main() {
    // 1. 加载配置（失败属于启动错误）
    let settings = match Settings::new() {
        Ok(settings) => Arc::new(settings),
        Err(e) => {
            eprintln!("configuration error: {}", e);
            std::process::exit(2);
        }
    };

    // 2. 初始化遥测
    telemetry::init_telemetry(&settings.logging);
    info!("Starting extractrs...");

    if let Err(e) = run(settings).await {
        error!("startup failed: {:#}", e);
        std::process::exit(2);
    }

    if INTERRUPTED.load(Ordering::SeqCst) {
        std::process::exit(130);
    }
}

async fn run(settings: Arc<Settings>) -> anyhow::Result<()> {
    // 3. 建立数据库连接并运行迁移
    let db = Arc::new(connection::create_pool(&settings.database).await?);
    info!("Database connection established");

    info!("Running database migrations...");
    Migrator::up(db.as_ref(), None).await?;
    info!("Database migrations applied");

    // 4. 进程级能力：事件总线、许可校验、地名服务
    let bus = Arc::new(EventBus::new());
    let license: Arc<dyn LicenseValidator> = Arc::new(PermissiveLicenseValidator);
    let geonames = Arc::new(GeonamesClient::new(&settings.geonames));

    // 5. 浏览器驱动工厂
    let driver_config = DriverConfig {
        headless: settings.driver.headless,
        locale: settings.driver.locale.clone(),
        navigate_timeout: Duration::from_secs(settings.driver.navigate_timeout_secs),
        wait_timeout: Duration::from_secs(settings.driver.wait_timeout_secs),
        scroll_timeout: Duration::from_secs(settings.driver.scroll_timeout_secs),
        parse_timeout: Duration::from_secs(settings.driver.parse_timeout_secs),
        capture_timeout: Duration::from_secs(settings.driver.capture_timeout_secs),
        open_timeout: Duration::from_secs(settings.driver.open_timeout_secs),
        close_timeout: Duration::from_secs(settings.driver.close_timeout_secs),
    };
    let factory: Arc<dyn DriverFactory> = Arc::new(ChromiumDriverFactory::new(driver_config));

    // 6. 应用服务
    let registry = Arc::new(ExtractionRegistry::new());
    let service = Arc::new(CampaignService::new(
        db.clone(),
        bus.clone(),
        factory,
        GeonameSelectionService::new(geonames.clone()),
        registry,
        license,
        settings.clone(),
    ));

    // 7. 路由
    let app = Router::new()
        .route("/health", get(routes::health_check))
        .route("/v1/version", get(routes::version))
        .route("/api/geonames/countries", get(geonames_handler::get_countries))
        .route(
            "/api/geonames/countries/{cc}/regions",
            get(geonames_handler::get_regions),
        )
        .route(
            "/api/geonames/countries/{cc}/provinces",
            get(geonames_handler::get_provinces),
        )
        .route(
            "/api/geonames/countries/{cc}/cities",
            get(geonames_handler::get_cities),
        )
        .route("/api/campaigns", post(campaign_handler::create_campaign))
        .route("/api/campaigns", get(campaign_handler::list_campaigns))
        .route("/api/campaigns/{id}", get(campaign_handler::get_campaign))
        .route(
            "/api/campaigns/{id}/places",
            get(campaign_handler::get_campaign_places),
        )
        .route(
            "/api/campaigns/{id}/tasks",
            get(campaign_handler::get_campaign_tasks),
        )
        .route(
            "/api/campaigns/{id}/start",
            post(campaign_handler::start_campaign),
        )
        .route(
            "/api/campaigns/{id}/resume",
            post(campaign_handler::resume_campaign),
        )
        .route(
            "/api/campaigns/{id}/archive",
            post(campaign_handler::archive_campaign),
        )
        .route("/ws/extraction/stream", get(ws::ws_handler))
        .layer(Extension(service))
        .layer(Extension(bus))
        .layer(Extension(geonames))
        .layer(Extension(settings.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // 8. 启动HTTP服务器
    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            INTERRUPTED.store(true, Ordering::SeqCst);
            info!("Shutdown signal received");
        }
        Err(e) => error!("Unable to listen for shutdown signal: {}", e),
    }
}
