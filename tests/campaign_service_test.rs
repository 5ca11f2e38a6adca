// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 活动服务生命周期测试

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use extractrs::application::dto::create_campaign_request::CreateCampaignRequest;
use extractrs::application::services::campaign_service::ServiceError;
use extractrs::bus::EventBus;
use extractrs::domain::models::campaign::CampaignStatus;
use extractrs::domain::models::ids::CampaignId;
use extractrs::engines::mock::MockDriverFactory;

use helpers::{build_service, setup_db, test_settings, wait_for_status, StaticGeonames};

fn request(max_bots: Option<i32>) -> CreateCampaignRequest {
    serde_json::from_value(serde_json::json!({
        "activity": "restaurants",
        "country_code": "es",
        "admin1_code": "MD",
        "location_name": "Comunidad de Madrid, ES",
        "max_bots": max_bots,
    }))
    .unwrap()
}

#[tokio::test]
async fn test_create_materializes_tasks_atomically() {
    let db = setup_db().await;
    let service = build_service(
        db,
        Arc::new(EventBus::new()),
        Arc::new(MockDriverFactory::new()),
        StaticGeonames::with_cities(vec![(1, "Madrid"), (2, "Alcala"), (3, "Getafe")]),
        test_settings(),
    );

    let campaign = service.create(request(Some(2))).await.unwrap();
    assert_eq!(campaign.status, CampaignStatus::Pending);
    assert_eq!(campaign.total_tasks, 3);
    assert_eq!(campaign.country_code, "ES");
    assert!(campaign.title.starts_with("Restaurants Comunidad de Madrid, ES"));

    let tasks = service.tasks_of(&campaign.id).await.unwrap();
    assert_eq!(tasks.len(), 3);
    assert!(tasks.iter().all(|t| t.search_seed == "restaurants"));
}

#[tokio::test]
async fn test_create_rejects_zero_bots() {
    let db = setup_db().await;
    let service = build_service(
        db,
        Arc::new(EventBus::new()),
        Arc::new(MockDriverFactory::new()),
        StaticGeonames::with_cities(vec![(1, "Madrid")]),
        test_settings(),
    );

    let result = service.create(request(Some(0))).await;
    assert!(matches!(result, Err(ServiceError::Validation(_))));
}

#[tokio::test]
async fn test_create_rejects_empty_scope() {
    let db = setup_db().await;
    let service = build_service(
        db,
        Arc::new(EventBus::new()),
        Arc::new(MockDriverFactory::new()),
        StaticGeonames::empty(),
        test_settings(),
    );

    let result = service.create(request(None)).await;
    assert!(matches!(result, Err(ServiceError::Validation(_))));
}

#[tokio::test]
async fn test_get_unknown_campaign_is_not_found() {
    let db = setup_db().await;
    let service = build_service(
        db,
        Arc::new(EventBus::new()),
        Arc::new(MockDriverFactory::new()),
        StaticGeonames::with_cities(vec![(1, "Madrid")]),
        test_settings(),
    );

    let result = service.get(&CampaignId::new()).await;
    assert!(matches!(result, Err(ServiceError::NotFound)));
}

#[tokio::test]
async fn test_start_runs_campaign_to_completion() {
    let db = setup_db().await;
    let service = build_service(
        db,
        Arc::new(EventBus::new()),
        Arc::new(MockDriverFactory::new()),
        StaticGeonames::with_cities(vec![(1, "Madrid")]),
        test_settings(),
    );

    let campaign = service.create(request(Some(1))).await.unwrap();
    service.start(&campaign.id).await.unwrap();

    assert!(
        wait_for_status(&service, &campaign.id, CampaignStatus::Completed, Duration::from_secs(20))
            .await
    );

    // 完成后再次启动是状态冲突
    let again = service.start(&campaign.id).await;
    assert!(matches!(again, Err(ServiceError::Conflict(_))));
}

#[tokio::test]
async fn test_archive_lifecycle() {
    let db = setup_db().await;
    let service = build_service(
        db,
        Arc::new(EventBus::new()),
        Arc::new(MockDriverFactory::new()),
        StaticGeonames::with_cities(vec![(1, "Madrid")]),
        test_settings(),
    );

    let campaign = service.create(request(Some(1))).await.unwrap();

    // 待处理状态不可归档
    assert!(matches!(
        service.archive(&campaign.id).await,
        Err(ServiceError::Conflict(_))
    ));

    service.start(&campaign.id).await.unwrap();
    assert!(
        wait_for_status(&service, &campaign.id, CampaignStatus::Completed, Duration::from_secs(20))
            .await
    );

    service.archive(&campaign.id).await.unwrap();
    let archived = service.get(&campaign.id).await.unwrap();
    assert_eq!(archived.status, CampaignStatus::Archived);

    // 归档后地点与任务仍可查询
    assert_eq!(service.places_of(&campaign.id).await.unwrap().len(), 10);
    assert_eq!(service.tasks_of(&campaign.id).await.unwrap().len(), 1);

    // 重复归档为无操作成功
    service.archive(&campaign.id).await.unwrap();
    assert_eq!(
        service.get(&campaign.id).await.unwrap().status,
        CampaignStatus::Archived
    );
}

#[tokio::test]
async fn test_statistics_view() {
    let db = setup_db().await;
    let service = build_service(
        db,
        Arc::new(EventBus::new()),
        Arc::new(MockDriverFactory::new()),
        StaticGeonames::with_cities(vec![(1, "Madrid"), (2, "Alcala")]),
        test_settings(),
    );

    let campaign = service.create(request(Some(2))).await.unwrap();
    service.start(&campaign.id).await.unwrap();
    assert!(
        wait_for_status(&service, &campaign.id, CampaignStatus::Completed, Duration::from_secs(20))
            .await
    );

    let stats = service.statistics_of(&campaign.id).await.unwrap();
    assert_eq!(stats.total_places_extracted, 20);
    assert_eq!(stats.completed_tasks, 2);
    assert_eq!(stats.failed_tasks, 0);
    assert_eq!(stats.success_rate, 1.0);
    assert!(stats.average_task_seconds.is_some());
}

#[tokio::test]
async fn test_cancel_without_running_extraction_conflicts() {
    let db = setup_db().await;
    let service = build_service(
        db,
        Arc::new(EventBus::new()),
        Arc::new(MockDriverFactory::new()),
        StaticGeonames::with_cities(vec![(1, "Madrid")]),
        test_settings(),
    );

    let campaign = service.create(request(Some(1))).await.unwrap();
    assert!(matches!(
        service.cancel(&campaign.id),
        Err(ServiceError::Conflict(_))
    ));
}
