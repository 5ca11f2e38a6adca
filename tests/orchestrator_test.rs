// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 编排器端到端场景
//!
//! 内存数据库 + 脚本化驱动，覆盖提取执行的全部关键路径

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use extractrs::application::dto::create_campaign_request::CreateCampaignRequest;
use extractrs::bus::EventBus;
use extractrs::domain::events::{DomainEvent, EventKind};
use extractrs::domain::models::campaign::CampaignStatus;
use extractrs::domain::models::ids::TaskId;
use extractrs::domain::models::task::TaskStatus;
use extractrs::engines::mock::{MockBehavior, MockDriverFactory};
use extractrs::infrastructure::repositories::place_repo::PlaceRepository;
use extractrs::infrastructure::repositories::task_repo::TaskRepository;
use extractrs::workers::orchestrator::ExtractionOrchestrator;

use helpers::{build_service, setup_db, test_settings, EventRecorder, StaticGeonames};

fn request(activity: &str, max_bots: i32) -> CreateCampaignRequest {
    serde_json::from_value(serde_json::json!({
        "activity": activity,
        "country_code": "ES",
        "admin1_code": "MD",
        "location_name": "Comunidad de Madrid, ES",
        "min_population": 15000,
        "max_bots": max_bots,
    }))
    .unwrap()
}

#[tokio::test]
async fn test_happy_path_two_cities_complete() {
    let db = setup_db().await;
    let bus = Arc::new(EventBus::new());
    let recorder = EventRecorder::attach(&bus);
    let factory = Arc::new(MockDriverFactory::new());
    let settings = test_settings();
    let geonames = StaticGeonames::with_cities(vec![(3117735, "Madrid"), (3128760, "Alcala")]);

    let service = build_service(
        db.clone(),
        bus.clone(),
        factory.clone(),
        geonames,
        settings.clone(),
    );
    let campaign = service.create(request("restaurants", 2)).await.unwrap();
    assert_eq!(campaign.total_tasks, 2);

    let orchestrator = ExtractionOrchestrator::new(
        db.clone(),
        bus.clone(),
        factory,
        settings,
        campaign.id.clone(),
    );
    orchestrator.run().await.unwrap();

    let finished = service.get(&campaign.id).await.unwrap();
    assert_eq!(finished.status, CampaignStatus::Completed);
    assert_eq!(finished.completed_tasks, 2);
    assert_eq!(finished.failed_tasks, 0);
    assert!(finished.completed_at.is_some());

    let places = service.places_of(&campaign.id).await.unwrap();
    assert_eq!(places.len(), 20);

    assert_eq!(
        recorder.count(|e| e.kind() == EventKind::TaskCompleted),
        2
    );
    assert_eq!(
        recorder.count(|e| e.kind() == EventKind::PlaceExtracted),
        20
    );
    assert_eq!(recorder.count(|e| e.kind() == EventKind::TaskFailed), 0);
}

#[tokio::test]
async fn test_per_task_event_ordering() {
    let db = setup_db().await;
    let bus = Arc::new(EventBus::new());
    let recorder = EventRecorder::attach(&bus);
    let factory = Arc::new(MockDriverFactory::new());
    let settings = test_settings();
    let geonames = StaticGeonames::with_cities(vec![(3117735, "Madrid")]);

    let service = build_service(db.clone(), bus.clone(), factory.clone(), geonames, settings.clone());
    let campaign = service.create(request("restaurants", 1)).await.unwrap();

    let orchestrator =
        ExtractionOrchestrator::new(db, bus, factory, settings, campaign.id.clone());
    orchestrator.run().await.unwrap();

    let events = recorder.events();
    let task_id = events
        .iter()
        .find_map(|e| match e {
            DomainEvent::TaskStarted { task_id, .. } => Some(task_id.clone()),
            _ => None,
        })
        .expect("a task must have started");

    let positions: Vec<(usize, EventKind)> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| task_event_id(e).as_ref() == Some(&task_id))
        .map(|(i, e)| (i, e.kind()))
        .collect();

    let started = positions.iter().find(|(_, k)| *k == EventKind::TaskStarted).unwrap().0;
    let completed = positions
        .iter()
        .find(|(_, k)| *k == EventKind::TaskCompleted)
        .unwrap()
        .0;
    assert!(started < completed, "TaskStarted must precede TaskCompleted");
    for (index, kind) in &positions {
        if *kind == EventKind::PlaceExtracted {
            assert!(*index > started && *index < completed);
        }
        if *kind == EventKind::BotSnapshotCaptured {
            assert!(*index > started && *index < completed);
        }
    }
}

fn task_event_id(event: &DomainEvent) -> Option<TaskId> {
    match event {
        DomainEvent::TaskStarted { task_id, .. }
        | DomainEvent::PlaceExtracted { task_id, .. }
        | DomainEvent::TaskCompleted { task_id, .. }
        | DomainEvent::TaskFailed { task_id, .. }
        | DomainEvent::BotSnapshotCaptured { task_id, .. } => Some(task_id.clone()),
        _ => None,
    }
}

#[tokio::test]
async fn test_transient_failure_retries_then_completes() {
    let db = setup_db().await;
    let bus = Arc::new(EventBus::new());
    let factory = Arc::new(
        MockDriverFactory::new()
            .with_behavior("Madrid", MockBehavior::TransientThenSuccess { failures: 1, places: 5 }),
    );
    let settings = test_settings();
    let geonames = StaticGeonames::with_cities(vec![(3117735, "Madrid")]);

    let service = build_service(db.clone(), bus.clone(), factory.clone(), geonames, settings.clone());
    let campaign = service.create(request("restaurants", 1)).await.unwrap();

    let orchestrator =
        ExtractionOrchestrator::new(db.clone(), bus, factory, settings, campaign.id.clone());
    orchestrator.run().await.unwrap();

    let finished = service.get(&campaign.id).await.unwrap();
    assert_eq!(finished.status, CampaignStatus::Completed);
    assert_eq!(finished.completed_tasks, 1);

    let tasks = TaskRepository::new(db.as_ref())
        .list_of(campaign.id.as_str())
        .await
        .unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, TaskStatus::Completed);
    assert_eq!(tasks[0].attempts, 2);

    // 重试不产生重复地点
    let places = PlaceRepository::new(db.as_ref())
        .places_of(campaign.id.as_str())
        .await
        .unwrap();
    assert_eq!(places.len(), 5);
}

#[tokio::test]
async fn test_permanent_failure_fails_campaign() {
    let db = setup_db().await;
    let bus = Arc::new(EventBus::new());
    let recorder = EventRecorder::attach(&bus);
    let factory =
        Arc::new(MockDriverFactory::new().with_behavior("Madrid", MockBehavior::Permanent));
    let settings = test_settings();
    let geonames = StaticGeonames::with_cities(vec![(3117735, "Madrid")]);

    let service = build_service(db.clone(), bus.clone(), factory.clone(), geonames, settings.clone());
    let campaign = service.create(request("restaurants", 1)).await.unwrap();

    let orchestrator =
        ExtractionOrchestrator::new(db.clone(), bus, factory, settings, campaign.id.clone());
    orchestrator.run().await.unwrap();

    let finished = service.get(&campaign.id).await.unwrap();
    assert_eq!(finished.status, CampaignStatus::Failed);
    assert_eq!(finished.failed_tasks, 1);

    let tasks = TaskRepository::new(db.as_ref())
        .list_of(campaign.id.as_str())
        .await
        .unwrap();
    assert_eq!(tasks[0].status, TaskStatus::Failed);
    assert_eq!(tasks[0].attempts, 1);
    assert!(tasks[0].last_error.as_deref().unwrap().contains("permanent"));

    assert_eq!(recorder.count(|e| e.kind() == EventKind::TaskFailed), 1);
}

#[tokio::test]
async fn test_driver_crash_replaces_session_and_retries() {
    let db = setup_db().await;
    let bus = Arc::new(EventBus::new());
    let recorder = EventRecorder::attach(&bus);
    let factory = Arc::new(
        MockDriverFactory::new()
            .with_behavior("Madrid", MockBehavior::CrashThenSuccess { places: 4 }),
    );
    let settings = test_settings();
    let geonames = StaticGeonames::with_cities(vec![(3117735, "Madrid")]);

    let service = build_service(db.clone(), bus.clone(), factory.clone(), geonames, settings.clone());
    let campaign = service.create(request("restaurants", 1)).await.unwrap();

    let orchestrator = ExtractionOrchestrator::new(
        db.clone(),
        bus,
        factory.clone(),
        settings,
        campaign.id.clone(),
    );
    orchestrator.run().await.unwrap();

    let finished = service.get(&campaign.id).await.unwrap();
    assert_eq!(finished.status, CampaignStatus::Completed);

    // 崩溃会话被替换：打开的会话数超过池容量
    assert!(factory.opened_sessions() > 1);
    assert!(recorder.count(|e| e.kind() == EventKind::BotError) >= 1);
}

#[tokio::test]
async fn test_pool_initialization_exhaustion_is_fatal() {
    let db = setup_db().await;
    let bus = Arc::new(EventBus::new());
    let factory = Arc::new(MockDriverFactory::new().with_failing_opens(100));
    let mut settings = (*test_settings()).clone();
    settings.extraction.pool_open_retries = 2;
    let settings = Arc::new(settings);
    let geonames = StaticGeonames::with_cities(vec![(3117735, "Madrid")]);

    let service = build_service(db.clone(), bus.clone(), factory.clone(), geonames, settings.clone());
    let campaign = service.create(request("restaurants", 1)).await.unwrap();

    let orchestrator =
        ExtractionOrchestrator::new(db, bus, factory, settings, campaign.id.clone());
    let result = orchestrator.run().await;
    assert!(result.is_err(), "initialization exhaustion must surface");

    let finished = service.get(&campaign.id).await.unwrap();
    assert_eq!(finished.status, CampaignStatus::Failed);
}

#[tokio::test]
async fn test_replacement_exhaustion_fails_campaign() {
    let db = setup_db().await;
    let bus = Arc::new(EventBus::new());
    let factory =
        Arc::new(MockDriverFactory::new().with_default(MockBehavior::CrashAlways));
    let mut settings = (*test_settings()).clone();
    settings.extraction.pool_open_retries = 2;
    let settings = Arc::new(settings);
    let geonames = StaticGeonames::with_cities(vec![(3117735, "Madrid")]);

    let service = build_service(db.clone(), bus.clone(), factory.clone(), geonames, settings.clone());
    let campaign = service.create(request("restaurants", 1)).await.unwrap();

    let orchestrator = ExtractionOrchestrator::new(
        db.clone(),
        bus,
        factory.clone(),
        settings,
        campaign.id.clone(),
    );

    // 初始化占用唯一的打开配额，替换路径的会话打开全部失败
    factory.limit_successful_opens(1);
    orchestrator.run().await.unwrap();

    let finished = service.get(&campaign.id).await.unwrap();
    assert_eq!(finished.status, CampaignStatus::Failed);
}

#[tokio::test]
async fn test_cancellation_and_resume() {
    let db = setup_db().await;
    let bus = Arc::new(EventBus::new());
    let factory =
        Arc::new(MockDriverFactory::new().with_latency(Duration::from_millis(200)));
    let settings = test_settings();
    let cities: Vec<(i64, &str)> = vec![
        (1, "CityA"),
        (2, "CityB"),
        (3, "CityC"),
        (4, "CityD"),
        (5, "CityE"),
        (6, "CityF"),
        (7, "CityG"),
        (8, "CityH"),
        (9, "CityI"),
        (10, "CityJ"),
    ];
    let geonames = StaticGeonames::with_cities(cities);

    let service = build_service(db.clone(), bus.clone(), factory.clone(), geonames, settings.clone());
    let campaign = service.create(request("restaurants", 3)).await.unwrap();
    assert_eq!(campaign.total_tasks, 10);

    let orchestrator = ExtractionOrchestrator::new(
        db.clone(),
        bus.clone(),
        factory,
        settings.clone(),
        campaign.id.clone(),
    );

    // 第一个任务完成后发出取消
    let cancel = orchestrator.cancel_token().clone();
    bus.subscribe(
        EventKind::TaskCompleted,
        Arc::new(move |_event| {
            let cancel = cancel.clone();
            Box::pin(async move {
                cancel.cancel();
                Ok(())
            })
        }),
    );

    let runner = orchestrator.clone();
    let handle = tokio::spawn(async move { runner.run().await });
    tokio::time::timeout(Duration::from_secs(30), handle)
        .await
        .expect("run must exit within the grace window")
        .unwrap()
        .unwrap();

    // 取消后活动保持进行中，任务不会全部完成
    let after_cancel = service.get(&campaign.id).await.unwrap();
    assert_eq!(after_cancel.status, CampaignStatus::InProgress);
    let tasks = TaskRepository::new(db.as_ref())
        .list_of(campaign.id.as_str())
        .await
        .unwrap();
    let completed = tasks.iter().filter(|t| t.status == TaskStatus::Completed).count();
    assert!(completed >= 1);
    assert!(completed < 10, "cancellation must leave work undone");

    // 恢复：进行中任务对账为待处理，剩余任务全部完成
    service.resume(&campaign.id).await.unwrap();
    assert!(
        helpers::wait_for_status(&service, &campaign.id, CampaignStatus::Completed, Duration::from_secs(30))
            .await,
        "resume must complete the remainder"
    );

    let tasks = TaskRepository::new(db.as_ref())
        .list_of(campaign.id.as_str())
        .await
        .unwrap();
    assert!(tasks.iter().all(|t| t.status == TaskStatus::Completed));
}
