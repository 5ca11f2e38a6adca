// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 仓库与工作单元行为测试

mod helpers;

use extractrs::domain::models::campaign::{Campaign, CampaignDraft};
use extractrs::domain::models::ids::CampaignId;
use extractrs::domain::models::place::ExtractedPlace;
use extractrs::domain::models::task::{PlaceExtractionTask, TaskStatus};
use extractrs::infrastructure::persistence::uow::UnitOfWork;
use extractrs::infrastructure::repositories::campaign_repo::CampaignRepository;
use extractrs::infrastructure::repositories::place_repo::PlaceRepository;
use extractrs::infrastructure::repositories::task_repo::TaskRepository;

use helpers::setup_db;

fn campaign() -> Campaign {
    Campaign::create(CampaignDraft {
        title: None,
        activity: "restaurants".to_string(),
        country_code: "ES".to_string(),
        admin1_code: Some("MD".to_string()),
        admin2_code: None,
        city_geoname_id: None,
        location_name: "Madrid, ES".to_string(),
        iso_language: None,
        locale: "es-ES".to_string(),
        max_results: 50,
        min_rating: 0.0,
        min_population: 15000,
        max_bots: 2,
    })
}

#[tokio::test]
async fn test_uncommitted_uow_rolls_back() {
    let db = setup_db().await;
    let sample = campaign();

    {
        let uow = UnitOfWork::begin(&db).await.unwrap();
        uow.campaigns().save(&sample).await.unwrap();
        // 不提交，事务随Drop回滚
    }

    let found = CampaignRepository::new(db.as_ref())
        .get(sample.id.as_str())
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn test_committed_uow_persists() {
    let db = setup_db().await;
    let sample = campaign();

    let uow = UnitOfWork::begin(&db).await.unwrap();
    uow.campaigns().save(&sample).await.unwrap();
    uow.commit().await.unwrap();

    let found = CampaignRepository::new(db.as_ref())
        .get(sample.id.as_str())
        .await
        .unwrap()
        .expect("committed campaign must be readable");
    assert_eq!(found.title, sample.title);
    assert_eq!(found.status, sample.status);
}

#[tokio::test]
async fn test_place_upsert_folds_duplicates_by_fingerprint() {
    let db = setup_db().await;
    let campaign_id = CampaignId::new();
    let task = PlaceExtractionTask::create(
        campaign_id.clone(),
        3117735,
        "Madrid".to_string(),
        "restaurants".to_string(),
    );

    let mut first = ExtractedPlace::new(
        task.id.clone(),
        campaign_id.clone(),
        "Casa Lucio".to_string(),
        "Calle Cava Baja 35".to_string(),
    );
    first.add_review("Ana".to_string(), Some(5.0), None, None);
    // 同一指纹的第二条记录（不同的地点ID）
    let duplicate = ExtractedPlace::new(
        task.id.clone(),
        campaign_id.clone(),
        "Casa Lucio".to_string(),
        "Calle Cava Baja 35".to_string(),
    );
    assert_eq!(first.fingerprint, duplicate.fingerprint);

    let uow = UnitOfWork::begin(&db).await.unwrap();
    assert!(uow.places().upsert(&first).await.unwrap());
    assert!(!uow.places().upsert(&duplicate).await.unwrap());
    uow.commit().await.unwrap();

    let places = PlaceRepository::new(db.as_ref())
        .places_of(campaign_id.as_str())
        .await
        .unwrap();
    assert_eq!(places.len(), 1);
    assert_eq!(places[0].name, "Casa Lucio");
    assert_eq!(places[0].reviews.len(), 1);
    assert_eq!(places[0].reviews[0].author, "Ana");
}

#[tokio::test]
async fn test_task_reconciliation_queries() {
    let db = setup_db().await;
    let sample = campaign();

    let mut in_progress = PlaceExtractionTask::create(
        sample.id.clone(),
        1,
        "Madrid".to_string(),
        "restaurants".to_string(),
    );
    in_progress.mark_in_progress().unwrap();

    let mut failed = PlaceExtractionTask::create(
        sample.id.clone(),
        2,
        "Alcala".to_string(),
        "restaurants".to_string(),
    );
    failed.mark_in_progress().unwrap();
    failed.record_attempt();
    failed.record_attempt();
    failed.mark_failed(Some("boom".to_string())).unwrap();

    let mut done = PlaceExtractionTask::create(
        sample.id.clone(),
        3,
        "Getafe".to_string(),
        "restaurants".to_string(),
    );
    done.mark_in_progress().unwrap();
    done.mark_completed().unwrap();

    let uow = UnitOfWork::begin(&db).await.unwrap();
    uow.campaigns().save(&sample).await.unwrap();
    uow.tasks()
        .insert_many(&[in_progress.clone(), failed.clone(), done.clone()])
        .await
        .unwrap();
    uow.commit().await.unwrap();

    let uow = UnitOfWork::begin(&db).await.unwrap();
    let reconciled = uow.tasks().reconcile_in_progress(sample.id.as_str()).await.unwrap();
    let reset = uow.tasks().reset_failed(sample.id.as_str()).await.unwrap();
    uow.commit().await.unwrap();

    assert_eq!(reconciled, 1);
    assert_eq!(reset, 1);

    let repo = TaskRepository::new(db.as_ref());
    let tasks = repo.list_of(sample.id.as_str()).await.unwrap();
    let completed: Vec<_> = tasks.iter().filter(|t| t.status == TaskStatus::Completed).collect();
    let pending: Vec<_> = tasks.iter().filter(|t| t.status == TaskStatus::Pending).collect();
    assert_eq!(completed.len(), 1, "completed tasks are never reconciled");
    assert_eq!(pending.len(), 2);

    let reset_task = tasks.iter().find(|t| t.id == failed.id).unwrap();
    assert_eq!(reset_task.attempts, 0, "reset clears the attempt counter");

    let pending_ids = repo.pending_ids_of(sample.id.as_str()).await.unwrap();
    assert_eq!(pending_ids.len(), 2);
}

#[tokio::test]
async fn test_counter_increments_are_atomic_updates() {
    let db = setup_db().await;
    let mut sample = campaign();
    sample.total_tasks = 3;

    let uow = UnitOfWork::begin(&db).await.unwrap();
    uow.campaigns().save(&sample).await.unwrap();
    uow.commit().await.unwrap();

    let uow = UnitOfWork::begin(&db).await.unwrap();
    uow.campaigns().increment_completed_tasks(sample.id.as_str()).await.unwrap();
    uow.campaigns().increment_completed_tasks(sample.id.as_str()).await.unwrap();
    uow.campaigns().increment_failed_tasks(sample.id.as_str()).await.unwrap();
    uow.commit().await.unwrap();

    let found = CampaignRepository::new(db.as_ref())
        .get(sample.id.as_str())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.completed_tasks, 2);
    assert_eq!(found.failed_tasks, 1);
    // 计数不变量
    assert!(found.completed_tasks + found.failed_tasks <= found.total_tasks);
}
