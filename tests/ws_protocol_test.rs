// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! WebSocket协议与背压策略测试

mod helpers;

use chrono::Utc;
use std::sync::Arc;

use extractrs::bus::EventBus;
use extractrs::domain::events::DomainEvent;
use extractrs::domain::models::ids::{BotId, CampaignId, PlaceId, TaskId};
use extractrs::presentation::ws::event_stream;
use extractrs::presentation::ws::session::OutboundQueue;

fn task_started(campaign_id: &CampaignId) -> DomainEvent {
    DomainEvent::TaskStarted {
        campaign_id: campaign_id.clone(),
        task_id: TaskId::new(),
        search_seed: "restaurants".to_string(),
        location: "Madrid".to_string(),
        occurred_at: Utc::now(),
    }
}

fn snapshot(campaign_id: &CampaignId, bot_id: &BotId) -> DomainEvent {
    DomainEvent::BotSnapshotCaptured {
        campaign_id: campaign_id.clone(),
        bot_id: bot_id.clone(),
        task_id: TaskId::new(),
        screenshot: Arc::new(vec![1, 2, 3]),
        current_url: "https://maps.example.com".to_string(),
        occurred_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_snapshots_coalesce_to_latest_per_bot() {
    let (queue, _rx) = OutboundQueue::new(8);
    let campaign_id = CampaignId::new();
    let bot_a = BotId::new();
    let bot_b = BotId::new();

    // 快照洪峰不阻塞，也不占用普通缓冲
    for _ in 0..100 {
        queue.push_event(&snapshot(&campaign_id, &bot_a)).await.unwrap();
        queue.push_event(&snapshot(&campaign_id, &bot_b)).await.unwrap();
    }

    // 每个机器人只保留最新一张
    assert_eq!(queue.pending_snapshots(), 2);

    let mut drained = 0;
    while queue.pop_snapshot().is_some() {
        drained += 1;
    }
    assert_eq!(drained, 2);
}

#[tokio::test]
async fn test_ordinary_events_are_fifo_and_lossless() {
    let (queue, mut rx) = OutboundQueue::new(64);
    let campaign_id = CampaignId::new();
    let bot_id = BotId::new();

    // 慢消费者场景：20条任务事件与快照洪峰交错
    for i in 0..20 {
        queue.push_event(&task_started(&campaign_id)).await.unwrap();
        for _ in 0..10 {
            queue.push_event(&snapshot(&campaign_id, &bot_id)).await.unwrap();
        }
        let _ = i;
    }

    // 任务事件逐条保留且保持FIFO
    let mut task_events = 0;
    while let Ok(wire) = rx.try_recv() {
        assert_eq!(wire["type"], "task_status");
        task_events += 1;
    }
    assert_eq!(task_events, 20);

    // 快照被合并到至多一张（单机器人）
    assert!(queue.pending_snapshots() <= 1);
}

#[tokio::test]
async fn test_event_stream_filters_by_campaign() {
    let bus = Arc::new(EventBus::new());
    let (queue, mut rx) = OutboundQueue::new(16);
    let subscribed = CampaignId::new();
    let other = CampaignId::new();

    let handles = event_stream::bind(&bus, &subscribed, queue.clone());

    bus.publish(task_started(&subscribed)).await;
    bus.publish(task_started(&other)).await;
    bus.publish(DomainEvent::PlaceExtracted {
        campaign_id: subscribed.clone(),
        task_id: TaskId::new(),
        place_id: PlaceId::new(),
        place_name: "Casa Lucio".to_string(),
        current_progress: 1,
        occurred_at: Utc::now(),
    })
    .await;

    let mut received = Vec::new();
    while let Ok(wire) = rx.try_recv() {
        received.push(wire);
    }
    assert_eq!(received.len(), 2, "events of other campaigns must be filtered");
    assert_eq!(received[0]["type"], "task_status");
    assert_eq!(received[1]["type"], "place_extracted");

    for handle in handles {
        bus.unsubscribe(handle);
    }
    bus.publish(task_started(&subscribed)).await;
    assert!(rx.try_recv().is_err(), "unsubscribed session receives nothing");
}

#[tokio::test]
async fn test_closed_queue_rejects_messages() {
    let (queue, _rx) = OutboundQueue::new(4);
    queue.close();

    let campaign_id = CampaignId::new();
    assert!(queue.push_event(&task_started(&campaign_id)).await.is_err());
    assert!(queue.is_closed());
}
