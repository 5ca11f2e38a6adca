// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

use crate::domain::models::ids::{BotId, CampaignId, PlaceId, TaskId};

/// 领域事件
///
/// 封闭的事件变体集合。事件只携带标识符和必要数据，
/// 实体不持有对总线或会话的反向引用。
#[derive(Debug, Clone)]
pub enum DomainEvent {
    /// 机器人初始化完成
    BotInitialized {
        campaign_id: CampaignId,
        bot_id: BotId,
        occurred_at: DateTime<Utc>,
    },
    /// 任务已分配给机器人
    BotTaskAssigned {
        campaign_id: CampaignId,
        bot_id: BotId,
        task_id: TaskId,
        occurred_at: DateTime<Utc>,
    },
    /// 机器人截图已捕获
    BotSnapshotCaptured {
        campaign_id: CampaignId,
        bot_id: BotId,
        task_id: TaskId,
        /// 原始PNG字节；编码为base64是表示层的职责
        screenshot: Arc<Vec<u8>>,
        current_url: String,
        occurred_at: DateTime<Utc>,
    },
    /// 机器人完成了其任务处理
    BotTaskCompleted {
        campaign_id: CampaignId,
        bot_id: BotId,
        task_id: TaskId,
        occurred_at: DateTime<Utc>,
    },
    /// 机器人发生错误
    BotError {
        campaign_id: CampaignId,
        bot_id: BotId,
        error: String,
        occurred_at: DateTime<Utc>,
    },
    /// 机器人已关闭
    BotClosed {
        campaign_id: CampaignId,
        bot_id: BotId,
        occurred_at: DateTime<Utc>,
    },
    /// 任务开始执行
    TaskStarted {
        campaign_id: CampaignId,
        task_id: TaskId,
        search_seed: String,
        location: String,
        occurred_at: DateTime<Utc>,
    },
    /// 成功提取一个地点
    PlaceExtracted {
        campaign_id: CampaignId,
        task_id: TaskId,
        place_id: PlaceId,
        place_name: String,
        /// 当前任务已提取的地点数
        current_progress: u32,
        occurred_at: DateTime<Utc>,
    },
    /// 任务成功完成
    TaskCompleted {
        campaign_id: CampaignId,
        task_id: TaskId,
        total_places_extracted: u32,
        duration_seconds: Option<f64>,
        occurred_at: DateTime<Utc>,
    },
    /// 任务失败
    TaskFailed {
        campaign_id: CampaignId,
        task_id: TaskId,
        error: String,
        occurred_at: DateTime<Utc>,
    },
}

/// 事件种类
///
/// 订阅表以种类为键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    BotInitialized,
    BotTaskAssigned,
    BotSnapshotCaptured,
    BotTaskCompleted,
    BotError,
    BotClosed,
    TaskStarted,
    PlaceExtracted,
    TaskCompleted,
    TaskFailed,
}

impl EventKind {
    /// 全部事件种类
    pub const ALL: [EventKind; 10] = [
        EventKind::BotInitialized,
        EventKind::BotTaskAssigned,
        EventKind::BotSnapshotCaptured,
        EventKind::BotTaskCompleted,
        EventKind::BotError,
        EventKind::BotClosed,
        EventKind::TaskStarted,
        EventKind::PlaceExtracted,
        EventKind::TaskCompleted,
        EventKind::TaskFailed,
    ];
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            EventKind::BotInitialized => "bot_initialized",
            EventKind::BotTaskAssigned => "bot_task_assigned",
            EventKind::BotSnapshotCaptured => "bot_snapshot_captured",
            EventKind::BotTaskCompleted => "bot_task_completed",
            EventKind::BotError => "bot_error",
            EventKind::BotClosed => "bot_closed",
            EventKind::TaskStarted => "task_started",
            EventKind::PlaceExtracted => "place_extracted",
            EventKind::TaskCompleted => "task_completed",
            EventKind::TaskFailed => "task_failed",
        };
        write!(f, "{}", name)
    }
}

impl DomainEvent {
    /// 事件种类
    pub fn kind(&self) -> EventKind {
        match self {
            DomainEvent::BotInitialized { .. } => EventKind::BotInitialized,
            DomainEvent::BotTaskAssigned { .. } => EventKind::BotTaskAssigned,
            DomainEvent::BotSnapshotCaptured { .. } => EventKind::BotSnapshotCaptured,
            DomainEvent::BotTaskCompleted { .. } => EventKind::BotTaskCompleted,
            DomainEvent::BotError { .. } => EventKind::BotError,
            DomainEvent::BotClosed { .. } => EventKind::BotClosed,
            DomainEvent::TaskStarted { .. } => EventKind::TaskStarted,
            DomainEvent::PlaceExtracted { .. } => EventKind::PlaceExtracted,
            DomainEvent::TaskCompleted { .. } => EventKind::TaskCompleted,
            DomainEvent::TaskFailed { .. } => EventKind::TaskFailed,
        }
    }

    /// 事件所属活动
    pub fn campaign_id(&self) -> &CampaignId {
        match self {
            DomainEvent::BotInitialized { campaign_id, .. }
            | DomainEvent::BotTaskAssigned { campaign_id, .. }
            | DomainEvent::BotSnapshotCaptured { campaign_id, .. }
            | DomainEvent::BotTaskCompleted { campaign_id, .. }
            | DomainEvent::BotError { campaign_id, .. }
            | DomainEvent::BotClosed { campaign_id, .. }
            | DomainEvent::TaskStarted { campaign_id, .. }
            | DomainEvent::PlaceExtracted { campaign_id, .. }
            | DomainEvent::TaskCompleted { campaign_id, .. }
            | DomainEvent::TaskFailed { campaign_id, .. } => campaign_id,
        }
    }

    /// 事件发生时间
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DomainEvent::BotInitialized { occurred_at, .. }
            | DomainEvent::BotTaskAssigned { occurred_at, .. }
            | DomainEvent::BotSnapshotCaptured { occurred_at, .. }
            | DomainEvent::BotTaskCompleted { occurred_at, .. }
            | DomainEvent::BotError { occurred_at, .. }
            | DomainEvent::BotClosed { occurred_at, .. }
            | DomainEvent::TaskStarted { occurred_at, .. }
            | DomainEvent::PlaceExtracted { occurred_at, .. }
            | DomainEvent::TaskCompleted { occurred_at, .. }
            | DomainEvent::TaskFailed { occurred_at, .. } => *occurred_at,
        }
    }
}
