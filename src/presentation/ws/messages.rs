// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! WebSocket协议信封与领域事件映射
//!
//! 每个事件变体都有显式的线上映射：二进制截图编码为base64，
//! 时间戳为固定ISO文本格式，枚举为字符串名称。

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::application::dto::format_timestamp;
use crate::domain::events::DomainEvent;

/// 客户端入站消息
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// 变更类命令
    Command {
        #[serde(default)]
        command: String,
        #[serde(default)]
        data: Value,
    },
    /// 只读查询
    Query {
        #[serde(default)]
        query: String,
        #[serde(default)]
        data: Value,
    },
    /// 订阅活动的事件流
    Subscribe {
        #[serde(default)]
        data: Value,
    },
    /// 订阅并立即开始提取（兼容旧客户端）
    AutoStart {
        #[serde(default)]
        data: Value,
    },
}

/// 命令结果信封
pub fn command_result(success: bool, payload: Value) -> Value {
    if success {
        json!({ "type": "command_result", "success": true, "data": payload })
    } else {
        json!({ "type": "command_result", "success": false, "error": payload })
    }
}

/// 查询结果信封
pub fn query_result(success: bool, payload: Value) -> Value {
    if success {
        json!({ "type": "query_result", "success": true, "data": payload })
    } else {
        json!({ "type": "query_result", "success": false, "error": payload })
    }
}

/// 事件流开始确认
pub fn stream_started(campaign_id: &str) -> Value {
    json!({
        "type": "stream_started",
        "message": "Event streaming active",
        "campaign_id": campaign_id,
    })
}

/// 协议错误信封
pub fn protocol_error(message: &str) -> Value {
    json!({ "type": "error", "message": message })
}

/// 领域事件转线上信封
///
/// 映射为按变体显式展开的switch；网关分发即以变体标签分派
pub fn event_to_wire(event: &DomainEvent) -> Value {
    match event {
        DomainEvent::BotInitialized {
            bot_id,
            occurred_at,
            ..
        } => json!({
            "type": "bot_status",
            "data": {
                "bot_id": bot_id.to_string(),
                "status": "ready",
                "message": "Bot initialized",
                "timestamp": format_timestamp(*occurred_at),
            }
        }),
        DomainEvent::BotTaskAssigned {
            bot_id,
            task_id,
            occurred_at,
            ..
        } => json!({
            "type": "bot_status",
            "data": {
                "bot_id": bot_id.to_string(),
                "status": "processing",
                "task_id": task_id.to_string(),
                "message": "Task assigned",
                "timestamp": format_timestamp(*occurred_at),
            }
        }),
        DomainEvent::BotSnapshotCaptured {
            bot_id,
            task_id,
            screenshot,
            current_url,
            occurred_at,
            ..
        } => json!({
            "type": "bot_snapshot",
            "data": {
                "bot_id": bot_id.to_string(),
                "task_id": task_id.to_string(),
                "screenshot": BASE64.encode(screenshot.as_slice()),
                "current_url": current_url,
                "timestamp": format_timestamp(*occurred_at),
            }
        }),
        DomainEvent::BotTaskCompleted {
            bot_id,
            task_id,
            occurred_at,
            ..
        } => json!({
            "type": "bot_status",
            "data": {
                "bot_id": bot_id.to_string(),
                "status": "ready",
                "task_id": task_id.to_string(),
                "message": "Task completed",
                "timestamp": format_timestamp(*occurred_at),
            }
        }),
        DomainEvent::BotError {
            bot_id,
            error,
            occurred_at,
            ..
        } => json!({
            "type": "bot_error",
            "data": {
                "bot_id": bot_id.to_string(),
                "error": error,
                "timestamp": format_timestamp(*occurred_at),
            }
        }),
        DomainEvent::BotClosed {
            bot_id,
            occurred_at,
            ..
        } => json!({
            "type": "bot_status",
            "data": {
                "bot_id": bot_id.to_string(),
                "status": "closed",
                "timestamp": format_timestamp(*occurred_at),
            }
        }),
        DomainEvent::TaskStarted {
            task_id,
            search_seed,
            location,
            occurred_at,
            ..
        } => json!({
            "type": "task_status",
            "data": {
                "task_id": task_id.to_string(),
                "status": "in_progress",
                "search_seed": search_seed,
                "location": location,
                "timestamp": format_timestamp(*occurred_at),
            }
        }),
        DomainEvent::PlaceExtracted {
            task_id,
            place_id,
            place_name,
            current_progress,
            occurred_at,
            ..
        } => json!({
            "type": "place_extracted",
            "data": {
                "task_id": task_id.to_string(),
                "place_id": place_id.to_string(),
                "place_name": place_name,
                "current_progress": current_progress,
                "timestamp": format_timestamp(*occurred_at),
            }
        }),
        DomainEvent::TaskCompleted {
            task_id,
            total_places_extracted,
            duration_seconds,
            occurred_at,
            ..
        } => json!({
            "type": "task_status",
            "data": {
                "task_id": task_id.to_string(),
                "status": "completed",
                "total_places_extracted": total_places_extracted,
                "duration_seconds": duration_seconds,
                "timestamp": format_timestamp(*occurred_at),
            }
        }),
        DomainEvent::TaskFailed {
            task_id,
            error,
            occurred_at,
            ..
        } => json!({
            "type": "task_status",
            "data": {
                "task_id": task_id.to_string(),
                "status": "failed",
                "error": error,
                "timestamp": format_timestamp(*occurred_at),
            }
        }),
    }
}

/// 事件是否为快照
///
/// 出站缓冲满时快照最先被丢弃（保留每个机器人的最新一张）
pub fn is_snapshot(event: &DomainEvent) -> bool {
    matches!(event, DomainEvent::BotSnapshotCaptured { .. })
}
