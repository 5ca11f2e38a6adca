// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 查询处理器
//!
//! 只读操作，不触发领域事件，可与事件流并行

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use crate::application::services::campaign_service::CampaignService;
use crate::domain::models::ids::CampaignId;
use crate::presentation::ws::messages::query_result;

/// 分发查询
pub async fn handle(service: &Arc<CampaignService>, query: &str, data: &Value) -> Value {
    debug!(query, "websocket query received");
    match query {
        "get_status" => get_status(service, data).await,
        "get_statistics" => get_statistics(service, data).await,
        "get_bot_info" => get_bot_info(service),
        other => query_result(false, Value::String(format!("Unknown query: {}", other))),
    }
}

async fn get_status(service: &Arc<CampaignService>, data: &Value) -> Value {
    let Some(campaign_id) = campaign_id_of(data) else {
        return query_result(false, Value::String("campaign_id is required".to_string()));
    };

    match service.status_of(&campaign_id).await {
        Ok(view) => query_result(
            true,
            json!({
                "campaign_id": view.campaign.id.to_string(),
                "status": view.campaign.status.to_string(),
                "running": view.running,
                "total_tasks": view.campaign.total_tasks,
                "completed_tasks": view.campaign.completed_tasks,
                "failed_tasks": view.campaign.failed_tasks,
                "queued_tasks": view.queued_tasks,
                "progress": view.campaign.progress() * 100.0,
            }),
        ),
        Err(e) => query_result(false, Value::String(e.to_string())),
    }
}

async fn get_statistics(service: &Arc<CampaignService>, data: &Value) -> Value {
    let Some(campaign_id) = campaign_id_of(data) else {
        return query_result(false, Value::String("campaign_id is required".to_string()));
    };

    match service.statistics_of(&campaign_id).await {
        Ok(view) => query_result(
            true,
            json!({
                "campaign_id": view.campaign_id.to_string(),
                "total_places_extracted": view.total_places_extracted,
                "completed_tasks": view.completed_tasks,
                "failed_tasks": view.failed_tasks,
                "total_tasks": view.total_tasks,
                "average_task_seconds": view.average_task_seconds,
                "success_rate": view.success_rate,
            }),
        ),
        Err(e) => query_result(false, Value::String(e.to_string())),
    }
}

fn get_bot_info(service: &Arc<CampaignService>) -> Value {
    let bots: Vec<Value> = service
        .bot_info()
        .into_iter()
        .map(|bot| {
            json!({
                "campaign_id": bot.campaign_id.to_string(),
                "bot_id": bot.bot_id,
                "status": bot.state.to_string(),
            })
        })
        .collect();
    query_result(true, json!({ "bots": bots }))
}

fn campaign_id_of(data: &Value) -> Option<CampaignId> {
    data.get("campaign_id")
        .or_else(|| data.get("id"))
        .and_then(Value::as_str)
        .and_then(|raw| raw.parse().ok())
}
