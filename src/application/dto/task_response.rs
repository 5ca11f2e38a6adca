// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

use crate::application::dto::format_timestamp;
use crate::domain::models::task::PlaceExtractionTask;

/// 任务详情响应
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskResponse {
    /// 任务ID
    pub task_id: String,
    /// 所属活动ID
    pub campaign_id: String,
    /// 目标城市的地名ID
    pub geoname_id: i64,
    /// 目标城市名称
    pub geoname_name: String,
    /// 搜索种子
    pub search_seed: String,
    /// 状态
    pub status: String,
    /// 已尝试次数
    pub attempts: i32,
    /// 最近一次错误
    pub last_error: Option<String>,
    /// 开始执行时间
    pub started_at: Option<String>,
    /// 完成时间
    pub completed_at: Option<String>,
}

impl From<&PlaceExtractionTask> for TaskResponse {
    fn from(task: &PlaceExtractionTask) -> Self {
        Self {
            task_id: task.id.to_string(),
            campaign_id: task.campaign_id.to_string(),
            geoname_id: task.geoname_id,
            geoname_name: task.geoname_name.clone(),
            search_seed: task.search_seed.clone(),
            status: task.status.to_string(),
            attempts: task.attempts,
            last_error: task.last_error.clone(),
            started_at: task.started_at.map(format_timestamp),
            completed_at: task.completed_at.map(format_timestamp),
        }
    }
}
