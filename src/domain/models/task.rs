// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::models::ids::{CampaignId, TaskId};

/// 地点提取任务实体
///
/// 表示一个活动内针对单个城市的一次提取工作单元
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceExtractionTask {
    /// 任务唯一标识符
    pub id: TaskId,
    /// 所属活动ID
    pub campaign_id: CampaignId,
    /// 目标城市的地名ID
    pub geoname_id: i64,
    /// 目标城市名称
    pub geoname_name: String,
    /// 搜索种子（活动字符串）
    pub search_seed: String,
    /// 任务状态
    pub status: TaskStatus,
    /// 已尝试次数
    pub attempts: i32,
    /// 最近一次错误
    pub last_error: Option<String>,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 开始执行时间
    pub started_at: Option<DateTime<Utc>>,
    /// 完成时间
    pub completed_at: Option<DateTime<Utc>>,
    /// 更新时间
    pub updated_at: DateTime<Utc>,
}

/// 任务状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// 待处理
    #[default]
    Pending,
    /// 进行中
    InProgress,
    /// 已完成
    Completed,
    /// 已失败
    Failed,
    /// 已跳过
    Skipped,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Skipped => write!(f, "skipped"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "skipped" => Ok(TaskStatus::Skipped),
            _ => Err(()),
        }
    }
}

/// 任务领域错误
#[derive(Error, Debug)]
pub enum TaskError {
    /// 非法状态转换
    #[error("Illegal task transition from {0}: {1}")]
    InvalidTransition(TaskStatus, &'static str),
}

impl PlaceExtractionTask {
    /// 创建新的待处理任务
    pub fn create(
        campaign_id: CampaignId,
        geoname_id: i64,
        geoname_name: String,
        search_seed: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new(),
            campaign_id,
            geoname_id,
            geoname_name,
            search_seed,
            status: TaskStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        }
    }

    /// 任务显示标题
    pub fn title(&self) -> String {
        format!("{} {}", self.search_seed, self.geoname_name)
    }

    /// 启动任务
    pub fn mark_in_progress(&mut self) -> Result<(), TaskError> {
        match self.status {
            TaskStatus::Pending => {
                self.status = TaskStatus::InProgress;
                self.started_at = Some(Utc::now());
                self.touch();
                Ok(())
            }
            status => Err(TaskError::InvalidTransition(status, "mark_in_progress")),
        }
    }

    /// 完成任务
    pub fn mark_completed(&mut self) -> Result<(), TaskError> {
        match self.status {
            TaskStatus::InProgress => {
                self.status = TaskStatus::Completed;
                self.completed_at = Some(Utc::now());
                self.touch();
                Ok(())
            }
            status => Err(TaskError::InvalidTransition(status, "mark_completed")),
        }
    }

    /// 标记任务失败并记录错误
    pub fn mark_failed(&mut self, error: Option<String>) -> Result<(), TaskError> {
        match self.status {
            TaskStatus::InProgress => {
                self.status = TaskStatus::Failed;
                self.last_error = error;
                self.completed_at = Some(Utc::now());
                self.touch();
                Ok(())
            }
            status => Err(TaskError::InvalidTransition(status, "mark_failed")),
        }
    }

    /// 重置任务为待处理
    ///
    /// 用于瞬态失败后的重新入队以及恢复时的状态对账
    pub fn mark_pending(&mut self) -> Result<(), TaskError> {
        match self.status {
            TaskStatus::Completed => Err(TaskError::InvalidTransition(
                TaskStatus::Completed,
                "mark_pending",
            )),
            _ => {
                self.status = TaskStatus::Pending;
                self.touch();
                Ok(())
            }
        }
    }

    /// 记录一次尝试
    pub fn record_attempt(&mut self) {
        self.attempts += 1;
        self.touch();
    }

    /// 任务执行时长（秒）
    pub fn duration_seconds(&self) -> Option<f64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64 / 1000.0),
            _ => None,
        }
    }

    /// 判断任务是否可重试
    pub fn can_retry(&self, retry_budget: i32) -> bool {
        self.status == TaskStatus::Failed && self.attempts < retry_budget
    }

    /// 判断任务是否处于终态
    pub fn is_in_final_state(&self, retry_budget: i32) -> bool {
        matches!(self.status, TaskStatus::Completed | TaskStatus::Skipped)
            || (self.status == TaskStatus::Failed && self.attempts >= retry_budget)
    }

    /// 刷新更新时间
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
