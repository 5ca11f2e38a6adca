// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::models::ids::CampaignId;

/// 活动聚合根
///
/// 表示一次由用户定义的地点提取作业：一个搜索活动加一个地理范围
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    /// 活动唯一标识符
    pub id: CampaignId,
    /// 标题（未提供时自动生成）
    pub title: String,
    /// 搜索活动（如 "restaurants"）
    pub activity: String,
    /// 活动状态
    pub status: CampaignStatus,
    /// 国家代码
    pub country_code: String,
    /// 一级行政区代码
    pub admin1_code: Option<String>,
    /// 二级行政区代码
    pub admin2_code: Option<String>,
    /// 指定城市的地名ID
    pub city_geoname_id: Option<i64>,
    /// 地理范围显示快照
    pub location_name: String,
    /// ISO语言代码
    pub iso_language: Option<String>,
    /// 区域设置
    pub locale: String,
    /// 每个城市的最大结果数
    pub max_results: i32,
    /// 最低评分过滤
    pub min_rating: f64,
    /// 最低人口过滤
    pub min_population: i64,
    /// 机器人数量
    pub max_bots: i32,
    /// 总任务数
    pub total_tasks: i32,
    /// 已完成任务数
    pub completed_tasks: i32,
    /// 失败任务数
    pub failed_tasks: i32,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 开始执行时间
    pub started_at: Option<DateTime<Utc>>,
    /// 完成时间
    pub completed_at: Option<DateTime<Utc>>,
    /// 更新时间
    pub updated_at: DateTime<Utc>,
}

/// 活动状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    /// 待处理
    #[default]
    Pending,
    /// 进行中
    InProgress,
    /// 已完成
    Completed,
    /// 已失败
    Failed,
    /// 已归档
    Archived,
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CampaignStatus::Pending => write!(f, "pending"),
            CampaignStatus::InProgress => write!(f, "in_progress"),
            CampaignStatus::Completed => write!(f, "completed"),
            CampaignStatus::Failed => write!(f, "failed"),
            CampaignStatus::Archived => write!(f, "archived"),
        }
    }
}

impl FromStr for CampaignStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CampaignStatus::Pending),
            "in_progress" => Ok(CampaignStatus::InProgress),
            "completed" => Ok(CampaignStatus::Completed),
            "failed" => Ok(CampaignStatus::Failed),
            "archived" => Ok(CampaignStatus::Archived),
            _ => Err(()),
        }
    }
}

/// 活动领域错误
#[derive(Error, Debug)]
pub enum CampaignError {
    /// 非法状态转换
    #[error("Illegal campaign transition from {0}: {1}")]
    InvalidTransition(CampaignStatus, &'static str),
}

/// 新活动的创建参数
#[derive(Debug, Clone)]
pub struct CampaignDraft {
    pub title: Option<String>,
    pub activity: String,
    pub country_code: String,
    pub admin1_code: Option<String>,
    pub admin2_code: Option<String>,
    pub city_geoname_id: Option<i64>,
    pub location_name: String,
    pub iso_language: Option<String>,
    pub locale: String,
    pub max_results: i32,
    pub min_rating: f64,
    pub min_population: i64,
    pub max_bots: i32,
}

impl Campaign {
    /// 创建新的活动
    ///
    /// 未提供标题时根据活动与地理范围快照自动生成
    pub fn create(draft: CampaignDraft) -> Self {
        let now = Utc::now();
        let title = match draft.title {
            Some(t) if !t.trim().is_empty() => t,
            _ => {
                let mut seed: Vec<char> = draft.activity.chars().collect();
                if let Some(first) = seed.first_mut() {
                    *first = first.to_ascii_uppercase();
                }
                let seed: String = seed.into_iter().collect();
                format!(
                    "{} {} {}",
                    seed,
                    draft.location_name,
                    now.format("%Y-%m-%d %H:%M:%S")
                )
                .trim()
                .to_string()
            }
        };

        Self {
            id: CampaignId::new(),
            title,
            activity: draft.activity,
            status: CampaignStatus::Pending,
            country_code: draft.country_code,
            admin1_code: draft.admin1_code,
            admin2_code: draft.admin2_code,
            city_geoname_id: draft.city_geoname_id,
            location_name: draft.location_name,
            iso_language: draft.iso_language,
            locale: draft.locale,
            max_results: draft.max_results,
            min_rating: draft.min_rating,
            min_population: draft.min_population,
            max_bots: draft.max_bots,
            total_tasks: 0,
            completed_tasks: 0,
            failed_tasks: 0,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        }
    }

    /// 完成进度 (0.0 - 1.0)
    pub fn progress(&self) -> f64 {
        if self.total_tasks == 0 {
            return 0.0;
        }
        self.completed_tasks as f64 / self.total_tasks as f64
    }

    /// 启动活动
    ///
    /// 将状态变更为进行中并记录开始时间
    pub fn mark_in_progress(&mut self) -> Result<(), CampaignError> {
        match self.status {
            CampaignStatus::Pending | CampaignStatus::InProgress => {
                self.status = CampaignStatus::InProgress;
                if self.started_at.is_none() {
                    self.started_at = Some(Utc::now());
                }
                self.touch();
                Ok(())
            }
            status => Err(CampaignError::InvalidTransition(status, "mark_in_progress")),
        }
    }

    /// 标记活动完成
    pub fn mark_completed(&mut self) -> Result<(), CampaignError> {
        match self.status {
            CampaignStatus::InProgress => {
                self.status = CampaignStatus::Completed;
                self.completed_at = Some(Utc::now());
                self.touch();
                Ok(())
            }
            status => Err(CampaignError::InvalidTransition(status, "mark_completed")),
        }
    }

    /// 标记活动失败
    pub fn mark_failed(&mut self) -> Result<(), CampaignError> {
        match self.status {
            CampaignStatus::Completed | CampaignStatus::Archived => Err(
                CampaignError::InvalidTransition(self.status, "mark_failed"),
            ),
            _ => {
                self.status = CampaignStatus::Failed;
                self.completed_at = Some(Utc::now());
                self.touch();
                Ok(())
            }
        }
    }

    /// 恢复活动
    ///
    /// 将失败或中断的活动重置为待处理并清除失败计数
    pub fn resume(&mut self) -> Result<(), CampaignError> {
        match self.status {
            CampaignStatus::Failed | CampaignStatus::InProgress => {
                self.status = CampaignStatus::Pending;
                self.failed_tasks = 0;
                self.completed_at = None;
                self.touch();
                Ok(())
            }
            status => Err(CampaignError::InvalidTransition(status, "resume")),
        }
    }

    /// 归档活动
    ///
    /// 仅允许已完成或已失败的活动；重复归档为无操作
    pub fn mark_archived(&mut self) -> Result<(), CampaignError> {
        match self.status {
            CampaignStatus::Completed | CampaignStatus::Failed => {
                self.status = CampaignStatus::Archived;
                self.touch();
                Ok(())
            }
            CampaignStatus::Archived => Ok(()),
            status => Err(CampaignError::InvalidTransition(status, "mark_archived")),
        }
    }

    /// 判断活动是否可以启动
    pub fn can_be_started(&self) -> bool {
        self.status == CampaignStatus::Pending && self.total_tasks > 0
    }

    /// 判断活动是否已结束
    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            CampaignStatus::Completed | CampaignStatus::Failed | CampaignStatus::Archived
        )
    }

    /// 刷新更新时间
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> CampaignDraft {
        CampaignDraft {
            title: None,
            activity: "restaurants".to_string(),
            country_code: "ES".to_string(),
            admin1_code: Some("MD".to_string()),
            admin2_code: None,
            city_geoname_id: None,
            location_name: "Comunidad de Madrid, ES".to_string(),
            iso_language: Some("es".to_string()),
            locale: "es-ES".to_string(),
            max_results: 50,
            min_rating: 0.0,
            min_population: 15000,
            max_bots: 3,
        }
    }

    #[test]
    fn test_title_autogenerated_from_activity_and_location() {
        let campaign = Campaign::create(draft());
        assert!(campaign.title.starts_with("Restaurants Comunidad de Madrid, ES"));
        assert_eq!(campaign.status, CampaignStatus::Pending);
    }

    #[test]
    fn test_lifecycle_happy_path() {
        let mut campaign = Campaign::create(draft());
        campaign.total_tasks = 2;

        campaign.mark_in_progress().unwrap();
        assert_eq!(campaign.status, CampaignStatus::InProgress);
        assert!(campaign.started_at.is_some());

        campaign.mark_completed().unwrap();
        assert_eq!(campaign.status, CampaignStatus::Completed);
        assert!(campaign.completed_at.is_some());
    }

    #[test]
    fn test_cannot_complete_pending_campaign() {
        let mut campaign = Campaign::create(draft());
        assert!(campaign.mark_completed().is_err());
    }

    #[test]
    fn test_archive_requires_finished_state() {
        let mut campaign = Campaign::create(draft());
        assert!(campaign.mark_archived().is_err());

        campaign.mark_in_progress().unwrap();
        campaign.mark_failed().unwrap();
        campaign.mark_archived().unwrap();
        assert_eq!(campaign.status, CampaignStatus::Archived);

        // Repeated archive is a no-op success
        campaign.mark_archived().unwrap();
        assert_eq!(campaign.status, CampaignStatus::Archived);
    }

    #[test]
    fn test_resume_resets_failure_counters() {
        let mut campaign = Campaign::create(draft());
        campaign.mark_in_progress().unwrap();
        campaign.failed_tasks = 2;
        campaign.mark_failed().unwrap();

        campaign.resume().unwrap();
        assert_eq!(campaign.status, CampaignStatus::Pending);
        assert_eq!(campaign.failed_tasks, 0);
        assert!(campaign.completed_at.is_none());
    }

    #[test]
    fn test_progress_ratio() {
        let mut campaign = Campaign::create(draft());
        assert_eq!(campaign.progress(), 0.0);
        campaign.total_tasks = 4;
        campaign.completed_tasks = 1;
        assert_eq!(campaign.progress(), 0.25);
    }
}
