// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

use crate::application::dto::format_timestamp;
use crate::domain::models::campaign::Campaign;

/// 活动创建响应
#[derive(Debug, Serialize, Deserialize)]
pub struct CampaignCreatedResponse {
    /// 活动ID
    pub campaign_id: String,
    /// 标题
    pub title: String,
    /// 状态
    pub status: String,
    /// 总任务数
    pub total_tasks: i32,
    /// 创建时间
    pub created_at: String,
}

impl From<&Campaign> for CampaignCreatedResponse {
    fn from(campaign: &Campaign) -> Self {
        Self {
            campaign_id: campaign.id.to_string(),
            title: campaign.title.clone(),
            status: campaign.status.to_string(),
            total_tasks: campaign.total_tasks,
            created_at: format_timestamp(campaign.created_at),
        }
    }
}

/// 活动详情响应
#[derive(Debug, Serialize, Deserialize)]
pub struct CampaignResponse {
    /// 活动ID
    pub campaign_id: String,
    /// 标题
    pub title: String,
    /// 搜索活动
    pub activity: String,
    /// 状态
    pub status: String,
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
    /// 完成进度 (0-100)
    pub progress: f64,
    /// 创建时间
    pub created_at: String,
    /// 开始执行时间
    pub started_at: Option<String>,
    /// 完成时间
    pub completed_at: Option<String>,
}

impl From<&Campaign> for CampaignResponse {
    fn from(campaign: &Campaign) -> Self {
        Self {
            campaign_id: campaign.id.to_string(),
            title: campaign.title.clone(),
            activity: campaign.activity.clone(),
            status: campaign.status.to_string(),
            country_code: campaign.country_code.clone(),
            admin1_code: campaign.admin1_code.clone(),
            admin2_code: campaign.admin2_code.clone(),
            city_geoname_id: campaign.city_geoname_id,
            location_name: campaign.location_name.clone(),
            locale: campaign.locale.clone(),
            max_results: campaign.max_results,
            min_rating: campaign.min_rating,
            min_population: campaign.min_population,
            max_bots: campaign.max_bots,
            total_tasks: campaign.total_tasks,
            completed_tasks: campaign.completed_tasks,
            failed_tasks: campaign.failed_tasks,
            progress: campaign.progress() * 100.0,
            created_at: format_timestamp(campaign.created_at),
            started_at: campaign.started_at.map(format_timestamp),
            completed_at: campaign.completed_at.map(format_timestamp),
        }
    }
}
