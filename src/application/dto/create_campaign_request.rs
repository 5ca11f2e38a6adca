// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// 创建活动请求数据传输对象
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateCampaignRequest {
    /// 搜索活动（如 "restaurants"）
    #[validate(length(min = 1, max = 120))]
    pub activity: String,
    /// 国家代码 (ISO 3166-1 alpha-2)
    #[validate(length(equal = 2))]
    pub country_code: String,
    /// 一级行政区代码
    pub admin1_code: Option<String>,
    /// 二级行政区代码
    pub admin2_code: Option<String>,
    /// 指定城市的地名ID
    pub city_geoname_id: Option<i64>,
    /// ISO语言代码
    pub iso_language: Option<String>,
    /// 地理范围显示快照
    #[validate(length(min = 1, max = 255))]
    pub location_name: String,
    /// 最低人口过滤
    #[validate(range(min = 0))]
    pub min_population: Option<i64>,
    /// 区域设置
    pub locale: Option<String>,
    /// 每个城市的最大结果数
    #[validate(range(min = 1, max = 500))]
    pub max_results: Option<i32>,
    /// 最低评分过滤
    #[validate(range(min = 0.0, max = 5.0))]
    pub min_rating: Option<f64>,
    /// 机器人数量
    #[validate(range(min = 1, max = 32))]
    pub max_bots: Option<i32>,
}
