// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::models::ids::{CampaignId, PlaceId, ReviewId, TaskId};

/// 已提取地点聚合根
///
/// 表示从地图搜索结果解析出的一条商户记录。
/// 唯一性由 (source_task_id, name, address) 指纹决定，重复写入时折叠。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedPlace {
    /// 地点唯一标识符
    pub id: PlaceId,
    /// 去重指纹
    pub fingerprint: String,
    /// 来源任务ID
    pub source_task_id: TaskId,
    /// 所属活动ID
    pub campaign_id: CampaignId,
    /// 名称
    pub name: String,
    /// 地址
    pub address: String,
    /// 城市
    pub city: Option<String>,
    /// 类别
    pub category: Option<String>,
    /// 评分
    pub rating: Option<f64>,
    /// 评论数量
    pub review_count: Option<i32>,
    /// 电话
    pub phone: Option<String>,
    /// 网站
    pub website: Option<String>,
    /// 纬度
    pub latitude: Option<f64>,
    /// 经度
    pub longitude: Option<f64>,
    /// 提取时间
    pub extracted_at: DateTime<Utc>,
    /// 评论（聚合子实体）
    #[serde(default)]
    pub reviews: Vec<ExtractedPlaceReview>,
}

/// 地点评论子实体
///
/// 只能通过所属地点访问
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedPlaceReview {
    /// 评论唯一标识符
    pub id: ReviewId,
    /// 所属地点ID
    pub place_id: PlaceId,
    /// 作者
    pub author: String,
    /// 评分
    pub rating: Option<f64>,
    /// 评论内容
    pub text: Option<String>,
    /// 发布时间
    pub posted_at: Option<DateTime<Utc>>,
}

/// 计算地点去重指纹
///
/// SHA-256 十六进制摘要，输入为来源任务ID、名称和地址
pub fn place_fingerprint(source_task_id: &TaskId, name: &str, address: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_task_id.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(name.as_bytes());
    hasher.update(b"|");
    hasher.update(address.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl ExtractedPlace {
    /// 从解析记录创建地点
    pub fn new(
        source_task_id: TaskId,
        campaign_id: CampaignId,
        name: String,
        address: String,
    ) -> Self {
        let fingerprint = place_fingerprint(&source_task_id, &name, &address);
        Self {
            id: PlaceId::new(),
            fingerprint,
            source_task_id,
            campaign_id,
            name,
            address,
            city: None,
            category: None,
            rating: None,
            review_count: None,
            phone: None,
            website: None,
            latitude: None,
            longitude: None,
            extracted_at: Utc::now(),
            reviews: Vec::new(),
        }
    }

    /// 添加评论
    pub fn add_review(
        &mut self,
        author: String,
        rating: Option<f64>,
        text: Option<String>,
        posted_at: Option<DateTime<Utc>>,
    ) {
        self.reviews.push(ExtractedPlaceReview {
            id: ReviewId::new(),
            place_id: self.id.clone(),
            author,
            rating,
            text,
            posted_at,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_deterministic() {
        let task_id = TaskId::new();
        let a = place_fingerprint(&task_id, "Casa Lucio", "Calle Cava Baja 35");
        let b = place_fingerprint(&task_id, "Casa Lucio", "Calle Cava Baja 35");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_fingerprint_distinguishes_tasks() {
        let a = place_fingerprint(&TaskId::new(), "Casa Lucio", "Calle Cava Baja 35");
        let b = place_fingerprint(&TaskId::new(), "Casa Lucio", "Calle Cava Baja 35");
        assert_ne!(a, b);
    }

    #[test]
    fn test_reviews_belong_to_their_place() {
        let mut place = ExtractedPlace::new(
            TaskId::new(),
            CampaignId::new(),
            "Casa Lucio".to_string(),
            "Calle Cava Baja 35".to_string(),
        );
        place.add_review("Ana".to_string(), Some(5.0), Some("Great".to_string()), None);

        assert_eq!(place.reviews.len(), 1);
        assert_eq!(place.reviews[0].place_id, place.id);
    }
}
