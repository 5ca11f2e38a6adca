// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

use crate::application::dto::{format_timestamp, parse_timestamp};
use crate::domain::models::place::{ExtractedPlace, ExtractedPlaceReview};

/// 地点详情响应
///
/// 领域↔线上的双向映射：二进制与时间均为文本，枚举为字符串
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceResponse {
    /// 地点ID
    pub place_id: String,
    /// 去重指纹
    pub fingerprint: String,
    /// 来源任务ID
    pub source_task_id: String,
    /// 所属活动ID
    pub campaign_id: String,
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
    pub extracted_at: String,
    /// 评论
    #[serde(default)]
    pub reviews: Vec<ReviewResponse>,
}

/// 评论详情响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewResponse {
    /// 评论ID
    pub review_id: String,
    /// 作者
    pub author: String,
    /// 评分
    pub rating: Option<f64>,
    /// 评论内容
    pub text: Option<String>,
    /// 发布时间
    pub posted_at: Option<String>,
}

/// 领域地点转线上表示
pub fn place_to_wire(place: &ExtractedPlace) -> PlaceResponse {
    PlaceResponse {
        place_id: place.id.to_string(),
        fingerprint: place.fingerprint.clone(),
        source_task_id: place.source_task_id.to_string(),
        campaign_id: place.campaign_id.to_string(),
        name: place.name.clone(),
        address: place.address.clone(),
        city: place.city.clone(),
        category: place.category.clone(),
        rating: place.rating,
        review_count: place.review_count,
        phone: place.phone.clone(),
        website: place.website.clone(),
        latitude: place.latitude,
        longitude: place.longitude,
        extracted_at: format_timestamp(place.extracted_at),
        reviews: place
            .reviews
            .iter()
            .map(|review| ReviewResponse {
                review_id: review.id.to_string(),
                author: review.author.clone(),
                rating: review.rating,
                text: review.text.clone(),
                posted_at: review.posted_at.map(format_timestamp),
            })
            .collect(),
    }
}

/// 线上表示转领域地点
///
/// 标识符或时间戳无法解析时返回None
pub fn place_from_wire(wire: &PlaceResponse) -> Option<ExtractedPlace> {
    let place_id = wire.place_id.parse().ok()?;
    let reviews = wire
        .reviews
        .iter()
        .map(|review| {
            Some(ExtractedPlaceReview {
                id: review.review_id.parse().ok()?,
                place_id: wire.place_id.parse().ok()?,
                author: review.author.clone(),
                rating: review.rating,
                text: review.text.clone(),
                posted_at: match &review.posted_at {
                    Some(at) => Some(parse_timestamp(at)?),
                    None => None,
                },
            })
        })
        .collect::<Option<Vec<_>>>()?;

    Some(ExtractedPlace {
        id: place_id,
        fingerprint: wire.fingerprint.clone(),
        source_task_id: wire.source_task_id.parse().ok()?,
        campaign_id: wire.campaign_id.parse().ok()?,
        name: wire.name.clone(),
        address: wire.address.clone(),
        city: wire.city.clone(),
        category: wire.category.clone(),
        rating: wire.rating,
        review_count: wire.review_count,
        phone: wire.phone.clone(),
        website: wire.website.clone(),
        latitude: wire.latitude,
        longitude: wire.longitude,
        extracted_at: parse_timestamp(&wire.extracted_at)?,
        reviews,
    })
}
