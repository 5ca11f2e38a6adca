// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::domain::models::place::{ExtractedPlace, ExtractedPlaceReview};
use crate::infrastructure::database::entities::extracted_place as place_entity;
use crate::infrastructure::database::entities::extracted_place_review as review_entity;
use crate::infrastructure::repositories::RepositoryError;

/// 地点仓库
///
/// 基于SeaORM的已提取地点数据访问层。
/// 写入按指纹折叠重复记录。
pub struct PlaceRepository<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl TryFrom<place_entity::Model> for ExtractedPlace {
    type Error = RepositoryError;

    fn try_from(model: place_entity::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model
                .id
                .parse()
                .map_err(|_| RepositoryError::Corrupted(format!("place id {}", model.id)))?,
            source_task_id: model.source_task_id.parse().map_err(|_| {
                RepositoryError::Corrupted(format!("place task id {}", model.source_task_id))
            })?,
            campaign_id: model.campaign_id.parse().map_err(|_| {
                RepositoryError::Corrupted(format!("place campaign id {}", model.campaign_id))
            })?,
            fingerprint: model.fingerprint,
            name: model.name,
            address: model.address,
            city: model.city,
            category: model.category,
            rating: model.rating,
            review_count: model.review_count,
            phone: model.phone,
            website: model.website,
            latitude: model.latitude,
            longitude: model.longitude,
            extracted_at: model.extracted_at,
            reviews: Vec::new(),
        })
    }
}

impl TryFrom<review_entity::Model> for ExtractedPlaceReview {
    type Error = RepositoryError;

    fn try_from(model: review_entity::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model
                .id
                .parse()
                .map_err(|_| RepositoryError::Corrupted(format!("review id {}", model.id)))?,
            place_id: model.place_id.parse().map_err(|_| {
                RepositoryError::Corrupted(format!("review place id {}", model.place_id))
            })?,
            author: model.author,
            rating: model.rating,
            text: model.text,
            posted_at: model.posted_at,
        })
    }
}

impl From<&ExtractedPlace> for place_entity::ActiveModel {
    fn from(place: &ExtractedPlace) -> Self {
        Self {
            id: Set(place.id.to_string()),
            fingerprint: Set(place.fingerprint.clone()),
            source_task_id: Set(place.source_task_id.to_string()),
            campaign_id: Set(place.campaign_id.to_string()),
            name: Set(place.name.clone()),
            address: Set(place.address.clone()),
            city: Set(place.city.clone()),
            category: Set(place.category.clone()),
            rating: Set(place.rating),
            review_count: Set(place.review_count),
            phone: Set(place.phone.clone()),
            website: Set(place.website.clone()),
            latitude: Set(place.latitude),
            longitude: Set(place.longitude),
            extracted_at: Set(place.extracted_at),
        }
    }
}

impl<'a, C: ConnectionTrait> PlaceRepository<'a, C> {
    /// 创建新的地点仓库实例
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// 按指纹折叠写入
    ///
    /// # 返回值
    ///
    /// * `Ok(true)` - 新记录已插入（评论一并写入）
    /// * `Ok(false)` - 指纹已存在，写入被折叠
    pub async fn upsert(&self, place: &ExtractedPlace) -> Result<bool, RepositoryError> {
        let existing = place_entity::Entity::find()
            .filter(place_entity::Column::Fingerprint.eq(place.fingerprint.clone()))
            .one(self.conn)
            .await?;

        if existing.is_some() {
            return Ok(false);
        }

        let model: place_entity::ActiveModel = place.into();
        model.insert(self.conn).await?;

        for review in &place.reviews {
            let review_model = review_entity::ActiveModel {
                id: Set(review.id.to_string()),
                place_id: Set(review.place_id.to_string()),
                author: Set(review.author.clone()),
                rating: Set(review.rating),
                text: Set(review.text.clone()),
                posted_at: Set(review.posted_at),
            };
            review_model.insert(self.conn).await?;
        }

        Ok(true)
    }

    /// 根据ID查找地点（含评论）
    pub async fn get(&self, id: &str) -> Result<Option<ExtractedPlace>, RepositoryError> {
        let model = place_entity::Entity::find_by_id(id).one(self.conn).await?;
        match model {
            Some(model) => {
                let mut place: ExtractedPlace = model.try_into()?;
                place.reviews = self.reviews_of(&place.id.to_string()).await?;
                Ok(Some(place))
            }
            None => Ok(None),
        }
    }

    /// 列出活动的全部地点（含评论）
    pub async fn places_of(
        &self,
        campaign_id: &str,
    ) -> Result<Vec<ExtractedPlace>, RepositoryError> {
        let models = place_entity::Entity::find()
            .filter(place_entity::Column::CampaignId.eq(campaign_id))
            .order_by_asc(place_entity::Column::Id)
            .all(self.conn)
            .await?;

        let mut places = Vec::with_capacity(models.len());
        for model in models {
            let mut place: ExtractedPlace = model.try_into()?;
            place.reviews = self.reviews_of(&place.id.to_string()).await?;
            places.push(place);
        }
        Ok(places)
    }

    /// 统计活动的地点数量
    pub async fn count_of(&self, campaign_id: &str) -> Result<u64, RepositoryError> {
        let count = place_entity::Entity::find()
            .filter(place_entity::Column::CampaignId.eq(campaign_id))
            .count(self.conn)
            .await?;
        Ok(count)
    }

    async fn reviews_of(
        &self,
        place_id: &str,
    ) -> Result<Vec<ExtractedPlaceReview>, RepositoryError> {
        let models = review_entity::Entity::find()
            .filter(review_entity::Column::PlaceId.eq(place_id))
            .order_by_asc(review_entity::Column::Id)
            .all(self.conn)
            .await?;
        models.into_iter().map(TryInto::try_into).collect()
    }
}
