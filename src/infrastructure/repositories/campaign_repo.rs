// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::domain::models::campaign::{Campaign, CampaignStatus};
use crate::infrastructure::database::entities::campaign as campaign_entity;
use crate::infrastructure::repositories::RepositoryError;

/// 活动仓库
///
/// 基于SeaORM的活动数据访问层；以任意连接（事务或连接池）为后端
pub struct CampaignRepository<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl TryFrom<campaign_entity::Model> for Campaign {
    type Error = RepositoryError;

    fn try_from(model: campaign_entity::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model
                .id
                .parse()
                .map_err(|_| RepositoryError::Corrupted(format!("campaign id {}", model.id)))?,
            status: model.status.parse().map_err(|_| {
                RepositoryError::Corrupted(format!("campaign status {}", model.status))
            })?,
            title: model.title,
            activity: model.activity,
            country_code: model.country_code,
            admin1_code: model.admin1_code,
            admin2_code: model.admin2_code,
            city_geoname_id: model.city_geoname_id,
            location_name: model.location_name,
            iso_language: model.iso_language,
            locale: model.locale,
            max_results: model.max_results,
            min_rating: model.min_rating,
            min_population: model.min_population,
            max_bots: model.max_bots,
            total_tasks: model.total_tasks,
            completed_tasks: model.completed_tasks,
            failed_tasks: model.failed_tasks,
            created_at: model.created_at,
            started_at: model.started_at,
            completed_at: model.completed_at,
            updated_at: model.updated_at,
        })
    }
}

impl From<&Campaign> for campaign_entity::ActiveModel {
    fn from(campaign: &Campaign) -> Self {
        Self {
            id: Set(campaign.id.to_string()),
            title: Set(campaign.title.clone()),
            activity: Set(campaign.activity.clone()),
            status: Set(campaign.status.to_string()),
            country_code: Set(campaign.country_code.clone()),
            admin1_code: Set(campaign.admin1_code.clone()),
            admin2_code: Set(campaign.admin2_code.clone()),
            city_geoname_id: Set(campaign.city_geoname_id),
            location_name: Set(campaign.location_name.clone()),
            iso_language: Set(campaign.iso_language.clone()),
            locale: Set(campaign.locale.clone()),
            max_results: Set(campaign.max_results),
            min_rating: Set(campaign.min_rating),
            min_population: Set(campaign.min_population),
            max_bots: Set(campaign.max_bots),
            total_tasks: Set(campaign.total_tasks),
            completed_tasks: Set(campaign.completed_tasks),
            failed_tasks: Set(campaign.failed_tasks),
            created_at: Set(campaign.created_at),
            started_at: Set(campaign.started_at),
            completed_at: Set(campaign.completed_at),
            updated_at: Set(campaign.updated_at),
        }
    }
}

impl<'a, C: ConnectionTrait> CampaignRepository<'a, C> {
    /// 创建新的活动仓库实例
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// 根据ID查找活动
    pub async fn get(&self, id: &str) -> Result<Option<Campaign>, RepositoryError> {
        let model = campaign_entity::Entity::find_by_id(id).one(self.conn).await?;
        model.map(TryInto::try_into).transpose()
    }

    /// 保存活动（按ID插入或更新）
    pub async fn save(&self, campaign: &Campaign) -> Result<(), RepositoryError> {
        let exists = campaign_entity::Entity::find_by_id(campaign.id.to_string())
            .one(self.conn)
            .await?
            .is_some();

        let model: campaign_entity::ActiveModel = campaign.into();
        if exists {
            model.update(self.conn).await?;
        } else {
            model.insert(self.conn).await?;
        }
        Ok(())
    }

    /// 列出全部活动（按创建时间逆序）
    pub async fn list(&self) -> Result<Vec<Campaign>, RepositoryError> {
        let models = campaign_entity::Entity::find()
            .order_by_desc(campaign_entity::Column::Id)
            .all(self.conn)
            .await?;
        models.into_iter().map(TryInto::try_into).collect()
    }

    /// 列出指定状态的活动
    pub async fn list_by_status(
        &self,
        status: CampaignStatus,
    ) -> Result<Vec<Campaign>, RepositoryError> {
        let models = campaign_entity::Entity::find()
            .filter(campaign_entity::Column::Status.eq(status.to_string()))
            .order_by_desc(campaign_entity::Column::Id)
            .all(self.conn)
            .await?;
        models.into_iter().map(TryInto::try_into).collect()
    }

    /// 原子递增已完成任务计数
    pub async fn increment_completed_tasks(&self, id: &str) -> Result<(), RepositoryError> {
        campaign_entity::Entity::update_many()
            .col_expr(
                campaign_entity::Column::CompletedTasks,
                Expr::col(campaign_entity::Column::CompletedTasks).add(1),
            )
            .filter(campaign_entity::Column::Id.eq(id))
            .exec(self.conn)
            .await?;
        Ok(())
    }

    /// 原子递增失败任务计数
    pub async fn increment_failed_tasks(&self, id: &str) -> Result<(), RepositoryError> {
        campaign_entity::Entity::update_many()
            .col_expr(
                campaign_entity::Column::FailedTasks,
                Expr::col(campaign_entity::Column::FailedTasks).add(1),
            )
            .filter(campaign_entity::Column::Id.eq(id))
            .exec(self.conn)
            .await?;
        Ok(())
    }
}
