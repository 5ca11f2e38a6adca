// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

use crate::domain::models::ids::TaskId;
use crate::domain::models::task::{PlaceExtractionTask, TaskStatus};
use crate::infrastructure::database::entities::place_extraction_task as task_entity;
use crate::infrastructure::repositories::RepositoryError;

/// 任务仓库
///
/// 基于SeaORM的提取任务数据访问层
pub struct TaskRepository<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl TryFrom<task_entity::Model> for PlaceExtractionTask {
    type Error = RepositoryError;

    fn try_from(model: task_entity::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model
                .id
                .parse()
                .map_err(|_| RepositoryError::Corrupted(format!("task id {}", model.id)))?,
            campaign_id: model.campaign_id.parse().map_err(|_| {
                RepositoryError::Corrupted(format!("task campaign id {}", model.campaign_id))
            })?,
            status: model
                .status
                .parse()
                .map_err(|_| RepositoryError::Corrupted(format!("task status {}", model.status)))?,
            geoname_id: model.geoname_id,
            geoname_name: model.geoname_name,
            search_seed: model.search_seed,
            attempts: model.attempts,
            last_error: model.last_error,
            created_at: model.created_at,
            started_at: model.started_at,
            completed_at: model.completed_at,
            updated_at: model.updated_at,
        })
    }
}

impl From<&PlaceExtractionTask> for task_entity::ActiveModel {
    fn from(task: &PlaceExtractionTask) -> Self {
        Self {
            id: Set(task.id.to_string()),
            campaign_id: Set(task.campaign_id.to_string()),
            geoname_id: Set(task.geoname_id),
            geoname_name: Set(task.geoname_name.clone()),
            search_seed: Set(task.search_seed.clone()),
            status: Set(task.status.to_string()),
            attempts: Set(task.attempts),
            last_error: Set(task.last_error.clone()),
            created_at: Set(task.created_at),
            started_at: Set(task.started_at),
            completed_at: Set(task.completed_at),
            updated_at: Set(task.updated_at),
        }
    }
}

impl<'a, C: ConnectionTrait> TaskRepository<'a, C> {
    /// 创建新的任务仓库实例
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// 根据ID查找任务
    pub async fn get(&self, id: &str) -> Result<Option<PlaceExtractionTask>, RepositoryError> {
        let model = task_entity::Entity::find_by_id(id).one(self.conn).await?;
        model.map(TryInto::try_into).transpose()
    }

    /// 保存任务（按ID插入或更新）
    pub async fn save(&self, task: &PlaceExtractionTask) -> Result<(), RepositoryError> {
        let exists = task_entity::Entity::find_by_id(task.id.to_string())
            .one(self.conn)
            .await?
            .is_some();

        let model: task_entity::ActiveModel = task.into();
        if exists {
            model.update(self.conn).await?;
        } else {
            model.insert(self.conn).await?;
        }
        Ok(())
    }

    /// 批量插入任务
    pub async fn insert_many(
        &self,
        tasks: &[PlaceExtractionTask],
    ) -> Result<(), RepositoryError> {
        if tasks.is_empty() {
            return Ok(());
        }
        let models: Vec<task_entity::ActiveModel> = tasks.iter().map(Into::into).collect();
        task_entity::Entity::insert_many(models).exec(self.conn).await?;
        Ok(())
    }

    /// 列出活动的全部任务（按创建顺序）
    pub async fn list_of(
        &self,
        campaign_id: &str,
    ) -> Result<Vec<PlaceExtractionTask>, RepositoryError> {
        let models = task_entity::Entity::find()
            .filter(task_entity::Column::CampaignId.eq(campaign_id))
            .order_by_asc(task_entity::Column::Id)
            .all(self.conn)
            .await?;
        models.into_iter().map(TryInto::try_into).collect()
    }

    /// 列出活动的待处理任务ID（按创建顺序）
    pub async fn pending_ids_of(&self, campaign_id: &str) -> Result<Vec<TaskId>, RepositoryError> {
        let ids: Vec<String> = task_entity::Entity::find()
            .select_only()
            .column(task_entity::Column::Id)
            .filter(task_entity::Column::CampaignId.eq(campaign_id))
            .filter(task_entity::Column::Status.eq(TaskStatus::Pending.to_string()))
            .order_by_asc(task_entity::Column::Id)
            .into_tuple()
            .all(self.conn)
            .await?;

        ids.into_iter()
            .map(|id| {
                id.parse()
                    .map_err(|_| RepositoryError::Corrupted(format!("task id {}", id)))
            })
            .collect()
    }

    /// 统计活动中指定状态的任务数
    pub async fn count_by_status(
        &self,
        campaign_id: &str,
        status: TaskStatus,
    ) -> Result<u64, RepositoryError> {
        let count = task_entity::Entity::find()
            .filter(task_entity::Column::CampaignId.eq(campaign_id))
            .filter(task_entity::Column::Status.eq(status.to_string()))
            .count(self.conn)
            .await?;
        Ok(count)
    }

    /// 将遗留的进行中任务对账为待处理
    ///
    /// 进行中状态绝不跨进程重启保留；恢复路径在重新执行前调用此方法
    pub async fn reconcile_in_progress(&self, campaign_id: &str) -> Result<u64, RepositoryError> {
        let result = task_entity::Entity::update_many()
            .col_expr(
                task_entity::Column::Status,
                Expr::value(TaskStatus::Pending.to_string()),
            )
            .filter(task_entity::Column::CampaignId.eq(campaign_id))
            .filter(task_entity::Column::Status.eq(TaskStatus::InProgress.to_string()))
            .exec(self.conn)
            .await?;
        Ok(result.rows_affected)
    }

    /// 将失败任务重置为待处理并清零尝试计数
    pub async fn reset_failed(&self, campaign_id: &str) -> Result<u64, RepositoryError> {
        let result = task_entity::Entity::update_many()
            .col_expr(
                task_entity::Column::Status,
                Expr::value(TaskStatus::Pending.to_string()),
            )
            .col_expr(task_entity::Column::Attempts, Expr::value(0))
            .filter(task_entity::Column::CampaignId.eq(campaign_id))
            .filter(task_entity::Column::Status.eq(TaskStatus::Failed.to_string()))
            .exec(self.conn)
            .await?;
        Ok(result.rows_affected)
    }
}
