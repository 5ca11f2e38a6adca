// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};

use crate::infrastructure::repositories::campaign_repo::CampaignRepository;
use crate::infrastructure::repositories::place_repo::PlaceRepository;
use crate::infrastructure::repositories::task_repo::TaskRepository;
use crate::infrastructure::repositories::RepositoryError;

/// 工作单元
///
/// 数据库事务的作用域持有者，暴露绑定到该事务的聚合仓库。
/// `commit` 消耗实例提交事务；未提交即丢弃时事务自动回滚。
/// 所有写入都必须经过工作单元。
pub struct UnitOfWork {
    txn: DatabaseTransaction,
}

impl UnitOfWork {
    /// 开启新的工作单元
    pub async fn begin(db: &DatabaseConnection) -> Result<Self, RepositoryError> {
        Ok(Self {
            txn: db.begin().await?,
        })
    }

    /// 活动仓库
    pub fn campaigns(&self) -> CampaignRepository<'_, DatabaseTransaction> {
        CampaignRepository::new(&self.txn)
    }

    /// 任务仓库
    pub fn tasks(&self) -> TaskRepository<'_, DatabaseTransaction> {
        TaskRepository::new(&self.txn)
    }

    /// 地点仓库
    pub fn places(&self) -> PlaceRepository<'_, DatabaseTransaction> {
        PlaceRepository::new(&self.txn)
    }

    /// 提交事务
    pub async fn commit(self) -> Result<(), RepositoryError> {
        self.txn.commit().await?;
        Ok(())
    }

    /// 显式回滚事务
    pub async fn rollback(self) -> Result<(), RepositoryError> {
        self.txn.rollback().await?;
        Ok(())
    }
}
