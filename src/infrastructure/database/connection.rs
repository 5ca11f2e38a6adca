// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::DatabaseSettings;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::time::Duration;

/// 从配置装配数据库连接池
///
/// 池参数全部来自 `DatabaseSettings`，未设置的项沿用驱动默认值
pub async fn create_pool(settings: &DatabaseSettings) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(settings.url.clone());
    options.sqlx_logging(settings.sqlx_logging);

    if let Some(max) = settings.max_connections {
        options.max_connections(max);
    }
    if let Some(min) = settings.min_connections {
        options.min_connections(min);
    }
    if let Some(secs) = settings.connect_timeout {
        let timeout = Duration::from_secs(secs);
        options.connect_timeout(timeout).acquire_timeout(timeout);
    }
    if let Some(secs) = settings.idle_timeout {
        options.idle_timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = settings.max_lifetime {
        options.max_lifetime(Duration::from_secs(secs));
    }

    Database::connect(options).await
}
