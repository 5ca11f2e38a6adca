// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::domain::models::geoname::Geoname;
use crate::infrastructure::geonames::client::GeonamesError;

/// 城市查询端口
///
/// 地理范围解析对外部地名服务的依赖
#[async_trait]
pub trait GeonameQuery: Send + Sync {
    /// 按国家与行政区过滤城市
    async fn cities(
        &self,
        country_code: &str,
        admin1_code: Option<&str>,
        admin2_code: Option<&str>,
        min_population: i64,
    ) -> Result<Vec<Geoname>, GeonamesError>;
}

/// 地理范围选择参数
///
/// 范围由已填充的字段推导：
/// 仅 country_code → 全国城市；+admin1_code → 该区域内城市；
/// +admin2_code → 该省内城市；+city_geoname_id → 仅该城市
#[derive(Debug, Clone)]
pub struct GeonameSelectionParams {
    pub country_code: String,
    pub admin1_code: Option<String>,
    pub admin2_code: Option<String>,
    pub city_geoname_id: Option<i64>,
    pub min_population: i64,
}

/// 地理范围解析服务
///
/// 将活动的范围参数展开为具体的城市列表
pub struct GeonameSelectionService {
    query: Arc<dyn GeonameQuery>,
}

impl GeonameSelectionService {
    /// 创建新的解析服务
    pub fn new(query: Arc<dyn GeonameQuery>) -> Self {
        Self { query }
    }

    /// 解析范围为城市列表
    ///
    /// 城市按人口过滤；指定了城市ID时结果收敛到该城市
    pub async fn resolve(
        &self,
        params: &GeonameSelectionParams,
    ) -> Result<Vec<Geoname>, GeonamesError> {
        let cities = self
            .query
            .cities(
                &params.country_code,
                params.admin1_code.as_deref(),
                params.admin2_code.as_deref(),
                params.min_population,
            )
            .await?;

        let resolved: Vec<Geoname> = match params.city_geoname_id {
            Some(target) => cities
                .into_iter()
                .filter(|city| city.geoname_id == target)
                .collect(),
            None => cities,
        };

        debug!(
            country = %params.country_code,
            cities = resolved.len(),
            "geographic scope resolved"
        );
        Ok(resolved)
    }
}
