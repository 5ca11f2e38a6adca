// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    extract::{Extension, Path, Query},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::application::dto::geoname_response::{CountryResponse, GeonameResponse};
use crate::infrastructure::geonames::client::{GeonamesClient, GeonamesError};
use crate::presentation::errors::ApiError;

#[derive(Debug, Deserialize)]
pub struct ProvincesQuery {
    pub admin1_code: String,
}

#[derive(Debug, Deserialize)]
pub struct CitiesQuery {
    pub admin1_code: Option<String>,
    pub admin2_code: Option<String>,
    pub min_population: Option<i64>,
}

/// 获取全部国家
pub async fn get_countries(
    Extension(client): Extension<Arc<GeonamesClient>>,
) -> Result<impl IntoResponse, ApiError> {
    let countries = client
        .countries()
        .await
        .map_err(upstream_error)?;
    let responses: Vec<CountryResponse> = countries.iter().map(Into::into).collect();
    Ok(Json(responses))
}

/// 获取国家的一级行政区
pub async fn get_regions(
    Extension(client): Extension<Arc<GeonamesClient>>,
    Path(country_code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let regions = client
        .regions(&country_code.to_uppercase())
        .await
        .map_err(upstream_error)?;
    let responses: Vec<GeonameResponse> = regions
        .iter()
        .map(|g| GeonameResponse::admin(g, 1))
        .collect();
    Ok(Json(responses))
}

/// 获取区域内的二级行政区
pub async fn get_provinces(
    Extension(client): Extension<Arc<GeonamesClient>>,
    Path(country_code): Path<String>,
    Query(query): Query<ProvincesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let provinces = client
        .provinces(&country_code.to_uppercase(), &query.admin1_code)
        .await
        .map_err(upstream_error)?;
    let responses: Vec<GeonameResponse> = provinces
        .iter()
        .map(|g| GeonameResponse::admin(g, 2))
        .collect();
    Ok(Json(responses))
}

/// 获取城市列表
pub async fn get_cities(
    Extension(client): Extension<Arc<GeonamesClient>>,
    Path(country_code): Path<String>,
    Query(query): Query<CitiesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let cities = client
        .cities(
            &country_code.to_uppercase(),
            query.admin1_code.as_deref(),
            query.admin2_code.as_deref(),
            query.min_population.unwrap_or(15000),
        )
        .await
        .map_err(upstream_error)?;
    let responses: Vec<GeonameResponse> = cities.iter().map(GeonameResponse::city).collect();
    Ok(Json(responses))
}

fn upstream_error(e: GeonamesError) -> ApiError {
    use crate::application::services::campaign_service::ServiceError;

    ApiError::from(ServiceError::Geonames(e))
}
