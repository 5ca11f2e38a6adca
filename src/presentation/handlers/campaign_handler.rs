// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use validator::Validate;

use crate::application::dto::campaign_response::{CampaignCreatedResponse, CampaignResponse};
use crate::application::dto::create_campaign_request::CreateCampaignRequest;
use crate::application::dto::place_response::place_to_wire;
use crate::application::dto::task_response::TaskResponse;
use crate::application::services::campaign_service::CampaignService;
use crate::domain::models::ids::CampaignId;
use crate::presentation::errors::ApiError;

fn parse_id(id: &str) -> Result<CampaignId, ApiError> {
    id.parse().map_err(|_| ApiError::not_found())
}

/// 创建新活动
pub async fn create_campaign(
    Extension(service): Extension<Arc<CampaignService>>,
    Json(payload): Json<CreateCampaignRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()?;
    let campaign = service.create(payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(CampaignCreatedResponse::from(&campaign)),
    ))
}

/// 列出全部活动
pub async fn list_campaigns(
    Extension(service): Extension<Arc<CampaignService>>,
) -> Result<impl IntoResponse, ApiError> {
    let campaigns = service.list().await?;
    let responses: Vec<CampaignResponse> = campaigns.iter().map(Into::into).collect();
    Ok(Json(responses))
}

/// 查询活动详情
pub async fn get_campaign(
    Extension(service): Extension<Arc<CampaignService>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let campaign = service.get(&parse_id(&id)?).await?;
    Ok(Json(CampaignResponse::from(&campaign)))
}

/// 查询活动的地点
pub async fn get_campaign_places(
    Extension(service): Extension<Arc<CampaignService>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let places = service.places_of(&parse_id(&id)?).await?;
    let responses: Vec<_> = places.iter().map(place_to_wire).collect();
    Ok(Json(responses))
}

/// 查询活动的任务
pub async fn get_campaign_tasks(
    Extension(service): Extension<Arc<CampaignService>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let tasks = service.tasks_of(&parse_id(&id)?).await?;
    let responses: Vec<TaskResponse> = tasks.iter().map(Into::into).collect();
    Ok(Json(responses))
}

/// 启动活动
pub async fn start_campaign(
    Extension(service): Extension<Arc<CampaignService>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    service.start(&parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 恢复活动
pub async fn resume_campaign(
    Extension(service): Extension<Arc<CampaignService>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    service.resume(&parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 归档活动
pub async fn archive_campaign(
    Extension(service): Extension<Arc<CampaignService>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    service.archive(&parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}
