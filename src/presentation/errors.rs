// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::application::services::campaign_service::ServiceError;

/// API错误
///
/// 统一的HTTP错误表示；响应体固定为 `{detail, code}`，
/// 栈信息绝不跨越边界
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    detail: String,
}

impl ApiError {
    /// 输入校验错误
    pub fn validation(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "validation_error",
            detail: detail.into(),
        }
    }

    /// 资源不存在
    pub fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "not_found",
            detail: "Resource not found".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "detail": self.detail,
            "code": self.code,
        }));
        (self.status, body).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(detail) => Self {
                status: StatusCode::BAD_REQUEST,
                code: "validation_error",
                detail,
            },
            ServiceError::NotFound => Self::not_found(),
            ServiceError::Conflict(detail) => Self {
                status: StatusCode::CONFLICT,
                code: "conflict",
                detail,
            },
            ServiceError::Geonames(e) => Self {
                status: StatusCode::BAD_GATEWAY,
                code: "upstream_error",
                detail: e.to_string(),
            },
            ServiceError::License(e) => Self {
                status: StatusCode::FORBIDDEN,
                code: "license_rejected",
                detail: e.to_string(),
            },
            ServiceError::Repository(e) => {
                tracing::error!(error = %e, "storage failure surfaced to API");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code: "internal_error",
                    detail: "Internal server error".to_string(),
                }
            }
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::validation(errors.to_string())
    }
}
