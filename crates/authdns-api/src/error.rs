//! API error types and their status-code mapping

use authdns_core::DnsError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("missing or invalid bearer token")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("zone not found")]
    NotFound,

    #[error("{0}")]
    Unprocessable(String),

    #[error("{0}")]
    Internal(String),
}

impl From<DnsError> for ApiError {
    fn from(err: DnsError) -> Self {
        match err {
            DnsError::NotFound => ApiError::NotFound,
            DnsError::ZoneExists { .. }
            | DnsError::VersionRequired
            | DnsError::VersionMissing
            | DnsError::VersionMismatch { .. }
            | DnsError::Validation { .. } => ApiError::Unprocessable(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "missing or invalid bearer token".to_string())
            }
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "zone not found".to_string()),
            ApiError::Unprocessable(message) => (StatusCode::UNPROCESSABLE_ENTITY, message),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        (status, Json(json!({ "status": "error", "message": message }))).into_response()
    }
}
