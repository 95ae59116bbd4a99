//! API error types and their HTTP representation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    InvalidRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<crate::storage::StorageError> for ApiError {
    fn from(err: crate::storage::StorageError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<crate::history::HistoryError> for ApiError {
    fn from(err: crate::history::HistoryError) -> Self {
        match err {
            crate::history::HistoryError::EndBeforeStart | crate::history::HistoryError::InvalidPeriod(_) => {
                ApiError::InvalidRequest(err.to_string())
            }
            crate::history::HistoryError::Storage(source) => ApiError::Internal(source.to_string()),
        }
    }
}
