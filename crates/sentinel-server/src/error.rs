//! Maps domain errors onto HTTP responses (§7 "CRUD returns structured 4xx
//! with field paths for validation errors; 5xx only for unexpected faults").

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sentinel_core::SentinelError;
use sentinel_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation error: {0}")]
    Validation(SentinelError),

    #[error("signal not found")]
    NotFound,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SentinelError> for ApiError {
    fn from(e: SentinelError) -> Self {
        Self::Validation(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, field_path, message) = match &self {
            Self::Validation(e) => (StatusCode::BAD_REQUEST, e.field_path().map(str::to_owned), e.to_string()),
            Self::NotFound => (StatusCode::NOT_FOUND, None, self.to_string()),
            Self::Store(_) | Self::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, None, self.to_string()),
        };

        let body = match field_path {
            Some(path) => serde_json::json!({ "error": message, "fieldPath": path }),
            None => serde_json::json!({ "error": message }),
        };

        (status, Json(body)).into_response()
    }
}
