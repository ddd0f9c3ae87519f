//! Error handling for the gateway.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
    /// Bad request.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Not found.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Error response body.
#[derive(Serialize)]
pub struct ErrorResponse {
    /// Error flag.
    pub error: bool,
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
        };

        let body = ErrorResponse {
            error: true,
            code: code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<scimhub_core::Error> for AppError {
    fn from(err: scimhub_core::Error) -> Self {
        use scimhub_core::Error;

        if !err.is_caller_error() {
            tracing::warn!(error = %err, "request failed");
            return AppError::Internal(err.to_string());
        }
        match err {
            Error::UnknownSubscriber(_) => AppError::NotFound(err.to_string()),
            Error::InvalidInput(msg) => AppError::BadRequest(msg),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON error: {}", err))
    }
}
