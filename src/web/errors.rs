//! # Web API Errors
//!
//! Maps engine errors onto HTTP status codes with a JSON body of the form
//! `{"error": {"code": "...", "message": "..."}}`.

use crate::error::CodexError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Resource not found: {message}")]
    NotFound { message: String },

    #[error("Invalid request: {message}")]
    BadRequest { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Internal server error")]
    Internal,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_code, message) = match &self {
            ApiError::NotFound { message } => (StatusCode::NOT_FOUND, "NOT_FOUND", message.as_str()),
            ApiError::BadRequest { message } => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", message.as_str())
            }
            ApiError::Conflict { message } => (StatusCode::CONFLICT, "CONFLICT", message.as_str()),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error",
            ),
        };

        let error_response = json!({
            "error": {
                "code": error_code,
                "message": message
            }
        });

        (status_code, Json(error_response)).into_response()
    }
}

impl From<CodexError> for ApiError {
    fn from(err: CodexError) -> Self {
        match err {
            CodexError::NotFound { .. } => ApiError::not_found(err.to_string()),
            CodexError::ValidationError(message) => ApiError::bad_request(message),
            CodexError::CircularDependency { .. } | CodexError::StateTransitionError(_) => {
                ApiError::conflict(err.to_string())
            }
            other => {
                error!(error = %other, "Request failed");
                ApiError::Internal
            }
        }
    }
}
