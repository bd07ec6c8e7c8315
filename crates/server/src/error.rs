//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// JSON error body: `{"error": <short>, "detail": <more>?}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("authentication required")]
    AuthMissing,

    #[error("invalid credentials: {0}")]
    AuthInvalid(String),

    #[error("forbidden: {0}")]
    AuthForbidden(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("payload exceeds {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("repo not allowed: {0}")]
    RepoNotAllowed(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("not ready")]
    NotReady,

    #[error("storage error: {0}")]
    Storage(#[from] pository_storage::StorageError),

    #[error("{0}")]
    Core(#[from] pository_core::Error),
}

impl ApiError {
    /// The short error token used in the JSON body.
    pub fn short(&self) -> &'static str {
        match self {
            Self::AuthMissing | Self::AuthInvalid(_) => "unauthorized",
            Self::AuthForbidden(_) => "forbidden",
            Self::Validation(_) | Self::Core(_) => "validation failed",
            Self::PayloadTooLarge { .. } => "payload too large",
            Self::NotFound(_) => "not found",
            Self::RepoNotAllowed(_) => "repo not allowed",
            Self::Internal(_) | Self::Storage(_) => "internal error",
            Self::NotReady => "not ready",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthMissing | Self::AuthInvalid(_) => StatusCode::UNAUTHORIZED,
            Self::AuthForbidden(_) | Self::RepoNotAllowed(_) => StatusCode::FORBIDDEN,
            Self::Validation(_) | Self::Core(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) | Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotReady => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// The detail string, if one is safe to expose. Internal details go to
    /// the log only.
    fn detail(&self) -> Option<String> {
        match self {
            Self::AuthMissing | Self::NotReady => None,
            Self::Internal(detail) => {
                tracing::error!(detail = %detail, "internal error");
                None
            }
            Self::Storage(e) => {
                tracing::error!(error = %e, "storage error");
                None
            }
            other => Some(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.short().to_string(),
            detail: self.detail(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
