//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps store errors to HTTP status codes and returns JSON error bodies
//! with a machine-readable code and a message. Internal error details
//! are never exposed to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use depot_store::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured JSON error response body.
///
/// All error responses use this format for consistency across the API
/// surface.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "BAD_REQUEST").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Application-level error type that implements [`IntoResponse`].
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or invalid artifact name, malformed upload body (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or mismatched upload credential (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// No artifact committed under the requested name (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Storage failure (500). Message is logged but not returned to the
    /// client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Never expose internal error messages to clients.
        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        // Log server-side errors for operator visibility.
        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::Unauthorized(_) => tracing::warn!(error = %self, "request rejected"),
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Convert store errors to API errors.
///
/// Name validation failures are the client's fault (400); everything
/// else is a storage failure (500).
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidName(_) => Self::BadRequest(err.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}
