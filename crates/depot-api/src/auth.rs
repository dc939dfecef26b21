//! # Upload Authentication
//!
//! Shared-secret check for the upload endpoint. The client presents the
//! secret verbatim in the `Authorization` header and it must match the
//! configured key exactly (no scheme prefix). When no key is configured
//! uploads are always rejected — there is no open-by-default mode.
//!
//! The check runs as route middleware, so a rejected request never
//! reaches the handler and no staging file is ever created for it.

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use crate::error::ApiError;
use crate::state::AppState;

/// The configured upload secret.
///
/// Custom `Debug` redacts the value to prevent credential leakage in
/// logs.
#[derive(Clone)]
pub struct SecretToken(String);

impl SecretToken {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Constant-time comparison against a presented credential.
    ///
    /// When lengths differ, a dummy comparison keeps timing independent
    /// of how much of the secret matched.
    pub fn matches(&self, presented: &str) -> bool {
        let expected = self.0.as_bytes();
        let presented = presented.as_bytes();
        if presented.len() != expected.len() {
            let _ = expected.ct_eq(expected);
            return false;
        }
        presented.ct_eq(expected).into()
    }
}

impl std::fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SecretToken").field(&"[REDACTED]").finish()
    }
}

/// Middleware gating the upload route on the shared secret.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let Some(expected) = &state.config.api_key else {
        tracing::warn!("upload rejected: no API key is configured");
        return ApiError::Unauthorized("uploads are disabled: no API key configured".into())
            .into_response();
    };

    match presented {
        Some(presented) if expected.matches(presented) => next.run(request).await,
        Some(_) => {
            tracing::warn!("upload rejected: API key mismatch");
            ApiError::Unauthorized("invalid API key".into()).into_response()
        }
        None => ApiError::Unauthorized("missing authorization header".into()).into_response(),
    }
}
