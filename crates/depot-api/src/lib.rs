//! # depot-api — HTTP Transport for the Model Depot
//!
//! Thin protocol glue over the [`depot_store`] core. The store owns the
//! real invariants (atomic ingestion, the name→hash index); this crate
//! authenticates, extracts the artifact name and byte stream, and
//! translates store results into HTTP responses.
//!
//! ## API Surface
//!
//! | Route                     | Method | Auth       | Purpose                         |
//! |---------------------------|--------|------------|---------------------------------|
//! | `/upload?model=<name>`    | POST   | shared key | Receive a model artifact        |
//! | `/download?model=<name>`  | GET    | none       | Serve a model, conditional GET  |
//! | `/health`                 | GET    | none       | Liveness probe                  |
//!
//! ## Middleware
//!
//! `TraceLayer` wraps everything; the shared-secret check wraps only the
//! upload route, so a rejected upload never reaches staging I/O.

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Maximum accepted upload body size (2 GiB). Model artifacts are
/// large; the body is streamed to disk, never buffered in memory.
const UPLOAD_BODY_LIMIT: usize = 2 * 1024 * 1024 * 1024;

/// Assemble the application router.
pub fn app(state: AppState) -> Router {
    let upload = Router::new()
        .route("/upload", post(routes::artifacts::upload))
        .route_layer(from_fn_with_state(state.clone(), auth::require_api_key))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT));

    Router::new()
        .merge(upload)
        .route("/download", get(routes::artifacts::download))
        .route("/health", get(routes::artifacts::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
