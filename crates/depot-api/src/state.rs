//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor. Holds the runtime configuration and the
//! artifact store; both are behind `Arc` so the state clones cheaply
//! per request.

use std::sync::Arc;

use depot_store::ArtifactStore;

use crate::auth::SecretToken;

/// Runtime configuration, assembled from the environment in `main`.
///
/// The store root (`DEPOT_ROOT`) is not carried here — the
/// [`ArtifactStore`] owns its root directory.
#[derive(Debug)]
pub struct AppConfig {
    /// Listen port (`DEPOT_PORT`, default 8080).
    pub port: u16,
    /// Shared upload secret (`DEPOT_API_KEY`). `None` means uploads are
    /// rejected.
    pub api_key: Option<SecretToken>,
}

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<ArtifactStore>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<ArtifactStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }
}
