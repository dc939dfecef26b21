//! # depot-api — Binary Entry Point
//!
//! Starts the Axum HTTP server for the model depot. Configuration comes
//! from the environment: `DEPOT_PORT` (default 8080), `DEPOT_API_KEY`
//! (the shared upload secret — uploads are rejected when unset), and
//! `DEPOT_ROOT` (store root directory, default `./depot-data`).

use std::sync::Arc;
use std::time::Duration;

use depot_api::auth::SecretToken;
use depot_api::state::{AppConfig, AppState};
use depot_store::ArtifactStore;

/// Staging files older than this are reclaimed by the periodic sweep.
const STALE_UPLOAD_AGE: Duration = Duration::from_secs(6 * 60 * 60);

/// How often the background sweep runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Build configuration from environment.
    let port: u16 = std::env::var("DEPOT_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    let api_key = std::env::var("DEPOT_API_KEY")
        .ok()
        .filter(|s| !s.is_empty())
        .map(SecretToken::new);
    if api_key.is_none() {
        tracing::warn!("DEPOT_API_KEY is not set — all uploads will be rejected");
    }

    let root = std::env::var("DEPOT_ROOT").unwrap_or_else(|_| "./depot-data".to_string());

    // Open the store and rebuild the index from disk.
    let store = ArtifactStore::open(&root).map_err(|e| {
        tracing::error!("store initialization failed: {e}");
        e
    })?;
    let report = store.scan_report();
    tracing::info!(indexed = report.indexed, root = %root, "artifact index rebuilt");
    for failure in &report.failures {
        tracing::warn!(file = %failure.file, reason = %failure.reason, "file skipped during index scan");
    }

    let store = Arc::new(store);

    // Reclaim staging files stranded by a previous crash, then keep
    // sweeping in the background.
    sweep(&store);
    let sweeper = Arc::clone(&store);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        // The first tick fires immediately; the startup sweep already ran.
        interval.tick().await;
        loop {
            interval.tick().await;
            sweep(&sweeper);
        }
    });

    let config = AppConfig { port, api_key };
    let app = depot_api::app(AppState::new(config, store));

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("depot API listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn sweep(store: &ArtifactStore) {
    match store.sweep_stale_uploads(STALE_UPLOAD_AGE) {
        Ok(0) => {}
        Ok(removed) => tracing::info!(removed, "reclaimed stale staging files"),
        Err(e) => tracing::warn!("staging sweep failed: {e}"),
    }
}
