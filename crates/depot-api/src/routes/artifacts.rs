//! # Artifact Routes
//!
//! Upload and download handlers for model artifacts.
//!
//! Uploads stream the `model` multipart part chunk-by-chunk into a
//! staging file and commit it atomically — the artifact bytes are never
//! buffered in memory. Downloads answer conditional requests: a client
//! whose `If-None-Match` validator matches the current content hash gets
//! `304 Not Modified` and skips the transfer entirely.

use std::io::Write;

use axum::body::Body;
use axum::extract::{Multipart, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use depot_store::ArtifactName;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

use crate::error::ApiError;
use crate::state::AppState;

/// Name of the multipart part carrying the artifact bytes.
const MODEL_PART: &str = "model";

/// Query parameters shared by upload and download.
#[derive(Debug, Deserialize)]
pub struct ArtifactQuery {
    model: Option<String>,
}

/// Confirmation body returned on successful upload.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub model: String,
    pub etag: String,
    pub size_bytes: u64,
}

/// Liveness probe body.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthBody {
    pub status: String,
    pub artifacts: usize,
}

/// Extract and validate the artifact name from the `model` query
/// parameter.
fn require_model_name(params: &ArtifactQuery) -> Result<ArtifactName, ApiError> {
    let raw = params.model.as_deref().unwrap_or("");
    if raw.is_empty() {
        return Err(ApiError::BadRequest(
            "set the 'model' name as a query parameter".into(),
        ));
    }
    ArtifactName::new(raw).map_err(ApiError::from)
}

/// `POST /upload?model=<name>` — receive an artifact.
///
/// Authentication has already happened in the middleware; by the time
/// this handler runs the caller is trusted. The `model` part is
/// streamed straight into a staging file and committed under the
/// validated name. Parts with any other name are drained and ignored.
pub async fn upload(
    State(state): State<AppState>,
    Query(params): Query<ArtifactQuery>,
    mut multipart: Multipart,
) -> Result<Json<UploadReceipt>, ApiError> {
    let name = require_model_name(&params)?;
    tracing::info!(model = %name, "receiving model");

    let mut staged = None;
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some(MODEL_PART) {
            continue;
        }
        let mut upload = state.store.begin_upload()?;
        let mut size_bytes: u64 = 0;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| ApiError::BadRequest(format!("could not read upload stream: {e}")))?
        {
            upload
                .write_all(&chunk)
                .map_err(|e| ApiError::Internal(format!("write to staging file failed: {e}")))?;
            size_bytes += chunk.len() as u64;
        }
        staged = Some((upload, size_bytes));
        break;
    }

    let Some((staged, size_bytes)) = staged else {
        return Err(ApiError::BadRequest(format!(
            "upload the file as a multipart part named '{MODEL_PART}'"
        )));
    };

    let digest = state.store.commit(staged, &name)?;
    tracing::info!(model = %name, etag = %digest, size_bytes, "artifact committed");

    Ok(Json(UploadReceipt {
        model: name.to_string(),
        etag: digest.to_base64(),
        size_bytes,
    }))
}

/// Does any `If-None-Match` validator match the current ETag?
///
/// Each header value is treated as a comma-separated validator list;
/// quoted validators are compared without their quotes.
fn if_none_match_contains(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get_all(header::IF_NONE_MATCH)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .any(|candidate| candidate == etag || candidate.trim_matches('"') == etag)
}

/// `GET /download?model=<name>` — serve an artifact.
///
/// Replies `304 Not Modified` without a body when the client already
/// holds the current content (its `If-None-Match` validator equals the
/// indexed hash); otherwise streams the file with an `ETag` header.
pub async fn download(
    State(state): State<AppState>,
    Query(params): Query<ArtifactQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let name = require_model_name(&params)?;

    let artifact = state
        .store
        .lookup(&name)
        .ok_or_else(|| ApiError::NotFound(format!("no model named '{name}'")))?;

    let etag = artifact.digest.to_base64();
    let etag_value = HeaderValue::from_str(&etag)
        .map_err(|e| ApiError::Internal(format!("unrepresentable ETag: {e}")))?;
    if if_none_match_contains(&headers, &etag) {
        // RFC 9110 §15.4.5: a 304 echoes the validator so caches can
        // refresh their entry.
        let mut response = StatusCode::NOT_MODIFIED.into_response();
        response.headers_mut().insert(header::ETAG, etag_value);
        return Ok(response);
    }

    tracing::info!(model = %name, "serving model");
    let file = tokio::fs::File::open(&artifact.path)
        .await
        .map_err(|e| ApiError::Internal(format!("could not open {}: {e}", artifact.path.display())))?;
    let size = file
        .metadata()
        .await
        .map_err(|e| ApiError::Internal(format!("could not stat artifact: {e}")))?
        .len();

    let mut response = Body::from_stream(ReaderStream::new(file)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::ETAG, etag_value);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    Ok(response)
}

/// `GET /health` — liveness probe, mounted outside auth.
pub async fn health(State(state): State<AppState>) -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok".to_string(),
        artifacts: state.store.artifact_count(),
    })
}
