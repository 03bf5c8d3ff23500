//! Serves files written by the local media store.

use axum::{
    Router,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::get,
};
use std::{path::PathBuf, sync::Arc};
use tracing::error;

use super::error::ApiError;
use crate::media::{content_type_for, is_stored_name};

#[derive(Clone)]
pub struct MediaState {
    pub dir: Arc<PathBuf>,
}

pub fn router(state: MediaState) -> Router {
    Router::new()
        .route("/{name}", get(get_media))
        .with_state(state)
}

async fn get_media(
    State(state): State<MediaState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // Only names we generated; rules out traversal
    if !is_stored_name(&name) {
        return Err(ApiError::not_found("File not found"));
    }

    let bytes = match tokio::fs::read(state.dir.join(&name)).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::not_found("File not found"));
        }
        Err(e) => {
            error!(file = %name, error = %e, "Failed to read media file");
            return Err(ApiError::Internal("Failed to read file".into()));
        }
    };

    // Served from the API origin: never let the browser sniff or run anything
    Ok((
        [
            (header::CONTENT_TYPE, content_type_for(&name)),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
            (header::CONTENT_SECURITY_POLICY, "default-src 'none'; sandbox"),
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable"),
        ],
        bytes,
    ))
}
