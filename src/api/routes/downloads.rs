//! Download management handlers.

use super::StartDownloadRequest;
use crate::api::AppState;
use crate::error::Result;
use crate::types::{DownloadId, DownloadOptions};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

/// POST /downloads/track - Start a single-track download
#[utoipa::path(
    post,
    path = "/downloads/track",
    tag = "downloads",
    request_body = StartDownloadRequest,
    responses(
        (status = 201, description = "Download started", body = crate::downloader::StartedDownload),
        (status = 400, description = "Missing URL, unsupported platform, or invalid quality"),
        (status = 502, description = "Platform lookup failed"),
        (status = 504, description = "Platform lookup timed out")
    )
)]
pub async fn start_track(
    State(state): State<AppState>,
    Json(request): Json<StartDownloadRequest>,
) -> Result<impl IntoResponse> {
    super::require_url(&request.url)?;
    let options = DownloadOptions {
        quality: request
            .quality
            .unwrap_or(state.config.download.default_quality),
        format: request.format.unwrap_or_default(),
    };

    let started = state.downloader.start_track(&request.url, options).await?;
    Ok((StatusCode::CREATED, Json(started)))
}

/// POST /downloads/collection - Start an album/playlist batch download
#[utoipa::path(
    post,
    path = "/downloads/collection",
    tag = "downloads",
    request_body = StartDownloadRequest,
    responses(
        (status = 201, description = "Batch started; `total_tracks` is the platform's true count and `limited` flags truncation to the batch cap", body = crate::downloader::StartedDownload),
        (status = 400, description = "Missing URL, unsupported platform, or invalid quality"),
        (status = 502, description = "Platform listing fetch failed"),
        (status = 504, description = "Platform listing timed out")
    )
)]
pub async fn start_collection(
    State(state): State<AppState>,
    Json(request): Json<StartDownloadRequest>,
) -> Result<impl IntoResponse> {
    super::require_url(&request.url)?;
    let options = DownloadOptions {
        quality: request
            .quality
            .unwrap_or(state.config.download.default_quality),
        format: request.format.unwrap_or_default(),
    };

    let started = state
        .downloader
        .start_collection(&request.url, options)
        .await?;
    Ok((StatusCode::CREATED, Json(started)))
}

/// GET /downloads - List all tracked downloads
#[utoipa::path(
    get,
    path = "/downloads",
    tag = "downloads",
    responses(
        (status = 200, description = "All tracked downloads, oldest first", body = Vec<crate::types::BatchJob>)
    )
)]
pub async fn list_downloads(State(state): State<AppState>) -> Json<Vec<crate::types::BatchJob>> {
    Json(state.downloader.list_batches().await)
}

/// GET /downloads/:id - Get one download's snapshot
#[utoipa::path(
    get,
    path = "/downloads/{id}",
    tag = "downloads",
    params(
        ("id" = String, Path, description = "Download identifier")
    ),
    responses(
        (status = 200, description = "Current batch snapshot", body = crate::types::BatchJob),
        (status = 404, description = "Download not found")
    )
)]
pub async fn get_download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<crate::types::BatchJob>> {
    let batch = state.downloader.get_batch(&DownloadId::from(id)).await?;
    Ok(Json(batch))
}

/// POST /downloads/:id/cancel - Cooperatively cancel a download
#[utoipa::path(
    post,
    path = "/downloads/{id}/cancel",
    tag = "downloads",
    params(
        ("id" = String, Path, description = "Download identifier")
    ),
    responses(
        (status = 204, description = "Cancellation requested (no-op when already terminal)"),
        (status = 404, description = "Download not found")
    )
)]
pub async fn cancel_download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    state.downloader.cancel(&DownloadId::from(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /downloads/:id - Evict a download's tracking state
#[utoipa::path(
    delete,
    path = "/downloads/{id}",
    tag = "downloads",
    params(
        ("id" = String, Path, description = "Download identifier")
    ),
    responses(
        (status = 204, description = "Tracking state removed (idempotent; unknown identifiers are a no-op)")
    )
)]
pub async fn delete_download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    state.downloader.delete_batch(&DownloadId::from(id)).await;
    StatusCode::NO_CONTENT
}
