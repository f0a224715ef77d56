//! File, archive, and cleanup handlers.

use super::{CleanupQuery, CleanupResponse};
use crate::api::AppState;
use crate::error::Result;
use crate::types::DownloadId;
use crate::utils;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};

/// GET /downloads/:id/files - List a download's produced files
#[utoipa::path(
    get,
    path = "/downloads/{id}/files",
    tag = "files",
    params(
        ("id" = String, Path, description = "Download identifier")
    ),
    responses(
        (status = 200, description = "Produced files present on disk", body = Vec<crate::types::ProducedFile>),
        (status = 404, description = "Download not found")
    )
)]
pub async fn list_download_files(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<crate::types::ProducedFile>>> {
    let files = state.downloader.list_files(&DownloadId::from(id)).await?;
    Ok(Json(files))
}

/// POST /downloads/:id/archive - Assemble the batch archive
#[utoipa::path(
    post,
    path = "/downloads/{id}/archive",
    tag = "files",
    params(
        ("id" = String, Path, description = "Download identifier")
    ),
    responses(
        (status = 201, description = "Archive assembled (idempotent: repeated calls return the same reference)", body = crate::archive::ArchiveInfo),
        (status = 404, description = "Download not found"),
        (status = 409, description = "Download has not completed"),
        (status = 422, description = "No completed files to archive")
    )
)]
pub async fn create_archive(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let info = state
        .downloader
        .create_archive(&DownloadId::from(id))
        .await?;
    Ok((StatusCode::CREATED, Json(info)))
}

/// POST /downloads/:id/cleanup - Delete intermediate files
#[utoipa::path(
    post,
    path = "/downloads/{id}/cleanup",
    tag = "files",
    params(
        ("id" = String, Path, description = "Download identifier"),
        ("keep_archive" = Option<bool>, Query, description = "Keep the assembled archive (default: true)")
    ),
    responses(
        (status = 200, description = "Cleanup finished (idempotent; repeat calls succeed with a zero count)", body = CleanupResponse)
    )
)]
pub async fn cleanup_download(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<CleanupQuery>,
) -> Result<Json<CleanupResponse>> {
    let deleted_files = state
        .downloader
        .cleanup(&DownloadId::from(id), query.keep_archive)
        .await?;
    Ok(Json(CleanupResponse {
        success: true,
        deleted_files,
    }))
}

/// GET /files/:name - Fetch one produced file
///
/// Serves audio files and archives from the download area with a download
/// disposition. Name resolution is traversal-safe and limited to the
/// download root and its batch folders.
#[utoipa::path(
    get,
    path = "/files/{name}",
    tag = "files",
    params(
        ("name" = String, Path, description = "Produced file name")
    ),
    responses(
        (status = 200, description = "File content with audio/zip content type and attachment disposition"),
        (status = 400, description = "Unsafe file name"),
        (status = 404, description = "File not found")
    )
)]
pub async fn fetch_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse> {
    let path = state.downloader.file_path(&name).await?;
    let bytes = tokio::fs::read(&path).await?;

    // RFC 5987 encoding keeps non-ASCII track names intact in the
    // disposition header
    let disposition = format!(
        "attachment; filename*=UTF-8''{}",
        urlencoding::encode(&name)
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, utils::content_type_for(&name).to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}
