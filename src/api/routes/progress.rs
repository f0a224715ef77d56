//! Server-sent progress event streams.
//!
//! Both endpoints subscribe to the progress publisher and push one event per
//! batch snapshot. The stream closes after the event carrying a terminal
//! status; reconnecting clients immediately receive the latest snapshot
//! again, so a dropped connection never loses the final state.

use crate::api::AppState;
use crate::error::Result;
use crate::types::{BatchJob, BatchStatus, DownloadId, ItemJob};
use axum::{
    extract::{Path, State},
    response::sse::{Event as SseEvent, KeepAlive, Sse},
};
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use utoipa::ToSchema;

/// One batch progress event as pushed over SSE
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchProgressEvent {
    /// Download identifier
    pub download_id: DownloadId,

    /// Total number of items in the batch
    pub total_files: usize,

    /// Number of completed items
    pub completed_files: usize,

    /// Number of failed items
    pub failed_files: usize,

    /// Index of the item currently downloading
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_index: Option<usize>,

    /// Name of the item currently downloading
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_name: Option<String>,

    /// Progress of the current item (0-100)
    pub current_progress: u8,

    /// Overall progress (0-100), monotonic
    pub overall_progress: u8,

    /// Overall batch status
    pub overall_status: BatchStatus,

    /// Human-readable status line
    pub message: String,

    /// Batch-level error, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Per-item state, in resolved order
    pub files: Vec<ItemJob>,
}

impl From<BatchJob> for BatchProgressEvent {
    fn from(batch: BatchJob) -> Self {
        let message = match batch.overall_status {
            BatchStatus::Starting => format!("Preparing {} files", batch.total_items()),
            BatchStatus::Downloading => match batch.current_name() {
                Some(name) => format!(
                    "Downloading {} ({}/{})",
                    name,
                    batch.current_index.map(|i| i + 1).unwrap_or(0),
                    batch.total_items()
                ),
                None => "Downloading".to_string(),
            },
            BatchStatus::Completed => format!(
                "Completed: {}/{} files",
                batch.completed_count,
                batch.total_items()
            ),
            BatchStatus::Failed => "Download failed".to_string(),
            BatchStatus::Cancelled => "Download cancelled".to_string(),
        };

        Self {
            download_id: batch.id.clone(),
            total_files: batch.total_items(),
            completed_files: batch.completed_count,
            failed_files: batch.failed_count,
            current_index: batch.current_index,
            current_name: batch.current_name().map(str::to_string),
            current_progress: batch.current_progress,
            overall_progress: batch.overall_progress,
            overall_status: batch.overall_status,
            message,
            error: batch.error.clone(),
            files: batch.items,
        }
    }
}

/// One single-track progress event as pushed over SSE
///
/// The condensed view of a one-item batch: the same machinery, with the
/// single item's fields lifted to the top level.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TrackProgressEvent {
    /// Download identifier
    pub download_id: DownloadId,

    /// Progress of the track (0-100)
    pub progress: u8,

    /// Overall status
    pub status: BatchStatus,

    /// Human-readable status line
    pub message: String,

    /// Error message, if the download failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Produced file name, once completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl From<BatchJob> for TrackProgressEvent {
    fn from(batch: BatchJob) -> Self {
        let item = batch.items.first();
        let progress = match batch.overall_status {
            BatchStatus::Completed => 100,
            _ => item.map(|i| i.progress).unwrap_or(0),
        };
        let message = match batch.overall_status {
            BatchStatus::Starting => "Preparing download".to_string(),
            BatchStatus::Downloading => format!("Downloading {}", batch.title),
            BatchStatus::Completed => "Download completed".to_string(),
            BatchStatus::Failed => "Download failed".to_string(),
            BatchStatus::Cancelled => "Download cancelled".to_string(),
        };

        Self {
            download_id: batch.id.clone(),
            progress,
            status: batch.overall_status,
            message,
            error: batch
                .error
                .clone()
                .or_else(|| item.and_then(|i| i.error.clone())),
            filename: item.and_then(|i| i.file.clone()),
        }
    }
}

type SseStream = Sse<BoxStream<'static, std::result::Result<SseEvent, Infallible>>>;

/// GET /downloads/:id/events - SSE batch progress stream
#[utoipa::path(
    get,
    path = "/downloads/{id}/events",
    tag = "progress",
    params(
        ("id" = String, Path, description = "Download identifier")
    ),
    responses(
        (status = 200, description = "Server-sent stream of batch progress events (text/event-stream); closes after the terminal snapshot", content_type = "text/event-stream"),
        (status = 404, description = "Download not found")
    )
)]
pub async fn batch_event_stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<SseStream> {
    let snapshots = state.downloader.subscribe(&DownloadId::from(id)).await?;

    let events = snapshots
        .filter_map(|snapshot| async move {
            let event = BatchProgressEvent::from(snapshot);
            match serde_json::to_string(&event) {
                Ok(json) => Some(Ok(SseEvent::default().event("progress").data(json))),
                Err(e) => {
                    tracing::warn!("Failed to serialize progress event to JSON: {}", e);
                    None
                }
            }
        })
        .boxed();

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// GET /downloads/:id/events/track - SSE condensed single-track stream
#[utoipa::path(
    get,
    path = "/downloads/{id}/events/track",
    tag = "progress",
    params(
        ("id" = String, Path, description = "Download identifier")
    ),
    responses(
        (status = 200, description = "Server-sent stream of condensed track progress events (text/event-stream)", content_type = "text/event-stream"),
        (status = 404, description = "Download not found")
    )
)]
pub async fn track_event_stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<SseStream> {
    let snapshots = state.downloader.subscribe(&DownloadId::from(id)).await?;

    let events = snapshots
        .filter_map(|snapshot| async move {
            let event = TrackProgressEvent::from(snapshot);
            match serde_json::to_string(&event) {
                Ok(json) => Some(Ok(SseEvent::default().event("progress").data(json))),
                Err(e) => {
                    tracing::warn!("Failed to serialize progress event to JSON: {}", e);
                    None
                }
            }
        })
        .boxed();

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
