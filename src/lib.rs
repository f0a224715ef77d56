//! # trackdl
//!
//! Backend library for music download applications: resolve a track, album,
//! or playlist URL into an ordered batch of downloads, run them with
//! per-item timeouts and failure isolation, stream live progress snapshots
//! to any number of subscribers, and package the results into a single
//! archive.
//!
//! ## Design Philosophy
//!
//! trackdl is designed to be:
//! - **Sensible defaults** - Works out of the box with zero configuration
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Push-based** - Consumers subscribe to snapshot streams, no polling
//! - **Failure-isolating** - One bad track never takes down its batch
//!
//! ## Quick Start
//!
//! ```no_run
//! use trackdl::{Config, DownloadOptions, MusicDownloader};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = MusicDownloader::new(Config::default())?;
//!
//!     let started = downloader
//!         .start_collection(
//!             "https://open.spotify.com/album/2noRn2Aes5aoNVsU6iWThc",
//!             DownloadOptions::default(),
//!         )
//!         .await?;
//!
//!     // Follow progress until the batch reaches a terminal state
//!     let mut progress = downloader.subscribe(&started.id).await?;
//!     while let Some(snapshot) = progress.next().await {
//!         println!(
//!             "{}% ({}/{} done)",
//!             snapshot.overall_progress,
//!             snapshot.completed_count + snapshot.failed_count,
//!             snapshot.total_items()
//!         );
//!     }
//!
//!     // Package everything that succeeded
//!     let archive = downloader.create_archive(&started.id).await?;
//!     println!("archive: {} ({} bytes)", archive.file, archive.size_bytes);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Archive assembly and cleanup
pub mod archive;
/// Configuration types
pub mod config;
/// The downloader facade
pub mod downloader;
/// Error types
pub mod error;
/// Batch execution engine
pub mod executor;
/// Extraction capability boundary
pub mod extraction;
/// Progress snapshot streams
pub mod publisher;
/// URL classification and collection resolution
pub mod resolver;
/// Job store (per-download batch state)
pub mod store;
/// Core types
pub mod types;
/// File naming utilities
pub mod utils;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use archive::{ArchiveAssembler, ArchiveInfo};
pub use config::{ApiConfig, Config, DownloadConfig, ServerConfig, ToolsConfig};
pub use downloader::{MusicDownloader, StartedDownload};
pub use error::{
    ApiError, ArchiveError, Error, ErrorDetail, ExtractionError, Result, StoreError, ToHttpStatus,
};
pub use extraction::{AudioExtractor, CliExtractor, Enumeration};
pub use publisher::ProgressPublisher;
pub use resolver::{ClassifiedUrl, TrackResolver, classify};
pub use store::{ItemPatch, JobStore, MemoryJobStore, NewBatch};
pub use types::{
    AudioFormat, BatchJob, BatchStatus, CollectionInfo, CollectionKind, DownloadId,
    DownloadOptions, ItemDescriptor, ItemJob, ItemSource, ItemStatus, Platform, ProducedFile,
    Quality, TrackMetadata,
};

/// Helper function to run the downloader with graceful signal handling.
///
/// Waits for a termination signal, cancels every running batch, and returns.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal
///   registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use trackdl::{Config, MusicDownloader, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = MusicDownloader::new(Config::default())?;
///     let api = downloader.spawn_api_server();
///
///     // Run with automatic signal handling
///     run_with_shutdown(downloader).await;
///     api.abort();
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: MusicDownloader) {
    wait_for_signal().await;
    downloader.shutdown().await;
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers,
    // tests); fall back to whatever handler can be installed
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
