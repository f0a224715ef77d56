//! Extraction capability boundary
//!
//! The core treats audio extraction as an opaque capability: given a source
//! URL or search string, produce an audio file at a requested bitrate plus
//! title/artist metadata, or fail with a classified error. The production
//! implementation ([`CliExtractor`]) shells out to the yt-dlp and spotdl
//! CLIs; tests substitute their own implementations of [`AudioExtractor`].

use crate::error::ExtractionError;
use crate::types::{DownloadOptions, ItemDescriptor, TrackMetadata};
use async_trait::async_trait;
use std::path::Path;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

mod cli;

pub use cli::CliExtractor;

/// A collection listing as reported by the extraction capability
#[derive(Clone, Debug)]
pub struct Enumeration {
    /// Collection title
    pub title: String,

    /// Uploader / owner, when the platform reports one
    pub uploader: Option<String>,

    /// True number of entries the platform listed
    pub total: usize,

    /// Ordered item descriptors, already truncated to the requested limit
    pub items: Vec<ItemDescriptor>,
}

/// The opaque audio extraction capability
///
/// Implementations must be cancellation-aware: when the token fires during
/// [`fetch`](AudioExtractor::fetch), abort the in-flight work and return
/// [`ExtractionError::Cancelled`]. Per-item timeouts are enforced by the
/// caller, not the implementation.
#[async_trait]
pub trait AudioExtractor: Send + Sync + 'static {
    /// Probe metadata for a single track URL without downloading
    async fn probe(&self, url: &str) -> Result<TrackMetadata, ExtractionError>;

    /// Enumerate a collection URL into at most `limit` ordered descriptors
    async fn enumerate(&self, url: &str, limit: usize) -> Result<Enumeration, ExtractionError>;

    /// Download one item into `dest_dir` at the requested quality and format
    ///
    /// Reports coarse percent updates through `progress` and returns the
    /// produced file name (relative to `dest_dir`).
    async fn fetch(
        &self,
        item: &ItemDescriptor,
        options: DownloadOptions,
        dest_dir: &Path,
        cancel: &CancellationToken,
        progress: mpsc::UnboundedSender<u8>,
    ) -> Result<String, ExtractionError>;
}
