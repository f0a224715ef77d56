//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`resolve`] — URL resolution (track metadata, collection listings)
//! - [`downloads`] — Starting, inspecting, cancelling, evicting downloads
//! - [`progress`] — Server-sent progress event streams
//! - [`files`] — Produced files, archives, cleanup
//! - [`system`] — Health, qualities, OpenAPI

use crate::error::{Error, Result};
use crate::types::{AudioFormat, Quality};
use serde::{Deserialize, Serialize};

mod downloads;
mod files;
mod progress;
mod resolve;
mod system;

// Re-export all handlers so `routes::function_name` continues to work
pub use downloads::*;
pub use files::*;
pub use progress::*;
pub use resolve::*;
pub use system::*;

// ============================================================================
// Query/Request Types (shared across handlers)
// ============================================================================

/// Query parameters for resolution endpoints
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct UrlQuery {
    /// The URL to resolve
    pub url: String,
}

/// Request body for POST /downloads/track and /downloads/collection
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct StartDownloadRequest {
    /// Source URL
    pub url: String,

    /// Audio quality; the configured default when omitted. Unknown values
    /// are rejected, never silently substituted.
    #[serde(default)]
    pub quality: Option<Quality>,

    /// Output format; mp3 when omitted. Unknown values are rejected.
    #[serde(default)]
    pub format: Option<AudioFormat>,
}

/// Query parameters for POST /downloads/:id/cleanup
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CleanupQuery {
    /// Whether to keep the assembled archive (default: true)
    #[serde(default = "default_keep_archive")]
    pub keep_archive: bool,
}

fn default_keep_archive() -> bool {
    true
}

/// Reject empty/whitespace URLs before they reach the resolver
fn require_url(url: &str) -> Result<()> {
    if url.trim().is_empty() {
        return Err(Error::Validation("url must not be empty".to_string()));
    }
    Ok(())
}

/// Response for POST /downloads/:id/cleanup
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CleanupResponse {
    /// Always true; cleanup is idempotent and does not hard-fail
    pub success: bool,

    /// Number of files deleted by this call
    pub deleted_files: usize,
}

/// One entry of the GET /qualities listing
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct QualityInfo {
    /// Quality identifier as accepted by the download endpoints
    pub quality: String,

    /// Bitrate in extractor form (e.g. "192k")
    pub bitrate: String,

    /// Human-readable description
    pub description: String,
}
