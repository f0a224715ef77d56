//! Configuration types for trackdl

use crate::error::{Error, Result};
use crate::types::Quality;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf};

/// Download behavior configuration (directories, limits, timeouts)
///
/// Groups settings related to how batches are fetched and stored.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Download directory (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Maximum number of items admitted into one batch (default: 50)
    ///
    /// Collections larger than this are truncated to the first N items in
    /// platform-listing order and flagged `limited` so UIs can warn the user.
    #[serde(default = "default_max_items")]
    pub max_items_per_batch: usize,

    /// Per-item extraction timeout in seconds (default: 300)
    ///
    /// A timed-out item is recorded as failed with a timeout-classified error;
    /// the batch continues with the next item.
    #[serde(default = "default_item_timeout")]
    pub item_timeout_secs: u64,

    /// Timeout for resolve operations in seconds (default: 30)
    #[serde(default = "default_resolve_timeout")]
    pub resolve_timeout_secs: u64,

    /// Default audio quality when a request does not specify one
    #[serde(default)]
    pub default_quality: Quality,

    /// Automatically assemble the archive and delete intermediate files when
    /// a multi-item batch completes (default: false)
    #[serde(default)]
    pub auto_archive_on_complete: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            max_items_per_batch: default_max_items(),
            item_timeout_secs: default_item_timeout(),
            resolve_timeout_secs: default_resolve_timeout(),
            default_quality: Quality::default(),
            auto_archive_on_complete: false,
        }
    }
}

/// External extractor tool paths
///
/// Groups settings for the extraction CLIs. Used as a nested sub-config
/// within [`Config`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to the yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,

    /// Path to the spotdl executable (auto-detected if None)
    #[serde(default)]
    pub spotdl_path: Option<PathBuf>,

    /// Whether to search PATH for extractor binaries if explicit paths not set
    /// (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Bind address for the API server (default: 127.0.0.1:8750)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Whether CORS is enabled (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins ("*" = any, default)
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Whether to serve Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// Server configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// REST API settings
    #[serde(default)]
    pub api: ApiConfig,
}

/// Main configuration for [`MusicDownloader`](crate::MusicDownloader)
///
/// Works out of the box with zero configuration; every field has a sensible
/// default and can be overridden via struct update syntax or deserialized
/// from a config file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download behavior
    #[serde(default)]
    pub download: DownloadConfig,

    /// Extractor tool paths
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Server settings
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Validate configuration consistency
    ///
    /// Called by the downloader constructor; invalid settings surface as a
    /// validation error before any work starts.
    pub fn validate(&self) -> Result<()> {
        if self.download.max_items_per_batch == 0 {
            return Err(Error::Validation(
                "download.max_items_per_batch must be at least 1".to_string(),
            ));
        }
        if self.download.item_timeout_secs == 0 {
            return Err(Error::Validation(
                "download.item_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.download.resolve_timeout_secs == 0 {
            return Err(Error::Validation(
                "download.resolve_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Per-item extraction timeout as a [`std::time::Duration`]
    pub fn item_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.download.item_timeout_secs)
    }

    /// Resolve timeout as a [`std::time::Duration`]
    pub fn resolve_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.download.resolve_timeout_secs)
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_max_items() -> usize {
    50
}

fn default_item_timeout() -> u64 {
    300
}

fn default_resolve_timeout() -> u64 {
    30
}

fn default_bind_address() -> SocketAddr {
    // Safe: literal always parses
    "127.0.0.1:8750".parse().unwrap_or_else(|_| {
        SocketAddr::from(([127, 0, 0, 1], 8750))
    })
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_true() -> bool {
    true
}
