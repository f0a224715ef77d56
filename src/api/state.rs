//! Application state for the API server

use crate::{Config, MusicDownloader};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// This struct is cloned for each request (cheap Arc clone) and provides
/// access to the downloader instance and configuration.
#[derive(Clone)]
pub struct AppState {
    /// The main MusicDownloader instance
    pub downloader: Arc<MusicDownloader>,

    /// Configuration (for read access)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(downloader: Arc<MusicDownloader>, config: Arc<Config>) -> Self {
        Self { downloader, config }
    }
}
