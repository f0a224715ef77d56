//! Shared test fixtures: a scriptable extractor and downloader setup

use crate::config::Config;
use crate::downloader::MusicDownloader;
use crate::error::ExtractionError;
use crate::extraction::{AudioExtractor, Enumeration};
use crate::types::{DownloadOptions, ItemDescriptor, ItemSource, Platform, TrackMetadata};
use crate::utils;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Scripted behavior for one item fetch, selected by item index
#[derive(Clone, Debug)]
pub(crate) enum MockBehavior {
    /// Write a file and succeed
    Succeed,
    /// Emit the given percents, then write a file and succeed
    SucceedWithProgress(Vec<u8>),
    /// Fail with the given tool error message
    Fail(String),
    /// Block until cancelled (or until the caller's timeout fires)
    Hang,
}

/// Extraction capability with per-index scripted outcomes
pub(crate) struct MockExtractor {
    behaviors: Vec<MockBehavior>,
    /// True collection size reported by `enumerate`
    pub(crate) listing_total: usize,
}

impl MockExtractor {
    pub(crate) fn with_behaviors(behaviors: Vec<MockBehavior>) -> Self {
        let listing_total = behaviors.len().max(1);
        Self {
            behaviors,
            listing_total,
        }
    }

    fn behavior_for(&self, index: usize) -> MockBehavior {
        self.behaviors
            .get(index)
            .cloned()
            .unwrap_or(MockBehavior::Succeed)
    }
}

#[async_trait]
impl AudioExtractor for MockExtractor {
    async fn probe(&self, _url: &str) -> Result<TrackMetadata, ExtractionError> {
        Ok(TrackMetadata {
            title: "Song".to_string(),
            artist: Some("Artist".to_string()),
            duration_secs: Some(215),
            platform: Platform::Youtube,
        })
    }

    async fn enumerate(&self, _url: &str, limit: usize) -> Result<Enumeration, ExtractionError> {
        Ok(Enumeration {
            title: "Mock Playlist".to_string(),
            uploader: Some("Artist".to_string()),
            total: self.listing_total,
            items: descriptors(self.listing_total.min(limit)),
        })
    }

    async fn fetch(
        &self,
        item: &ItemDescriptor,
        options: DownloadOptions,
        dest_dir: &Path,
        cancel: &CancellationToken,
        progress: mpsc::UnboundedSender<u8>,
    ) -> Result<String, ExtractionError> {
        match self.behavior_for(item.index) {
            MockBehavior::Succeed => {
                let name =
                    utils::track_filename(Some("Artist"), &item.name, options.quality, options.format);
                tokio::fs::write(dest_dir.join(&name), b"mock audio").await?;
                let _ = progress.send(100);
                Ok(name)
            }
            MockBehavior::SucceedWithProgress(percents) => {
                for percent in percents {
                    let _ = progress.send(percent);
                    tokio::task::yield_now().await;
                }
                let name =
                    utils::track_filename(Some("Artist"), &item.name, options.quality, options.format);
                tokio::fs::write(dest_dir.join(&name), b"mock audio").await?;
                Ok(name)
            }
            MockBehavior::Fail(message) => Err(ExtractionError::Tool { message }),
            MockBehavior::Hang => {
                cancel.cancelled().await;
                Err(ExtractionError::Cancelled)
            }
        }
    }
}

/// Ordered descriptors "Artist - Track N"
pub(crate) fn descriptors(count: usize) -> Vec<ItemDescriptor> {
    (0..count)
        .map(|index| ItemDescriptor {
            index,
            name: format!("Artist - Track {}", index + 1),
            source: ItemSource::Search(format!("Artist - Track {}", index + 1)),
        })
        .collect()
}

/// Downloader over a temp dir, short timeouts, and scripted extraction
pub(crate) fn create_test_downloader(
    behaviors: Vec<MockBehavior>,
) -> (MusicDownloader, tempfile::TempDir) {
    let temp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let mut config = Config::default();
    config.download.download_dir = temp.path().to_path_buf();
    config.download.item_timeout_secs = 5;
    config.download.resolve_timeout_secs = 5;

    let downloader =
        MusicDownloader::with_extractor(config, Arc::new(MockExtractor::with_behaviors(behaviors)))
            .unwrap_or_else(|e| panic!("test downloader: {e}"));
    (downloader, temp)
}
