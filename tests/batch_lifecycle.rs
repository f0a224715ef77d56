//! End-to-end batch lifecycle through the public library API.
//!
//! Uses a scripted extractor so no network or external binaries are needed.

use async_trait::async_trait;
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use trackdl::{
    AudioExtractor, BatchStatus, Config, DownloadOptions, Enumeration, ExtractionError,
    ItemDescriptor, ItemSource, ItemStatus, MusicDownloader, Platform, TrackMetadata,
};

/// Extractor producing a fixed playlist; item 1 always times out (hangs)
struct ScriptedExtractor {
    tracks: usize,
    hang_index: Option<usize>,
}

#[async_trait]
impl AudioExtractor for ScriptedExtractor {
    async fn probe(&self, _url: &str) -> Result<TrackMetadata, ExtractionError> {
        Ok(TrackMetadata {
            title: "Song".to_string(),
            artist: Some("Artist".to_string()),
            duration_secs: Some(180),
            platform: Platform::Youtube,
        })
    }

    async fn enumerate(&self, _url: &str, limit: usize) -> Result<Enumeration, ExtractionError> {
        let items = (0..self.tracks.min(limit))
            .map(|index| ItemDescriptor {
                index,
                name: format!("Artist - Track {}", index + 1),
                source: ItemSource::Search(format!("Artist - Track {}", index + 1)),
            })
            .collect();
        Ok(Enumeration {
            title: "Lifecycle Playlist".to_string(),
            uploader: Some("Artist".to_string()),
            total: self.tracks,
            items,
        })
    }

    async fn fetch(
        &self,
        item: &ItemDescriptor,
        _options: DownloadOptions,
        dest_dir: &Path,
        cancel: &CancellationToken,
        progress: mpsc::UnboundedSender<u8>,
    ) -> Result<String, ExtractionError> {
        if self.hang_index == Some(item.index) {
            cancel.cancelled().await;
            return Err(ExtractionError::Cancelled);
        }
        let name = format!("Artist - Track {} [192kbps].mp3", item.index + 1);
        tokio::fs::write(dest_dir.join(&name), b"audio bytes").await?;
        let _ = progress.send(100);
        Ok(name)
    }
}

fn downloader(tracks: usize, hang_index: Option<usize>, timeout_secs: u64) -> (MusicDownloader, tempfile::TempDir) {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut config = Config::default();
    config.download.download_dir = temp.path().to_path_buf();
    config.download.item_timeout_secs = timeout_secs;

    let downloader = MusicDownloader::with_extractor(
        config,
        Arc::new(ScriptedExtractor { tracks, hang_index }),
    )
    .expect("downloader");
    (downloader, temp)
}

#[tokio::test]
async fn full_lifecycle_download_stream_archive_cleanup() {
    let (downloader, temp) = downloader(3, None, 30);

    let started = downloader
        .start_collection(
            "https://www.youtube.com/playlist?list=PLlifecycle",
            DownloadOptions::default(),
        )
        .await
        .expect("start");
    assert_eq!(started.total_tracks, 3);
    assert!(!started.limited);

    // Follow the progress stream to the terminal snapshot
    let mut stream = downloader.subscribe(&started.id).await.expect("subscribe");
    let mut last = None;
    let mut last_done = 0usize;
    while let Some(snapshot) = stream.next().await {
        let done = snapshot.completed_count + snapshot.failed_count;
        assert!(done >= last_done, "terminal counts must never regress");
        assert!(done <= snapshot.total_items());
        last_done = done;
        last = Some(snapshot);
    }
    let last = last.expect("at least one snapshot");
    assert_eq!(last.overall_status, BatchStatus::Completed);
    assert_eq!(last.completed_count, 3);
    assert_eq!(last.overall_progress, 100);

    // All produced files are on disk, in the batch folder
    let files = downloader.list_files(&started.id).await.expect("list");
    assert_eq!(files.len(), 3);

    // Archive, idempotently
    let archive = downloader.create_archive(&started.id).await.expect("archive");
    let again = downloader.create_archive(&started.id).await.expect("archive again");
    assert_eq!(archive.file, again.file);
    assert!(temp.path().join(&archive.file).is_file());

    // The archive is fetchable by name through the file path resolver
    let path = downloader.file_path(&archive.file).await.expect("file path");
    assert!(path.is_file());

    // Cleanup keeps the archive, removes the items, and is idempotent
    let deleted = downloader.cleanup(&started.id, true).await.expect("cleanup");
    assert_eq!(deleted, 3);
    let deleted = downloader.cleanup(&started.id, true).await.expect("cleanup again");
    assert_eq!(deleted, 0);
    assert!(temp.path().join(&archive.file).is_file());

    // Item files are gone
    assert!(downloader.list_files(&started.id).await.expect("list").is_empty());
}

#[tokio::test]
async fn timed_out_item_is_isolated_and_classified() {
    let (downloader, _temp) = downloader(3, Some(1), 1);

    let started = downloader
        .start_collection(
            "https://www.youtube.com/playlist?list=PLtimeouts",
            DownloadOptions::default(),
        )
        .await
        .expect("start");

    let mut stream = downloader.subscribe(&started.id).await.expect("subscribe");
    let mut last = None;
    while let Some(snapshot) = stream.next().await {
        last = Some(snapshot);
    }
    let batch = last.expect("snapshots");

    assert_eq!(batch.overall_status, BatchStatus::Completed);
    assert_eq!(batch.completed_count, 2);
    assert_eq!(batch.failed_count, 1);
    assert_eq!(batch.items[1].status, ItemStatus::Failed);
    assert!(
        batch.items[1]
            .error
            .as_deref()
            .expect("timeout error recorded")
            .contains("timed out"),
        "timeout failures must be classified distinctly"
    );
}

#[tokio::test]
async fn cancellation_preserves_completed_items() {
    let (downloader, temp) = downloader(3, Some(1), 60);

    let started = downloader
        .start_collection(
            "https://www.youtube.com/playlist?list=PLcancel",
            DownloadOptions::default(),
        )
        .await
        .expect("start");

    // Wait until the hanging item is in flight
    loop {
        let batch = downloader.get_batch(&started.id).await.expect("get");
        if batch.current_index == Some(1) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    downloader.cancel(&started.id).await.expect("cancel");

    // The stream delivers the cancelled terminal snapshot and closes
    let mut stream = downloader.subscribe(&started.id).await.expect("subscribe");
    let mut last = None;
    while let Some(snapshot) = stream.next().await {
        last = Some(snapshot);
    }
    let batch = last.expect("snapshots");

    assert_eq!(batch.overall_status, BatchStatus::Cancelled);
    assert_eq!(batch.items[0].status, ItemStatus::Completed);
    assert_eq!(batch.items[2].status, ItemStatus::Pending);
    assert!(batch.items.iter().all(|i| i.status != ItemStatus::Downloading));

    // The completed item's file is intact on disk
    let kept = temp
        .path()
        .join("Lifecycle Playlist [playlist] [youtube]")
        .join("Artist - Track 1 [192kbps].mp3");
    assert!(kept.is_file());
}
