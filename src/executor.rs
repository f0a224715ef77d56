//! Batch executor — drives all items of a batch to a terminal state
//!
//! Items are processed strictly in resolved order, one at a time, so progress
//! reporting stays deterministic and the external extraction capability sees
//! bounded load. Item failures are recorded and isolated; nothing an item
//! does can abort its siblings or escape the executor's boundary.

use crate::archive::ArchiveAssembler;
use crate::config::Config;
use crate::error::{Error, ExtractionError, Result};
use crate::extraction::AudioExtractor;
use crate::store::{ItemPatch, JobStore};
use crate::types::{BatchStatus, DownloadId, DownloadOptions, ItemDescriptor, ItemStatus};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Sequential batch driver
///
/// Cheap to clone; all fields are shared handles.
#[derive(Clone)]
pub struct BatchExecutor {
    store: Arc<dyn JobStore>,
    extractor: Arc<dyn AudioExtractor>,
    config: Arc<Config>,
}

impl BatchExecutor {
    /// Create an executor over the given store and extraction capability
    pub fn new(
        store: Arc<dyn JobStore>,
        extractor: Arc<dyn AudioExtractor>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            store,
            extractor,
            config,
        }
    }

    /// Run a batch to a terminal state
    ///
    /// Never returns an error to the caller: item-level failures are recorded
    /// on their items, and store-level failures (the batch was evicted
    /// mid-run) abandon the run with a log line.
    pub async fn execute(
        &self,
        id: DownloadId,
        items: Vec<ItemDescriptor>,
        options: DownloadOptions,
        dest_dir: PathBuf,
        cancel: CancellationToken,
    ) {
        if let Err(e) = self.run(&id, items, options, dest_dir, cancel).await {
            if matches!(e, Error::Store(_)) {
                tracing::warn!(download_id = %id, error = %e, "batch abandoned: store entry gone");
            } else {
                tracing::error!(download_id = %id, error = %e, "batch failed to start");
                let _ = self.store.set_error(&id, &e.to_string()).await;
                let _ = self.store.set_status(&id, BatchStatus::Failed).await;
            }
        }
    }

    async fn run(
        &self,
        id: &DownloadId,
        items: Vec<ItemDescriptor>,
        options: DownloadOptions,
        dest_dir: PathBuf,
        cancel: CancellationToken,
    ) -> Result<()> {
        tokio::fs::create_dir_all(&dest_dir).await?;

        self.store.set_status(id, BatchStatus::Downloading).await?;

        let timeout = self.config.item_timeout();
        let mut cancelled = false;

        for item in &items {
            // Cancellation safe point between items: unstarted items stay
            // pending
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            self.store.set_current_item(id, Some(item.index)).await?;
            self.store
                .update_item(id, item.index, ItemPatch::status(ItemStatus::Downloading))
                .await?;

            tracing::info!(
                download_id = %id,
                index = item.index,
                name = %item.name,
                "item download started"
            );

            let (progress_tx, progress_rx) = mpsc::unbounded_channel();
            let forwarder = self.spawn_progress_forwarder(id.clone(), item.index, progress_rx);

            let outcome = tokio::time::timeout(
                timeout,
                self.extractor
                    .fetch(item, options, &dest_dir, &cancel, progress_tx),
            )
            .await;

            // Let the last progress write land before the terminal write
            let _ = forwarder.await;

            match outcome {
                Ok(Ok(file)) => {
                    tracing::info!(download_id = %id, index = item.index, file = %file, "item completed");
                    self.store
                        .update_item(id, item.index, ItemPatch::completed(file))
                        .await?;
                }
                Ok(Err(e)) if e.is_cancelled() => {
                    tracing::info!(download_id = %id, index = item.index, "item cancelled mid-flight");
                    self.store
                        .update_item(id, item.index, ItemPatch::failed(e.to_string()))
                        .await?;
                    cancelled = true;
                    break;
                }
                Ok(Err(e)) => {
                    tracing::warn!(download_id = %id, index = item.index, error = %e, "item failed");
                    self.store
                        .update_item(id, item.index, ItemPatch::failed(e.to_string()))
                        .await?;
                }
                Err(_elapsed) => {
                    let e = ExtractionError::Timeout {
                        secs: timeout.as_secs(),
                    };
                    tracing::warn!(download_id = %id, index = item.index, "item timed out");
                    self.store
                        .update_item(id, item.index, ItemPatch::failed(e.to_string()))
                        .await?;
                }
            }
        }

        self.store.set_current_item(id, None).await?;

        let batch = self.store.get_batch(id).await?;
        if cancelled || cancel.is_cancelled() {
            self.store.set_error(id, "cancelled by request").await?;
            self.store.set_status(id, BatchStatus::Cancelled).await?;
            tracing::info!(
                download_id = %id,
                completed = batch.completed_count,
                "batch cancelled"
            );
            return Ok(());
        }

        // Partial failure is still batch-level success as long as anything
        // was produced; failed items stay flagged in the item list
        if batch.completed_count > 0 {
            self.store.set_status(id, BatchStatus::Completed).await?;
            tracing::info!(
                download_id = %id,
                completed = batch.completed_count,
                failed = batch.failed_count,
                "batch completed"
            );
            self.maybe_auto_archive(id, &batch.folder).await;
        } else {
            self.store.set_error(id, "no items were downloaded").await?;
            self.store.set_status(id, BatchStatus::Failed).await?;
            tracing::warn!(download_id = %id, failed = batch.failed_count, "batch failed");
        }

        Ok(())
    }

    /// Forward item percent updates from the extractor into the store
    ///
    /// Runs until the extractor drops its sender. Store rejections (e.g. the
    /// item reached a terminal state first) are ignored; progress is advisory.
    fn spawn_progress_forwarder(
        &self,
        id: DownloadId,
        index: usize,
        mut rx: mpsc::UnboundedReceiver<u8>,
    ) -> tokio::task::JoinHandle<()> {
        let store = self.store.clone();
        tokio::spawn(async move {
            while let Some(percent) = rx.recv().await {
                let _ = store
                    .update_item(&id, index, ItemPatch::progress(percent))
                    .await;
            }
        })
    }

    /// Assemble the archive and reclaim intermediate files right after a
    /// successful multi-item batch, when configured to
    async fn maybe_auto_archive(&self, id: &DownloadId, folder: &Option<String>) {
        if !self.config.download.auto_archive_on_complete || folder.is_none() {
            return;
        }

        let archiver = ArchiveAssembler::new(self.store.clone(), self.config.clone());
        match archiver.create_archive(id).await {
            Ok(info) => {
                tracing::info!(download_id = %id, archive = %info.file, "auto-archive assembled");
                if let Err(e) = archiver.cleanup(id, true).await {
                    tracing::warn!(download_id = %id, error = %e, "auto-archive cleanup failed");
                }
            }
            Err(e) => {
                tracing::warn!(download_id = %id, error = %e, "auto-archive failed");
            }
        }
    }
}
