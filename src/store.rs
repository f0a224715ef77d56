//! Job store — process-wide registry of batch download state
//!
//! The store is the only shared mutable state in the library. Writes to a
//! given batch are serialized through a per-batch mutex and every aggregate
//! field is recomputed inside the same critical section as the item mutation,
//! so readers always observe a consistent snapshot. Each batch carries a
//! watch channel holding its latest snapshot; the progress publisher builds
//! subscriber streams from receivers of that channel.

use crate::error::{Result, StoreError};
use crate::types::{
    BatchJob, BatchStatus, CollectionKind, DownloadId, DownloadOptions, ItemDescriptor, ItemJob,
    ItemStatus, Platform,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{RwLock, watch};

/// Everything needed to register a new batch
#[derive(Clone, Debug)]
pub struct NewBatch {
    /// What the source URL referred to
    pub kind: CollectionKind,
    /// Source platform
    pub platform: Platform,
    /// Collection title
    pub title: String,
    /// Requested quality and format
    pub options: DownloadOptions,
    /// Batch-scoped folder name (None for single tracks)
    pub folder: Option<String>,
    /// Ordered item descriptors
    pub items: Vec<ItemDescriptor>,
}

/// Partial update applied atomically to one item job
#[derive(Clone, Debug, Default)]
pub struct ItemPatch {
    /// New status
    pub status: Option<ItemStatus>,
    /// New progress percent
    pub progress: Option<u8>,
    /// Error message (failed items)
    pub error: Option<String>,
    /// Produced file name (completed items)
    pub file: Option<String>,
}

impl ItemPatch {
    /// Patch setting only the status
    pub fn status(status: ItemStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Patch setting only the progress percent
    pub fn progress(percent: u8) -> Self {
        Self {
            progress: Some(percent),
            ..Self::default()
        }
    }

    /// Patch marking the item completed with its produced file
    pub fn completed(file: impl Into<String>) -> Self {
        Self {
            status: Some(ItemStatus::Completed),
            progress: Some(100),
            file: Some(file.into()),
            ..Self::default()
        }
    }

    /// Patch marking the item failed with an error message
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(ItemStatus::Failed),
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// The injectable job store interface
///
/// The in-memory implementation is process-lifetime; the interface exists so
/// a persistent or distributed store can replace it without touching the
/// executor or publisher.
#[async_trait]
pub trait JobStore: Send + Sync + 'static {
    /// Register a new batch, returning its freshly allocated identifier
    async fn create_batch(&self, new: NewBatch) -> Result<DownloadId>;

    /// Snapshot a batch by identifier
    async fn get_batch(&self, id: &DownloadId) -> Result<BatchJob>;

    /// Snapshot every known batch
    async fn list_batches(&self) -> Vec<BatchJob>;

    /// Apply a partial update to one item and recompute aggregates atomically
    async fn update_item(&self, id: &DownloadId, index: usize, patch: ItemPatch) -> Result<()>;

    /// Transition the batch's overall status (idempotent on repeat)
    async fn set_status(&self, id: &DownloadId, status: BatchStatus) -> Result<()>;

    /// Record which item the executor is currently processing
    async fn set_current_item(&self, id: &DownloadId, index: Option<usize>) -> Result<()>;

    /// Record a batch-level error message
    async fn set_error(&self, id: &DownloadId, message: &str) -> Result<()>;

    /// Record the assembled archive file name
    async fn set_archive_file(&self, id: &DownloadId, file: &str) -> Result<()>;

    /// Clear the recorded archive file name (after cleanup deletes it)
    async fn clear_archive_file(&self, id: &DownloadId) -> Result<()>;

    /// Remove a batch; unknown identifiers are a no-op so cleanup stays
    /// idempotent
    async fn delete_batch(&self, id: &DownloadId);

    /// Watch receiver for this batch's snapshots
    async fn subscribe(&self, id: &DownloadId) -> Result<watch::Receiver<BatchJob>>;
}

struct BatchSlot {
    /// Canonical state; the per-batch write serialization point
    state: Mutex<BatchJob>,
    /// Latest snapshot for subscribers
    tx: watch::Sender<BatchJob>,
}

impl BatchSlot {
    /// Mutate the batch under its lock and publish the resulting snapshot
    fn mutate<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut BatchJob) -> Result<()>,
    {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            // A panic while holding the lock cannot corrupt BatchJob (plain
            // data, no unsafe); recover the guard and continue
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut state)?;
        state.updated_at = Utc::now();
        self.tx.send_replace(state.clone());
        Ok(())
    }

    fn snapshot(&self) -> BatchJob {
        match self.state.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// In-memory process-lifetime job store
///
/// Entries live until `delete_batch` or process shutdown — never silently
/// evicted.
#[derive(Default)]
pub struct MemoryJobStore {
    slots: RwLock<HashMap<DownloadId, Arc<BatchSlot>>>,
}

impl MemoryJobStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, id: &DownloadId) -> Result<Arc<BatchSlot>> {
        let slots = self.slots.read().await;
        slots
            .get(id)
            .cloned()
            .ok_or_else(|| {
                StoreError::BatchNotFound {
                    id: id.to_string(),
                }
                .into()
            })
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create_batch(&self, new: NewBatch) -> Result<DownloadId> {
        let mut slots = self.slots.write().await;

        // Collision probability is effectively zero for 32-char random
        // tokens, but the loop keeps uniqueness a guarantee instead of a hope
        let id = loop {
            let candidate = DownloadId::generate();
            if !slots.contains_key(&candidate) {
                break candidate;
            }
        };

        let now = Utc::now();
        let job = BatchJob {
            id: id.clone(),
            kind: new.kind,
            platform: new.platform,
            title: new.title,
            quality: new.options.quality,
            format: new.options.format,
            folder: new.folder,
            items: new.items.iter().map(ItemJob::pending).collect(),
            overall_status: BatchStatus::Starting,
            overall_progress: 0,
            completed_count: 0,
            failed_count: 0,
            current_index: None,
            current_progress: 0,
            error: None,
            archive_file: None,
            created_at: now,
            updated_at: now,
        };

        let (tx, _rx) = watch::channel(job.clone());
        slots.insert(
            id.clone(),
            Arc::new(BatchSlot {
                state: Mutex::new(job),
                tx,
            }),
        );

        tracing::debug!(download_id = %id, "batch registered");
        Ok(id)
    }

    async fn get_batch(&self, id: &DownloadId) -> Result<BatchJob> {
        Ok(self.slot(id).await?.snapshot())
    }

    async fn list_batches(&self) -> Vec<BatchJob> {
        let slots = self.slots.read().await;
        let mut batches: Vec<BatchJob> = slots.values().map(|slot| slot.snapshot()).collect();
        batches.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        batches
    }

    async fn update_item(&self, id: &DownloadId, index: usize, patch: ItemPatch) -> Result<()> {
        let slot = self.slot(id).await?;
        slot.mutate(|job| {
            if job.overall_status.is_terminal() {
                return Err(StoreError::BatchTerminal {
                    id: id.to_string(),
                    status: job.overall_status.to_string(),
                }
                .into());
            }

            let len = job.items.len();
            let item = job.items.get_mut(index).ok_or(StoreError::ItemOutOfRange {
                id: id.to_string(),
                index,
                len,
            })?;

            if item.status.is_terminal() {
                return Err(StoreError::ItemTerminal {
                    id: id.to_string(),
                    index,
                    status: item.status.to_string(),
                }
                .into());
            }

            if let Some(status) = patch.status {
                item.status = status;
            }
            if let Some(progress) = patch.progress {
                item.progress = progress.min(100);
            }
            if let Some(error) = patch.error {
                item.error = Some(error);
            }
            if let Some(file) = patch.file {
                item.file = Some(file);
            }

            job.recompute_aggregates();
            Ok(())
        })
    }

    async fn set_status(&self, id: &DownloadId, status: BatchStatus) -> Result<()> {
        let slot = self.slot(id).await?;
        slot.mutate(|job| {
            if job.overall_status == status {
                return Ok(());
            }
            if job.overall_status.is_terminal() {
                return Err(StoreError::BatchTerminal {
                    id: id.to_string(),
                    status: job.overall_status.to_string(),
                }
                .into());
            }
            job.overall_status = status;
            if status.is_terminal() {
                job.current_index = None;
                job.recompute_aggregates();
            }
            Ok(())
        })
    }

    async fn set_current_item(&self, id: &DownloadId, index: Option<usize>) -> Result<()> {
        let slot = self.slot(id).await?;
        slot.mutate(|job| {
            job.current_index = index;
            job.recompute_aggregates();
            Ok(())
        })
    }

    async fn set_error(&self, id: &DownloadId, message: &str) -> Result<()> {
        let slot = self.slot(id).await?;
        slot.mutate(|job| {
            job.error = Some(message.to_string());
            Ok(())
        })
    }

    async fn set_archive_file(&self, id: &DownloadId, file: &str) -> Result<()> {
        let slot = self.slot(id).await?;
        slot.mutate(|job| {
            job.archive_file = Some(file.to_string());
            Ok(())
        })
    }

    async fn clear_archive_file(&self, id: &DownloadId) -> Result<()> {
        let slot = self.slot(id).await?;
        slot.mutate(|job| {
            job.archive_file = None;
            Ok(())
        })
    }

    async fn delete_batch(&self, id: &DownloadId) {
        let removed = self.slots.write().await.remove(id);
        if removed.is_some() {
            tracing::debug!(download_id = %id, "batch evicted");
        }
    }

    async fn subscribe(&self, id: &DownloadId) -> Result<watch::Receiver<BatchJob>> {
        Ok(self.slot(id).await?.tx.subscribe())
    }
}
