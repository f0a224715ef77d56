//! Archive assembler — batch packaging and disk reclamation
//!
//! Packages every completed item of a `completed` batch into one zip under
//! the download root, records the artifact on the batch, and cleans up
//! intermediate files on request. Both operations are idempotent so clients
//! can retry them blindly.

use crate::config::Config;
use crate::error::{ArchiveError, Error, Result, StoreError};
use crate::store::JobStore;
use crate::types::{BatchJob, BatchStatus, DownloadId, ItemStatus, ProducedFile};
use crate::utils;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use utoipa::ToSchema;

/// A packaged archive artifact
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ArchiveInfo {
    /// Archive file name under the download root
    pub file: String,

    /// Archive size in bytes
    pub size_bytes: u64,
}

/// Packages batches and reclaims their intermediate files
#[derive(Clone)]
pub struct ArchiveAssembler {
    store: Arc<dyn JobStore>,
    config: Arc<Config>,
}

impl ArchiveAssembler {
    /// Create an assembler over the given store
    pub fn new(store: Arc<dyn JobStore>, config: Arc<Config>) -> Self {
        Self { store, config }
    }

    fn batch_dir(&self, batch: &BatchJob) -> PathBuf {
        match &batch.folder {
            Some(folder) => self.config.download.download_dir.join(folder),
            None => self.config.download.download_dir.clone(),
        }
    }

    /// Absolute paths of every completed item file, in item order
    fn completed_files(&self, batch: &BatchJob) -> Vec<(String, PathBuf)> {
        let dir = self.batch_dir(batch);
        batch
            .items
            .iter()
            .filter(|item| item.status == ItemStatus::Completed)
            .filter_map(|item| item.file.as_ref())
            .map(|name| (name.clone(), dir.join(name)))
            .collect()
    }

    /// Assemble the batch's archive, or return the already-assembled one
    ///
    /// Fails with a not-found error for unknown identifiers and with a
    /// not-terminal error for batches that have not reached `completed`.
    /// Calling twice returns the same reference without repackaging.
    pub async fn create_archive(&self, id: &DownloadId) -> Result<ArchiveInfo> {
        let batch = self.store.get_batch(id).await.map_err(|e| match e {
            Error::Store(StoreError::BatchNotFound { id }) => {
                Error::Archive(ArchiveError::BatchNotFound { id })
            }
            e => e,
        })?;

        // Idempotency: a recorded artifact that is still on disk wins
        if let Some(existing) = &batch.archive_file {
            let path = self.config.download.download_dir.join(existing);
            if let Ok(meta) = tokio::fs::metadata(&path).await {
                return Ok(ArchiveInfo {
                    file: existing.clone(),
                    size_bytes: meta.len(),
                });
            }
        }

        if batch.overall_status != BatchStatus::Completed {
            return Err(ArchiveError::NotTerminal {
                id: id.to_string(),
                status: batch.overall_status.to_string(),
            }
            .into());
        }

        let files = self.completed_files(&batch);
        if files.is_empty() {
            return Err(ArchiveError::NoCompletedItems {
                id: id.to_string(),
            }
            .into());
        }

        let archive_name = format!("{}.zip", utils::sanitize_filename(&batch.title));
        let archive_path = self.config.download.download_dir.join(&archive_name);

        let size_bytes = {
            let archive_path = archive_path.clone();
            tokio::task::spawn_blocking(move || build_zip(&archive_path, &files))
                .await
                .map_err(|e| Error::Other(format!("archive task panicked: {e}")))??
        };

        self.store.set_archive_file(id, &archive_name).await?;
        tracing::info!(
            download_id = %id,
            archive = %archive_name,
            size_bytes,
            "archive assembled"
        );

        Ok(ArchiveInfo {
            file: archive_name,
            size_bytes,
        })
    }

    /// Delete the batch's intermediate files (and the archive, unless kept)
    ///
    /// Idempotent: unknown identifiers and already-cleaned batches succeed
    /// with a zero count.
    pub async fn cleanup(&self, id: &DownloadId, keep_archive: bool) -> Result<usize> {
        let batch = match self.store.get_batch(id).await {
            Ok(batch) => batch,
            Err(Error::Store(StoreError::BatchNotFound { .. })) => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut deleted = 0usize;
        for (_, path) in self.completed_files(&batch) {
            if tokio::fs::remove_file(&path).await.is_ok() {
                deleted += 1;
            }
        }

        // Batch-scoped folders come out with their leftovers (partial
        // downloads, covers); the shared root is never removed
        if let Some(folder) = &batch.folder {
            let dir = self.config.download.download_dir.join(folder);
            let _ = tokio::fs::remove_dir_all(&dir).await;
        }

        if !keep_archive
            && let Some(archive) = &batch.archive_file
        {
            let path = self.config.download.download_dir.join(archive);
            if tokio::fs::remove_file(&path).await.is_ok() {
                deleted += 1;
            }
            self.store.clear_archive_file(id).await?;
        }

        tracing::info!(download_id = %id, deleted, keep_archive, "cleanup finished");
        Ok(deleted)
    }

    /// List the batch's produced files that are present on disk
    pub async fn list_files(&self, id: &DownloadId) -> Result<Vec<ProducedFile>> {
        let batch = self.store.get_batch(id).await?;

        let mut files = Vec::new();
        for (name, path) in self.completed_files(&batch) {
            if let Ok(meta) = tokio::fs::metadata(&path).await {
                files.push(ProducedFile {
                    name,
                    size_bytes: meta.len(),
                    path,
                });
            }
        }
        Ok(files)
    }
}

/// Write the archive synchronously (runs on the blocking pool)
fn build_zip(archive_path: &Path, files: &[(String, PathBuf)]) -> Result<u64> {
    use std::io::Write;

    let out = std::fs::File::create(archive_path)?;
    let mut writer = zip::ZipWriter::new(out);
    let options = zip::write::FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for (name, path) in files {
        writer
            .start_file(name.as_str(), options)
            .map_err(|e| Error::Other(format!("zip entry {name}: {e}")))?;
        let mut src = std::fs::File::open(path)?;
        std::io::copy(&mut src, &mut writer)?;
    }

    let mut out = writer
        .finish()
        .map_err(|e| Error::Other(format!("zip finish: {e}")))?;
    out.flush()?;
    let size = out.metadata()?.len();
    Ok(size)
}
