//! The `MusicDownloader` facade
//!
//! Owns the job store, the extraction capability, and the cancellation tokens
//! of running batches, and wires the resolver, executor, publisher, and
//! archive assembler together. The REST API layer talks exclusively to this
//! type; embedding applications can use it directly.

use crate::archive::{ArchiveAssembler, ArchiveInfo};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::BatchExecutor;
use crate::extraction::{AudioExtractor, CliExtractor};
use crate::publisher::ProgressPublisher;
use crate::resolver::{self, TrackResolver};
use crate::store::{JobStore, MemoryJobStore, NewBatch};
use crate::types::{
    BatchJob, BatchStatus, CollectionInfo, CollectionKind, DownloadId, DownloadOptions,
    ItemDescriptor, Platform, ProducedFile, TrackMetadata,
};
use crate::utils;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

/// Response to a successfully started download
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct StartedDownload {
    /// Identifier for progress subscription and later operations
    pub id: DownloadId,

    /// Collection (or track) title
    pub title: String,

    /// What the URL referred to
    pub kind: CollectionKind,

    /// Source platform
    pub platform: Platform,

    /// True number of tracks the platform listed
    pub total_tracks: usize,

    /// Number of items actually admitted into the batch
    pub queued_tracks: usize,

    /// Whether the batch was truncated to the configured cap
    pub limited: bool,
}

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct MusicDownloader {
    /// Configuration (wrapped in Arc for sharing across tasks)
    config: Arc<Config>,
    /// Job store; the only shared mutable state
    store: Arc<dyn JobStore>,
    resolver: TrackResolver,
    executor: BatchExecutor,
    publisher: ProgressPublisher,
    archiver: ArchiveAssembler,
    /// Map of running batches to their cancellation tokens
    active: Arc<Mutex<HashMap<DownloadId, CancellationToken>>>,
}

impl MusicDownloader {
    /// Create a downloader with the CLI-backed extraction capability
    ///
    /// Fails if the configuration is inconsistent or the yt-dlp binary
    /// cannot be located.
    pub fn new(config: Config) -> Result<Self> {
        let extractor = Arc::new(CliExtractor::discover(&config.tools)?);
        Self::with_extractor(config, extractor)
    }

    /// Create a downloader over a custom extraction capability
    ///
    /// This is the seam tests and embedders use to swap the extractor.
    pub fn with_extractor(config: Config, extractor: Arc<dyn AudioExtractor>) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());

        let resolver = TrackResolver::new(
            extractor.clone(),
            config.download.max_items_per_batch,
            config.resolve_timeout(),
        );
        let executor = BatchExecutor::new(store.clone(), extractor, config.clone());
        let publisher = ProgressPublisher::new(store.clone());
        let archiver = ArchiveAssembler::new(store.clone(), config.clone());

        Ok(Self {
            config,
            store,
            resolver,
            executor,
            publisher,
            archiver,
            active: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// The configuration this instance was built with
    pub fn config(&self) -> Arc<Config> {
        self.config.clone()
    }

    /// Resolve a single track URL into its metadata without downloading
    pub async fn resolve_track(&self, url: &str) -> Result<TrackMetadata> {
        self.resolver.resolve_track(url).await
    }

    /// Resolve any supported URL into an ordered collection listing
    pub async fn resolve_collection(&self, url: &str) -> Result<CollectionInfo> {
        self.resolver.resolve_collection(url).await
    }

    /// Start a single-track download
    ///
    /// Runs the same batch machinery with one item; callers fetch the
    /// produced file directly by name once the download completes.
    pub async fn start_track(
        &self,
        url: &str,
        options: DownloadOptions,
    ) -> Result<StartedDownload> {
        let classified = resolver::classify(url)?;
        if classified.kind != CollectionKind::Track {
            return Err(Error::Validation(format!(
                "expected a single track URL, got a {}; use the collection endpoint",
                classified.kind
            )));
        }
        let info = self.resolver.resolve_collection(url).await?;
        self.start_from_info(info, options).await
    }

    /// Start a batch download of an album or playlist (a single-track URL
    /// becomes a one-item batch)
    pub async fn start_collection(
        &self,
        url: &str,
        options: DownloadOptions,
    ) -> Result<StartedDownload> {
        let info = self.resolver.resolve_collection(url).await?;
        self.start_from_info(info, options).await
    }

    async fn start_from_info(
        &self,
        info: CollectionInfo,
        options: DownloadOptions,
    ) -> Result<StartedDownload> {
        let folder = match info.kind {
            CollectionKind::Track => None,
            _ => Some(utils::collection_folder(&info.title, info.kind, info.platform)),
        };

        let id = self
            .store
            .create_batch(NewBatch {
                kind: info.kind,
                platform: info.platform,
                title: info.title.clone(),
                options,
                folder: folder.clone(),
                items: info.items.clone(),
            })
            .await?;

        tracing::info!(
            download_id = %id,
            title = %info.title,
            total = info.items.len(),
            quality = %options.quality,
            format = %options.format,
            "download started"
        );

        self.spawn_execute(id.clone(), info.items.clone(), options, folder)
            .await;

        Ok(StartedDownload {
            id,
            title: info.title,
            kind: info.kind,
            platform: info.platform,
            total_tracks: info.total_tracks,
            queued_tracks: info.items.len(),
            limited: info.limited,
        })
    }

    /// Register the cancellation token, then run the batch on its own task
    async fn spawn_execute(
        &self,
        id: DownloadId,
        items: Vec<ItemDescriptor>,
        options: DownloadOptions,
        folder: Option<String>,
    ) {
        let dest = match &folder {
            Some(folder) => self.config.download.download_dir.join(folder),
            None => self.config.download.download_dir.clone(),
        };

        let token = CancellationToken::new();
        self.active.lock().await.insert(id.clone(), token.clone());

        let executor = self.executor.clone();
        let active = self.active.clone();
        tokio::spawn(async move {
            executor
                .execute(id.clone(), items, options, dest, token)
                .await;
            active.lock().await.remove(&id);
        });
    }

    /// Cooperatively cancel a running batch
    ///
    /// Takes effect at the next safe point; already-terminal batches are a
    /// no-op. Unknown identifiers fail with a not-found error.
    pub async fn cancel(&self, id: &DownloadId) -> Result<()> {
        let batch = self.store.get_batch(id).await?;
        if batch.is_terminal() {
            return Ok(());
        }

        if let Some(token) = self.active.lock().await.get(id) {
            tracing::info!(download_id = %id, "cancellation requested");
            token.cancel();
            return Ok(());
        }

        // No executor is running (it already exited, or never started);
        // settle the state directly so nothing stays stuck downloading
        self.store.set_error(id, "cancelled by request").await?;
        self.store.set_status(id, BatchStatus::Cancelled).await?;
        Ok(())
    }

    /// Snapshot a batch by identifier
    pub async fn get_batch(&self, id: &DownloadId) -> Result<BatchJob> {
        self.store.get_batch(id).await
    }

    /// Snapshot every known batch, oldest first
    pub async fn list_batches(&self) -> Vec<BatchJob> {
        self.store.list_batches().await
    }

    /// Subscribe to a batch's progress snapshot stream
    pub async fn subscribe(&self, id: &DownloadId) -> Result<BoxStream<'static, BatchJob>> {
        self.publisher.subscribe(id).await
    }

    /// Evict a batch's tracking state (idempotent)
    ///
    /// A running batch is cancelled first; files on disk are untouched
    /// (use [`cleanup`](Self::cleanup) for those).
    pub async fn delete_batch(&self, id: &DownloadId) {
        if let Some(token) = self.active.lock().await.remove(id) {
            token.cancel();
        }
        self.store.delete_batch(id).await;
    }

    /// Assemble (or return the existing) archive for a completed batch
    pub async fn create_archive(&self, id: &DownloadId) -> Result<ArchiveInfo> {
        self.archiver.create_archive(id).await
    }

    /// Delete a batch's intermediate files; optionally keep the archive
    pub async fn cleanup(&self, id: &DownloadId, keep_archive: bool) -> Result<usize> {
        self.archiver.cleanup(id, keep_archive).await
    }

    /// List the batch's produced files present on disk
    pub async fn list_files(&self, id: &DownloadId) -> Result<Vec<ProducedFile>> {
        self.archiver.list_files(id).await
    }

    /// Resolve a produced file name to its on-disk path
    ///
    /// Looks in the download root and one level of batch folders. Rejects
    /// names that could escape the download root.
    pub async fn file_path(&self, name: &str) -> Result<PathBuf> {
        if !utils::is_safe_file_name(name) {
            return Err(Error::Validation(format!("unsafe file name: {name}")));
        }

        let root = &self.config.download.download_dir;
        let direct = root.join(name);
        if tokio::fs::metadata(&direct)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
        {
            return Ok(direct);
        }

        if let Ok(mut entries) = tokio::fs::read_dir(root).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                    let candidate = entry.path().join(name);
                    if tokio::fs::metadata(&candidate)
                        .await
                        .map(|m| m.is_file())
                        .unwrap_or(false)
                    {
                        return Ok(candidate);
                    }
                }
            }
        }

        Err(Error::FileNotFound(name.to_string()))
    }

    /// Cancel all running batches (graceful shutdown)
    pub async fn shutdown(&self) {
        let active = self.active.lock().await;
        if !active.is_empty() {
            tracing::info!(count = active.len(), "cancelling running batches for shutdown");
        }
        for token in active.values() {
            token.cancel();
        }
    }

    /// Spawn the REST API server for this instance on the configured bind
    /// address
    pub fn spawn_api_server(&self) -> tokio::task::JoinHandle<Result<()>> {
        let downloader = Arc::new(self.clone());
        let config = self.config.clone();
        tokio::spawn(async move { crate::api::start_api_server(downloader, config).await })
    }
}
