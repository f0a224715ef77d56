//! Core types for trackdl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Unique identifier for a download (single track or batch)
///
/// Identifiers are opaque random tokens rather than counters, so they carry no
/// ordering information across batches and are never reused within a process
/// lifetime.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct DownloadId(String);

impl DownloadId {
    /// Length of generated identifier tokens
    const TOKEN_LEN: usize = 32;

    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        use rand::Rng;
        let token: String = rand::thread_rng()
            .sample_iter(&rand::distributions::Alphanumeric)
            .take(Self::TOKEN_LEN)
            .map(char::from)
            .collect();
        Self(token)
    }

    /// View the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for DownloadId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DownloadId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for DownloadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source platform of a URL
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// open.spotify.com
    Spotify,
    /// youtube.com / youtu.be
    Youtube,
    /// music.youtube.com
    YoutubeMusic,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Platform::Spotify => "spotify",
            Platform::Youtube => "youtube",
            Platform::YoutubeMusic => "youtube_music",
        };
        write!(f, "{s}")
    }
}

/// What a resolved URL refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    /// A single track
    Track,
    /// An album
    Album,
    /// A playlist
    Playlist,
}

impl std::fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CollectionKind::Track => "track",
            CollectionKind::Album => "album",
            CollectionKind::Playlist => "playlist",
        };
        write!(f, "{s}")
    }
}

/// Audio quality (target bitrate in kbps)
///
/// Unrecognized values fail deserialization rather than silently falling back
/// to the default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Quality {
    /// 96 kbps - low quality
    #[serde(rename = "96")]
    Kbps96,
    /// 128 kbps - standard quality
    #[serde(rename = "128")]
    Kbps128,
    /// 192 kbps - high quality (default)
    #[default]
    #[serde(rename = "192")]
    Kbps192,
    /// 320 kbps - maximum quality
    #[serde(rename = "320")]
    Kbps320,
}

impl Quality {
    /// All supported qualities, lowest first
    pub fn all() -> [Quality; 4] {
        [
            Quality::Kbps96,
            Quality::Kbps128,
            Quality::Kbps192,
            Quality::Kbps320,
        ]
    }

    /// The numeric bitrate in kbps
    pub fn kbps(&self) -> u32 {
        match self {
            Quality::Kbps96 => 96,
            Quality::Kbps128 => 128,
            Quality::Kbps192 => 192,
            Quality::Kbps320 => 320,
        }
    }

    /// Bitrate argument in the form the extractor CLIs expect (e.g. "192k")
    pub fn bitrate_arg(&self) -> String {
        format!("{}k", self.kbps())
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Quality::Kbps96 => "Low quality",
            Quality::Kbps128 => "Standard quality",
            Quality::Kbps192 => "High quality",
            Quality::Kbps320 => "Maximum quality",
        }
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kbps())
    }
}

/// Output audio container/encoding
///
/// Unrecognized values fail deserialization rather than silently falling back
/// to the default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// MP3 (default)
    #[default]
    Mp3,
    /// WAV
    Wav,
    /// FLAC
    Flac,
}

impl AudioFormat {
    /// File extension without the dot
    pub fn ext(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::Flac => "flac",
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.ext())
    }
}

/// Options for starting a download
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DownloadOptions {
    /// Target bitrate
    #[serde(default)]
    pub quality: Quality,

    /// Output format
    #[serde(default)]
    pub format: AudioFormat,
}

/// How an item can be re-resolved against the extraction capability
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ItemSource {
    /// A concrete source URL
    Url(String),
    /// A search string ("artist - title") the extractor resolves itself
    Search(String),
}

/// One resolvable entry of a batch, immutable once resolved
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ItemDescriptor {
    /// Position within the batch (0-based)
    pub index: usize,

    /// Display name ("Artist - Title")
    pub name: String,

    /// How to re-resolve this item
    pub source: ItemSource,
}

/// Status of a single item within a batch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Not started yet
    Pending,
    /// Currently downloading
    Downloading,
    /// Successfully downloaded
    Completed,
    /// Failed (error recorded on the item)
    Failed,
}

impl ItemStatus {
    /// Whether this status is terminal (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Failed)
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Downloading => "downloading",
            ItemStatus::Completed => "completed",
            ItemStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Overall status of a batch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    /// Created, executor not yet running items
    Starting,
    /// Items are being processed
    Downloading,
    /// All items terminal, at least one succeeded
    Completed,
    /// All items terminal, none succeeded
    Failed,
    /// Cancelled by request before all items finished
    Cancelled,
}

impl BatchStatus {
    /// Whether this status is terminal (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchStatus::Completed | BatchStatus::Failed | BatchStatus::Cancelled
        )
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BatchStatus::Starting => "starting",
            BatchStatus::Downloading => "downloading",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
            BatchStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// State of one item download within a batch
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ItemJob {
    /// Position within the batch (0-based)
    pub index: usize,

    /// Display name ("Artist - Title")
    pub name: String,

    /// Current status
    pub status: ItemStatus,

    /// Download progress of this item (0-100)
    pub progress: u8,

    /// Error message (set when status is failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Produced file name (set when status is completed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl ItemJob {
    /// Build the initial pending job for a descriptor
    pub fn pending(descriptor: &ItemDescriptor) -> Self {
        Self {
            index: descriptor.index,
            name: descriptor.name.clone(),
            status: ItemStatus::Pending,
            progress: 0,
            error: None,
            file: None,
        }
    }
}

/// Full state of one batch download
///
/// Snapshots of this struct are what the progress publisher emits; aggregate
/// fields are recomputed by the job store in the same critical section as any
/// item mutation, so observers never see inconsistent intermediates.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct BatchJob {
    /// Download identifier
    pub id: DownloadId,

    /// What the source URL referred to
    pub kind: CollectionKind,

    /// Source platform
    pub platform: Platform,

    /// Collection title (or "Artist - Title" for a single track)
    pub title: String,

    /// Requested audio quality
    pub quality: Quality,

    /// Requested output format
    pub format: AudioFormat,

    /// Batch-scoped folder name under the download root (None for single tracks)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,

    /// Per-item jobs in resolved order
    pub items: Vec<ItemJob>,

    /// Overall status
    pub overall_status: BatchStatus,

    /// Overall progress (0-100), derived from terminal item counts only
    pub overall_progress: u8,

    /// Number of completed items
    pub completed_count: usize,

    /// Number of failed items
    pub failed_count: usize,

    /// Index of the item currently downloading (None outside the item loop)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_index: Option<usize>,

    /// Progress of the current item (0-100), surfaced separately so the
    /// aggregate stays monotonic
    pub current_progress: u8,

    /// Batch-level error message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Archive file name, once assembled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_file: Option<String>,

    /// When the batch was created
    pub created_at: DateTime<Utc>,

    /// When the batch was last mutated
    pub updated_at: DateTime<Utc>,
}

impl BatchJob {
    /// Total number of items in the batch
    pub fn total_items(&self) -> usize {
        self.items.len()
    }

    /// Whether the batch has reached a terminal status
    pub fn is_terminal(&self) -> bool {
        self.overall_status.is_terminal()
    }

    /// Name of the item currently downloading, if any
    pub fn current_name(&self) -> Option<&str> {
        self.current_index
            .and_then(|i| self.items.get(i))
            .map(|item| item.name.as_str())
    }

    /// Recompute derived aggregate fields from the item list
    ///
    /// Must be called inside the same critical section as the item mutation
    /// that made them stale.
    pub(crate) fn recompute_aggregates(&mut self) {
        self.completed_count = self
            .items
            .iter()
            .filter(|i| i.status == ItemStatus::Completed)
            .count();
        self.failed_count = self
            .items
            .iter()
            .filter(|i| i.status == ItemStatus::Failed)
            .count();

        let total = self.items.len();
        self.overall_progress = if total == 0 {
            0
        } else {
            (100 * (self.completed_count + self.failed_count) / total) as u8
        };

        self.current_progress = self
            .current_index
            .and_then(|i| self.items.get(i))
            .map(|item| item.progress)
            .unwrap_or(0);
    }
}

/// Metadata for a single resolved track
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TrackMetadata {
    /// Track title
    pub title: String,

    /// Artist / uploader, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,

    /// Duration in seconds, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,

    /// Source platform
    pub platform: Platform,
}

impl TrackMetadata {
    /// Display name in "Artist - Title" form
    pub fn display_name(&self) -> String {
        match &self.artist {
            Some(artist) => format!("{} - {}", artist, self.title),
            None => self.title.clone(),
        }
    }
}

/// A resolved collection, ready to become a batch
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CollectionInfo {
    /// What the URL referred to
    pub kind: CollectionKind,

    /// Source platform
    pub platform: Platform,

    /// Collection title
    pub title: String,

    /// Uploader / owner, when the platform reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploader: Option<String>,

    /// True number of tracks the platform listed (may exceed `items.len()`)
    pub total_tracks: usize,

    /// Ordered item descriptors, capped at the configured batch maximum
    pub items: Vec<ItemDescriptor>,

    /// Whether `items` was truncated to the batch cap
    pub limited: bool,
}

/// A file produced by a batch, as reported by the file-listing operation
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ProducedFile {
    /// File name
    pub name: String,

    /// Size in bytes
    pub size_bytes: u64,

    /// Absolute path on disk
    #[schema(value_type = String)]
    pub path: std::path::PathBuf,
}
