//! Error types for trackdl
//!
//! This module provides comprehensive error handling for the library, including:
//! - Domain-specific error types (Store, Extraction, Archive)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for trackdl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for trackdl
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed input, surfaced immediately, never retried
    #[error("validation error: {0}")]
    Validation(String),

    /// URL does not match any supported platform pattern
    #[error("unsupported URL: {0}")]
    UnsupportedUrl(String),

    /// Platform was recognized but metadata/listing could not be fetched (transient)
    #[error("resolution failed: {0}")]
    Resolution(String),

    /// Job store error
    #[error("job store error: {0}")]
    Store(#[from] StoreError),

    /// Extraction error surfaced from a resolve or start operation
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Archive assembly error
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Produced file not found on disk
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServer(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Job store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// No batch is registered under the given download identifier
    #[error("download {id} not found")]
    BatchNotFound {
        /// The download identifier that was not found
        id: String,
    },

    /// Item index outside the batch's item list
    #[error("item {index} out of range for download {id} ({len} items)")]
    ItemOutOfRange {
        /// The download identifier
        id: String,
        /// The offending item index
        index: usize,
        /// Number of items in the batch
        len: usize,
    },

    /// Attempted mutation of an item already in a terminal state
    #[error("item {index} of download {id} is already {status}")]
    ItemTerminal {
        /// The download identifier
        id: String,
        /// The item index
        index: usize,
        /// The terminal status the item is in
        status: String,
    },

    /// Attempted mutation of a batch already in a terminal state
    #[error("download {id} is already {status}")]
    BatchTerminal {
        /// The download identifier
        id: String,
        /// The terminal status the batch is in
        status: String,
    },
}

/// Item-level extraction errors
///
/// These are recorded on the failing item and never abort sibling items.
/// They only propagate to a caller when a resolve or start operation itself fails.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Per-item timeout exceeded
    #[error("extraction timed out after {secs}s")]
    Timeout {
        /// The configured per-item timeout that was exceeded
        secs: u64,
    },

    /// Extraction aborted by a cancellation request
    #[error("extraction cancelled")]
    Cancelled,

    /// Extractor binary could not be located
    #[error("extractor binary not found: {0}")]
    MissingBinary(String),

    /// The extractor tool ran but reported failure
    #[error("extractor failed: {message}")]
    Tool {
        /// Human-readable failure description from the tool
        message: String,
    },

    /// Extractor output could not be parsed
    #[error("could not parse extractor output: {0}")]
    Parse(String),

    /// I/O failure while driving the extractor
    #[error("extractor I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractionError {
    /// Whether this error was caused by the per-item timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExtractionError::Timeout { .. })
    }

    /// Whether this error was caused by a cancellation request
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExtractionError::Cancelled)
    }
}

/// Archive assembly errors
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// No batch is registered under the given download identifier
    #[error("download {id} not found")]
    BatchNotFound {
        /// The download identifier that was not found
        id: String,
    },

    /// Archive requested before the batch reached `completed`
    #[error("download {id} has not completed (status {status})")]
    NotTerminal {
        /// The download identifier
        id: String,
        /// The batch's current status
        status: String,
    },

    /// The batch completed but produced no files to package
    #[error("download {id} has no completed files to archive")]
    NoCompletedItems {
        /// The download identifier
        id: String,
    },
}

/// API error response format
///
/// This structure is returned by API endpoints when an error occurs.
/// It follows a standard format with machine-readable error codes,
/// human-readable messages, and optional contextual details.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "not_found",
///     "message": "download a1b2c3 not found",
///     "details": {
///       "download_id": "a1b2c3"
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "validation_error")
    ///
    /// Clients can use this for programmatic error handling.
    pub code: String,

    /// Human-readable error message
    ///
    /// This is suitable for displaying to end users.
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an API error with additional details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
///
/// This trait maps domain errors to appropriate HTTP status codes.
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Validation(_) => 400,
            Error::UnsupportedUrl(_) => 400,

            // 404 Not Found
            Error::FileNotFound(_) => 404,
            Error::Store(StoreError::BatchNotFound { .. }) => 404,
            Error::Archive(ArchiveError::BatchNotFound { .. }) => 404,

            // 409 Conflict - Resource in the wrong state for the operation
            Error::Store(_) => 409,
            Error::Archive(ArchiveError::NotTerminal { .. }) => 409,

            // 422 Unprocessable Entity - Semantic errors
            Error::Archive(ArchiveError::NoCompletedItems { .. }) => 422,

            // 502 Bad Gateway / 504 Gateway Timeout - External resolver errors
            Error::Resolution(_) => 502,
            Error::Extraction(ExtractionError::Timeout { .. }) => 504,
            Error::Extraction(_) => 502,

            // 500 Internal Server Error - Server-side issues
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServer(_) => 500,
            Error::Other(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::UnsupportedUrl(_) => "unsupported_url",
            Error::Resolution(_) => "resolution_error",
            Error::Store(e) => match e {
                StoreError::BatchNotFound { .. } => "download_not_found",
                StoreError::ItemOutOfRange { .. } => "item_out_of_range",
                StoreError::ItemTerminal { .. } => "item_terminal",
                StoreError::BatchTerminal { .. } => "batch_terminal",
            },
            Error::Extraction(e) => match e {
                ExtractionError::Timeout { .. } => "extraction_timeout",
                ExtractionError::Cancelled => "extraction_cancelled",
                ExtractionError::MissingBinary(_) => "missing_binary",
                ExtractionError::Tool { .. } => "extraction_error",
                ExtractionError::Parse(_) => "extraction_error",
                ExtractionError::Io(_) => "extraction_error",
            },
            Error::Archive(e) => match e {
                ArchiveError::BatchNotFound { .. } => "download_not_found",
                ArchiveError::NotTerminal { .. } => "batch_not_terminal",
                ArchiveError::NoCompletedItems { .. } => "no_completed_items",
            },
            Error::FileNotFound(_) => "file_not_found",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServer(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        // Add contextual details for specific error types
        let details = match &error {
            Error::Store(StoreError::BatchNotFound { id })
            | Error::Archive(ArchiveError::BatchNotFound { id }) => Some(serde_json::json!({
                "download_id": id,
            })),
            Error::Archive(ArchiveError::NotTerminal { id, status }) => Some(serde_json::json!({
                "download_id": id,
                "status": status,
            })),
            Error::Store(StoreError::ItemOutOfRange { id, index, len }) => {
                Some(serde_json::json!({
                    "download_id": id,
                    "index": index,
                    "total_items": len,
                }))
            }
            Error::FileNotFound(name) => Some(serde_json::json!({
                "file": name,
            })),
            Error::Extraction(ExtractionError::Timeout { secs }) => Some(serde_json::json!({
                "timeout_secs": secs,
            })),
            _ => None,
        };

        match details {
            Some(details) => ApiError::with_details(code, message, details),
            None => ApiError::new(code, message),
        }
    }
}
