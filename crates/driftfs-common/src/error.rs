//! Error types for driftfs
//!
//! This module defines the common error types used throughout the system.

use thiserror::Error;

/// Common result type for driftfs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for driftfs
#[derive(Debug, Error)]
pub enum Error {
    // Write cache errors
    #[error("cache I/O error: {0}")]
    CacheIo(#[from] std::io::Error),

    #[error("cache directory is not usable: {0}")]
    CacheDirInvalid(String),

    #[error("staged object not found: {0}")]
    StagedObjectNotFound(String),

    #[error("short write: wrote {written} of {expected} bytes for {name}")]
    ShortWrite {
        name: String,
        written: u64,
        expected: u64,
    },

    #[error("short read: got {got} of {expected} bytes for {name}")]
    ShortRead {
        name: String,
        got: u64,
        expected: u64,
    },

    // Uploader lifecycle errors
    #[error("uploader is already running")]
    AlreadyRunning,

    #[error("uploader is not running")]
    NotRunning,

    #[error("upload failed: {0}")]
    UploadFailed(String),

    // Replication log codec errors
    #[error("log entry encode failed: {0}")]
    EncodeFailed(String),

    #[error("log entry decode failed: {0}")]
    DecodeFailed(String),

    // Streaming errors
    #[error("stream connection closed: {0}")]
    StreamClosed(String),

    // Internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an upload failure
    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }

    /// Create an encode failure
    pub fn encode_failed(msg: impl Into<String>) -> Self {
        Self::EncodeFailed(msg.into())
    }

    /// Create a decode failure
    pub fn decode_failed(msg: impl Into<String>) -> Self {
        Self::DecodeFailed(msg.into())
    }

    /// Check if this is a not found error
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::StagedObjectNotFound(_) => true,
            Self::CacheIo(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Check if the operation can safely be retried by the periodic loop
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CacheIo(_) | Self::ShortRead { .. } | Self::UploadFailed(_)
        )
    }
}
