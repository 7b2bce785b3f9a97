//! Configuration types for driftfs
//!
//! This module defines configuration structures used across components.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Write-back disk cache configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WriteCacheConfig {
    /// Directory holding staged objects
    pub cache_dir: PathBuf,
    /// Number of leading directory levels embedded in object names.
    /// Zero means flat `_`-separated names directly under `cache_dir`.
    pub prefix_depth: u32,
    /// Period of the background uploader loop in milliseconds; also the
    /// polling interval of the per-inode fence
    pub upload_period_ms: u64,
    /// Issue a data-sync after every staged write
    pub fsync_on_write: bool,
}

impl Default for WriteCacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("/var/lib/driftfs/write-cache"),
            prefix_depth: 0,
            upload_period_ms: 500,
            fsync_on_write: false,
        }
    }
}

/// Apply queue configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApplyQueueConfig {
    /// Number of shards (one worker thread per shard)
    pub shard_count: usize,
    /// Maximum queued tasks per shard before submitters block
    pub queue_depth: usize,
}

impl Default for ApplyQueueConfig {
    fn default() -> Self {
        Self {
            shard_count: 4,
            queue_depth: 1024,
        }
    }
}
