//! Write-cache statistics

use driftfs_common::LatencyRecorder;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the write-back path
#[derive(Debug, Default)]
pub struct CacheMetrics {
    /// Successful uploads (terminal attempts)
    pub uploads_ok: AtomicU64,
    /// Bytes shipped by successful uploads
    pub upload_bytes: AtomicU64,
    /// Failed attempts that were re-submitted
    pub upload_retries: AtomicU64,
    /// Staged files removed after upload
    pub removes: AtomicU64,
    /// Local read failures while preparing uploads
    pub read_errors: AtomicU64,
    /// First-attempt-to-success latency
    pub upload_latency: LatencyRecorder,
}

impl CacheMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one successful upload of `bytes` taking `us` microseconds
    pub fn record_upload(&self, bytes: u64, us: u64) {
        self.uploads_ok.fetch_add(1, Ordering::Relaxed);
        self.upload_bytes.fetch_add(bytes, Ordering::Relaxed);
        self.upload_latency.record(us);
    }

    pub fn record_retry(&self) {
        self.upload_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_remove(&self) {
        self.removes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_read_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn uploads_ok(&self) -> u64 {
        self.uploads_ok.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn upload_bytes(&self) -> u64 {
        self.upload_bytes.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn retries(&self) -> u64 {
        self.upload_retries.load(Ordering::Relaxed)
    }
}
