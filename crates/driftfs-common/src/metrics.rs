//! Latency recording shared by the per-subsystem metrics structs

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free latency accumulator (microseconds)
#[derive(Debug, Default)]
pub struct LatencyRecorder {
    count: AtomicU64,
    sum_us: AtomicU64,
    max_us: AtomicU64,
}

impl LatencyRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sample in microseconds
    pub fn record(&self, us: u64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_us.fetch_add(us, Ordering::Relaxed);
        self.max_us.fetch_max(us, Ordering::Relaxed);
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn sum_us(&self) -> u64 {
        self.sum_us.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn max_us(&self) -> u64 {
        self.max_us.load(Ordering::Relaxed)
    }

    /// Mean sample in microseconds, zero when empty
    #[must_use]
    pub fn avg_us(&self) -> u64 {
        let count = self.count();
        if count == 0 {
            return 0;
        }
        self.sum_us() / count
    }
}
