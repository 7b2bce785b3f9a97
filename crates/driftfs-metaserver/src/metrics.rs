//! Per-operator-type metrics

use crate::operator::{OperatorType, OPERATOR_TYPE_COUNT};
use driftfs_common::LatencyRecorder;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall clock in microseconds for latency stamps
#[must_use]
pub fn now_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Default)]
struct OpStat {
    queue_wait_us: LatencyRecorder,
    execute_us: LatencyRecorder,
    total_us: LatencyRecorder,
    complete_ok: AtomicU64,
    complete_err: AtomicU64,
    from_log_ok: AtomicU64,
    from_log_err: AtomicU64,
}

/// Counters and latencies for every operator variant
#[derive(Debug)]
pub struct OperatorMetrics {
    ops: [OpStat; OPERATOR_TYPE_COUNT],
    fast_apply_push_us: LatencyRecorder,
}

impl Default for OperatorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl OperatorMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ops: std::array::from_fn(|_| OpStat::default()),
            fast_apply_push_us: LatencyRecorder::new(),
        }
    }

    fn slot(&self, op: OperatorType) -> &OpStat {
        &self.ops[op as usize]
    }

    /// Time an apply task spent queued before its worker picked it up
    pub fn record_queue_wait(&self, op: OperatorType, us: u64) {
        self.slot(op).queue_wait_us.record(us);
    }

    /// Time the metastore spent executing the operation
    pub fn record_execute(&self, op: OperatorType, us: u64) {
        self.slot(op).execute_us.record(us);
    }

    /// One operator reached its terminal apply state
    pub fn record_complete(&self, op: OperatorType, us: u64, ok: bool) {
        let slot = self.slot(op);
        slot.total_us.record(us);
        if ok {
            slot.complete_ok.fetch_add(1, Ordering::Relaxed);
        } else {
            slot.complete_err.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// One replayed log entry finished
    pub fn record_from_log(&self, op: OperatorType, us: u64, ok: bool) {
        let slot = self.slot(op);
        slot.total_us.record(us);
        if ok {
            slot.from_log_ok.fetch_add(1, Ordering::Relaxed);
        } else {
            slot.from_log_err.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Latency of handing a fast-apply task to the queue
    pub fn record_fast_apply_push(&self, us: u64) {
        self.fast_apply_push_us.record(us);
    }

    #[must_use]
    pub fn completes_ok(&self, op: OperatorType) -> u64 {
        self.slot(op).complete_ok.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn completes_err(&self, op: OperatorType) -> u64 {
        self.slot(op).complete_err.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn from_log_ok(&self, op: OperatorType) -> u64 {
        self.slot(op).from_log_ok.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn from_log_err(&self, op: OperatorType) -> u64 {
        self.slot(op).from_log_err.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn queue_wait_samples(&self, op: OperatorType) -> u64 {
        self.slot(op).queue_wait_us.count()
    }
}
