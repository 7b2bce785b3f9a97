//! Concurrency primitives shared by the background workers
//!
//! `SyncBarrier` is a countdown latch tied to one batch of uploads: every
//! upload signals it exactly once (success or failure) and a waiter blocks
//! until the whole batch has terminated. `Sleeper` is an interruptible
//! periodic wait used by loop threads so shutdown does not have to ride out
//! a full period.

use parking_lot::{Condvar, Mutex};
use std::time::Duration;

struct BarrierState {
    remaining: usize,
    failed: bool,
}

/// Countdown latch for one batch of in-flight uploads
pub struct SyncBarrier {
    state: Mutex<BarrierState>,
    cond: Condvar,
}

impl SyncBarrier {
    /// Create a barrier expecting `count` signals
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            state: Mutex::new(BarrierState {
                remaining: count,
                failed: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// Signal one successful completion
    pub fn done(&self) {
        self.signal(false);
    }

    /// Signal one failed completion; `wait` will report the batch as failed
    pub fn fail(&self) {
        self.signal(true);
    }

    fn signal(&self, failed: bool) {
        let mut state = self.state.lock();
        if failed {
            state.failed = true;
        }
        state.remaining = state.remaining.saturating_sub(1);
        if state.remaining == 0 {
            self.cond.notify_all();
        }
    }

    /// Block until every member of the batch has signaled.
    /// Returns `true` when no member failed.
    pub fn wait(&self) -> bool {
        let mut state = self.state.lock();
        while state.remaining > 0 {
            self.cond.wait(&mut state);
        }
        !state.failed
    }

    /// Signals still outstanding
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.state.lock().remaining
    }
}

/// Interruptible periodic sleeper for background loop threads
pub struct Sleeper {
    interrupted: Mutex<bool>,
    cond: Condvar,
}

impl Default for Sleeper {
    fn default() -> Self {
        Self::new()
    }
}

impl Sleeper {
    #[must_use]
    pub fn new() -> Self {
        Self {
            interrupted: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Sleep for `period` or until interrupted.
    /// Returns `true` when the full period elapsed and `false` when the
    /// sleeper was interrupted (now or earlier; interruption is sticky).
    pub fn wait_for(&self, period: Duration) -> bool {
        let mut interrupted = self.interrupted.lock();
        if *interrupted {
            return false;
        }
        self.cond.wait_for(&mut interrupted, period);
        !*interrupted
    }

    /// Wake every sleeper and make all future waits return immediately
    pub fn interrupt(&self) {
        let mut interrupted = self.interrupted.lock();
        *interrupted = true;
        self.cond.notify_all();
    }
}
