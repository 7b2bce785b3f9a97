//! Pending upload queue
//!
//! Ordered names awaiting upload, protected by one mutex. Duplicates are the
//! caller's responsibility. The uploader loop signals the condition variable
//! whenever it observes the queue empty so `stop` waiters can see quiescence.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::Duration;

pub struct PendingQueue {
    names: Mutex<VecDeque<String>>,
    drained: Condvar,
}

impl Default for PendingQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingQueue {
    #[must_use]
    pub fn new() -> Self {
        Self {
            names: Mutex::new(VecDeque::new()),
            drained: Condvar::new(),
        }
    }

    /// Append one name
    pub fn push(&self, name: String) {
        self.names.lock().push_back(name);
    }

    /// Swap the whole queue out atomically
    pub fn drain_all(&self) -> Vec<String> {
        let mut names = self.names.lock();
        names.drain(..).collect()
    }

    /// Remove and return the names matching `pred`, preserving order.
    /// The predicate must not block; it runs under the queue lock.
    pub fn drain_matching(&self, mut pred: impl FnMut(&str) -> bool) -> Vec<String> {
        let mut names = self.names.lock();
        let mut matched = Vec::new();
        let mut kept = VecDeque::with_capacity(names.len());
        for name in names.drain(..) {
            if pred(&name) {
                matched.push(name);
            } else {
                kept.push_back(name);
            }
        }
        *names = kept;
        matched
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.lock().is_empty()
    }

    /// Wake `wait_empty` callers if the queue is currently empty
    pub fn notify_if_empty(&self) {
        let names = self.names.lock();
        if names.is_empty() {
            self.drained.notify_all();
        }
    }

    /// Block until the queue is empty, re-checking every `poll` at most
    pub fn wait_empty(&self, poll: Duration) {
        let mut names = self.names.lock();
        while !names.is_empty() {
            self.drained.wait_for(&mut names, poll);
        }
    }
}
