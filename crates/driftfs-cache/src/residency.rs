//! Residency index for staged objects
//!
//! An LRU-ordered set of the object names currently present on local disk.
//! The write path inserts on file creation; a successful upload moves the
//! name to the back so the sibling read-cache evicts uploaded objects first.

use parking_lot::Mutex;
use std::collections::HashMap;

/// Logical-clock LRU set of object names
pub struct ResidencyIndex {
    entries: Mutex<HashMap<String, i64>>,
    /// Grows upward for fresh inserts
    front_clock: Mutex<i64>,
    /// Grows downward for demoted entries, so they sort before every insert
    back_clock: Mutex<i64>,
}

impl Default for ResidencyIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl ResidencyIndex {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            front_clock: Mutex::new(0),
            back_clock: Mutex::new(0),
        }
    }

    /// Insert a name at the most-recently-used end.
    /// Re-inserting an existing name refreshes its position.
    pub fn insert(&self, name: &str) {
        let clock = {
            let mut front = self.front_clock.lock();
            *front += 1;
            *front
        };
        self.entries.lock().insert(name.to_string(), clock);
    }

    /// Demote a name to the eviction-candidate end.
    /// Unknown names are ignored.
    pub fn move_to_back(&self, name: &str) {
        let mut entries = self.entries.lock();
        if let Some(clock) = entries.get_mut(name) {
            let mut back = self.back_clock.lock();
            *back -= 1;
            *clock = *back;
        }
    }

    /// Remove and return the oldest entry, if any
    pub fn pop_oldest(&self) -> Option<String> {
        let mut entries = self.entries.lock();
        let oldest = entries
            .iter()
            .min_by_key(|(_, clock)| **clock)
            .map(|(name, _)| name.clone())?;
        entries.remove(&oldest);
        Some(oldest)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.lock().contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
