//! In-memory feed of recent retrievals for live inspection.
//!
//! [`TelemetryFeed`] is a cloneable handle to one bounded ring buffer.
//! The application creates a single feed per process and injects clones
//! into every retriever and viewer; there is no ambient global. All
//! mutation goes through one mutex, so concurrent pushes are safe.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::record::RetrievalRecord;

/// Default number of records kept.
pub const DEFAULT_CAPACITY: usize = 200;

/// Bounded, newest-first buffer of retrieval records.
#[derive(Debug, Clone)]
pub struct TelemetryFeed {
    inner: Arc<Mutex<VecDeque<RetrievalRecord>>>,
    capacity: usize,
}

impl TelemetryFeed {
    /// Create a feed holding at most `capacity` records (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Insert at the front, evicting the oldest record when full.
    pub fn push(&self, record: RetrievalRecord) {
        let mut buf = self.lock();
        buf.push_front(record);
        buf.truncate(self.capacity);
    }

    /// Up to `limit` records, newest first. Does not consume.
    pub fn get_recent(&self, limit: usize) -> Vec<RetrievalRecord> {
        self.lock().iter().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every record. Intended for test isolation.
    pub fn reset(&self) {
        self.lock().clear();
    }

    // A panic while holding the lock cannot leave the deque half-updated,
    // so a poisoned lock is safe to reuse.
    fn lock(&self) -> MutexGuard<'_, VecDeque<RetrievalRecord>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for TelemetryFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
