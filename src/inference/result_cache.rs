// SPDX-License-Identifier: GPL-3.0-only

//! Single-slot store for the most recent detection
//!
//! Written from the engine's completion thread, read from the frame thread.
//! Last write wins; no history is kept. Results are stored behind an `Arc`
//! so a read only holds the lock long enough to clone a pointer.

use super::DetectionResult;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::trace;

#[derive(Debug)]
struct Entry {
    result: Arc<DetectionResult>,
    timestamp_ms: i64,
}

/// Latest detection result, shared between the engine and the frame path
#[derive(Debug, Default)]
pub struct ResultSlot {
    latest: Mutex<Option<Entry>>,
}

impl ResultSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored result
    ///
    /// Completions are stored in arrival order, whatever their timestamp.
    pub fn store(&self, result: DetectionResult, timestamp_ms: i64) {
        let result = Arc::new(result);
        let mut latest = self.lock();
        if let Some(previous) = latest.as_ref()
            && previous.timestamp_ms > timestamp_ms
        {
            trace!(
                previous = previous.timestamp_ms,
                timestamp_ms, "Storing completion older than the current result"
            );
        }
        *latest = Some(Entry {
            result,
            timestamp_ms,
        });
    }

    /// The most recent result, or an empty one if nothing has completed yet
    pub fn read_latest(&self) -> Arc<DetectionResult> {
        match self.lock().as_ref() {
            Some(entry) => Arc::clone(&entry.result),
            None => Arc::new(DetectionResult::empty()),
        }
    }

    /// Timestamp of the stored result
    pub fn latest_timestamp(&self) -> Option<i64> {
        self.lock().as_ref().map(|entry| entry.timestamp_ms)
    }

    /// Whether any result has been stored
    pub fn is_set(&self) -> bool {
        self.lock().is_some()
    }

    /// Drop the stored result
    pub fn clear(&self) {
        *self.lock() = None;
    }

    // A writer that panicked cannot have left a partial entry behind (the
    // entry is built before the lock is taken), so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, Option<Entry>> {
        self.latest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
