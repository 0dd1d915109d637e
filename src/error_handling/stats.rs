//! Ingest statistics tracking.
//!
//! This module provides thread-safe counters shared by the pipeline and its
//! workers. Record outcomes (persisted, failed, dropped), batch outcomes, and
//! worker-side error categories are all tracked here and read back once the
//! pipeline has drained. Accepted submissions are counted by the queue itself.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use strum::IntoEnumIterator;

use crate::config::MAX_RECORDED_ERRORS;

use super::types::{ErrorType, WorkerError};

/// Thread-safe ingest statistics tracker.
///
/// Counters are atomics so workers update them without coordination. The
/// first `MAX_RECORDED_ERRORS` worker errors are also kept verbatim so callers
/// can inspect them after `close()` without parsing logs.
pub struct IngestStats {
    persisted: AtomicUsize,
    failed: AtomicUsize,
    dropped: AtomicUsize,
    batches_flushed: AtomicUsize,
    batches_failed: AtomicUsize,
    errors: HashMap<ErrorType, AtomicUsize>,
    recorded: Mutex<Vec<WorkerError>>,
}

impl IngestStats {
    pub fn new() -> Self {
        let mut errors = HashMap::new();
        for error in ErrorType::iter() {
            errors.insert(error, AtomicUsize::new(0));
        }

        IngestStats {
            persisted: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
            batches_flushed: AtomicUsize::new(0),
            batches_failed: AtomicUsize::new(0),
            errors,
            recorded: Mutex::new(Vec::new()),
        }
    }

    /// Counts a committed batch of `records` records.
    pub fn record_batch_persisted(&self, records: usize) {
        self.batches_flushed.fetch_add(1, Ordering::Relaxed);
        self.persisted.fetch_add(records, Ordering::Relaxed);
    }

    /// Counts a rejected batch of `records` records.
    pub fn record_batch_failed(&self, records: usize) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
        self.failed.fetch_add(records, Ordering::Relaxed);
    }

    /// Counts records lost outside a flush (e.g. a worker panic mid-batch).
    pub fn record_lost(&self, records: usize) {
        self.failed.fetch_add(records, Ordering::Relaxed);
    }

    /// Counts a record dropped before it reached the store.
    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the counter for the error's category and keeps a copy of it
    /// while fewer than `MAX_RECORDED_ERRORS` have been kept.
    pub fn record_error(&self, error: WorkerError) {
        let error_type = error.error_type();
        if let Some(counter) = self.errors.get(&error_type) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            log::error!(
                "Attempted to increment error counter for {:?} which is not in the map. \
                 This indicates a bug in IngestStats initialization.",
                error_type
            );
        }

        let mut recorded = self
            .recorded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if recorded.len() < MAX_RECORDED_ERRORS {
            recorded.push(error);
        }
    }

    pub fn persisted(&self) -> usize {
        self.persisted.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }

    pub fn batches_flushed(&self) -> usize {
        self.batches_flushed.load(Ordering::SeqCst)
    }

    pub fn batches_failed(&self) -> usize {
        self.batches_failed.load(Ordering::SeqCst)
    }

    /// Get the count for an error type.
    pub fn get_error_count(&self, error: ErrorType) -> usize {
        self.errors
            .get(&error)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Sum of all error counters.
    pub fn total_errors(&self) -> usize {
        self.errors.values().map(|c| c.load(Ordering::SeqCst)).sum()
    }

    /// Copy of the errors kept so far.
    pub fn recorded_errors(&self) -> Vec<WorkerError> {
        self.recorded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Default for IngestStats {
    fn default() -> Self {
        Self::new()
    }
}
