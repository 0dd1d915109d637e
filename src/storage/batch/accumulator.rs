//! Per-worker batch accumulation.
//!
//! A batch is flushed when it reaches `max_size`, when `max_wait` has passed
//! since its first record arrived, or when the queue reports closed-and-empty.

use std::time::Duration;

use tokio::time::Instant;

use crate::storage::models::Record;

/// Collects consecutive records for one worker.
pub struct BatchAccumulator {
    buffer: Vec<Record>,
    max_size: usize,
    max_wait: Duration,
    started_at: Option<Instant>,
}

impl BatchAccumulator {
    pub fn new(max_size: usize, max_wait: Duration) -> Self {
        BatchAccumulator {
            buffer: Vec::with_capacity(max_size),
            max_size,
            max_wait,
            started_at: None,
        }
    }

    /// Appends a record; returns true once the batch is full.
    pub fn push(&mut self, record: Record) -> bool {
        if self.buffer.is_empty() {
            self.started_at = Some(Instant::now());
        }
        self.buffer.push(record);
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.buffer.len() >= self.max_size
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// When the current batch must be flushed; `None` while empty.
    pub fn deadline(&self) -> Option<Instant> {
        self.started_at.map(|start| start + self.max_wait)
    }

    /// Checks if the current batch has waited `max_wait`.
    pub fn is_expired(&self) -> bool {
        self.deadline()
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }

    /// Hands over the batch and resets to empty.
    pub fn take(&mut self) -> Vec<Record> {
        self.started_at = None;
        std::mem::replace(&mut self.buffer, Vec::with_capacity(self.max_size))
    }
}
