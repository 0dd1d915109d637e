//! Bounded multi-producer, multi-consumer record queue.
//!
//! Capacity is enforced with a semaphore: a producer takes a permit before
//! storing a record and a consumer returns it after removing one. Closing the
//! semaphore is what wakes producers blocked on a full queue.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::{Notify, Semaphore};

use crate::error_handling::SubmitError;
use crate::storage::models::Record;

struct QueueState {
    items: VecDeque<Record>,
    closed: bool,
    accepted: usize,
}

/// Queue between producers and workers.
///
/// `push` waits while the queue holds `capacity` records. `pop` waits while it
/// is empty and open, and returns `None` only once it is closed and empty.
pub struct RecordQueue {
    state: Mutex<QueueState>,
    slots: Semaphore,
    not_empty: Notify,
    capacity: usize,
}

impl RecordQueue {
    pub fn new(capacity: usize) -> Self {
        RecordQueue {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                closed: false,
                accepted: 0,
            }),
            slots: Semaphore::new(capacity),
            not_empty: Notify::new(),
            capacity,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stores a record, waiting for a free slot.
    ///
    /// # Errors
    ///
    /// Returns `SubmitError::QueueClosed` if the queue is closed before the
    /// record is stored. A record is either stored or returned as an error,
    /// never discarded.
    pub async fn push(&self, record: Record) -> Result<(), SubmitError> {
        let permit = self
            .slots
            .acquire()
            .await
            .map_err(|_| SubmitError::QueueClosed)?;

        {
            let mut state = self.lock();
            if state.closed {
                return Err(SubmitError::QueueClosed);
            }
            state.items.push_back(record);
            state.accepted += 1;
        }
        // The slot stays taken until a consumer pops the record
        permit.forget();
        self.not_empty.notify_one();
        Ok(())
    }

    /// Removes the oldest record, waiting while the queue is empty and open.
    ///
    /// Cancel safe: dropping the future before it completes removes nothing.
    pub async fn pop(&self) -> Option<Record> {
        loop {
            let notified = self.not_empty.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if let Some(record) = state.items.pop_front() {
                    let more = !state.items.is_empty();
                    drop(state);
                    self.slots.add_permits(1);
                    if more {
                        self.not_empty.notify_one();
                    }
                    return Some(record);
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Rejects further pushes and wakes every waiter. Idempotent.
    pub fn close(&self) {
        {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            state.closed = true;
        }
        self.slots.close();
        self.not_empty.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total records ever stored. Counted under the same lock as `close`, so
    /// once the queue is closed this is exactly what workers will drain.
    pub fn accepted(&self) -> usize {
        self.lock().accepted
    }
}
