//! Worker task: queue → batch → upsert.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, error, warn};
use tokio::task::JoinHandle;
use tokio::time::sleep_until;

use crate::error_handling::{FlushError, IngestStats, WorkerError};
use crate::storage::{BatchAccumulator, BulkInsertExecutor, ConnectionPool, Record};

use super::queue::RecordQueue;

/// Records with this uid make the worker that flushes them panic.
#[cfg(test)]
pub(crate) const PANIC_UID: &str = "worker-panic";

/// Handle the orchestrator keeps for each spawned worker.
pub(crate) struct WorkerHandle {
    pub id: usize,
    pub join: JoinHandle<()>,
    /// Records popped by the worker whose outcome is not yet counted
    pub in_flight: Arc<AtomicUsize>,
}

enum Next {
    Record(Option<Record>),
    Expired,
}

pub(crate) struct Worker {
    id: usize,
    queue: Arc<RecordQueue>,
    pool: ConnectionPool,
    executor: Arc<BulkInsertExecutor>,
    stats: Arc<IngestStats>,
    accumulator: BatchAccumulator,
    in_flight: Arc<AtomicUsize>,
}

impl Worker {
    pub fn new(
        id: usize,
        queue: Arc<RecordQueue>,
        pool: ConnectionPool,
        executor: Arc<BulkInsertExecutor>,
        stats: Arc<IngestStats>,
        accumulator: BatchAccumulator,
    ) -> Self {
        Worker {
            id,
            queue,
            pool,
            executor,
            stats,
            accumulator,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Spawns the worker onto the current Tokio runtime.
    pub fn spawn(self) -> WorkerHandle {
        let id = self.id;
        let in_flight = Arc::clone(&self.in_flight);
        WorkerHandle {
            id,
            join: tokio::spawn(self.run()),
            in_flight,
        }
    }

    /// Pulls records until the queue is closed and empty, flushing whenever
    /// the batch fills up or its wait time runs out, then flushes what is left.
    async fn run(mut self) {
        debug!("worker {} started", self.id);
        loop {
            let next = match self.accumulator.deadline() {
                Some(deadline) => tokio::select! {
                    record = self.queue.pop() => Next::Record(record),
                    _ = sleep_until(deadline) => Next::Expired,
                },
                None => Next::Record(self.queue.pop().await),
            };

            match next {
                Next::Record(Some(record)) => {
                    self.in_flight.fetch_add(1, Ordering::SeqCst);
                    if self.accumulator.push(record) {
                        self.flush().await;
                    }
                }
                Next::Record(None) => {
                    self.flush().await;
                    break;
                }
                Next::Expired => self.flush().await,
            }
        }
        debug!("worker {} finished", self.id);
    }

    async fn flush(&mut self) {
        if self.accumulator.is_empty() {
            return;
        }
        let batch = self.accumulator.take();
        #[cfg(test)]
        if batch.iter().any(|r| r.uid == PANIC_UID) {
            panic!("worker {} hit {}", self.id, PANIC_UID);
        }
        let encoded = self.executor.encode(batch);

        for rejected in &encoded.rejected {
            warn!("worker {}: dropping record: {}", self.id, rejected);
            self.stats.record_dropped();
            self.stats
                .record_error(WorkerError::Serialization(rejected.clone()));
        }
        self.settle(encoded.rejected.len());

        if encoded.is_empty() {
            return;
        }
        let records = encoded.writable_records();

        let mut conn = match self.pool.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                self.fail(FlushError {
                    reason: e.to_string(),
                    batch_size: records,
                });
                return;
            }
        };

        match self.executor.execute(&encoded, &mut conn).await {
            Ok(result) => {
                debug!(
                    "worker {}: flushed {} records ({} rows, {} superseded)",
                    self.id,
                    result.persisted(),
                    result.rows,
                    result.superseded
                );
                self.stats.record_batch_persisted(result.persisted());
                self.settle(records);
            }
            Err(e) => self.fail(e),
        }
        self.pool.release(conn);
    }

    fn fail(&self, e: FlushError) {
        error!(
            "worker {}: batch of {} records lost: {}",
            self.id, e.batch_size, e.reason
        );
        self.stats.record_batch_failed(e.batch_size);
        self.settle(e.batch_size);
        self.stats.record_error(WorkerError::Flush(e));
    }

    fn settle(&self, records: usize) {
        self.in_flight.fetch_sub(records, Ordering::SeqCst);
    }
}
