//! Concurrent batched-insert pipeline.
//!
//! Producers call [`Pipeline::submit`]; a fixed set of worker tasks drains the
//! shared [`RecordQueue`], batches records, and upserts each batch through the
//! [`ConnectionPool`]. [`Pipeline::close`] stops intake and resolves only after
//! every worker has flushed its last batch and exited.
//!
//! ```text
//!  submit ──▶ RecordQueue ──▶ worker 0..N ──▶ BatchAccumulator ──▶ BulkInsertExecutor ──▶ pool
//! ```

mod queue;
mod report;
mod worker;

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures::future::join_all;
use log::{error, info, warn};
use tokio::sync::watch;

use crate::config::{PipelineConfig, StoreConfig};
use crate::error_handling::{InitializationError, IngestStats, SubmitError, WorkerError};
use crate::initialization::init_store;
use crate::storage::{BatchAccumulator, BulkInsertExecutor, ConnectionPool, PropertyEncoder, Record};

pub use queue::RecordQueue;
pub use report::DrainReport;

use worker::{Worker, WorkerHandle};

/// Lifecycle of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Accepting submissions; workers running
    Open,
    /// Submissions rejected; workers draining the queue
    Closing,
    /// All workers exited; all connections released
    Closed,
}

/// State shared between the pipeline and its drain task.
struct Shared {
    queue: Arc<RecordQueue>,
    stats: Arc<IngestStats>,
    state: Mutex<PipelineState>,
    report: watch::Sender<Option<DrainReport>>,
    started_at: Instant,
}

impl Shared {
    fn state(&self) -> PipelineState {
        *self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, next: PipelineState) {
        *self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = next;
    }

    fn snapshot(&self) -> DrainReport {
        DrainReport::from_stats(self.queue.accepted(), &self.stats, self.started_at.elapsed())
    }

    /// Joins every worker, then accounts for anything they left behind.
    ///
    /// Runs on its own task and owns the handles, so it finishes even if
    /// nobody is waiting on `close()` anymore.
    async fn drain(&self, mut workers: Vec<WorkerHandle>) -> DrainReport {
        let outcomes = join_all(workers.iter_mut().map(|w| &mut w.join)).await;
        for (worker, outcome) in workers.iter().zip(outcomes) {
            if let Err(e) = outcome {
                let message = if e.is_panic() {
                    panic_message(e.into_panic())
                } else {
                    "task cancelled".to_string()
                };
                let lost = worker.in_flight.load(Ordering::SeqCst);
                error!(
                    "worker {} panicked with {} records in flight: {}",
                    worker.id, lost, message
                );
                self.stats.record_lost(lost);
                self.stats.record_error(WorkerError::Panicked {
                    worker: worker.id,
                    message,
                });
            }
        }

        // Every worker has finished; records left here were never popped
        let mut stranded = 0;
        while let Some(_record) = self.queue.pop().await {
            stranded += 1;
        }
        if stranded > 0 {
            error!("{} queued records were never flushed", stranded);
            self.stats.record_lost(stranded);
        }

        self.set_state(PipelineState::Closed);
        let report = self.snapshot();
        if report.is_clean() {
            info!("Pipeline drained: {}", report);
        } else {
            warn!("Pipeline drained with losses: {}", report);
        }
        report
    }
}

/// The ingest pipeline.
///
/// Construct once and share by reference (or `Arc`) with producers. Must be
/// started inside a Tokio runtime.
///
/// # Example
///
/// ```no_run
/// use bulk_ingest::{Pipeline, PipelineConfig, Properties, Record, StoreConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pipeline = Pipeline::connect(&StoreConfig::default(), PipelineConfig::default()).await?;
/// pipeline
///     .submit(Record::new("c0/r0", "c0", "pod", Properties::new()))
///     .await?;
/// let report = pipeline.close().await;
/// println!("{}", report);
/// # Ok(())
/// # }
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    pool: ConnectionPool,
    shared: Arc<Shared>,
    /// Taken by the first `close()`, which hands them to the drain task
    workers: Mutex<Option<Vec<WorkerHandle>>>,
}

impl Pipeline {
    /// Connects the pool, creates the table if needed, and starts the workers.
    ///
    /// # Errors
    ///
    /// Fails before any record can be submitted if the configuration is
    /// invalid or the store is unreachable (`ConnectionFatal`).
    pub async fn connect(
        store: &StoreConfig,
        config: PipelineConfig,
    ) -> Result<Self, InitializationError> {
        let pool = init_store(store, &config, false).await?;
        Self::start(pool, config)
    }

    /// Starts the workers over an existing pool.
    ///
    /// The target table must already exist.
    pub fn start(pool: ConnectionPool, config: PipelineConfig) -> Result<Self, InitializationError> {
        config.validate()?;

        let executor = Arc::new(BulkInsertExecutor::new(
            &config.table,
            PropertyEncoder::new(config.max_document_bytes),
        )?);
        let queue = Arc::new(RecordQueue::new(config.queue_capacity));
        let stats = Arc::new(IngestStats::new());

        info!(
            "Starting pipeline: {} workers, queue capacity {}, batch size {}, batch wait {:?}, {} connections",
            config.workers,
            config.queue_capacity,
            config.max_batch_size,
            config.max_batch_wait,
            pool.size()
        );

        let workers = (0..config.workers)
            .map(|id| {
                Worker::new(
                    id,
                    Arc::clone(&queue),
                    pool.clone(),
                    Arc::clone(&executor),
                    Arc::clone(&stats),
                    BatchAccumulator::new(config.max_batch_size, config.max_batch_wait),
                )
                .spawn()
            })
            .collect();

        let (report, _) = watch::channel(None);
        Ok(Pipeline {
            config,
            pool,
            shared: Arc::new(Shared {
                queue,
                stats,
                state: Mutex::new(PipelineState::Open),
                report,
                started_at: Instant::now(),
            }),
            workers: Mutex::new(Some(workers)),
        })
    }

    /// Hands a record to the pipeline, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// - `PipelineClosed` once `close()` has been called
    /// - `QueueClosed` if the close raced this submission
    /// - `InvalidRecord` for an empty uid
    pub async fn submit(&self, record: Record) -> Result<(), SubmitError> {
        if self.state() != PipelineState::Open {
            return Err(SubmitError::PipelineClosed);
        }
        if record.uid.is_empty() {
            return Err(SubmitError::InvalidRecord("uid must not be empty".to_string()));
        }
        self.shared.queue.push(record).await
    }

    /// Stops intake and waits for the drain to finish.
    ///
    /// The first call starts the drain on its own task. Every call, including
    /// one made after an earlier call was cancelled, waits for that same drain
    /// and returns the same report.
    pub async fn close(&self) -> DrainReport {
        let mut report = self.shared.report.subscribe();
        self.start_drain();

        let result = match report.wait_for(Option::is_some).await {
            Ok(done) => (*done).clone().unwrap_or_else(|| self.shared.snapshot()),
            // The sender lives in `shared`, which outlives this borrow
            Err(_) => self.shared.snapshot(),
        };
        result
    }

    fn start_drain(&self) {
        let workers = self
            .workers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(workers) = workers else {
            return;
        };

        self.shared.set_state(PipelineState::Closing);
        info!(
            "Closing pipeline: {} records queued, waiting for workers",
            self.shared.queue.len()
        );
        self.shared.queue.close();

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let report = shared.drain(workers).await;
            shared.report.send_replace(Some(report));
        });
    }

    pub fn state(&self) -> PipelineState {
        self.shared.state()
    }

    /// Counts so far; final only after `close()` resolves.
    pub fn progress(&self) -> DrainReport {
        self.shared.snapshot()
    }

    /// Records waiting in the queue.
    pub fn queued(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if self.state() == PipelineState::Open {
            // Workers still flush what was queued; nobody waits for them
            warn!("Pipeline dropped without close(); closing queue");
            self.shared.queue.close();
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::worker::PANIC_UID;
    use super::*;
    use crate::storage::test_helpers::create_test_pool;
    use crate::storage::{count_rows, fetch_resource, Properties};
    use std::time::Duration;

    fn record(i: usize) -> Record {
        Record::new(format!("c0/r{i}"), "c0", "pod", Properties::new())
    }

    fn config(workers: usize, batch: usize) -> PipelineConfig {
        PipelineConfig {
            workers,
            max_batch_size: batch,
            max_batch_wait: Duration::from_secs(60),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let (_dir, pool) = create_test_pool(2).await;
        let pipeline = Pipeline::start(pool, config(2, 10)).expect("start");
        assert_eq!(pipeline.state(), PipelineState::Open);

        pipeline.submit(record(0)).await.expect("submit");
        let report = pipeline.close().await;
        assert_eq!(pipeline.state(), PipelineState::Closed);
        assert_eq!(report.submitted, 1);
        assert_eq!(report.persisted, 1);
    }

    #[tokio::test]
    async fn test_submit_after_close_is_rejected() {
        let (_dir, pool) = create_test_pool(1).await;
        let pipeline = Pipeline::start(pool, config(1, 10)).expect("start");
        pipeline.close().await;
        assert_eq!(
            pipeline.submit(record(1)).await,
            Err(SubmitError::PipelineClosed)
        );
    }

    #[tokio::test]
    async fn test_empty_uid_is_rejected() {
        let (_dir, pool) = create_test_pool(1).await;
        let pipeline = Pipeline::start(pool, config(1, 10)).expect("start");
        let result = pipeline
            .submit(Record::new("", "c0", "pod", Properties::new()))
            .await;
        assert!(matches!(result, Err(SubmitError::InvalidRecord(_))));
        assert_eq!(pipeline.close().await.submitted, 0);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (_dir, pool) = create_test_pool(2).await;
        let pipeline = Pipeline::start(pool, config(2, 10)).expect("start");
        for i in 0..25 {
            pipeline.submit(record(i)).await.expect("submit");
        }
        let first = pipeline.close().await;
        let second = pipeline.close().await;
        assert_eq!(first, second);
        assert_eq!(first.persisted, 25);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_close_calls_share_one_drain() {
        let (_dir, pool) = create_test_pool(2).await;
        let pipeline = Arc::new(Pipeline::start(pool, config(2, 10)).expect("start"));
        for i in 0..50 {
            pipeline.submit(record(i)).await.expect("submit");
        }
        let a = tokio::spawn({
            let pipeline = Arc::clone(&pipeline);
            async move { pipeline.close().await }
        });
        let b = tokio::spawn({
            let pipeline = Arc::clone(&pipeline);
            async move { pipeline.close().await }
        });
        let (a, b) = (a.await.expect("task"), b.await.expect("task"));
        assert_eq!(a, b);
        assert_eq!(a.persisted, 50);
    }

    #[tokio::test]
    async fn test_partial_batch_flushes_after_max_wait() {
        let (_dir, pool) = create_test_pool(1).await;
        let pipeline = Pipeline::start(
            pool.clone(),
            PipelineConfig {
                workers: 1,
                max_batch_size: 100,
                max_batch_wait: Duration::from_millis(50),
                ..Default::default()
            },
        )
        .expect("start");

        for i in 0..3 {
            pipeline.submit(record(i)).await.expect("submit");
        }

        // Well past max_wait and no close(): the timer alone must flush
        let mut count = 0;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            count = count_rows(&pool, "resources").await.expect("count");
            if count == 3 {
                break;
            }
        }
        assert_eq!(count, 3);
        assert_eq!(pipeline.state(), PipelineState::Open);
        pipeline.close().await;
    }

    #[tokio::test]
    async fn test_drop_without_close_stops_workers() {
        let (_dir, pool) = create_test_pool(1).await;
        let pipeline = Pipeline::start(pool.clone(), config(1, 10)).expect("start");
        pipeline.submit(record(0)).await.expect("submit");
        drop(pipeline);

        let mut count = 0;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            count = count_rows(&pool, "resources").await.expect("count");
            if count == 1 {
                break;
            }
        }
        assert_eq!(count, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_worker_panic_is_counted_while_others_drain() {
        let (_dir, pool) = create_test_pool(2).await;
        let pipeline = Pipeline::start(pool.clone(), config(2, 5)).expect("start");
        for i in 0..20 {
            let next = if i == 7 {
                Record::new(PANIC_UID, "c0", "pod", Properties::new())
            } else {
                record(i)
            };
            pipeline.submit(next).await.expect("submit");
        }
        let report = pipeline.close().await;

        assert_eq!(pipeline.state(), PipelineState::Closed);
        assert_eq!(report.submitted, 20);
        assert_eq!(report.workers_panicked, 1);
        // Only the panicking worker's batch is lost
        assert!(report.failed >= 1 && report.failed <= 5, "{}", report);
        assert_eq!(report.persisted + report.failed + report.dropped, 20);
        assert!(report.errors.iter().any(|e| matches!(
            e,
            WorkerError::Panicked { message, .. } if message.contains(PANIC_UID)
        )));

        let rows = count_rows(&pool, "resources").await.expect("count");
        assert_eq!(rows as usize, report.persisted);
        assert!(fetch_resource(&pool, "resources", PANIC_UID)
            .await
            .expect("query")
            .is_none());
        assert_eq!(pool.in_use(), 0);
    }

    #[tokio::test]
    async fn test_records_stranded_by_dead_workers_count_as_failed() {
        let (_dir, pool) = create_test_pool(1).await;
        // Batches of one: the only worker dies on the first record
        let pipeline = Pipeline::start(pool.clone(), config(1, 1)).expect("start");
        pipeline
            .submit(Record::new(PANIC_UID, "c0", "pod", Properties::new()))
            .await
            .expect("submit");
        for i in 0..10 {
            pipeline.submit(record(i)).await.expect("submit");
        }
        let report = pipeline.close().await;

        assert_eq!(report.submitted, 11);
        assert_eq!(report.persisted, 0);
        assert_eq!(report.failed, 11);
        assert_eq!(report.workers_panicked, 1);
        assert_eq!(pipeline.queued(), 0);
        assert_eq!(count_rows(&pool, "resources").await.expect("count"), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_close_resumes_after_cancelled_close() {
        let (_dir, pool) = create_test_pool(1).await;
        let held = pool.acquire().await.expect("lease");
        let pipeline = Pipeline::start(pool.clone(), config(1, 5)).expect("start");
        for i in 0..40 {
            pipeline.submit(record(i)).await.expect("submit");
        }

        let cancelled = tokio::time::timeout(Duration::from_millis(100), pipeline.close()).await;
        assert!(cancelled.is_err(), "drain cannot finish while the store is held");
        assert_eq!(pipeline.state(), PipelineState::Closing);

        drop(held);
        let report = tokio::time::timeout(Duration::from_secs(30), pipeline.close())
            .await
            .expect("drain completes");
        assert_eq!(report.persisted, 40);
        assert_eq!(report.failed, 0);
        assert_eq!(pipeline.state(), PipelineState::Closed);
        assert_eq!(count_rows(&pool, "resources").await.expect("count"), 40);
    }

    #[test]
    fn test_panic_message_extraction() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new("owned".to_string())), "owned");
        assert_eq!(panic_message(Box::new(42u8)), "unknown panic payload");
    }
}
