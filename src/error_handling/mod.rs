//! Error handling and ingest statistics.
//!
//! This module provides:
//! - Error type definitions for producers, workers, the store and setup
//! - Ingest statistics tracking (record and batch outcomes, error counts)
//!
//! Errors are split by who sees them:
//! - **Producer-facing**: `SubmitError`, returned synchronously by `submit`
//! - **Worker-side**: `SerializationError` and `FlushError`, aggregated into the
//!   drain report and logged
//! - **Setup**: `DatabaseError`, `ConfigError`, `InitializationError`

mod stats;
mod types;

// Re-export public API
pub use stats::IngestStats;
pub use types::{
    ConfigError, DatabaseError, ErrorType, FlushError, InitializationError, SerializationError,
    SubmitError, WorkerError,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_RECORDED_ERRORS;
    use strum::IntoEnumIterator;

    fn flush_error(batch_size: usize) -> WorkerError {
        WorkerError::Flush(FlushError {
            reason: "no such table: resources".to_string(),
            batch_size,
        })
    }

    #[test]
    fn test_ingest_stats_initialization() {
        let stats = IngestStats::new();
        for error_type in ErrorType::iter() {
            assert_eq!(stats.get_error_count(error_type), 0);
        }
        assert_eq!(stats.persisted(), 0);
        assert!(stats.recorded_errors().is_empty());
    }

    #[test]
    fn test_ingest_stats_batch_outcomes() {
        let stats = IngestStats::new();
        stats.record_batch_persisted(100);
        stats.record_batch_persisted(40);
        stats.record_batch_failed(10);
        stats.record_dropped();

        assert_eq!(stats.persisted(), 140);
        assert_eq!(stats.batches_flushed(), 2);
        assert_eq!(stats.failed(), 10);
        assert_eq!(stats.batches_failed(), 1);
        assert_eq!(stats.dropped(), 1);
    }

    #[test]
    fn test_ingest_stats_error_categories() {
        let stats = IngestStats::new();
        stats.record_error(flush_error(10));
        stats.record_error(WorkerError::Serialization(SerializationError {
            uid: "c0/r1".to_string(),
            reason: "too big".to_string(),
        }));
        stats.record_error(flush_error(5));

        assert_eq!(stats.get_error_count(ErrorType::FlushError), 2);
        assert_eq!(stats.get_error_count(ErrorType::SerializationError), 1);
        assert_eq!(stats.get_error_count(ErrorType::WorkerPanic), 0);
        assert_eq!(stats.total_errors(), 3);
        assert_eq!(stats.recorded_errors().len(), 3);
    }

    #[test]
    fn test_recorded_errors_are_capped_but_counters_are_not() {
        let stats = IngestStats::new();
        for _ in 0..MAX_RECORDED_ERRORS + 25 {
            stats.record_error(flush_error(1));
        }
        assert_eq!(stats.recorded_errors().len(), MAX_RECORDED_ERRORS);
        assert_eq!(
            stats.get_error_count(ErrorType::FlushError),
            MAX_RECORDED_ERRORS + 25
        );
    }

    #[test]
    fn test_worker_error_display() {
        let err = flush_error(7);
        assert_eq!(
            err.to_string(),
            "flush of 7 records failed: no such table: resources"
        );
        let panic = WorkerError::Panicked {
            worker: 1,
            message: "boom".to_string(),
        };
        assert_eq!(panic.to_string(), "worker 1 panicked: boom");
    }
}
