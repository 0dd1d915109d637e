//! Outcome summary of a drained pipeline.

use std::fmt;
use std::time::Duration;

use crate::error_handling::{
    ErrorType, FlushError, IngestStats, SerializationError, WorkerError,
};

/// Results of a pipeline run, available once `close()` resolves.
///
/// After a clean drain `persisted + failed + dropped == submitted`.
#[derive(Debug, Clone, PartialEq)]
pub struct DrainReport {
    /// Records accepted by `submit`
    pub submitted: usize,
    /// Records whose latest state was committed
    pub persisted: usize,
    /// Records in batches the store rejected
    pub failed: usize,
    /// Records dropped because their properties could not be encoded
    pub dropped: usize,
    /// Committed statements
    pub batches_flushed: usize,
    /// Rejected statements
    pub batches_failed: usize,
    /// Worker tasks that ended in a panic
    pub workers_panicked: usize,
    /// Time from pipeline start to drain
    pub elapsed: Duration,
    /// The first worker errors, in the order they happened
    pub errors: Vec<WorkerError>,
}

impl DrainReport {
    pub(crate) fn from_stats(submitted: usize, stats: &IngestStats, elapsed: Duration) -> Self {
        DrainReport {
            submitted,
            persisted: stats.persisted(),
            failed: stats.failed(),
            dropped: stats.dropped(),
            batches_flushed: stats.batches_flushed(),
            batches_failed: stats.batches_failed(),
            workers_panicked: stats.get_error_count(ErrorType::WorkerPanic),
            elapsed,
            errors: stats.recorded_errors(),
        }
    }

    /// Every submitted record was persisted.
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.dropped == 0 && self.workers_panicked == 0
    }

    pub fn serialization_errors(&self) -> impl Iterator<Item = &SerializationError> {
        self.errors.iter().filter_map(|e| match e {
            WorkerError::Serialization(e) => Some(e),
            _ => None,
        })
    }

    pub fn flush_errors(&self) -> impl Iterator<Item = &FlushError> {
        self.errors.iter().filter_map(|e| match e {
            WorkerError::Flush(e) => Some(e),
            _ => None,
        })
    }

    /// Records per second over the whole run.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.persisted as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for DrainReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} submitted: {} persisted, {} failed, {} dropped in {} batches ({} failed) over {:.2}s",
            self.submitted,
            self.persisted,
            self.failed,
            self.dropped,
            self.batches_flushed + self.batches_failed,
            self.batches_failed,
            self.elapsed.as_secs_f64()
        )?;
        if self.workers_panicked > 0 {
            write!(f, ", {} workers panicked", self.workers_panicked)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_from_stats() {
        let stats = IngestStats::new();
        stats.record_batch_persisted(90);
        stats.record_batch_failed(9);
        stats.record_dropped();
        stats.record_error(WorkerError::Serialization(SerializationError {
            uid: "c0/r5".to_string(),
            reason: "NUL character in property \"name\"".to_string(),
        }));
        stats.record_error(WorkerError::Flush(FlushError {
            reason: "database is locked".to_string(),
            batch_size: 9,
        }));

        let report = DrainReport::from_stats(100, &stats, Duration::from_secs(2));
        assert_eq!(report.persisted + report.failed + report.dropped, 100);
        assert!(!report.is_clean());
        assert_eq!(report.serialization_errors().count(), 1);
        assert_eq!(report.flush_errors().next().map(|e| e.batch_size), Some(9));
        assert_eq!(report.throughput(), 45.0);
        assert_eq!(
            report.to_string(),
            "100 submitted: 90 persisted, 9 failed, 1 dropped in 2 batches (1 failed) over 2.00s"
        );
    }
}
