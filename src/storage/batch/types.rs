//! Batch data structures.
//!
//! This module defines the encoded form of a batch, ready to be bound into a
//! multi-row statement, and the summary returned by a successful flush.

use crate::error_handling::SerializationError;

/// One row ready to bind: uid, cluster, and the JSON-encoded properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRow {
    pub uid: String,
    pub cluster: String,
    pub data: String,
}

/// A batch after encoding.
///
/// Each uid appears at most once in `rows`, at the position of its last
/// submission. Earlier submissions of the same uid are counted in
/// `superseded`; records whose properties could not be encoded are in
/// `rejected` and will not be written.
#[derive(Debug, Default)]
pub struct EncodedBatch {
    pub rows: Vec<EncodedRow>,
    pub superseded: usize,
    pub rejected: Vec<SerializationError>,
}

impl EncodedBatch {
    /// Records that reach the store if the statement commits.
    pub fn writable_records(&self) -> usize {
        self.rows.len() + self.superseded
    }

    /// Number of records the batch was built from.
    pub fn total_records(&self) -> usize {
        self.writable_records() + self.rejected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Summary of a committed flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushResult {
    /// Records the batch was built from
    pub total: usize,
    /// Rows in the statement
    pub rows: usize,
    /// Records overwritten by a later record with the same uid in this batch
    pub superseded: usize,
    /// Records dropped for encoding failures
    pub dropped: usize,
}

impl FlushResult {
    /// Records whose latest state is now in the store.
    pub fn persisted(&self) -> usize {
        self.rows + self.superseded
    }
}
