//! Multi-row upsert execution.

use std::collections::HashSet;
use std::time::Instant;

use sqlx::sqlite::SqliteConnection;
use sqlx::{QueryBuilder, Sqlite};

use crate::error_handling::{DatabaseError, FlushError};
use crate::storage::is_valid_identifier;
use crate::storage::models::Record;

use super::encoder::PropertyEncoder;
use super::types::{EncodedBatch, EncodedRow, FlushResult};

/// Turns a batch into one `INSERT .. ON CONFLICT (uid) DO UPDATE` statement.
///
/// The statement is a single round trip and commits or fails as a whole.
/// Failed batches are reported, never retried.
#[derive(Debug, Clone)]
pub struct BulkInsertExecutor {
    table: String,
    encoder: PropertyEncoder,
}

impl BulkInsertExecutor {
    /// # Errors
    ///
    /// Returns `DatabaseError::InvalidTableName` unless `table` is a plain
    /// identifier; it is interpolated into the statement.
    pub fn new(table: &str, encoder: PropertyEncoder) -> Result<Self, DatabaseError> {
        if !is_valid_identifier(table) {
            return Err(DatabaseError::InvalidTableName(table.to_string()));
        }
        Ok(BulkInsertExecutor {
            table: table.to_string(),
            encoder,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Encodes a batch, collapsing repeated uids to their last submission.
    ///
    /// One statement must not upsert the same key twice, and keeping the last
    /// occurrence preserves last-write-wins inside the batch. Records that fail
    /// to encode are moved to `rejected` first, so the last *encodable*
    /// submission of a uid is the one written.
    pub fn encode(&self, batch: Vec<Record>) -> EncodedBatch {
        let mut rejected = Vec::new();
        let mut rows = Vec::with_capacity(batch.len());
        for record in batch {
            match self.encoder.encode(&record) {
                Ok(data) => rows.push(EncodedRow {
                    uid: record.uid,
                    cluster: record.cluster,
                    data,
                }),
                Err(e) => rejected.push(e),
            }
        }

        let encoded_count = rows.len();
        let mut seen = HashSet::with_capacity(encoded_count);
        let mut latest: Vec<EncodedRow> = rows
            .into_iter()
            .rev()
            .filter(|row| seen.insert(row.uid.clone()))
            .collect();
        latest.reverse();

        EncodedBatch {
            superseded: encoded_count - latest.len(),
            rows: latest,
            rejected,
        }
    }

    /// Executes an encoded batch on a leased connection.
    ///
    /// A batch with no rows does not touch the store.
    ///
    /// # Errors
    ///
    /// Returns `FlushError` when the store rejects the statement; none of the
    /// batch's rows are visible in that case.
    pub async fn execute(
        &self,
        batch: &EncodedBatch,
        conn: &mut SqliteConnection,
    ) -> Result<FlushResult, FlushError> {
        let result = FlushResult {
            total: batch.total_records(),
            rows: batch.rows.len(),
            superseded: batch.superseded,
            dropped: batch.rejected.len(),
        };
        if batch.is_empty() {
            return Ok(result);
        }

        let start = Instant::now();
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("INSERT INTO {} (uid, cluster, data) ", self.table));
        builder.push_values(batch.rows.iter(), |mut row, r| {
            row.push_bind(r.uid.as_str())
                .push_bind(r.cluster.as_str())
                .push_bind(r.data.as_str());
        });
        builder.push(
            " ON CONFLICT (uid) DO UPDATE SET cluster = excluded.cluster, data = excluded.data",
        );

        builder
            .build()
            .execute(&mut *conn)
            .await
            .map_err(|e| FlushError {
                reason: e.to_string(),
                batch_size: batch.writable_records(),
            })?;

        log::trace!(
            "upserted {} rows into {} in {:.1}ms",
            result.rows,
            self.table,
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(result)
    }

    /// Encodes and executes a batch in one call.
    pub async fn flush(
        &self,
        batch: Vec<Record>,
        conn: &mut SqliteConnection,
    ) -> Result<FlushResult, FlushError> {
        let encoded = self.encode(batch);
        for rejected in &encoded.rejected {
            log::warn!("Dropping record: {}", rejected);
        }
        self.execute(&encoded, conn).await
    }
}
