//! Configuration constants.
//!
//! This module defines all configuration constants used throughout the pipeline,
//! including queue and batch limits, pool sizing, and timeouts.

use std::time::Duration;

/// Default table the pipeline writes into
pub const DEFAULT_TABLE: &str = "resources";

/// Default SQLite database file
pub const DB_PATH: &str = "./bulk_ingest.db";

// Pipeline sizing
/// Number of worker tasks draining the queue
pub const DEFAULT_WORKERS: usize = 2;
/// Records the queue holds before `submit` starts blocking producers
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
/// Records per multi-row upsert
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;
/// Maximum age of a partial batch before it is flushed anyway
pub const DEFAULT_MAX_BATCH_WAIT: Duration = Duration::from_secs(1);

// Connection pool
/// Fixed number of pooled store connections
pub const DEFAULT_MAX_CONNECTIONS: u32 = 8;
/// How long a worker waits for a free connection before the flush fails
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);
/// How long SQLite retries a locked database before reporting `SQLITE_BUSY`
/// Writers serialize on the WAL lock, so this must comfortably exceed one flush.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// Encoding limits
/// Largest encoded `properties` document accepted (1MB)
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 1024 * 1024;

/// Upper bound on bind parameters in one statement (SQLite's compiled default
/// `SQLITE_MAX_VARIABLE_NUMBER` since 3.32)
pub const MAX_BIND_PARAMETERS: usize = 32_766;
/// Bind parameters per row: uid, cluster, data
pub const COLUMNS_PER_ROW: usize = 3;

/// Worker errors kept verbatim in the drain report; counters are never capped
pub const MAX_RECORDED_ERRORS: usize = 100;

// Environment variables read by `StoreConfig::from_env`
pub const ENV_DB_PATH: &str = "BULK_INGEST_DB_PATH";
pub const ENV_MAX_CONNECTIONS: &str = "BULK_INGEST_MAX_CONNECTIONS";

/// Placeholder cluster name used inside template uids
pub const TEMPLATE_CLUSTER: &str = "local-cluster";
