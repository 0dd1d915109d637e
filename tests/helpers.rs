// Shared test helpers for store setup and test data creation.
//
// Each test gets its own SQLite file in a temporary directory; in-memory
// databases are private to a single connection and cannot back a pool.

use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;

use bulk_ingest::initialization::init_store;
use bulk_ingest::{ConnectionPool, PipelineConfig, Properties, Record, StoreConfig};

/// Store configuration for a database file inside `dir`.
pub fn store_config(dir: &TempDir, max_connections: u32) -> StoreConfig {
    StoreConfig {
        db_path: dir.path().join("ingest.db"),
        max_connections,
        ..Default::default()
    }
}

/// Pipeline configuration with a long batch wait, so only full batches and
/// `close()` trigger flushes unless a test says otherwise.
#[allow(dead_code)] // Used by other test files
pub fn pipeline_config(workers: usize, max_batch_size: usize) -> PipelineConfig {
    PipelineConfig {
        workers,
        max_batch_size,
        max_batch_wait: Duration::from_secs(60),
        ..Default::default()
    }
}

/// Creates a pool over a fresh database with the `resources` table in place.
/// Keep the `TempDir` alive for the test's duration.
pub async fn create_test_store(max_connections: u32) -> (TempDir, ConnectionPool) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let pool = init_store(
        &store_config(&dir, max_connections),
        &PipelineConfig::default(),
        true,
    )
    .await
    .expect("Failed to initialize test store");
    (dir, pool)
}

/// Record `c{cluster}/r{i}` with a small property bag.
#[allow(dead_code)] // Used by other test files
pub fn test_record(cluster: usize, i: usize) -> Record {
    let mut properties = Properties::new();
    properties.insert("kind".to_string(), json!("Pod"));
    properties.insert("index".to_string(), json!(i));
    Record::new(
        format!("c{cluster}/r{i}"),
        format!("c{cluster}"),
        format!("pod-{i}"),
        properties,
    )
}

/// Adds a trigger that aborts any insert of `uid`, failing its whole batch.
#[allow(dead_code)] // Used by other test files
pub async fn poison_uid(pool: &ConnectionPool, uid: &str) {
    sqlx::query(&format!(
        "CREATE TRIGGER reject_poison BEFORE INSERT ON resources
         WHEN NEW.uid = '{uid}'
         BEGIN SELECT RAISE(ABORT, 'poisoned record'); END"
    ))
    .execute(pool.inner())
    .await
    .expect("Failed to create poison trigger");
}
