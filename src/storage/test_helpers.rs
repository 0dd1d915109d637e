//! Shared test helpers for storage module tests.
//!
//! SQLite `:memory:` databases are private to one connection, so pooled tests
//! use a file in a temporary directory instead.

#[cfg(test)]
use tempfile::TempDir;

#[cfg(test)]
use crate::config::StoreConfig;
#[cfg(test)]
use crate::storage::{create_table, ConnectionPool};

/// Creates a pool of `size` connections over a fresh database with the
/// `resources` table in place. Keep the `TempDir` alive for the test's duration.
#[cfg(test)]
pub async fn create_test_pool(size: u32) -> (TempDir, ConnectionPool) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = StoreConfig {
        db_path: dir.path().join("test.db"),
        max_connections: size,
        ..Default::default()
    };
    let pool = ConnectionPool::connect(&config)
        .await
        .expect("Failed to create test database pool");
    create_table(&pool, "resources")
        .await
        .expect("Failed to create resources table");
    (dir, pool)
}
