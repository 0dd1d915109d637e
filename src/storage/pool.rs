//! Database connection pool management.
//!
//! This module wraps the SQLite connection pool with:
//! - WAL mode enabled for concurrent access
//! - A fixed connection limit and acquire timeout
//! - Automatic database file creation
//! - Lease accounting, so callers can observe how many connections are out

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{error, info};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool};

use crate::config::StoreConfig;
use crate::error_handling::DatabaseError;

/// A fixed-size pool of store connections.
///
/// Cloning is cheap and every clone shares the same connections. `acquire`
/// suspends while all connections are leased; waiters are served in arrival
/// order, so no worker starves while others keep flushing.
#[derive(Clone)]
pub struct ConnectionPool {
    pool: SqlitePool,
    size: u32,
    leased: Arc<AtomicUsize>,
}

impl ConnectionPool {
    /// Opens the pool and verifies the store is reachable.
    ///
    /// Creates the database file if it doesn't exist and enables WAL mode.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::ConnectionFatal` if no connection can be
    /// established. Nothing may be submitted to a pipeline in that case.
    pub async fn connect(config: &StoreConfig) -> Result<Self, DatabaseError> {
        if config.max_connections == 0 {
            return Err(DatabaseError::ConnectionFatal(sqlx::Error::Configuration(
                "max_connections must be greater than zero".into(),
            )));
        }

        info!(
            "Connecting to SQLite at {} (max {} connections)",
            config.db_path.display(),
            config.max_connections
        );

        let options = SqliteConnectOptions::new()
            .filename(&config.db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(config.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| {
                error!("Unable to connect to database: {e}");
                DatabaseError::ConnectionFatal(e)
            })?;

        sqlx::query("SELECT 1").execute(&pool).await.map_err(|e| {
            error!("Database ping failed: {e}");
            DatabaseError::ConnectionFatal(e)
        })?;
        info!("Successfully connected!");

        Ok(ConnectionPool {
            pool,
            size: config.max_connections,
            leased: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Leases a connection, waiting while the pool is exhausted.
    ///
    /// The connection goes back to the pool when the returned guard is dropped,
    /// which also happens while unwinding from a panic.
    pub async fn acquire(&self) -> Result<PooledConnection, DatabaseError> {
        let conn = self.pool.acquire().await?;
        self.leased.fetch_add(1, Ordering::SeqCst);
        Ok(PooledConnection {
            conn,
            leased: Arc::clone(&self.leased),
        })
    }

    /// Returns a leased connection to the pool.
    pub fn release(&self, conn: PooledConnection) {
        drop(conn);
    }

    /// Number of connections currently leased.
    pub fn in_use(&self) -> usize {
        self.leased.load(Ordering::SeqCst)
    }

    /// Configured pool size.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// The underlying sqlx pool, for one-off statements outside the pipeline.
    pub fn inner(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes every connection; pending and future `acquire` calls fail.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// A leased connection; dereferences to the driver connection.
pub struct PooledConnection {
    conn: PoolConnection<Sqlite>,
    leased: Arc<AtomicUsize>,
}

impl Deref for PooledConnection {
    type Target = SqliteConnection;

    fn deref(&self) -> &SqliteConnection {
        &self.conn
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        self.leased.fetch_sub(1, Ordering::SeqCst);
    }
}
