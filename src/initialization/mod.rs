//! Application initialization and resource setup.
//!
//! This module provides functions to initialize shared resources:
//! - Logger
//! - Connection pool with the target table in place

mod logger;

use log::info;

use crate::config::{PipelineConfig, StoreConfig};
use crate::error_handling::InitializationError;
use crate::storage::{create_table, drop_table, ConnectionPool};

// Re-export public API
pub use logger::init_logger_with;

/// Connects the pool and prepares the target table.
///
/// Validates both configurations first so a bad setting fails before any
/// connection is opened. With `reset`, the table is dropped and recreated so
/// the load starts from an empty table.
///
/// # Errors
///
/// Returns `InitializationError::ConfigError` for invalid settings and
/// `InitializationError::DatabaseError` (wrapping `ConnectionFatal`) if the
/// store is unreachable.
pub async fn init_store(
    store: &StoreConfig,
    pipeline: &PipelineConfig,
    reset: bool,
) -> Result<ConnectionPool, InitializationError> {
    store.validate()?;
    pipeline.validate()?;

    let pool = ConnectionPool::connect(store).await?;
    if reset {
        info!("Recreating table {}", pipeline.table);
        drop_table(&pool, &pipeline.table).await?;
    }
    create_table(&pool, &pipeline.table).await?;
    Ok(pool)
}
