// storage/mod.rs
// Database operations module

pub mod batch;
pub mod models;
pub mod pool;
pub mod schema;
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used items
pub use batch::{BatchAccumulator, BulkInsertExecutor, EncodedBatch, FlushResult, PropertyEncoder};
pub use models::{Properties, Record};
pub use pool::{ConnectionPool, PooledConnection};
pub use schema::{
    count_rows, create_table, drop_table, fetch_all_resources, fetch_resource,
    is_valid_identifier, StoredResource,
};
