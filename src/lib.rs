//! bulk_ingest library: concurrent batched inserts into a relational store
//!
//! Producers submit [`Record`]s to a [`Pipeline`]; worker tasks group them into
//! batches and write each batch with one multi-row upsert over a bounded
//! connection pool. Resubmitting a uid updates its row (last write wins).
//!
//! # Example
//!
//! ```no_run
//! use bulk_ingest::{Pipeline, PipelineConfig, Properties, Record, StoreConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = StoreConfig {
//!     db_path: std::path::PathBuf::from("./resources.db"),
//!     ..Default::default()
//! };
//! let pipeline = Pipeline::connect(&store, PipelineConfig::default()).await?;
//!
//! for i in 0..1000 {
//!     let uid = format!("c0/r{i}");
//!     pipeline.submit(Record::new(uid, "c0", "pod", Properties::new())).await?;
//! }
//!
//! let report = pipeline.close().await;
//! println!("{} of {} records persisted", report.persisted, report.submitted);
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Workers are spawned when the
//! pipeline starts.

pub mod config;
pub mod error_handling;
pub mod initialization;
pub mod pipeline;
pub mod storage;
pub mod template;

// Re-export public API
pub use config::{LogFormat, LogLevel, Opt, PipelineConfig, StoreConfig};
pub use error_handling::{
    DatabaseError, FlushError, InitializationError, SerializationError, SubmitError, WorkerError,
};
pub use pipeline::{DrainReport, Pipeline, PipelineState, RecordQueue};
pub use storage::{
    count_rows, fetch_all_resources, fetch_resource, BatchAccumulator, BulkInsertExecutor,
    ConnectionPool, PooledConnection, Properties, PropertyEncoder, Record, StoredResource,
};
pub use template::Template;
