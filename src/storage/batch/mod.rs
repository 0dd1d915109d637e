//! Batching and bulk writes.
//!
//! This module groups records into bounded batches per worker, encodes their
//! properties, and writes each batch with one multi-row upsert.

mod accumulator;
mod encoder;
mod executor;
mod types;

pub use accumulator::BatchAccumulator;
pub use encoder::PropertyEncoder;
pub use executor::BulkInsertExecutor;
pub use types::{EncodedBatch, EncodedRow, FlushResult};
