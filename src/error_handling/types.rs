//! Error type definitions.
//!
//! This module defines the producer-facing errors returned synchronously by
//! `submit`, the worker-side errors aggregated into the drain report, and the
//! setup errors for the store, configuration and logger.

use log::SetLoggerError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Errors returned to producers by `Pipeline::submit`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// The queue was closed before the record could be stored.
    #[error("queue is closed")]
    QueueClosed,

    /// The pipeline is closing or closed and accepts no submissions.
    #[error("pipeline is closed")]
    PipelineClosed,

    /// The record violates a data-model invariant (e.g. empty uid).
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

/// A record whose properties cannot be encoded; the record is dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot encode properties of {uid}: {reason}")]
pub struct SerializationError {
    pub uid: String,
    pub reason: String,
}

/// A batch rejected by the store; its records are lost for this run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("flush of {batch_size} records failed: {reason}")]
pub struct FlushError {
    pub reason: String,
    pub batch_size: usize,
}

/// Error types for database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// The pool could not establish a connection at startup.
    #[error("Unable to connect to database: {0}")]
    ConnectionFatal(#[source] sqlx::Error),

    /// The table name is not a plain SQL identifier.
    #[error("Invalid table name: {0:?}")]
    InvalidTableName(String),

    /// SQL execution error.
    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),
}

/// Error types for invalid configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("Invalid table name: {0:?}")]
    InvalidTableName(String),

    #[error("max_batch_size {requested} exceeds the store limit of {max} rows per statement")]
    BatchTooLarge { requested: usize, max: usize },
}

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Invalid pipeline or store configuration.
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    /// The store could not be prepared.
    #[error("Database initialization error: {0}")]
    DatabaseError(#[from] DatabaseError),
}

/// An error that happened inside a worker task.
///
/// These never reach `submit` callers; they are collected into the drain report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    Serialization(SerializationError),
    Flush(FlushError),
    /// A worker task panicked; carries the worker id and panic message.
    Panicked { worker: usize, message: String },
}

impl WorkerError {
    pub fn error_type(&self) -> ErrorType {
        match self {
            WorkerError::Serialization(_) => ErrorType::SerializationError,
            WorkerError::Flush(_) => ErrorType::FlushError,
            WorkerError::Panicked { .. } => ErrorType::WorkerPanic,
        }
    }
}

impl std::fmt::Display for WorkerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerError::Serialization(e) => write!(f, "{}", e),
            WorkerError::Flush(e) => write!(f, "{}", e),
            WorkerError::Panicked { worker, message } => {
                write!(f, "worker {} panicked: {}", worker, message)
            }
        }
    }
}

/// Categories of worker-side errors counted in `IngestStats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum ErrorType {
    SerializationError,
    FlushError,
    WorkerPanic,
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::SerializationError => "Serialization error",
            ErrorType::FlushError => "Flush error",
            ErrorType::WorkerPanic => "Worker panic",
        }
    }
}
