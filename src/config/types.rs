//! Configuration types and CLI options.
//!
//! This module defines the store and pipeline configuration structs, the
//! logging enums, and the command-line options of the binary.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::config::constants::*;
use crate::error_handling::ConfigError;
use crate::storage::is_valid_identifier;

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Connection pool configuration.
///
/// # Examples
///
/// ```no_run
/// use bulk_ingest::StoreConfig;
/// use std::path::PathBuf;
///
/// let config = StoreConfig {
///     db_path: PathBuf::from("./resources.db"),
///     max_connections: 4,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database path (SQLite file)
    pub db_path: PathBuf,

    /// Fixed pool size; never grows
    pub max_connections: u32,

    /// How long `acquire` waits for a free connection
    pub acquire_timeout: Duration,

    /// How long a connection retries a locked database
    pub busy_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DB_PATH),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

impl StoreConfig {
    /// Builds a store configuration from the environment.
    ///
    /// Reads `BULK_INGEST_DB_PATH` and `BULK_INGEST_MAX_CONNECTIONS`. A connection
    /// count that does not parse falls back to the default with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = std::env::var(ENV_DB_PATH) {
            config.db_path = PathBuf::from(path);
        }
        if let Ok(raw) = std::env::var(ENV_MAX_CONNECTIONS) {
            match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => config.max_connections = n,
                _ => log::warn!(
                    "Error parsing {}={:?}, using default {}",
                    ENV_MAX_CONNECTIONS,
                    raw,
                    DEFAULT_MAX_CONNECTIONS
                ),
            }
        }
        config
    }

    /// Checks the pool configuration before any connection is opened.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 {
            return Err(ConfigError::ZeroValue("max_connections"));
        }
        Ok(())
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Target table; must be a plain SQL identifier
    pub table: String,

    /// Number of worker tasks
    pub workers: usize,

    /// Queue capacity before producers block
    pub queue_capacity: usize,

    /// Records per multi-row upsert
    pub max_batch_size: usize,

    /// Maximum age of a partial batch
    pub max_batch_wait: Duration,

    /// Largest encoded `properties` document accepted
    pub max_document_bytes: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_batch_wait: DEFAULT_MAX_BATCH_WAIT,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
        }
    }
}

impl PipelineConfig {
    /// Checks the configuration before any worker is started.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a count is zero, the table name is not a plain
    /// identifier, or one batch would exceed the store's bind-parameter limit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_identifier(&self.table) {
            return Err(ConfigError::InvalidTableName(self.table.clone()));
        }
        if self.workers == 0 {
            return Err(ConfigError::ZeroValue("workers"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroValue("queue_capacity"));
        }
        if self.max_batch_size == 0 {
            return Err(ConfigError::ZeroValue("max_batch_size"));
        }
        if self.max_batch_wait.is_zero() {
            return Err(ConfigError::ZeroValue("max_batch_wait"));
        }
        if self.max_document_bytes == 0 {
            return Err(ConfigError::ZeroValue("max_document_bytes"));
        }
        let max_rows = MAX_BIND_PARAMETERS / COLUMNS_PER_ROW;
        if self.max_batch_size > max_rows {
            return Err(ConfigError::BatchTooLarge {
                requested: self.max_batch_size,
                max: max_rows,
            });
        }
        Ok(())
    }
}

/// Command-line options.
///
/// # Examples
///
/// ```bash
/// # Load 10 clusters from a template
/// bulk_ingest data/sno-0.json --clusters 10
///
/// # Four workers, larger batches, custom database
/// bulk_ingest data/sno-0.json --workers 4 --batch-size 500 --db-path ./bench.db
/// ```
#[derive(Debug, Parser)]
#[command(
    name = "bulk_ingest",
    about = "Loads template resources for simulated clusters through the batched insert pipeline."
)]
pub struct Opt {
    /// Template file (JSON with an `addResources` array)
    #[arg(value_parser)]
    pub template: PathBuf,

    /// Number of clusters to simulate
    #[arg(long, default_value_t = 10)]
    pub clusters: usize,

    /// Log level: error|warn|info|debug|trace
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log format: plain|json
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Database path (SQLite file); overrides BULK_INGEST_DB_PATH
    #[arg(long, value_parser)]
    pub db_path: Option<PathBuf>,

    /// Pool size; overrides BULK_INGEST_MAX_CONNECTIONS
    #[arg(long)]
    pub max_connections: Option<u32>,

    /// Target table
    #[arg(long, default_value = DEFAULT_TABLE)]
    pub table: String,

    /// Worker tasks draining the queue
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Queue capacity before producers block
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Records per multi-row upsert
    #[arg(long, default_value_t = DEFAULT_MAX_BATCH_SIZE)]
    pub batch_size: usize,

    /// Maximum age of a partial batch in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub batch_wait_ms: u64,

    /// Keep existing rows instead of recreating the table
    #[arg(long)]
    pub keep_table: bool,
}

impl Opt {
    /// Store configuration: environment first, CLI flags override.
    pub fn store_config(&self) -> StoreConfig {
        let mut config = StoreConfig::from_env();
        if let Some(path) = &self.db_path {
            config.db_path = path.clone();
        }
        if let Some(n) = self.max_connections {
            config.max_connections = n;
        }
        config
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            table: self.table.clone(),
            workers: self.workers,
            queue_capacity: self.queue_capacity,
            max_batch_size: self.batch_size,
            max_batch_wait: Duration::from_millis(self.batch_wait_ms),
            ..Default::default()
        }
    }
}
