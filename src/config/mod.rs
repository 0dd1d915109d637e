//! Application configuration and constants.
//!
//! This module provides:
//! - Configuration constants (pipeline sizing, pool limits, timeouts)
//! - Store and pipeline configuration structs
//! - CLI option types and parsing

mod constants;
mod types;

// Re-export all constants
pub use constants::*;
pub use types::{LogFormat, LogLevel, Opt, PipelineConfig, StoreConfig};
