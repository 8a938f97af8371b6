//! Configuration module for ldes-tide
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, and turning the `[condition]` section into a member condition.
//!
//! # Example
//!
//! ```no_run
//! use ldes_tide::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("stream.toml")).unwrap();
//! println!("Replication will use concurrency: {}", config.replication.concurrency);
//! ```

mod condition;
mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ConditionConfig, Config, FetchConfig, OrderingMode, RangeEntry, ReplicationConfig,
    StorageConfig, StreamConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};

pub use validation::validate;
