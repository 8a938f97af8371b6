//! ldes-tide: a resumable replicator for paginated event streams
//!
//! This crate walks a graph of linked fragments, extracts the members each
//! fragment carries, and delivers them either as soon as they are found or
//! strictly ordered by timestamp, persisting enough state to resume after an
//! interruption without losing or duplicating members.

pub mod chain;
pub mod condition;
pub mod config;
pub mod extract;
pub mod fetcher;
pub mod model;
pub mod output;
pub mod scheduler;
pub mod state;
pub mod storage;
pub mod strategy;
pub mod vocab;

use thiserror::Error;

/// Main error type for replication operations
#[derive(Debug, Error)]
pub enum LdesError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition {
        from: state::TraversalState,
        to: state::TraversalState,
    },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Replication task failed: {0}")]
    Task(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid condition bound: {0}")]
    InvalidBound(String),

    #[error("Ordered replication requires a timestamp path")]
    MissingTimestampPath,

    #[error("Keeping only the latest version requires a version-of path")]
    MissingVersionPath,
}

/// Failure to fetch one fragment
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to parse {url}: {message}")]
    Parse { url: String, message: String },

    #[error("Fragment {url} unavailable: {message}")]
    Unavailable { url: String, message: String },
}

impl FetchError {
    /// The fragment the failure concerns
    pub fn url(&self) -> &str {
        match self {
            Self::Http { url, .. }
            | Self::Timeout { url }
            | Self::Status { url, .. }
            | Self::Parse { url, .. }
            | Self::Unavailable { url, .. } => url,
        }
    }
}

/// Failure to extract one member
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to extract {member}: {message}")]
    Failed { member: String, message: String },

    #[error("Extraction worker stopped: {0}")]
    Worker(String),
}

/// Result type alias for replication operations
pub type Result<T> = std::result::Result<T, LdesError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use chain::{Direction, RelationChain};
pub use condition::{Condition, Range, TimezonePolicy};
pub use config::Config;
pub use model::{FragmentRef, Member, Value};
pub use output::{MemberStream, StreamEvent};
pub use strategy::Replicator;
