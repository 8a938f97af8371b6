use crate::chain::Direction;
use crate::condition::TimezonePolicy;
use serde::Deserialize;

/// Main configuration structure for ldes-tide
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub stream: StreamConfig,
    #[serde(default)]
    pub replication: ReplicationConfig,
    #[serde(default)]
    pub condition: ConditionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

impl Config {
    /// Builds a configuration for `url` with every other setting at its default
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            stream: StreamConfig {
                url: url.into(),
                timestamp_path: None,
                version_of_path: None,
                last_of_transaction_path: None,
                shape: None,
            },
            replication: ReplicationConfig::default(),
            condition: ConditionConfig::default(),
            storage: StorageConfig::default(),
            fetch: FetchConfig::default(),
        }
    }

    /// The emission order in effect
    ///
    /// Keeping only the latest version of each member always replicates
    /// newest first, whatever ordering was requested.
    pub fn direction(&self) -> Option<Direction> {
        if self.replication.last_version_only {
            return Some(Direction::Descending);
        }
        self.replication.ordering.direction()
    }
}

/// The stream being replicated
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    /// URL of the stream or of its root fragment
    pub url: String,

    /// Predicate path to the member timestamp
    #[serde(rename = "timestamp-path")]
    pub timestamp_path: Option<Vec<String>>,

    /// Predicate path to the identity a member is a version of
    #[serde(rename = "version-of-path")]
    pub version_of_path: Option<Vec<String>>,

    /// Predicate path to the last-of-transaction flag
    #[serde(rename = "last-of-transaction-path")]
    pub last_of_transaction_path: Option<Vec<String>>,

    /// Shape identifier handed to the extractor
    pub shape: Option<String>,
}

/// Requested emission order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderingMode {
    #[default]
    None,
    Ascending,
    Descending,
}

impl OrderingMode {
    pub fn direction(&self) -> Option<Direction> {
        match self {
            Self::None => None,
            Self::Ascending => Some(Direction::Ascending),
            Self::Descending => Some(Direction::Descending),
        }
    }
}

/// Replication behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ReplicationConfig {
    /// Maximum number of fragments fetched at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Maximum number of member extractions running at once
    #[serde(rename = "extraction-workers", default = "default_extraction_workers")]
    pub extraction_workers: usize,

    #[serde(default)]
    pub ordering: OrderingMode,

    /// Keep refetching mutable fragments once the stream is exhausted
    #[serde(default)]
    pub polling: bool,

    /// Time between poll cycles (milliseconds)
    #[serde(rename = "poll-interval", default = "default_poll_interval")]
    pub poll_interval: u64,

    /// How to read relation values that state no timezone
    #[serde(rename = "default-timezone", default)]
    pub default_timezone: TimezonePolicy,

    /// Emit only the newest version of each logical member
    #[serde(rename = "last-version-only", default)]
    pub last_version_only: bool,

    /// Rewrite versioned members onto the identity they are a version of
    #[serde(default)]
    pub materialize: bool,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            extraction_workers: default_extraction_workers(),
            ordering: OrderingMode::default(),
            polling: false,
            poll_interval: default_poll_interval(),
            default_timezone: TimezonePolicy::default(),
            last_version_only: false,
            materialize: false,
        }
    }
}

/// Which members to replicate
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConditionConfig {
    /// Keep members stamped at or after this (partial) date/time
    pub after: Option<String>,

    /// Keep members stamped before this (partial) date/time
    pub before: Option<String>,

    /// Arbitrary bounds on other paths
    #[serde(default, rename = "range")]
    pub ranges: Vec<RangeEntry>,
}

/// Bounds on the value at one path
#[derive(Debug, Clone, Deserialize)]
pub struct RangeEntry {
    pub path: Vec<String>,
    pub min: Option<String>,
    pub max: Option<String>,

    #[serde(rename = "min-inclusive", default = "default_true")]
    pub min_inclusive: bool,

    #[serde(rename = "max-inclusive", default)]
    pub max_inclusive: bool,
}

/// Replication state configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// HTTP dereferencing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Number of retries after the first attempt
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Status codes that are retried
    #[serde(rename = "retry-codes", default = "default_retry_codes")]
    pub retry_codes: Vec<u16>,

    /// Delay before the first retry, doubled on each attempt (milliseconds)
    #[serde(rename = "retry-delay", default = "default_retry_delay")]
    pub retry_delay: u64,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout (seconds)
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_codes: default_retry_codes(),
            retry_delay: default_retry_delay(),
            user_agent: default_user_agent(),
            timeout: default_timeout(),
        }
    }
}

fn default_concurrency() -> usize {
    10
}

fn default_extraction_workers() -> usize {
    4
}

fn default_poll_interval() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

fn default_database_path() -> String {
    "./ldes-tide.db".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_codes() -> Vec<u16> {
    vec![408, 425, 429, 500, 502, 503, 504]
}

fn default_retry_delay() -> u64 {
    500
}

fn default_user_agent() -> String {
    format!("ldes-tide/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout() -> u64 {
    30
}
