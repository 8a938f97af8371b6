use crate::config::types::{Config, FetchConfig, ReplicationConfig, StorageConfig, StreamConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_stream_config(&config.stream)?;
    validate_replication_config(&config.replication)?;
    validate_ordering(config)?;
    validate_storage_config(&config.storage)?;
    validate_fetch_config(&config.fetch)?;

    // Building the condition checks every bound parses
    config.condition()?;

    Ok(())
}

/// Validates the stream section
fn validate_stream_config(config: &StreamConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid stream url '{}': {}", config.url, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Stream url '{}' must use http or https",
            config.url
        )));
    }

    for (name, path) in [
        ("timestamp-path", &config.timestamp_path),
        ("version-of-path", &config.version_of_path),
        ("last-of-transaction-path", &config.last_of_transaction_path),
    ] {
        if let Some(path) = path {
            validate_path(name, path)?;
        }
    }

    Ok(())
}

/// Validates a predicate path: non-empty, every step an absolute IRI
fn validate_path(name: &str, path: &[String]) -> Result<(), ConfigError> {
    if path.is_empty() {
        return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
    }

    for step in path {
        Url::parse(step).map_err(|e| {
            ConfigError::Validation(format!("{} step '{}' is not an IRI: {}", name, step, e))
        })?;
    }

    Ok(())
}

/// Validates replication settings
fn validate_replication_config(config: &ReplicationConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 100, got {}",
            config.concurrency
        )));
    }

    if config.extraction_workers < 1 {
        return Err(ConfigError::Validation(format!(
            "extraction-workers must be >= 1, got {}",
            config.extraction_workers
        )));
    }

    if config.polling && config.poll_interval < 100 {
        return Err(ConfigError::Validation(format!(
            "poll-interval must be >= 100ms when polling, got {}ms",
            config.poll_interval
        )));
    }

    Ok(())
}

/// Checks the paths ordered and versioned replication depend on
fn validate_ordering(config: &Config) -> Result<(), ConfigError> {
    if config.replication.last_version_only && config.stream.version_of_path.is_none() {
        return Err(ConfigError::MissingVersionPath);
    }

    if config.direction().is_some() && config.stream.timestamp_path.is_none() {
        return Err(ConfigError::MissingTimestampPath);
    }

    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates fetch configuration
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.timeout == 0 {
        return Err(ConfigError::Validation(
            "timeout must be >= 1 second".to_string(),
        ));
    }

    if let Some(code) = config.retry_codes.iter().find(|c| !(100..=599).contains(*c)) {
        return Err(ConfigError::Validation(format!(
            "retry-codes contains invalid status {}",
            code
        )));
    }

    Ok(())
}
