//! HTTP dereferencer
//!
//! This module handles all HTTP requests of a replication, including:
//! - Building the HTTP client with the configured user agent
//! - Content negotiation for N-Triples
//! - Retry with exponential backoff for configured status codes and
//!   transient network failures
//! - Error classification

use super::ntriples::parse_ntriples;
use super::{Dereferencer, Fetched};
use crate::config::FetchConfig;
use crate::FetchError;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::collections::HashMap;
use std::time::Duration;

const ACCEPT: &str = "application/n-triples";

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The fetch configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Dereferences fragments over HTTP
#[derive(Debug, Clone)]
pub struct HttpDereferencer {
    client: Client,
    max_retries: u32,
    retry_codes: Vec<u16>,
    retry_delay: Duration,
}

impl HttpDereferencer {
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            max_retries: config.max_retries,
            retry_codes: config.retry_codes.clone(),
            retry_delay: Duration::from_millis(config.retry_delay),
        })
    }

    /// Delay before retry number `attempt` (zero-based)
    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    fn is_retryable_status(&self, status: StatusCode) -> bool {
        self.retry_codes.contains(&status.as_u16())
    }
}

#[async_trait]
impl Dereferencer for HttpDereferencer {
    /// Fetches a fragment with retry logic
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Status in `retry-codes` | Retry up to `max-retries` times |
    /// | Timeout | Retry up to `max-retries` times |
    /// | Connection failure | Retry up to `max-retries` times |
    /// | Other non-success status | Immediate → `FetchError::Status` |
    /// | Unparseable body | Immediate → `FetchError::Parse` |
    async fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        let mut attempt = 0;

        loop {
            let outcome = self
                .client
                .get(url)
                .header(reqwest::header::ACCEPT, ACCEPT)
                .send()
                .await;

            let retry_reason = match outcome {
                Ok(response) if response.status().is_success() => {
                    return read_response(url, response).await;
                }
                Ok(response) if self.is_retryable_status(response.status()) => {
                    format!("status {}", response.status().as_u16())
                }
                Ok(response) => {
                    return Err(FetchError::Status {
                        url: url.to_string(),
                        status: response.status().as_u16(),
                    });
                }
                Err(e) if e.is_timeout() || e.is_connect() => e.to_string(),
                Err(e) => {
                    return Err(FetchError::Http {
                        url: url.to_string(),
                        source: e,
                    });
                }
            };

            if attempt >= self.max_retries {
                tracing::warn!("Giving up on {} after {} attempt(s): {}", url, attempt + 1, retry_reason);
                return Err(FetchError::Unavailable {
                    url: url.to_string(),
                    message: retry_reason,
                });
            }

            let delay = self.backoff(attempt);
            tracing::warn!(
                "Retrying {} in {:?} ({}), attempt {}/{}",
                url,
                delay,
                retry_reason,
                attempt + 1,
                self.max_retries
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

async fn read_response(url: &str, response: reqwest::Response) -> Result<Fetched, FetchError> {
    let final_url = response.url().to_string();

    let headers: HashMap<String, String> = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect();

    let body = response.text().await.map_err(|e| {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Http {
                url: url.to_string(),
                source: e,
            }
        }
    })?;

    let triples = parse_ntriples(&body).map_err(|message| FetchError::Parse {
        url: url.to_string(),
        message,
    })?;

    tracing::debug!("Fetched {} ({} triples)", final_url, triples.len());

    Ok(Fetched {
        final_url,
        triples,
        headers,
    })
}
