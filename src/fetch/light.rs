//! Lightweight HTTP fetch strategy
//!
//! This module handles plain HTTP GETs, including:
//! - Building HTTP clients with the crawler's user agent string
//! - Automatic redirect following
//! - Retry with bounded exponential backoff for transient failures
//! - Error classification into transient and permanent failures

use crate::config::{FetchConfig, UserAgentConfig};
use crate::fetch::{FailureKind, FetchOutcome, FetchStrategy, RetryPolicy, StrategyKind};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, Response};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Maximum redirect hops followed per request
const MAX_REDIRECTS: usize = 10;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Deadline for each request, including the body
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use sumi_harvest::config::UserAgentConfig;
/// use sumi_harvest::fetch::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "SumiHarvest".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// How one attempt ended
enum Attempt {
    /// Body retrieved
    Done(FetchOutcome),
    /// Worth retrying
    Transient { error: String, status: Option<u16> },
    /// Not worth retrying
    Permanent { error: String, status: u16 },
}

/// Cheap first-choice strategy: one HTTP GET with retries
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 2xx | Success |
/// | HTTP 4xx | Fail immediately (permanent) |
/// | HTTP 5xx | Retry with backoff |
/// | Timeout / connection error | Retry with backoff |
pub struct LightFetchStrategy {
    client: Client,
    retry: RetryPolicy,
}

impl LightFetchStrategy {
    pub fn new(client: Client, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// Builds the strategy with its own client from configuration
    pub fn from_config(
        user_agent: &UserAgentConfig,
        config: &FetchConfig,
    ) -> Result<Self, reqwest::Error> {
        let client = build_http_client(user_agent, config.http_timeout())?;
        Ok(Self::new(client, RetryPolicy::from_config(config)))
    }

    async fn attempt(&self, url: &str) -> Attempt {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                return Attempt::Transient {
                    error: describe_request_error(&e),
                    status: None,
                }
            }
        };

        let status = response.status();
        if status.is_server_error() {
            return Attempt::Transient {
                error: format!("HTTP {}", status.as_u16()),
                status: Some(status.as_u16()),
            };
        }
        if status.is_client_error() {
            return Attempt::Permanent {
                error: format!("HTTP {}", status.as_u16()),
                status: status.as_u16(),
            };
        }

        let headers = collect_headers(&response);
        match response.text().await {
            Ok(body) => Attempt::Done(FetchOutcome::succeeded(
                url,
                StrategyKind::Light,
                body,
                Some(status.as_u16()),
                headers,
            )),
            Err(e) => Attempt::Transient {
                error: format!("Failed to read body: {}", describe_request_error(&e)),
                status: Some(status.as_u16()),
            },
        }
    }
}

#[async_trait]
impl FetchStrategy for LightFetchStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Light
    }

    async fn fetch(&self, url: &str) -> FetchOutcome {
        let started = Instant::now();
        let mut attempts = 0;

        loop {
            attempts += 1;

            let (error, status) = match self.attempt(url).await {
                Attempt::Done(outcome) => {
                    tracing::debug!("Fetched {} on attempt {}", url, attempts);
                    return outcome
                        .with_retries(attempts - 1)
                        .with_elapsed(started.elapsed());
                }
                Attempt::Permanent { error, status } => {
                    tracing::debug!("Permanent failure fetching {}: {}", url, error);
                    return FetchOutcome::failed(
                        url,
                        Some(StrategyKind::Light),
                        FailureKind::PermanentFetch,
                        error,
                    )
                    .with_status(status)
                    .with_retries(attempts - 1)
                    .with_elapsed(started.elapsed());
                }
                Attempt::Transient { error, status } => (error, status),
            };

            if !self.retry.should_retry(attempts) {
                tracing::info!(
                    "Giving up on {} after {} attempts: {}",
                    url,
                    attempts,
                    error
                );
                let outcome = FetchOutcome::failed(
                    url,
                    Some(StrategyKind::Light),
                    FailureKind::TransientNetwork,
                    error,
                )
                .with_retries(attempts - 1)
                .with_elapsed(started.elapsed());
                return match status {
                    Some(code) => outcome.with_status(code),
                    None => outcome,
                };
            }

            let delay = self.retry.backoff(attempts);
            tracing::debug!(
                "Transient failure fetching {} ({}), attempt {}/{}, retrying in {:?}",
                url,
                error,
                attempts,
                self.retry.max_attempts,
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}

fn collect_headers(response: &Response) -> HashMap<String, String> {
    response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

fn describe_request_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        format!("Connection failed: {}", e)
    } else if e.is_redirect() {
        format!("Redirect error: {}", e)
    } else {
        e.to_string()
    }
}
