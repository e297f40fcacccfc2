//! Robots.txt handling module
//!
//! This module fetches, parses and caches robots.txt per domain. Entries live
//! in a keyed store with one async lock per domain, so concurrent first
//! requests to a domain trigger a single fetch while other domains proceed
//! independently.
//!
//! Failing to fetch robots.txt (timeouts, connection errors, 5xx after
//! retries) yields a permissive policy. This is a deliberate availability
//! choice: a robots.txt outage must not silently halt legitimate crawling.
//! Every such fallback is logged at `warn` and flagged with `fetch_failed`.

mod cache;
mod parser;

pub use cache::RobotsPolicy;
pub use parser::{parse_robots, RobotsRules, MAX_CRAWL_DELAY_SECONDS};

use crate::fetch::RetryPolicy;
use dashmap::DashMap;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

/// Result of a single robots.txt request
enum RobotsResponse {
    /// robots.txt body
    Found(String),
    /// 4xx: the site publishes no robots.txt
    Absent(u16),
}

/// Per-domain cache of robots.txt policies
pub struct RobotsPolicyCache {
    client: Client,
    user_agent: String,
    timeout: Duration,
    retry: RetryPolicy,
    entries: DashMap<String, Arc<Mutex<Option<RobotsPolicy>>>>,
}

impl RobotsPolicyCache {
    /// Creates an empty cache
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client used for robots.txt requests
    /// * `user_agent` - Product token matched against `User-agent` groups
    /// * `timeout` - Deadline for each robots.txt request
    /// * `retry` - Retry budget for transient failures
    pub fn new(client: Client, user_agent: &str, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            client,
            user_agent: user_agent.to_string(),
            timeout,
            retry,
            entries: DashMap::new(),
        }
    }

    /// Returns the policy for `domain`, fetching it when absent or stale
    ///
    /// # Arguments
    ///
    /// * `domain` - Cache key (lowercase host)
    /// * `url` - Any URL on the domain; its origin locates robots.txt
    pub async fn policy_for(&self, domain: &str, url: &Url) -> RobotsPolicy {
        let slot = self.slot(domain);
        let mut entry = slot.lock().await;

        if let Some(policy) = entry.as_ref() {
            if !policy.is_stale() {
                return policy.clone();
            }
            tracing::debug!("robots.txt for {} is stale, refreshing", domain);
        }

        let policy = self.fetch_policy(domain, url).await;
        *entry = Some(policy.clone());
        policy
    }

    /// Returns the cached policy without fetching
    ///
    /// Returns None when no policy is cached or another task is refreshing it.
    pub fn cached(&self, domain: &str) -> Option<RobotsPolicy> {
        let slot = self.entries.get(domain)?.value().clone();
        let entry = slot.try_lock().ok()?;
        entry.clone()
    }

    /// Stores a policy for `domain`, replacing any cached entry
    pub async fn insert(&self, domain: &str, policy: RobotsPolicy) {
        let slot = self.slot(domain);
        *slot.lock().await = Some(policy);
    }

    /// Number of domains with a cache slot
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no domain has been seen yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn slot(&self, domain: &str) -> Arc<Mutex<Option<RobotsPolicy>>> {
        self.entries
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .value()
            .clone()
    }

    /// Fetches and parses robots.txt, falling back to a permissive policy
    async fn fetch_policy(&self, domain: &str, url: &Url) -> RobotsPolicy {
        let robots_url = match url.join("/robots.txt") {
            Ok(u) => u,
            Err(e) => {
                tracing::warn!("Cannot build robots.txt URL for {}: {}", domain, e);
                return RobotsPolicy::permissive(true);
            }
        };

        let mut attempts = 0;
        loop {
            attempts += 1;

            let error = match self.fetch_once(&robots_url).await {
                Ok(RobotsResponse::Found(body)) => {
                    let policy = RobotsPolicy::from_rules(parse_robots(&body, &self.user_agent));
                    tracing::debug!(
                        "Fetched robots.txt for {}: {} disallowed prefixes, crawl-delay {}s",
                        domain,
                        policy.disallowed_paths.len(),
                        policy.crawl_delay_seconds
                    );
                    return policy;
                }
                Ok(RobotsResponse::Absent(status)) => {
                    tracing::debug!("No robots.txt for {} (HTTP {})", domain, status);
                    return RobotsPolicy::permissive(false);
                }
                Err(e) => e,
            };

            if !self.retry.should_retry(attempts) {
                tracing::warn!(
                    "Failed to fetch robots.txt for {} after {} attempts ({}); allowing crawl",
                    domain,
                    attempts,
                    error
                );
                return RobotsPolicy::permissive(true);
            }

            let delay = self.retry.backoff(attempts);
            tracing::debug!(
                "robots.txt fetch for {} failed ({}), retrying in {:?}",
                domain,
                error,
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Issues one robots.txt request
    ///
    /// Returns `Err` for transient failures (network errors and 5xx).
    async fn fetch_once(&self, robots_url: &Url) -> Result<RobotsResponse, String> {
        let response = self
            .client
            .get(robots_url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if status.is_server_error() {
            return Err(format!("HTTP {}", status.as_u16()));
        }
        if !status.is_success() {
            return Ok(RobotsResponse::Absent(status.as_u16()));
        }

        response
            .text()
            .await
            .map(RobotsResponse::Found)
            .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cache() -> RobotsPolicyCache {
        RobotsPolicyCache::new(
            Client::new(),
            "TestBot",
            Duration::from_secs(2),
            RetryPolicy::immediate(3),
        )
    }

    #[tokio::test]
    async fn test_fetches_and_caches_policy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /admin"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let cache = cache();
        let url = Url::parse(&format!("{}/page", server.uri())).unwrap();

        let first = cache.policy_for("127.0.0.1", &url).await;
        let second = cache.policy_for("127.0.0.1", &url).await;

        assert!(!first.is_path_allowed("/admin"));
        assert_eq!(first, second);
        assert_eq!(cache.cached("127.0.0.1"), Some(first));
    }

    #[tokio::test]
    async fn test_missing_robots_is_permissive() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        let policy = cache().policy_for("127.0.0.1", &url).await;

        assert!(policy.allowed);
        assert!(!policy.fetch_failed);
    }

    #[tokio::test]
    async fn test_server_error_retried_then_fails_open() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        let policy = cache().policy_for("127.0.0.1", &url).await;

        assert!(policy.allowed);
        assert!(policy.fetch_failed);
        assert!(policy.disallowed_paths.is_empty());
    }

    #[tokio::test]
    async fn test_stale_entry_refetched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /new"))
            .expect(1)
            .mount(&server)
            .await;

        let cache = cache();
        let mut old = RobotsPolicy::permissive(false);
        old.fetched_at = chrono::Utc::now() - chrono::Duration::hours(25);
        cache.insert("127.0.0.1", old).await;

        let url = Url::parse(&server.uri()).unwrap();
        let policy = cache.policy_for("127.0.0.1", &url).await;
        assert!(!policy.is_path_allowed("/new/thing"));
    }
}
