//! Admission control for outgoing requests

use crate::compliance::{AdmitDecision, DenyReason, RateLimiter};
use crate::config::Config;
use crate::fetch::{build_http_client, RetryPolicy};
use crate::robots::RobotsPolicyCache;
use crate::url::{matches_any, DomainForms};
use dashmap::DashMap;
use std::sync::Arc;
use url::Url;

/// Single point of admission for every URL the crate fetches
///
/// Checks run in a fixed order: URL shape, allow-list, block-list, robots.txt,
/// and finally the per-domain rate limit. Only the last step can suspend the
/// caller (besides a robots.txt fetch on a cold cache).
pub struct ComplianceGate {
    allowed_domains: Vec<String>,
    blocked: DashMap<String, String>,
    robots: Arc<RobotsPolicyCache>,
    rate_limiter: Arc<RateLimiter>,
}

impl ComplianceGate {
    /// Creates a gate
    ///
    /// # Arguments
    ///
    /// * `allowed_domains` - Exact or `*.`-wildcard domain patterns
    /// * `robots` - Shared robots.txt cache
    /// * `rate_limiter` - Shared per-domain limiter
    pub fn new(
        allowed_domains: Vec<String>,
        robots: Arc<RobotsPolicyCache>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        let allowed_domains = allowed_domains
            .into_iter()
            .map(|d| d.trim().to_lowercase())
            .collect();
        Self {
            allowed_domains,
            blocked: DashMap::new(),
            robots,
            rate_limiter,
        }
    }

    /// Builds the gate and its robots cache and rate limiter from configuration
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let robots_client =
            build_http_client(&config.user_agent, config.compliance.robots_timeout())?;
        let robots = RobotsPolicyCache::new(
            robots_client,
            &config.user_agent.crawler_name,
            config.compliance.robots_timeout(),
            RetryPolicy::from_config(&config.fetch),
        );
        let rate_limiter = RateLimiter::from_config(&config.compliance);

        Ok(Self::new(
            config.compliance.allowed_domains.clone(),
            Arc::new(robots),
            Arc::new(rate_limiter),
        ))
    }

    /// Decides whether `url` may be fetched, waiting out its domain's rate limit
    pub async fn admit(&self, url: &str) -> AdmitDecision {
        let (parsed, forms) = match DomainForms::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => return self.denied(url, AdmitDecision::deny(DenyReason::InvalidUrl, e)),
        };

        if !matches_any(&self.allowed_domains, &forms.as_slice()) {
            return self.denied(url, AdmitDecision::deny(DenyReason::NotAllowListed, &forms.host));
        }

        if let Some(reason) = self.block_reason(&forms) {
            return self.denied(url, AdmitDecision::deny(DenyReason::Blocked, reason));
        }

        let policy = self.robots.policy_for(&forms.host, &parsed).await;
        self.rate_limiter
            .set_crawl_delay(&forms.host, policy.crawl_delay())
            .await;

        let path = request_path(&parsed);
        if !policy.is_path_allowed(&path) {
            return self.denied(url, AdmitDecision::deny(DenyReason::RobotsDisallowed, path));
        }

        let waited = self.rate_limiter.acquire(&forms.host).await;
        tracing::debug!("Admitted {} after waiting {:?}", url, waited);
        AdmitDecision::allow(waited)
    }

    /// Blocks `domain` for the rest of the process lifetime
    ///
    /// The block-list is append-only; blocking an already blocked domain
    /// keeps the original reason.
    pub fn block(&self, domain: &str, reason: &str) {
        let domain = domain.trim().to_lowercase();
        self.blocked.entry(domain.clone()).or_insert_with(|| {
            tracing::info!("Blocked domain {}: {}", domain, reason);
            reason.to_string()
        });
    }

    /// Blocked domains and their reasons, sorted by domain
    pub fn blocked_domains(&self) -> Vec<(String, String)> {
        let mut blocked: Vec<_> = self
            .blocked
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        blocked.sort();
        blocked
    }

    pub fn allowed_domains(&self) -> &[String] {
        &self.allowed_domains
    }

    pub fn robots(&self) -> &Arc<RobotsPolicyCache> {
        &self.robots
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    fn block_reason(&self, forms: &DomainForms) -> Option<String> {
        forms
            .as_slice()
            .iter()
            .find_map(|form| self.blocked.get(*form).map(|r| r.value().clone()))
    }

    fn denied(&self, url: &str, decision: AdmitDecision) -> AdmitDecision {
        tracing::info!("Denied {}: {}", url, decision.reason);
        decision
    }
}

/// Path plus query, the part of a URL robots.txt prefixes apply to
fn request_path(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}
