//! Cached robots.txt policy
//!
//! A `RobotsPolicy` is the per-domain result of fetching and parsing
//! robots.txt, stamped with the time it was fetched so it can be refreshed.

use crate::robots::{RobotsRules, MAX_CRAWL_DELAY_SECONDS};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;

/// How long a successfully fetched policy stays fresh
const POLICY_TTL_HOURS: i64 = 24;

/// How long a fail-open policy stays fresh before the fetch is retried
const FAILED_POLICY_TTL_HOURS: i64 = 1;

/// Crawl policy for one domain
#[derive(Debug, Clone, PartialEq)]
pub struct RobotsPolicy {
    /// False when robots.txt disallows the whole site
    pub allowed: bool,

    /// Path prefixes the crawler may not request
    pub disallowed_paths: BTreeSet<String>,

    /// Minimum seconds between requests requested by the site
    pub crawl_delay_seconds: f64,

    /// When robots.txt was fetched
    pub fetched_at: DateTime<Utc>,

    /// True when robots.txt could not be fetched and this policy is the
    /// permissive default
    pub fetch_failed: bool,
}

impl RobotsPolicy {
    /// Builds a policy from parsed rules
    pub fn from_rules(rules: RobotsRules) -> Self {
        let allowed = !rules.disallowed_paths.contains("/");
        Self {
            allowed,
            disallowed_paths: rules.disallowed_paths,
            crawl_delay_seconds: rules.crawl_delay.unwrap_or(0.0),
            fetched_at: Utc::now(),
            fetch_failed: false,
        }
    }

    /// A policy that allows everything
    ///
    /// Used when the site publishes no robots.txt (`fetch_failed = false`) and
    /// when robots.txt could not be fetched (`fetch_failed = true`).
    pub fn permissive(fetch_failed: bool) -> Self {
        Self {
            allowed: true,
            disallowed_paths: BTreeSet::new(),
            crawl_delay_seconds: 0.0,
            fetched_at: Utc::now(),
            fetch_failed,
        }
    }

    /// Checks whether the policy should be re-fetched
    ///
    /// Fetched policies refresh after 24 hours; fail-open policies after one
    /// hour, so an outage does not suspend compliance for a whole day.
    pub fn is_stale(&self) -> bool {
        let ttl = if self.fetch_failed {
            Duration::hours(FAILED_POLICY_TTL_HOURS)
        } else {
            Duration::hours(POLICY_TTL_HOURS)
        };
        self.age() > ttl
    }

    /// Returns how long ago the policy was fetched
    pub fn age(&self) -> Duration {
        Utc::now() - self.fetched_at
    }

    /// Checks a request path (with query) against the disallowed prefixes
    pub fn is_path_allowed(&self, path: &str) -> bool {
        !self
            .disallowed_paths
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Returns the crawl delay as a duration
    ///
    /// Capped at `MAX_CRAWL_DELAY_SECONDS`; NaN and negative values count as
    /// no delay.
    pub fn crawl_delay(&self) -> std::time::Duration {
        let seconds = if self.crawl_delay_seconds.is_nan() {
            0.0
        } else {
            self.crawl_delay_seconds.clamp(0.0, MAX_CRAWL_DELAY_SECONDS)
        };
        std::time::Duration::from_secs_f64(seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robots::parse_robots;

    #[test]
    fn test_new_policy_not_stale() {
        assert!(!RobotsPolicy::permissive(false).is_stale());
        assert!(!RobotsPolicy::permissive(true).is_stale());
    }

    #[test]
    fn test_policy_stale_after_24_hours() {
        let mut policy = RobotsPolicy::permissive(false);
        policy.fetched_at = Utc::now() - Duration::hours(23);
        assert!(!policy.is_stale());

        policy.fetched_at = Utc::now() - Duration::hours(25);
        assert!(policy.is_stale());
    }

    #[test]
    fn test_failed_policy_stale_after_one_hour() {
        let mut policy = RobotsPolicy::permissive(true);
        policy.fetched_at = Utc::now() - Duration::minutes(90);
        assert!(policy.is_stale());
    }

    #[test]
    fn test_prefix_matching() {
        let policy = RobotsPolicy::from_rules(parse_robots(
            "User-agent: *\nDisallow: /admin\nDisallow: /search?",
            "TestBot",
        ));
        assert!(policy.allowed);
        assert!(policy.is_path_allowed("/"));
        assert!(policy.is_path_allowed("/news/admin"));
        assert!(!policy.is_path_allowed("/admin"));
        assert!(!policy.is_path_allowed("/admin/users"));
        assert!(!policy.is_path_allowed("/administrator"));
        assert!(!policy.is_path_allowed("/search?q=flood"));
        assert!(policy.is_path_allowed("/search"));
    }

    #[test]
    fn test_disallow_root_marks_site_closed() {
        let policy = RobotsPolicy::from_rules(parse_robots("User-agent: *\nDisallow: /", "TestBot"));
        assert!(!policy.allowed);
        assert!(!policy.is_path_allowed("/anything"));
    }

    #[test]
    fn test_permissive_allows_everything() {
        let policy = RobotsPolicy::permissive(true);
        assert!(policy.allowed);
        assert!(policy.fetch_failed);
        assert!(policy.is_path_allowed("/admin"));
        assert_eq!(policy.crawl_delay(), std::time::Duration::ZERO);
    }

    #[test]
    fn test_out_of_range_crawl_delay_does_not_panic() {
        let mut policy = RobotsPolicy::permissive(false);
        policy.crawl_delay_seconds = 1e20;
        assert_eq!(policy.crawl_delay(), std::time::Duration::from_secs(86_400));

        policy.crawl_delay_seconds = f64::INFINITY;
        assert_eq!(policy.crawl_delay(), std::time::Duration::from_secs(86_400));

        policy.crawl_delay_seconds = f64::NAN;
        assert_eq!(policy.crawl_delay(), std::time::Duration::ZERO);
    }

    #[test]
    fn test_crawl_delay_carried() {
        let policy =
            RobotsPolicy::from_rules(parse_robots("User-agent: *\nCrawl-delay: 1.5", "TestBot"));
        assert_eq!(policy.crawl_delay(), std::time::Duration::from_millis(1500));
    }
}
