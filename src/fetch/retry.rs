//! Bounded exponential backoff shared by robots.txt and page fetches

use crate::config::FetchConfig;
use rand::Rng;
use std::time::Duration;

/// Retry budget and backoff curve for one kind of request
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,

    /// Floor of the backoff delay
    pub min_backoff: Duration,

    /// Ceiling of the backoff delay
    pub max_backoff: Duration,

    /// Seconds multiplied by `2^attempt` to get the raw delay
    pub multiplier: f64,

    /// Fraction of the delay added as random jitter
    pub jitter: f64,
}

impl RetryPolicy {
    /// Lightweight fetch and robots.txt policy from configuration
    ///
    /// Defaults to 3 attempts with delays growing from 2s to 10s.
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            min_backoff: Duration::from_millis(config.backoff_min_ms),
            max_backoff: Duration::from_millis(config.backoff_max_ms),
            multiplier: 1.0,
            jitter: 0.1,
        }
    }

    /// Rendering policy: one retry, since each render is expensive
    pub fn render(config: &FetchConfig) -> Self {
        Self {
            max_attempts: 2,
            ..Self::from_config(config)
        }
    }

    /// A policy that retries immediately, for tests
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            min_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            multiplier: 0.0,
            jitter: 0.0,
        }
    }

    /// Delay before the next attempt, after `failed_attempts` failures
    pub fn backoff(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.min(16) as i32;
        let raw = Duration::from_secs_f64((self.multiplier * 2f64.powi(exponent)).max(0.0));
        let base = raw.clamp(self.min_backoff, self.max_backoff);

        if self.jitter <= 0.0 || base.is_zero() {
            return base;
        }

        let jitter = rand::thread_rng().gen_range(0.0..=self.jitter);
        base.mul_f64(1.0 + jitter).min(self.max_backoff)
    }

    /// Whether another attempt is allowed after `attempts` have been made
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}
