//! Per-domain rate limiting
//!
//! Every domain gets its own `RateLimitState` behind its own async lock, so a
//! slow domain never holds up requests to another one. Within a domain the
//! lock serializes request timing; waiters are not guaranteed FIFO order.

use crate::config::ComplianceConfig;
use crate::state::RateLimitState;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum interval and a windowed request cap per domain
pub struct RateLimiter {
    rate_per_second: f64,
    max_per_window: u32,
    window: Duration,
    states: DashMap<String, Arc<Mutex<RateLimitState>>>,
}

impl RateLimiter {
    /// Creates a limiter
    ///
    /// # Arguments
    ///
    /// * `rate_per_second` - Sustained request rate per domain
    /// * `max_per_window` - Request cap per window per domain
    /// * `window` - Window length
    pub fn new(rate_per_second: f64, max_per_window: u32, window: Duration) -> Self {
        Self {
            rate_per_second,
            max_per_window: max_per_window.max(1),
            window,
            states: DashMap::new(),
        }
    }

    pub fn from_config(config: &ComplianceConfig) -> Self {
        Self::new(
            config.rate_limit_per_second,
            config.max_requests_per_window,
            config.window_duration(),
        )
    }

    /// Waits until a request to `domain` may be sent, then records it
    ///
    /// Returns the total time spent waiting.
    pub async fn acquire(&self, domain: &str) -> Duration {
        let slot = self.slot(domain);
        let mut state = slot.lock().await;
        let started = Instant::now();

        if let Some(wait) = state.time_until_next_request(Instant::now()) {
            tracing::trace!("Spacing requests to {}: waiting {:?}", domain, wait);
            tokio::time::sleep(wait).await;
        }

        let now = Instant::now();
        if state.window_expired(self.window, now) {
            state.reset_window(now);
        }

        if state.is_window_full() {
            let resets_at = state.window_resets_at(self.window);
            tracing::debug!(
                "Window cap of {} reached for {}, waiting {:?}",
                state.max_per_window,
                domain,
                resets_at.saturating_duration_since(now)
            );
            tokio::time::sleep_until(resets_at).await;
            state.reset_window(Instant::now());
        }

        state.record_request(Instant::now());
        started.elapsed()
    }

    /// Sets the robots.txt crawl-delay for `domain`
    pub async fn set_crawl_delay(&self, domain: &str, delay: Duration) {
        let slot = self.slot(domain);
        let mut state = slot.lock().await;
        if state.crawl_delay != delay {
            tracing::debug!("Crawl delay for {} set to {:?}", domain, delay);
            state.crawl_delay = delay;
        }
    }

    /// Copy of the current state for `domain`, if it has been seen
    pub async fn snapshot(&self, domain: &str) -> Option<RateLimitState> {
        let slot = self.states.get(domain)?.value().clone();
        let state = slot.lock().await;
        Some(state.clone())
    }

    /// Number of domains tracked
    pub fn domain_count(&self) -> usize {
        self.states.len()
    }

    fn slot(&self, domain: &str) -> Arc<Mutex<RateLimitState>> {
        self.states
            .entry(domain.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(RateLimitState::new(
                    self.rate_per_second,
                    self.max_per_window,
                    Instant::now(),
                )))
            })
            .value()
            .clone()
    }
}
