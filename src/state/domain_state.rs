use crate::robots::MAX_CRAWL_DELAY_SECONDS;
use std::time::Duration;
use tokio::time::Instant;

/// Tracks the request budget of a single domain
///
/// Two limits apply at once: a minimum interval between consecutive requests
/// (from the configured rate and any robots.txt crawl-delay), and a cap on the
/// number of requests inside the current window.
///
/// Only `RateLimiter` mutates this, and only while holding the domain's lock.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    /// Configured sustained rate for this domain
    pub rate_per_second: f64,

    /// Maximum number of requests inside one window
    pub max_per_window: u32,

    /// When the current window opened
    pub window_start: Instant,

    /// Requests recorded since `window_start`
    pub requests_in_window: u32,

    /// Timestamp of the last request to this domain
    pub last_request_at: Option<Instant>,

    /// Crawl-delay published in the domain's robots.txt
    pub crawl_delay: Duration,

    /// Requests recorded over the lifetime of this entry
    pub total_requests: u64,
}

impl RateLimitState {
    /// Creates a fresh state whose window opens at `now`
    pub fn new(rate_per_second: f64, max_per_window: u32, now: Instant) -> Self {
        Self {
            rate_per_second,
            max_per_window,
            window_start: now,
            requests_in_window: 0,
            last_request_at: None,
            crawl_delay: Duration::ZERO,
            total_requests: 0,
        }
    }

    /// Minimum spacing between two requests to this domain
    ///
    /// The larger of `1 / rate_per_second` and the robots.txt crawl-delay,
    /// never more than one day.
    pub fn min_interval(&self) -> Duration {
        let from_rate = if self.rate_per_second > 0.0 {
            Duration::from_secs_f64((1.0 / self.rate_per_second).min(MAX_CRAWL_DELAY_SECONDS))
        } else {
            Duration::ZERO
        };
        from_rate.max(self.crawl_delay)
    }

    /// Time left before the minimum interval since the last request has passed
    ///
    /// Returns None if a request may go out now.
    pub fn time_until_next_request(&self, now: Instant) -> Option<Duration> {
        let last = self.last_request_at?;
        let min_interval = self.min_interval();
        let elapsed = now.saturating_duration_since(last);
        (elapsed < min_interval).then(|| min_interval - elapsed)
    }

    /// Whether the current window has run its full length
    pub fn window_expired(&self, window: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.window_start) >= window
    }

    /// When the current window closes
    pub fn window_resets_at(&self, window: Duration) -> Instant {
        self.window_start + window
    }

    /// Whether the current window has no budget left
    pub fn is_window_full(&self) -> bool {
        self.requests_in_window >= self.max_per_window
    }

    /// Opens a new window at `now`
    pub fn reset_window(&mut self, now: Instant) {
        self.window_start = now;
        self.requests_in_window = 0;
    }

    /// Records a request sent at `now`
    pub fn record_request(&mut self, now: Instant) {
        self.last_request_at = Some(now);
        self.requests_in_window += 1;
        self.total_requests += 1;
    }

    /// Number of requests still allowed in the current window
    pub fn requests_remaining(&self) -> u32 {
        self.max_per_window.saturating_sub(self.requests_in_window)
    }
}
