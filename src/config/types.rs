use serde::Deserialize;
use std::time::Duration;

/// Longest accepted `max-age-days` (about a century)
pub const MAX_AGE_DAYS_LIMIT: i64 = 36_500;

/// Longest accepted `ttl-days` (about ten years)
pub const TTL_DAYS_LIMIT: u64 = 3_650;

/// Main configuration structure for Sumi-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub compliance: ComplianceConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler, also the token matched against robots.txt groups
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the full User-Agent header value
    ///
    /// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Per-domain admission policy
#[derive(Debug, Clone, Deserialize)]
pub struct ComplianceConfig {
    /// Domain patterns that may be fetched (e.g., "example.com" or "*.example.com")
    #[serde(rename = "allowed-domains")]
    pub allowed_domains: Vec<String>,

    /// Maximum sustained requests per second to a single domain
    #[serde(rename = "rate-limit-per-second", default = "default_rate_limit")]
    pub rate_limit_per_second: f64,

    /// Hard cap on requests to a single domain within one window
    #[serde(rename = "max-requests-per-window", default = "default_max_per_window")]
    pub max_requests_per_window: u32,

    /// Length of the request-count window (seconds)
    #[serde(rename = "window-duration-seconds", default = "default_window_seconds")]
    pub window_duration_seconds: u64,

    /// Timeout for a single robots.txt request (seconds)
    #[serde(rename = "robots-timeout-seconds", default = "default_robots_timeout")]
    pub robots_timeout_seconds: f64,
}

impl ComplianceConfig {
    pub fn window_duration(&self) -> Duration {
        Duration::from_secs(self.window_duration_seconds)
    }

    pub fn robots_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.robots_timeout_seconds)
    }
}

/// Fetch strategy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Timeout for a single lightweight HTTP request (seconds)
    #[serde(rename = "http-timeout-seconds", default = "default_http_timeout")]
    pub http_timeout_seconds: f64,

    /// Timeout for a single browser render (seconds)
    #[serde(rename = "render-timeout-seconds", default = "default_render_timeout")]
    pub render_timeout_seconds: f64,

    /// Maximum attempts for the lightweight strategy and robots.txt fetches
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Maximum number of in-flight fetches across all domains
    #[serde(rename = "max-concurrency", default = "default_max_concurrency")]
    pub max_concurrency: u32,

    /// Lower bound of the retry backoff (milliseconds)
    #[serde(rename = "backoff-min-ms", default = "default_backoff_min_ms")]
    pub backoff_min_ms: u64,

    /// Upper bound of the retry backoff (milliseconds)
    #[serde(rename = "backoff-max-ms", default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Whether the browser rendering fallback is used
    #[serde(rename = "enable-render", default = "default_true")]
    pub enable_render: bool,
}

impl FetchConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.http_timeout_seconds)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.render_timeout_seconds)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            http_timeout_seconds: default_http_timeout(),
            render_timeout_seconds: default_render_timeout(),
            max_retries: default_max_retries(),
            max_concurrency: default_max_concurrency(),
            backoff_min_ms: default_backoff_min_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            enable_render: true,
        }
    }
}

/// Record validation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationConfig {
    /// Keywords of which at least one should appear in a relevant record
    #[serde(rename = "relevance-keywords", default)]
    pub relevance_keywords: Vec<String>,

    /// Records published longer ago than this get a warning
    #[serde(rename = "max-age-days", default = "default_max_age_days")]
    pub max_age_days: i64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            relevance_keywords: Vec::new(),
            max_age_days: default_max_age_days(),
        }
    }
}

/// Duplicate index configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DedupConfig {
    /// Path to the shared SQLite fingerprint store; in-memory when absent
    #[serde(rename = "database-path", default)]
    pub database_path: Option<String>,

    /// Fingerprint expiry in the shared store (days)
    #[serde(rename = "ttl-days", default = "default_ttl_days")]
    pub ttl_days: u64,
}

impl DedupConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_days.saturating_mul(24 * 60 * 60))
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            ttl_days: default_ttl_days(),
        }
    }
}

fn default_rate_limit() -> f64 {
    1.0
}

fn default_max_per_window() -> u32 {
    30
}

fn default_window_seconds() -> u64 {
    60
}

fn default_robots_timeout() -> f64 {
    10.0
}

fn default_http_timeout() -> f64 {
    30.0
}

fn default_render_timeout() -> f64 {
    60.0
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_concurrency() -> u32 {
    10
}

fn default_backoff_min_ms() -> u64 {
    2_000
}

fn default_backoff_max_ms() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

fn default_max_age_days() -> i64 {
    730
}

fn default_ttl_days() -> u64 {
    7
}
