//! Fetch module: strategies, orchestration and outcomes
//!
//! This module contains:
//! - `FetchOutcome`, the immutable result of fetching one URL
//! - The `FetchStrategy` trait with a lightweight HTTP strategy and a
//!   browser rendering strategy
//! - `FetchOrchestrator`, which admits URLs through the compliance gate and
//!   walks the strategy list until one succeeds
//! - `RetryPolicy`, the bounded backoff shared by every network call
//!
//! Network, timeout and policy failures are all reported as data on the
//! outcome; nothing in the fetch path returns `Err` for a single URL.

mod light;
mod orchestrator;
mod render;
mod retry;

pub use light::{build_http_client, LightFetchStrategy};
pub use orchestrator::{FetchOrchestrator, FetchStats};
#[cfg(feature = "browser")]
pub use render::ChromiumRenderer;
pub use render::{PageRenderer, RenderFetchStrategy, RenderedPage};
pub use retry::RetryPolicy;

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Which strategy produced an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Plain HTTP GET
    Light,
    /// Headless browser render
    Render,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Light => write!(f, "light"),
            Self::Render => write!(f, "render"),
        }
    }
}

/// Why a fetch did not succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Not allow-listed, blocked, robots-disallowed or not a crawlable URL
    PolicyDenied,
    /// Timeout, connection failure or 5xx after all retries
    TransientNetwork,
    /// 4xx response; not retried
    PermanentFetch,
    /// Browser or render context failure
    Render,
    /// The task fetching this URL panicked or was cancelled
    Panicked,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PolicyDenied => "policy denied",
            Self::TransientNetwork => "transient network error",
            Self::PermanentFetch => "permanent fetch error",
            Self::Render => "render error",
            Self::Panicked => "task panicked",
        };
        f.write_str(name)
    }
}

/// Result of fetching one URL
///
/// Every URL handed to the orchestrator yields exactly one of these.
#[derive(Debug, Clone, Serialize)]
pub struct FetchOutcome {
    /// The URL as requested
    pub url: String,

    /// Whether content was retrieved
    pub success: bool,

    /// Response body or rendered HTML
    pub content: Option<String>,

    /// HTTP status code of the final response, when one was received
    pub status_code: Option<u16>,

    /// Response headers (lowercase names)
    pub headers: HashMap<String, String>,

    /// Failure detail
    pub error: Option<String>,

    /// Failure category
    pub failure: Option<FailureKind>,

    /// Strategy that produced this outcome; None when no strategy ran
    pub strategy_used: Option<StrategyKind>,

    /// Wall time spent, including retries and backoff
    pub elapsed: Duration,

    /// Attempts beyond the first
    pub retry_count: u32,
}

impl FetchOutcome {
    /// A successful fetch
    pub fn succeeded(
        url: &str,
        strategy: StrategyKind,
        content: String,
        status_code: Option<u16>,
        headers: HashMap<String, String>,
    ) -> Self {
        Self {
            url: url.to_string(),
            success: true,
            content: Some(content),
            status_code,
            headers,
            error: None,
            failure: None,
            strategy_used: Some(strategy),
            elapsed: Duration::ZERO,
            retry_count: 0,
        }
    }

    /// A failed fetch
    pub fn failed(
        url: &str,
        strategy: Option<StrategyKind>,
        failure: FailureKind,
        error: impl Into<String>,
    ) -> Self {
        Self {
            url: url.to_string(),
            success: false,
            content: None,
            status_code: None,
            headers: HashMap::new(),
            error: Some(error.into()),
            failure: Some(failure),
            strategy_used: strategy,
            elapsed: Duration::ZERO,
            retry_count: 0,
        }
    }

    /// An outcome for a URL the compliance gate refused
    pub fn denied(url: &str, reason: impl Into<String>) -> Self {
        Self::failed(url, None, FailureKind::PolicyDenied, reason)
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    pub fn with_retries(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Whether the gate refused this URL
    pub fn is_policy_denied(&self) -> bool {
        self.failure == Some(FailureKind::PolicyDenied)
    }
}

/// A way of retrieving page content
///
/// Strategies never return `Err`: every failure is folded into the outcome.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    /// Tag recorded on outcomes and statistics
    fn kind(&self) -> StrategyKind;

    /// Fetches `url`, retrying within the strategy's own budget
    async fn fetch(&self, url: &str) -> FetchOutcome;
}
