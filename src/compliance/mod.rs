//! Compliance module: decides whether a URL may be fetched right now
//!
//! `ComplianceGate` combines the allow-list, the operator block-list,
//! robots.txt policy and per-domain rate limits into a single admission
//! decision.

mod gate;
mod rate_limiter;

pub use gate::ComplianceGate;
pub use rate_limiter::RateLimiter;

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Why the gate refused a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// Not an absolute http(s) URL with a host
    InvalidUrl,
    /// Neither host nor apex matches the allow-list
    NotAllowListed,
    /// Host or apex was blocked by an operator
    Blocked,
    /// robots.txt disallows the path
    RobotsDisallowed,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidUrl => "invalid URL",
            Self::NotAllowListed => "domain not allow-listed",
            Self::Blocked => "domain blocked",
            Self::RobotsDisallowed => "disallowed by robots.txt",
        };
        f.write_str(name)
    }
}

/// Result of asking the gate about one URL
#[derive(Debug, Clone, PartialEq)]
pub struct AdmitDecision {
    /// Whether the request may be sent
    pub allowed: bool,

    /// Human-readable explanation
    pub reason: String,

    /// Set when the URL was refused
    pub denial: Option<DenyReason>,

    /// Time spent waiting for the domain's rate limit
    pub waited: Duration,
}

impl AdmitDecision {
    pub fn allow(waited: Duration) -> Self {
        Self {
            allowed: true,
            reason: "allowed".to_string(),
            denial: None,
            waited,
        }
    }

    pub fn deny(denial: DenyReason, detail: impl fmt::Display) -> Self {
        Self {
            allowed: false,
            reason: format!("{}: {}", denial, detail),
            denial: Some(denial),
            waited: Duration::ZERO,
        }
    }
}
