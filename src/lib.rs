//! Sumi-Harvest: a polite, resilient content-fetch pipeline
//!
//! This crate admits URLs through a compliance gate (allow-list, block-list,
//! robots.txt, per-domain rate limits), fetches them with a cheap HTTP strategy
//! before falling back to browser rendering, and filters the extracted records
//! through duplicate detection and schema/quality validation.

pub mod compliance;
pub mod config;
pub mod dedup;
pub mod fetch;
pub mod pipeline;
pub mod robots;
pub mod state;
pub mod url;
pub mod validation;

use thiserror::Error;

/// Main error type for Sumi-Harvest operations
///
/// Per-URL and per-record failures are reported as data (`FetchOutcome`,
/// `ValidationOutcome`) and configuration problems as `ConfigError`; this
/// type covers building the runtime components, which can only fail while
/// setting up their HTTP clients.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Sumi-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use compliance::{AdmitDecision, ComplianceGate, DenyReason, RateLimiter};
pub use config::Config;
pub use dedup::DuplicateIndex;
pub use fetch::{FailureKind, FetchOrchestrator, FetchOutcome, FetchStats, StrategyKind};
pub use pipeline::{Extractor, Pipeline, PipelineOutcome};
pub use robots::{RobotsPolicy, RobotsPolicyCache};
pub use validation::{CandidateRecord, ValidationCoordinator, ValidationOutcome, ValidationStats};
