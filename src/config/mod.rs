//! Configuration module for Sumi-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use sumi_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Allowed domains: {:?}", config.compliance.allowed_domains);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ComplianceConfig, Config, DedupConfig, FetchConfig, UserAgentConfig, ValidationConfig,
    MAX_AGE_DAYS_LIMIT, TTL_DAYS_LIMIT,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
