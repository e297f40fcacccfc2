//! URL handling module for Sumi-Harvest
//!
//! This module provides URL canonicalization, domain extraction and
//! allow-list pattern matching.

mod domain;
mod matcher;
mod normalize;

use crate::{UrlError, UrlResult};
use url::Url;

pub use domain::{apex_domain, extract_domain};
pub use matcher::{matches_any, matches_wildcard};
pub use normalize::normalize_url;

/// The domain forms a URL is checked under
///
/// Rate limits and robots policy are keyed by `host`; allow-list and
/// block-list membership is checked against both `host` and `apex`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainForms {
    /// Full lowercase host (e.g., "news.example.com")
    pub host: String,

    /// Registrable apex (e.g., "example.com")
    pub apex: String,
}

impl DomainForms {
    /// Builds the domain forms for a parsed URL
    pub fn from_url(url: &Url) -> UrlResult<Self> {
        let host = extract_domain(url).ok_or(UrlError::MissingDomain)?;
        let apex = apex_domain(&host);
        Ok(Self { host, apex })
    }

    /// Parses a URL string and builds its domain forms
    pub fn parse(url: &str) -> UrlResult<(Url, Self)> {
        let parsed = Url::parse(url).map_err(|e| UrlError::Parse(e.to_string()))?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => return Err(UrlError::InvalidScheme(other.to_string())),
        }
        let forms = Self::from_url(&parsed)?;
        Ok((parsed, forms))
    }

    /// Both forms, host first
    pub fn as_slice(&self) -> [&str; 2] {
        [self.host.as_str(), self.apex.as_str()]
    }
}
