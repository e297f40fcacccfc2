use crate::config::types::{
    ComplianceConfig, Config, DedupConfig, FetchConfig, UserAgentConfig, ValidationConfig,
    MAX_AGE_DAYS_LIMIT, TTL_DAYS_LIMIT,
};
use crate::ConfigError;
use url::Url;

/// Longest accepted network timeout, in seconds
const MAX_TIMEOUT_SECONDS: f64 = 3_600.0;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_user_agent_config(&config.user_agent)?;
    validate_compliance_config(&config.compliance)?;
    validate_fetch_config(&config.fetch)?;
    validate_validation_config(&config.validation)?;
    validate_dedup_config(&config.dedup)?;
    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Crawler name doubles as the robots.txt product token
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates admission policy limits and the allow-list
fn validate_compliance_config(config: &ComplianceConfig) -> Result<(), ConfigError> {
    if config.allowed_domains.is_empty() {
        return Err(ConfigError::Validation(
            "allowed_domains must contain at least one domain".to_string(),
        ));
    }

    for pattern in &config.allowed_domains {
        validate_domain_pattern(pattern)?;
    }

    if !(config.rate_limit_per_second > 0.0) || !config.rate_limit_per_second.is_finite() {
        return Err(ConfigError::Validation(format!(
            "rate_limit_per_second must be a positive number, got {}",
            config.rate_limit_per_second
        )));
    }

    if config.max_requests_per_window < 1 {
        return Err(ConfigError::Validation(format!(
            "max_requests_per_window must be >= 1, got {}",
            config.max_requests_per_window
        )));
    }

    if config.window_duration_seconds < 1 {
        return Err(ConfigError::Validation(
            "window_duration_seconds must be >= 1".to_string(),
        ));
    }

    validate_timeout("robots_timeout_seconds", config.robots_timeout_seconds)?;

    Ok(())
}

/// Validates fetch strategy limits
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    validate_timeout("http_timeout_seconds", config.http_timeout_seconds)?;
    validate_timeout("render_timeout_seconds", config.render_timeout_seconds)?;

    if config.max_retries < 1 || config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be between 1 and 10, got {}",
            config.max_retries
        )));
    }

    if config.max_concurrency < 1 || config.max_concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrency must be between 1 and 100, got {}",
            config.max_concurrency
        )));
    }

    if config.backoff_min_ms > config.backoff_max_ms {
        return Err(ConfigError::Validation(format!(
            "backoff_min_ms ({}) cannot exceed backoff_max_ms ({})",
            config.backoff_min_ms, config.backoff_max_ms
        )));
    }

    Ok(())
}

fn validate_validation_config(config: &ValidationConfig) -> Result<(), ConfigError> {
    if config.max_age_days < 1 || config.max_age_days > MAX_AGE_DAYS_LIMIT {
        return Err(ConfigError::Validation(format!(
            "max_age_days must be between 1 and {}, got {}",
            MAX_AGE_DAYS_LIMIT, config.max_age_days
        )));
    }

    if config.relevance_keywords.iter().any(|k| k.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "relevance_keywords cannot contain empty entries".to_string(),
        ));
    }

    Ok(())
}

fn validate_dedup_config(config: &DedupConfig) -> Result<(), ConfigError> {
    if let Some(path) = &config.database_path {
        if path.is_empty() {
            return Err(ConfigError::Validation(
                "database_path cannot be empty when set".to_string(),
            ));
        }
    }

    if config.ttl_days < 1 || config.ttl_days > TTL_DAYS_LIMIT {
        return Err(ConfigError::Validation(format!(
            "ttl_days must be between 1 and {}, got {}",
            TTL_DAYS_LIMIT, config.ttl_days
        )));
    }

    Ok(())
}

fn validate_timeout(name: &str, seconds: f64) -> Result<(), ConfigError> {
    if !(seconds > 0.0) || seconds > MAX_TIMEOUT_SECONDS {
        return Err(ConfigError::Validation(format!(
            "{} must be a positive number up to {}, got {}",
            name, MAX_TIMEOUT_SECONDS, seconds
        )));
    }
    Ok(())
}

/// Validates a domain pattern (supports wildcards)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    if let Some(domain) = pattern.strip_prefix("*.") {
        validate_domain_string(domain)?;
    } else {
        validate_domain_string(pattern)?;
    }

    Ok(())
}

/// Validates a domain string (without wildcard prefix)
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    // Must contain at least one dot (e.g., example.com, not just "example")
    if !domain.contains('.') {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' must contain at least one dot (e.g., 'example.com')",
            domain
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
