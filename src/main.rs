//! Sumi-Harvest main entry point
//!
//! This is the command-line interface for the Sumi-Harvest fetch pipeline.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use sumi_harvest::config::{load_config_with_hash, Config};
use sumi_harvest::url::{matches_any, DomainForms};
use sumi_harvest::{FetchOrchestrator, FetchOutcome, FetchStats};
use tracing_subscriber::EnvFilter;

/// Sumi-Harvest: a polite, resilient content fetcher
///
/// Sumi-Harvest fetches URLs while respecting robots.txt, crawl delays,
/// domain allow-lists and per-domain rate limits, falling back to a headless
/// browser for pages that need JavaScript.
#[derive(Parser, Debug)]
#[command(name = "sumi-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A polite, resilient content fetcher", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// URLs to fetch
    #[arg(value_name = "URL")]
    urls: Vec<String>,

    /// Read additional URLs from a file, one per line ('#' starts a comment)
    #[arg(long, value_name = "FILE")]
    urls_file: Option<PathBuf>,

    /// Validate config and show the admission policy without fetching
    #[arg(long)]
    dry_run: bool,

    /// Format for the final statistics
    #[arg(long, value_enum, default_value_t = StatsFormat::Text)]
    stats_format: StatsFormat,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StatsFormat {
    Text,
    Toml,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = match load_config_with_hash(&cli.config) {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    let mut urls = cli.urls.clone();
    if let Some(path) = &cli.urls_file {
        urls.extend(read_urls_file(path)?);
    }

    if cli.dry_run {
        handle_dry_run(&config, &urls);
        return Ok(());
    }

    if urls.is_empty() {
        anyhow::bail!("No URLs given; pass them as arguments or with --urls-file");
    }

    handle_fetch(&config, &urls, cli.stats_format).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_harvest=info,warn"),
            1 => EnvFilter::new("sumi_harvest=debug,info"),
            2 => EnvFilter::new("sumi_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Reads URLs from a file, skipping blank lines and comments
fn read_urls_file(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read URL file {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Handles --dry-run: prints the effective configuration and allow-list verdicts
fn handle_dry_run(config: &Config, urls: &[String]) {
    println!("=== Sumi-Harvest Dry Run ===\n");

    println!("User Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nCompliance:");
    println!(
        "  Rate limit: {} req/s per domain",
        config.compliance.rate_limit_per_second
    );
    println!(
        "  Window cap: {} requests per {}s",
        config.compliance.max_requests_per_window, config.compliance.window_duration_seconds
    );
    println!("  Robots timeout: {}s", config.compliance.robots_timeout_seconds);
    println!(
        "  Allowed domains ({}):",
        config.compliance.allowed_domains.len()
    );
    for domain in &config.compliance.allowed_domains {
        println!("    - {}", domain);
    }

    println!("\nFetch:");
    println!("  HTTP timeout: {}s", config.fetch.http_timeout_seconds);
    println!(
        "  Retries: {} attempts, backoff {}-{}ms",
        config.fetch.max_retries, config.fetch.backoff_min_ms, config.fetch.backoff_max_ms
    );
    println!("  Max concurrency: {}", config.fetch.max_concurrency);
    let render = if !config.fetch.enable_render {
        "disabled".to_string()
    } else if cfg!(feature = "browser") {
        format!("chromium, {}s timeout", config.fetch.render_timeout_seconds)
    } else {
        "unavailable (built without the browser feature)".to_string()
    };
    println!("  Render fallback: {}", render);

    println!("\nDeduplication:");
    match &config.dedup.database_path {
        Some(path) => println!("  SQLite store: {} (ttl {} days)", path, config.dedup.ttl_days),
        None => println!("  In-memory store"),
    }

    if !urls.is_empty() {
        println!("\nURLs ({}):", urls.len());
        for url in urls {
            let verdict = match DomainForms::parse(url) {
                Ok((_, forms)) if matches_any(&config.compliance.allowed_domains, &forms.as_slice()) => {
                    "allow-listed (robots.txt checked at fetch time)".to_string()
                }
                Ok((_, forms)) => format!("denied: {} not allow-listed", forms.host),
                Err(e) => format!("denied: {}", e),
            };
            println!("  - {} -> {}", url, verdict);
        }
    }

    println!("\n✓ Configuration is valid");
}

/// Fetches the batch and prints one line per URL, then the statistics
async fn handle_fetch(config: &Config, urls: &[String], format: StatsFormat) -> anyhow::Result<()> {
    let orchestrator =
        FetchOrchestrator::from_config(config).context("Failed to build fetch pipeline")?;
    tracing::info!(
        "Fetching {} URLs with strategies {:?}",
        urls.len(),
        orchestrator.strategy_kinds()
    );

    let outcomes = orchestrator.fetch_batch(urls).await;
    for outcome in &outcomes {
        println!("{}", describe(outcome));
    }

    let blocked = orchestrator.gate().blocked_domains();
    print_stats(&orchestrator.stats(), blocked.len(), format)?;
    Ok(())
}

fn describe(outcome: &FetchOutcome) -> String {
    if outcome.success {
        format!(
            "OK    {} [{}] status={} bytes={} retries={} in {:.2?}",
            outcome.url,
            outcome
                .strategy_used
                .map(|s| s.to_string())
                .unwrap_or_default(),
            outcome
                .status_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string()),
            outcome.content.as_ref().map(String::len).unwrap_or(0),
            outcome.retry_count,
            outcome.elapsed
        )
    } else {
        let tag = if outcome.is_policy_denied() { "DENY " } else { "FAIL " };
        format!(
            "{} {}: {}",
            tag,
            outcome.url,
            outcome.error.as_deref().unwrap_or("unknown error")
        )
    }
}

#[derive(Serialize)]
struct StatsReport<'a> {
    blocked_domains: usize,
    fetch: &'a FetchStats,
}

fn print_stats(stats: &FetchStats, blocked_domains: usize, format: StatsFormat) -> anyhow::Result<()> {
    match format {
        StatsFormat::Text => {
            println!("\n{}", stats);
            println!("  blocked domains: {}", blocked_domains);
        }
        StatsFormat::Toml => {
            let report = StatsReport {
                blocked_domains,
                fetch: stats,
            };
            println!("{}", toml::to_string(&report).context("Failed to serialize statistics")?);
        }
    }
    Ok(())
}
