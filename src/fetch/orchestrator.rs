//! Fetch orchestration
//!
//! This module ties the fetch path together:
//! - Admitting every URL through the `ComplianceGate`
//! - Walking the ordered strategy list until one succeeds
//! - Bounding concurrency with a semaphore shared by every batch
//! - Isolating panics so one URL never takes down a batch
//! - Keeping running counters per strategy

use crate::compliance::ComplianceGate;
use crate::config::Config;
use crate::fetch::{
    FailureKind, FetchOutcome, FetchStrategy, LightFetchStrategy, PageRenderer,
    RenderFetchStrategy, RetryPolicy, StrategyKind,
};
use futures::future::join_all;
use futures::FutureExt;
use serde::Serialize;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

/// Fetch statistics since the orchestrator was created
///
/// Strategy counters count strategy runs, so a URL that fails the light
/// strategy and then renders counts once in `light_failed` and once in
/// `render_success`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FetchStats {
    pub light_success: u64,
    pub light_failed: u64,
    pub render_success: u64,
    pub render_failed: u64,
    pub policy_denied: u64,
    pub panicked: u64,
    /// URLs processed
    pub total: u64,
}

impl FetchStats {
    /// URLs for which some strategy succeeded
    pub fn succeeded(&self) -> u64 {
        self.light_success + self.render_success
    }
}

impl fmt::Display for FetchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "URLs processed:   {}", self.total)?;
        writeln!(
            f,
            "  light:          {} ok, {} failed",
            self.light_success, self.light_failed
        )?;
        writeln!(
            f,
            "  render:         {} ok, {} failed",
            self.render_success, self.render_failed
        )?;
        writeln!(f, "  policy denied:  {}", self.policy_denied)?;
        write!(f, "  panicked:       {}", self.panicked)
    }
}

#[derive(Default)]
struct Counters {
    light_success: AtomicU64,
    light_failed: AtomicU64,
    render_success: AtomicU64,
    render_failed: AtomicU64,
    policy_denied: AtomicU64,
    panicked: AtomicU64,
    total: AtomicU64,
}

impl Counters {
    fn record_strategy(&self, kind: StrategyKind, success: bool) {
        let counter = match (kind, success) {
            (StrategyKind::Light, true) => &self.light_success,
            (StrategyKind::Light, false) => &self.light_failed,
            (StrategyKind::Render, true) => &self.render_success,
            (StrategyKind::Render, false) => &self.render_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> FetchStats {
        FetchStats {
            light_success: self.light_success.load(Ordering::Relaxed),
            light_failed: self.light_failed.load(Ordering::Relaxed),
            render_success: self.render_success.load(Ordering::Relaxed),
            render_failed: self.render_failed.load(Ordering::Relaxed),
            policy_denied: self.policy_denied.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            total: self.total.load(Ordering::Relaxed),
        }
    }
}

/// Admits URLs and fetches them with the cheapest strategy that works
pub struct FetchOrchestrator {
    gate: Arc<ComplianceGate>,
    strategies: Vec<Arc<dyn FetchStrategy>>,
    semaphore: Arc<Semaphore>,
    counters: Counters,
}

impl FetchOrchestrator {
    /// Creates an orchestrator
    ///
    /// # Arguments
    ///
    /// * `gate` - Compliance gate consulted before every fetch
    /// * `strategies` - Strategies in the order they are tried
    /// * `max_concurrency` - Fetches in flight at once, across all batches
    pub fn new(
        gate: Arc<ComplianceGate>,
        strategies: Vec<Arc<dyn FetchStrategy>>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            gate,
            strategies,
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
            counters: Counters::default(),
        }
    }

    /// Builds the orchestrator described by `config`
    ///
    /// With the `browser` feature enabled and `enable-render` set, a headless
    /// chromium fallback follows the light strategy.
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        #[cfg(feature = "browser")]
        let renderer: Option<Arc<dyn PageRenderer>> = {
            let chromium: Arc<dyn PageRenderer> = Arc::new(crate::fetch::ChromiumRenderer::new(
                config.user_agent.header_value(),
            ));
            Some(chromium)
        };
        #[cfg(not(feature = "browser"))]
        let renderer: Option<Arc<dyn PageRenderer>> = None;

        Self::with_renderer(config, renderer)
    }

    /// Builds the orchestrator with a caller-supplied renderer
    ///
    /// The renderer is ignored when `enable-render` is false.
    pub fn with_renderer(
        config: &Config,
        renderer: Option<Arc<dyn PageRenderer>>,
    ) -> crate::Result<Self> {
        let gate = Arc::new(ComplianceGate::from_config(config)?);

        let mut strategies: Vec<Arc<dyn FetchStrategy>> = vec![Arc::new(
            LightFetchStrategy::from_config(&config.user_agent, &config.fetch)?,
        )];

        match renderer {
            Some(renderer) if config.fetch.enable_render => {
                strategies.push(Arc::new(RenderFetchStrategy::new(
                    renderer,
                    config.fetch.render_timeout(),
                    RetryPolicy::render(&config.fetch),
                )));
            }
            _ => tracing::info!("Render fallback disabled"),
        }

        Ok(Self::new(
            gate,
            strategies,
            config.fetch.max_concurrency as usize,
        ))
    }

    /// Admits and fetches one URL
    ///
    /// Never fails: denials, network failures and render failures all come
    /// back as a failed `FetchOutcome`. On failure the outcome is the last
    /// strategy's. The concurrency limit covers the strategies only, not the
    /// wait for admission.
    pub async fn fetch_with_fallback(&self, url: &str) -> FetchOutcome {
        let started = Instant::now();
        self.counters.total.fetch_add(1, Ordering::Relaxed);

        let decision = self.gate.admit(url).await;
        if !decision.allowed {
            self.counters.policy_denied.fetch_add(1, Ordering::Relaxed);
            return FetchOutcome::denied(url, decision.reason).with_elapsed(started.elapsed());
        }

        // Only fetches in flight hold a permit, never rate-limit waits
        let _permit = self.semaphore.acquire().await.ok();

        let mut last = None;
        for strategy in &self.strategies {
            let outcome = strategy.fetch(url).await;
            self.counters.record_strategy(strategy.kind(), outcome.success);

            if outcome.success {
                tracing::debug!("Fetched {} with {} strategy", url, strategy.kind());
                return outcome.with_elapsed(started.elapsed());
            }

            tracing::debug!(
                "{} strategy failed for {}: {}",
                strategy.kind(),
                url,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
            last = Some(outcome);
        }

        match last {
            Some(outcome) => {
                tracing::info!(
                    "All strategies failed for {}: {}",
                    url,
                    outcome.error.as_deref().unwrap_or("unknown error")
                );
                outcome.with_elapsed(started.elapsed())
            }
            None => FetchOutcome::failed(
                url,
                None,
                FailureKind::PermanentFetch,
                "No fetch strategies configured",
            ),
        }
    }

    /// Fetches `urls` concurrently
    ///
    /// Returns exactly one outcome per URL, in input order. A panic while
    /// fetching a URL becomes a failed outcome for that URL only.
    pub async fn fetch_batch<S: AsRef<str>>(&self, urls: &[S]) -> Vec<FetchOutcome> {
        tracing::info!("Fetching batch of {} URLs", urls.len());

        let tasks = urls.iter().map(|url| {
            let url = url.as_ref();
            AssertUnwindSafe(self.fetch_with_fallback(url))
                .catch_unwind()
                .map(move |result| match result {
                    Ok(outcome) => outcome,
                    Err(panic) => {
                        let message = panic_message(panic.as_ref());
                        tracing::warn!("Fetch task for {} panicked: {}", url, message);
                        self.counters.panicked.fetch_add(1, Ordering::Relaxed);
                        FetchOutcome::failed(
                            url,
                            None,
                            FailureKind::Panicked,
                            format!("Fetch task panicked: {}", message),
                        )
                    }
                })
        });

        let outcomes = join_all(tasks).await;
        let succeeded = outcomes.iter().filter(|o| o.success).count();
        tracing::info!("Batch complete: {}/{} succeeded", succeeded, outcomes.len());
        outcomes
    }

    /// Snapshot of the running counters
    pub fn stats(&self) -> FetchStats {
        self.counters.snapshot()
    }

    pub fn gate(&self) -> &Arc<ComplianceGate> {
        &self.gate
    }

    /// Strategies in the order they are tried
    pub fn strategy_kinds(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
