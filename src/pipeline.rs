//! End-to-end harvest: admit, fetch, extract, validate
//!
//! Turning HTML into a `CandidateRecord` is site-specific and lives outside
//! this crate, behind the `Extractor` trait.

use crate::config::Config;
use crate::fetch::{FetchOrchestrator, FetchOutcome};
use crate::validation::{CandidateRecord, ValidationCoordinator, ValidationOutcome};
use std::sync::Arc;

/// Builds a candidate record from fetched content
pub trait Extractor: Send + Sync {
    fn extract(&self, fetched: &FetchOutcome) -> anyhow::Result<CandidateRecord>;
}

/// What happened to one URL
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    /// Refused by the compliance gate
    Denied(FetchOutcome),
    /// Every strategy failed
    FetchFailed(FetchOutcome),
    /// Fetched, but the extractor could not build a record
    ExtractionFailed { fetch: FetchOutcome, error: String },
    /// Fetched, extracted and validated (the record may still be rejected)
    Validated {
        fetch: FetchOutcome,
        validation: ValidationOutcome,
    },
}

impl PipelineOutcome {
    pub fn fetch(&self) -> &FetchOutcome {
        match self {
            Self::Denied(fetch) | Self::FetchFailed(fetch) => fetch,
            Self::ExtractionFailed { fetch, .. } | Self::Validated { fetch, .. } => fetch,
        }
    }

    pub fn url(&self) -> &str {
        &self.fetch().url
    }

    pub fn validation(&self) -> Option<&ValidationOutcome> {
        match self {
            Self::Validated { validation, .. } => Some(validation),
            _ => None,
        }
    }

    /// Whether a valid record came out the end
    pub fn is_accepted(&self) -> bool {
        self.validation().is_some_and(|v| v.is_valid)
    }
}

/// Fetch orchestrator, extractor and validation wired together
pub struct Pipeline {
    orchestrator: FetchOrchestrator,
    extractor: Arc<dyn Extractor>,
    validation: ValidationCoordinator,
}

impl Pipeline {
    pub fn new(
        orchestrator: FetchOrchestrator,
        extractor: Arc<dyn Extractor>,
        validation: ValidationCoordinator,
    ) -> Self {
        Self {
            orchestrator,
            extractor,
            validation,
        }
    }

    pub fn from_config(config: &Config, extractor: Arc<dyn Extractor>) -> crate::Result<Self> {
        Ok(Self::new(
            FetchOrchestrator::from_config(config)?,
            extractor,
            ValidationCoordinator::from_config(config),
        ))
    }

    /// Runs every URL through the pipeline
    ///
    /// Fetches run concurrently; extraction and validation then run in input
    /// order, so of two identical records the earlier URL is the one
    /// accepted. Returns one outcome per URL, in input order.
    pub async fn run<S: AsRef<str>>(&self, urls: &[S]) -> Vec<PipelineOutcome> {
        let fetched = self.orchestrator.fetch_batch(urls).await;
        let mut outcomes = Vec::with_capacity(fetched.len());

        for fetch in fetched {
            let outcome = if fetch.is_policy_denied() {
                PipelineOutcome::Denied(fetch)
            } else if !fetch.success {
                PipelineOutcome::FetchFailed(fetch)
            } else {
                match self.extractor.extract(&fetch) {
                    Ok(record) => {
                        let validation = self.validation.validate(record).await;
                        PipelineOutcome::Validated { fetch, validation }
                    }
                    Err(e) => {
                        tracing::info!("Extraction failed for {}: {:#}", fetch.url, e);
                        PipelineOutcome::ExtractionFailed {
                            error: format!("{:#}", e),
                            fetch,
                        }
                    }
                }
            };
            outcomes.push(outcome);
        }

        let accepted = outcomes.iter().filter(|o| o.is_accepted()).count();
        tracing::info!("Pipeline accepted {}/{} URLs", accepted, outcomes.len());
        outcomes
    }

    pub fn orchestrator(&self) -> &FetchOrchestrator {
        &self.orchestrator
    }

    pub fn validation(&self) -> &ValidationCoordinator {
        &self.validation
    }
}
