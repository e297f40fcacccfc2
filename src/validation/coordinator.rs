//! Runs duplicate detection and record validation, keeping running stats

use crate::config::Config;
use crate::dedup::DuplicateIndex;
use crate::validation::{
    CandidateRecord, RecordValidator, ValidationOutcome, LOW_QUALITY_THRESHOLD,
};
use serde::Serialize;
use std::fmt;
use std::sync::Mutex;

/// Validation statistics since the coordinator was created
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationStats {
    pub total_validated: u64,
    pub valid_records: u64,
    /// Includes duplicates
    pub invalid_records: u64,
    pub duplicates_found: u64,
    /// Scored records below the low-quality threshold
    pub quality_issues: u64,
}

impl fmt::Display for ValidationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Records validated: {}", self.total_validated)?;
        writeln!(f, "  valid:           {}", self.valid_records)?;
        writeln!(f, "  invalid:         {}", self.invalid_records)?;
        writeln!(f, "  duplicates:      {}", self.duplicates_found)?;
        write!(f, "  quality issues:  {}", self.quality_issues)
    }
}

/// Front door for records on their way to storage
pub struct ValidationCoordinator {
    index: DuplicateIndex,
    validator: RecordValidator,
    stats: Mutex<ValidationStats>,
}

impl ValidationCoordinator {
    pub fn new(index: DuplicateIndex, validator: RecordValidator) -> Self {
        Self {
            index,
            validator,
            stats: Mutex::new(ValidationStats::default()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            DuplicateIndex::from_config(&config.dedup),
            RecordValidator::from_config(&config.validation),
        )
    }

    /// Validates one record
    ///
    /// Duplicates short-circuit: they are invalid and skip every other
    /// check. Otherwise the record is invalid only if its schema's required
    /// fields are missing.
    pub async fn validate(&self, record: CandidateRecord) -> ValidationOutcome {
        let duplicate = self.index.is_duplicate(&record).await;

        let outcome = if duplicate.is_duplicate {
            let reason = duplicate
                .reason
                .map(|r| r.to_string())
                .unwrap_or_else(|| "duplicate".to_string());
            ValidationOutcome {
                is_valid: false,
                errors: vec![match duplicate.duplicate_ref.as_deref() {
                    Some(reference) => format!("{} of {}", reason, reference),
                    None => reason,
                }],
                warnings: Vec::new(),
                is_duplicate: true,
                duplicate_ref: duplicate.duplicate_ref,
                quality_score: 0.0,
                record,
            }
        } else {
            let report = self.validator.check(&record);
            ValidationOutcome {
                is_valid: report.errors.is_empty(),
                errors: report.errors,
                warnings: report.warnings,
                is_duplicate: false,
                duplicate_ref: None,
                quality_score: report.quality_score,
                record,
            }
        };

        self.record_stats(&outcome);

        if outcome.is_valid {
            tracing::debug!(
                "Accepted {} (quality {:.2}, {} warnings)",
                outcome.record.url,
                outcome.quality_score,
                outcome.warnings.len()
            );
        } else {
            tracing::debug!("Rejected {}: {}", outcome.record.url, outcome.errors.join("; "));
        }

        outcome
    }

    /// Validates records one after another, in order
    pub async fn validate_batch(&self, records: Vec<CandidateRecord>) -> Vec<ValidationOutcome> {
        let mut outcomes = Vec::with_capacity(records.len());
        for record in records {
            outcomes.push(self.validate(record).await);
        }
        outcomes
    }

    /// Snapshot of the running statistics
    pub fn stats(&self) -> ValidationStats {
        self.stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn validator_mut(&mut self) -> &mut RecordValidator {
        &mut self.validator
    }

    fn record_stats(&self, outcome: &ValidationOutcome) {
        let mut stats = self
            .stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        stats.total_validated += 1;
        if outcome.is_valid {
            stats.valid_records += 1;
        } else {
            stats.invalid_records += 1;
        }
        if outcome.is_duplicate {
            stats.duplicates_found += 1;
        } else if outcome.quality_score < LOW_QUALITY_THRESHOLD {
            stats.quality_issues += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::SchemaRegistry;
    use chrono::{Duration, Utc};

    fn coordinator() -> ValidationCoordinator {
        ValidationCoordinator::new(
            DuplicateIndex::in_memory(),
            RecordValidator::new(SchemaRegistry::default(), vec![], 730),
        )
    }

    fn record(url: &str) -> CandidateRecord {
        CandidateRecord {
            url: url.to_string(),
            source_domain: "example.com".to_string(),
            title: Some(format!("Landslide report for {}", url)),
            summary: Some("A landslide blocked the mountain road on Tuesday.".to_string()),
            publish_date: Some(Utc::now() - Duration::days(2)),
            region: Some("Highlands".to_string()),
            topics: vec!["landslide".to_string()],
            links: vec!["https://roads.example.org/closures".to_string()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_second_validate_is_duplicate() {
        let coordinator = coordinator();
        let first = coordinator.validate(record("https://example.com/a")).await;
        assert!(first.is_valid);
        assert_eq!(first.quality_score, 1.0);

        let second = coordinator.validate(record("https://example.com/a")).await;
        assert!(!second.is_valid);
        assert!(second.is_duplicate);
        assert_eq!(second.duplicate_ref.as_deref(), Some("https://example.com/a"));
        assert!(second.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_missing_required_field_invalidates() {
        let coordinator = coordinator();
        let mut r = record("https://example.com/b");
        r.title = None;

        let outcome = coordinator.validate(r).await;
        assert!(!outcome.is_valid);
        assert!(!outcome.is_duplicate);
        assert_eq!(outcome.errors, vec!["Missing required field: title"]);
    }

    #[tokio::test]
    async fn test_warnings_do_not_invalidate() {
        let coordinator = coordinator();
        let mut r = record("https://example.com/c");
        r.region = None;
        r.topics.clear();

        let outcome = coordinator.validate(r).await;
        assert!(outcome.is_valid);
        assert_eq!(outcome.warnings.len(), 2);
    }

    #[tokio::test]
    async fn test_stats_accumulate() {
        let coordinator = coordinator();
        let sparse = CandidateRecord {
            url: "https://example.com/sparse".to_string(),
            source_domain: "example.com".to_string(),
            title: Some("Tiny".to_string()),
            ..Default::default()
        };

        let outcomes = coordinator
            .validate_batch(vec![
                record("https://example.com/1"),
                record("https://example.com/1"),
                sparse,
            ])
            .await;
        assert_eq!(outcomes.len(), 3);

        let stats = coordinator.stats();
        assert_eq!(
            stats,
            ValidationStats {
                total_validated: 3,
                valid_records: 2,
                invalid_records: 1,
                duplicates_found: 1,
                quality_issues: 1,
            }
        );
        assert!(stats.to_string().contains("duplicates:      1"));
    }
}
