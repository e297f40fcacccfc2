//! Business rules and quality scoring
//!
//! Business rules only ever produce warnings. The quality score starts at 1.0
//! and loses a fixed amount per issue:
//!
//! | Issue | Deduction |
//! |-------|-----------|
//! | Missing title | 0.3 |
//! | Title shorter than 10 / longer than 200 chars | 0.2 / 0.1 |
//! | Missing summary | 0.3 |
//! | Summary shorter than 20 / longer than 1000 chars | 0.2 / 0.1 |
//! | No topics / more than 10 topics | 0.1 / 0.1 |
//! | Missing publish date | 0.1 |
//! | Missing region | 0.1 |
//! | No link to another domain | 0.05 |

use crate::config::{ValidationConfig, MAX_AGE_DAYS_LIMIT};
use crate::url::apex_domain;
use crate::validation::{CandidateRecord, RecordField, SchemaRegistry};
use chrono::{Duration, Utc};
use url::Url;

/// Scores below this add a warning and count as a quality issue
pub const LOW_QUALITY_THRESHOLD: f64 = 0.5;

const MIN_TITLE_CHARS: usize = 10;
const MAX_TITLE_CHARS: usize = 200;
const MIN_SUMMARY_CHARS: usize = 20;
const MAX_SUMMARY_CHARS: usize = 1000;
const MAX_TOPICS: usize = 10;

/// What a validator found in one record
#[derive(Debug, Clone, PartialEq)]
pub struct RecordReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub quality_score: f64,
}

/// Schema, business-rule and quality checks
#[derive(Debug, Clone)]
pub struct RecordValidator {
    schemas: SchemaRegistry,
    relevance_keywords: Vec<String>,
    max_age: Duration,
}

impl RecordValidator {
    pub fn new(schemas: SchemaRegistry, relevance_keywords: Vec<String>, max_age_days: i64) -> Self {
        Self {
            schemas,
            relevance_keywords: relevance_keywords
                .into_iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            max_age: Duration::days(max_age_days.clamp(0, MAX_AGE_DAYS_LIMIT)),
        }
    }

    pub fn from_config(config: &ValidationConfig) -> Self {
        Self::new(
            SchemaRegistry::default(),
            config.relevance_keywords.clone(),
            config.max_age_days,
        )
    }

    pub fn schemas_mut(&mut self) -> &mut SchemaRegistry {
        &mut self.schemas
    }

    /// Runs every non-duplicate check on `record`
    pub fn check(&self, record: &CandidateRecord) -> RecordReport {
        let schema = self.schemas.schema_for(&record.source_type);
        let (errors, mut warnings) = schema.check(record);

        warnings.extend(self.business_rule_warnings(record));

        let quality_score = quality_score(record);
        if quality_score < LOW_QUALITY_THRESHOLD {
            warnings.push(format!("Low quality score: {:.2}", quality_score));
        }

        RecordReport {
            errors,
            warnings,
            quality_score,
        }
    }

    fn business_rule_warnings(&self, record: &CandidateRecord) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Some(title) = record.title.as_deref() {
            if char_len(title) < MIN_TITLE_CHARS {
                warnings.push(format!("Title shorter than {} characters", MIN_TITLE_CHARS));
            }
        }

        if let Some(summary) = record.summary.as_deref() {
            if char_len(summary) < MIN_SUMMARY_CHARS {
                warnings.push(format!("Summary shorter than {} characters", MIN_SUMMARY_CHARS));
            }
        }

        if let Some(published) = record.publish_date {
            let now = Utc::now();
            if published > now {
                warnings.push(format!("Publish date {} is in the future", published));
            } else if now - published > self.max_age {
                warnings.push(format!(
                    "Publish date {} is older than {} days",
                    published,
                    self.max_age.num_days()
                ));
            }
        }

        if !self.relevance_keywords.is_empty() && !self.mentions_keyword(record) {
            warnings.push("No relevance keyword found".to_string());
        }

        warnings
    }

    fn mentions_keyword(&self, record: &CandidateRecord) -> bool {
        [&record.title, &record.summary, &record.full_text]
            .into_iter()
            .flatten()
            .map(|text| text.to_lowercase())
            .any(|text| self.relevance_keywords.iter().any(|k| text.contains(k.as_str())))
    }
}

/// Scores `record` in `[0, 1]`
pub fn quality_score(record: &CandidateRecord) -> f64 {
    let mut score: f64 = 1.0;

    match record.title.as_deref().filter(|t| !t.trim().is_empty()) {
        None => score -= 0.3,
        Some(title) if char_len(title) < MIN_TITLE_CHARS => score -= 0.2,
        Some(title) if char_len(title) > MAX_TITLE_CHARS => score -= 0.1,
        Some(_) => {}
    }

    match record.summary.as_deref().filter(|s| !s.trim().is_empty()) {
        None => score -= 0.3,
        Some(summary) if char_len(summary) < MIN_SUMMARY_CHARS => score -= 0.2,
        Some(summary) if char_len(summary) > MAX_SUMMARY_CHARS => score -= 0.1,
        Some(_) => {}
    }

    if record.topics.is_empty() {
        score -= 0.1;
    } else if record.topics.len() > MAX_TOPICS {
        score -= 0.1;
    }

    if !record.has(RecordField::PublishDate) {
        score -= 0.1;
    }
    if !record.has(RecordField::Region) {
        score -= 0.1;
    }
    if !has_external_link(record) {
        score -= 0.05;
    }

    score.clamp(0.0, 1.0)
}

/// Whether any link points at a site other than the record's source
///
/// Sites are compared by apex, so `news.example.com` is not external to
/// `example.com`. Relative and unparseable links are not external.
fn has_external_link(record: &CandidateRecord) -> bool {
    let source = apex_domain(record.source_domain.trim().trim_start_matches("www."));
    record
        .links
        .iter()
        .filter_map(|link| Url::parse(link).ok())
        .filter_map(|url| url.host_str().map(apex_domain))
        .any(|apex| apex != source)
}

fn char_len(text: &str) -> usize {
    text.trim().chars().count()
}
