//! Validation module: schema, business-rule and quality checks on records
//!
//! Extracted records arrive as `CandidateRecord`s. The
//! `ValidationCoordinator` first rejects duplicates, then checks the record
//! against the schema for its source type, applies business rules and scores
//! its quality. Failures are reported in the returned `ValidationOutcome`,
//! never as Rust errors.

mod coordinator;
mod rules;
mod schema;

pub use coordinator::{ValidationCoordinator, ValidationStats};
pub use rules::{quality_score, RecordValidator, LOW_QUALITY_THRESHOLD};
pub use schema::{SchemaRegistry, SourceSchema};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A record produced by an extractor from a fetched page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub url: String,

    #[serde(default)]
    pub source_domain: String,

    /// Selects the schema the record is checked against
    #[serde(default)]
    pub source_type: String,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub summary: Option<String>,

    #[serde(default)]
    pub publish_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub region: Option<String>,

    #[serde(default)]
    pub topics: Vec<String>,

    #[serde(default)]
    pub full_text: Option<String>,

    #[serde(default)]
    pub links: Vec<String>,

    #[serde(default)]
    pub images: Vec<String>,
}

impl CandidateRecord {
    /// Whether `field` carries a non-blank value
    pub fn has(&self, field: RecordField) -> bool {
        fn filled(value: &Option<String>) -> bool {
            value.as_deref().is_some_and(|v| !v.trim().is_empty())
        }

        match field {
            RecordField::Url => !self.url.trim().is_empty(),
            RecordField::SourceDomain => !self.source_domain.trim().is_empty(),
            RecordField::Title => filled(&self.title),
            RecordField::Summary => filled(&self.summary),
            RecordField::PublishDate => self.publish_date.is_some(),
            RecordField::Region => filled(&self.region),
            RecordField::Topics => !self.topics.is_empty(),
            RecordField::FullText => filled(&self.full_text),
            RecordField::Links => !self.links.is_empty(),
            RecordField::Images => !self.images.is_empty(),
        }
    }
}

/// Fields a schema can require or expect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordField {
    Url,
    SourceDomain,
    Title,
    Summary,
    PublishDate,
    Region,
    Topics,
    FullText,
    Links,
    Images,
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Url => "url",
            Self::SourceDomain => "source_domain",
            Self::Title => "title",
            Self::Summary => "summary",
            Self::PublishDate => "publish_date",
            Self::Region => "region",
            Self::Topics => "topics",
            Self::FullText => "full_text",
            Self::Links => "links",
            Self::Images => "images",
        };
        f.write_str(name)
    }
}

/// Verdict on one record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationOutcome {
    /// False on schema failure or duplication
    pub is_valid: bool,

    pub record: CandidateRecord,

    /// Problems that make the record invalid
    pub errors: Vec<String>,

    /// Problems worth flagging that do not invalidate the record
    pub warnings: Vec<String>,

    pub is_duplicate: bool,

    /// URL of the earlier record this one duplicates
    pub duplicate_ref: Option<String>,

    /// Quality in `[0, 1]`; 0 for duplicates, which are not scored
    pub quality_score: f64,
}
