//! Per-source record schemas

use crate::validation::{CandidateRecord, RecordField};
use std::collections::HashMap;

/// Name under which the fallback schema is registered
pub const DEFAULT_SCHEMA: &str = "default";

/// Field requirements for one kind of source
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSchema {
    pub name: String,
    /// Missing any of these makes the record invalid
    pub required: Vec<RecordField>,
    /// Missing any of these is worth a warning
    pub expected: Vec<RecordField>,
}

impl SourceSchema {
    pub fn new(
        name: impl Into<String>,
        required: Vec<RecordField>,
        expected: Vec<RecordField>,
    ) -> Self {
        Self {
            name: name.into(),
            required,
            expected,
        }
    }

    /// The schema used when a source type has none of its own
    pub fn default_schema() -> Self {
        Self::new(
            DEFAULT_SCHEMA,
            vec![RecordField::Url, RecordField::SourceDomain, RecordField::Title],
            vec![
                RecordField::Summary,
                RecordField::PublishDate,
                RecordField::Region,
                RecordField::Topics,
            ],
        )
    }

    /// News articles must also carry a publish date
    pub fn news_schema() -> Self {
        Self::new(
            "news",
            vec![
                RecordField::Url,
                RecordField::SourceDomain,
                RecordField::Title,
                RecordField::PublishDate,
            ],
            vec![RecordField::Summary, RecordField::Region, RecordField::Topics],
        )
    }

    /// Checks field presence, returning `(errors, warnings)`
    pub fn check(&self, record: &CandidateRecord) -> (Vec<String>, Vec<String>) {
        let errors = self
            .required
            .iter()
            .filter(|field| !record.has(**field))
            .map(|field| format!("Missing required field: {}", field))
            .collect();
        let warnings = self
            .expected
            .iter()
            .filter(|field| !record.has(**field))
            .map(|field| format!("Missing expected field: {}", field))
            .collect();
        (errors, warnings)
    }
}

/// Schemas keyed by source type
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: HashMap<String, SourceSchema>,
    fallback: SourceSchema,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        let mut registry = Self {
            schemas: HashMap::new(),
            fallback: SourceSchema::default_schema(),
        };
        registry.register(SourceSchema::news_schema());
        registry
    }
}

impl SchemaRegistry {
    /// Registers `schema` under its name, replacing any previous one
    ///
    /// Registering a schema named "default" replaces the fallback.
    pub fn register(&mut self, schema: SourceSchema) {
        if schema.name == DEFAULT_SCHEMA {
            self.fallback = schema;
        } else {
            self.schemas.insert(schema.name.clone(), schema);
        }
    }

    /// Schema for `source_type`, or the fallback
    pub fn schema_for(&self, source_type: &str) -> &SourceSchema {
        self.schemas
            .get(source_type.trim().to_lowercase().as_str())
            .unwrap_or(&self.fallback)
    }
}
