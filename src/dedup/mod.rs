//! Duplicate detection for candidate records
//!
//! Records are fingerprinted twice: once by their normalized URL and once by
//! their normalized content (title, summary, publish date, region). A record
//! is a duplicate when either fingerprint was seen before. Fingerprints live
//! in a `FingerprintStore`, either an in-process set or a shared SQLite file
//! whose entries expire.

mod memory;
mod schema;
mod sqlite;

pub use memory::{FallbackStore, InMemoryFingerprintStore};
pub use sqlite::SqliteFingerprintStore;

use crate::config::DedupConfig;
use crate::url::normalize_url;
use crate::validation::CandidateRecord;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

/// Errors from a fingerprint backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Store lock poisoned")]
    Poisoned,

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Backend holding fingerprints of records already seen
///
/// Each fingerprint maps to a reference (the URL of the record that first
/// produced it).
#[async_trait]
pub trait FingerprintStore: Send + Sync {
    /// Short backend name for logs
    fn backend(&self) -> &'static str;

    /// Reference recorded for `fingerprint`, if it is known and unexpired
    async fn get(&self, fingerprint: &str) -> StoreResult<Option<String>>;

    /// Records `fingerprint` for at least `ttl`
    async fn insert(&self, fingerprint: &str, reference: &str, ttl: Duration) -> StoreResult<()>;
}

/// Which fingerprint matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateReason {
    Url,
    Content,
}

impl std::fmt::Display for DuplicateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Url => write!(f, "duplicate URL"),
            Self::Content => write!(f, "duplicate content"),
        }
    }
}

/// Result of a duplicate lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateCheck {
    pub is_duplicate: bool,
    pub reason: Option<DuplicateReason>,
    /// URL of the record this one duplicates
    pub duplicate_ref: Option<String>,
}

impl DuplicateCheck {
    fn unique() -> Self {
        Self {
            is_duplicate: false,
            reason: None,
            duplicate_ref: None,
        }
    }

    fn duplicate(reason: DuplicateReason, reference: String) -> Self {
        Self {
            is_duplicate: true,
            reason: Some(reason),
            duplicate_ref: Some(reference),
        }
    }
}

/// Remembers records and flags repeats
pub struct DuplicateIndex {
    store: Box<dyn FingerprintStore>,
    ttl: Duration,
    // Serializes lookup-then-insert so two identical records racing through
    // cannot both be judged unique.
    check_lock: Mutex<()>,
}

impl DuplicateIndex {
    pub fn new(store: Box<dyn FingerprintStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            check_lock: Mutex::new(()),
        }
    }

    /// In-process index, for tests and single-run use
    pub fn in_memory() -> Self {
        Self::new(Box::new(InMemoryFingerprintStore::new()), Duration::MAX)
    }

    /// Builds the index described by `config`
    ///
    /// With a `database-path` the SQLite store is used behind a
    /// `FallbackStore`; if the database cannot be opened the index runs on
    /// the in-memory set alone.
    pub fn from_config(config: &DedupConfig) -> Self {
        let Some(path) = config.database_path.as_deref() else {
            tracing::info!("Duplicate index using in-memory fingerprints");
            return Self::new(Box::new(InMemoryFingerprintStore::new()), config.ttl());
        };

        match SqliteFingerprintStore::new(std::path::Path::new(path)) {
            Ok(store) => {
                match store.purge_expired() {
                    Ok(removed) => tracing::info!(
                        "Duplicate index using {} ({} expired fingerprints purged)",
                        path,
                        removed
                    ),
                    Err(e) => tracing::warn!("Failed to purge expired fingerprints: {}", e),
                }
                Self::new(Box::new(FallbackStore::new(Box::new(store))), config.ttl())
            }
            Err(e) => {
                tracing::warn!(
                    "Cannot open fingerprint database {} ({}); using in-memory fingerprints",
                    path,
                    e
                );
                Self::new(Box::new(InMemoryFingerprintStore::new()), config.ttl())
            }
        }
    }

    /// Backend name
    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Checks `record` against everything seen so far
    ///
    /// The URL fingerprint is checked before the content fingerprint. A
    /// record that is not a duplicate has both fingerprints recorded, so a
    /// second identical call reports a duplicate. Store failures are logged
    /// and treated as "not seen".
    pub async fn is_duplicate(&self, record: &CandidateRecord) -> DuplicateCheck {
        let url_key = format!("url:{}", url_fingerprint(&record.url));
        let content_key = format!("content:{}", content_fingerprint(record));

        let _guard = self.check_lock.lock().await;

        for (key, reason) in [
            (&url_key, DuplicateReason::Url),
            (&content_key, DuplicateReason::Content),
        ] {
            match self.store.get(key).await {
                Ok(Some(reference)) => {
                    tracing::debug!("{} is a {} of {}", record.url, reason, reference);
                    return DuplicateCheck::duplicate(reason, reference);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Fingerprint lookup failed for {}: {}", record.url, e),
            }
        }

        for key in [&url_key, &content_key] {
            if let Err(e) = self.store.insert(key, &record.url, self.ttl).await {
                tracing::warn!("Failed to record fingerprint for {}: {}", record.url, e);
            }
        }

        DuplicateCheck::unique()
    }
}

/// SHA-256 of the normalized URL, or of the raw URL when it cannot be parsed
pub fn url_fingerprint(url: &str) -> String {
    let canonical = normalize_url(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string());
    sha256_hex(&canonical)
}

/// SHA-256 over normalized title, summary, publish date and region
pub fn content_fingerprint(record: &CandidateRecord) -> String {
    let publish_date = record
        .publish_date
        .map(|d| d.to_rfc3339())
        .unwrap_or_default();
    let material = [
        normalize_text(record.title.as_deref().unwrap_or_default()),
        normalize_text(record.summary.as_deref().unwrap_or_default()),
        publish_date,
        record.region.clone().unwrap_or_default(),
    ]
    .join("|");
    sha256_hex(&material)
}

/// Lowercases, trims and collapses internal whitespace
fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}
