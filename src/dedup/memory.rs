//! In-process fingerprint stores

use crate::dedup::{FingerprintStore, StoreResult};
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;

/// Fingerprints held for the lifetime of the process
///
/// TTLs are ignored.
#[derive(Default)]
pub struct InMemoryFingerprintStore {
    entries: DashMap<String, String>,
}

impl InMemoryFingerprintStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl FingerprintStore for InMemoryFingerprintStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, fingerprint: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.get(fingerprint).map(|r| r.value().clone()))
    }

    async fn insert(&self, fingerprint: &str, reference: &str, _ttl: Duration) -> StoreResult<()> {
        self.entries
            .entry(fingerprint.to_string())
            .or_insert_with(|| reference.to_string());
        Ok(())
    }
}

/// Wraps an external store and answers from memory when it fails
///
/// Lookups consult the external store first and the in-memory set second,
/// so fingerprints recorded while the external store was down still count.
pub struct FallbackStore {
    primary: Box<dyn FingerprintStore>,
    local: InMemoryFingerprintStore,
}

impl FallbackStore {
    pub fn new(primary: Box<dyn FingerprintStore>) -> Self {
        Self {
            primary,
            local: InMemoryFingerprintStore::new(),
        }
    }
}

#[async_trait]
impl FingerprintStore for FallbackStore {
    fn backend(&self) -> &'static str {
        self.primary.backend()
    }

    async fn get(&self, fingerprint: &str) -> StoreResult<Option<String>> {
        match self.primary.get(fingerprint).await {
            Ok(Some(reference)) => Ok(Some(reference)),
            Ok(None) => self.local.get(fingerprint).await,
            Err(e) => {
                tracing::warn!(
                    "{} fingerprint lookup failed, using in-memory set: {}",
                    self.primary.backend(),
                    e
                );
                self.local.get(fingerprint).await
            }
        }
    }

    async fn insert(&self, fingerprint: &str, reference: &str, ttl: Duration) -> StoreResult<()> {
        if let Err(e) = self.primary.insert(fingerprint, reference, ttl).await {
            tracing::warn!(
                "{} fingerprint insert failed, keeping it in memory: {}",
                self.primary.backend(),
                e
            );
            self.local.insert(fingerprint, reference, ttl).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::StoreError;

    struct BrokenStore;

    #[async_trait]
    impl FingerprintStore for BrokenStore {
        fn backend(&self) -> &'static str {
            "broken"
        }

        async fn get(&self, _fingerprint: &str) -> StoreResult<Option<String>> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn insert(&self, _: &str, _: &str, _: Duration) -> StoreResult<()> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_memory_keeps_first_reference() {
        let store = InMemoryFingerprintStore::new();
        store.insert("k", "first", Duration::ZERO).await.unwrap();
        store.insert("k", "second", Duration::ZERO).await.unwrap();

        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("first"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_fallback_answers_when_primary_fails() {
        let store = FallbackStore::new(Box::new(BrokenStore));

        assert_eq!(store.get("k").await.unwrap(), None);
        store.insert("k", "ref", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("ref"));
    }

    #[tokio::test]
    async fn test_fallback_prefers_primary() {
        let primary = InMemoryFingerprintStore::new();
        primary.insert("k", "primary", Duration::ZERO).await.unwrap();
        let store = FallbackStore::new(Box::new(primary));

        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("primary"));
        assert_eq!(store.backend(), "memory");
    }
}
