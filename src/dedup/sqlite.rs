//! SQLite fingerprint store
//!
//! A shared SQLite file lets several harvester processes see each other's
//! fingerprints. Entries expire after their TTL.

use crate::dedup::schema::initialize_schema;
use crate::dedup::{FingerprintStore, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Fingerprint store backed by a SQLite database
pub struct SqliteFingerprintStore {
    conn: Mutex<Connection>,
}

impl SqliteFingerprintStore {
    /// Opens (or creates) the database at `path`
    pub fn new(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
        ",
        )?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates a private in-memory database
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Deletes expired fingerprints, returning how many were removed
    pub fn purge_expired(&self) -> StoreResult<usize> {
        let removed = self.lock()?.execute(
            "DELETE FROM fingerprints WHERE expires_at <= ?1",
            params![Utc::now().timestamp()],
        )?;
        if removed > 0 {
            tracing::debug!("Purged {} expired fingerprints", removed);
        }
        Ok(removed)
    }

    /// Number of unexpired fingerprints
    pub fn len(&self) -> StoreResult<usize> {
        let count: i64 = self.lock()?.query_row(
            "SELECT COUNT(*) FROM fingerprints WHERE expires_at > ?1",
            params![Utc::now().timestamp()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

#[async_trait]
impl FingerprintStore for SqliteFingerprintStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn get(&self, fingerprint: &str) -> StoreResult<Option<String>> {
        let reference = self
            .lock()?
            .query_row(
                "SELECT reference FROM fingerprints WHERE fingerprint = ?1 AND expires_at > ?2",
                params![fingerprint, Utc::now().timestamp()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(reference)
    }

    async fn insert(&self, fingerprint: &str, reference: &str, ttl: Duration) -> StoreResult<()> {
        let now = Utc::now();
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires_at = now.timestamp().saturating_add(ttl_secs);
        self.lock()?.execute(
            "INSERT OR REPLACE INTO fingerprints (fingerprint, reference, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![fingerprint, reference, now.to_rfc3339(), expires_at],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const WEEK: Duration = Duration::from_secs(7 * 24 * 3600);

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = SqliteFingerprintStore::in_memory().unwrap();
        assert_eq!(store.get("abc").await.unwrap(), None);

        store.insert("abc", "https://example.com/a", WEEK).await.unwrap();
        assert_eq!(
            store.get("abc").await.unwrap().as_deref(),
            Some("https://example.com/a")
        );
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_expired_entries_invisible_and_purged() {
        let store = SqliteFingerprintStore::in_memory().unwrap();
        store.insert("old", "https://example.com/old", Duration::ZERO).await.unwrap();
        store.insert("new", "https://example.com/new", WEEK).await.unwrap();

        assert_eq!(store.get("old").await.unwrap(), None);
        assert_eq!(store.purge_expired().unwrap(), 1);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unbounded_ttl_never_expires() {
        let store = SqliteFingerprintStore::in_memory().unwrap();
        store.insert("abc", "https://example.com/a", Duration::MAX).await.unwrap();

        assert!(store.get("abc").await.unwrap().is_some());
        assert_eq!(store.purge_expired().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_persists_across_connections() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fingerprints.db");

        {
            let store = SqliteFingerprintStore::new(&path).unwrap();
            store.insert("abc", "https://example.com/a", WEEK).await.unwrap();
        }

        let reopened = SqliteFingerprintStore::new(&path).unwrap();
        assert!(reopened.get("abc").await.unwrap().is_some());
    }
}
