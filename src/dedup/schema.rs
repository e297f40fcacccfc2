//! Fingerprint table definition

/// SQL schema for the fingerprint store
///
/// `expires_at` is a unix timestamp in seconds; rows past it are ignored by
/// lookups and removed by `purge_expired`.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS fingerprints (
    fingerprint TEXT PRIMARY KEY,
    reference TEXT NOT NULL,
    created_at TEXT NOT NULL,
    expires_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_fingerprints_expires ON fingerprints(expires_at);
"#;

/// Creates the fingerprint table if it does not exist
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)
}
