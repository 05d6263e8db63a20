//! SQLite-backed persistence for transcripts
//!
//! One row per finished recording. Writes are transactional: a
//! transcript either appears complete or not at all. Schema changes
//! are additive and applied in order at open time; a failed migration
//! leaves the database untouched and is fatal.

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

/// Current schema version. Bump when adding a migration.
const SCHEMA_VERSION: u32 = 3;

/// A persisted transcript
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptRecord {
    pub id: i64,
    pub title: String,
    pub transcript: String,
    pub summary: Option<String>,
    /// Which backend produced the text ("local", "cloud", "remote")
    pub backend_used: String,
    /// Recording length in seconds
    pub duration_secs: f64,
    /// Where the audio came from: a local file path for `ihear transcribe`,
    /// none for live hotkey recordings
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new transcript, before the database assigns an id
#[derive(Debug, Clone)]
pub struct NewTranscript {
    pub title: String,
    pub transcript: String,
    pub summary: Option<String>,
    pub backend_used: String,
    pub duration_secs: f64,
    pub source: Option<String>,
}

/// Transcript storage manager
#[derive(Debug)]
pub struct TranscriptStore {
    conn: Connection,
}

impl TranscriptStore {
    /// Open or create the store at the given path, applying any
    /// pending schema migrations
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        let mut store = Self { conn };
        store.migrate()?;

        Ok(store)
    }

    /// Open an in-memory store, for tests and one-shot CLI use
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let mut store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Apply pending migrations, each in its own transaction
    fn migrate(&mut self) -> Result<(), StoreError> {
        // The meta table must exist before we can read the version
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;

        let mut version = self.schema_version()?;

        if version > SCHEMA_VERSION {
            return Err(StoreError::Migration {
                version,
                message: format!(
                    "database schema is newer than this build supports (max {})",
                    SCHEMA_VERSION
                ),
            });
        }

        while version < SCHEMA_VERSION {
            let next = version + 1;
            tracing::info!("Migrating transcript store to schema version {}", next);

            let tx = self.conn.transaction()?;
            apply_migration(&tx, next).map_err(|e| StoreError::Migration {
                version: next,
                message: e.to_string(),
            })?;
            tx.execute(
                "INSERT OR REPLACE INTO meta(key, value) VALUES('schema_version', ?1)",
                params![next.to_string()],
            )?;
            tx.commit().map_err(|e| StoreError::Migration {
                version: next,
                message: e.to_string(),
            })?;

            version = next;
        }

        Ok(())
    }

    /// Read the schema version, 0 for a fresh database
    fn schema_version(&self) -> Result<u32, StoreError> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match value {
            Some(v) => v.parse().map_err(|_| StoreError::Migration {
                version: 0,
                message: format!("unreadable schema_version: {:?}", v),
            }),
            None => Ok(0),
        }
    }

    /// Insert a new transcript and return the stored record
    pub fn create(&self, new: &NewTranscript) -> Result<TranscriptRecord, StoreError> {
        let now = Utc::now();

        self.conn.execute(
            r#"
            INSERT INTO transcripts (title, transcript, summary, backend_used,
                                     duration_secs, source, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                new.title,
                new.transcript,
                new.summary,
                new.backend_used,
                new.duration_secs,
                new.source,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        self.get(id)
    }

    /// Get a transcript by id
    pub fn get(&self, id: i64) -> Result<TranscriptRecord, StoreError> {
        self.conn
            .query_row(
                r#"
                SELECT id, title, transcript, summary, backend_used,
                       duration_secs, source, created_at, updated_at
                FROM transcripts WHERE id = ?1
                "#,
                params![id],
                row_to_record,
            )
            .optional()?
            .ok_or(StoreError::NotFound(id))
    }

    /// List transcripts, newest first, with an optional limit
    pub fn list(&self, limit: Option<u32>) -> Result<Vec<TranscriptRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, title, transcript, summary, backend_used,
                   duration_secs, source, created_at, updated_at
            FROM transcripts
            ORDER BY created_at DESC, id DESC
            LIMIT ?1
            "#,
        )?;

        // SQLite treats a negative LIMIT as unlimited
        let limit = limit.map(|l| l as i64).unwrap_or(-1);

        let records = stmt
            .query_map(params![limit], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Delete a transcript by id
    pub fn delete(&self, id: i64) -> Result<(), StoreError> {
        let rows = self
            .conn
            .execute("DELETE FROM transcripts WHERE id = ?1", params![id])?;

        if rows == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    /// Replace the summary of a transcript and return the updated record
    pub fn set_summary(&self, id: i64, summary: &str) -> Result<TranscriptRecord, StoreError> {
        let now = Utc::now();

        let rows = self.conn.execute(
            "UPDATE transcripts SET summary = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, summary, now.to_rfc3339()],
        )?;

        if rows == 0 {
            return Err(StoreError::NotFound(id));
        }
        self.get(id)
    }

    /// Number of stored transcripts
    pub fn count(&self) -> Result<u64, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM transcripts", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

/// Apply a single schema migration step
fn apply_migration(conn: &Connection, version: u32) -> Result<(), rusqlite::Error> {
    match version {
        1 => conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS transcripts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                transcript TEXT NOT NULL,
                summary TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_transcripts_created_at
                ON transcripts(created_at DESC);
            "#,
        ),
        2 => conn.execute_batch(
            r#"
            ALTER TABLE transcripts ADD COLUMN backend_used TEXT NOT NULL DEFAULT 'local';
            ALTER TABLE transcripts ADD COLUMN duration_secs REAL NOT NULL DEFAULT 0.0;
            "#,
        ),
        3 => conn.execute_batch("ALTER TABLE transcripts ADD COLUMN source TEXT;"),
        other => Err(rusqlite::Error::InvalidParameterName(format!(
            "no migration registered for version {}",
            other
        ))),
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> Result<TranscriptRecord, rusqlite::Error> {
    Ok(TranscriptRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        transcript: row.get(2)?,
        summary: row.get(3)?,
        backend_used: row.get(4)?,
        duration_secs: row.get(5)?,
        source: row.get(6)?,
        created_at: parse_timestamp(row, 7)?,
        updated_at: parse_timestamp(row, 8)?,
    })
}

fn parse_timestamp(row: &rusqlite::Row<'_>, idx: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

/// The default database location under the user data directory
pub fn default_db_path() -> PathBuf {
    crate::config::Config::db_path()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn new_transcript(title: &str) -> NewTranscript {
        NewTranscript {
            title: title.to_string(),
            transcript: format!("{} body text", title),
            summary: None,
            backend_used: "local".to_string(),
            duration_secs: 3.5,
            source: None,
        }
    }

    #[test]
    fn test_create_and_get() {
        let store = TranscriptStore::open_in_memory().unwrap();

        let record = store.create(&new_transcript("morning memo")).unwrap();
        assert!(record.id > 0);
        assert_eq!(record.title, "morning memo");
        assert_eq!(record.backend_used, "local");
        assert_eq!(record.summary, None);

        let fetched = store.get(record.id).unwrap();
        assert_eq!(fetched, record);
    }

    #[test]
    fn test_source_path_persisted() {
        let store = TranscriptStore::open_in_memory().unwrap();

        let record = store
            .create(&NewTranscript {
                source: Some("/home/user/memo.wav".to_string()),
                ..new_transcript("file memo")
            })
            .unwrap();
        assert_eq!(record.source.as_deref(), Some("/home/user/memo.wav"));

        // Live recordings have no source path
        let live = store.create(&new_transcript("live memo")).unwrap();
        assert_eq!(live.source, None);

        let fetched = store.get(record.id).unwrap();
        assert_eq!(fetched.source.as_deref(), Some("/home/user/memo.wav"));
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let store = TranscriptStore::open_in_memory().unwrap();
        let err = store.get(42).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(42)));
    }

    #[test]
    fn test_list_newest_first() {
        let store = TranscriptStore::open_in_memory().unwrap();

        let a = store.create(&new_transcript("first")).unwrap();
        let b = store.create(&new_transcript("second")).unwrap();
        let c = store.create(&new_transcript("third")).unwrap();

        let records = store.list(None).unwrap();
        assert_eq!(
            records.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![c.id, b.id, a.id]
        );
    }

    #[test]
    fn test_list_limit() {
        let store = TranscriptStore::open_in_memory().unwrap();
        for i in 0..5 {
            store.create(&new_transcript(&format!("memo {}", i))).unwrap();
        }

        assert_eq!(store.list(Some(2)).unwrap().len(), 2);
        assert_eq!(store.list(None).unwrap().len(), 5);
        assert_eq!(store.count().unwrap(), 5);
    }

    #[test]
    fn test_delete() {
        let store = TranscriptStore::open_in_memory().unwrap();
        let record = store.create(&new_transcript("doomed")).unwrap();

        store.delete(record.id).unwrap();
        assert!(matches!(
            store.get(record.id),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.delete(record.id),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_set_summary() {
        let store = TranscriptStore::open_in_memory().unwrap();
        let record = store.create(&new_transcript("memo")).unwrap();

        let updated = store.set_summary(record.id, "short version").unwrap();
        assert_eq!(updated.summary.as_deref(), Some("short version"));
        assert!(updated.updated_at >= record.updated_at);

        assert!(matches!(
            store.set_summary(999, "nope"),
            Err(StoreError::NotFound(999))
        ));
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("nested").join("transcripts.db");

        let store = TranscriptStore::open(&db_path).unwrap();
        store.create(&new_transcript("persisted")).unwrap();
        drop(store);

        // Reopen and confirm the data survived
        let store = TranscriptStore::open(&db_path).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_migration_from_v1() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("transcripts.db");

        // Build a version 1 database by hand
        {
            let conn = Connection::open(&db_path).unwrap();
            conn.execute_batch(
                r#"
                CREATE TABLE meta (key TEXT PRIMARY KEY, value TEXT NOT NULL);
                INSERT INTO meta(key, value) VALUES('schema_version', '1');
                CREATE TABLE transcripts (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    transcript TEXT NOT NULL,
                    summary TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
                INSERT INTO transcripts(title, transcript, created_at, updated_at)
                VALUES('old memo', 'old body', '2025-01-01T00:00:00+00:00', '2025-01-01T00:00:00+00:00');
                "#,
            )
            .unwrap();
        }

        let store = TranscriptStore::open(&db_path).unwrap();

        // The old row picks up the column defaults
        let records = store.list(None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "old memo");
        assert_eq!(records[0].backend_used, "local");
        assert_eq!(records[0].duration_secs, 0.0);
        assert_eq!(records[0].source, None);

        // And new rows store the full shape
        let record = store.create(&new_transcript("new memo")).unwrap();
        assert_eq!(record.backend_used, "local");
        assert_eq!(record.duration_secs, 3.5);
    }

    #[test]
    fn test_migration_from_v2_adds_source_column() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("transcripts.db");

        // Build a version 2 database by hand (no source column)
        {
            let conn = Connection::open(&db_path).unwrap();
            conn.execute_batch(
                r#"
                CREATE TABLE meta (key TEXT PRIMARY KEY, value TEXT NOT NULL);
                INSERT INTO meta(key, value) VALUES('schema_version', '2');
                CREATE TABLE transcripts (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    transcript TEXT NOT NULL,
                    summary TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    backend_used TEXT NOT NULL DEFAULT 'local',
                    duration_secs REAL NOT NULL DEFAULT 0.0
                );
                INSERT INTO transcripts(title, transcript, created_at, updated_at)
                VALUES('v2 memo', 'v2 body', '2025-06-01T00:00:00+00:00', '2025-06-01T00:00:00+00:00');
                "#,
            )
            .unwrap();
        }

        let store = TranscriptStore::open(&db_path).unwrap();

        let records = store.list(None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source, None);

        let record = store
            .create(&NewTranscript {
                source: Some("/tmp/upgraded.wav".to_string()),
                ..new_transcript("v3 memo")
            })
            .unwrap();
        assert_eq!(record.source.as_deref(), Some("/tmp/upgraded.wav"));
    }

    #[test]
    fn test_newer_schema_rejected() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("transcripts.db");

        {
            let conn = Connection::open(&db_path).unwrap();
            conn.execute_batch(
                r#"
                CREATE TABLE meta (key TEXT PRIMARY KEY, value TEXT NOT NULL);
                INSERT INTO meta(key, value) VALUES('schema_version', '99');
                "#,
            )
            .unwrap();
        }

        let err = TranscriptStore::open(&db_path).unwrap_err();
        assert!(matches!(err, StoreError::Migration { version: 99, .. }));
    }
}
