//! Storage layer for timebank.
//!
//! Implements the [`KeyValueStore`] contract on `rusqlite`. The account
//! snapshot, the settings and the sync bookkeeping each live in one row of a
//! single `kv` table.
//!
//! # Thread Safety
//!
//! [`SqliteStore`] wraps a `rusqlite::Connection`, which is `Send` but not
//! `Sync`. Share it through [`tb_core::storage::shared`], which puts it
//! behind a `Mutex`.
//!
//! # Schema
//!
//! `kv(key TEXT PRIMARY KEY, value TEXT NOT NULL, updated_at TEXT NOT NULL)`.
//! `updated_at` is RFC 3339 in UTC, so lexicographic order matches
//! chronological order.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tb_core::storage::{KeyValueStore, StorageError};
use thiserror::Error;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored `updated_at` value could not be parsed.
    #[error("invalid timestamp for key {key}: {timestamp}")]
    TimestampParse {
        key: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
}

impl From<DbError> for StorageError {
    fn from(err: DbError) -> Self {
        Self::Backend(Box::new(err))
    }
}

/// SQLite-backed key-value store.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The schema is initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init()?;
        tracing::debug!(path = %path.display(), "opened database");
        Ok(store)
    }

    /// Opens an in-memory database. Its contents vanish with the connection.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    /// Initializes the schema. Idempotent.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Result<Option<String>, DbError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Inserts or replaces `key`, stamping it with the current time.
    pub fn set_value(&self, key: &str, value: &str) -> Result<(), DbError> {
        let updated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        self.conn.execute(
            "
            INSERT INTO kv (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            ",
            params![key, value, updated_at],
        )?;
        Ok(())
    }

    pub fn remove_value(&self, key: &str) -> Result<(), DbError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// When `key` was last written, if it exists.
    pub fn updated_at(&self, key: &str) -> Result<Option<DateTime<Utc>>, DbError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT updated_at FROM kv WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|timestamp| {
            DateTime::parse_from_rfc3339(&timestamp)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|source| DbError::TimestampParse {
                    key: key.to_string(),
                    timestamp,
                    source,
                })
        })
        .transpose()
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.get_value(key)?)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        Ok(self.set_value(key, value)?)
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        Ok(self.remove_value(key)?)
    }
}
