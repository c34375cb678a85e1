//! SQLite-backed counters.
//!
//! One row per counter key. A reservation's minute and day rows are written
//! in a single transaction, so the database never holds only half of a
//! reservation.

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use tracing::{debug, warn};

use super::{CounterStore, StoreKey, WindowRecord};
use crate::error::StoreError;
use crate::persistence::ensure_dir;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS window_counters (
    key          TEXT PRIMARY KEY,
    window_start TEXT NOT NULL,
    count        INTEGER NOT NULL
);
";

/// Counter store backed by a SQLite database file.
#[derive(Debug)]
pub struct SqliteCounterStore {
    /// One connection for all keys; writes to different keys serialize here.
    conn: Mutex<Connection>,
}

impl SqliteCounterStore {
    /// Opens (and creates if needed) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the schema created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_dir(parent)?;
        }

        let conn = Connection::open(path)?;
        // journal_mode returns a row, so it cannot go through execute().
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        conn.execute_batch(SCHEMA)?;

        debug!(path = %path.display(), journal_mode = %mode, "Opened SQLite counter store");
        Ok(Self::from_connection(conn))
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn parse_row(key: &str, start: &str, count: i64) -> Result<(StoreKey, WindowRecord), StoreError> {
        let key: StoreKey = key.parse()?;
        let window_start = DateTime::parse_from_rfc3339(start)
            .map_err(|e| StoreError::Parse(format!("{key}: {e}")))?
            .with_timezone(&Utc);
        let count = u32::try_from(count).map_err(|e| StoreError::Parse(format!("{key}: {e}")))?;
        Ok((key, WindowRecord { window_start, count }))
    }
}

impl CounterStore for SqliteCounterStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn load_all(&self) -> Result<Vec<(StoreKey, WindowRecord)>, StoreError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stmt = conn.prepare("SELECT key, window_start, count FROM window_counters")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (key, start, count) = row?;
            match Self::parse_row(&key, &start, count) {
                Ok(record) => records.push(record),
                Err(e) => warn!(key = %key, error = %e, "Skipping unreadable counter row"),
            }
        }

        debug!(count = records.len(), "Loaded counters from SQLite");
        Ok(records)
    }

    fn put(&self, records: &[(StoreKey, WindowRecord)]) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO window_counters (key, window_start, count) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                     window_start = excluded.window_start,
                     count = excluded.count",
            )?;
            for (key, record) in records {
                stmt.execute(params![
                    key.to_string(),
                    record.window_start.to_rfc3339(),
                    i64::from(record.count)
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn remove(&self, key: &StoreKey) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.execute(
            "DELETE FROM window_counters WHERE key = ?1",
            params![key.to_string()],
        )?;
        Ok(())
    }

    fn flush(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        // In-memory databases have no WAL; the checkpoint is a no-op there.
        conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        Ok(())
    }
}
