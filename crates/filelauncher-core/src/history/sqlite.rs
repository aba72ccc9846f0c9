//! Embedded history backend.
//!
//! Stores both tables in `<dir>/history.sqlite3`. Values are bound as
//! parameters, and each write is a single statement, so no escaping or
//! explicit transactions are needed.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use super::{ensure_dir, Event, Store};
use crate::error::Result;

pub const DB_FILE: &str = "history.sqlite3";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS file_events (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    ts          TEXT NOT NULL,
    path        TEXT NOT NULL,
    event       TEXT NOT NULL,
    rule        TEXT NOT NULL,
    outputs     TEXT NOT NULL,
    status      TEXT NOT NULL,
    error       TEXT NOT NULL,
    duration_ms INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS file_state (
    path          TEXT NOT NULL,
    rule          TEXT NOT NULL,
    last_mod_unix INTEGER NOT NULL,
    PRIMARY KEY (path, rule)
);
";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open or create the database inside `dir`, creating the directory and
    /// tables if they don't already exist.
    pub fn open(dir: &Path) -> Result<Self> {
        ensure_dir(dir)?;
        Self::init(Connection::open(dir.join(DB_FILE))?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// `(path, rule, status, error)` for every logged event, oldest first.
    #[cfg(test)]
    pub(crate) fn event_rows(&self) -> Vec<(String, String, String, String)> {
        let mut stmt = self
            .conn
            .prepare("SELECT path, rule, status, error FROM file_events ORDER BY id")
            .unwrap();
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .unwrap();
        rows.map(|r| r.unwrap()).collect()
    }
}

impl Store for SqliteStore {
    fn get_state(&self, path: &str, rule: &str) -> Result<Option<i64>> {
        let value = self
            .conn
            .query_row(
                "SELECT last_mod_unix FROM file_state WHERE path = ?1 AND rule = ?2 LIMIT 1",
                params![path, rule],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn upsert_state(&self, path: &str, rule: &str, modified_unix: i64) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO file_state (path, rule, last_mod_unix) VALUES (?1, ?2, ?3)",
            params![path, rule, modified_unix],
        )?;
        Ok(())
    }

    fn record_event(&self, event: &Event) -> Result<()> {
        self.conn.execute(
            "INSERT INTO file_events (ts, path, event, rule, outputs, status, error, duration_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                event.timestamp.to_rfc3339(),
                event.path,
                event.event_type.as_str(),
                event.rule_name,
                event.joined_outputs(),
                event.status.as_str(),
                event.error_text,
                event.duration_ms,
            ],
        )?;
        Ok(())
    }
}
