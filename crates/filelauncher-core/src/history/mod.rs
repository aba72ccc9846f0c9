//! Dispatch history and per-(path, rule) state.
//!
//! Two tables live behind one [`Store`]:
//!
//! - `file_events`: append-only log, one row per dispatch attempt.
//! - `file_state`: last processed modification time, keyed by `(path, rule)`.
//!
//! [`HistoryStore`] wraps a store and adds the disabled mode: when no backend
//! is available, lookups report "never processed" and writes are dropped, so
//! every matching file is dispatched on every scan.

pub mod dolt;
pub mod sqlite;

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::{HistoryBackend, HistoryConfig};
use crate::dispatch::{DispatchOutcome, EventKind};
use crate::error::{LauncherError, Result};

pub use dolt::DoltStore;
pub use sqlite::SqliteStore;

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    Ok,
    Error,
}

impl EventStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EventStatus::Ok => "ok",
            EventStatus::Error => "error",
        }
    }
}

/// One dispatch attempt, as written to `file_events`.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub path: String,
    pub event_type: EventKind,
    pub rule_name: String,
    pub outputs: Vec<String>,
    pub status: EventStatus,
    /// Empty when `status` is `Ok`.
    pub error_text: String,
    pub duration_ms: i64,
}

impl Event {
    pub fn from_dispatch(
        rule_name: &str,
        outputs: &[String],
        path: &str,
        event_type: EventKind,
        outcome: &DispatchOutcome,
    ) -> Self {
        let (status, error_text) = match &outcome.result {
            Ok(()) => (EventStatus::Ok, String::new()),
            Err(e) => (EventStatus::Error, e.to_string()),
        };
        Self {
            timestamp: Utc::now(),
            path: path.to_string(),
            event_type,
            rule_name: rule_name.to_string(),
            outputs: outputs.to_vec(),
            status,
            error_text,
            duration_ms: i64::try_from(outcome.duration.as_millis()).unwrap_or(i64::MAX),
        }
    }

    pub fn joined_outputs(&self) -> String {
        self.outputs.join(",")
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Persistence capability behind [`HistoryStore`].
///
/// Each call must be a single atomic unit on the backend.
pub trait Store {
    /// Last processed modification time (unix seconds) for `(path, rule)`.
    fn get_state(&self, path: &str, rule: &str) -> Result<Option<i64>>;

    /// Insert or replace the state row for `(path, rule)`.
    fn upsert_state(&self, path: &str, rule: &str, modified_unix: i64) -> Result<()>;

    /// Append one row to the event log.
    fn record_event(&self, event: &Event) -> Result<()>;
}

// ---------------------------------------------------------------------------
// HistoryStore
// ---------------------------------------------------------------------------

pub struct HistoryStore {
    store: Option<Box<dyn Store>>,
}

impl HistoryStore {
    /// Open the configured backend.
    ///
    /// A dolt backend whose binary is not on `PATH` yields a disabled store.
    /// Failing to create the directory or the tables is an error.
    pub fn open(cfg: &HistoryConfig) -> Result<Self> {
        if !cfg.enabled {
            info!("history disabled by configuration");
            return Ok(Self::disabled());
        }
        match cfg.backend {
            HistoryBackend::Dolt => match DoltStore::locate() {
                Some(binary) => Ok(Self::with_store(DoltStore::open(binary, &cfg.dir)?)),
                None => {
                    warn!("dolt not found in PATH; history disabled");
                    Ok(Self::disabled())
                }
            },
            HistoryBackend::Sqlite => Ok(Self::with_store(SqliteStore::open(&cfg.dir)?)),
        }
    }

    pub fn with_store(store: impl Store + 'static) -> Self {
        Self {
            store: Some(Box::new(store)),
        }
    }

    pub fn disabled() -> Self {
        Self { store: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn get_state(&self, path: &str, rule: &str) -> Result<Option<i64>> {
        match &self.store {
            Some(store) => store.get_state(path, rule),
            None => Ok(None),
        }
    }

    pub fn upsert_state(&self, path: &str, rule: &str, modified_unix: i64) -> Result<()> {
        match &self.store {
            Some(store) => store.upsert_state(path, rule, modified_unix),
            None => Ok(()),
        }
    }

    /// Best effort: a failed insert is logged and otherwise ignored.
    pub fn record_event(&self, event: &Event) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.record_event(event) {
            warn!(path = %event.path, rule = %event.rule_name, "history insert failed: {e}");
        }
    }
}

/// Create the history directory, idempotent.
pub(crate) fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|source| LauncherError::HistoryDir {
        path: dir.to_path_buf(),
        source,
    })
}
