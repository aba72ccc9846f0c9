//! Decides whether a matched file needs another dispatch for a rule.
//!
//! A file is processed when the rule has never processed it, or when its
//! modification time (whole seconds) is strictly later than the recorded one.
//! Two changes inside the same second as the recorded value are therefore
//! seen as one.

use crate::error::Result;
use crate::history::HistoryStore;

pub struct ChangeDetector<'a> {
    history: &'a HistoryStore,
}

impl<'a> ChangeDetector<'a> {
    pub fn new(history: &'a HistoryStore) -> Self {
        Self { history }
    }

    /// A failed lookup is returned as an error, never treated as "changed".
    pub fn should_process(
        &self,
        path: &str,
        rule: &str,
        current_mtime_unix: i64,
    ) -> Result<bool> {
        let last = self.history.get_state(path, rule)?;
        Ok(is_newer(last, current_mtime_unix))
    }
}

pub fn is_newer(last_processed: Option<i64>, current: i64) -> bool {
    match last_processed {
        None => true,
        Some(last) => current > last,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LauncherError;
    use crate::history::{Event, SqliteStore, Store};

    #[test]
    fn comparison_is_strictly_greater() {
        assert!(is_newer(None, 0));
        assert!(is_newer(Some(100), 101));
        assert!(!is_newer(Some(100), 100));
        assert!(!is_newer(Some(100), 99));
    }

    #[test]
    fn uses_recorded_state_per_rule() {
        let store = SqliteStore::in_memory().unwrap();
        store.upsert_state("/docs/a.md", "blog", 100).unwrap();
        let history = HistoryStore::with_store(store);
        let detector = ChangeDetector::new(&history);

        assert!(!detector.should_process("/docs/a.md", "blog", 100).unwrap());
        assert!(detector.should_process("/docs/a.md", "blog", 150).unwrap());
        assert!(detector.should_process("/docs/a.md", "archive", 100).unwrap());
    }

    #[test]
    fn disabled_history_always_processes() {
        let history = HistoryStore::disabled();
        let detector = ChangeDetector::new(&history);
        assert!(detector.should_process("/docs/a.md", "blog", 0).unwrap());
    }

    #[test]
    fn lookup_failure_is_not_a_change() {
        struct FailingLookup;
        impl Store for FailingLookup {
            fn get_state(&self, _: &str, _: &str) -> Result<Option<i64>> {
                Err(LauncherError::History("unavailable".into()))
            }
            fn upsert_state(&self, _: &str, _: &str, _: i64) -> Result<()> {
                Ok(())
            }
            fn record_event(&self, _: &Event) -> Result<()> {
                Ok(())
            }
        }

        let history = HistoryStore::with_store(FailingLookup);
        let detector = ChangeDetector::new(&history);
        assert!(detector.should_process("/docs/a.md", "blog", 1).is_err());
    }
}
