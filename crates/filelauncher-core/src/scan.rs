//! One full pass over every rule.
//!
//! Rules run in configuration order, roots in rule order, files in directory
//! order. Each matched, changed file is dispatched and its event recorded
//! before the next file is considered. State advances only after a
//! successful dispatch, so a crash in between means the file is dispatched
//! again on the next scan rather than never.
//!
//! Every rule's globs are compiled before the first dispatch; a bad glob
//! aborts the scan before anything runs. Walk, stat, lookup, dispatch, and
//! history-write failures are logged and counted, and the scan moves on to
//! the next file. Paths that are not valid UTF-8 cannot be keyed or passed
//! to an action faithfully, so they are skipped as per-file errors.

use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::Rule;
use crate::detector::ChangeDetector;
use crate::dispatch::{ActionDispatcher, CommandRunner, EventKind, ProcessRunner};
use crate::error::Result;
use crate::history::{Event, HistoryStore};
use crate::matcher::{clean, RuleMatcher};

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Per-rule counters for one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleReport {
    pub rule: String,
    /// Files seen under the rule's roots.
    pub visited: u64,
    pub matched: u64,
    /// Matched but not modified since the last successful dispatch.
    pub unchanged: u64,
    pub dispatched: u64,
    pub failed: u64,
    /// Walk, stat, lookup, and non-UTF-8 path errors; the affected entries
    /// were skipped.
    pub errors: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub history_enabled: bool,
    pub rules: Vec<RuleReport>,
}

impl ScanReport {
    pub fn dispatched(&self) -> u64 {
        self.rules.iter().map(|r| r.dispatched).sum()
    }

    pub fn failed(&self) -> u64 {
        self.rules.iter().map(|r| r.failed).sum()
    }
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

pub struct Scanner<'a, R = ProcessRunner> {
    history: &'a HistoryStore,
    dispatcher: ActionDispatcher<R>,
}

impl<'a, R: CommandRunner> Scanner<'a, R> {
    pub fn new(history: &'a HistoryStore, dispatcher: ActionDispatcher<R>) -> Self {
        Self {
            history,
            dispatcher,
        }
    }

    pub fn run<'r>(&self, rules: impl IntoIterator<Item = &'r Rule>) -> Result<ScanReport> {
        let mut report = ScanReport {
            history_enabled: self.history.is_enabled(),
            rules: Vec::new(),
        };
        let compiled = rules
            .into_iter()
            .map(|rule| RuleMatcher::new(rule).map(|matcher| (rule, matcher)))
            .collect::<Result<Vec<_>>>()?;
        for (rule, matcher) in &compiled {
            report.rules.push(self.scan_rule(rule, matcher));
        }
        Ok(report)
    }

    fn scan_rule(&self, rule: &Rule, matcher: &RuleMatcher) -> RuleReport {
        let mut report = RuleReport {
            rule: rule.name.clone(),
            ..RuleReport::default()
        };
        for root in &rule.paths {
            let root = clean(root);
            for entry in WalkDir::new(&root) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!(root = %root.display(), "walk error: {e}");
                        report.errors += 1;
                        continue;
                    }
                };
                if entry.file_type().is_dir() {
                    continue;
                }
                self.process_file(rule, matcher, &entry, &mut report);
            }
        }
        report
    }

    fn process_file(
        &self,
        rule: &Rule,
        matcher: &RuleMatcher,
        entry: &DirEntry,
        report: &mut RuleReport,
    ) {
        report.visited += 1;
        let path = clean(entry.path());
        if !matcher.matches(&path) {
            return;
        }
        report.matched += 1;
        let Some(path_str) = path.to_str() else {
            warn!(
                rule = %rule.name,
                path = %path.display(),
                "skipping path that is not valid UTF-8"
            );
            report.errors += 1;
            return;
        };

        let mtime = match modified_unix(entry) {
            Ok(mtime) => mtime,
            Err(e) => {
                warn!(path = %path_str, "stat error: {e}");
                report.errors += 1;
                return;
            }
        };

        match ChangeDetector::new(self.history).should_process(path_str, &rule.name, mtime) {
            Ok(true) => {}
            Ok(false) => {
                debug!(rule = %rule.name, path = %path_str, "unchanged");
                report.unchanged += 1;
                return;
            }
            Err(e) => {
                warn!(path = %path_str, "history lookup failed: {e}");
                report.errors += 1;
                return;
            }
        }

        info!(rule = %rule.name, path = %path_str, "rule matched");
        let event_type = EventKind::Change;
        let outcome = self.dispatcher.dispatch(rule, path_str, event_type);
        self.history.record_event(&Event::from_dispatch(
            &rule.name,
            &rule.outputs,
            path_str,
            event_type,
            &outcome,
        ));

        if let Err(e) = &outcome.result {
            warn!(rule = %rule.name, path = %path_str, "action failed: {e}");
            report.failed += 1;
            return;
        }
        report.dispatched += 1;

        if let Err(e) = self.history.upsert_state(path_str, &rule.name, mtime) {
            warn!(path = %path_str, "history state update failed: {e}");
        }
    }
}

fn modified_unix(entry: &DirEntry) -> std::io::Result<i64> {
    let modified: SystemTime = entry.metadata().map_err(std::io::Error::from)?.modified()?;
    Ok(DateTime::<Utc>::from(modified).timestamp())
}

/// Convenience for callers that only need the default process runner.
pub fn scan_once<'r>(
    history: &HistoryStore,
    rules: impl IntoIterator<Item = &'r Rule>,
) -> Result<ScanReport> {
    Scanner::new(history, ActionDispatcher::default()).run(rules)
}
