//! History backend driven through the `dolt` CLI.
//!
//! Every operation is one `dolt sql -q <statement>` invocation run inside the
//! history directory. Point lookups add `-r csv` and parse the header + rows
//! output. Values are interpolated as quoted SQL literals; see [`quote`].

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::{debug, info};

use super::{ensure_dir, Event, Store};
use crate::error::{LauncherError, Result};

const CREATE_EVENTS_TABLE: &str = "create table if not exists file_events ( \
     id bigint auto_increment primary key, \
     ts timestamp, \
     path text, \
     event text, \
     rule text, \
     outputs text, \
     status text, \
     error text, \
     duration_ms bigint \
     );";

const CREATE_STATE_TABLE: &str = "create table if not exists file_state ( \
     path varchar(768), \
     rule varchar(255), \
     last_mod_unix bigint, \
     primary key (path, rule) \
     );";

pub struct DoltStore {
    binary: PathBuf,
    dir: PathBuf,
}

impl DoltStore {
    /// Find the `dolt` binary on `PATH`.
    pub fn locate() -> Option<PathBuf> {
        which::which("dolt").ok()
    }

    /// Prepare a dolt repository in `dir`: create the directory, run
    /// `dolt init` unless `.dolt/` already exists, then create both tables.
    pub fn open(binary: PathBuf, dir: &Path) -> Result<Self> {
        ensure_dir(dir)?;
        let store = Self {
            binary,
            dir: dir.to_path_buf(),
        };
        if !dir.join(".dolt").exists() {
            info!(dir = %dir.display(), "initializing dolt repository");
            store.run(&["init"])?;
        }
        store.exec(CREATE_EVENTS_TABLE)?;
        store.exec(CREATE_STATE_TABLE)?;
        Ok(store)
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args).current_dir(&self.dir);
        cmd
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        let output = self
            .command(args)
            .output()
            .map_err(|e| LauncherError::History(format!("failed to run dolt: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let hint: String = stderr.trim().chars().take(500).collect();
            return Err(LauncherError::History(format!(
                "dolt {} failed ({}): {hint}",
                args.first().copied().unwrap_or_default(),
                output.status
            )));
        }
        Ok(output)
    }

    fn exec(&self, statement: &str) -> Result<()> {
        debug!(statement, "dolt exec");
        self.run(&["sql", "-q", statement])?;
        Ok(())
    }

    fn query_csv(&self, query: &str) -> Result<Vec<Vec<String>>> {
        debug!(query, "dolt query");
        let output = self.run(&["sql", "-q", query, "-r", "csv"])?;
        parse_csv(&output.stdout)
    }
}

impl Store for DoltStore {
    fn get_state(&self, path: &str, rule: &str) -> Result<Option<i64>> {
        let rows = self.query_csv(&select_state_sql(path, rule))?;
        state_from_rows(&rows)
    }

    fn upsert_state(&self, path: &str, rule: &str, modified_unix: i64) -> Result<()> {
        self.exec(&format!(
            "replace into file_state (path, rule, last_mod_unix) values ({}, {}, {modified_unix})",
            quote(path),
            quote(rule),
        ))
    }

    fn record_event(&self, event: &Event) -> Result<()> {
        self.exec(&insert_event_sql(event))
    }
}

// ---------------------------------------------------------------------------
// Statement builders
// ---------------------------------------------------------------------------

/// Quote `value` as a SQL string literal. Single quotes are doubled, and so
/// are backslashes, since the dialect treats backslash as an escape.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\'' => out.push_str("''"),
            '\\' => out.push_str("\\\\"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn select_state_sql(path: &str, rule: &str) -> String {
    format!(
        "select last_mod_unix from file_state where path = {} and rule = {} limit 1",
        quote(path),
        quote(rule)
    )
}

fn insert_event_sql(event: &Event) -> String {
    format!(
        "insert into file_events (ts, path, event, rule, outputs, status, error, duration_ms) \
         values ({}, {}, {}, {}, {}, {}, {}, {})",
        quote(&event.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()),
        quote(&event.path),
        quote(event.event_type.as_str()),
        quote(&event.rule_name),
        quote(&event.joined_outputs()),
        quote(event.status.as_str()),
        quote(&event.error_text),
        event.duration_ms,
    )
}

/// Interpret `select last_mod_unix ...` output: header plus at most one row.
fn state_from_rows(rows: &[Vec<String>]) -> Result<Option<i64>> {
    let Some(value) = rows.get(1).and_then(|row| row.first()) else {
        return Ok(None);
    };
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<i64>()
        .map(Some)
        .map_err(|e| LauncherError::QueryOutput(format!("last_mod_unix '{value}': {e}")))
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// Parse `-r csv` output into records, header included. Records may have
/// differing lengths; blank lines are skipped. Output that is not UTF-8
/// is rejected.
pub fn parse_csv(output: &[u8]) -> Result<Vec<Vec<String>>> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(output)
        .records()
        .map(|record| {
            record
                .map(|r| r.iter().map(str::to_string).collect())
                .map_err(|e| LauncherError::QueryOutput(format!("csv: {e}")))
        })
        .collect()
}
