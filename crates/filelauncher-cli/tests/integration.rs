#![allow(deprecated)]
#![cfg(unix)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};
use tempfile::TempDir;

fn filelauncher(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("filelauncher").unwrap();
    cmd.current_dir(dir.path())
        .env("FILELAUNCHER_CONFIG", dir.path().join("config.yaml"))
        .env("RUST_LOG", "warn");
    cmd
}

fn log_path(dir: &TempDir) -> PathBuf {
    dir.path().join("dispatch.log")
}

fn dispatch_lines(dir: &TempDir) -> Vec<String> {
    std::fs::read_to_string(log_path(dir))
        .unwrap_or_default()
        .lines()
        .map(String::from)
        .collect()
}

/// Writes a config with one sqlite-backed rule over `docs/` whose action
/// appends its environment to `dispatch.log` and exits with `exit_code`.
fn write_config(dir: &TempDir, backend: &str, exit_code: i32) {
    std::fs::create_dir_all(dir.path().join("docs")).unwrap();
    let yaml = format!(
        r#"
history:
  dir: {history}
  backend: {backend}
rules:
  - name: blog
    paths: [{docs}]
    include: "*.md"
    exclude: ["*.draft.md"]
    outputs: [medium, x]
    action:
      command: /bin/sh
      args: ["-c", 'echo "$FILE_PATH $RULE_NAME $EVENT_TYPE $OUTPUT_SUFFIXES $ARG" >> "$LOG"; exit {exit_code}', "{{path}}"]
    env:
      LOG: {log}
      ARG: "rule={{rule}}"
"#,
        history = dir.path().join("history").display(),
        docs = dir.path().join("docs").display(),
        log = log_path(dir).display(),
    );
    std::fs::write(dir.path().join("config.yaml"), yaml).unwrap();
}

fn write_doc(dir: &TempDir, name: &str, mtime: u64) -> PathBuf {
    let path = dir.path().join("docs").join(name);
    std::fs::write(&path, "# post\n").unwrap();
    touch(&path, mtime);
    path
}

fn touch(path: &Path, secs: u64) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}

fn scan_json(dir: &TempDir, extra: &[&str]) -> serde_json::Value {
    let output = filelauncher(dir)
        .arg("--json")
        .arg("scan")
        .args(extra)
        .output()
        .unwrap();
    assert!(output.status.success(), "scan failed: {output:?}");
    serde_json::from_slice(&output.stdout).unwrap()
}

// ---------------------------------------------------------------------------
// filelauncher scan
// ---------------------------------------------------------------------------

#[test]
fn scan_dispatches_once_until_file_changes() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "sqlite", 0);
    let doc = write_doc(&dir, "a.md", 100);
    write_doc(&dir, "notes.txt", 100);
    write_doc(&dir, "wip.draft.md", 100);

    filelauncher(&dir).assert().success();
    assert_eq!(
        dispatch_lines(&dir),
        vec![format!("{} blog change medium,x rule=blog", doc.display())]
    );
    assert!(dir.path().join("history/history.sqlite3").exists());

    filelauncher(&dir).arg("scan").assert().success();
    assert_eq!(dispatch_lines(&dir).len(), 1, "unchanged file must not dispatch");

    touch(&doc, 150);
    filelauncher(&dir).arg("scan").assert().success();
    assert_eq!(dispatch_lines(&dir).len(), 2);
}

#[test]
fn scan_json_reports_counts() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "sqlite", 0);
    write_doc(&dir, "a.md", 100);
    write_doc(&dir, "b.md", 100);

    let report = scan_json(&dir, &[]);
    assert_eq!(report["history_enabled"], true);
    assert_eq!(report["rules"][0]["rule"], "blog");
    assert_eq!(report["rules"][0]["matched"], 2);
    assert_eq!(report["rules"][0]["dispatched"], 2);

    let report = scan_json(&dir, &[]);
    assert_eq!(report["rules"][0]["unchanged"], 2);
    assert_eq!(report["rules"][0]["dispatched"], 0);
}

#[test]
fn failing_action_does_not_fail_the_scan_and_is_retried() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "sqlite", 3);
    write_doc(&dir, "a.md", 100);

    let report = scan_json(&dir, &[]);
    assert_eq!(report["rules"][0]["failed"], 1);
    let report = scan_json(&dir, &[]);
    assert_eq!(report["rules"][0]["failed"], 1);
    assert_eq!(dispatch_lines(&dir).len(), 2);
}

#[test]
fn no_history_dispatches_every_time() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "sqlite", 0);
    write_doc(&dir, "a.md", 100);

    let report = scan_json(&dir, &["--no-history"]);
    assert_eq!(report["history_enabled"], false);
    scan_json(&dir, &["--no-history"]);
    assert_eq!(dispatch_lines(&dir).len(), 2);
    assert!(!dir.path().join("history").exists());
}

#[test]
fn missing_dolt_binary_degrades_instead_of_failing() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "dolt", 0);
    write_doc(&dir, "a.md", 100);
    let empty_path = dir.path().join("empty-bin");
    std::fs::create_dir_all(&empty_path).unwrap();

    let output = filelauncher(&dir)
        .env("PATH", &empty_path)
        .args(["--json", "scan"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["history_enabled"], false);
    assert_eq!(report["rules"][0]["dispatched"], 1);
}

#[test]
fn rust_log_overrides_the_default_level() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "sqlite", 0);
    write_doc(&dir, "a.md", 100);

    // The harness sets RUST_LOG=warn: no info lines from the scan.
    filelauncher(&dir)
        .arg("scan")
        .assert()
        .success()
        .stderr(predicate::str::contains("rule matched").not());

    filelauncher(&dir)
        .env("RUST_LOG", "debug")
        .arg("scan")
        .assert()
        .success()
        .stderr(predicate::str::contains("unchanged"));

    touch(&dir.path().join("docs/a.md"), 150);
    filelauncher(&dir)
        .env_remove("RUST_LOG")
        .arg("scan")
        .assert()
        .success()
        .stderr(predicate::str::contains("rule matched"));
}

#[test]
fn unknown_rule_filter_fails() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "sqlite", 0);

    filelauncher(&dir)
        .args(["scan", "--rule", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown rule 'nope'"));
}

#[test]
fn missing_config_is_fatal() {
    let dir = TempDir::new().unwrap();

    filelauncher(&dir)
        .arg("scan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"));
}

#[test]
fn invalid_config_is_fatal() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("config.yaml"), "rules: []\n").unwrap();

    filelauncher(&dir)
        .arg("scan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least one rule is required"));
}

// ---------------------------------------------------------------------------
// filelauncher check
// ---------------------------------------------------------------------------

#[test]
fn check_accepts_valid_config() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "sqlite", 0);

    filelauncher(&dir)
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("Config is valid: 1 rule(s)"));
}

#[test]
fn check_reports_every_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("config.yaml"),
        r#"
rules:
  - name: dup
    paths: []
    include: "**/*.md"
    action: { command: "" }
  - name: dup
    paths: [docs]
    action: { command: "true" }
"#,
    )
    .unwrap();

    filelauncher(&dir)
        .arg("check")
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error] rule 'dup' has no paths"))
        .stdout(predicate::str::contains("empty action command"))
        .stdout(predicate::str::contains("recursive '**' is not supported"))
        .stdout(predicate::str::contains("duplicate rule name 'dup'"))
        .stderr(predicate::str::contains("config validation found errors"));
}

#[test]
fn check_json_lists_warnings() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("config.yaml"),
        "history:\n  enabled: false\nrules:\n  - name: r\n    paths: [missing]\n    action: { command: echo }\n",
    )
    .unwrap();

    let output = filelauncher(&dir)
        .args(["check", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["rules"], 1);
    assert_eq!(value["history"]["enabled"], false);
    assert_eq!(value["warnings"].as_array().unwrap().len(), 2);
}
