use crate::output::{print_json, print_table};
use anyhow::Context;
use filelauncher_core::scan::scan_once;
use filelauncher_core::{Config, HistoryStore, Rule, ScanReport};
use std::path::Path;

pub fn run(
    config_path: &Path,
    rule_names: &[String],
    no_history: bool,
    json: bool,
) -> anyhow::Result<()> {
    let config = Config::load(config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;
    let rules = select_rules(&config, rule_names)?;

    let history = if no_history {
        HistoryStore::disabled()
    } else {
        HistoryStore::open(&config.history).context("failed to init history")?
    };

    let report = scan_once(&history, rules).context("scan failed")?;

    if json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }
    Ok(())
}

/// All rules in config order, or only the named ones (still in config order).
fn select_rules<'a>(config: &'a Config, names: &[String]) -> anyhow::Result<Vec<&'a Rule>> {
    if let Some(unknown) = names.iter().find(|n| config.rule(n).is_none()) {
        anyhow::bail!("unknown rule '{unknown}'");
    }
    Ok(config
        .rules
        .iter()
        .filter(|r| names.is_empty() || names.contains(&r.name))
        .collect())
}

fn print_report(report: &ScanReport) {
    if !report.history_enabled {
        println!("history disabled: every matching file was treated as changed\n");
    }
    let rows = report
        .rules
        .iter()
        .map(|r| {
            vec![
                r.rule.clone(),
                r.visited.to_string(),
                r.matched.to_string(),
                r.unchanged.to_string(),
                r.dispatched.to_string(),
                r.failed.to_string(),
                r.errors.to_string(),
            ]
        })
        .collect();
    print_table(
        &[
            "RULE",
            "VISITED",
            "MATCHED",
            "UNCHANGED",
            "DISPATCHED",
            "FAILED",
            "ERRORS",
        ],
        rows,
    );
}
