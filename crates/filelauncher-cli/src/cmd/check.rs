use crate::output::print_json;
use anyhow::Context;
use filelauncher_core::config::{Config, WarnLevel};
use std::path::Path;

pub fn run(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load_unchecked(config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;
    let warnings = config.validate();

    if json {
        let value = serde_json::json!({
            "rules": config.rules.len(),
            "history": {
                "backend": config.history.backend.as_str(),
                "dir": config.history.dir,
                "enabled": config.history.enabled,
            },
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid: {} rule(s). No warnings.", config.rules.len());
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    let has_errors = warnings.iter().any(|w| w.level == WarnLevel::Error);
    if has_errors {
        anyhow::bail!("config validation found errors");
    }

    Ok(())
}
