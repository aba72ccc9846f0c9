use crate::error::{LauncherError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
pub const DEFAULT_HISTORY_DIR: &str = "data";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

impl ConfigWarning {
    fn error(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Error,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Warning,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// HistoryConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryBackend {
    /// Version-controlled SQL database driven through the `dolt` CLI.
    #[default]
    Dolt,
    /// Embedded database file inside the history directory.
    Sqlite,
}

impl HistoryBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            HistoryBackend::Dolt => "dolt",
            HistoryBackend::Sqlite => "sqlite",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_dir")]
    pub dir: PathBuf,
    #[serde(default)]
    pub backend: HistoryBackend,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_history_dir() -> PathBuf {
    PathBuf::from(DEFAULT_HISTORY_DIR)
}

fn default_enabled() -> bool {
    true
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            dir: default_history_dir(),
            backend: HistoryBackend::default(),
            enabled: default_enabled(),
        }
    }
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    /// Roots to scan, in order.
    pub paths: Vec<PathBuf>,
    /// Glob every matched file must satisfy; absent or empty matches everything.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    pub action: ActionConfig,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl Rule {
    /// The include pattern, with an empty string treated as absent.
    pub fn include_pattern(&self) -> Option<&str> {
        self.include.as_deref().filter(|p| !p.is_empty())
    }

    /// Outputs joined the way they are handed to actions and history.
    pub fn joined_outputs(&self) -> String {
        self.outputs.join(",")
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default, alias = "dolt")]
    pub history: HistoryConfig,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

fn default_version() -> u32 {
    1
}

impl Config {
    /// Read, parse, and validate a config file. Any error-level finding
    /// from [`Config::validate`] fails the load.
    pub fn load(path: &Path) -> Result<Self> {
        let cfg = Self::load_unchecked(path)?;
        let errors: Vec<String> = cfg
            .validate()
            .into_iter()
            .filter(|w| w.level == WarnLevel::Error)
            .map(|w| w.message)
            .collect();
        if !errors.is_empty() {
            return Err(LauncherError::InvalidConfig(errors.join("; ")));
        }
        Ok(cfg)
    }

    /// Read and parse without validating, for callers that report findings.
    pub fn load_unchecked(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|source| LauncherError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&data)
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        let mut cfg: Config = serde_yaml::from_str(data)?;
        if cfg.history.dir.as_os_str().is_empty() {
            cfg.history.dir = default_history_dir();
        }
        Ok(cfg)
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.rules.is_empty() {
            warnings.push(ConfigWarning::error("at least one rule is required"));
        }

        let mut seen = HashSet::new();
        for (i, rule) in self.rules.iter().enumerate() {
            let label = if rule.name.is_empty() {
                warnings.push(ConfigWarning::error(format!("rule #{} has no name", i + 1)));
                format!("#{}", i + 1)
            } else {
                if !seen.insert(rule.name.as_str()) {
                    warnings.push(ConfigWarning::error(format!(
                        "duplicate rule name '{}'",
                        rule.name
                    )));
                }
                rule.name.clone()
            };

            if rule.paths.is_empty() {
                warnings.push(ConfigWarning::error(format!(
                    "rule '{label}' has no paths"
                )));
            }
            if rule.action.command.trim().is_empty() {
                warnings.push(ConfigWarning::error(format!(
                    "rule '{label}' has an empty action command"
                )));
            }

            let patterns = rule
                .include_pattern()
                .into_iter()
                .chain(rule.exclude.iter().map(String::as_str));
            for pattern in patterns {
                if let Err(e) = crate::matcher::compile(pattern) {
                    warnings.push(ConfigWarning::error(format!("rule '{label}': {e}")));
                }
            }

            for root in &rule.paths {
                if !root.exists() {
                    warnings.push(ConfigWarning::warning(format!(
                        "rule '{label}' path {} does not exist",
                        root.display()
                    )));
                }
            }
        }

        if !self.history.enabled {
            warnings.push(ConfigWarning::warning(
                "history is disabled: every matching file is processed on every scan",
            ));
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
rules:
  - name: blog
    paths: [docs]
    include: "*.md"
    action:
      command: echo
      args: ["{path}"]
"#;

    fn has_error(cfg: &Config, needle: &str) -> bool {
        cfg.validate()
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains(needle))
    }

    #[test]
    fn defaults_applied() {
        let cfg = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(cfg.version, 1);
        assert_eq!(cfg.history.dir, PathBuf::from("data"));
        assert_eq!(cfg.history.backend, HistoryBackend::Dolt);
        assert!(cfg.history.enabled);
        let rule = &cfg.rules[0];
        assert!(rule.exclude.is_empty());
        assert!(rule.env.is_empty());
        assert_eq!(rule.include_pattern(), Some("*.md"));
    }

    #[test]
    fn dolt_key_is_accepted_as_history() {
        let yaml = format!("dolt:\n  dir: state\n{MINIMAL}");
        let cfg = Config::from_yaml(&yaml).unwrap();
        assert_eq!(cfg.history.dir, PathBuf::from("state"));
    }

    #[test]
    fn empty_history_dir_falls_back_to_default() {
        let yaml = format!("history:\n  dir: \"\"\n  backend: sqlite\n{MINIMAL}");
        let cfg = Config::from_yaml(&yaml).unwrap();
        assert_eq!(cfg.history.dir, PathBuf::from("data"));
        assert_eq!(cfg.history.backend, HistoryBackend::Sqlite);
    }

    #[test]
    fn empty_include_means_match_all() {
        let yaml = r#"
rules:
  - name: all
    paths: [docs]
    include: ""
    action: { command: "true" }
"#;
        let cfg = Config::from_yaml(yaml).unwrap();
        assert_eq!(cfg.rules[0].include_pattern(), None);
    }

    #[test]
    fn validate_requires_rules() {
        let cfg = Config::from_yaml("version: 1\n").unwrap();
        assert!(has_error(&cfg, "at least one rule"));
    }

    #[test]
    fn validate_rule_fields() {
        let yaml = r#"
rules:
  - name: ""
    paths: []
    action: { command: " " }
"#;
        let cfg = Config::from_yaml(yaml).unwrap();
        assert!(has_error(&cfg, "has no name"));
        assert!(has_error(&cfg, "has no paths"));
        assert!(has_error(&cfg, "empty action command"));
    }

    #[test]
    fn validate_duplicate_names() {
        let yaml = r#"
rules:
  - name: twin
    paths: [a]
    action: { command: "true" }
  - name: twin
    paths: [b]
    action: { command: "true" }
"#;
        let cfg = Config::from_yaml(yaml).unwrap();
        assert!(has_error(&cfg, "duplicate rule name 'twin'"));
    }

    #[test]
    fn validate_rejects_recursive_and_broken_globs() {
        let yaml = r#"
rules:
  - name: globs
    paths: [docs]
    include: "**/*.md"
    exclude: ["[unclosed"]
    action: { command: "true" }
"#;
        let cfg = Config::from_yaml(yaml).unwrap();
        assert!(has_error(&cfg, "'**/*.md'"));
        assert!(has_error(&cfg, "'[unclosed'"));
    }

    #[test]
    fn validate_warns_on_missing_root_and_disabled_history() {
        let yaml = r#"
history:
  enabled: false
rules:
  - name: ghost
    paths: [/definitely/not/here]
    action: { command: "true" }
"#;
        let cfg = Config::from_yaml(yaml).unwrap();
        let warnings = cfg.validate();
        assert!(warnings.iter().all(|w| w.level == WarnLevel::Warning));
        assert!(warnings.iter().any(|w| w.message.contains("does not exist")));
        assert!(warnings.iter().any(|w| w.message.contains("history is disabled")));
    }

    #[test]
    fn load_fails_on_invalid_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "rules: []\n").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, LauncherError::InvalidConfig(_)), "{err}");
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = Config::load(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, LauncherError::ConfigRead { .. }), "{err}");
    }

    #[test]
    fn env_is_ordered() {
        let yaml = r#"
rules:
  - name: env
    paths: [docs]
    action: { command: "true" }
    env:
      ZED: "1"
      ALPHA: "2"
"#;
        let cfg = Config::from_yaml(yaml).unwrap();
        let keys: Vec<_> = cfg.rules[0].env.keys().cloned().collect();
        assert_eq!(keys, vec!["ALPHA".to_string(), "ZED".to_string()]);
    }
}
