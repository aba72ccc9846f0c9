//! Rule-to-path matching.
//!
//! A path matches a rule when it lies under one of the rule's roots, passes
//! the include glob, and hits none of the exclude globs under that root.
//! Patterns without a path separator are matched against the file name only;
//! patterns with one are matched against the path relative to the root.
//!
//! Globs follow shell semantics (`*`, `?`, `[...]`) where `*` never crosses a
//! separator. Recursive `**` is not supported and is rejected when compiling.

use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};

use glob::{MatchOptions, Pattern};
use tracing::trace;

use crate::config::Rule;
use crate::error::{LauncherError, Result};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Compile a single rule glob.
pub fn compile(pattern: &str) -> Result<Pattern> {
    if pattern.contains("**") {
        return Err(LauncherError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: "recursive '**' is not supported".into(),
        });
    }
    Pattern::new(pattern).map_err(|e| LauncherError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.msg.to_string(),
    })
}

struct RuleGlob {
    pattern: Pattern,
    /// True when the pattern names directories and must see the whole relative path.
    whole_path: bool,
}

impl RuleGlob {
    fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            pattern: compile(pattern)?,
            whole_path: pattern.contains('/') || pattern.contains(MAIN_SEPARATOR),
        })
    }

    fn matches(&self, rel: &Path) -> bool {
        let candidate = if self.whole_path {
            rel.to_string_lossy()
        } else {
            rel.file_name()
                .map(|n| n.to_string_lossy())
                .unwrap_or_else(|| rel.to_string_lossy())
        };
        self.pattern.matches_with(&candidate, MATCH_OPTIONS)
    }
}

/// Compiled form of one rule's roots and include/exclude globs.
pub struct RuleMatcher {
    roots: Vec<PathBuf>,
    include: Option<RuleGlob>,
    exclude: Vec<RuleGlob>,
}

impl RuleMatcher {
    pub fn new(rule: &Rule) -> Result<Self> {
        Ok(Self {
            roots: rule.paths.iter().map(|p| clean(p)).collect(),
            include: rule.include_pattern().map(RuleGlob::new).transpose()?,
            exclude: rule
                .exclude
                .iter()
                .map(|p| RuleGlob::new(p))
                .collect::<Result<_>>()?,
        })
    }

    /// Whether the rule applies to `path`. The first root that contains the
    /// path and accepts it wins; roots that contain it but reject it fall
    /// through to the next root.
    pub fn matches(&self, path: &Path) -> bool {
        let path = clean(path);
        for root in &self.roots {
            let Some(rel) = relative_to(root, &path) else {
                continue;
            };
            if let Some(include) = &self.include {
                if !include.matches(&rel) {
                    continue;
                }
            }
            if self.exclude.iter().any(|g| g.matches(&rel)) {
                trace!(path = %path.display(), root = %root.display(), "excluded");
                continue;
            }
            return true;
        }
        false
    }
}

/// Path of `path` relative to `root`, or `None` when it lies outside.
/// When `path` is the root itself the root's own name is used.
fn relative_to(root: &Path, path: &Path) -> Option<PathBuf> {
    let rel = if root == Path::new(".") {
        if path.is_absolute() || path.starts_with("..") {
            return None;
        }
        path.to_path_buf()
    } else {
        path.strip_prefix(root).ok()?.to_path_buf()
    };
    if rel.as_os_str().is_empty() {
        return path.file_name().map(PathBuf::from);
    }
    Some(rel)
}

/// Lexically normalize a path: drop `.` segments and fold `..` into its parent.
pub fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}
