//! External action invocation.
//!
//! Every dispatch runs the rule's command once, blocking until it exits. The
//! child inherits stdin/stdout/stderr and the current process environment,
//! extended with:
//!
//! | Variable          | Value                                 |
//! |-------------------|---------------------------------------|
//! | `FILE_PATH`       | path of the changed file              |
//! | `RULE_NAME`       | name of the rule that matched         |
//! | `EVENT_TYPE`      | event kind (`change`)                 |
//! | `OUTPUT_SUFFIXES` | the rule's outputs, comma-joined      |
//!
//! followed by the rule's own `env` entries after placeholder expansion.
//! Arguments are expanded the same way. The dispatcher never retries.

use std::fmt;
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use crate::config::Rule;
use crate::error::{LauncherError, Result};
use crate::template::TemplateContext;

// ---------------------------------------------------------------------------
// EventKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Change,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Change => "change",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// CommandRunner
// ---------------------------------------------------------------------------

/// A fully expanded command ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Variables added on top of the inherited environment, in order.
    pub env: Vec<(String, String)>,
}

/// How a finished command exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    pub success: bool,
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

impl From<ExitStatus> for ExitInfo {
    fn from(status: ExitStatus) -> Self {
        Self {
            success: status.success(),
            code: status.code(),
        }
    }
}

/// Capability to execute an [`Invocation`]. Launch failures are errors;
/// a non-zero exit is reported through [`ExitInfo`].
pub trait CommandRunner {
    fn execute(&self, invocation: &Invocation) -> Result<ExitInfo>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for &T {
    fn execute(&self, invocation: &Invocation) -> Result<ExitInfo> {
        (**self).execute(invocation)
    }
}

/// Runs invocations as child processes attached to the caller's stdio.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn execute(&self, invocation: &Invocation) -> Result<ExitInfo> {
        let status = Command::new(&invocation.program)
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|source| LauncherError::ActionSpawn {
                program: invocation.program.clone(),
                source,
            })?;
        Ok(status.into())
    }
}

// ---------------------------------------------------------------------------
// ActionDispatcher
// ---------------------------------------------------------------------------

/// Result of one dispatch. `duration` is measured whether or not it failed.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub duration: Duration,
    pub result: Result<()>,
}

pub struct ActionDispatcher<R = ProcessRunner> {
    runner: R,
}

impl Default for ActionDispatcher<ProcessRunner> {
    fn default() -> Self {
        Self::new(ProcessRunner)
    }
}

impl<R: CommandRunner> ActionDispatcher<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn dispatch(&self, rule: &Rule, path: &str, event: EventKind) -> DispatchOutcome {
        let invocation = build_invocation(rule, path, event);
        let start = Instant::now();
        let result = self
            .runner
            .execute(&invocation)
            .and_then(|exit| check_exit(&invocation.program, exit));
        DispatchOutcome {
            duration: start.elapsed(),
            result,
        }
    }
}

pub fn build_invocation(rule: &Rule, path: &str, event: EventKind) -> Invocation {
    let outputs = rule.joined_outputs();
    let ctx = TemplateContext {
        path,
        rule: &rule.name,
        event: event.as_str(),
        outputs: &outputs,
    };

    let mut env = vec![
        ("FILE_PATH".to_string(), path.to_string()),
        ("RULE_NAME".to_string(), rule.name.clone()),
        ("EVENT_TYPE".to_string(), event.as_str().to_string()),
        ("OUTPUT_SUFFIXES".to_string(), outputs.clone()),
    ];
    env.extend(rule.env.iter().map(|(k, v)| (k.clone(), ctx.expand(v))));

    Invocation {
        program: rule.action.command.clone(),
        args: rule.action.args.iter().map(|a| ctx.expand(a)).collect(),
        env,
    }
}

fn check_exit(program: &str, exit: ExitInfo) -> Result<()> {
    if exit.success {
        return Ok(());
    }
    let status = match exit.code {
        Some(code) => format!("exited with status {code}"),
        None => "was terminated by a signal".to_string(),
    };
    Err(LauncherError::ActionFailed {
        program: program.to_string(),
        status,
    })
}
