//! Named build operations.
//!
//! Each operation is an ordered list of shell commands. Commands run one
//! at a time through `sh -c` in the project root; the first non-zero exit
//! stops the operation and nothing after it runs.
//!
//! # Variables
//!
//! Commands support `{var}` interpolation for `{version}`, `{tag}`,
//! `{package}` and `{dist_dir}`. Unknown placeholders are left alone.

use std::process::Command;
use std::time::Instant;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::config::Config;

/// Errors from running a task.
#[derive(Error, Debug)]
pub enum TaskError {
    /// A command exited with a non-zero status.
    #[error(
        "`{command}` failed{}",
        .exit_code.map(|c| format!(" with exit code {c}")).unwrap_or_default()
    )]
    CommandFailed {
        /// The interpolated command that failed.
        command: String,
        /// The exit code, if the process exited normally.
        exit_code: Option<i32>,
        /// Captured stderr.
        stderr: String,
    },

    /// Failed to spawn `sh`.
    #[error("failed to execute task command: {0}")]
    Exec(#[from] std::io::Error),
}

/// Result alias for task operations.
pub type TaskResult<T> = Result<T, TaskError>;

/// A named build operation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum TaskName {
    /// Install dependencies.
    Deps,
    /// Static analysis and security scan.
    Lint,
    /// Rewrite sources with the formatter.
    Fmt,
    /// Style check without modifying files.
    FmtCheck,
    /// Run the test suite.
    Test,
    /// Build the distributable archive.
    Build,
    /// Upload artifacts to the package index.
    Publish,
}

impl TaskName {
    /// Every task, in the order a full pipeline would run them.
    pub const ALL: &[Self] = &[
        Self::Deps,
        Self::Lint,
        Self::Fmt,
        Self::FmtCheck,
        Self::Test,
        Self::Build,
        Self::Publish,
    ];

    /// The task's name as written on the command line and in config.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deps => "deps",
            Self::Lint => "lint",
            Self::Fmt => "fmt",
            Self::FmtCheck => "fmt-check",
            Self::Test => "test",
            Self::Build => "build",
            Self::Publish => "publish",
        }
    }

    /// Built-in commands for a Python package.
    pub fn default_commands(self) -> Vec<String> {
        let commands: &[&str] = match self {
            Self::Deps => &[
                "python -m pip install --upgrade pip",
                "pip install -r requirements.txt",
            ],
            Self::Lint => &["pylint {package}", "bandit -r {package}"],
            Self::Fmt => &["black {package}", "isort {package}"],
            Self::FmtCheck => &["black --check {package}", "isort --check-only {package}"],
            Self::Test => &["pytest"],
            Self::Build => &["python setup.py sdist --dist-dir {dist_dir}"],
            Self::Publish => &["twine upload {dist_dir}/*"],
        };
        commands.iter().map(ToString::to_string).collect()
    }

    /// Commands for this task: the config override, or the built-in list.
    pub fn commands(self, config: &Config) -> Vec<String> {
        let tasks = &config.tasks;
        let configured = match self {
            Self::Deps => &tasks.deps,
            Self::Lint => &tasks.lint,
            Self::Fmt => &tasks.fmt,
            Self::FmtCheck => &tasks.fmt_check,
            Self::Test => &tasks.test,
            Self::Build => &tasks.build,
            Self::Publish => &tasks.publish,
        };
        configured
            .clone()
            .unwrap_or_else(|| self.default_commands())
    }
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values substituted into task commands.
#[derive(Debug, Clone, Default)]
pub struct TaskContext {
    /// Current or new version (e.g., `1.2.3`).
    pub version: String,
    /// Release tag (e.g., `v1.2.3`).
    pub tag: String,
    /// Package name; `.` when not configured.
    pub package: String,
    /// Artifact directory.
    pub dist_dir: String,
}

impl TaskContext {
    /// Build a context from config and an optional known version.
    pub fn new(config: &Config, version: Option<&semver::Version>) -> Self {
        let version = version.map(ToString::to_string).unwrap_or_default();
        let tag = if version.is_empty() {
            String::new()
        } else {
            format!("v{version}")
        };
        Self {
            version,
            tag,
            package: config
                .project
                .package
                .clone()
                .unwrap_or_else(|| ".".to_string()),
            dist_dir: config.dist_dir().to_string(),
        }
    }

    /// Replace `{var}` placeholders in a command.
    pub fn interpolate(&self, command: &str) -> String {
        command
            .replace("{version}", &self.version)
            .replace("{tag}", &self.tag)
            .replace("{package}", &self.package)
            .replace("{dist_dir}", &self.dist_dir)
    }
}

/// Outcome of one workflow step (a CI job or a release phase).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum PhaseOutcome {
    /// Step completed successfully.
    Success {
        /// Description of what happened.
        message: String,
    },
    /// Step was skipped.
    Skipped {
        /// Why the step was skipped.
        reason: String,
    },
}

impl PhaseOutcome {
    /// Whether the step was skipped.
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// Result of one successful command.
#[derive(Debug, Clone, Serialize)]
pub struct CommandOutput {
    /// The interpolated command.
    pub command: String,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
    /// Wall-clock time in milliseconds.
    pub duration_ms: u64,
}

/// Run a named task with its configured commands.
#[instrument(skip(config, context), fields(%task))]
pub fn run_task(
    root: &Utf8Path,
    config: &Config,
    task: TaskName,
    context: &TaskContext,
) -> TaskResult<Vec<CommandOutput>> {
    let commands = task.commands(config);
    info!(count = commands.len(), "running task");
    run_commands(root, &commands, context)
}

/// Run commands in order, stopping at the first failure.
#[instrument(skip_all, fields(count = commands.len()))]
pub fn run_commands(
    root: &Utf8Path,
    commands: &[String],
    context: &TaskContext,
) -> TaskResult<Vec<CommandOutput>> {
    let mut outputs = Vec::with_capacity(commands.len());
    for command in commands {
        outputs.push(run_single(root, &context.interpolate(command))?);
    }
    Ok(outputs)
}

fn run_single(root: &Utf8Path, command: &str) -> TaskResult<CommandOutput> {
    debug!(%command, "running command");

    let start = Instant::now();
    let output = Command::new("sh")
        .args(["-c", command])
        .current_dir(root.as_std_path())
        .output()?;
    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    if !output.status.success() {
        return Err(TaskError::CommandFailed {
            command: command.to_string(),
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(CommandOutput {
        command: command.to_string(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        duration_ms,
    })
}
