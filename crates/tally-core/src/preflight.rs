//! Preflight checks before a bump or a release.
//!
//! Validates git state, branch, tool availability and credentials.
//! Returns structured results that the CLI formats.

use std::collections::BTreeSet;

use camino::Utf8Path;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::forge::Forge;
use crate::git;
use crate::tasks::TaskName;

/// Which workflow the checks are for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PreflightScope {
    /// Version bump proposed as a pull request.
    #[default]
    Bump,
    /// Build, draft release and publish.
    Release,
}

impl PreflightScope {
    /// Tasks whose commands must be runnable.
    pub const fn tasks(self) -> &'static [TaskName] {
        match self {
            Self::Bump => &[],
            Self::Release => &[TaskName::Build, TaskName::Publish],
        }
    }
}

/// A single preflight check result.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    /// Human-readable name of the check.
    pub name: String,
    /// Whether the check passed.
    pub passed: bool,
    /// Description of the result (reason for failure, or confirmation).
    pub message: String,
}

impl CheckResult {
    fn pass(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: message.into(),
        }
    }

    fn fail(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            message: message.into(),
        }
    }
}

/// Full preflight report.
#[derive(Debug, Clone, Serialize)]
pub struct PreflightReport {
    /// The workflow checked for.
    pub scope: PreflightScope,
    /// Individual check results.
    pub checks: Vec<CheckResult>,
    /// Whether all checks passed.
    pub all_passed: bool,
}

impl PreflightReport {
    /// Messages of the failed checks, joined with `; `.
    pub fn failure_summary(&self) -> String {
        self.checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Run all preflight checks for a workflow.
#[instrument(skip(config), fields(%root))]
pub fn run_preflight(root: &Utf8Path, config: &Config, scope: PreflightScope) -> PreflightReport {
    let mut checks = Vec::new();

    let in_repo = check_git_repo(root);
    let is_repo = in_repo.passed;
    checks.push(in_repo);

    if is_repo {
        checks.push(check_clean_tree(root));
        checks.push(check_release_branch(root, config.release_branch()));
    }

    let binaries = required_binaries(config, scope);
    checks.push(check_required_tools(&binaries, |bin| {
        which::which(bin).is_ok()
    }));

    let forge = Forge::from_config(config);
    checks.push(check_env_vars("Forge token", &[forge.token_env()], env_is_set));

    if scope == PreflightScope::Release {
        checks.push(check_env_vars(
            "Index credentials",
            &config.index_credential_envs(),
            env_is_set,
        ));
    }

    let all_passed = checks.iter().all(|c| c.passed);
    debug!(all_passed, check_count = checks.len(), "preflight complete");

    PreflightReport {
        scope,
        checks,
        all_passed,
    }
}

/// Binaries a workflow shells out to: `git`, `gh`, and the first word of
/// every command in the tasks it runs.
pub fn required_binaries(config: &Config, scope: PreflightScope) -> BTreeSet<String> {
    let mut bins: BTreeSet<String> = ["git", "gh"].iter().map(ToString::to_string).collect();
    for task in scope.tasks() {
        for command in task.commands(config) {
            if let Some(bin) = command
                .split_whitespace()
                .find(|word| !word.contains('='))
            {
                bins.insert(bin.to_string());
            }
        }
    }
    bins
}

fn env_is_set(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| !v.trim().is_empty())
}

fn check_git_repo(root: &Utf8Path) -> CheckResult {
    const NAME: &str = "Git repository";
    match git::is_inside_repo(root) {
        Ok(true) => CheckResult::pass(NAME, "Inside a git repository"),
        Ok(false) => CheckResult::fail(NAME, "Not inside a git repository"),
        Err(e) => CheckResult::fail(NAME, format!("Failed to check: {e}")),
    }
}

fn check_clean_tree(root: &Utf8Path) -> CheckResult {
    const NAME: &str = "Working tree";
    match git::is_clean(root) {
        Ok(true) => CheckResult::pass(NAME, "Clean working tree"),
        Ok(false) => CheckResult::fail(NAME, "Uncommitted changes in working tree"),
        Err(e) => CheckResult::fail(NAME, format!("Failed to check: {e}")),
    }
}

fn check_release_branch(root: &Utf8Path, expected: &str) -> CheckResult {
    const NAME: &str = "Release branch";
    match git::current_branch(root) {
        Ok(Some(current)) if current == expected => {
            CheckResult::pass(NAME, format!("On release branch '{current}'"))
        }
        Ok(Some(current)) => CheckResult::fail(NAME, format!("On '{current}', expected '{expected}'")),
        Ok(None) => CheckResult::fail(NAME, "Detached HEAD, not on any branch"),
        Err(e) => CheckResult::fail(NAME, format!("Failed to check: {e}")),
    }
}

fn check_required_tools(
    binaries: &BTreeSet<String>,
    installed: impl Fn(&str) -> bool,
) -> CheckResult {
    const NAME: &str = "Required tools";
    let missing: Vec<&str> = binaries
        .iter()
        .map(String::as_str)
        .filter(|bin| !installed(bin))
        .collect();
    if missing.is_empty() {
        CheckResult::pass(NAME, "All required tools are installed")
    } else {
        CheckResult::fail(NAME, format!("Missing tools: {}", missing.join(", ")))
    }
}

fn check_env_vars(name: &str, vars: &[&str], is_set: impl Fn(&str) -> bool) -> CheckResult {
    let missing: Vec<&str> = vars.iter().copied().filter(|v| !is_set(v)).collect();
    if missing.is_empty() {
        CheckResult::pass(name, format!("{} set", vars.join(", ")))
    } else {
        CheckResult::fail(name, format!("{} not set", missing.join(", ")))
    }
}
