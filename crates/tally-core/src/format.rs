//! The auto-formatting job.
//!
//! Runs the `fmt` task and, when it changed anything, commits the result,
//! verifies the commit signature and pushes to the triggering branch. The
//! tree must be clean before the formatter runs, so every change that gets
//! committed came from the formatter. A clean tree after formatting
//! produces no commit, so running the job twice in a row commits at most
//! once.

use camino::Utf8Path;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::git;
use crate::tasks::{self, TaskContext, TaskName};

/// Default message for formatting commits.
pub const DEFAULT_COMMIT_MESSAGE: &str = "Apply automatic formatting";

/// Errors from the formatting job.
#[derive(Error, Debug)]
pub enum FormatError {
    /// The formatter failed.
    #[error(transparent)]
    Task(#[from] tasks::TaskError),

    /// A git step failed.
    #[error(transparent)]
    Git(#[from] git::GitError),

    /// The new commit's signature did not verify; nothing was pushed.
    #[error("signature on formatting commit {commit} did not verify; not pushing")]
    SignatureVerification {
        /// The unverified commit.
        commit: String,
    },

    /// The tree had changes before the formatter ran.
    #[error("working tree has uncommitted changes: {}", files.join(", "))]
    DirtyTree {
        /// Paths already modified or untracked.
        files: Vec<String>,
    },

    /// No branch to push to.
    #[error("HEAD is detached; pass the branch to push to")]
    DetachedHead,
}

/// Result alias for formatting operations.
pub type FormatResult<T> = Result<T, FormatError>;

/// Options for the formatting job.
#[derive(Debug, Clone, Default)]
pub struct FormatOptions {
    /// Commit but do not push.
    pub no_push: bool,
    /// Branch to push to; defaults to the current branch.
    pub branch: Option<String>,
}

/// What the formatting job did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum FormatOutcome {
    /// The formatter changed nothing.
    NoChanges,
    /// Formatting changes were committed.
    Committed {
        /// Hash of the new commit.
        commit: String,
        /// Files the formatter touched.
        files: Vec<String>,
        /// Whether the signature was verified.
        verified: bool,
        /// Branch pushed to, if pushed.
        pushed_to: Option<String>,
    },
}

/// Run the formatting job.
#[instrument(skip(config, options), fields(%project_root, no_push = options.no_push))]
pub fn run_format_job(
    project_root: &Utf8Path,
    config: &Config,
    options: &FormatOptions,
) -> FormatResult<FormatOutcome> {
    let dirty = git::changed_files(project_root)?;
    if !dirty.is_empty() {
        return Err(FormatError::DirtyTree { files: dirty });
    }

    let context = TaskContext::new(config, None);
    tasks::run_task(project_root, config, TaskName::Fmt, &context)?;

    let files = git::changed_files(project_root)?;
    if files.is_empty() {
        info!("formatter made no changes");
        return Ok(FormatOutcome::NoChanges);
    }
    debug!(count = files.len(), "formatter changed files");

    let format = &config.format;
    let sign = format.sign.unwrap_or(true);
    let verify = format.verify_signature.unwrap_or(true);
    let message = format
        .commit_message
        .as_deref()
        .unwrap_or(DEFAULT_COMMIT_MESSAGE);

    git::add(project_root, &[])?;
    git::commit(project_root, message, sign)?;
    let commit = git::head_hash(project_root)?;

    if verify && !git::verify_commit(project_root, "HEAD")? {
        warn!(%commit, "formatting commit left local");
        return Err(FormatError::SignatureVerification { commit });
    }

    let pushed_to = if options.no_push {
        None
    } else {
        let branch = match options.branch.clone() {
            Some(b) => b,
            None => git::current_branch(project_root)?.ok_or(FormatError::DetachedHead)?,
        };
        git::push(project_root, config.remote(), &branch, false)?;
        Some(branch)
    };

    info!(%commit, pushed = pushed_to.is_some(), "formatting committed");
    Ok(FormatOutcome::Committed {
        commit,
        files,
        verified: verify,
        pushed_to,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::testing::{commit_all, scratch_repo};

    fn unsigned_config(fmt: &str) -> Config {
        let mut config = Config::default();
        config.tasks.fmt = Some(vec![fmt.to_string()]);
        config.format.sign = Some(false);
        config.format.verify_signature = Some(false);
        config
    }

    fn local() -> FormatOptions {
        FormatOptions {
            no_push: true,
            branch: None,
        }
    }

    fn commit_count(root: &Utf8Path) -> usize {
        let out = std::process::Command::new("git")
            .args(["rev-list", "--count", "HEAD"])
            .current_dir(root)
            .output()
            .unwrap();
        String::from_utf8_lossy(&out.stdout).trim().parse().unwrap()
    }

    #[test]
    fn clean_formatter_makes_no_commit() {
        let (_tmp, root) = scratch_repo();
        std::fs::write(root.join("mod.py"), "x = 1\n").unwrap();
        commit_all(&root, "initial");

        let outcome = run_format_job(&root, &unsigned_config("true"), &local()).unwrap();
        assert_eq!(outcome, FormatOutcome::NoChanges);
        assert_eq!(commit_count(&root), 1);
    }

    #[test]
    fn second_run_is_idempotent() {
        let (_tmp, root) = scratch_repo();
        std::fs::write(root.join("mod.py"), "x=1\n").unwrap();
        commit_all(&root, "initial");
        let config = unsigned_config("printf 'x = 1\\n' > mod.py");

        let first = run_format_job(&root, &config, &local()).unwrap();
        match first {
            FormatOutcome::Committed {
                ref files,
                ref pushed_to,
                ..
            } => {
                assert_eq!(files, &vec!["mod.py".to_string()]);
                assert!(pushed_to.is_none());
            }
            FormatOutcome::NoChanges => panic!("expected a commit"),
        }
        assert_eq!(commit_count(&root), 2);

        let second = run_format_job(&root, &config, &local()).unwrap();
        assert_eq!(second, FormatOutcome::NoChanges);
        assert_eq!(commit_count(&root), 2);
    }

    #[test]
    fn unverified_signature_is_not_pushed() {
        let (_tmp, root) = scratch_repo();
        std::fs::write(root.join("mod.py"), "x=1\n").unwrap();
        commit_all(&root, "initial");
        let mut config = unsigned_config("printf 'x = 1\\n' > mod.py");
        config.format.verify_signature = Some(true);

        // No remote is configured, so reaching the push would fail with a
        // git error instead.
        let err = run_format_job(&root, &config, &FormatOptions::default()).unwrap_err();
        assert!(matches!(err, FormatError::SignatureVerification { .. }));
    }

    #[test]
    fn existing_changes_are_never_committed() {
        let (_tmp, root) = scratch_repo();
        std::fs::write(root.join("mod.py"), "x = 1\n").unwrap();
        commit_all(&root, "initial");
        std::fs::write(root.join("scratch.txt"), "notes\n").unwrap();

        let err = run_format_job(&root, &unsigned_config("true"), &local()).unwrap_err();
        assert!(
            matches!(err, FormatError::DirtyTree { ref files } if files == &vec!["scratch.txt".to_string()])
        );
        assert_eq!(commit_count(&root), 1);
        assert_eq!(
            git::changed_files(&root).unwrap(),
            vec!["scratch.txt".to_string()]
        );
    }

    #[test]
    fn formatter_failure_is_reported() {
        let (_tmp, root) = scratch_repo();
        std::fs::write(root.join("mod.py"), "x = 1\n").unwrap();
        commit_all(&root, "initial");
        let err = run_format_job(&root, &unsigned_config("exit 2"), &local()).unwrap_err();
        assert!(matches!(err, FormatError::Task(_)));
    }
}
