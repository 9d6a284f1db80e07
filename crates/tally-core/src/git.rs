//! Git operations for the bump, format and release workflows.
//!
//! Shells out to `git` for all operations so the user's SSH keys, GPG
//! signing setup and hooks all apply. Every function takes the repository
//! root explicitly and runs `git` with that directory as its working
//! directory.

use std::process::Command;

use camino::Utf8Path;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    /// Failed to execute the `git` command.
    #[error("failed to run git: {0}")]
    Exec(#[from] std::io::Error),

    /// `git` returned a non-zero exit code.
    #[error("git {command} failed: {stderr}")]
    Command {
        /// The git subcommand that failed (e.g., "commit").
        command: String,
        /// Captured stderr.
        stderr: String,
    },

    /// Not inside a git repository.
    #[error("not a git repository (or any parent up to mount point)")]
    NotARepo,
}

/// Result alias for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// Check if `root` is inside a git work tree.
#[instrument]
pub fn is_inside_repo(root: &Utf8Path) -> GitResult<bool> {
    match git(root, &["rev-parse", "--is-inside-work-tree"]) {
        Ok(output) => Ok(output.trim() == "true"),
        Err(GitError::Command { .. } | GitError::NotARepo) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Check whether the working tree is clean (no staged, unstaged or
/// untracked changes).
#[instrument]
pub fn is_clean(root: &Utf8Path) -> GitResult<bool> {
    let clean = changed_files(root)?.is_empty();
    debug!(clean, "working tree status");
    Ok(clean)
}

/// List paths with uncommitted changes, untracked files included.
#[instrument]
pub fn changed_files(root: &Utf8Path) -> GitResult<Vec<String>> {
    let output = git(root, &["status", "--porcelain"])?;
    let files: Vec<String> = output
        .lines()
        .filter(|line| line.len() > 3)
        .map(|line| line[3..].to_string())
        .collect();
    debug!(count = files.len(), "changed files");
    Ok(files)
}

/// Get the current branch name.
///
/// Returns `None` if in a detached HEAD state.
#[instrument]
pub fn current_branch(root: &Utf8Path) -> GitResult<Option<String>> {
    let branch = git(root, &["rev-parse", "--abbrev-ref", "HEAD"])?
        .trim()
        .to_string();
    if branch == "HEAD" {
        debug!("detached HEAD");
        Ok(None)
    } else {
        debug!(%branch, "current branch");
        Ok(Some(branch))
    }
}

/// Create and switch to a new branch.
#[instrument]
pub fn create_branch(root: &Utf8Path, name: &str) -> GitResult<()> {
    git(root, &["checkout", "-b", name])?;
    debug!(%name, "created branch");
    Ok(())
}

/// Stage paths (`git add`). An empty slice stages everything.
#[instrument(skip(paths), fields(count = paths.len()))]
pub fn add(root: &Utf8Path, paths: &[&str]) -> GitResult<()> {
    let mut args = vec!["add", "--"];
    if paths.is_empty() {
        args.push(".");
    } else {
        args.extend_from_slice(paths);
    }
    git(root, &args)?;
    Ok(())
}

/// Commit staged changes, GPG-signing the commit when `sign` is set.
#[instrument(skip(message))]
pub fn commit(root: &Utf8Path, message: &str, sign: bool) -> GitResult<()> {
    let mut args = vec!["commit", "-m", message];
    if sign {
        args.push("-S");
    }
    git(root, &args)?;
    debug!(sign, "committed");
    Ok(())
}

/// Verify the signature on a commit (`git verify-commit <rev>`).
///
/// Returns `false` when the commit is unsigned or the signature does not
/// verify. Exec failures are still errors.
#[instrument]
pub fn verify_commit(root: &Utf8Path, rev: &str) -> GitResult<bool> {
    match git(root, &["verify-commit", rev]) {
        Ok(_) => Ok(true),
        Err(GitError::Command { stderr, .. }) => {
            debug!(%stderr, "signature did not verify");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Push a branch to a remote.
#[instrument]
pub fn push(root: &Utf8Path, remote: &str, branch: &str, set_upstream: bool) -> GitResult<()> {
    let mut args = vec!["push"];
    if set_upstream {
        args.push("--set-upstream");
    }
    args.extend_from_slice(&[remote, branch]);
    git(root, &args)?;
    debug!(%remote, %branch, "pushed");
    Ok(())
}

/// Full hash of HEAD.
#[instrument]
pub fn head_hash(root: &Utf8Path) -> GitResult<String> {
    Ok(git(root, &["rev-parse", "HEAD"])?.trim().to_string())
}

/// Run a git command in `root` and return its stdout.
fn git(root: &Utf8Path, args: &[&str]) -> GitResult<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(root.as_std_path())
        .output()?;

    if output.status.success() {
        return Ok(String::from_utf8_lossy(&output.stdout).to_string());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.contains("not a git repository") {
        return Err(GitError::NotARepo);
    }

    Err(GitError::Command {
        command: args.first().copied().unwrap_or_default().to_string(),
        stderr,
    })
}


#[cfg(test)]
mod tests {
    use super::testing::{commit_all, scratch_repo};
    use super::*;

    #[test]
    fn plain_directory_is_not_a_repo() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = camino::Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        assert!(!is_inside_repo(&root).unwrap());
    }

    #[test]
    fn scratch_repo_tracks_changes() {
        let (_tmp, root) = scratch_repo();
        assert!(is_inside_repo(&root).unwrap());
        assert!(is_clean(&root).unwrap());

        std::fs::write(root.join("VERSION"), "1.0.0\n").unwrap();
        assert!(!is_clean(&root).unwrap());
        assert_eq!(changed_files(&root).unwrap(), vec!["VERSION".to_string()]);

        commit_all(&root, "initial");
        assert!(is_clean(&root).unwrap());
        assert_eq!(current_branch(&root).unwrap().as_deref(), Some("main"));
        assert_eq!(head_hash(&root).unwrap().len(), 40);
    }

    #[test]
    fn create_branch_switches() {
        let (_tmp, root) = scratch_repo();
        std::fs::write(root.join("README"), "hi\n").unwrap();
        commit_all(&root, "initial");

        create_branch(&root, "bump-version-1.1.0").unwrap();
        assert_eq!(
            current_branch(&root).unwrap().as_deref(),
            Some("bump-version-1.1.0")
        );
    }

    #[test]
    fn unsigned_commit_does_not_verify() {
        let (_tmp, root) = scratch_repo();
        std::fs::write(root.join("README"), "hi\n").unwrap();
        commit_all(&root, "initial");
        assert!(!verify_commit(&root, "HEAD").unwrap());
    }
}
