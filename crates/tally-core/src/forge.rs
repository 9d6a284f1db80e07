//! Pull requests and releases on the code-hosting platform, via `gh`.
//!
//! The token is read from the configured environment variable and handed
//! to `gh` as `GH_TOKEN`.

use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::config::Config;

/// Errors from forge operations.
#[derive(Error, Debug)]
pub enum ForgeError {
    /// The token environment variable is unset or empty.
    #[error("{0} is not set; the forge token is required")]
    MissingToken(String),

    /// Failed to execute `gh`.
    #[error("failed to run gh: {0}")]
    Exec(#[from] std::io::Error),

    /// `gh` returned a non-zero exit code.
    #[error("gh {command} failed: {stderr}")]
    Command {
        /// The gh subcommand (e.g., "pr create").
        command: String,
        /// Captured stderr.
        stderr: String,
    },
}

/// Result alias for forge operations.
pub type ForgeResult<T> = Result<T, ForgeError>;

/// A pull request to open.
#[derive(Debug, Clone, Serialize)]
pub struct PullRequest {
    /// Title line.
    pub title: String,
    /// Body text.
    pub body: String,
    /// Branch to merge into.
    pub base: String,
    /// Branch holding the change.
    pub head: String,
}

/// A release to create.
#[derive(Debug, Clone, Serialize)]
pub struct DraftRelease {
    /// Tag the release points at.
    pub tag: String,
    /// Release title.
    pub title: String,
    /// Leave the release unpublished.
    pub draft: bool,
    /// Files to attach.
    pub assets: Vec<Utf8PathBuf>,
}

/// Handle for `gh` calls, carrying the token variable name.
#[derive(Debug, Clone)]
pub struct Forge {
    token_env: String,
}

impl Forge {
    /// Create a handle using the configured token variable.
    pub fn from_config(config: &Config) -> Self {
        Self {
            token_env: config.token_env().to_string(),
        }
    }

    /// Name of the environment variable holding the token.
    pub fn token_env(&self) -> &str {
        &self.token_env
    }

    /// Whether the token is present.
    pub fn has_token(&self) -> bool {
        self.token().is_ok()
    }

    fn token(&self) -> ForgeResult<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ForgeError::MissingToken(self.token_env.clone()))
    }

    /// Open a pull request and return its URL.
    #[instrument(skip(self, pr), fields(head = %pr.head, base = %pr.base))]
    pub fn create_pull_request(&self, root: &Utf8Path, pr: &PullRequest) -> ForgeResult<String> {
        let url = self.gh(root, "pr create", &pull_request_args(pr))?;
        info!(%url, "pull request opened");
        Ok(url)
    }

    /// Create a release and return its URL.
    #[instrument(skip(self, release), fields(tag = %release.tag, assets = release.assets.len()))]
    pub fn create_draft_release(
        &self,
        root: &Utf8Path,
        release: &DraftRelease,
    ) -> ForgeResult<String> {
        let url = self.gh(root, "release create", &release_args(release))?;
        info!(%url, "release created");
        Ok(url)
    }

    fn gh(&self, root: &Utf8Path, command: &str, args: &[String]) -> ForgeResult<String> {
        let token = self.token()?;
        debug!(?args, "running gh");
        let output = Command::new("gh")
            .args(args)
            .env("GH_TOKEN", token)
            .current_dir(root.as_std_path())
            .output()?;

        if !output.status.success() {
            return Err(ForgeError::Command {
                command: command.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        // gh prints the URL as the last line of stdout.
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().last().unwrap_or_default().trim().to_string())
    }
}

fn pull_request_args(pr: &PullRequest) -> Vec<String> {
    [
        "pr",
        "create",
        "--title",
        pr.title.as_str(),
        "--body",
        pr.body.as_str(),
        "--base",
        pr.base.as_str(),
        "--head",
        pr.head.as_str(),
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

fn release_args(release: &DraftRelease) -> Vec<String> {
    let mut args: Vec<String> = [
        "release",
        "create",
        release.tag.as_str(),
        "--title",
        release.title.as_str(),
    ]
    .iter()
    .map(ToString::to_string)
    .collect();
    if release.draft {
        args.push("--draft".into());
    }
    args.push("--generate-notes".into());
    args.extend(release.assets.iter().map(ToString::to_string));
    args
}
