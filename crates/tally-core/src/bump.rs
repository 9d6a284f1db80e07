//! Version bump planning and execution.
//!
//! All orchestration logic lives here. The CLI is purely a display layer.
//!
//! # Two-phase workflow
//!
//! 1. **Plan** ([`plan_bump`]): parse the requested bump level, read both
//!    version copies and compute the next version. Nothing is written.
//! 2. **Execute** ([`ReadyBump::execute`]): write both copies, then put the
//!    change on a new branch, push it and open a pull request against the
//!    release branch.

use camino::Utf8Path;
use semver::Version;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::config::Config;
use crate::forge::{Forge, PullRequest};
use crate::git;
use crate::manifest::Manifest;
use crate::version::{self, BumpLevel};

/// Default branch name template for the proposed change.
pub const DEFAULT_BRANCH_TEMPLATE: &str = "bump-version-{version}";
/// Default commit message template.
pub const DEFAULT_COMMIT_TEMPLATE: &str = "Bump version to {version}";
/// Default pull request body template.
pub const DEFAULT_PR_BODY_TEMPLATE: &str =
    "Automated version bump from {previous} to {version}.";

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Errors from bump operations.
#[derive(Error, Debug)]
pub enum BumpError {
    /// Bump level or version parsing failed.
    #[error(transparent)]
    Version(#[from] crate::version::VersionError),

    /// Reading or writing the version copies failed.
    #[error(transparent)]
    Manifest(#[from] crate::manifest::ManifestError),

    /// A git step failed.
    #[error(transparent)]
    Git(#[from] crate::git::GitError),

    /// Opening the pull request failed.
    #[error(transparent)]
    Forge(#[from] crate::forge::ForgeError),
}

/// Result alias for bump operations.
pub type BumpResult<T> = Result<T, BumpError>;

// ──────────────────────────────────────────────
// Plan
// ──────────────────────────────────────────────

/// Options for executing a bump.
#[derive(Debug, Clone, Copy, Default)]
pub struct BumpOptions {
    /// Write the files but do not branch, commit, push or open a PR.
    pub no_pr: bool,
    /// Compute and report without touching anything.
    pub dry_run: bool,
}

/// A bump plan that is ready to execute.
#[derive(Debug, Clone)]
pub struct ReadyBump {
    /// The requested bump level.
    pub level: BumpLevel,
    /// The version currently in the version file.
    pub previous: Version,
    /// The computed next version.
    pub next: Version,
    manifest: Manifest,
    config: Config,
}

/// Plan a version bump.
///
/// The bump level is parsed before any file is read, so an invalid input
/// fails without touching the project.
#[instrument(skip(config), fields(%project_root))]
pub fn plan_bump(
    project_root: &Utf8Path,
    config: &Config,
    level_input: Option<&str>,
) -> BumpResult<ReadyBump> {
    let level = version::resolve_bump_level(level_input)?;
    let manifest = Manifest::load(project_root, config)?;
    let previous = manifest.version().clone();
    let next = version::next_version(&previous, level)?;
    debug!(%level, %previous, %next, "planned bump");

    Ok(ReadyBump {
        level,
        previous,
        next,
        manifest,
        config: config.clone(),
    })
}

// ──────────────────────────────────────────────
// Execute
// ──────────────────────────────────────────────

/// Result of a bump.
#[derive(Debug, Clone, Serialize)]
pub struct BumpOutcome {
    /// The bump level applied.
    pub level: BumpLevel,
    /// The previous version.
    pub previous: Version,
    /// The new version.
    pub new: Version,
    /// Files that were (or would be) modified, relative to the project root.
    pub modified_files: Vec<String>,
    /// Branch holding the change, when one was (or would be) created.
    pub branch: Option<String>,
    /// URL of the opened pull request.
    pub pull_request_url: Option<String>,
    /// Whether this was a dry run.
    pub dry_run: bool,
}

impl ReadyBump {
    /// Branch name for this bump.
    pub fn branch_name(&self) -> String {
        self.render(
            self.config
                .bump
                .branch
                .as_deref()
                .unwrap_or(DEFAULT_BRANCH_TEMPLATE),
        )
    }

    /// Commit message and pull request title for this bump.
    pub fn commit_message(&self) -> String {
        self.render(
            self.config
                .bump
                .commit_message
                .as_deref()
                .unwrap_or(DEFAULT_COMMIT_TEMPLATE),
        )
    }

    fn pull_request(&self, head: String) -> PullRequest {
        let bump = &self.config.bump;
        PullRequest {
            title: bump
                .pr_title
                .as_deref()
                .map_or_else(|| self.commit_message(), |t| self.render(t)),
            body: self.render(bump.pr_body.as_deref().unwrap_or(DEFAULT_PR_BODY_TEMPLATE)),
            base: self.config.release_branch().to_string(),
            head,
        }
    }

    fn render(&self, template: &str) -> String {
        template
            .replace("{version}", &self.next.to_string())
            .replace("{previous}", &self.previous.to_string())
    }

    /// Execute the bump.
    #[instrument(skip(self), fields(previous = %self.previous, next = %self.next))]
    pub fn execute(&self, project_root: &Utf8Path, options: BumpOptions) -> BumpResult<BumpOutcome> {
        let modified_files = vec![
            self.config.version_file().to_string(),
            self.config.descriptor().to_string(),
        ];
        let branch = (!options.no_pr).then(|| self.branch_name());

        let mut outcome = BumpOutcome {
            level: self.level,
            previous: self.previous.clone(),
            new: self.next.clone(),
            modified_files,
            branch,
            pull_request_url: None,
            dry_run: options.dry_run,
        };

        if options.dry_run {
            debug!("dry run, nothing written");
            return Ok(outcome);
        }

        let forge = Forge::from_config(&self.config);
        if !options.no_pr && !forge.has_token() {
            return Err(crate::forge::ForgeError::MissingToken(forge.token_env().to_string()).into());
        }

        self.manifest.write_version(&self.next)?;
        info!(new = %self.next, "version files updated");

        if let Some(ref branch) = outcome.branch {
            let paths: Vec<&str> = outcome.modified_files.iter().map(String::as_str).collect();
            git::create_branch(project_root, branch)?;
            git::add(project_root, &paths)?;
            git::commit(project_root, &self.commit_message(), false)?;
            git::push(project_root, self.config.remote(), branch, true)?;
            let url = forge.create_pull_request(project_root, &self.pull_request(branch.clone()))?;
            outcome.pull_request_url = Some(url);
        }

        info!(
            previous = %outcome.previous,
            new = %outcome.new,
            pull_request = outcome.pull_request_url.is_some(),
            "bump complete"
        );
        Ok(outcome)
    }
}
