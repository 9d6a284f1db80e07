//! Release orchestrator: build, draft release, publish.
//!
//! # Two-phase workflow
//!
//! 1. **Plan** ([`plan_release`]): run preflight checks, read the version
//!    (both copies must agree) and derive the tag.
//! 2. **Execute** ([`ReadyRelease::execute`]): run the phases with event
//!    callbacks for progress display.
//!
//! Phases, in order:
//! - **Build**: empty the dist directory, run the `build` task and collect
//!   artifacts
//! - **Release**: create a draft release for the tag with the artifacts
//! - **Publish**: upload to the package index with the `publish` task

use camino::{Utf8Path, Utf8PathBuf};
use semver::Version;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::config::Config;
use crate::forge::{DraftRelease, Forge};
use crate::manifest::{Manifest, ManifestError};
use crate::preflight::{self, PreflightScope};
use crate::tasks::{self, PhaseOutcome, TaskContext, TaskName};

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Errors from the release workflow.
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// Preflight checks failed.
    #[error("preflight checks failed: {0}")]
    PreflightFailed(String),

    /// A phase's task failed.
    #[error("{phase} phase failed: {source}")]
    TaskFailed {
        /// Which phase failed.
        phase: ReleasePhase,
        /// The task failure.
        #[source]
        source: tasks::TaskError,
    },

    /// The build produced nothing to release.
    #[error("no artifacts found in {0}")]
    NoArtifacts(Utf8PathBuf),

    /// The dist directory is not a plain path inside the project, so it is
    /// not safe to empty before building.
    #[error("dist directory `{0}` must be a relative path inside the project")]
    UnsafeDistDir(Utf8PathBuf),

    /// A configured asset does not exist.
    #[error("release asset not found: {0}")]
    MissingAsset(Utf8PathBuf),

    /// Package index credentials are missing.
    #[error("{0} not set; package index credentials are required to publish")]
    MissingCredentials(String),

    /// Failed to list or empty the artifact directory.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The directory involved.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Version copies could not be read or disagree.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Creating the release failed.
    #[error(transparent)]
    Forge(#[from] crate::forge::ForgeError),
}

/// Result alias for release operations.
pub type ReleaseResult<T> = Result<T, ReleaseError>;

// ──────────────────────────────────────────────
// Options, phases and events
// ──────────────────────────────────────────────

/// Options controlling which phases run.
#[derive(Debug, Clone, Default)]
pub struct ReleaseOptions {
    /// Skip creating the draft release.
    pub no_release: bool,
    /// Skip uploading to the package index.
    pub no_publish: bool,
    /// Describe what would happen without doing it.
    pub dry_run: bool,
}

/// Phases of the release workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleasePhase {
    /// Validate release readiness.
    Preflight,
    /// Build the distributable.
    Build,
    /// Create the draft release.
    Release,
    /// Upload to the package index.
    Publish,
}

impl std::fmt::Display for ReleasePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Preflight => write!(f, "preflight"),
            Self::Build => write!(f, "build"),
            Self::Release => write!(f, "release"),
            Self::Publish => write!(f, "publish"),
        }
    }
}

/// Events emitted during the release workflow for progress reporting.
#[derive(Debug, Clone)]
pub enum ReleaseEvent {
    /// A phase has started.
    PhaseStarted(ReleasePhase),
    /// A phase has completed.
    PhaseCompleted(ReleasePhase, PhaseOutcome),
}

/// Outcome of the release workflow.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseOutcome {
    /// The version released.
    pub version: Version,
    /// The release tag.
    pub tag: String,
    /// Results of each phase.
    pub phases: Vec<(ReleasePhase, PhaseOutcome)>,
    /// Artifacts attached to the release.
    pub assets: Vec<Utf8PathBuf>,
    /// URL of the created release.
    pub release_url: Option<String>,
    /// Whether this was a dry run.
    pub dry_run: bool,
}

// ──────────────────────────────────────────────
// Plan
// ──────────────────────────────────────────────

/// A release plan that is ready to execute.
#[derive(Debug)]
pub struct ReadyRelease {
    /// The version being released.
    pub version: Version,
    /// The tag to release (`v{version}`).
    pub tag: String,
    /// Workflow options.
    pub options: ReleaseOptions,
    /// Loaded configuration.
    pub config: Config,
}

/// Plan the release: preflight, read the version, derive the tag.
#[instrument(skip(config, options), fields(%project_root))]
pub fn plan_release(
    project_root: &Utf8Path,
    config: &Config,
    options: ReleaseOptions,
) -> ReleaseResult<ReadyRelease> {
    let report = preflight::run_preflight(project_root, config, PreflightScope::Release);
    if !report.all_passed {
        return Err(ReleaseError::PreflightFailed(report.failure_summary()));
    }

    let manifest = Manifest::load(project_root, config)?;
    manifest.ensure_in_sync()?;

    let version = manifest.version().clone();
    let tag = format!("v{version}");
    debug!(%tag, "planned release");

    Ok(ReadyRelease {
        version,
        tag,
        options,
        config: config.clone(),
    })
}

// ──────────────────────────────────────────────
// Execute
// ──────────────────────────────────────────────

impl ReadyRelease {
    /// Execute the release workflow.
    ///
    /// Calls `on_event` at phase boundaries so the CLI can update
    /// progress display.
    #[instrument(skip(self, on_event), fields(tag = %self.tag, dry_run = self.options.dry_run))]
    pub fn execute(
        self,
        project_root: &Utf8Path,
        mut on_event: impl FnMut(ReleaseEvent),
    ) -> ReleaseResult<ReleaseOutcome> {
        let is_dry = self.options.dry_run;
        let context = TaskContext::new(&self.config, Some(&self.version));
        let mut phases = Vec::new();
        let mut assets = Vec::new();
        let mut release_url = None;

        let mut record = |phase: ReleasePhase,
                          outcome: PhaseOutcome,
                          on_event: &mut dyn FnMut(ReleaseEvent)| {
            on_event(ReleaseEvent::PhaseCompleted(phase, outcome.clone()));
            phases.push((phase, outcome));
        };

        // ── Preflight (already passed in plan phase) ──
        on_event(ReleaseEvent::PhaseStarted(ReleasePhase::Preflight));
        record(
            ReleasePhase::Preflight,
            PhaseOutcome::Success {
                message: "All preflight checks passed".into(),
            },
            &mut on_event,
        );

        // ── Build ──
        on_event(ReleaseEvent::PhaseStarted(ReleasePhase::Build));
        let outcome = if is_dry {
            would_run(&self.config, TaskName::Build, &context)
        } else {
            clear_dist_dir(project_root, &self.config)?;
            tasks::run_task(project_root, &self.config, TaskName::Build, &context).map_err(
                |source| ReleaseError::TaskFailed {
                    phase: ReleasePhase::Build,
                    source,
                },
            )?;
            assets = collect_artifacts(project_root, &self.config)?;
            PhaseOutcome::Success {
                message: format!("Built {} artifact(s)", assets.len()),
            }
        };
        record(ReleasePhase::Build, outcome, &mut on_event);

        // ── Release ──
        on_event(ReleaseEvent::PhaseStarted(ReleasePhase::Release));
        let outcome = if self.options.no_release {
            PhaseOutcome::Skipped {
                reason: "--no-release flag".into(),
            }
        } else if is_dry {
            PhaseOutcome::Success {
                message: format!("Would create draft release {}", self.tag),
            }
        } else {
            let release = self.draft_release(assets.clone());
            let url = Forge::from_config(&self.config).create_draft_release(project_root, &release)?;
            let message = format!("Created release {}: {url}", self.tag);
            release_url = Some(url);
            PhaseOutcome::Success { message }
        };
        record(ReleasePhase::Release, outcome, &mut on_event);

        // ── Publish ──
        on_event(ReleaseEvent::PhaseStarted(ReleasePhase::Publish));
        let outcome = if self.options.no_publish {
            PhaseOutcome::Skipped {
                reason: "--no-publish flag".into(),
            }
        } else if is_dry {
            would_run(&self.config, TaskName::Publish, &context)
        } else {
            self.check_credentials()?;
            tasks::run_task(project_root, &self.config, TaskName::Publish, &context).map_err(
                |source| ReleaseError::TaskFailed {
                    phase: ReleasePhase::Publish,
                    source,
                },
            )?;
            PhaseOutcome::Success {
                message: format!("Published {}", self.version),
            }
        };
        record(ReleasePhase::Publish, outcome, &mut on_event);

        let outcome = ReleaseOutcome {
            version: self.version,
            tag: self.tag,
            phases,
            assets,
            release_url,
            dry_run: is_dry,
        };
        info!(
            version = %outcome.version,
            dry_run = outcome.dry_run,
            "release complete"
        );
        Ok(outcome)
    }

    fn draft_release(&self, assets: Vec<Utf8PathBuf>) -> DraftRelease {
        let release = &self.config.release;
        let title = release.title.as_deref().map_or_else(
            || self.tag.clone(),
            |t| {
                t.replace("{version}", &self.version.to_string())
                    .replace("{tag}", &self.tag)
            },
        );
        DraftRelease {
            tag: self.tag.clone(),
            title,
            draft: release.draft.unwrap_or(true),
            assets,
        }
    }

    fn check_credentials(&self) -> ReleaseResult<()> {
        let missing: Vec<&str> = self
            .config
            .index_credential_envs()
            .into_iter()
            .filter(|name| !std::env::var(name).is_ok_and(|v| !v.trim().is_empty()))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ReleaseError::MissingCredentials(missing.join(", ")))
        }
    }
}

fn would_run(config: &Config, task: TaskName, context: &TaskContext) -> PhaseOutcome {
    let commands: Vec<String> = task
        .commands(config)
        .iter()
        .map(|c| context.interpolate(c))
        .collect();
    PhaseOutcome::Success {
        message: format!("Would run: {}", commands.join(" && ")),
    }
}

/// Remove the dist directory so only this build's output is released and
/// uploaded.
pub fn clear_dist_dir(project_root: &Utf8Path, config: &Config) -> ReleaseResult<()> {
    let dist = config.dist_dir();
    let plain = dist.components().next().is_some()
        && dist
            .components()
            .all(|c| matches!(c, camino::Utf8Component::Normal(_)));
    if !plain {
        return Err(ReleaseError::UnsafeDistDir(dist.to_path_buf()));
    }

    let dir = project_root.join(dist);
    match std::fs::remove_dir_all(&dir) {
        Ok(()) => {
            debug!(%dir, "cleared dist directory");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ReleaseError::Io { path: dir, source }),
    }
}

/// Artifacts to attach: the configured asset list, or every file in the
/// dist directory. Paths are relative to the project root, sorted.
pub fn collect_artifacts(project_root: &Utf8Path, config: &Config) -> ReleaseResult<Vec<Utf8PathBuf>> {
    if let Some(ref configured) = config.release.assets {
        let mut assets = Vec::with_capacity(configured.len());
        for asset in configured {
            let path = Utf8PathBuf::from(asset);
            if !project_root.join(&path).is_file() {
                return Err(ReleaseError::MissingAsset(path));
            }
            assets.push(path);
        }
        if assets.is_empty() {
            return Err(ReleaseError::NoArtifacts(config.dist_dir().to_path_buf()));
        }
        return Ok(assets);
    }

    let dist = config.dist_dir();
    let dir = project_root.join(dist);
    let entries = match dir.read_dir_utf8() {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ReleaseError::NoArtifacts(dist.to_path_buf()));
        }
        Err(source) => return Err(ReleaseError::Io { path: dir, source }),
    };

    let mut assets = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ReleaseError::Io {
            path: dir.clone(),
            source,
        })?;
        if entry.path().is_file() {
            assets.push(dist.join(entry.file_name()));
        }
    }
    if assets.is_empty() {
        return Err(ReleaseError::NoArtifacts(dist.to_path_buf()));
    }
    assets.sort();
    debug!(count = assets.len(), "collected artifacts");
    Ok(assets)
}
