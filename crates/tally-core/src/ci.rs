//! The CI workflow: install, lint, style check, test.
//!
//! Jobs run strictly in order and the first failing job halts the run.
//! When the triggering event is known and does not start CI (a push to a
//! branch other than the release branch), every job is reported as skipped.

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument};

use crate::config::Config;
use crate::manifest::Manifest;
use crate::tasks::{self, PhaseOutcome, TaskContext, TaskName};
use crate::trigger::{Event, Workflow};

/// Errors from the CI workflow.
#[derive(Error, Debug)]
pub enum CiError {
    /// A job's task failed.
    #[error("{job} job failed: {source}")]
    JobFailed {
        /// Which job failed.
        job: CiJob,
        /// The task failure.
        #[source]
        source: tasks::TaskError,
    },
}

/// Result alias for CI operations.
pub type CiResult<T> = Result<T, CiError>;

/// A CI job.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum CiJob {
    /// Install dependencies.
    Deps,
    /// Static analysis and security scan.
    Lint,
    /// Style check.
    FmtCheck,
    /// Test suite.
    Test,
}

impl CiJob {
    /// Jobs in execution order.
    pub const ALL: &[Self] = &[Self::Deps, Self::Lint, Self::FmtCheck, Self::Test];

    /// The named task the job runs.
    pub const fn task(self) -> TaskName {
        match self {
            Self::Deps => TaskName::Deps,
            Self::Lint => TaskName::Lint,
            Self::FmtCheck => TaskName::FmtCheck,
            Self::Test => TaskName::Test,
        }
    }
}

impl std::fmt::Display for CiJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.task().as_str())
    }
}

/// Options for a CI run.
#[derive(Debug, Clone, Default)]
pub struct CiOptions {
    /// The triggering event; `None` runs unconditionally.
    pub event: Option<Event>,
    /// Jobs to skip.
    pub skip: Vec<CiJob>,
}

/// Progress events from a CI run.
#[derive(Debug, Clone)]
pub enum CiEvent {
    /// A job has started.
    JobStarted(CiJob),
    /// A job has finished or been skipped.
    JobCompleted(CiJob, PhaseOutcome),
}

/// Outcome of a CI run.
#[derive(Debug, Clone, Serialize)]
pub struct CiOutcome {
    /// Whether the event started the workflow.
    pub triggered: bool,
    /// Results of each job, in order.
    pub jobs: Vec<(CiJob, PhaseOutcome)>,
}

/// Run the CI workflow.
#[instrument(skip(config, options, on_event), fields(%project_root, skip = options.skip.len()))]
pub fn run_ci(
    project_root: &Utf8Path,
    config: &Config,
    options: &CiOptions,
    mut on_event: impl FnMut(CiEvent),
) -> CiResult<CiOutcome> {
    let triggered = options
        .event
        .as_ref()
        .is_none_or(|event| Workflow::Ci.triggered_by(event, config.release_branch()));

    let version = Manifest::load(project_root, config)
        .ok()
        .map(|m| m.version().clone());
    let context = TaskContext::new(config, version.as_ref());

    let mut jobs = Vec::with_capacity(CiJob::ALL.len());
    for &job in CiJob::ALL {
        on_event(CiEvent::JobStarted(job));
        let outcome = if !triggered {
            PhaseOutcome::Skipped {
                reason: "event does not trigger CI".into(),
            }
        } else if options.skip.contains(&job) {
            PhaseOutcome::Skipped {
                reason: format!("--skip {job}"),
            }
        } else {
            let outputs = tasks::run_task(project_root, config, job.task(), &context)
                .map_err(|source| CiError::JobFailed { job, source })?;
            PhaseOutcome::Success {
                message: format!("{} command(s) passed", outputs.len()),
            }
        };
        on_event(CiEvent::JobCompleted(job, outcome.clone()));
        jobs.push((job, outcome));
    }

    info!(triggered, "ci complete");
    Ok(CiOutcome { triggered, jobs })
}
