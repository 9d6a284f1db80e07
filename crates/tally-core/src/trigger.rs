//! Which automated workflows an event starts.
//!
//! - CI runs on pushes to the release branch and on every pull request.
//! - Version bumps and releases each run only when dispatched by name. A
//!   bump dispatch carries the bump type; a release dispatch has no inputs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Dispatch input carrying the requested bump level.
pub const BUMP_TYPE_INPUT: &str = "bump_type";

/// An event from the hosting platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// Commits pushed to a branch.
    Push {
        /// The branch pushed to.
        branch: String,
    },
    /// A pull request opened or updated.
    PullRequest {
        /// The pull request's target branch.
        branch: String,
    },
    /// A manual run of one workflow, with optional inputs.
    Dispatch {
        /// The workflow dispatched.
        workflow: Workflow,
        /// Named inputs supplied with the dispatch.
        #[serde(default)]
        inputs: BTreeMap<String, String>,
    },
}

/// Event kind as named on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EventKind {
    /// `push`
    Push,
    /// `pull-request`
    PullRequest,
    /// `dispatch`
    Dispatch,
}

impl Event {
    /// Assemble an event from command-line parts.
    ///
    /// Push and pull request events without a branch get an empty branch
    /// name, which never matches the release branch. A dispatch needs the
    /// workflow it targets; without one this returns `None`.
    pub fn from_parts(
        kind: EventKind,
        branch: Option<&str>,
        workflow: Option<Workflow>,
        inputs: BTreeMap<String, String>,
    ) -> Option<Self> {
        let branch = branch.unwrap_or_default().to_string();
        match kind {
            EventKind::Push => Some(Self::Push { branch }),
            EventKind::PullRequest => Some(Self::PullRequest { branch }),
            EventKind::Dispatch => workflow.map(|workflow| Self::Dispatch { workflow, inputs }),
        }
    }

    /// The value of a dispatch input, if this is a dispatch that carries it.
    pub fn input(&self, name: &str) -> Option<&str> {
        match self {
            Self::Dispatch { inputs, .. } => inputs.get(name).map(String::as_str),
            _ => None,
        }
    }

    /// The branch involved, for push and pull request events.
    pub fn branch(&self) -> Option<&str> {
        match self {
            Self::Push { branch } | Self::PullRequest { branch } => Some(branch),
            Self::Dispatch { .. } => None,
        }
    }
}

/// An automated workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Workflow {
    /// Install, lint, style check and test.
    Ci,
    /// Propose a version bump.
    Bump,
    /// Build, draft a release and publish.
    Release,
}

impl Workflow {
    /// Every workflow.
    pub const ALL: &[Self] = &[Self::Ci, Self::Bump, Self::Release];

    /// Whether `event` starts this workflow.
    pub fn triggered_by(self, event: &Event, release_branch: &str) -> bool {
        match (self, event) {
            (Self::Ci, Event::Push { branch }) => branch == release_branch,
            (Self::Ci, Event::PullRequest { .. }) => true,
            (Self::Bump | Self::Release, Event::Dispatch { workflow, .. }) => *workflow == self,
            _ => false,
        }
    }
}

impl std::fmt::Display for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ci => write!(f, "ci"),
            Self::Bump => write!(f, "bump"),
            Self::Release => write!(f, "release"),
        }
    }
}

/// Workflows started by `event`.
pub fn workflows_for(event: &Event, release_branch: &str) -> Vec<Workflow> {
    Workflow::ALL
        .iter()
        .copied()
        .filter(|w| w.triggered_by(event, release_branch))
        .collect()
}
