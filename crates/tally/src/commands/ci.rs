//! CI command: run the CI jobs in order.

use std::collections::BTreeMap;

use anyhow::Context;
use clap::Args;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use tally_core::ci::{self, CiEvent, CiJob, CiOptions};
use tally_core::config::Config;
use tally_core::trigger::{Event, EventKind, Workflow};

/// Arguments for the `ci` subcommand.
#[derive(Args, Debug, Default)]
pub struct CiArgs {
    /// Triggering event; without it every job runs
    #[arg(long, value_enum)]
    pub event: Option<EventKind>,

    /// Branch the event refers to
    #[arg(long, requires = "event")]
    pub branch: Option<String>,

    /// Skip a job (repeatable)
    #[arg(long, value_enum, value_name = "JOB")]
    pub skip: Vec<CiJob>,
}

/// Execute the ci command.
#[instrument(name = "cmd_ci", skip_all, fields(json_output))]
pub fn cmd_ci(
    args: CiArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, event = ?args.event, "executing ci command");

    // A dispatch here is a manual run of the CI workflow itself.
    let event = args
        .event
        .map(|kind| {
            Event::from_parts(kind, args.branch.as_deref(), Some(Workflow::Ci), BTreeMap::new())
                .context("incomplete triggering event")
        })
        .transpose()?;
    let options = CiOptions {
        event,
        skip: args.skip,
    };

    let mut active = None;
    let outcome = ci::run_ci(cwd, config, &options, |event| {
        if global_json {
            return;
        }
        match event {
            CiEvent::JobStarted(job) => active = Some(super::spinner(format!("{job}..."))),
            CiEvent::JobCompleted(job, outcome) => {
                if let Some(bar) = active.take() {
                    bar.finish_and_clear();
                }
                super::print_outcome(&job.to_string(), &outcome, false);
            }
        }
    })
    .context("ci failed")?;

    if global_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if outcome.triggered {
        println!("\n{} CI passed", "✓".green().bold());
    } else {
        println!("\n{}", "Event does not trigger CI; nothing ran.".yellow());
    }

    Ok(())
}
