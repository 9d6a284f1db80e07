//! Triggers command: which workflows an event starts.

use std::collections::BTreeMap;

use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use tally_core::config::Config;
use tally_core::trigger::{self, BUMP_TYPE_INPUT, Event, EventKind, Workflow};
use tally_core::version::{self, BumpLevel};

/// Arguments for the `triggers` subcommand.
#[derive(Args, Debug)]
pub struct TriggersArgs {
    /// Event kind
    #[arg(long, value_enum)]
    pub event: EventKind,

    /// Branch pushed to or targeted by the pull request
    #[arg(long)]
    pub branch: Option<String>,

    /// Workflow a dispatch targets
    #[arg(long, value_enum, required_if_eq("event", "dispatch"))]
    pub workflow: Option<Workflow>,

    /// Dispatch input as KEY=VALUE (repeatable)
    #[arg(long = "input", value_name = "KEY=VALUE", value_parser = parse_input)]
    pub inputs: Vec<(String, String)>,
}

fn parse_input(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))
}

#[derive(Serialize)]
struct TriggerReport {
    event: Event,
    workflows: Vec<Workflow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bump_level: Option<BumpLevel>,
}

/// Execute the triggers command.
#[instrument(name = "cmd_triggers", skip_all, fields(event = ?args.event))]
pub fn cmd_triggers(args: TriggersArgs, global_json: bool, config: &Config) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing triggers command");

    let inputs: BTreeMap<String, String> = args.inputs.into_iter().collect();
    let event = Event::from_parts(args.event, args.branch.as_deref(), args.workflow, inputs)
        .ok_or_else(|| anyhow::anyhow!("a dispatch event needs --workflow"))?;
    let workflows = trigger::workflows_for(&event, config.release_branch());

    // The bump workflow refuses unknown levels before touching anything.
    let bump_level = if workflows.contains(&Workflow::Bump) {
        Some(version::resolve_bump_level(event.input(BUMP_TYPE_INPUT))?)
    } else {
        None
    };

    let report = TriggerReport {
        event,
        workflows,
        bump_level,
    };

    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.workflows.is_empty() {
        println!("  {} {}", "○".yellow(), "no workflows triggered".yellow());
    }
    for workflow in &report.workflows {
        println!("  {} {}", "→".green(), workflow.to_string().bold());
    }
    if let Some(level) = report.bump_level {
        println!("  {}: {}", "Bump type".dimmed(), level.to_string().cyan());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_parsing() {
        assert_eq!(
            parse_input("bump_type=major"),
            Ok(("bump_type".to_string(), "major".to_string()))
        );
        assert_eq!(parse_input("a=b=c"), Ok(("a".to_string(), "b=c".to_string())));
        assert!(parse_input("novalue").is_err());
        assert!(parse_input("=x").is_err());
    }

    #[test]
    fn dispatch_with_bad_bump_type_fails() {
        let args = TriggersArgs {
            event: EventKind::Dispatch,
            branch: None,
            workflow: Some(Workflow::Bump),
            inputs: vec![(BUMP_TYPE_INPUT.to_string(), "huge".to_string())],
        };
        assert!(cmd_triggers(args, true, &Config::default()).is_err());
    }

    #[test]
    fn release_dispatch_ignores_bump_type() {
        let args = TriggersArgs {
            event: EventKind::Dispatch,
            branch: None,
            workflow: Some(Workflow::Release),
            inputs: vec![(BUMP_TYPE_INPUT.to_string(), "huge".to_string())],
        };
        assert!(cmd_triggers(args, true, &Config::default()).is_ok());
    }

    #[test]
    fn dispatch_needs_workflow() {
        let args = TriggersArgs {
            event: EventKind::Dispatch,
            branch: None,
            workflow: None,
            inputs: vec![],
        };
        assert!(cmd_triggers(args, true, &Config::default()).is_err());
    }

    #[test]
    fn push_reports_without_error() {
        let args = TriggersArgs {
            event: EventKind::Push,
            branch: Some("main".into()),
            workflow: None,
            inputs: vec![],
        };
        assert!(cmd_triggers(args, false, &Config::default()).is_ok());
    }
}
