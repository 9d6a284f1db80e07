//! Release command: thin CLI layer over `tally_core::release`.

use anyhow::Context;
use clap::Args;
use inquire::Confirm;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use tally_core::config::Config;
use tally_core::release::{self, ReleaseEvent, ReleaseOptions};

/// Arguments for the `release` subcommand.
#[derive(Args, Debug, Default)]
pub struct ReleaseArgs {
    /// Skip creating the draft release
    #[arg(long)]
    pub no_release: bool,

    /// Skip uploading to the package index
    #[arg(long)]
    pub no_publish: bool,

    /// Preview what would happen without making changes
    #[arg(long)]
    pub dry_run: bool,

    /// Skip confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

/// Execute the release command.
#[instrument(name = "cmd_release", skip_all)]
pub fn cmd_release(
    args: ReleaseArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(
        json_output = global_json,
        dry_run = args.dry_run,
        "executing release command"
    );

    let options = ReleaseOptions {
        no_release: args.no_release,
        no_publish: args.no_publish,
        dry_run: args.dry_run,
    };
    let is_dry = options.dry_run;

    let ready = release::plan_release(cwd, config, options).context("release planning failed")?;

    if !global_json {
        if is_dry {
            println!("\n{}", "DRY RUN — no changes will be made".yellow().bold());
        }
        println!("\n{}: {}", "Release".bold(), ready.tag.green().bold());
        print_phase_summary(&ready.options);
    }

    let interactive = std::io::IsTerminal::is_terminal(&std::io::stdin());
    if !is_dry && !global_json && !args.yes && interactive {
        let confirmed = Confirm::new("Proceed with release?")
            .with_default(true)
            .prompt()
            .context("confirmation prompt failed")?;
        if !confirmed {
            println!("{}", "Release cancelled.".yellow());
            return Ok(());
        }
        println!();
    }

    let mut active = None;
    let outcome = ready
        .execute(cwd, |event| {
            if global_json {
                return;
            }
            match event {
                ReleaseEvent::PhaseStarted(phase) => {
                    active = Some(super::spinner(format!("{phase}...")));
                }
                ReleaseEvent::PhaseCompleted(phase, outcome) => {
                    if let Some(bar) = active.take() {
                        bar.finish_and_clear();
                    }
                    super::print_outcome(&phase.to_string(), &outcome, is_dry);
                }
            }
        })
        .context("release failed")?;

    if global_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!();
    if outcome.dry_run {
        println!(
            "{} Dry run complete — {} phases previewed",
            "✓".green(),
            outcome.phases.len()
        );
    } else {
        println!("{} Released {}", "✓".green().bold(), outcome.tag.green().bold());
        if let Some(ref url) = outcome.release_url {
            println!("  {}: {}", "Draft".dimmed(), url.cyan());
        }
        for asset in &outcome.assets {
            println!("  {} {}", "→".dimmed(), asset.cyan());
        }
    }

    Ok(())
}

fn print_phase_summary(options: &ReleaseOptions) {
    let phases = [
        ("build", true),
        ("release", !options.no_release),
        ("publish", !options.no_publish),
    ];
    let active: Vec<&str> = phases.iter().filter(|(_, on)| *on).map(|(n, _)| *n).collect();
    let skipped: Vec<&str> = phases.iter().filter(|(_, on)| !*on).map(|(n, _)| *n).collect();

    print!("  {}: {}", "Phases".dimmed(), active.join(", ").bold());
    if !skipped.is_empty() {
        print!(" {}", format!("(skip: {})", skipped.join(", ")).dimmed());
    }
    println!();
    println!();
}
