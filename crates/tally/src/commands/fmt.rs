//! Fmt command: the auto-formatting job.

use anyhow::Context;
use clap::Args;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use tally_core::config::Config;
use tally_core::format::{self, FormatOptions, FormatOutcome};

/// Arguments for the `fmt` subcommand.
#[derive(Args, Debug, Default)]
pub struct FmtArgs {
    /// Commit locally but do not push
    #[arg(long)]
    pub no_push: bool,

    /// Branch to push to (default: current branch)
    #[arg(long)]
    pub branch: Option<String>,
}

/// Execute the fmt command.
#[instrument(name = "cmd_fmt", skip_all, fields(json_output))]
pub fn cmd_fmt(
    args: FmtArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, no_push = args.no_push, "executing fmt command");

    let options = FormatOptions {
        no_push: args.no_push,
        branch: args.branch,
    };
    let spinner = (!global_json).then(|| super::spinner("formatting..."));
    let result = format::run_format_job(cwd, config, &options);
    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }
    let outcome = result.context("formatting job failed")?;

    if global_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    match outcome {
        FormatOutcome::NoChanges => {
            println!("  {} Already formatted; nothing to commit", "✓".green());
        }
        FormatOutcome::Committed {
            commit,
            files,
            verified,
            pushed_to,
        } => {
            println!(
                "  {} Committed {} ({} file{})",
                "✓".green(),
                commit.get(..12).unwrap_or(&commit).cyan(),
                files.len(),
                if files.len() == 1 { "" } else { "s" }
            );
            for file in &files {
                println!("    {} {}", "→".dimmed(), file);
            }
            if verified {
                println!("  {} Signature verified", "✓".green());
            }
            match pushed_to {
                Some(branch) => println!("  {} Pushed to {}", "✓".green(), branch.cyan()),
                None => println!("  {} {}", "–".yellow(), "not pushed".dimmed()),
            }
        }
    }

    Ok(())
}
