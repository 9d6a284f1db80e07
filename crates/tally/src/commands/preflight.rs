//! Preflight command: validate bump or release readiness.

use clap::Args;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use tally_core::config::Config;
use tally_core::preflight::{self, PreflightScope};

/// Arguments for the `preflight` subcommand.
#[derive(Args, Debug, Default)]
pub struct PreflightArgs {
    /// Which workflow to check for
    #[arg(long, value_enum, default_value_t)]
    pub scope: PreflightScope,
}

/// Run preflight checks and display results.
#[instrument(name = "cmd_preflight", skip_all, fields(json_output))]
pub fn cmd_preflight(
    args: PreflightArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, scope = ?args.scope, "executing preflight command");

    let report = preflight::run_preflight(cwd, config, args.scope);

    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", "Preflight Checks".bold().underline());
        println!();

        for check in &report.checks {
            let icon = if check.passed {
                "✓".green().to_string()
            } else {
                "✗".red().to_string()
            };
            println!("  {icon} {}: {}", check.name.bold(), check.message);
        }

        println!();
        if report.all_passed {
            println!("  {}", "Ready.".green().bold());
        } else {
            let failed = report.checks.iter().filter(|c| !c.passed).count();
            println!(
                "  {} — fix issues above first",
                format!("{failed} check(s) failed").red().bold(),
            );
        }
    }

    if report.all_passed {
        Ok(())
    } else {
        Err(anyhow::anyhow!("preflight checks failed"))
    }
}
