//! Bump command: thin CLI layer over `tally_core::bump`.

use anyhow::Context;
use clap::Args;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use tally_core::bump::{self, BumpOptions};
use tally_core::config::Config;

/// Arguments for the `bump` subcommand.
#[derive(Args, Debug, Default)]
pub struct BumpArgs {
    /// Bump type: major, minor or patch (default: minor)
    #[arg(long = "type", short = 't', value_name = "TYPE")]
    pub bump_type: Option<String>,

    /// Write the files but skip the branch, push and pull request
    #[arg(long)]
    pub no_pr: bool,

    /// Show the new version without changing anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Execute the bump command.
#[instrument(name = "cmd_bump", skip_all, fields(json_output))]
pub fn cmd_bump(
    args: BumpArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing bump command");

    let ready = bump::plan_bump(cwd, config, args.bump_type.as_deref())
        .context("bump planning failed")?;

    if !global_json {
        println!(
            "{}: {} → {} ({})",
            "Version".bold(),
            ready.previous.to_string().dimmed(),
            ready.next.to_string().green().bold(),
            ready.level,
        );
        if !args.no_pr {
            println!("{}: {}", "Branch".dimmed(), ready.branch_name().cyan());
        }
    }

    let options = BumpOptions {
        no_pr: args.no_pr,
        dry_run: args.dry_run,
    };
    let outcome = ready.execute(cwd, options).context("bump failed")?;

    if global_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!();
    if outcome.dry_run {
        println!("{}", "Dry run — no changes made.".yellow());
        for file in &outcome.modified_files {
            println!("  {} {}", "would write".dimmed(), file.cyan());
        }
        return Ok(());
    }

    println!(
        "  {} Version updated to {}",
        "✓".green(),
        outcome.new.to_string().green().bold()
    );
    for file in &outcome.modified_files {
        println!("  {} {}", "→".dimmed(), file.cyan());
    }
    if let Some(ref url) = outcome.pull_request_url {
        println!("  {} Pull request: {}", "✓".green(), url.cyan());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project(version: &str) -> (TempDir, camino::Utf8PathBuf) {
        let tmp = TempDir::new().unwrap();
        let root = camino::Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        std::fs::write(root.join("VERSION"), format!("{version}\n")).unwrap();
        std::fs::write(
            root.join("setup.py"),
            format!("setup(\n    name=\"pkg\",\n    version=\"{version}\",\n)\n"),
        )
        .unwrap();
        (tmp, root)
    }

    #[test]
    fn local_bump_writes_both_files() {
        let (_tmp, root) = project("1.4.9");
        let args = BumpArgs {
            bump_type: Some("minor".into()),
            no_pr: true,
            dry_run: false,
        };
        cmd_bump(args, true, &Config::default(), &root).unwrap();
        assert_eq!(std::fs::read_to_string(root.join("VERSION")).unwrap(), "1.5.0\n");
        assert!(
            std::fs::read_to_string(root.join("setup.py"))
                .unwrap()
                .contains("version=\"1.5.0\"")
        );
    }

    #[test]
    fn invalid_type_leaves_files_alone() {
        let (_tmp, root) = project("1.2.3");
        let args = BumpArgs {
            bump_type: Some("huge".into()),
            no_pr: true,
            dry_run: false,
        };
        assert!(cmd_bump(args, false, &Config::default(), &root).is_err());
        assert_eq!(std::fs::read_to_string(root.join("VERSION")).unwrap(), "1.2.3\n");
    }
}
