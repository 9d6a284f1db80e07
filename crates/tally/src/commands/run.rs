//! Run command: execute one named task.

use anyhow::Context;
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use tally_core::config::Config;
use tally_core::manifest::Manifest;
use tally_core::tasks::{self, CommandOutput, TaskContext, TaskName};

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Task to run
    #[arg(value_enum)]
    pub task: TaskName,

    /// Print the commands instead of running them
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Serialize)]
struct RunReport {
    task: TaskName,
    dry_run: bool,
    commands: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    outputs: Vec<CommandOutput>,
}

/// Execute the run command.
#[instrument(name = "cmd_run", skip_all, fields(task = %args.task))]
pub fn cmd_run(
    args: RunArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing run command");

    let version = Manifest::load(cwd, config)
        .ok()
        .map(|m| m.version().clone());
    let context = TaskContext::new(config, version.as_ref());
    let commands: Vec<String> = args
        .task
        .commands(config)
        .iter()
        .map(|c| context.interpolate(c))
        .collect();

    let outputs = if args.dry_run {
        Vec::new()
    } else {
        tasks::run_task(cwd, config, args.task, &context)
            .with_context(|| format!("task {} failed", args.task))?
    };

    if global_json {
        let report = RunReport {
            task: args.task,
            dry_run: args.dry_run,
            commands,
            outputs,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if args.dry_run {
        for command in &commands {
            println!("  {} {}", "would run".dimmed(), command.cyan());
        }
        return Ok(());
    }

    for output in &outputs {
        println!(
            "  {} {} {}",
            "✓".green(),
            output.command.bold(),
            format!("({} ms)", output.duration_ms).dimmed()
        );
        let stdout = output.stdout.trim_end();
        if !stdout.is_empty() {
            println!("{stdout}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn runs_configured_commands_with_version() {
        let tmp = TempDir::new().unwrap();
        let root = camino::Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        std::fs::write(root.join("VERSION"), "0.3.1\n").unwrap();
        std::fs::write(root.join("setup.py"), "version='0.3.1'\n").unwrap();

        let mut config = Config::default();
        config.tasks.build = Some(vec!["echo {tag} > built".into()]);
        let args = RunArgs {
            task: TaskName::Build,
            dry_run: false,
        };
        cmd_run(args, true, &config, &root).unwrap();
        assert_eq!(std::fs::read_to_string(root.join("built")).unwrap(), "v0.3.1\n");
    }

    #[test]
    fn dry_run_executes_nothing() {
        let tmp = TempDir::new().unwrap();
        let root = camino::Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        let mut config = Config::default();
        config.tasks.test = Some(vec!["touch ran".into()]);
        let args = RunArgs {
            task: TaskName::Test,
            dry_run: true,
        };
        cmd_run(args, false, &config, &root).unwrap();
        assert!(!root.join("ran").exists());
    }

    #[test]
    fn failing_task_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let root = camino::Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        let mut config = Config::default();
        config.tasks.lint = Some(vec!["exit 3".into()]);
        let args = RunArgs {
            task: TaskName::Lint,
            dry_run: false,
        };
        assert!(cmd_run(args, true, &config, &root).is_err());
    }
}
