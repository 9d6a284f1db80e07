//! Info command: show package, config and project version information.

use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use tally_core::config::{self, Config};
use tally_core::manifest::Manifest;
use tally_core::tasks::TaskName;

/// Arguments for the `info` subcommand.
#[derive(Args, Debug, Default)]
pub struct InfoArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Serialize)]
struct PackageInfo {
    name: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    description: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    license: &'static str,
}

impl PackageInfo {
    const fn new() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            description: env!("CARGO_PKG_DESCRIPTION"),
            license: env!("CARGO_PKG_LICENSE"),
        }
    }
}

#[derive(Serialize)]
struct ConfigInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    config_file: Option<String>,
    log_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_dir: Option<String>,
}

impl ConfigInfo {
    fn from_config(config: &Config, cwd: &camino::Utf8Path) -> Self {
        Self {
            config_file: config::find_project_config(cwd).map(|p| p.to_string()),
            log_level: config.log_level.as_str().to_string(),
            log_dir: config.log_dir.as_ref().map(|p| p.to_string()),
        }
    }
}

/// The project being released, if its version files are readable.
#[derive(Serialize)]
struct ProjectInfo {
    version_file: String,
    descriptor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    in_sync: Option<bool>,
    release_branch: String,
    tasks: Vec<(TaskName, Vec<String>)>,
}

impl ProjectInfo {
    fn gather(config: &Config, cwd: &camino::Utf8Path) -> Self {
        let manifest = Manifest::load(cwd, config).ok();
        Self {
            version_file: config.version_file().to_string(),
            descriptor: config.descriptor().to_string(),
            version: manifest.as_ref().map(|m| m.version().to_string()),
            in_sync: manifest.as_ref().and_then(|m| m.in_sync().ok()),
            release_branch: config.release_branch().to_string(),
            tasks: TaskName::ALL
                .iter()
                .map(|&t| (t, t.commands(config)))
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct FullInfo {
    #[serde(flatten)]
    package: PackageInfo,
    config: ConfigInfo,
    project: ProjectInfo,
}

/// Print package information.
#[instrument(name = "cmd_info", skip_all, fields(json_output))]
pub fn cmd_info(
    _args: InfoArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing info command");

    let info = FullInfo {
        package: PackageInfo::new(),
        config: ConfigInfo::from_config(config, cwd),
        project: ProjectInfo::gather(config, cwd),
    };

    if global_json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("{} {}", info.package.name.bold(), info.package.version.green());
    if !info.package.description.is_empty() {
        println!("{}", info.package.description);
    }
    if !info.package.license.is_empty() {
        println!("{}: {}", "License".dimmed(), info.package.license);
    }

    println!();
    println!("{}", "Configuration".bold().underline());
    match info.config.config_file {
        Some(ref path) => println!("{}: {}", "Config file".dimmed(), path.cyan()),
        None => println!("{}: {}", "Config file".dimmed(), "none loaded".yellow()),
    }
    println!("{}: {}", "Log level".dimmed(), info.config.log_level);
    if let Some(ref dir) = info.config.log_dir {
        println!("{}: {}", "Log directory".dimmed(), dir);
    }

    let project = &info.project;
    println!();
    println!("{}", "Project".bold().underline());
    match project.version {
        Some(ref v) => println!("{}: {}", "Version".dimmed(), v.cyan()),
        None => println!(
            "{}: {}",
            "Version".dimmed(),
            format!("unreadable ({} / {})", project.version_file, project.descriptor).yellow()
        ),
    }
    if project.in_sync == Some(false) {
        println!(
            "  {} {} and {} disagree",
            "✗".red(),
            project.version_file,
            project.descriptor
        );
    }
    println!("{}: {}", "Release branch".dimmed(), project.release_branch);
    for (task, commands) in &project.tasks {
        println!("{}: {}", task.to_string().dimmed(), commands.join(" && ").cyan());
    }

    Ok(())
}
