//! Doctor command: diagnose configuration and environment.

use clap::Args;
use inquire::Confirm;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use tally_core::config::{self, Config};
use tally_core::kv::monitoring::MONITORING_ENV;

/// Arguments for the `doctor` subcommand.
#[derive(Args, Debug, Default)]
pub struct DoctorArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Serialize)]
struct DoctorReport {
    directories: DirectoryPaths,
    config: ConfigStatus,
    environment: EnvironmentInfo,
}

#[derive(Serialize)]
struct DirectoryPaths {
    config: Option<String>,
    cache: Option<String>,
    data_local: Option<String>,
    kv_table: Option<String>,
}

#[derive(Serialize)]
struct ConfigStatus {
    file: Option<String>,
    found: bool,
}

#[derive(Serialize)]
struct EnvironmentInfo {
    cwd: String,
    env_vars: Vec<EnvVar>,
}

/// Secrets are reported as set or unset, never by value.
#[derive(Serialize)]
struct EnvVar {
    name: &'static str,
    value: Option<String>,
    secret: bool,
    description: &'static str,
}

impl EnvVar {
    fn read(name: &'static str, secret: bool, description: &'static str) -> Self {
        let value = std::env::var(name)
            .ok()
            .map(|v| if secret { "(set)".to_string() } else { v });
        Self {
            name,
            value,
            secret,
            description,
        }
    }
}

impl DoctorReport {
    fn gather(cwd: &camino::Utf8Path) -> Self {
        let config_file = config::find_project_config(cwd);
        let data_local = config::user_data_local_dir();

        Self {
            directories: DirectoryPaths {
                config: config::user_config_dir().map(|p| p.to_string()),
                cache: config::user_cache_dir().map(|p| p.to_string()),
                kv_table: data_local.as_ref().map(|p| p.join("kv.json").to_string()),
                data_local: data_local.map(|p| p.to_string()),
            },
            config: ConfigStatus {
                found: config_file.is_some(),
                file: config_file.map(|p| p.to_string()),
            },
            environment: EnvironmentInfo {
                cwd: cwd.to_string(),
                env_vars: vec![
                    EnvVar::read("XDG_CONFIG_HOME", false, "Override config directory"),
                    EnvVar::read("XDG_DATA_HOME", false, "Override data directory"),
                    EnvVar::read("RUST_LOG", false, "Log filter directive"),
                    EnvVar::read("TALLY_LOG_PATH", false, "Explicit log file"),
                    EnvVar::read("TALLY_LOG_DIR", false, "Log directory"),
                    EnvVar::read(MONITORING_ENV, false, "Trace kv operations"),
                    EnvVar::read("GITHUB_TOKEN", true, "Forge token"),
                    EnvVar::read("TWINE_USERNAME", true, "Package index user"),
                    EnvVar::read("TWINE_PASSWORD", true, "Package index password"),
                ],
            },
        }
    }
}

/// Run diagnostics and report configuration status.
#[instrument(name = "cmd_doctor", skip_all, fields(json_output))]
pub fn cmd_doctor(
    _args: DoctorArgs,
    global_json: bool,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing doctor command");

    let spinner = (!global_json).then(|| super::spinner("Gathering diagnostics..."));
    let report = DoctorReport::gather(cwd);
    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }

    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "Configuration".bold().underline());
    match report.config.file {
        Some(ref file) => println!("  {} Config file: {}", "✓".green(), file.cyan()),
        None => {
            println!("  {} No config file found", "○".yellow());
            offer_config_creation()?;
        }
    }
    println!();

    println!("{}", "Directories".bold().underline());
    print_dir("  Config", report.directories.config.as_deref());
    print_dir("  Cache", report.directories.cache.as_deref());
    print_dir("  Data (local)", report.directories.data_local.as_deref());
    print_dir("  Kv table", report.directories.kv_table.as_deref());
    println!();

    println!("{}", "Environment".bold().underline());
    println!("  {}: {}", "Working directory".dimmed(), report.environment.cwd.cyan());
    for var in &report.environment.env_vars {
        match var.value {
            Some(ref v) => println!("  {}: {}", var.name.dimmed(), v.cyan()),
            None if var.secret => println!(
                "  {}: {} {}",
                var.name.dimmed(),
                "unset".yellow(),
                format!("({})", var.description).dimmed()
            ),
            None => {}
        }
    }

    Ok(())
}

fn print_dir(label: &str, path: Option<&str>) {
    print!("{}: ", label.dimmed());
    match path {
        Some(p) => println!("{}", p.cyan()),
        None => println!("{}", "(unavailable)".yellow()),
    }
}

/// Offer to create a default config file when none exists.
fn offer_config_creation() -> anyhow::Result<()> {
    let Some(config_dir) = config::user_config_dir() else {
        return Ok(());
    };
    if !std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        return Ok(());
    }

    let config_path = config_dir.join("config.yaml");
    let create = Confirm::new("Create a default config file?")
        .with_default(false)
        .with_help_message(&format!("Will create {config_path}"))
        .prompt();

    if let Ok(true) = create {
        std::fs::create_dir_all(&config_dir)?;
        let yaml = serde_saphyr::to_string(&Config::default())?;
        std::fs::write(&config_path, yaml)?;
        println!("  {} Created {}", "✓".green(), config_path.cyan());
    }

    Ok(())
}
