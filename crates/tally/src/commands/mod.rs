//! Command implementations

pub mod bump;

pub mod ci;

pub mod doctor;

pub mod fmt;

pub mod info;

pub mod kv;

pub mod preflight;

pub mod release;

pub mod run;

pub mod triggers;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tally_core::tasks::PhaseOutcome;

const SPINNER_TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// A steady-ticking spinner on stderr.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("  {spinner:.cyan} {msg}") {
        bar.set_style(style.tick_strings(SPINNER_TICKS));
    }
    bar.set_message(message.into());
    bar.enable_steady_tick(std::time::Duration::from_millis(80));
    bar
}

/// One line per finished step: check mark, name, detail.
///
/// Dry runs get a hollow marker since nothing actually ran.
pub fn print_outcome(name: &str, outcome: &PhaseOutcome, is_dry: bool) {
    match outcome {
        PhaseOutcome::Success { message } => {
            let prefix = if is_dry { "○" } else { "✓" };
            println!("  {} {} {}", prefix.green(), name.bold(), message.dimmed());
        }
        PhaseOutcome::Skipped { reason } => {
            println!(
                "  {} {} {}",
                "–".yellow(),
                name.bold(),
                format!("skipped: {reason}").dimmed(),
            );
        }
    }
}
