//! Command implementations

pub mod build;

pub mod clean;

pub mod doctor;

pub mod install;

pub mod release;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use relkit_core::build::{BatchReport, BatchStatus};
use relkit_core::Platform;

/// Which platforms a batch command applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Target {
    /// Every platform, in order.
    #[default]
    All,
    /// A single platform.
    One(Platform),
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        s.parse()
            .map(Self::One)
            .map_err(|_| format!("unknown platform `{s}` (expected h5, wechat, uniapp or all)"))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::One(platform) => write!(f, "{platform}"),
        }
    }
}

/// Spinner on stderr, the way every long-running command shows activity.
pub(crate) fn spinner(message: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("  {spinner:.cyan} {msg}") {
        spinner.set_style(
            style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"]),
        );
    }
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Print one line per platform of a batch run.
pub(crate) fn print_batch_report(verb: &str, report: &BatchReport) {
    for entry in &report.entries {
        let name = entry.platform.to_string();
        match &entry.status {
            BatchStatus::Succeeded => {
                println!("  {} {} {}", "✓".green(), name.bold(), verb.dimmed());
            }
            BatchStatus::Watching { pid } => {
                println!(
                    "  {} {} {}",
                    "◉".cyan(),
                    name.bold(),
                    format!("watching (pid {pid})").dimmed()
                );
            }
            BatchStatus::Skipped { reason } => {
                println!(
                    "  {} {} {}",
                    "–".yellow(),
                    name.bold(),
                    format!("skipped: {reason}").dimmed()
                );
            }
            BatchStatus::Failed { reason } => {
                println!("  {} {} {}", "✗".red(), name.bold(), reason.red());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_parses_all_and_platforms() {
        assert_eq!("all".parse::<Target>().unwrap(), Target::All);
        assert_eq!("ALL".parse::<Target>().unwrap(), Target::All);
        assert_eq!("wechat".parse::<Target>().unwrap(), Target::One(Platform::Wechat));
    }

    #[test]
    fn target_rejects_unknown_platform() {
        let err = "android".parse::<Target>().unwrap_err();
        assert!(err.contains("android"));
        assert!(err.contains("uniapp"));
    }

    #[test]
    fn target_display_round_trips() {
        for target in [Target::All, Target::One(Platform::H5)] {
            assert_eq!(target.to_string().parse::<Target>().unwrap(), target);
        }
    }
}
