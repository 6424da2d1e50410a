//! Clean command.

use std::process::ExitCode;

use anyhow::Context;
use camino::Utf8Path;
use clap::Args;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use relkit_core::build::BuildOrchestrator;
use relkit_core::{Config, Workspace};

/// Arguments for the `clean` subcommand.
#[derive(Args, Debug, Default)]
pub struct CleanArgs {}

/// Remove the shared output directory. Nothing to remove is still a success.
#[instrument(name = "cmd_clean", skip_all)]
pub fn cmd_clean(
    _args: CleanArgs,
    global_json: bool,
    config: &Config,
    root: &Utf8Path,
) -> anyhow::Result<ExitCode> {
    debug!(json_output = global_json, "executing clean command");

    let builder = BuildOrchestrator::new(Workspace::from_config(root, config)?, config);
    let dir = builder.workspace().output_dir();
    let existed = dir.exists();
    builder
        .clean()
        .with_context(|| format!("failed to remove {dir}"))?;

    if global_json {
        println!(
            "{}",
            serde_json::json!({ "removed": existed, "dir": dir })
        );
    } else if existed {
        println!("  {} Removed {}", "✓".green(), dir.cyan());
    } else {
        println!("  {} Nothing to clean at {}", "○".dimmed(), dir.cyan());
    }
    Ok(ExitCode::SUCCESS)
}
