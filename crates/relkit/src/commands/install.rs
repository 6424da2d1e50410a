//! Install command.

use std::process::ExitCode;

use anyhow::Context;
use camino::Utf8Path;
use clap::Args;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use relkit_core::build::{BatchEntry, BatchReport, BatchStatus, BuildOrchestrator};
use relkit_core::{Config, Workspace};

use super::{Target, print_batch_report, spinner};

/// Arguments for the `install` subcommand.
#[derive(Args, Debug, Default)]
pub struct InstallArgs {
    /// Platform to install (h5, wechat, uniapp or all)
    #[arg(default_value = "all", value_name = "PLATFORM")]
    pub target: Target,
}

/// Run the package manager's install in each selected platform root.
#[instrument(name = "cmd_install", skip_all, fields(target = %args.target))]
pub fn cmd_install(
    args: InstallArgs,
    global_json: bool,
    config: &Config,
    root: &Utf8Path,
) -> anyhow::Result<ExitCode> {
    debug!(json_output = global_json, "executing install command");

    let builder = BuildOrchestrator::new(Workspace::from_config(root, config)?, config);

    let progress = (!global_json).then(|| spinner(format!("installing {}...", args.target)));
    let report = match args.target {
        Target::All => builder.install_all(),
        Target::One(platform) => {
            let result = builder.install_dependencies(platform);
            if let Some(progress) = &progress {
                progress.finish_and_clear();
            }
            result.with_context(|| format!("{platform} install failed"))?;
            BatchReport {
                entries: vec![BatchEntry {
                    platform,
                    status: BatchStatus::Succeeded,
                }],
            }
        }
    };
    if let Some(progress) = progress {
        progress.finish_and_clear();
    }

    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_batch_report("installed", &report);
    }

    if report.succeeded() {
        Ok(ExitCode::SUCCESS)
    } else {
        if !global_json {
            println!(
                "\n{} {} platform(s) not installed",
                "✗".red().bold(),
                report.problems().count()
            );
        }
        Ok(ExitCode::FAILURE)
    }
}
