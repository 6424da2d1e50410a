//! Build command: one platform or all of them, optionally in watch mode.

use std::process::ExitCode;

use anyhow::Context;
use camino::Utf8Path;
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use relkit_core::build::{BatchEntry, BatchReport, BatchStatus, BuildOrchestrator, BuildOutcome};
use relkit_core::{Config, Platform, Workspace};

use super::{Target, print_batch_report, spinner};

/// Arguments for the `build` subcommand.
#[derive(Args, Debug, Default)]
pub struct BuildArgs {
    /// Platform to build (h5, wechat, uniapp or all)
    #[arg(default_value = "all", value_name = "PLATFORM")]
    pub target: Target,

    /// Start watch builds and wait for them instead of building once
    #[arg(long, short = 'w')]
    pub watch: bool,
}

#[derive(Serialize)]
struct SingleBuild {
    platform: Platform,
    #[serde(flatten)]
    outcome: BuildOutcome,
}

/// Execute the build command.
#[instrument(name = "cmd_build", skip_all, fields(target = %args.target, watch = args.watch))]
pub fn cmd_build(
    args: BuildArgs,
    global_json: bool,
    config: &Config,
    root: &Utf8Path,
) -> anyhow::Result<ExitCode> {
    debug!(json_output = global_json, "executing build command");

    let mut builder = BuildOrchestrator::new(Workspace::from_config(root, config)?, config);

    let code = match args.target {
        Target::One(platform) => build_one(&mut builder, platform, args.watch, global_json)?,
        Target::All => build_all(&mut builder, args.watch, global_json)?,
    };

    if builder.watcher_count() > 0 {
        if !global_json {
            println!(
                "\n{} {} watch build(s) running, press Ctrl-C to stop",
                "◉".cyan(),
                builder.watcher_count()
            );
        }
        builder.wait_for_watchers();
    }

    Ok(code)
}

fn build_one(
    builder: &mut BuildOrchestrator,
    platform: Platform,
    watch: bool,
    global_json: bool,
) -> anyhow::Result<ExitCode> {
    let progress = (!global_json).then(|| spinner(format!("building {platform}...")));
    let result = builder.build(platform, watch);
    if let Some(progress) = progress {
        progress.finish_and_clear();
    }
    let outcome = result.with_context(|| format!("{platform} build failed"))?;

    if global_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&SingleBuild { platform, outcome })?
        );
    } else {
        let status = match outcome {
            BuildOutcome::Completed => BatchStatus::Succeeded,
            BuildOutcome::Watching { pid } => BatchStatus::Watching { pid },
        };
        print_batch_report(
            "built",
            &BatchReport {
                entries: vec![BatchEntry { platform, status }],
            },
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn build_all(
    builder: &mut BuildOrchestrator,
    watch: bool,
    global_json: bool,
) -> anyhow::Result<ExitCode> {
    let progress = (!global_json).then(|| spinner("building all platforms..."));
    let report = builder.build_all(watch);
    if let Some(progress) = progress {
        progress.finish_and_clear();
    }

    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_batch_report("built", &report);
    }

    if report.succeeded() {
        Ok(ExitCode::SUCCESS)
    } else {
        if !global_json {
            let problems = report.problems().count();
            println!("\n{} {problems} platform(s) not built", "✗".red().bold());
        }
        Ok(ExitCode::FAILURE)
    }
}
