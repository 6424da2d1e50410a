//! relkit CLI
#![deny(unsafe_code)]

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use relkit::{Cli, Commands, commands};
use relkit_core::config::ConfigLoader;
use tracing::debug;

mod observability;

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    cli.color.apply();

    let Some(command) = cli.command else {
        relkit::command().print_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    if let Some(ref dir) = cli.chdir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("failed to change directory to {}", dir.display()))?;
    }

    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    let cwd = camino::Utf8PathBuf::try_from(cwd).map_err(|e| {
        anyhow::anyhow!(
            "current directory is not valid UTF-8: {}",
            e.into_path_buf().display()
        )
    })?;
    let mut loader = ConfigLoader::new().with_project_search(&cwd);
    if let Some(ref config_path) = cli.config {
        let config_path = camino::Utf8PathBuf::try_from(config_path.clone()).map_err(|e| {
            anyhow::anyhow!(
                "config path is not valid UTF-8: {}",
                e.into_path_buf().display()
            )
        })?;
        loader = loader.with_file(&config_path);
    }

    // The directory holding the project config is the workspace root.
    let project_config = loader.project_config();
    let root = project_config
        .as_deref()
        .and_then(camino::Utf8Path::parent)
        .map_or_else(|| cwd.clone(), camino::Utf8Path::to_path_buf);

    let config = loader.load().context("failed to load configuration")?;

    let obs_config = observability::ObservabilityConfig::from_env_with_overrides(
        config
            .log_dir
            .as_ref()
            .map(|dir| dir.as_std_path().to_path_buf()),
    );
    let env_filter = observability::env_filter(cli.quiet, cli.verbose, config.log_level.as_str());
    let _guard = observability::init_observability(&obs_config, env_filter)
        .context("failed to initialize logging/tracing")?;

    debug!(
        verbose = cli.verbose,
        quiet = cli.quiet,
        json = cli.json,
        color = ?cli.color,
        chdir = ?cli.chdir,
        %root,
        "CLI initialized"
    );

    let result = match command {
        Commands::Build(args) => commands::build::cmd_build(args, cli.json, &config, &root),
        Commands::Clean(args) => commands::clean::cmd_clean(args, cli.json, &config, &root),
        Commands::Install(args) => commands::install::cmd_install(args, cli.json, &config, &root),
        Commands::Release(args) => commands::release::cmd_release(args, cli.json, &config, &root),
        Commands::Doctor(args) => commands::doctor::cmd_doctor(
            args,
            cli.json,
            &config,
            &root,
            project_config.as_deref(),
        ),
    };
    if let Err(ref err) = result {
        tracing::error!(error = %err, "fatal error");
    }
    result
}
