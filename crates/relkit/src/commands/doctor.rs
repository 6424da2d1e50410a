//! Doctor command: diagnose configuration, toolchain and platform layout.

use std::process::ExitCode;

use camino::Utf8Path;
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use relkit_core::manifest::PackageManifest;
use relkit_core::platform::{BUILD_SCRIPT, PlatformDescriptor, TEST_SCRIPT, WATCH_SCRIPT};
use relkit_core::process::Tool;
use relkit_core::{Config, Platform, Workspace, config};

use super::spinner;

/// Arguments for the `doctor` subcommand.
#[derive(Args, Debug, Default)]
pub struct DoctorArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Serialize)]
struct DoctorReport {
    config: ConfigStatus,
    workspace: WorkspaceInfo,
    toolchain: ToolchainStatus,
    platforms: Vec<PlatformStatus>,
    directories: DirectoryPaths,
    environment: Vec<EnvVar>,
}

#[derive(Serialize)]
struct ConfigStatus {
    /// Path to the discovered project config, if any
    file: Option<String>,
    found: bool,
}

#[derive(Serialize)]
struct WorkspaceInfo {
    root: String,
    platforms_dir: String,
    output_dir: String,
    staging_dir: String,
}

#[derive(Serialize)]
struct ToolchainStatus {
    package_manager: String,
    program: String,
    available: bool,
}

#[derive(Serialize)]
struct PlatformStatus {
    platform: Platform,
    root: String,
    /// Why the platform cannot build, if it cannot
    problem: Option<String>,
    name: Option<String>,
    version: Option<String>,
    build: bool,
    watch: bool,
    test: bool,
    /// Build output present
    built: bool,
    /// A release lock is present
    locked: bool,
}

#[derive(Serialize)]
struct DirectoryPaths {
    config: Option<String>,
    cache: Option<String>,
    data_local: Option<String>,
}

#[derive(Serialize)]
struct EnvVar {
    name: &'static str,
    value: Option<String>,
    description: &'static str,
}

impl DoctorReport {
    fn gather(
        config: &Config,
        root: &Utf8Path,
        config_file: Option<&Utf8Path>,
    ) -> relkit_core::ConfigResult<Self> {
        let workspace = Workspace::from_config(root, config)?;
        let tool = Tool::parse(config.package_manager(), config::DEFAULT_PACKAGE_MANAGER);

        Ok(Self {
            config: ConfigStatus {
                found: config_file.is_some(),
                file: config_file.map(|p| p.to_string()),
            },
            workspace: WorkspaceInfo {
                root: root.to_string(),
                platforms_dir: config.platforms_dir().to_string(),
                output_dir: workspace.output_dir().to_string(),
                staging_dir: config.staging_dir().to_string(),
            },
            toolchain: ToolchainStatus {
                package_manager: config.package_manager().to_string(),
                program: tool.program().to_string(),
                available: tool.is_available(),
            },
            platforms: Platform::ALL
                .into_iter()
                .map(|platform| PlatformStatus::check(&workspace, platform))
                .collect(),
            directories: DirectoryPaths {
                config: config::user_config_dir().map(|p| p.to_string()),
                cache: config::user_cache_dir().map(|p| p.to_string()),
                data_local: config::user_data_local_dir().map(|p| p.to_string()),
            },
            environment: vec![
                EnvVar {
                    name: "RELKIT_LOG_PATH",
                    value: std::env::var("RELKIT_LOG_PATH").ok(),
                    description: "Explicit log file path",
                },
                EnvVar {
                    name: "RELKIT_LOG_DIR",
                    value: std::env::var("RELKIT_LOG_DIR").ok(),
                    description: "Log directory",
                },
                EnvVar {
                    name: "XDG_CONFIG_HOME",
                    value: std::env::var("XDG_CONFIG_HOME").ok(),
                    description: "Override config directory",
                },
                EnvVar {
                    name: "RUST_LOG",
                    value: std::env::var("RUST_LOG").ok(),
                    description: "Log filter directive",
                },
            ],
        })
    }
}

impl PlatformStatus {
    fn check(workspace: &Workspace, platform: Platform) -> Self {
        let problem = PlatformDescriptor::resolve(workspace, platform, BUILD_SCRIPT)
            .err()
            .map(|err| err.to_string());
        let manifest = PackageManifest::read(&workspace.manifest_path(platform)).ok();
        let has = |script: &str| manifest.as_ref().is_some_and(|m| m.has_script(script));

        Self {
            platform,
            root: workspace.platform_root(platform).to_string(),
            name: manifest.as_ref().and_then(|m| m.name()).map(str::to_string),
            version: manifest.as_ref().and_then(|m| m.version()).map(str::to_string),
            build: has(BUILD_SCRIPT),
            watch: has(WATCH_SCRIPT),
            test: has(TEST_SCRIPT),
            built: workspace.platform_output(platform).is_dir(),
            locked: workspace.lock_path(platform).exists(),
            problem,
        }
    }
}

/// Run diagnostics and report configuration status.
///
/// # Arguments
/// * `global_json` - Global `--json` flag from CLI
/// * `config` - Loaded configuration
/// * `root` - Workspace root
/// * `config_file` - Project config file that was merged, if any
#[instrument(name = "cmd_doctor", skip_all)]
pub fn cmd_doctor(
    _args: DoctorArgs,
    global_json: bool,
    config: &Config,
    root: &Utf8Path,
    config_file: Option<&Utf8Path>,
) -> anyhow::Result<ExitCode> {
    debug!(json_output = global_json, "executing doctor command");

    let progress = (!global_json).then(|| spinner("Gathering diagnostics..."));
    let report = DoctorReport::gather(config, root, config_file);
    if let Some(progress) = progress {
        progress.finish_and_clear();
    }
    let report = report?;

    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("{}", "Configuration".bold().underline());
    match &report.config.file {
        Some(file) => println!("  {} Config file: {}", "✓".green(), file.cyan()),
        None => println!("  {} No config file found, using defaults", "○".yellow()),
    }
    println!("  {}: {}", "Workspace root".dimmed(), report.workspace.root.cyan());
    println!("  {}: {}", "Platforms".dimmed(), report.workspace.platforms_dir);
    println!("  {}: {}", "Output".dimmed(), report.workspace.output_dir);
    println!("  {}: {}", "Staging".dimmed(), report.workspace.staging_dir);
    println!();

    println!("{}", "Toolchain".bold().underline());
    if report.toolchain.available {
        println!(
            "  {} Package manager: {}",
            "✓".green(),
            report.toolchain.package_manager.cyan()
        );
    } else {
        println!(
            "  {} Package manager {} not found on PATH",
            "✗".red(),
            report.toolchain.program.cyan()
        );
    }
    println!();

    println!("{}", "Platforms".bold().underline());
    for status in &report.platforms {
        print_platform(status);
    }
    println!();

    println!("{}", "Directories".bold().underline());
    print_dir("  Config", &report.directories.config);
    print_dir("  Cache", &report.directories.cache);
    print_dir("  Data (local)", &report.directories.data_local);
    println!();

    println!("{}", "Environment".bold().underline());
    let set_vars: Vec<_> = report
        .environment
        .iter()
        .filter(|v| v.value.is_some())
        .collect();
    if set_vars.is_empty() {
        println!("  {} No logging overrides set", "○".dimmed());
    } else {
        for var in set_vars {
            println!(
                "  {}: {} {}",
                var.name.dimmed(),
                var.value.as_deref().unwrap_or("").cyan(),
                format!("({})", var.description).dimmed()
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_platform(status: &PlatformStatus) {
    let name = status.platform.to_string();
    match &status.problem {
        None => {
            let label = match (&status.name, &status.version) {
                (Some(pkg), Some(version)) => format!("{pkg}@{version}"),
                (Some(pkg), None) => pkg.clone(),
                _ => String::new(),
            };
            println!("  {} {} {}", "✓".green(), name.bold(), label.cyan());
        }
        Some(problem) => {
            println!("  {} {} {}", "✗".red(), name.bold(), problem.red());
            return;
        }
    }

    let flag = |on: bool, label: &str| {
        if on {
            label.green().to_string()
        } else {
            label.dimmed().to_string()
        }
    };
    println!(
        "      {} {} {} {} {}",
        flag(status.build, "build"),
        flag(status.watch, "watch"),
        flag(status.test, "test"),
        flag(status.built, "built"),
        if status.locked {
            "locked".yellow().to_string()
        } else {
            String::new()
        }
    );
}

fn print_dir(label: &str, path: &Option<String>) {
    print!("{}: ", label.dimmed());
    match path {
        Some(p) => println!("{}", p.cyan()),
        None => println!("{}", "(unavailable)".yellow()),
    }
}
