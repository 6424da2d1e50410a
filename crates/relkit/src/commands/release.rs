//! Release command: thin CLI layer over `relkit_core::release`.

use std::panic::{self, AssertUnwindSafe};
use std::process::ExitCode;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use indicatif::{HumanBytes, ProgressBar};
use owo_colors::OwoColorize;
use tracing::{debug, error, instrument};

use relkit_core::registry::Tag;
use relkit_core::release::{PublishSummary, ReleaseOutcome, ReleaseState, StateOutcome};
use relkit_core::{
    AssumeYes, Config, IncrementKind, Platform, Prompter, ReleaseConfig, ReleaseEvent,
    ReleasePipeline, SemVer, Workspace,
};

use super::spinner;
use crate::prompt::InquirePrompter;

/// Exit code after an interrupted release has been cleaned up.
const INTERRUPTED: i32 = 130;

/// Arguments for the `release` subcommand.
#[derive(Args, Debug)]
pub struct ReleaseArgs {
    /// Platform to release
    #[arg(value_enum)]
    pub platform: Platform,

    /// Release channel (default: latest)
    #[arg(value_enum, value_name = "CHANNEL")]
    pub channel: Option<Tag>,

    /// Publish under the `latest` tag with a patch increment
    #[arg(long, conflicts_with_all = ["beta", "channel"])]
    pub latest: bool,

    /// Publish under the `beta` tag with a prerelease increment
    #[arg(long, conflicts_with_all = ["latest", "channel"])]
    pub beta: bool,

    /// Increment preselected in the version picker
    #[arg(long, value_enum, value_name = "KIND")]
    pub increment: Option<IncrementKind>,

    /// Release exactly this version (still asks for confirmation)
    #[arg(long, value_name = "VERSION", conflicts_with = "increment")]
    pub version: Option<SemVer>,

    /// Accept every default and confirmation (for CI)
    #[arg(long, short = 'y')]
    pub yes: bool,
}

impl ReleaseArgs {
    fn tag(&self) -> Tag {
        if self.beta {
            Tag::Beta
        } else if self.latest {
            Tag::Latest
        } else {
            self.channel.unwrap_or_default()
        }
    }

    fn release_config(&self) -> ReleaseConfig {
        let mut release = ReleaseConfig::for_tag(self.tag());
        if let Some(kind) = self.increment {
            release = release.with_increment(kind);
        }
        if let Some(version) = &self.version {
            release = release.with_version(version.clone());
        }
        release
    }
}

/// Execute the release command.
#[instrument(name = "cmd_release", skip_all, fields(platform = %args.platform))]
pub fn cmd_release(
    args: ReleaseArgs,
    global_json: bool,
    config: &Config,
    root: &Utf8Path,
) -> anyhow::Result<ExitCode> {
    let release = args.release_config();
    debug!(
        json_output = global_json,
        tag = %release.tag,
        increment = %release.increment,
        assume_yes = args.yes,
        "executing release command"
    );

    let platform = args.platform;
    let workspace = Workspace::from_config(root, config)?;
    let pipeline = ReleasePipeline::new(workspace, platform, release, config);
    let lock = pipeline
        .lock()
        .with_context(|| format!("cannot start {platform} release"))?;
    on_interrupt(pipeline.staging_dir(), lock.path().to_path_buf())?;

    let mut prompter: Box<dyn Prompter> = if args.yes {
        Box::new(AssumeYes)
    } else {
        Box::new(InquirePrompter::new())
    };
    let mut display = ReleaseDisplay::new(global_json);

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        pipeline.execute(lock, prompter.as_mut(), |event| display.handle(event))
    }));

    let outcome = match result {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(err)) if err.is_cancelled() => {
            eprintln!("{}", "Release cancelled.".yellow());
            return Ok(ExitCode::FAILURE);
        }
        Ok(Err(err)) => {
            return Err(err).with_context(|| format!("{platform} release failed"));
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(%message, "release pipeline panicked");
            anyhow::bail!("{platform} release aborted by an internal fault: {message}");
        }
    };

    if global_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(ExitCode::SUCCESS)
}

/// On Ctrl-C outside a prompt: drop the staging tree and the lock, exit 130.
///
/// Prompts see Ctrl-C themselves and cancel through the normal cleanup path.
fn on_interrupt(staging: Utf8PathBuf, lock: Utf8PathBuf) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        let _ = std::fs::remove_dir_all(&staging);
        let _ = std::fs::remove_file(&lock);
        eprintln!("\n{}", "Interrupted. Staging and release lock removed.".yellow());
        std::process::exit(INTERRUPTED);
    })
    .context("failed to install Ctrl-C handler")
}

// ──────────────────────────────────────────────
// Progress display
// ──────────────────────────────────────────────

struct ReleaseDisplay {
    quiet: bool,
    active: Option<ProgressBar>,
}

impl ReleaseDisplay {
    const fn new(quiet: bool) -> Self {
        Self {
            quiet,
            active: None,
        }
    }

    fn handle(&mut self, event: ReleaseEvent) {
        if self.quiet {
            return;
        }
        match event {
            ReleaseEvent::StateStarted(state) => {
                // Confirm states prompt; a spinner would draw over the prompt.
                if !matches!(state, ReleaseState::VersionConfirm | ReleaseState::PublishConfirm) {
                    self.active = Some(spinner(format!("{state}...")));
                }
            }
            ReleaseEvent::StateCompleted(state, outcome) => {
                if let Some(active) = self.active.take() {
                    active.finish_and_clear();
                }
                print_state(state, &outcome);
            }
            ReleaseEvent::Warning(message) => {
                let line = format!("  {} {}", "!".yellow().bold(), message.yellow());
                match &self.active {
                    Some(active) => active.suspend(|| println!("{line}")),
                    None => println!("{line}"),
                }
            }
            ReleaseEvent::PublishSummary(summary) => print_publish_summary(&summary),
            ReleaseEvent::PackListing(listing) => {
                let print = || {
                    for line in listing.lines().filter(|line| !line.trim().is_empty()) {
                        println!("    {}", line.dimmed());
                    }
                };
                match &self.active {
                    Some(active) => active.suspend(print),
                    None => print(),
                }
            }
        }
    }
}

fn print_state(state: ReleaseState, outcome: &StateOutcome) {
    match outcome {
        StateOutcome::Success { message } => {
            println!(
                "  {} {} {}",
                "✓".green(),
                state.to_string().bold(),
                message.dimmed()
            );
        }
        StateOutcome::Skipped { reason } => {
            println!(
                "  {} {} {}",
                "–".yellow(),
                state.to_string().bold(),
                format!("skipped: {reason}").dimmed()
            );
        }
    }
}

fn print_publish_summary(summary: &PublishSummary) {
    let name = summary.name.as_deref().unwrap_or("(unnamed)");
    println!();
    println!("{}", "Publish summary".bold().underline());
    println!(
        "  {:<10} {}@{}",
        "Package".dimmed(),
        name.cyan(),
        summary.version.to_string().green().bold()
    );
    println!("  {:<10} {}", "Platform".dimmed(), summary.platform);
    println!("  {:<10} {}", "Tag".dimmed(), summary.tag);
    println!("  {:<10} {}", "Registry".dimmed(), summary.registry);
    if let Some(access) = &summary.access {
        println!("  {:<10} {access}", "Access".dimmed());
    }
    println!("  {:<10} {}", "Files".dimmed(), summary.files.join(", "));

    println!();
    println!("{}", "Contents".bold().underline());
    for file in &summary.contents {
        println!("  {:>10}  {}", HumanBytes(file.size).to_string().dimmed(), file.path);
    }

    println!();
    println!("{}", "package.json".bold().underline());
    for line in summary.manifest.lines() {
        println!("  {}", line.dimmed());
    }
    println!();
}

fn print_outcome(outcome: &ReleaseOutcome) {
    println!();
    println!(
        "{} Released {} {} → {} on {} as {}",
        "✓".green().bold(),
        outcome.platform.to_string().bold(),
        outcome.previous_version.to_string().dimmed(),
        outcome.version.to_string().green().bold(),
        outcome.tag.to_string().cyan(),
        outcome.user,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cli, Commands};
    use clap::Parser;

    fn parse(args: &[&str]) -> ReleaseArgs {
        let argv = ["relkit", "release"].iter().chain(args).copied();
        match Cli::try_parse_from(argv).unwrap().command {
            Some(Commands::Release(args)) => args,
            _ => panic!("expected release"),
        }
    }

    #[test]
    fn default_channel_is_latest_patch() {
        let release = parse(&["h5"]).release_config();
        assert_eq!(release, ReleaseConfig::latest());
    }

    #[test]
    fn beta_channel_and_flag_agree() {
        assert_eq!(parse(&["wechat", "beta"]).release_config(), ReleaseConfig::beta());
        assert_eq!(parse(&["wechat", "--beta"]).release_config(), ReleaseConfig::beta());
    }

    #[test]
    fn increment_overrides_channel_default() {
        let release = parse(&["uniapp", "beta", "--increment", "minor"]).release_config();
        assert_eq!(release.tag, Tag::Beta);
        assert_eq!(release.increment, IncrementKind::Minor);
    }

    #[test]
    fn explicit_version_implies_custom() {
        let release = parse(&["h5", "--version", "2.0.0-rc.1"]).release_config();
        assert_eq!(release.increment, IncrementKind::Custom);
        assert_eq!(release.version.unwrap().to_string(), "2.0.0-rc.1");
    }

    #[test]
    fn conflicting_channels_are_rejected() {
        let argv = ["relkit", "release", "h5", "--latest", "--beta"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn invalid_version_is_rejected() {
        let argv = ["relkit", "release", "h5", "--version", "v1.2"];
        assert!(Cli::try_parse_from(argv).is_err());
    }
}
