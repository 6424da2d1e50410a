//! Release pipeline: the full publish workflow for one platform.
//!
//! States run strictly in order and each one is a hard gate:
//!
//! `PrereqCheck → Test → VersionConfirm → Build → Stage → PublishConfirm →
//! Publish → Cleanup`
//!
//! Cleanup always runs. [`ReleasePipeline::execute`] performs it explicitly on
//! the way out, and a guard repeats it on drop so a panic unwinding through
//! the pipeline still removes the staging directory and releases the lock.
//!
//! # Usage
//!
//! 1. [`ReleasePipeline::new`] resolves settings.
//! 2. [`ReleasePipeline::lock`] takes the per-platform release lock.
//! 3. [`ReleasePipeline::execute`] runs every state, reporting progress through
//!    an `on_event` callback.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::build::{BuildError, BuildOrchestrator};
use crate::config::{Config, DEFAULT_REGISTRY};
use crate::platform::{
    BUILD_SCRIPT, Platform, PlatformDescriptor, PlatformError, TEST_SCRIPT, Workspace,
};
use crate::process::Tool;
use crate::prompt::{PromptError, Prompter};
use crate::registry::{PublishOptions, RegistryClient, RegistryError, Tag};
use crate::stage::{self, StageError, StagedFile};
use crate::version::interactive::{VersionRequest, confirm_version};
use crate::version::{IncrementKind, SemVer, VersionError};

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Errors from the release pipeline.
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// The platform is not releasable.
    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// A prerequisite is not met.
    #[error("prerequisite failed: {0}")]
    Prerequisite(String),

    /// The test script failed.
    #[error("tests failed ({}): {message}", exit_status(.code))]
    Test {
        /// Exit code, if any.
        code: Option<i32>,
        /// Captured output.
        message: String,
    },

    /// Version selection failed.
    #[error(transparent)]
    Version(VersionError),

    /// The build failed.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// Staging failed.
    #[error(transparent)]
    Stage(#[from] StageError),

    /// A registry command failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The user declined a confirmation.
    #[error("release cancelled")]
    Cancelled,

    /// Another release of this platform is running.
    #[error("another release is in progress ({path} exists)")]
    Locked {
        /// The lock file.
        path: Utf8PathBuf,
    },

    /// The lock file could not be created.
    #[error("failed to create release lock {path}: {source}")]
    Lock {
        /// The lock file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A prompt could not be shown.
    #[error("{0}")]
    Prompt(String),
}

impl ReleaseError {
    /// Whether the user backed out rather than something failing.
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<VersionError> for ReleaseError {
    fn from(err: VersionError) -> Self {
        match err {
            VersionError::Cancelled => Self::Cancelled,
            other => Self::Version(other),
        }
    }
}

impl From<PromptError> for ReleaseError {
    fn from(err: PromptError) -> Self {
        match err {
            PromptError::Cancelled => Self::Cancelled,
            PromptError::Failed(message) => Self::Prompt(message),
        }
    }
}

fn exit_status(code: &Option<i32>) -> String {
    code.map_or_else(|| "killed by signal".to_string(), |c| format!("exit {c}"))
}

/// Result alias for release operations.
pub type ReleaseResult<T> = Result<T, ReleaseError>;

// ──────────────────────────────────────────────
// Settings
// ──────────────────────────────────────────────

/// What to release: channel and version strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseConfig {
    /// Registry tag to publish under.
    pub tag: Tag,
    /// Increment preselected in the version picker.
    pub increment: IncrementKind,
    /// Version given up front.
    pub version: Option<SemVer>,
}

impl ReleaseConfig {
    /// Stable release: tag `latest`, patch increment.
    pub const fn latest() -> Self {
        Self {
            tag: Tag::Latest,
            increment: IncrementKind::Patch,
            version: None,
        }
    }

    /// Prerelease: tag `beta`, prerelease increment.
    pub const fn beta() -> Self {
        Self {
            tag: Tag::Beta,
            increment: IncrementKind::Prerelease,
            version: None,
        }
    }

    /// Defaults for `tag`.
    pub const fn for_tag(tag: Tag) -> Self {
        match tag {
            Tag::Latest => Self::latest(),
            Tag::Beta => Self::beta(),
        }
    }

    /// Override the increment kind.
    #[must_use]
    pub const fn with_increment(mut self, increment: IncrementKind) -> Self {
        self.increment = increment;
        self
    }

    /// Release exactly `version`.
    #[must_use]
    pub fn with_version(mut self, version: SemVer) -> Self {
        self.increment = IncrementKind::Custom;
        self.version = Some(version);
        self
    }
}

// ──────────────────────────────────────────────
// States and events
// ──────────────────────────────────────────────

/// States of the release pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseState {
    /// Registry login and build output checks.
    PrereqCheck,
    /// Run the platform's test script.
    Test,
    /// Choose and persist the next version.
    VersionConfirm,
    /// Build the platform.
    Build,
    /// Stage the publishable tree.
    Stage,
    /// Show the publish summary and ask for confirmation.
    PublishConfirm,
    /// Publish to the registry.
    Publish,
    /// Remove staging state.
    Cleanup,
}

impl ReleaseState {
    /// All states, in execution order.
    pub const ALL: [Self; 8] = [
        Self::PrereqCheck,
        Self::Test,
        Self::VersionConfirm,
        Self::Build,
        Self::Stage,
        Self::PublishConfirm,
        Self::Publish,
        Self::Cleanup,
    ];
}

impl fmt::Display for ReleaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PrereqCheck => "prerequisites",
            Self::Test => "test",
            Self::VersionConfirm => "version",
            Self::Build => "build",
            Self::Stage => "stage",
            Self::PublishConfirm => "confirm",
            Self::Publish => "publish",
            Self::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// Outcome of a single state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum StateOutcome {
    /// State completed.
    Success {
        /// What happened.
        message: String,
    },
    /// State had nothing to do.
    Skipped {
        /// Why.
        reason: String,
    },
}

/// Everything shown before the publish confirmation.
#[derive(Debug, Clone, Serialize)]
pub struct PublishSummary {
    /// The platform.
    pub platform: Platform,
    /// Package name from the staged manifest.
    pub name: Option<String>,
    /// Version being published.
    pub version: SemVer,
    /// Registry tag.
    pub tag: Tag,
    /// Registry URL.
    pub registry: String,
    /// Access level, if set.
    pub access: Option<String>,
    /// The staged manifest's `files` list.
    pub files: Vec<String>,
    /// Every staged file with its size.
    pub contents: Vec<StagedFile>,
    /// The staged manifest text.
    pub manifest: String,
}

/// Events emitted while the pipeline runs.
#[derive(Debug, Clone)]
pub enum ReleaseEvent {
    /// A state has started.
    StateStarted(ReleaseState),
    /// A state has completed.
    StateCompleted(ReleaseState, StateOutcome),
    /// Something worth telling the user that does not stop the release.
    Warning(String),
    /// The summary to review before confirming the publish.
    PublishSummary(Box<PublishSummary>),
    /// What the package manager's dry run says it will pack.
    PackListing(String),
}

/// Result of a completed release.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseOutcome {
    /// The platform.
    pub platform: Platform,
    /// Registry tag.
    pub tag: Tag,
    /// Version before the release.
    pub previous_version: SemVer,
    /// Published version.
    pub version: SemVer,
    /// Registry user that published.
    pub user: String,
    /// Outcome of every state.
    pub states: Vec<(ReleaseState, StateOutcome)>,
}

// ──────────────────────────────────────────────
// Lock and scope guard
// ──────────────────────────────────────────────

/// Exclusive per-platform release lock, removed on drop.
#[derive(Debug)]
pub struct ReleaseLock {
    path: Utf8PathBuf,
    held: bool,
}

impl ReleaseLock {
    /// Create the lock file, failing if it already exists.
    pub fn acquire(path: &Utf8Path) -> ReleaseResult<Self> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|source| match source.kind() {
                io::ErrorKind::AlreadyExists => ReleaseError::Locked {
                    path: path.to_path_buf(),
                },
                _ => ReleaseError::Lock {
                    path: path.to_path_buf(),
                    source,
                },
            })?;
        let _ = writeln!(file, "{}", std::process::id());
        debug!(%path, "release lock acquired");
        Ok(Self {
            path: path.to_path_buf(),
            held: true,
        })
    }

    /// The lock file path.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Remove the lock file. Safe to call more than once.
    pub fn release(&mut self) {
        if !self.held {
            return;
        }
        self.held = false;
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path, "release lock removed"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(path = %self.path, error = %err, "failed to remove release lock"),
        }
    }
}

impl Drop for ReleaseLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// Transient state owned by one pipeline run.
///
/// `cwd` is where the next external command runs; it moves into the staging
/// directory for publishing and is reset to the platform root by cleanup.
struct ReleaseScope {
    platform_root: Utf8PathBuf,
    staging: Utf8PathBuf,
    cwd: Utf8PathBuf,
    lock: ReleaseLock,
    cleaned: bool,
}

impl ReleaseScope {
    fn new(platform_root: Utf8PathBuf, staging: Utf8PathBuf, lock: ReleaseLock) -> Self {
        Self {
            cwd: platform_root.clone(),
            platform_root,
            staging,
            lock,
            cleaned: false,
        }
    }

    /// Reset `cwd`, remove staging, release the lock. Failures only warn.
    fn cleanup(&mut self) -> StateOutcome {
        if self.cleaned {
            return StateOutcome::Skipped {
                reason: "already cleaned up".into(),
            };
        }
        self.cleaned = true;
        self.cwd = self.platform_root.clone();

        let message = match fs::remove_dir_all(&self.staging) {
            Ok(()) => format!("removed {}", self.staging),
            Err(err) if err.kind() == io::ErrorKind::NotFound => "nothing to remove".to_string(),
            Err(err) => {
                warn!(staging = %self.staging, error = %err, "failed to remove staging directory");
                format!("could not remove {}: {err}", self.staging)
            }
        };
        self.lock.release();
        StateOutcome::Success { message }
    }
}

impl Drop for ReleaseScope {
    fn drop(&mut self) {
        if !self.cleaned {
            warn!("release interrupted, cleaning up");
            self.cleanup();
        }
    }
}

// ──────────────────────────────────────────────
// Pipeline
// ──────────────────────────────────────────────

/// The release workflow for one platform.
#[derive(Debug, Clone)]
pub struct ReleasePipeline {
    workspace: Workspace,
    platform: Platform,
    release: ReleaseConfig,
    config: Config,
}

/// Values carried from one state to the next.
struct Progress {
    user: String,
    previous: SemVer,
    version: SemVer,
}

impl ReleasePipeline {
    /// Pipeline for `platform` in `workspace`.
    pub fn new(workspace: Workspace, platform: Platform, release: ReleaseConfig, config: &Config) -> Self {
        Self {
            workspace,
            platform,
            release,
            config: config.clone(),
        }
    }

    /// The platform being released.
    pub const fn platform(&self) -> Platform {
        self.platform
    }

    /// The staging directory this pipeline will create.
    pub fn staging_dir(&self) -> Utf8PathBuf {
        self.workspace.staging_dir(self.platform)
    }

    /// Take the per-platform release lock.
    pub fn lock(&self) -> ReleaseResult<ReleaseLock> {
        let root = self.workspace.platform_root(self.platform);
        if !root.is_dir() {
            return Err(PlatformError::MissingRoot {
                platform: self.platform,
                root,
            }
            .into());
        }
        ReleaseLock::acquire(&self.workspace.lock_path(self.platform))
    }

    /// Run every state, then clean up.
    ///
    /// The lock is released and the staging directory removed whether this
    /// returns `Ok` or `Err`.
    #[instrument(skip_all, fields(platform = %self.platform, tag = %self.release.tag))]
    pub fn execute(
        self,
        lock: ReleaseLock,
        prompter: &mut dyn Prompter,
        mut on_event: impl FnMut(ReleaseEvent),
    ) -> ReleaseResult<ReleaseOutcome> {
        let mut scope = ReleaseScope::new(
            self.workspace.platform_root(self.platform),
            self.staging_dir(),
            lock,
        );
        let mut states = Vec::new();

        let result = self.run_states(&mut scope, prompter, &mut on_event, &mut states);

        on_event(ReleaseEvent::StateStarted(ReleaseState::Cleanup));
        let outcome = scope.cleanup();
        on_event(ReleaseEvent::StateCompleted(ReleaseState::Cleanup, outcome.clone()));
        states.push((ReleaseState::Cleanup, outcome));

        match &result {
            Ok(progress) => info!(version = %progress.version, "release published"),
            Err(err) if err.is_cancelled() => info!("release cancelled"),
            Err(err) => warn!(error = %err, "release failed"),
        }

        let progress = result?;
        Ok(ReleaseOutcome {
            platform: self.platform,
            tag: self.release.tag,
            previous_version: progress.previous,
            version: progress.version,
            user: progress.user,
            states,
        })
    }

    fn run_states(
        &self,
        scope: &mut ReleaseScope,
        prompter: &mut dyn Prompter,
        on_event: &mut impl FnMut(ReleaseEvent),
        states: &mut Vec<(ReleaseState, StateOutcome)>,
    ) -> ReleaseResult<Progress> {
        let platform = self.platform;
        let registry = RegistryClient::new(self.config.package_manager());
        let mut record = |state: ReleaseState, outcome: StateOutcome, on_event: &mut dyn FnMut(ReleaseEvent)| {
            on_event(ReleaseEvent::StateCompleted(state, outcome.clone()));
            states.push((state, outcome));
        };

        // ── PrereqCheck ──
        on_event(ReleaseEvent::StateStarted(ReleaseState::PrereqCheck));
        let descriptor = PlatformDescriptor::resolve(&self.workspace, platform, BUILD_SCRIPT)?;
        let user = registry.whoami(&scope.cwd).map_err(|err| match err {
            RegistryError::Unauthenticated { message } => {
                ReleaseError::Prerequisite(format!("not logged in to the registry: {message}"))
            }
            other => other.into(),
        })?;
        let output = self.workspace.platform_output(platform);
        if !output.is_dir() {
            return Err(ReleaseError::Prerequisite(format!(
                "build output {output} does not exist (run `relkit build {platform}` first)"
            )));
        }
        record(
            ReleaseState::PrereqCheck,
            StateOutcome::Success {
                message: format!("logged in as {user}"),
            },
            on_event,
        );

        // ── Test ──
        on_event(ReleaseEvent::StateStarted(ReleaseState::Test));
        let outcome = if descriptor.has_script(TEST_SCRIPT) {
            let tool = Tool::parse(self.config.package_manager(), crate::config::DEFAULT_PACKAGE_MANAGER);
            let args = ["run", TEST_SCRIPT];
            let result = tool.run(&args, &scope.cwd).map_err(|err| ReleaseError::Test {
                code: None,
                message: format!("failed to run `{}`: {err}", tool.display(&args)),
            })?;
            if !result.success() {
                return Err(ReleaseError::Test {
                    code: result.code,
                    message: result.message(),
                });
            }
            StateOutcome::Success {
                message: "tests passed".into(),
            }
        } else {
            on_event(ReleaseEvent::Warning(format!(
                "{platform} declares no \"test\" script; releasing untested"
            )));
            StateOutcome::Skipped {
                reason: "no test script".into(),
            }
        };
        record(ReleaseState::Test, outcome, on_event);

        // ── VersionConfirm ──
        on_event(ReleaseEvent::StateStarted(ReleaseState::VersionConfirm));
        let request = VersionRequest {
            label: self.config.prerelease_label().to_string(),
            default_kind: self.release.increment,
            custom: self.release.version.clone(),
        };
        let decision = confirm_version(&descriptor.manifest_path, &request, prompter)?;
        let message = if decision.written {
            format!("{} → {}", decision.previous, decision.version)
        } else {
            format!("keeping {}", decision.version)
        };
        record(ReleaseState::VersionConfirm, StateOutcome::Success { message }, on_event);

        // ── Build ──
        on_event(ReleaseEvent::StateStarted(ReleaseState::Build));
        let mut builder = BuildOrchestrator::new(self.workspace.clone(), &self.config);
        builder.build(platform, false)?;
        record(
            ReleaseState::Build,
            StateOutcome::Success {
                message: format!("built {platform}"),
            },
            on_event,
        );

        // ── Stage ──
        on_event(ReleaseEvent::StateStarted(ReleaseState::Stage));
        let staged = stage::stage(&self.workspace, platform, &decision.version)?;
        for name in &staged.missing {
            on_event(ReleaseEvent::Warning(format!("{name} was not produced by the build")));
        }
        record(
            ReleaseState::Stage,
            StateOutcome::Success {
                message: format!("staged {} entries in {}", staged.files.len(), staged.dir),
            },
            on_event,
        );

        // ── PublishConfirm ──
        on_event(ReleaseEvent::StateStarted(ReleaseState::PublishConfirm));
        let registry_url = self
            .config
            .registry()
            .or_else(|| staged.manifest.publish_config("registry"))
            .unwrap_or(DEFAULT_REGISTRY)
            .to_string();
        let access = self
            .config
            .access()
            .or_else(|| staged.manifest.publish_config("access"))
            .map(str::to_string);
        let name = staged.manifest.name().map(str::to_string);
        let summary = PublishSummary {
            platform,
            name: name.clone(),
            version: decision.version.clone(),
            tag: self.release.tag,
            registry: registry_url.clone(),
            access: access.clone(),
            files: staged.files.clone(),
            contents: stage::list_contents(&staged.dir)?,
            manifest: staged.manifest.to_pretty_string(),
        };
        on_event(ReleaseEvent::PublishSummary(Box::new(summary)));
        let question = format!(
            "Publish {}@{} to {registry_url} with tag \"{}\"?",
            name.as_deref().unwrap_or(platform.id()),
            decision.version,
            self.release.tag
        );
        if !prompter.confirm(&question, false)? {
            return Err(ReleaseError::Cancelled);
        }
        record(
            ReleaseState::PublishConfirm,
            StateOutcome::Success {
                message: "confirmed".into(),
            },
            on_event,
        );

        // ── Publish ──
        on_event(ReleaseEvent::StateStarted(ReleaseState::Publish));
        scope.cwd = staged.dir.clone();
        match registry.pack_dry_run(&scope.cwd) {
            Some(listing) => {
                info!(%platform, lines = listing.lines().count(), "pack dry run listing");
                on_event(ReleaseEvent::PackListing(listing));
            }
            None => on_event(ReleaseEvent::Warning("pack dry run failed; publishing anyway".into())),
        }
        let options = PublishOptions {
            tag: self.release.tag,
            access: self.config.access().map(str::to_string),
            registry: self.config.registry().map(str::to_string),
        };
        registry.publish(&scope.cwd, &options)?;
        record(
            ReleaseState::Publish,
            StateOutcome::Success {
                message: format!("published {} with tag {}", decision.version, self.release.tag),
            },
            on_event,
        );

        Ok(Progress {
            user,
            previous: decision.previous,
            version: decision.version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn utf8_tmp() -> (TempDir, Utf8PathBuf) {
        let tmp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        (tmp, dir)
    }

    #[test]
    fn release_config_defaults() {
        assert_eq!(ReleaseConfig::latest().tag, Tag::Latest);
        assert_eq!(ReleaseConfig::latest().increment, IncrementKind::Patch);
        assert_eq!(ReleaseConfig::beta().increment, IncrementKind::Prerelease);
        assert_eq!(ReleaseConfig::for_tag(Tag::Beta), ReleaseConfig::beta());

        let custom = ReleaseConfig::latest().with_version(SemVer::new(2, 0, 0));
        assert_eq!(custom.increment, IncrementKind::Custom);
        assert_eq!(
            ReleaseConfig::beta().with_increment(IncrementKind::Minor).increment,
            IncrementKind::Minor
        );
    }

    #[test]
    fn state_display_and_serde() {
        assert_eq!(ReleaseState::PrereqCheck.to_string(), "prerequisites");
        assert_eq!(
            serde_json::to_string(&ReleaseState::PublishConfirm).unwrap(),
            "\"publish_confirm\""
        );
        assert_eq!(ReleaseState::ALL.len(), 8);
        assert_eq!(ReleaseState::ALL[7], ReleaseState::Cleanup);
    }

    #[test]
    fn state_outcome_serializes() {
        let json = serde_json::to_value(StateOutcome::Skipped {
            reason: "no test script".into(),
        })
        .unwrap();
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["reason"], "no test script");
    }

    #[test]
    fn cancellations_map_to_cancelled() {
        assert!(ReleaseError::from(VersionError::Cancelled).is_cancelled());
        assert!(ReleaseError::from(PromptError::Cancelled).is_cancelled());
        assert!(!ReleaseError::from(PromptError::Failed("no tty".into())).is_cancelled());
    }

    #[test]
    fn lock_is_exclusive_and_released_on_drop() {
        let (_tmp, dir) = utf8_tmp();
        let path = dir.join(".release.lock");

        let lock = ReleaseLock::acquire(&path).unwrap();
        assert!(path.exists());
        assert!(matches!(
            ReleaseLock::acquire(&path),
            Err(ReleaseError::Locked { .. })
        ));

        drop(lock);
        assert!(!path.exists());
        let _again = ReleaseLock::acquire(&path).unwrap();
    }

    #[test]
    fn scope_cleanup_is_idempotent() {
        let (_tmp, dir) = utf8_tmp();
        let staging = dir.join(".release-staging");
        fs::create_dir_all(staging.join("types")).unwrap();
        let lock = ReleaseLock::acquire(&dir.join(".release.lock")).unwrap();

        let mut scope = ReleaseScope::new(dir.clone(), staging.clone(), lock);
        scope.cwd = staging.clone();

        assert!(matches!(scope.cleanup(), StateOutcome::Success { .. }));
        assert_eq!(scope.cwd, dir);
        assert!(!staging.exists());
        assert!(!dir.join(".release.lock").exists());
        assert!(matches!(scope.cleanup(), StateOutcome::Skipped { .. }));
    }

    #[test]
    fn scope_drop_cleans_up() {
        let (_tmp, dir) = utf8_tmp();
        let staging = dir.join(".release-staging");
        fs::create_dir_all(&staging).unwrap();
        let lock = ReleaseLock::acquire(&dir.join(".release.lock")).unwrap();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scope = ReleaseScope::new(dir.clone(), staging.clone(), lock);
            panic!("boom");
        }));

        assert!(result.is_err());
        assert!(!staging.exists());
        assert!(!dir.join(".release.lock").exists());
    }
}
