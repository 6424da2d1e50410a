//! Platform build orchestration.
//!
//! Runs each platform's own package scripts: `install`, `run build`, and
//! `run build:watch`. Batch operations walk [`Platform::ALL`] in order and keep
//! going after a platform is skipped or fails, recording every result in a
//! [`BatchReport`].

use std::io;
use std::process::Child;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::platform::{
    BUILD_SCRIPT, Platform, PlatformDescriptor, PlatformError, WATCH_SCRIPT, Workspace,
};
use crate::process::Tool;

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Errors from install and build operations.
#[derive(Error, Debug)]
pub enum BuildError {
    /// The platform is not buildable.
    #[error(transparent)]
    Validation(#[from] PlatformError),

    /// `install` exited with a non-zero status.
    #[error("{platform}: dependency install failed (exit {})", exit_code(.code))]
    Install {
        /// The platform.
        platform: Platform,
        /// Exit code, if any.
        code: Option<i32>,
        /// Captured stderr.
        stderr: String,
    },

    /// `run build` exited with a non-zero status.
    #[error("{platform}: build failed (exit {})", exit_code(.code))]
    Build {
        /// The platform.
        platform: Platform,
        /// Exit code, if any.
        code: Option<i32>,
        /// Captured stderr.
        stderr: String,
    },

    /// The package manager could not be started.
    #[error("{platform}: failed to run `{command}`: {source}")]
    Spawn {
        /// The platform.
        platform: Platform,
        /// The command line.
        command: String,
        /// Underlying I/O error.
        source: io::Error,
    },
}

fn exit_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

/// Result alias for build operations.
pub type BuildResult<T> = Result<T, BuildError>;

// ──────────────────────────────────────────────
// Outcomes
// ──────────────────────────────────────────────

/// Result of a single successful build request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum BuildOutcome {
    /// The build ran to completion.
    Completed,
    /// A watch build was started and left running.
    Watching {
        /// Process id of the watcher.
        pid: u32,
    },
}

/// Per-platform status in a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum BatchStatus {
    /// The operation finished.
    Succeeded,
    /// A watch build was started.
    Watching {
        /// Process id of the watcher.
        pid: u32,
    },
    /// The platform failed validation and was not attempted.
    Skipped {
        /// What was missing.
        reason: String,
    },
    /// The operation ran and failed.
    Failed {
        /// Error details.
        reason: String,
    },
}

/// One platform's entry in a [`BatchReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchEntry {
    /// The platform.
    pub platform: Platform,
    /// What happened.
    #[serde(flatten)]
    pub status: BatchStatus,
}

/// Results of a batch install or build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// One entry per platform, in build order.
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    /// True only when every platform was attempted and succeeded.
    ///
    /// A skipped platform counts as a failure of the batch.
    pub fn succeeded(&self) -> bool {
        self.entries.iter().all(|e| {
            matches!(
                e.status,
                BatchStatus::Succeeded | BatchStatus::Watching { .. }
            )
        })
    }

    /// Entries that did not succeed.
    pub fn problems(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries.iter().filter(|e| {
            matches!(
                e.status,
                BatchStatus::Skipped { .. } | BatchStatus::Failed { .. }
            )
        })
    }

    fn push(&mut self, platform: Platform, status: BatchStatus) {
        self.entries.push(BatchEntry { platform, status });
    }
}

// ──────────────────────────────────────────────
// Orchestrator
// ──────────────────────────────────────────────

/// Drives installs and builds for the platforms of one workspace.
#[derive(Debug)]
pub struct BuildOrchestrator {
    workspace: Workspace,
    tool: Tool,
    watchers: Vec<(Platform, Child)>,
}

impl BuildOrchestrator {
    /// Orchestrator for `workspace` using the configured package manager.
    pub fn new(workspace: Workspace, config: &Config) -> Self {
        Self {
            workspace,
            tool: Tool::parse(config.package_manager(), crate::config::DEFAULT_PACKAGE_MANAGER),
            watchers: Vec::new(),
        }
    }

    /// The workspace being built.
    pub const fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Whether `platform` can run `script`. No side effects.
    pub fn validate(&self, platform: Platform, script: &str) -> bool {
        crate::platform::validate(&self.workspace, platform, script)
    }

    /// Run `<pm> install` in the platform root.
    ///
    /// The root must hold a readable `package.json`; no script is required.
    #[instrument(skip(self), fields(%platform))]
    pub fn install_dependencies(&self, platform: Platform) -> BuildResult<()> {
        let root = PlatformDescriptor::resolve_package(&self.workspace, platform)?.root;

        let args = ["install"];
        let output = self
            .tool
            .run(&args, &root)
            .map_err(|source| BuildError::Spawn {
                platform,
                command: self.tool.display(&args),
                source,
            })?;
        if !output.success() {
            return Err(BuildError::Install {
                platform,
                code: output.code,
                stderr: output.message(),
            });
        }

        info!(%platform, "dependencies installed");
        Ok(())
    }

    /// Build one platform.
    ///
    /// A watch build is spawned and left running; its exit status is never
    /// observed. The child is kept so [`wait_for_watchers`](Self::wait_for_watchers)
    /// can hold the terminal.
    #[instrument(skip(self), fields(%platform, watch))]
    pub fn build(&mut self, platform: Platform, watch: bool) -> BuildResult<BuildOutcome> {
        let script = if watch { WATCH_SCRIPT } else { BUILD_SCRIPT };
        let descriptor = PlatformDescriptor::resolve(&self.workspace, platform, script)?;
        let args = ["run", script];
        let spawn_err = |source| BuildError::Spawn {
            platform,
            command: self.tool.display(&args),
            source,
        };

        if watch {
            let child = self.tool.spawn(&args, &descriptor.root).map_err(spawn_err)?;
            let pid = child.id();
            info!(%platform, pid, "watch build started");
            self.watchers.push((platform, child));
            return Ok(BuildOutcome::Watching { pid });
        }

        let output = self.tool.run(&args, &descriptor.root).map_err(spawn_err)?;
        if !output.success() {
            return Err(BuildError::Build {
                platform,
                code: output.code,
                stderr: output.message(),
            });
        }

        info!(%platform, "build completed");
        Ok(BuildOutcome::Completed)
    }

    /// Build every platform in order, continuing past skips and failures.
    #[instrument(skip(self))]
    pub fn build_all(&mut self, watch: bool) -> BatchReport {
        let script = if watch { WATCH_SCRIPT } else { BUILD_SCRIPT };
        let mut report = BatchReport::default();

        for platform in Platform::ALL {
            if let Err(err) = PlatformDescriptor::resolve(&self.workspace, platform, script) {
                warn!(%platform, error = %err, "skipping platform");
                report.push(platform, BatchStatus::Skipped { reason: err.to_string() });
                continue;
            }

            let status = match self.build(platform, watch) {
                Ok(BuildOutcome::Completed) => BatchStatus::Succeeded,
                Ok(BuildOutcome::Watching { pid }) => BatchStatus::Watching { pid },
                Err(err) => {
                    warn!(%platform, error = %err, "build failed");
                    BatchStatus::Failed { reason: err.to_string() }
                }
            };
            report.push(platform, status);
        }

        report
    }

    /// Install dependencies for every platform, continuing past failures.
    #[instrument(skip(self))]
    pub fn install_all(&self) -> BatchReport {
        let mut report = BatchReport::default();

        for platform in Platform::ALL {
            let status = match self.install_dependencies(platform) {
                Ok(()) => BatchStatus::Succeeded,
                Err(BuildError::Validation(err)) => {
                    warn!(%platform, error = %err, "skipping platform");
                    BatchStatus::Skipped { reason: err.to_string() }
                }
                Err(err) => {
                    warn!(%platform, error = %err, "install failed");
                    BatchStatus::Failed { reason: err.to_string() }
                }
            };
            report.push(platform, status);
        }

        report
    }

    /// Remove the shared output directory. A missing directory is not an error.
    #[instrument(skip(self))]
    pub fn clean(&self) -> io::Result<()> {
        let dir = self.workspace.output_dir();
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => {
                info!(%dir, "output directory removed");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Number of watch builds started by this orchestrator.
    pub fn watcher_count(&self) -> usize {
        self.watchers.len()
    }

    /// Block until every watch build exits.
    ///
    /// Exit statuses are logged only.
    pub fn wait_for_watchers(&mut self) {
        for (platform, mut child) in self.watchers.drain(..) {
            match child.wait() {
                Ok(status) => info!(%platform, ?status, "watch build exited"),
                Err(err) => warn!(%platform, error = %err, "failed to wait for watch build"),
            }
        }
    }
}
