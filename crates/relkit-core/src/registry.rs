//! Package registry client.
//!
//! Talks to the registry only through the package manager's own commands:
//! `whoami`, `pack --dry-run` and `publish`.

use std::fmt;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::process::{CommandOutput, Tool};

/// Errors from registry commands.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// `whoami` failed: not logged in or registry unreachable.
    #[error("not authenticated with the registry: {message}")]
    Unauthenticated {
        /// Output of the failed command.
        message: String,
    },

    /// A registry command exited with a non-zero status.
    #[error("`{command}` failed ({}): {message}", exit_status(.code))]
    CommandFailed {
        /// The command line that failed.
        command: String,
        /// Exit code, if any.
        code: Option<i32>,
        /// Output of the failed command.
        message: String,
    },

    /// The package manager could not be started.
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        /// The command line.
        command: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

fn exit_status(code: &Option<i32>) -> String {
    code.map_or_else(|| "killed by signal".to_string(), |c| format!("exit {c}"))
}

/// Result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Registry release channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    /// Stable channel.
    #[default]
    Latest,
    /// Prerelease channel.
    Beta,
}

impl Tag {
    /// Tag name passed to `publish --tag`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::Beta => "beta",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for `publish`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOptions {
    /// Release channel.
    pub tag: Tag,
    /// `--access` value.
    pub access: Option<String>,
    /// `--registry` value.
    pub registry: Option<String>,
}

/// Registry operations backed by a package manager command.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    tool: Tool,
}

impl RegistryClient {
    /// Client for the package manager command line `package_manager`.
    pub fn new(package_manager: &str) -> Self {
        Self {
            tool: Tool::parse(package_manager, crate::config::DEFAULT_PACKAGE_MANAGER),
        }
    }

    fn run(&self, args: &[&str], cwd: &Utf8Path) -> RegistryResult<CommandOutput> {
        self.tool.run(args, cwd).map_err(|source| RegistryError::Spawn {
            command: self.tool.display(args),
            source,
        })
    }

    /// Return the logged-in user name.
    #[instrument(skip(self), fields(%cwd))]
    pub fn whoami(&self, cwd: &Utf8Path) -> RegistryResult<String> {
        let output = self.run(&["whoami"], cwd)?;
        if !output.success() {
            return Err(RegistryError::Unauthenticated {
                message: output.message(),
            });
        }
        let user = output.stdout.trim().to_string();
        debug!(%user, "authenticated");
        Ok(user)
    }

    /// Run `pack --dry-run` in `dir`, returning its report.
    ///
    /// Failure is logged and swallowed: the dry run is informational.
    #[instrument(skip(self), fields(%dir))]
    pub fn pack_dry_run(&self, dir: &Utf8Path) -> Option<String> {
        match self.run(&["pack", "--dry-run"], dir) {
            Ok(output) if output.success() => {
                let mut report = output.stdout;
                report.push_str(&output.stderr);
                Some(report)
            }
            Ok(output) => {
                warn!(code = ?output.code, message = %output.message(), "pack dry run failed");
                None
            }
            Err(err) => {
                warn!(error = %err, "pack dry run could not start");
                None
            }
        }
    }

    /// Publish the package in `dir`.
    #[instrument(skip(self, options), fields(%dir, tag = %options.tag))]
    pub fn publish(&self, dir: &Utf8Path, options: &PublishOptions) -> RegistryResult<String> {
        let mut args = vec!["publish", "--tag", options.tag.as_str()];
        if let Some(access) = options.access.as_deref() {
            args.extend(["--access", access]);
        }
        if let Some(registry) = options.registry.as_deref() {
            args.extend(["--registry", registry]);
        }

        let output = self.run(&args, dir)?;
        if !output.success() {
            return Err(RegistryError::CommandFailed {
                command: self.tool.display(&args),
                code: output.code,
                message: output.message(),
            });
        }
        Ok(output.stdout.trim().to_string())
    }
}
