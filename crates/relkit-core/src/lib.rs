//! Core library for relkit.
//!
//! Builds, stages and publishes the platform adapters of a multi-platform
//! package workspace. The `relkit` CLI is a display layer over this crate.
//!
//! # Modules
//!
//! - [`build`] - Dependency installs, builds, watch builds, batch runs, clean
//! - [`config`] - Configuration loading and management
//! - [`error`] - Configuration error types
//! - [`manifest`] - `package.json` reading and writing
//! - [`platform`] - Platform set, artifact profiles, workspace layout
//! - [`process`] - External command helpers
//! - [`prompt`] - User interaction seam
//! - [`registry`] - Registry client over the package manager
//! - [`release`] - The release pipeline
//! - [`stage`] - Release staging
//! - [`version`] - Version parsing, increments, interactive confirmation
//!
//! # Quick Start
//!
//! ```no_run
//! use relkit_core::{BuildOrchestrator, ConfigLoader, Workspace};
//!
//! let config = ConfigLoader::new()
//!     .with_user_config(true)
//!     .load()
//!     .expect("Failed to load configuration");
//!
//! let workspace = Workspace::from_config(".", &config).expect("Invalid workspace layout");
//! let mut builder = BuildOrchestrator::new(workspace, &config);
//! let report = builder.build_all(false);
//! println!("all built: {}", report.succeeded());
//! ```
#![deny(unsafe_code)]

pub mod build;

pub mod config;

pub mod error;

pub mod manifest;

pub mod platform;

pub mod process;

pub mod prompt;

pub mod registry;

pub mod release;

pub mod stage;

pub mod version;

pub use build::{BatchReport, BatchStatus, BuildError, BuildOrchestrator, BuildOutcome};

pub use config::{Config, ConfigLoader, LogLevel};

pub use error::{ConfigError, ConfigResult};

pub use platform::{Platform, Workspace};

pub use prompt::{AssumeYes, PromptError, Prompter};

pub use release::{ReleaseConfig, ReleaseError, ReleaseEvent, ReleasePipeline};

pub use version::{IncrementKind, SemVer};
