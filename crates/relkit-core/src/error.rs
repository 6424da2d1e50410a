//! Error types for relkit-core configuration.
//!
//! Each orchestration module owns its own error enum (`BuildError`,
//! `StageError`, `ReleaseError`, ...). This module only covers config loading.

use thiserror::Error;

/// Errors that can occur when working with configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),

    /// A workspace path setting would point relkit at files it does not own.
    #[error("invalid workspace.{key} `{value}`: {reason}")]
    InvalidPath {
        /// Setting name under `[workspace]`.
        key: &'static str,
        /// The configured value.
        value: String,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;
