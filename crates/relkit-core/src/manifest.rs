//! `package.json` access.
//!
//! The manifest is kept as an order-preserving JSON object so a rewrite only
//! changes the keys relkit touches.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Map, Value};
use thiserror::Error;

/// File name of a platform manifest.
pub const MANIFEST_FILE: &str = "package.json";

/// Errors from reading or writing a manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// The manifest could not be read or written.
    #[error("failed to access {path}: {source}")]
    Io {
        /// The manifest path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The manifest is not valid JSON.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// The manifest path.
        path: Utf8PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// The manifest is valid JSON but not an object.
    #[error("{path} is not a JSON object")]
    NotAnObject {
        /// The manifest path.
        path: Utf8PathBuf,
    },
}

/// Result alias for manifest operations.
pub type ManifestResult<T> = Result<T, ManifestError>;

/// An in-memory `package.json`.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageManifest {
    fields: Map<String, Value>,
}

impl PackageManifest {
    /// Read and parse a manifest file.
    pub fn read(path: &Utf8Path) -> ManifestResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// Parse manifest text. `path` is only used for error messages.
    pub fn parse(text: &str, path: &Utf8Path) -> ManifestResult<Self> {
        let value: Value = serde_json::from_str(text).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            _ => Err(ManifestError::NotAnObject {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Package name, if declared.
    pub fn name(&self) -> Option<&str> {
        self.fields.get("name").and_then(Value::as_str)
    }

    /// Version text, if declared.
    pub fn version(&self) -> Option<&str> {
        self.fields.get("version").and_then(Value::as_str)
    }

    /// Replace the version field, keeping its position.
    pub fn set_version(&mut self, version: &str) {
        self.set("version", Value::String(version.to_string()));
    }

    /// Declared scripts as `(name, command)` pairs, in manifest order.
    pub fn scripts(&self) -> Vec<(String, String)> {
        self.fields
            .get("scripts")
            .and_then(Value::as_object)
            .map(|scripts| {
                scripts
                    .iter()
                    .filter_map(|(name, cmd)| cmd.as_str().map(|c| (name.clone(), c.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `scripts.<name>` is declared.
    pub fn has_script(&self, name: &str) -> bool {
        self.fields
            .get("scripts")
            .and_then(Value::as_object)
            .is_some_and(|scripts| scripts.contains_key(name))
    }

    /// A `publishConfig` string field, such as `registry` or `access`.
    pub fn publish_config(&self, key: &str) -> Option<&str> {
        self.fields
            .get("publishConfig")
            .and_then(|pc| pc.get(key))
            .and_then(Value::as_str)
    }

    /// Raw field lookup.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Insert or replace a field. Existing keys keep their position.
    pub fn set(&mut self, key: &str, value: Value) {
        self.fields.insert(key.to_string(), value);
    }

    /// Remove a field, returning it if it was present.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.shift_remove(key)
    }

    /// Two-space pretty JSON followed by a newline.
    pub fn to_pretty_string(&self) -> String {
        let mut text = serde_json::to_string_pretty(&self.fields).unwrap_or_else(|_| "{}".into());
        text.push('\n');
        text
    }

    /// Write the manifest to `path`.
    pub fn write(&self, path: &Utf8Path) -> ManifestResult<()> {
        fs::write(path, self.to_pretty_string()).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Read just the `version` field of a manifest.
pub fn read_manifest_version(path: &Utf8Path) -> ManifestResult<Option<String>> {
    Ok(PackageManifest::read(path)?.version().map(str::to_string))
}

/// Rewrite only the `version` field of a manifest on disk.
pub fn write_manifest_version(path: &Utf8Path, version: &str) -> ManifestResult<()> {
    let mut manifest = PackageManifest::read(path)?;
    manifest.set_version(version);
    manifest.write(path)
}
