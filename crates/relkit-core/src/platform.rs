//! Platform adapters and workspace layout.
//!
//! A workspace holds one package per [`Platform`] under
//! `<root>/<platforms_dir>/<id>`. Builds write into the shared output
//! directory at `<root>/<output_dir>/<id>`.
//!
//! Descriptors are resolved from disk on every call and never cached, so a
//! manifest edited between two commands is always picked up.

use std::fmt;
use std::str::FromStr;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::{self, Config};
use crate::error::{ConfigError, ConfigResult};
use crate::manifest::{MANIFEST_FILE, ManifestError, PackageManifest};

/// Script every buildable platform must declare.
pub const BUILD_SCRIPT: &str = "build";
/// Script used by watch builds.
pub const WATCH_SCRIPT: &str = "build:watch";
/// Optional test script run by the release pipeline.
pub const TEST_SCRIPT: &str = "test";
/// Type declarations directory inside a platform output directory.
pub const TYPES_DIR: &str = "types";
/// Type declarations entry point, relative to the package root.
pub const TYPES_ENTRY: &str = "types/index.d.ts";
/// Lock file created inside a platform root while a release runs.
pub const LOCK_FILE: &str = ".release.lock";

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Errors from resolving a platform.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// The platform root directory does not exist.
    #[error("{platform}: platform directory {root} does not exist")]
    MissingRoot {
        /// The platform.
        platform: Platform,
        /// Expected root directory.
        root: Utf8PathBuf,
    },

    /// The platform has no `package.json`.
    #[error("{platform}: manifest {path} does not exist")]
    MissingManifest {
        /// The platform.
        platform: Platform,
        /// Expected manifest path.
        path: Utf8PathBuf,
    },

    /// The manifest does not declare a required script.
    #[error("{platform}: manifest does not declare a \"{script}\" script")]
    MissingScript {
        /// The platform.
        platform: Platform,
        /// The missing script name.
        script: String,
    },

    /// The manifest exists but could not be read.
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// Result alias for platform operations.
pub type PlatformResult<T> = Result<T, PlatformError>;

// ──────────────────────────────────────────────
// Platform
// ──────────────────────────────────────────────

/// A target platform adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Browser (H5) build.
    H5,
    /// WeChat mini-program build.
    Wechat,
    /// uni-app build.
    Uniapp,
}

impl Platform {
    /// All platforms, in build order.
    pub const ALL: [Self; 3] = [Self::H5, Self::Wechat, Self::Uniapp];

    /// Directory and CLI identifier.
    pub const fn id(self) -> &'static str {
        match self {
            Self::H5 => "h5",
            Self::Wechat => "wechat",
            Self::Uniapp => "uniapp",
        }
    }

    /// Bundle files this platform publishes. Each also ships a `.map`.
    pub const fn bundles(self) -> &'static [&'static str] {
        match self {
            Self::H5 | Self::Uniapp => &["index.js", "index.min.js", "index.esm.js"],
            Self::Wechat => &["index.js", "index.min.js"],
        }
    }

    /// Static asset tree copied from the platform root, if any.
    pub const fn asset_dir(self) -> Option<&'static str> {
        match self {
            Self::H5 => None,
            Self::Wechat | Self::Uniapp => Some("components"),
        }
    }

    /// Whether an ES module bundle is produced.
    pub const fn has_module_bundle(self) -> bool {
        matches!(self, Self::H5 | Self::Uniapp)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.id().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown platform '{s}' (expected h5, wechat or uniapp)"))
    }
}

// ──────────────────────────────────────────────
// Workspace layout
// ──────────────────────────────────────────────

/// Resolved paths of a relkit workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: Utf8PathBuf,
    platforms_dir: Utf8PathBuf,
    output_dir: Utf8PathBuf,
    staging_name: String,
}

impl Workspace {
    /// Default layout rooted at `root`.
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            platforms_dir: Utf8PathBuf::from(config::DEFAULT_PLATFORMS_DIR),
            output_dir: Utf8PathBuf::from(config::DEFAULT_OUTPUT_DIR),
            staging_name: config::DEFAULT_STAGING_DIR.to_string(),
        }
    }

    /// Layout rooted at `root` with overrides from `config`.
    ///
    /// `clean` and staging remove these directories wholesale, so the output
    /// directory must stay clear of the workspace root and every platform
    /// root, and the staging name must be a single plain directory name.
    pub fn from_config(root: impl Into<Utf8PathBuf>, config: &Config) -> ConfigResult<Self> {
        let workspace = Self {
            root: root.into(),
            platforms_dir: config.platforms_dir(),
            output_dir: config.output_dir(),
            staging_name: config.staging_dir().to_string(),
        };
        workspace.check_staging_name()?;
        workspace.check_output_dir()?;
        Ok(workspace)
    }

    fn check_staging_name(&self) -> ConfigResult<()> {
        let mut components = Utf8Path::new(&self.staging_name).components();
        match (components.next(), components.next()) {
            (Some(Utf8Component::Normal(_)), None) => Ok(()),
            _ => Err(ConfigError::InvalidPath {
                key: "staging_dir",
                value: self.staging_name.clone(),
                reason: "must be a single directory name",
            }),
        }
    }

    fn check_output_dir(&self) -> ConfigResult<()> {
        let invalid = |reason| ConfigError::InvalidPath {
            key: "output_dir",
            value: self.output_dir.to_string(),
            reason,
        };

        if self.output_dir.is_absolute() || self.output_dir.has_root() {
            return Err(invalid("must be relative to the workspace root"));
        }
        let mut has_name = false;
        for component in self.output_dir.components() {
            match component {
                Utf8Component::Normal(_) => has_name = true,
                Utf8Component::CurDir => {}
                _ => return Err(invalid("must not leave the workspace root")),
            }
        }
        if !has_name {
            return Err(invalid("must name a directory below the workspace root"));
        }

        let output = normalize(&self.output_dir());
        let platforms = normalize(&self.root.join(&self.platforms_dir));
        if Platform::ALL
            .into_iter()
            .any(|platform| platforms.join(platform.id()).starts_with(&output))
        {
            return Err(invalid("must not contain the platform sources"));
        }
        Ok(())
    }

    /// Workspace root.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// `<root>/<platforms_dir>/<id>`.
    pub fn platform_root(&self, platform: Platform) -> Utf8PathBuf {
        self.root.join(&self.platforms_dir).join(platform.id())
    }

    /// `<platform root>/package.json`.
    pub fn manifest_path(&self, platform: Platform) -> Utf8PathBuf {
        self.platform_root(platform).join(MANIFEST_FILE)
    }

    /// Shared build output directory.
    pub fn output_dir(&self) -> Utf8PathBuf {
        self.root.join(&self.output_dir)
    }

    /// Build output of one platform.
    pub fn platform_output(&self, platform: Platform) -> Utf8PathBuf {
        self.output_dir().join(platform.id())
    }

    /// Ephemeral staging directory of one platform.
    pub fn staging_dir(&self, platform: Platform) -> Utf8PathBuf {
        self.platform_root(platform).join(&self.staging_name)
    }

    /// Release lock file of one platform.
    pub fn lock_path(&self, platform: Platform) -> Utf8PathBuf {
        self.platform_root(platform).join(LOCK_FILE)
    }
}

/// Lexically resolve `.` and `..` so layouts can be compared.
fn normalize(path: &Utf8Path) -> Utf8PathBuf {
    let mut out = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

// ──────────────────────────────────────────────
// Descriptor
// ──────────────────────────────────────────────

/// A platform resolved against the filesystem.
#[derive(Debug, Clone)]
pub struct PlatformDescriptor {
    /// The platform.
    pub platform: Platform,
    /// Platform root directory.
    pub root: Utf8PathBuf,
    /// Path of its `package.json`.
    pub manifest_path: Utf8PathBuf,
    /// Declared scripts.
    pub scripts: Vec<(String, String)>,
}

impl PlatformDescriptor {
    /// Resolve `platform`, requiring its root, manifest and `script`.
    pub fn resolve(workspace: &Workspace, platform: Platform, script: &str) -> PlatformResult<Self> {
        let descriptor = Self::resolve_package(workspace, platform)?;
        if !descriptor.has_script(script) {
            return Err(PlatformError::MissingScript {
                platform,
                script: script.to_string(),
            });
        }
        Ok(descriptor)
    }

    /// Resolve `platform`, requiring only its root and a readable manifest.
    pub fn resolve_package(workspace: &Workspace, platform: Platform) -> PlatformResult<Self> {
        let root = workspace.platform_root(platform);
        if !root.is_dir() {
            return Err(PlatformError::MissingRoot { platform, root });
        }

        let manifest_path = workspace.manifest_path(platform);
        if !manifest_path.is_file() {
            return Err(PlatformError::MissingManifest {
                platform,
                path: manifest_path,
            });
        }

        let manifest = PackageManifest::read(&manifest_path)?;
        debug!(%platform, %root, "platform resolved");
        Ok(Self {
            platform,
            root,
            manifest_path,
            scripts: manifest.scripts(),
        })
    }

    /// Whether `name` is a declared script.
    pub fn has_script(&self, name: &str) -> bool {
        self.scripts.iter().any(|(script, _)| script == name)
    }
}

/// Side-effect free check that `platform` can run `script`.
pub fn validate(workspace: &Workspace, platform: Platform, script: &str) -> bool {
    PlatformDescriptor::resolve(workspace, platform, script).is_ok()
}
