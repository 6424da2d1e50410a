//! Configuration loading and discovery.
//!
//! Configuration is layered with figment, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. User config: `~/.config/relkit/config.<ext>`
//! 3. Project config: `.relkit.<ext>` or `relkit.<ext>` in the search root or
//!    any parent, stopping at a `.git` boundary
//! 4. Explicit files added with [`ConfigLoader::with_file`]
//!
//! Where `<ext>` is one of `toml`, `yaml`, `yml`, `json`.
//!
//! Every section is optional. Accessors on [`Config`] resolve the effective
//! value, so call sites never repeat the defaults.
//!
//! # Example
//! ```no_run
//! use camino::Utf8PathBuf;
//! use relkit_core::config::ConfigLoader;
//!
//! let cwd = Utf8PathBuf::try_from(std::env::current_dir().unwrap()).unwrap();
//! let config = ConfigLoader::new().with_project_search(&cwd).load().unwrap();
//! println!("package manager: {}", config.package_manager());
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Default directory (under the workspace root) holding one folder per platform.
pub const DEFAULT_PLATFORMS_DIR: &str = "packages";
/// Default shared build output directory (under the workspace root).
pub const DEFAULT_OUTPUT_DIR: &str = "dist";
/// Default staging directory name (under each platform root).
pub const DEFAULT_STAGING_DIR: &str = ".release-staging";
/// Default package manager command.
pub const DEFAULT_PACKAGE_MANAGER: &str = "npm";
/// Default label attached by prerelease increments.
pub const DEFAULT_PRERELEASE_LABEL: &str = "beta";
/// Registry shown when neither config nor the manifest names one.
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org/";

/// The configuration for relkit.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Log level for the application (e.g., "debug", "info", "warn", "error").
    pub log_level: LogLevel,
    /// Directory for JSONL log files (falls back to platform defaults if unset).
    pub log_dir: Option<Utf8PathBuf>,
    /// Workspace layout overrides.
    pub workspace: Option<WorkspaceConfig>,
    /// External tool overrides.
    pub toolchain: Option<ToolchainConfig>,
    /// Release workflow settings.
    pub release: Option<ReleaseSettings>,
}

/// Where platforms, build output and staging live.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct WorkspaceConfig {
    /// Directory containing `<platform>/package.json` (default: `packages`).
    pub platforms_dir: Option<Utf8PathBuf>,
    /// Shared build output directory (default: `dist`).
    pub output_dir: Option<Utf8PathBuf>,
    /// Staging directory name created inside a platform root during a release.
    pub staging_dir: Option<String>,
}

/// External tool configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ToolchainConfig {
    /// Package manager command line (e.g., `"npm"`, `"pnpm"`, `"corepack npm"`).
    ///
    /// Used for `install`, `run <script>`, `whoami`, `pack` and `publish`.
    pub package_manager: Option<String>,
}

/// Release workflow settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ReleaseSettings {
    /// Label attached by prerelease increments (default: `beta`).
    pub prerelease_label: Option<String>,
    /// Registry URL passed to `publish` (overrides the manifest's `publishConfig`).
    pub registry: Option<String>,
    /// Access level passed to `publish` (e.g., `"public"`).
    pub access: Option<String>,
}

impl Config {
    /// Effective platforms directory, relative to the workspace root.
    pub fn platforms_dir(&self) -> Utf8PathBuf {
        self.workspace
            .as_ref()
            .and_then(|w| w.platforms_dir.clone())
            .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_PLATFORMS_DIR))
    }

    /// Effective shared output directory, relative to the workspace root.
    pub fn output_dir(&self) -> Utf8PathBuf {
        self.workspace
            .as_ref()
            .and_then(|w| w.output_dir.clone())
            .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_OUTPUT_DIR))
    }

    /// Effective staging directory name.
    pub fn staging_dir(&self) -> &str {
        self.workspace
            .as_ref()
            .and_then(|w| w.staging_dir.as_deref())
            .unwrap_or(DEFAULT_STAGING_DIR)
    }

    /// Effective package manager command line.
    pub fn package_manager(&self) -> &str {
        self.toolchain
            .as_ref()
            .and_then(|t| t.package_manager.as_deref())
            .unwrap_or(DEFAULT_PACKAGE_MANAGER)
    }

    /// Effective prerelease label.
    pub fn prerelease_label(&self) -> &str {
        self.release
            .as_ref()
            .and_then(|r| r.prerelease_label.as_deref())
            .unwrap_or(DEFAULT_PRERELEASE_LABEL)
    }

    /// Registry override, if configured.
    pub fn registry(&self) -> Option<&str> {
        self.release.as_ref().and_then(|r| r.registry.as_deref())
    }

    /// Access override, if configured.
    pub fn access(&self) -> Option<&str> {
        self.release.as_ref().and_then(|r| r.access.as_deref())
    }
}

/// Log level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose output for debugging and development.
    Debug,
    /// Standard operational information (default).
    #[default]
    Info,
    /// Warnings about potential issues.
    Warn,
    /// Errors that indicate failures.
    Error,
}

impl LogLevel {
    /// Returns the log level as a lowercase string slice.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Supported configuration file extensions (in order of preference).
const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Application name for XDG directory lookup and config file names.
const APP_NAME: &str = "relkit";

/// Builder for loading configuration from multiple sources.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    project_search_root: Option<Utf8PathBuf>,
    include_user_config: bool,
    boundary_marker: Option<String>,
    explicit_files: Vec<Utf8PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default settings.
    pub fn new() -> Self {
        Self {
            project_search_root: None,
            include_user_config: true,
            boundary_marker: Some(".git".to_string()),
            explicit_files: Vec::new(),
        }
    }

    /// Set the starting directory for project config search.
    pub fn with_project_search<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.project_search_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set whether to include user config from `~/.config/relkit/`.
    pub const fn with_user_config(mut self, include: bool) -> Self {
        self.include_user_config = include;
        self
    }

    /// Stop walking up after the directory that contains `marker` (default `.git`).
    pub fn with_boundary_marker<S: Into<String>>(mut self, marker: S) -> Self {
        self.boundary_marker = Some(marker.into());
        self
    }

    /// Search all the way to the filesystem root.
    pub fn without_boundary_marker(mut self) -> Self {
        self.boundary_marker = None;
        self
    }

    /// Add an explicit config file; later files win.
    pub fn with_file<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.explicit_files.push(path.as_ref().to_path_buf());
        self
    }

    /// The project config file [`load`](Self::load) would merge, if any.
    ///
    /// Its directory is the workspace root.
    pub fn project_config(&self) -> Option<Utf8PathBuf> {
        self.project_search_root
            .as_deref()
            .and_then(|root| self.find_project_config(root))
    }

    /// Load configuration, merging all discovered sources.
    #[tracing::instrument(skip(self), fields(search_root = ?self.project_search_root))]
    pub fn load(self) -> ConfigResult<Config> {
        tracing::debug!("loading configuration");

        let user = self
            .include_user_config
            .then(find_user_config)
            .flatten();
        let project = self.project_config();

        let figment = user
            .iter()
            .chain(project.iter())
            .chain(self.explicit_files.iter())
            .fold(
                Figment::new().merge(Serialized::defaults(Config::default())),
                |figment, path| merge_file(figment, path),
            );

        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;
        tracing::info!(
            log_level = config.log_level.as_str(),
            package_manager = config.package_manager(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Walk up from `start` looking for `.relkit.<ext>` then `relkit.<ext>`.
    ///
    /// The directory holding the boundary marker is the last one searched.
    fn find_project_config(&self, start: &Utf8Path) -> Option<Utf8PathBuf> {
        for dir in start.ancestors() {
            let found = CONFIG_EXTENSIONS.iter().find_map(|ext| {
                [format!(".{APP_NAME}.{ext}"), format!("{APP_NAME}.{ext}")]
                    .into_iter()
                    .map(|name| dir.join(name))
                    .find(|candidate| candidate.is_file())
            });
            if found.is_some() {
                return found;
            }

            if let Some(marker) = self.boundary_marker.as_deref()
                && dir.join(marker).exists()
            {
                break;
            }
        }
        None
    }
}

/// Find user config in the XDG config directory.
fn find_user_config() -> Option<Utf8PathBuf> {
    let config_dir = user_config_dir()?;
    CONFIG_EXTENSIONS
        .iter()
        .map(|ext| config_dir.join(format!("config.{ext}")))
        .find(|path| path.is_file())
}

/// Merge a config file into the figment, detecting format from extension.
fn merge_file(figment: Figment, path: &Utf8Path) -> Figment {
    match path.extension() {
        Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path.as_str())),
        Some("json") => figment.merge(Json::file_exact(path.as_str())),
        _ => figment.merge(Toml::file_exact(path.as_str())),
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// User config directory (`~/.config/relkit/` on Linux).
pub fn user_config_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.config_dir().to_path_buf()).ok()
}

/// User cache directory (`~/.cache/relkit/` on Linux).
pub fn user_cache_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.cache_dir().to_path_buf()).ok()
}

/// Machine-local data directory (`~/.local/share/relkit/` on Linux).
pub fn user_data_local_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.data_local_dir().to_path_buf()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn load_file(contents: &str) -> Config {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        fs::write(&config_path, contents).unwrap();
        let config_path = Utf8PathBuf::try_from(config_path).unwrap();

        ConfigLoader::new()
            .with_user_config(false)
            .with_file(&config_path)
            .load()
            .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(config.log_dir.is_none());
        assert!(config.workspace.is_none());
        assert!(config.toolchain.is_none());
        assert!(config.release.is_none());
    }

    #[test]
    fn test_defaults_resolve_through_accessors() {
        let config = Config::default();
        assert_eq!(config.platforms_dir(), "packages");
        assert_eq!(config.output_dir(), "dist");
        assert_eq!(config.staging_dir(), ".release-staging");
        assert_eq!(config.package_manager(), "npm");
        assert_eq!(config.prerelease_label(), "beta");
        assert!(config.registry().is_none());
        assert!(config.access().is_none());
    }

    #[test]
    fn test_loader_builds_with_defaults() {
        let config = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .load()
            .unwrap();
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_single_file_overrides_default() {
        let config = load_file(
            r#"log_level = "debug"
log_dir = "/tmp/relkit"
"#,
        );
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(
            config.log_dir.as_ref().map(|dir| dir.as_str()),
            Some("/tmp/relkit")
        );
    }

    #[test]
    fn test_later_file_overrides_earlier() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("base.toml");
        fs::write(&base, "[toolchain]\npackage_manager = \"npm\"\n").unwrap();
        let over = tmp.path().join("override.toml");
        fs::write(&over, "[toolchain]\npackage_manager = \"pnpm\"\n").unwrap();

        let config = ConfigLoader::new()
            .with_user_config(false)
            .with_file(Utf8PathBuf::try_from(base).unwrap())
            .with_file(Utf8PathBuf::try_from(over).unwrap())
            .load()
            .unwrap();

        assert_eq!(config.package_manager(), "pnpm");
    }

    #[test]
    fn test_project_config_discovery() {
        let tmp = TempDir::new().unwrap();
        let project_dir = tmp.path().join("project");
        let sub_dir = project_dir.join("packages").join("h5");
        fs::create_dir_all(&sub_dir).unwrap();
        fs::write(
            project_dir.join(".relkit.toml"),
            "[workspace]\noutput_dir = \"build\"\n",
        )
        .unwrap();

        let config = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .with_project_search(Utf8PathBuf::try_from(sub_dir).unwrap())
            .load()
            .unwrap();

        assert_eq!(config.output_dir(), "build");
    }

    #[test]
    fn test_project_config_reports_discovered_file() {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        let nested = root.join("packages").join("wechat");
        fs::create_dir_all(&nested).unwrap();
        fs::write(root.join("relkit.yaml"), "log_level: warn\n").unwrap();

        let loader = ConfigLoader::new()
            .without_boundary_marker()
            .with_project_search(&nested);

        assert_eq!(loader.project_config(), Some(root.join("relkit.yaml")));
        assert_eq!(ConfigLoader::new().project_config(), None);
    }

    #[test]
    fn test_boundary_marker_stops_search() {
        let tmp = TempDir::new().unwrap();
        let parent = tmp.path().join("parent");
        let child = parent.join("child");
        let work = child.join("work");
        fs::create_dir_all(&work).unwrap();
        fs::write(parent.join(".relkit.toml"), r#"log_level = "warn""#).unwrap();
        fs::create_dir(child.join(".git")).unwrap();

        let config = ConfigLoader::new()
            .with_user_config(false)
            .with_boundary_marker(".git")
            .with_project_search(Utf8PathBuf::try_from(work).unwrap())
            .load()
            .unwrap();

        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_yaml_and_json_formats() {
        let tmp = TempDir::new().unwrap();
        let yaml = tmp.path().join("relkit.yaml");
        fs::write(&yaml, "release:\n  prerelease_label: rc\n").unwrap();
        let json = tmp.path().join("extra.json");
        fs::write(&json, r#"{"release": {"prerelease_label": "alpha", "access": "public"}}"#)
            .unwrap();

        let config = ConfigLoader::new()
            .with_user_config(false)
            .with_file(Utf8PathBuf::try_from(yaml).unwrap())
            .load()
            .unwrap();
        assert_eq!(config.prerelease_label(), "rc");

        let config = ConfigLoader::new()
            .with_user_config(false)
            .with_file(Utf8PathBuf::try_from(json).unwrap())
            .load()
            .unwrap();
        assert_eq!(config.prerelease_label(), "alpha");
        assert_eq!(config.access(), Some("public"));
    }

    #[test]
    fn test_config_with_all_sections() {
        let config = load_file(
            r#"
[workspace]
platforms_dir = "adapters"
output_dir = "out"
staging_dir = ".stage"

[toolchain]
package_manager = "pnpm"

[release]
prerelease_label = "next"
registry = "https://npm.example.com/"
access = "restricted"
"#,
        );

        assert_eq!(config.platforms_dir(), "adapters");
        assert_eq!(config.output_dir(), "out");
        assert_eq!(config.staging_dir(), ".stage");
        assert_eq!(config.package_manager(), "pnpm");
        assert_eq!(config.prerelease_label(), "next");
        assert_eq!(config.registry(), Some("https://npm.example.com/"));
        assert_eq!(config.access(), Some("restricted"));
    }

    #[test]
    fn test_invalid_log_level_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        fs::write(&path, r#"log_level = "loud""#).unwrap();

        let result = ConfigLoader::new()
            .with_user_config(false)
            .with_file(Utf8PathBuf::try_from(path).unwrap())
            .load();

        assert!(matches!(result, Err(ConfigError::Deserialize(_))));
    }

    #[test]
    fn test_user_config_dir() {
        if let Some(path) = user_config_dir() {
            assert!(path.as_str().contains("relkit"));
        }
    }
}
