//! Release staging.
//!
//! Builds `<platform root>/<staging dir>` holding exactly what gets published:
//! the platform's bundles and source maps, type declarations, the static
//! asset tree (if the platform has one), a rewritten `package.json`, and the
//! documentation files. Staging the same inputs twice produces identical
//! trees.

use std::fs;
use std::io;
use std::path::PathBuf;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::manifest::{MANIFEST_FILE, ManifestError, PackageManifest};
use crate::platform::{Platform, TYPES_DIR, TYPES_ENTRY, Workspace};
use crate::version::SemVer;

/// Documents that must ship with every release.
const REQUIRED_DOCS: [&str; 2] = ["README.md", "LICENSE"];
/// Documents copied when present.
const OPTIONAL_DOCS: [&str; 1] = ["CHANGELOG.md"];
/// Replacement for the source `scripts` table.
const POSTINSTALL_NOTICE: &str = "echo \"Thanks for installing! Docs: see README.md\"";

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Errors from staging a release.
#[derive(Error, Debug)]
pub enum StageError {
    /// The platform has not been built.
    #[error("{platform}: build output {dir} does not exist (run the build first)")]
    MissingBuildOutput {
        /// The platform.
        platform: Platform,
        /// Expected output directory.
        dir: Utf8PathBuf,
    },

    /// A required document was not found.
    #[error("required file {name} not found in {}", join_dirs(.searched))]
    MissingDocument {
        /// Document file name.
        name: String,
        /// Directories that were searched.
        searched: Vec<Utf8PathBuf>,
    },

    /// A filesystem operation failed.
    #[error("{path}: {source}")]
    Io {
        /// Path being read or written.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Directory traversal failed.
    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    /// A path in the output tree is not valid UTF-8.
    #[error("non UTF-8 path: {}", .0.display())]
    NonUtf8Path(PathBuf),

    /// The source manifest could not be read or the staged one written.
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

fn join_dirs(dirs: &[Utf8PathBuf]) -> String {
    dirs.iter()
        .map(|d| d.as_str())
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Result alias for staging operations.
pub type StageResult<T> = Result<T, StageError>;

trait IoContext<T> {
    fn at(self, path: &Utf8Path) -> StageResult<T>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn at(self, path: &Utf8Path) -> StageResult<T> {
        self.map_err(|source| StageError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

// ──────────────────────────────────────────────
// Results
// ──────────────────────────────────────────────

/// A staged release ready to publish.
#[derive(Debug, Clone)]
pub struct StagedRelease {
    /// The staging directory.
    pub dir: Utf8PathBuf,
    /// The manifest written into the staging directory.
    pub manifest: PackageManifest,
    /// Top-level entries listed in the manifest's `files`.
    pub files: Vec<String>,
    /// Expected bundle files that the build did not produce.
    pub missing: Vec<String>,
}

/// A file in a staged tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagedFile {
    /// Path relative to the staging directory, `/`-separated.
    pub path: String,
    /// Size in bytes.
    pub size: u64,
}

// ──────────────────────────────────────────────
// Staging
// ──────────────────────────────────────────────

/// Stage `platform` for publishing `version`.
///
/// Any previous staging directory is destroyed first.
#[instrument(skip(workspace), fields(%platform, %version))]
pub fn stage(workspace: &Workspace, platform: Platform, version: &SemVer) -> StageResult<StagedRelease> {
    let output = workspace.platform_output(platform);
    if !output.is_dir() {
        return Err(StageError::MissingBuildOutput {
            platform,
            dir: output,
        });
    }

    let platform_root = workspace.platform_root(platform);
    let dir = workspace.staging_dir(platform);
    if dir.exists() {
        fs::remove_dir_all(&dir).at(&dir)?;
    }
    fs::create_dir_all(&dir).at(&dir)?;

    let mut files = Vec::new();
    let mut missing = Vec::new();

    for bundle in platform.bundles() {
        for name in [(*bundle).to_string(), format!("{bundle}.map")] {
            let src = output.join(&name);
            if src.is_file() {
                fs::copy(&src, dir.join(&name)).at(&src)?;
                files.push(name);
            } else {
                warn!(%platform, file = %name, "bundle file missing from build output");
                missing.push(name);
            }
        }
    }

    let types_src = output.join(TYPES_DIR);
    if types_src.is_dir() {
        copy_tree(&types_src, &dir.join(TYPES_DIR))?;
        files.push(TYPES_DIR.to_string());
    }

    if let Some(assets) = platform.asset_dir() {
        let src = platform_root.join(assets);
        if src.is_dir() {
            copy_tree(&src, &dir.join(assets))?;
            files.push(assets.to_string());
        } else {
            debug!(%platform, %src, "no static asset tree");
        }
    }

    files.sort();

    let source = PackageManifest::read(&workspace.manifest_path(platform))?;
    let manifest = release_manifest(source, platform, version, &files);
    manifest.write(&dir.join(MANIFEST_FILE))?;

    for name in REQUIRED_DOCS {
        let searched = vec![platform_root.clone(), workspace.root().to_path_buf()];
        let Some(src) = searched.iter().map(|d| d.join(name)).find(|p| p.is_file()) else {
            return Err(StageError::MissingDocument {
                name: name.to_string(),
                searched,
            });
        };
        fs::copy(&src, dir.join(name)).at(&src)?;
    }
    for name in OPTIONAL_DOCS {
        let found = [platform_root.join(name), workspace.root().join(name)]
            .into_iter()
            .find(|p| p.is_file());
        if let Some(src) = found {
            fs::copy(&src, dir.join(name)).at(&src)?;
        }
    }

    info!(%platform, %dir, files = files.len(), "release staged");
    Ok(StagedRelease {
        dir,
        manifest,
        files,
        missing,
    })
}

/// Derive the publishable manifest from the source manifest.
///
/// Entry points are rewritten to the flat staged layout, `scripts` becomes a
/// single `postinstall` notice, and `files` lists exactly `staged`.
pub fn release_manifest(
    mut manifest: PackageManifest,
    platform: Platform,
    version: &SemVer,
    staged: &[String],
) -> PackageManifest {
    let has = |name: &str| staged.iter().any(|f| f == name);
    let module = platform.has_module_bundle() && has("index.esm.js");
    let types = has(TYPES_DIR);

    manifest.set_version(&version.to_string());
    manifest.set("main", json!("index.js"));
    if module {
        manifest.set("module", json!("index.esm.js"));
    } else {
        manifest.remove("module");
    }
    if types {
        manifest.set("types", json!(TYPES_ENTRY));
    } else {
        manifest.remove("types");
    }
    manifest.set("scripts", json!({ "postinstall": POSTINSTALL_NOTICE }));
    manifest.set("files", json!(staged));

    let mut entry = serde_json::Map::new();
    if types {
        entry.insert("types".into(), json!(format!("./{TYPES_ENTRY}")));
    }
    let import = if module { "./index.esm.js" } else { "./index.js" };
    entry.insert("import".into(), json!(import));
    entry.insert("require".into(), json!("./index.js"));
    manifest.set("exports", json!({ ".": Value::Object(entry) }));

    manifest.remove("devDependencies");
    manifest
}

/// Recursively copy `src` into `dst`, in file name order.
fn copy_tree(src: &Utf8Path, dst: &Utf8Path) -> StageResult<()> {
    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry?;
        let path = Utf8Path::from_path(entry.path())
            .ok_or_else(|| StageError::NonUtf8Path(entry.path().to_path_buf()))?;
        let rel = path.strip_prefix(src).unwrap_or(path);
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).at(&target)?;
        } else {
            fs::copy(path, &target).at(path)?;
        }
    }
    Ok(())
}

/// Every file under `dir` with its size, sorted by relative path.
pub fn list_contents(dir: &Utf8Path) -> StageResult<Vec<StagedFile>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = Utf8Path::from_path(entry.path())
            .ok_or_else(|| StageError::NonUtf8Path(entry.path().to_path_buf()))?;
        let rel = path.strip_prefix(dir).unwrap_or(path);
        let size = entry.metadata()?.len();
        files.push(StagedFile {
            path: rel.components().map(|c| c.as_str()).collect::<Vec<_>>().join("/"),
            size,
        });
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}
