//! Interactive version confirmation.
//!
//! Reads the current version from a platform manifest, lets the user pick the
//! next one through a [`Prompter`], and writes it back. Only the `version`
//! field of the source manifest is ever persisted.

use camino::Utf8Path;
use tracing::{debug, info, instrument};

use crate::manifest::{read_manifest_version, write_manifest_version};
use crate::prompt::Prompter;
use crate::version::{
    IncrementKind, SemVer, VersionError, VersionResult, parse, suggestions,
};

/// What the caller wants offered.
#[derive(Debug, Clone)]
pub struct VersionRequest {
    /// Label for fresh prereleases.
    pub label: String,
    /// Increment preselected in the picker.
    pub default_kind: IncrementKind,
    /// A version given up front, skipping the picker.
    pub custom: Option<SemVer>,
}

/// The confirmed version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionDecision {
    /// Version before the change.
    pub previous: SemVer,
    /// Version to publish.
    pub version: SemVer,
    /// Whether the source manifest was rewritten.
    pub written: bool,
}

/// Read the current version of a manifest.
pub fn current_version(manifest_path: &Utf8Path) -> VersionResult<SemVer> {
    let text = read_manifest_version(manifest_path)?.ok_or_else(|| VersionError::MissingVersion {
        path: manifest_path.to_path_buf(),
    })?;
    Ok(parse(&text)?)
}

/// Ask for the next version and persist it into the source manifest.
///
/// Offers patch, minor, major, prerelease, keep and custom in one choice with
/// the cursor on `request.default_kind`. A version different from the current
/// one needs an explicit yes before anything is written. Refusal or an invalid
/// custom entry returns [`VersionError::Cancelled`] and leaves the manifest
/// untouched.
#[instrument(skip(request, prompter), fields(%manifest_path, default = %request.default_kind))]
pub fn confirm_version(
    manifest_path: &Utf8Path,
    request: &VersionRequest,
    prompter: &mut dyn Prompter,
) -> VersionResult<VersionDecision> {
    let current = current_version(manifest_path)?;

    let proposed = match &request.custom {
        Some(version) => version.clone(),
        None => pick(&current, request, prompter)?,
    };

    if proposed == current {
        info!(version = %current, "keeping current version");
        return Ok(VersionDecision {
            previous: current.clone(),
            version: current,
            written: false,
        });
    }

    let question = format!("Release {proposed} (currently {current})?");
    if !prompter.confirm(&question, true)? {
        return Err(VersionError::Cancelled);
    }

    write_manifest_version(manifest_path, &proposed.to_string())?;
    info!(previous = %current, version = %proposed, "version updated");

    Ok(VersionDecision {
        previous: current,
        version: proposed,
        written: true,
    })
}

fn pick(
    current: &SemVer,
    request: &VersionRequest,
    prompter: &mut dyn Prompter,
) -> VersionResult<SemVer> {
    let candidates = suggestions(current, &request.label);

    let mut options: Vec<String> = candidates
        .iter()
        .map(|c| match c.kind {
            IncrementKind::Keep => format!("keep ({})", c.version),
            kind => format!("{kind} ({})", c.version),
        })
        .collect();
    options.push("custom".to_string());

    let default = candidates
        .iter()
        .position(|c| c.kind == request.default_kind)
        .unwrap_or(candidates.len());

    let message = format!("Select version (current {current})");
    let choice = prompter.select(&message, &options, default)?;
    debug!(choice, "version option selected");

    match candidates.get(choice) {
        Some(candidate) => Ok(candidate.version.clone()),
        None => {
            let text = prompter.input("Enter version", &current.to_string())?;
            parse(text.trim()).map_err(|err| {
                debug!(%err, "rejected custom version");
                VersionError::Cancelled
            })
        }
    }
}
