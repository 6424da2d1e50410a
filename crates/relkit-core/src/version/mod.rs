//! Version parsing and computation.
//!
//! [`SemVer`] is deliberately strict: `MAJOR.MINOR.PATCH` with an optional
//! `-prerelease` suffix and nothing else. No `v` prefix, no leading zeros, no
//! build metadata in the numeric part. Everything it accepts prints back
//! unchanged.

pub mod interactive;

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::config::DEFAULT_PRERELEASE_LABEL;
use crate::manifest::ManifestError;
use crate::prompt::PromptError;

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Text that is not a `MAJOR.MINOR.PATCH[-PRERELEASE]` version.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid version \"{input}\" (expected MAJOR.MINOR.PATCH[-PRERELEASE])")]
pub struct FormatError {
    /// The rejected input.
    pub input: String,
}

/// Errors from version operations.
#[derive(Error, Debug)]
pub enum VersionError {
    /// The version text is malformed.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// The user declined the version change.
    #[error("version selection cancelled")]
    Cancelled,

    /// The manifest has no `version` field.
    #[error("{path} does not declare a version")]
    MissingVersion {
        /// The manifest path.
        path: Utf8PathBuf,
    },

    /// The manifest could not be read or written.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// The prompt could not be shown.
    #[error("{0}")]
    Prompt(String),
}

impl From<PromptError> for VersionError {
    fn from(err: PromptError) -> Self {
        match err {
            PromptError::Cancelled => Self::Cancelled,
            PromptError::Failed(message) => Self::Prompt(message),
        }
    }
}

/// Result alias for version operations.
pub type VersionResult<T> = Result<T, VersionError>;

// ──────────────────────────────────────────────
// SemVer
// ──────────────────────────────────────────────

/// A semantic version as published to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SemVer {
    /// Major component.
    pub major: u64,
    /// Minor component.
    pub minor: u64,
    /// Patch component.
    pub patch: u64,
    /// Prerelease label without the leading `-` (e.g., `beta.4`).
    pub prerelease: Option<String>,
}

impl SemVer {
    /// A release version with no prerelease label.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            prerelease: None,
        }
    }

    /// Attach a prerelease label.
    #[must_use]
    pub fn with_prerelease(mut self, label: impl Into<String>) -> Self {
        self.prerelease = Some(label.into());
        self
    }
}

/// Parse `MAJOR.MINOR.PATCH[-PRERELEASE]`.
pub fn parse(text: &str) -> Result<SemVer, FormatError> {
    let err = || FormatError {
        input: text.to_string(),
    };

    let (core, prerelease) = match text.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (text, None),
    };

    let mut parts = core.split('.');
    let (Some(major), Some(minor), Some(patch), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(err());
    };

    let prerelease = match prerelease {
        Some(pre) if pre.is_empty() || pre.chars().any(char::is_whitespace) => return Err(err()),
        Some(pre) => Some(pre.to_string()),
        None => None,
    };

    Ok(SemVer {
        major: numeric(major).ok_or_else(err)?,
        minor: numeric(minor).ok_or_else(err)?,
        patch: numeric(patch).ok_or_else(err)?,
        prerelease,
    })
}

/// A decimal component: ASCII digits only, no leading zero.
fn numeric(part: &str) -> Option<u64> {
    let digits_only = !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    let leading_zero = part.len() > 1 && part.starts_with('0');
    if digits_only && !leading_zero {
        part.parse().ok()
    } else {
        None
    }
}

impl FromStr for SemVer {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.prerelease {
            write!(f, "-{pre}")?;
        }
        Ok(())
    }
}

impl Serialize for SemVer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl Ord for SemVer {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => compare_prerelease(a, b),
            })
    }
}

impl PartialOrd for SemVer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Dot-separated identifiers compared left to right; a label that runs out
/// first sorts lower.
fn compare_prerelease(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match compare_identifier(x, y) {
                Ordering::Equal => {}
                unequal => return unequal,
            },
        }
    }
}

/// Numeric identifiers sort below everything else and compare by value.
/// Anything that is not a canonical number compares as ASCII text.
fn compare_identifier(a: &str, b: &str) -> Ordering {
    match (numeric(a), numeric(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

// ──────────────────────────────────────────────
// Increments
// ──────────────────────────────────────────────

/// How to derive the next version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IncrementKind {
    /// x.y.Z
    Patch,
    /// x.Y.0
    Minor,
    /// X.0.0
    Major,
    /// Next prerelease of the current or next patch version.
    Prerelease,
    /// A version typed by the user.
    Custom,
    /// Publish the current version unchanged.
    Keep,
}

impl fmt::Display for IncrementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Patch => "patch",
            Self::Minor => "minor",
            Self::Major => "major",
            Self::Prerelease => "prerelease",
            Self::Custom => "custom",
            Self::Keep => "keep",
        };
        f.write_str(name)
    }
}

/// Apply `kind` to `current`.
///
/// `label` names a fresh prerelease (`beta` when empty). An existing
/// prerelease keeps its own label and bumps its trailing number:
/// `beta.4` becomes `beta.5`, `rc` becomes `rc.1`.
pub fn increment(current: &SemVer, kind: IncrementKind, label: &str) -> SemVer {
    let SemVer {
        major,
        minor,
        patch,
        ..
    } = *current;
    match kind {
        IncrementKind::Major => SemVer::new(major.saturating_add(1), 0, 0),
        IncrementKind::Minor => SemVer::new(major, minor.saturating_add(1), 0),
        IncrementKind::Patch => SemVer::new(major, minor, patch.saturating_add(1)),
        IncrementKind::Prerelease => match &current.prerelease {
            Some(pre) => SemVer::new(major, minor, patch).with_prerelease(next_prerelease(pre)),
            None => {
                let label = if label.is_empty() {
                    DEFAULT_PRERELEASE_LABEL
                } else {
                    label
                };
                SemVer::new(major, minor, patch.saturating_add(1)).with_prerelease(format!("{label}.0"))
            }
        },
        IncrementKind::Custom | IncrementKind::Keep => current.clone(),
    }
}

fn next_prerelease(pre: &str) -> String {
    let bump = |digits: &str| {
        digits
            .parse::<u64>()
            .ok()
            .and_then(|n| n.checked_add(1))
    };

    if let Some((head, tail)) = pre.rsplit_once('.')
        && let Some(n) = bump(tail)
    {
        return format!("{head}.{n}");
    }
    if let Some(n) = bump(pre) {
        return n.to_string();
    }
    format!("{pre}.1")
}

/// A proposed next version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionCandidate {
    /// How it was derived.
    pub kind: IncrementKind,
    /// The resulting version.
    pub version: SemVer,
}

/// Patch, minor, major and prerelease candidates, followed by keep.
pub fn suggestions(current: &SemVer, label: &str) -> Vec<VersionCandidate> {
    [
        IncrementKind::Patch,
        IncrementKind::Minor,
        IncrementKind::Major,
        IncrementKind::Prerelease,
        IncrementKind::Keep,
    ]
    .into_iter()
    .map(|kind| VersionCandidate {
        kind,
        version: increment(current, kind, label),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(text: &str) -> SemVer {
        parse(text).unwrap()
    }

    #[test]
    fn parse_release_and_prerelease() {
        assert_eq!(v("1.2.3"), SemVer::new(1, 2, 3));
        assert_eq!(
            v("1.2.3-beta.4"),
            SemVer::new(1, 2, 3).with_prerelease("beta.4")
        );
        assert_eq!(v("0.0.0"), SemVer::new(0, 0, 0));
    }

    #[test]
    fn parse_rejects_malformed() {
        for bad in [
            "1.2", "1.2.3.4", "v1.2.3", "01.2.3", "1.2.x", "1.2.3-", "", "1..3", " 1.2.3",
            "1.2.3+build", "1.2.3-beta 1",
        ] {
            let err = parse(bad).unwrap_err();
            assert_eq!(err.input, bad);
        }
    }

    #[test]
    fn display_round_trips() {
        for text in ["0.1.0", "10.20.30", "1.0.0-rc", "2.0.0-beta.11", "1.0.0-x-y.1"] {
            assert_eq!(v(text).to_string(), text);
            assert_eq!(parse(&v(text).to_string()).unwrap(), v(text));
        }
    }

    #[test]
    fn ordering() {
        assert!(v("1.2.3") < v("1.2.4"));
        assert!(v("1.2.10") > v("1.2.9"));
        assert!(v("2.0.0") > v("1.99.99"));
        assert!(v("1.0.0-beta.1") < v("1.0.0"));
        assert!(v("1.0.0-beta.2") < v("1.0.0-beta.10"));
        assert!(v("1.0.0-alpha") < v("1.0.0-beta"));
        assert!(v("1.0.0-rc.1") > v("1.0.0-beta.9"));
    }

    #[test]
    fn non_numeric_identifiers_sort_as_text_after_numbers() {
        assert!(v("1.0.0-beta.1") < v("1.0.0-beta.01"));
        assert!(v("1.0.0-beta.10") < v("1.0.0-beta.15_"));
        assert!(v("1.0.0-beta.2") < v("1.0.0-beta.15_"));
        assert!(v("1.0.0-beta") < v("1.0.0-beta.1"));
    }

    #[test]
    fn mixed_prerelease_labels_sort_consistently() {
        let mut versions: Vec<SemVer> = ["1.0.0-beta.15_", "1.0.0-beta.10", "1.0.0-beta.2", "1.0.0-beta.01"]
            .into_iter()
            .map(v)
            .collect();
        versions.sort();
        let sorted: Vec<String> = versions.iter().map(ToString::to_string).collect();
        assert_eq!(sorted, ["1.0.0-beta.2", "1.0.0-beta.10", "1.0.0-beta.01", "1.0.0-beta.15_"]);

        for a in &versions {
            for b in &versions {
                for c in &versions {
                    if a < b && b < c {
                        assert!(a < c, "{a} < {b} < {c}");
                    }
                }
            }
        }
    }

    #[test]
    fn increments_clear_prerelease() {
        let current = v("1.2.3-beta.4");
        assert_eq!(increment(&current, IncrementKind::Major, "beta"), v("2.0.0"));
        assert_eq!(increment(&current, IncrementKind::Minor, "beta"), v("1.3.0"));
        assert_eq!(increment(&current, IncrementKind::Patch, "beta"), v("1.2.4"));
    }

    #[test]
    fn prerelease_increments() {
        let beta = "beta";
        assert_eq!(
            increment(&v("1.2.3-beta.4"), IncrementKind::Prerelease, beta),
            v("1.2.3-beta.5")
        );
        assert_eq!(
            increment(&v("1.2.3-rc"), IncrementKind::Prerelease, beta),
            v("1.2.3-rc.1")
        );
        assert_eq!(
            increment(&v("1.2.3-7"), IncrementKind::Prerelease, beta),
            v("1.2.3-8")
        );
        assert_eq!(
            increment(&v("1.2.3"), IncrementKind::Prerelease, "next"),
            v("1.2.4-next.0")
        );
        assert_eq!(
            increment(&v("1.2.3"), IncrementKind::Prerelease, ""),
            v("1.2.4-beta.0")
        );
    }

    #[test]
    fn prerelease_twice_from_release() {
        let first = increment(&v("1.0.0"), IncrementKind::Prerelease, "beta");
        let second = increment(&first, IncrementKind::Prerelease, "beta");
        assert_eq!(first, v("1.0.1-beta.0"));
        assert_eq!(second, v("1.0.1-beta.1"));
    }

    #[test]
    fn custom_and_keep_are_identity() {
        let current = v("3.1.4-rc.2");
        assert_eq!(increment(&current, IncrementKind::Custom, "beta"), current);
        assert_eq!(increment(&current, IncrementKind::Keep, "beta"), current);
    }

    #[test]
    fn suggestions_cover_four_bumps_and_keep() {
        let list = suggestions(&v("1.0.0"), "beta");
        let kinds: Vec<IncrementKind> = list.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            [
                IncrementKind::Patch,
                IncrementKind::Minor,
                IncrementKind::Major,
                IncrementKind::Prerelease,
                IncrementKind::Keep
            ]
        );
        assert_eq!(list[3].version, v("1.0.1-beta.0"));
        assert_eq!(list[4].version, v("1.0.0"));
    }

    #[test]
    fn increment_kind_display_and_serde() {
        assert_eq!(IncrementKind::Prerelease.to_string(), "prerelease");
        assert_eq!(
            serde_json::to_string(&IncrementKind::Keep).unwrap(),
            "\"keep\""
        );
        assert_eq!(serde_json::to_string(&v("1.0.0-beta.1")).unwrap(), "\"1.0.0-beta.1\"");
    }

    #[test]
    fn prompt_cancel_maps_to_cancelled() {
        assert!(matches!(
            VersionError::from(PromptError::Cancelled),
            VersionError::Cancelled
        ));
        assert!(matches!(
            VersionError::from(PromptError::Failed("tty".into())),
            VersionError::Prompt(_)
        ));
    }
}
