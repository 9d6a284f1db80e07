//! Semantic version bump rules.
//!
//! The version lives in two places (the version file and the packaging
//! descriptor, see [`crate::manifest`]); this module only knows how to parse
//! a version and how to move it forward.

use std::str::FromStr;

use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from version operations.
#[derive(Error, Debug)]
pub enum VersionError {
    /// Failed to parse a semver string.
    #[error("invalid semver: {0}")]
    InvalidSemver(#[from] semver::Error),

    /// The requested bump type is not one of major, minor, patch.
    #[error("invalid bump type `{0}` (expected major, minor or patch)")]
    InvalidBumpType(String),

    /// The bumped component would not fit in a `u64`.
    #[error("cannot apply a {level} bump to {current}: component overflows")]
    Overflow {
        /// The version being bumped.
        current: Version,
        /// The requested level.
        level: BumpLevel,
    },
}

/// Result alias for version operations.
pub type VersionResult<T> = Result<T, VersionError>;

/// Semver bump level.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum BumpLevel {
    /// Patch release (x.y.Z).
    Patch,
    /// Minor release (x.Y.0).
    #[default]
    Minor,
    /// Major release (X.0.0).
    Major,
}

impl BumpLevel {
    /// All bump levels, smallest first.
    pub const ALL: &[Self] = &[Self::Patch, Self::Minor, Self::Major];
}

impl std::fmt::Display for BumpLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Patch => write!(f, "patch"),
            Self::Minor => write!(f, "minor"),
            Self::Major => write!(f, "major"),
        }
    }
}

impl FromStr for BumpLevel {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "patch" => Ok(Self::Patch),
            "minor" => Ok(Self::Minor),
            "major" => Ok(Self::Major),
            _ => Err(VersionError::InvalidBumpType(s.to_string())),
        }
    }
}

/// Resolve an optional dispatch input into a bump level.
///
/// A missing or blank input means the default (`minor`).
pub fn resolve_bump_level(input: Option<&str>) -> VersionResult<BumpLevel> {
    match input.map(str::trim) {
        None | Some("") => Ok(BumpLevel::default()),
        Some(s) => s.parse(),
    }
}

/// Compute the next version by applying a bump level.
///
/// The result is always strictly greater than `current`; a component that
/// is already `u64::MAX` is an [`VersionError::Overflow`].
pub fn next_version(current: &Version, level: BumpLevel) -> VersionResult<Version> {
    let next = match level {
        BumpLevel::Patch => current
            .patch
            .checked_add(1)
            .map(|patch| Version::new(current.major, current.minor, patch)),
        BumpLevel::Minor => current
            .minor
            .checked_add(1)
            .map(|minor| Version::new(current.major, minor, 0)),
        BumpLevel::Major => current
            .major
            .checked_add(1)
            .map(|major| Version::new(major, 0, 0)),
    };
    next.ok_or_else(|| VersionError::Overflow {
        current: current.clone(),
        level,
    })
}

/// Parse a version string, stripping an optional `v` prefix.
pub fn parse_version(s: &str) -> VersionResult<Version> {
    let s = s.trim();
    let s = s.strip_prefix('v').unwrap_or(s);
    Ok(Version::parse(s)?)
}
