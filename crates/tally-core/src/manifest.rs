//! The two on-disk copies of the project version.
//!
//! The authoritative copy is a plain-text version file holding
//! `major.minor.patch` and a newline. A second copy is embedded in the
//! packaging descriptor and located with a regex whose first capture group
//! is the version text. Both copies must be textually equal after a bump.

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use regex::{Captures, Regex};
use semver::Version;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::version::{self, VersionError};

/// Errors from reading or writing the version copies.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// A file could not be read or written.
    #[error("{path}: {source}")]
    Io {
        /// The file involved.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A file held something other than a semantic version.
    #[error("{path}: {source}")]
    InvalidVersion {
        /// The file involved.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: VersionError,
    },

    /// The descriptor pattern is not a valid regex.
    #[error("invalid descriptor pattern `{pattern}`: {source}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Regex compile error.
        #[source]
        source: regex::Error,
    },

    /// The descriptor pattern has no capture group to substitute.
    #[error("descriptor pattern `{0}` needs one capture group around the version")]
    PatternWithoutCapture(String),

    /// The descriptor pattern matched nothing.
    #[error("{path}: no version matching `{pattern}`")]
    DescriptorPatternNotFound {
        /// The descriptor file.
        path: Utf8PathBuf,
        /// The pattern that was searched for.
        pattern: String,
    },

    /// The two copies disagree after a write.
    #[error("version file says {version_file} but descriptor says {descriptor}")]
    OutOfSync {
        /// Version read back from the version file.
        version_file: String,
        /// Version read back from the descriptor.
        descriptor: String,
    },
}

/// Result alias for manifest operations.
pub type ManifestResult<T> = Result<T, ManifestError>;

/// The plain-text version file.
#[derive(Debug, Clone)]
pub struct VersionFile {
    path: Utf8PathBuf,
    version: Version,
}

impl VersionFile {
    /// Read and parse the version file.
    pub fn read(path: &Utf8Path) -> ManifestResult<Self> {
        let contents = read_to_string(path)?;
        let version = version::parse_version(&contents).map_err(|source| {
            ManifestError::InvalidVersion {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            version,
        })
    }

    /// The parsed version.
    pub const fn version(&self) -> &Version {
        &self.version
    }

    /// The file's path.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// File contents for a version.
    pub fn render(version: &Version) -> String {
        format!("{version}\n")
    }
}

/// The packaging descriptor and the pattern that locates its version.
#[derive(Debug, Clone)]
pub struct Descriptor {
    path: Utf8PathBuf,
    contents: String,
    pattern: Regex,
}

impl Descriptor {
    /// Read the descriptor and compile its version pattern.
    pub fn read(path: &Utf8Path, pattern: &str) -> ManifestResult<Self> {
        let regex = Regex::new(pattern).map_err(|source| ManifestError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        if regex.captures_len() < 2 {
            return Err(ManifestError::PatternWithoutCapture(pattern.to_string()));
        }
        Ok(Self {
            path: path.to_path_buf(),
            contents: read_to_string(path)?,
            pattern: regex,
        })
    }

    /// The file's path.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// The text of the first version the pattern captures, unparsed.
    pub fn current_text(&self) -> ManifestResult<&str> {
        let caps = self
            .pattern
            .captures(&self.contents)
            .ok_or_else(|| self.not_found())?;
        Ok(caps.get(1).map_or("", |m| m.as_str()))
    }

    /// The first version the pattern captures.
    pub fn current_version(&self) -> ManifestResult<Version> {
        version::parse_version(self.current_text()?).map_err(|source| {
            ManifestError::InvalidVersion {
                path: self.path.clone(),
                source,
            }
        })
    }

    /// New contents with every captured version replaced.
    pub fn substitute(&self, version: &Version) -> ManifestResult<String> {
        if !self.pattern.is_match(&self.contents) {
            return Err(self.not_found());
        }
        let replacement = version.to_string();
        let updated = self.pattern.replace_all(&self.contents, |caps: &Captures<'_>| {
            splice_group(caps, &replacement)
        });
        Ok(updated.into_owned())
    }

    fn not_found(&self) -> ManifestError {
        ManifestError::DescriptorPatternNotFound {
            path: self.path.clone(),
            pattern: self.pattern.as_str().to_string(),
        }
    }
}

/// Replace capture group 1 inside the whole match.
fn splice_group(caps: &Captures<'_>, replacement: &str) -> String {
    let (Some(whole), Some(group)) = (caps.get(0), caps.get(1)) else {
        return caps.get(0).map_or_else(String::new, |m| m.as_str().to_string());
    };
    let text = whole.as_str();
    let start = group.start() - whole.start();
    let end = group.end() - whole.start();
    format!("{}{replacement}{}", &text[..start], &text[end..])
}

/// Both version copies of a project.
#[derive(Debug, Clone)]
pub struct Manifest {
    version_file: VersionFile,
    descriptor: Descriptor,
}

impl Manifest {
    /// Load the version file and descriptor named by the config.
    #[instrument(skip(config), fields(%root))]
    pub fn load(root: &Utf8Path, config: &Config) -> ManifestResult<Self> {
        let version_file = VersionFile::read(&root.join(config.version_file()))?;
        let descriptor =
            Descriptor::read(&root.join(config.descriptor()), config.descriptor_pattern())?;
        debug!(version = %version_file.version(), "loaded manifest");
        Ok(Self {
            version_file,
            descriptor,
        })
    }

    /// The authoritative version (from the version file).
    pub const fn version(&self) -> &Version {
        self.version_file.version()
    }

    /// The version embedded in the descriptor.
    pub fn descriptor_version(&self) -> ManifestResult<Version> {
        self.descriptor.current_version()
    }

    /// The descriptor's version text as written, which may not be semver.
    pub fn descriptor_text(&self) -> ManifestResult<&str> {
        self.descriptor.current_text()
    }

    /// Whether both copies hold the same version text.
    pub fn in_sync(&self) -> ManifestResult<bool> {
        Ok(self.descriptor_text()? == self.version().to_string())
    }

    /// Fail with [`ManifestError::OutOfSync`] unless both copies agree.
    pub fn ensure_in_sync(&self) -> ManifestResult<()> {
        let descriptor = self.descriptor_text()?;
        if descriptor == self.version().to_string() {
            return Ok(());
        }
        Err(ManifestError::OutOfSync {
            version_file: self.version().to_string(),
            descriptor: descriptor.to_string(),
        })
    }

    /// Write `version` to both copies.
    ///
    /// Both new contents are computed before either file is touched, each
    /// file is replaced atomically, and the copies are read back and
    /// compared afterwards.
    #[instrument(skip(self), fields(%version))]
    pub fn write_version(&self, version: &Version) -> ManifestResult<Self> {
        if !self.in_sync()? {
            warn!(
                version_file = %self.version(),
                descriptor = self.descriptor_text()?,
                "descriptor version differs from version file; overwriting both"
            );
        }

        let descriptor_contents = self.descriptor.substitute(version)?;
        let version_contents = VersionFile::render(version);

        write_atomic(self.version_file.path(), &version_contents)?;
        write_atomic(self.descriptor.path(), &descriptor_contents)?;

        let written = Self {
            version_file: VersionFile::read(self.version_file.path())?,
            descriptor: Descriptor::read(self.descriptor.path(), self.descriptor.pattern.as_str())?,
        };
        written.ensure_in_sync()?;
        debug!("both version copies updated");
        Ok(written)
    }
}

fn read_to_string(path: &Utf8Path) -> ManifestResult<String> {
    std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Replace a file by writing a sibling temp file and renaming it over.
fn write_atomic(path: &Utf8Path, contents: &str) -> ManifestResult<()> {
    let io_err = |source: std::io::Error| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = path
        .parent()
        .filter(|p| !p.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(contents.as_bytes()).map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}
