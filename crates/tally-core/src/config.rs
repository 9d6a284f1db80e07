//! Configuration loading and discovery.
//!
//! Configuration is layered with figment:
//! 1. Built-in defaults
//! 2. User config from the XDG config directory
//! 3. Project config, found by walking up from the working directory
//! 4. Explicit files passed on the command line
//!
//! # Supported formats
//!
//! TOML (`.toml`), YAML (`.yaml`, `.yml`) and JSON (`.json`).
//!
//! # Config file locations (in order of precedence, highest first):
//! - `.tally.<ext>` in current directory or any parent
//! - `tally.<ext>` in current directory or any parent
//! - `~/.config/tally/config.<ext>` (user config)
//!
//! # Example
//! ```no_run
//! use camino::Utf8PathBuf;
//! use tally_core::config::ConfigLoader;
//!
//! let cwd = std::env::current_dir().unwrap();
//! let cwd = Utf8PathBuf::try_from(cwd).expect("current directory is not valid UTF-8");
//! let config = ConfigLoader::new()
//!     .with_project_search(&cwd)
//!     .load()
//!     .unwrap();
//! println!("version file: {}", config.version_file());
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Default location of the plain-text version file.
pub const DEFAULT_VERSION_FILE: &str = "VERSION";
/// Default packaging descriptor that embeds a copy of the version.
pub const DEFAULT_DESCRIPTOR: &str = "setup.py";
/// Default pattern locating the version inside the descriptor.
///
/// The single capture group is the version text that gets replaced.
pub const DEFAULT_DESCRIPTOR_PATTERN: &str = r#"version\s*=\s*["']([^"']*)["']"#;
/// Default branch that pushes run CI on and that proposed changes target.
pub const DEFAULT_RELEASE_BRANCH: &str = "main";
/// Default git remote.
pub const DEFAULT_REMOTE: &str = "origin";
/// Default directory that build artifacts land in.
pub const DEFAULT_DIST_DIR: &str = "dist";

/// The configuration for tally.
///
/// Every section is optional; unset values fall back to the defaults
/// exposed by the accessor methods on this type.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Log level for the application (e.g., "debug", "info", "warn", "error").
    pub log_level: LogLevel,
    /// Directory for JSONL log files (falls back to platform defaults if unset).
    pub log_dir: Option<Utf8PathBuf>,
    /// Project layout.
    pub project: ProjectConfig,
    /// Command lists for the named build operations.
    pub tasks: TasksConfig,
    /// Version bump workflow settings.
    pub bump: BumpConfig,
    /// Formatting job settings.
    pub format: FormatConfig,
    /// Release workflow settings.
    pub release: ReleaseConfig,
    /// Code-hosting platform settings.
    pub forge: ForgeConfig,
    /// Key-value cache settings.
    pub kv: KvConfig,
}

/// Project layout overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProjectConfig {
    /// Package name, available to task commands as `{package}`.
    pub package: Option<String>,
    /// Path to the version file, relative to the project root.
    pub version_file: Option<Utf8PathBuf>,
    /// Path to the packaging descriptor, relative to the project root.
    pub descriptor: Option<Utf8PathBuf>,
    /// Regex with one capture group locating the descriptor's version.
    pub descriptor_pattern: Option<String>,
    /// Release branch (default: `main`).
    pub release_branch: Option<String>,
    /// Git remote to push to (default: `origin`).
    pub remote: Option<String>,
    /// Directory containing build artifacts (default: `dist`).
    pub dist_dir: Option<Utf8PathBuf>,
}

/// Command overrides for the named build operations.
///
/// Each list replaces the built-in default for that operation. Commands
/// run in order through `sh -c`; see [`crate::tasks`].
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct TasksConfig {
    /// Install dependencies.
    pub deps: Option<Vec<String>>,
    /// Static analysis and security scan.
    pub lint: Option<Vec<String>>,
    /// Rewrite sources in place with the formatter.
    pub fmt: Option<Vec<String>>,
    /// Style check without modifying files.
    pub fmt_check: Option<Vec<String>>,
    /// Run the test suite.
    pub test: Option<Vec<String>>,
    /// Build the distributable archive.
    pub build: Option<Vec<String>>,
    /// Upload artifacts to the package index.
    pub publish: Option<Vec<String>>,
}

/// Version bump workflow settings.
///
/// Templates support `{version}` and `{previous}`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct BumpConfig {
    /// Branch name template for the proposed change.
    pub branch: Option<String>,
    /// Commit message template.
    pub commit_message: Option<String>,
    /// Pull request title template.
    pub pr_title: Option<String>,
    /// Pull request body template.
    pub pr_body: Option<String>,
}

/// Formatting job settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct FormatConfig {
    /// Commit message for auto-formatting commits.
    pub commit_message: Option<String>,
    /// Sign the formatting commit (`git commit -S`, default: `true`).
    pub sign: Option<bool>,
    /// Verify the commit signature before pushing (default: `true`).
    pub verify_signature: Option<bool>,
}

/// Release workflow settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReleaseConfig {
    /// Create the release as a draft (default: `true`).
    pub draft: Option<bool>,
    /// Release title template; supports `{version}` and `{tag}`.
    /// Default: the tag.
    pub title: Option<String>,
    /// Explicit artifact paths. Default: every file in the dist directory.
    pub assets: Option<Vec<String>>,
    /// Environment variable holding the package index user name.
    pub index_username_env: Option<String>,
    /// Environment variable holding the package index password or token.
    pub index_password_env: Option<String>,
}

/// Code-hosting platform settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ForgeConfig {
    /// Environment variable holding the platform token (default: `GITHUB_TOKEN`).
    pub token_env: Option<String>,
}

/// Key-value cache settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct KvConfig {
    /// JSON file backing the local table.
    pub path: Option<Utf8PathBuf>,
    /// Wrap every cache operation in a tracing span.
    pub monitoring: Option<bool>,
}

impl Config {
    /// Path of the version file, relative to the project root.
    pub fn version_file(&self) -> &Utf8Path {
        self.project
            .version_file
            .as_deref()
            .unwrap_or_else(|| Utf8Path::new(DEFAULT_VERSION_FILE))
    }

    /// Path of the packaging descriptor, relative to the project root.
    pub fn descriptor(&self) -> &Utf8Path {
        self.project
            .descriptor
            .as_deref()
            .unwrap_or_else(|| Utf8Path::new(DEFAULT_DESCRIPTOR))
    }

    /// Regex locating the version inside the descriptor.
    pub fn descriptor_pattern(&self) -> &str {
        self.project
            .descriptor_pattern
            .as_deref()
            .unwrap_or(DEFAULT_DESCRIPTOR_PATTERN)
    }

    /// The release branch.
    pub fn release_branch(&self) -> &str {
        self.project
            .release_branch
            .as_deref()
            .unwrap_or(DEFAULT_RELEASE_BRANCH)
    }

    /// The git remote.
    pub fn remote(&self) -> &str {
        self.project.remote.as_deref().unwrap_or(DEFAULT_REMOTE)
    }

    /// Directory containing build artifacts, relative to the project root.
    pub fn dist_dir(&self) -> &Utf8Path {
        self.project
            .dist_dir
            .as_deref()
            .unwrap_or_else(|| Utf8Path::new(DEFAULT_DIST_DIR))
    }

    /// Environment variable holding the platform token.
    pub fn token_env(&self) -> &str {
        self.forge.token_env.as_deref().unwrap_or("GITHUB_TOKEN")
    }

    /// Environment variables holding the package index credentials.
    pub fn index_credential_envs(&self) -> [&str; 2] {
        [
            self.release
                .index_username_env
                .as_deref()
                .unwrap_or("TWINE_USERNAME"),
            self.release
                .index_password_env
                .as_deref()
                .unwrap_or("TWINE_PASSWORD"),
        ]
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
const APP_NAME: &str = "tally";

/// Builder for loading configuration from multiple sources.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    project_search_root: Option<Utf8PathBuf>,
    include_user_config: bool,
    /// Stop walking up once a directory containing this entry has been searched.
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

    /// Set whether to include user config from `~/.config/tally/`.
    pub const fn with_user_config(mut self, include: bool) -> Self {
        self.include_user_config = include;
        self
    }

    /// Set a boundary marker to stop directory traversal (default `.git`).
    pub fn with_boundary_marker<S: Into<String>>(mut self, marker: S) -> Self {
        self.boundary_marker = Some(marker.into());
        self
    }

    /// Disable boundary marker (search all the way to filesystem root).
    pub fn without_boundary_marker(mut self) -> Self {
        self.boundary_marker = None;
        self
    }

    /// Add an explicit config file to load. Later files win.
    pub fn with_file<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.explicit_files.push(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration, merging all discovered sources.
    ///
    /// Precedence (highest to lowest): explicit files, project config,
    /// user config, defaults.
    #[tracing::instrument(skip(self), fields(search_root = ?self.project_search_root))]
    pub fn load(self) -> ConfigResult<Config> {
        tracing::debug!("loading configuration");
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if self.include_user_config
            && let Some(user_config) = self.find_user_config()
        {
            figment = Self::merge_file(figment, &user_config);
        }

        if let Some(ref root) = self.project_search_root
            && let Some(project_config) = self.find_project_config(root)
        {
            figment = Self::merge_file(figment, &project_config);
        }

        for file in &self.explicit_files {
            figment = Self::merge_file(figment, file);
        }

        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;

        // Reject a broken descriptor pattern at load time rather than mid-bump.
        regex::Regex::new(config.descriptor_pattern()).map_err(|source| {
            ConfigError::InvalidPattern {
                pattern: config.descriptor_pattern().to_string(),
                source,
            }
        })?;

        tracing::info!(
            log_level = config.log_level.as_str(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Load configuration, returning an error if no config file is found.
    pub fn load_or_error(self) -> ConfigResult<Config> {
        let has_user = self.include_user_config && self.find_user_config().is_some();
        let has_project = self
            .project_search_root
            .as_ref()
            .and_then(|root| self.find_project_config(root))
            .is_some();

        if !has_user && !has_project && self.explicit_files.is_empty() {
            return Err(ConfigError::NotFound);
        }

        self.load()
    }

    fn find_project_config(&self, start: &Utf8Path) -> Option<Utf8PathBuf> {
        let mut current = Some(start.to_path_buf());

        while let Some(dir) = current {
            for ext in CONFIG_EXTENSIONS {
                let dotfile = dir.join(format!(".{APP_NAME}.{ext}"));
                if dotfile.is_file() {
                    return Some(dotfile);
                }

                let regular = dir.join(format!("{APP_NAME}.{ext}"));
                if regular.is_file() {
                    return Some(regular);
                }
            }

            // The repository root is searched, its parents are not.
            if let Some(ref marker) = self.boundary_marker
                && dir.join(marker).exists()
            {
                break;
            }

            current = dir.parent().map(Utf8Path::to_path_buf);
        }

        None
    }

    fn find_user_config(&self) -> Option<Utf8PathBuf> {
        let config_dir = user_config_dir()?;
        CONFIG_EXTENSIONS
            .iter()
            .map(|ext| config_dir.join(format!("config.{ext}")))
            .find(|path| path.is_file())
    }

    fn merge_file(figment: Figment, path: &Utf8Path) -> Figment {
        match path.extension() {
            Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path.as_str())),
            Some("json") => figment.merge(Json::file_exact(path.as_str())),
            _ => figment.merge(Toml::file_exact(path.as_str())),
        }
    }
}

/// Find the project config file path without loading it.
pub fn find_project_config<P: AsRef<Utf8Path>>(start: P) -> Option<Utf8PathBuf> {
    ConfigLoader::new()
        .with_project_search(start.as_ref())
        .without_boundary_marker()
        .find_project_config(start.as_ref())
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// Get the user config directory path (`~/.config/tally/` on Linux).
pub fn user_config_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.config_dir().to_path_buf()).ok()
}

/// Get the user cache directory path (`~/.cache/tally/` on Linux).
pub fn user_cache_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.cache_dir().to_path_buf()).ok()
}

/// Get the local data directory path (machine-specific, not synced).
///
/// The default key-value table lives here.
pub fn user_data_local_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.data_local_dir().to_path_buf()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, name: &str, contents: &str) -> Utf8PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        Utf8PathBuf::try_from(path).unwrap()
    }

    #[test]
    fn default_config_resolves_layout() {
        let config = Config::default();
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.version_file(), "VERSION");
        assert_eq!(config.descriptor(), "setup.py");
        assert_eq!(config.release_branch(), "main");
        assert_eq!(config.remote(), "origin");
        assert_eq!(config.dist_dir(), "dist");
        assert_eq!(config.token_env(), "GITHUB_TOKEN");
        assert_eq!(
            config.index_credential_envs(),
            ["TWINE_USERNAME", "TWINE_PASSWORD"]
        );
    }

    #[test]
    fn loader_builds_with_defaults() {
        let config = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .load()
            .unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn project_section_overrides_layout() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            "config.toml",
            r#"
[project]
package = "helpers"
version_file = "src/VERSION"
descriptor = "pyproject.toml"
release_branch = "trunk"
"#,
        );

        let config = ConfigLoader::new()
            .with_user_config(false)
            .with_file(&path)
            .load()
            .unwrap();

        assert_eq!(config.project.package.as_deref(), Some("helpers"));
        assert_eq!(config.version_file(), "src/VERSION");
        assert_eq!(config.descriptor(), "pyproject.toml");
        assert_eq!(config.release_branch(), "trunk");
    }

    #[test]
    fn tasks_section_parses_lists() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            "config.yaml",
            "tasks:\n  test:\n    - pytest -q\n  fmt_check:\n    - black --check .\n",
        );

        let config = ConfigLoader::new()
            .with_user_config(false)
            .with_file(&path)
            .load()
            .unwrap();

        assert_eq!(config.tasks.test, Some(vec!["pytest -q".to_string()]));
        assert_eq!(
            config.tasks.fmt_check,
            Some(vec!["black --check .".to_string()])
        );
        assert!(config.tasks.lint.is_none());
    }

    #[test]
    fn later_file_overrides_earlier() {
        let tmp = TempDir::new().unwrap();
        let base = write_config(&tmp, "base.toml", r#"log_level = "warn""#);
        let over = write_config(&tmp, "override.json", r#"{"log_level": "error"}"#);

        let config = ConfigLoader::new()
            .with_user_config(false)
            .with_file(&base)
            .with_file(&over)
            .load()
            .unwrap();

        assert_eq!(config.log_level, LogLevel::Error);
    }

    #[test]
    fn project_config_discovery_walks_up() {
        let tmp = TempDir::new().unwrap();
        let project_dir = tmp.path().join("project");
        let sub_dir = project_dir.join("src").join("deep");
        fs::create_dir_all(&sub_dir).unwrap();
        fs::write(project_dir.join(".tally.toml"), r#"log_level = "debug""#).unwrap();

        let sub_dir = Utf8PathBuf::try_from(sub_dir).unwrap();
        let config = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .with_project_search(&sub_dir)
            .load()
            .unwrap();

        assert_eq!(config.log_level, LogLevel::Debug);
    }

    #[test]
    fn boundary_marker_stops_search() {
        let tmp = TempDir::new().unwrap();
        let parent = tmp.path().join("parent");
        let child = parent.join("child");
        let work = child.join("work");
        fs::create_dir_all(&work).unwrap();
        fs::write(parent.join(".tally.toml"), r#"log_level = "warn""#).unwrap();
        fs::create_dir(child.join(".git")).unwrap();

        let work = Utf8PathBuf::try_from(work).unwrap();
        let config = ConfigLoader::new()
            .with_user_config(false)
            .with_boundary_marker(".git")
            .with_project_search(&work)
            .load()
            .unwrap();

        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn config_beside_boundary_is_found() {
        let tmp = TempDir::new().unwrap();
        let repo = tmp.path().join("repo");
        let src = repo.join("src");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir(repo.join(".git")).unwrap();
        fs::write(repo.join(".tally.toml"), r#"log_level = "error""#).unwrap();

        let src = Utf8PathBuf::try_from(src).unwrap();
        let config = ConfigLoader::new()
            .with_user_config(false)
            .with_project_search(&src)
            .load()
            .unwrap();

        assert_eq!(config.log_level, LogLevel::Error);
    }

    #[test]
    fn invalid_descriptor_pattern_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            "config.toml",
            "[project]\ndescriptor_pattern = \"version=([\"\n",
        );

        let result = ConfigLoader::new()
            .with_user_config(false)
            .with_file(&path)
            .load();

        assert!(matches!(result, Err(ConfigError::InvalidPattern { .. })));
    }

    #[test]
    fn load_or_error_fails_when_no_config() {
        let result = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .load_or_error();

        assert!(matches!(result, Err(ConfigError::NotFound)));
    }

    #[test]
    fn find_project_config_reports_path() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "tally.yml", "log_level: warn\n");
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        assert_eq!(find_project_config(&root), Some(path));
    }
}
