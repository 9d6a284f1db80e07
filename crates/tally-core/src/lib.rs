//! Core library for tally.
//!
//! This crate provides the caching helpers detections use and the release
//! automation that ships them, for the `tally` CLI and any downstream
//! consumers.
//!
//! # Modules
//!
//! - [`kv`] - Counters, string sets and dictionaries with expiry
//! - [`config`] - Configuration loading and management
//! - [`trigger`] - Mapping repository events to workflows
//! - [`tasks`] - Named shell task lists (lint, test, build, ...)
//! - [`ci`] - The CI pipeline
//! - [`format`] - The auto-formatting job
//! - [`bump`] - Version bumps across the version file and descriptor
//! - [`release`] - Build, draft release and publish
//! - [`preflight`] - Readiness checks before bump or release
//! - [`manifest`] - The two places the version lives
//! - [`forge`] - Pull requests and releases on the hosting forge
//! - [`git`] - Git operations
//! - [`version`] - Bump levels and version computation
//! - [`error`] - Error types and result aliases
//!
//! # Quick Start
//!
//! ```no_run
//! use tally_core::{Config, ConfigLoader};
//!
//! let config = ConfigLoader::new()
//!     .with_user_config(true)
//!     .load()
//!     .expect("Failed to load configuration");
//!
//! println!("Log level: {:?}", config.log_level);
//! ```
#![deny(unsafe_code)]

pub mod bump;

pub mod ci;

pub mod config;

pub mod error;

pub mod forge;

pub mod format;

pub mod git;

pub mod kv;

pub mod manifest;

pub mod preflight;

pub mod release;

pub mod tasks;

pub mod trigger;

pub mod version;

pub use config::{Config, ConfigLoader, LogLevel};

pub use error::{ConfigError, ConfigResult};

// Re-export semver so downstream crates don't need a direct dependency.
pub use semver;
