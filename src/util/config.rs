//! Configuration file support for Keel.
//!
//! Keel reads two configuration files:
//! - Global: `~/.keel/config.toml` - User-wide defaults
//! - Project: `.keel/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config, and command-line
//! flags take precedence over both.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Keel configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build settings
    pub build: BuildConfig,
}

/// Build-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BuildConfig {
    /// Compiler command (e.g., "go", "go1.22")
    pub compiler: Option<String>,

    /// Tags added to every build
    pub tags: Vec<String>,

    /// Linker flags added to every build
    pub ldflags: Option<String>,

    /// Default verbosity, 0 (quiet) to 2 (verbose)
    pub verbosity: Option<u8>,

    /// Limit for each external process, in seconds
    pub process_timeout_secs: Option<u64>,

    /// Flags passed to the compressor
    pub compress_flags: Option<String>,
}

impl BuildConfig {
    /// The configured process timeout. Zero means no limit.
    pub fn process_timeout(&self) -> Option<Duration> {
        self.process_timeout_secs
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.build.compiler.is_some() {
            self.build.compiler = other.build.compiler;
        }
        if !other.build.tags.is_empty() {
            self.build.tags = other.build.tags;
        }
        if other.build.ldflags.is_some() {
            self.build.ldflags = other.build.ldflags;
        }
        if other.build.verbosity.is_some() {
            self.build.verbosity = other.build.verbosity;
        }
        if other.build.process_timeout_secs.is_some() {
            self.build.process_timeout_secs = other.build.process_timeout_secs;
        }
        if other.build.compress_flags.is_some() {
            self.build.compress_flags = other.build.compress_flags;
        }
    }
}

/// Get the global keel config directory (~/.keel).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".keel"))
}

/// Get the project config path (.keel/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".keel").join("config.toml")
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.keel/config.toml)
/// 2. Global config (~/.keel/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        config.merge(Config::load_or_default(global_path));
    }

    // Project config overrides global
    config.merge(Config::load_or_default(project_path));

    config
}
