//! Global context for Keel operations.
//!
//! Provides centralized access to the working directory and the locations
//! of manifests and configuration files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use crate::core::project::MANIFEST_NAME;
use crate::util::config::{global_config_dir, load_config, project_config_path, Config};
use crate::util::fs::find_upwards;

/// The working directory is not inside a Keel project.
#[derive(Debug, Error)]
#[error("could not find `{}` in `{}` or any parent directory", MANIFEST_NAME, dir.display())]
pub struct ManifestNotFound {
    pub dir: PathBuf,
}

/// Global context containing paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for global Keel data (~/.keel/)
    home: Option<PathBuf>,
}

impl GlobalContext {
    /// Create a new GlobalContext for the process working directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Self::with_cwd(cwd))
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Self {
        GlobalContext {
            cwd,
            home: global_config_dir(),
        }
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the Keel home directory (~/.keel/), if a home directory is known.
    pub fn home(&self) -> Option<&Path> {
        self.home.as_deref()
    }

    /// Global config file (~/.keel/config.toml).
    pub fn config_path(&self) -> Option<PathBuf> {
        self.home.as_ref().map(|h| h.join("config.toml"))
    }

    /// Find `keel.toml`, starting from cwd and searching upward.
    pub fn find_manifest(&self) -> Result<PathBuf, ManifestNotFound> {
        find_upwards(&self.cwd, MANIFEST_NAME).ok_or_else(|| ManifestNotFound {
            dir: self.cwd.clone(),
        })
    }

    /// Configuration for the project rooted at `project_root`.
    pub fn load_config(&self, project_root: &Path) -> Config {
        load_config(
            self.config_path().as_deref(),
            &project_config_path(project_root),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_manifest_in_parent() {
        let tmp = TempDir::new().unwrap();
        let manifest = tmp.path().join(MANIFEST_NAME);
        std::fs::write(&manifest, "name = \"app\"\n").unwrap();
        let nested = tmp.path().join("frontend").join("src");
        std::fs::create_dir_all(&nested).unwrap();

        let ctx = GlobalContext::with_cwd(nested);
        assert_eq!(ctx.find_manifest().ok(), Some(manifest));
    }

    #[test]
    fn test_find_manifest_missing() {
        let tmp = TempDir::new().unwrap();

        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf());
        let err = ctx.find_manifest().unwrap_err();
        assert!(err.to_string().contains("could not find `keel.toml`"));
    }

    #[test]
    fn test_project_config_loaded() {
        let tmp = TempDir::new().unwrap();
        let config = project_config_path(tmp.path());
        std::fs::create_dir_all(config.parent().unwrap()).unwrap();
        std::fs::write(&config, "[build]\nverbosity = 0\n").unwrap();

        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf());
        assert_eq!(ctx.load_config(tmp.path()).build.verbosity, Some(0));
    }
}
