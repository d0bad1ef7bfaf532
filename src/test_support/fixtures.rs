//! Test fixtures for common test scenarios.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::core::project::{Project, MANIFEST_NAME};

/// Fixture for a project manifest on disk.
#[derive(Debug, Clone)]
pub struct ProjectFixture {
    /// Project name.
    pub name: String,
    /// Manifest text appended after the name.
    pub extra: String,
}

impl ProjectFixture {
    /// Create a fixture for a project with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        ProjectFixture {
            name: name.into(),
            extra: String::new(),
        }
    }

    /// Append raw TOML to the manifest.
    pub fn manifest_extra(mut self, toml: &str) -> Self {
        self.extra.push_str(toml);
        self
    }

    /// The manifest text.
    pub fn manifest(&self) -> String {
        format!("name = \"{}\"\n{}", self.name, self.extra)
    }

    /// Write `keel.toml` into `dir` and load it.
    pub fn write(&self, dir: &Path) -> Arc<Project> {
        fs::create_dir_all(dir).unwrap();
        let manifest = dir.join(MANIFEST_NAME);
        fs::write(&manifest, self.manifest()).unwrap();
        Arc::new(Project::load(&manifest).unwrap())
    }
}
