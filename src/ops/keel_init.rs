//! Implementation of `keel init`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::core::project::{Project, MANIFEST_NAME};

/// Options for initializing a project.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Project name
    pub name: String,

    /// Frontend directory, relative to the project root
    pub frontend_dir: String,
}

/// Write a starter `keel.toml` into `path`, returning the manifest path.
pub fn init_project(path: &Path, opts: &InitOptions) -> Result<PathBuf> {
    if opts.name.trim().is_empty() {
        bail!("project name must not be empty");
    }

    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }

    let manifest_path = path.join(MANIFEST_NAME);
    if manifest_path.exists() {
        bail!("`{}` already exists in `{}`", MANIFEST_NAME, path.display());
    }

    fs::write(&manifest_path, starter_manifest(opts))
        .with_context(|| format!("failed to write {}", MANIFEST_NAME))?;

    // The written manifest must load
    Project::load(&manifest_path)?;

    Ok(manifest_path)
}

fn starter_manifest(opts: &InitOptions) -> String {
    format!(
        r#"name = "{name}"

[frontend]
dir = "{frontend}"
install = "npm install"
build = "npm run build"

[bindings]
# command = "wails generate bindings"

[info]
product_version = "1.0.0"

# Hooks are keyed by "<platform>/<arch>" and may use "*" wildcards.
# ${{platform}} expands to the target, ${{bin}} to the compiled binary.
[pre_build_hooks]

[post_build_hooks]
"#,
        name = opts.name.replace('"', "\\\""),
        frontend = opts.frontend_dir,
    )
}
