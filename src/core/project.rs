//! Project metadata loaded from `keel.toml`.
//!
//! A minimal manifest only needs a name:
//!
//! ```toml
//! name = "myapp"
//!
//! [frontend]
//! install = "npm install"
//! build = "npm run build"
//!
//! [pre_build_hooks]
//! "darwin/*" = "./scripts/sign.sh ${platform}"
//!
//! [post_build_hooks]
//! "*/*" = ["cp", "${bin}", "dist/"]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Name of the project manifest file.
pub const MANIFEST_NAME: &str = "keel.toml";

/// A command from the manifest.
///
/// Either a single line, split on whitespace, or an explicit argument list
/// for arguments that contain spaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandLine {
    Line(String),
    Args(Vec<String>),
}

impl CommandLine {
    /// The command as an argument list. Empty tokens are dropped.
    pub fn to_args(&self) -> Vec<String> {
        match self {
            CommandLine::Line(line) => line.split_whitespace().map(str::to_string).collect(),
            CommandLine::Args(args) => args.iter().filter(|a| !a.is_empty()).cloned().collect(),
        }
    }

    /// True if the command has no program to run.
    pub fn is_empty(&self) -> bool {
        self.to_args().is_empty()
    }
}

impl From<&str> for CommandLine {
    fn from(line: &str) -> Self {
        CommandLine::Line(line.to_string())
    }
}

/// Frontend build commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontendConfig {
    /// Frontend directory, relative to the project root
    pub dir: PathBuf,

    /// Dependency install command
    pub install: Option<CommandLine>,

    /// Production build command
    pub build: Option<CommandLine>,

    /// Build command used for dev builds (falls back to `build`)
    pub dev_build: Option<CommandLine>,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        FrontendConfig {
            dir: PathBuf::from("frontend"),
            install: None,
            build: None,
            dev_build: None,
        }
    }
}

/// Bindings generator settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingsConfig {
    /// Command that generates client bindings
    pub command: Option<CommandLine>,
}

/// Embed directive scanning settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedConfig {
    /// Directive marker that starts an embed line
    pub marker: String,

    /// Extension of the source files to scan
    pub extension: String,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        EmbedConfig {
            marker: "//go:embed".to_string(),
            extension: "go".to_string(),
        }
    }
}

/// Application metadata used for resources and bundles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfoConfig {
    pub product_name: Option<String>,
    pub product_version: Option<String>,
    pub company_name: Option<String>,
    pub copyright: Option<String>,
    pub comments: Option<String>,

    /// Reverse-DNS bundle identifier (macOS)
    pub identifier: Option<String>,

    /// Application icon, relative to the project root.
    /// `.ico` is used for Windows resources, `.icns` for macOS bundles.
    pub icon: Option<PathBuf>,
}

/// Project metadata. Immutable for the duration of a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Project name
    pub name: String,

    /// Project root directory (the directory containing `keel.toml`)
    #[serde(skip)]
    pub path: PathBuf,

    /// Build directory, relative to the project root
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,

    /// Output binary name (defaults to the project name)
    #[serde(default)]
    pub output_filename: Option<String>,

    /// Hooks run before the build, keyed by `<platform>/<arch>`
    #[serde(default)]
    pub pre_build_hooks: BTreeMap<String, CommandLine>,

    /// Hooks run after the build, keyed by `<platform>/<arch>`
    #[serde(default)]
    pub post_build_hooks: BTreeMap<String, CommandLine>,

    /// Run hooks keyed for platforms other than the host
    #[serde(default)]
    pub run_non_native_build_hooks: bool,

    #[serde(default)]
    pub frontend: FrontendConfig,

    #[serde(default)]
    pub bindings: BindingsConfig,

    #[serde(default)]
    pub embed: EmbedConfig,

    #[serde(default)]
    pub info: InfoConfig,
}

fn default_build_dir() -> PathBuf {
    PathBuf::from("build")
}

impl Project {
    /// Create a project with default settings rooted at `path`.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Project {
            name: name.into(),
            path: path.into(),
            build_dir: default_build_dir(),
            output_filename: None,
            pre_build_hooks: BTreeMap::new(),
            post_build_hooks: BTreeMap::new(),
            run_non_native_build_hooks: false,
            frontend: FrontendConfig::default(),
            bindings: BindingsConfig::default(),
            embed: EmbedConfig::default(),
            info: InfoConfig::default(),
        }
    }

    /// Load a project from its manifest file.
    pub fn load(manifest_path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(manifest_path)
            .with_context(|| format!("failed to read manifest: {}", manifest_path.display()))?;

        let mut project: Project = toml::from_str(&contents)
            .with_context(|| format!("failed to parse manifest: {}", manifest_path.display()))?;

        if project.name.trim().is_empty() {
            bail!(
                "`name` must not be empty in {}",
                manifest_path.display()
            );
        }

        project.path = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Ok(project)
    }

    /// Absolute build directory.
    pub fn build_dir(&self) -> PathBuf {
        self.path.join(&self.build_dir)
    }

    /// Directory compiled binaries are written to.
    pub fn bin_dir(&self) -> PathBuf {
        self.build_dir().join("bin")
    }

    /// Absolute frontend directory.
    pub fn frontend_dir(&self) -> PathBuf {
        self.path.join(&self.frontend.dir)
    }

    /// Base name of the compiled binary, without platform extension.
    pub fn output_name(&self) -> &str {
        self.output_filename.as_deref().unwrap_or(&self.name)
    }

    /// Display name for bundles and resources.
    pub fn product_name(&self) -> &str {
        self.info.product_name.as_deref().unwrap_or(&self.name)
    }

    /// Version for bundles and resources.
    pub fn product_version(&self) -> &str {
        self.info.product_version.as_deref().unwrap_or("1.0.0")
    }
}
