//! Build options.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::core::error::BuildError;
use crate::core::platform::{Arch, Platform};
use crate::core::project::Project;
use crate::util::shell::Verbosity;

/// Tag added to compiler and bindings tags for obfuscated builds.
pub const OBFUSCATED_TAG: &str = "obfuscated";

/// What kind of artifact is being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputType {
    Desktop,
    Dev,
}

impl OutputType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OutputType::Desktop => "desktop",
            OutputType::Dev => "dev",
        }
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputType {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "desktop" => Ok(OutputType::Desktop),
            "dev" => Ok(OutputType::Dev),
            other => Err(BuildError::UnknownOutputType(other.to_string())),
        }
    }
}

/// Build mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Production,
    Dev,
    Debug,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" | "release" => Ok(Mode::Production),
            "dev" => Ok(Mode::Dev),
            "debug" => Ok(Mode::Debug),
            _ => Err(format!(
                "invalid mode '{}'; expected 'production', 'dev', or 'debug'",
                s
            )),
        }
    }
}

/// All options for a single build.
///
/// The pipeline works on a private copy: fields such as `arch` and
/// `output_file` are overwritten while a universal binary is assembled, and
/// `compiled_binary` is filled in as compilation succeeds. A caller's value is
/// never modified.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// What to build (selects the builder)
    pub output_type: OutputType,

    /// Production, dev or debug
    pub mode: Mode,

    /// Project metadata
    pub project: Arc<Project>,

    /// Target platform
    pub platform: Platform,

    /// Target architecture, or `Universal` for a fused darwin binary
    pub arch: Arch,

    /// Compiler command
    pub compiler: String,

    /// Flags passed to the linker
    pub ldflags: String,

    /// Tags passed to the compiler and the bindings generator
    pub user_tags: Vec<String>,

    /// Output verbosity
    pub verbosity: Verbosity,

    /// Package the application after compiling
    pub pack: bool,

    /// Compress the compiled binary
    pub compress: bool,

    /// Flags passed to the compressor
    pub compress_flags: String,

    /// Override for the output filename
    pub output_file: Option<String>,

    /// Directory compiled binaries are written to
    pub bin_directory: PathBuf,

    /// Empty the bin directory before compiling
    pub clean_bin_directory: bool,

    /// Path to the compiled binary, once compilation succeeded
    pub compiled_binary: Option<PathBuf>,

    /// Skip the frontend build
    pub skip_frontend: bool,

    /// Skip compiling the application
    pub skip_application: bool,

    /// Skip bindings generation
    pub skip_bindings: bool,

    /// Skip tidying dependency metadata during bindings generation
    pub skip_mod_tidy: bool,

    /// Obfuscate bound methods and compile through the obfuscator
    pub obfuscated: bool,

    /// Extra arguments for the obfuscator
    pub obfuscator_args: String,

    /// Strip local paths from the binary
    pub trim_path: bool,

    /// Build with the race detector
    pub race_detector: bool,

    /// Force a rebuild of all packages
    pub force_build: bool,

    /// Keep the console window for Windows production builds
    pub windows_console: bool,

    /// Name of the macOS application bundle
    pub bundle_name: Option<String>,

    /// Limit for each external process, `None` waits indefinitely
    pub process_timeout: Option<Duration>,
}

impl BuildOptions {
    /// Default options for a desktop build of `project` on the host.
    pub fn new(project: Arc<Project>) -> Self {
        let bin_directory = project.bin_dir();
        BuildOptions {
            output_type: OutputType::Desktop,
            mode: Mode::Production,
            project,
            platform: Platform::host().unwrap_or(Platform::Linux),
            arch: Arch::host(),
            compiler: "go".to_string(),
            ldflags: String::new(),
            user_tags: Vec::new(),
            verbosity: Verbosity::Normal,
            pack: false,
            compress: false,
            compress_flags: String::new(),
            output_file: None,
            bin_directory,
            clean_bin_directory: false,
            compiled_binary: None,
            skip_frontend: false,
            skip_application: false,
            skip_bindings: false,
            skip_mod_tidy: false,
            obfuscated: false,
            obfuscator_args: String::new(),
            trim_path: false,
            race_detector: false,
            force_build: false,
            windows_console: false,
            bundle_name: None,
            process_timeout: None,
        }
    }

    /// Set the target platform and architecture.
    pub fn with_target(mut self, platform: Platform, arch: Arch) -> Self {
        self.platform = platform;
        self.arch = arch;
        self
    }

    /// The `<platform>/<arch>` string for the current target.
    pub fn target_key(&self) -> String {
        format!("{}/{}", self.platform, self.arch)
    }

    /// True when building a fused multi-architecture darwin binary.
    pub fn is_universal(&self) -> bool {
        self.platform == Platform::Darwin && self.arch == Arch::Universal
    }

    pub fn is_verbose(&self) -> bool {
        self.verbosity == Verbosity::Verbose
    }

    /// User tags, plus the obfuscation tag when obfuscating.
    pub fn effective_tags(&self) -> Vec<String> {
        let mut tags = self.user_tags.clone();
        if self.obfuscated && !tags.iter().any(|t| t == OBFUSCATED_TAG) {
            tags.push(OBFUSCATED_TAG.to_string());
        }
        tags
    }
}
