//! Test utilities and fakes for Keel unit tests.
//!
//! The pipeline drives external tools through traits. The fakes here stand
//! in for those tools: they write plausible output files, can be told to
//! fail, and record what they were asked to do in a shared [`EventLog`].
//!
//! # Example
//!
//! ```rust,ignore
//! use keel::test_support::{FakeServices, ProjectFixture};
//!
//! #[test]
//! fn test_example() {
//!     let tmp = tempfile::TempDir::new().unwrap();
//!     let project = ProjectFixture::new("demo").write(tmp.path());
//!     let fakes = FakeServices::new("linux");
//!
//!     let outcome = build(&BuildOptions::new(project), &fakes.services(), &Shell::quiet());
//!     assert_eq!(fakes.events(), vec!["bindings", "compile linux/amd64"]);
//! }
//! ```

pub mod fixtures;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};

use crate::builder::fusion::BinaryFuser;
use crate::builder::package::Packager;
use crate::builder::resources::ResourceCompiler;
use crate::builder::toolchain::{CompileRequest, Toolchain};
use crate::builder::BuilderRegistry;
use crate::core::error::BuildError;
use crate::core::options::BuildOptions;
use crate::core::platform::Arch;
use crate::core::project::EmbedConfig;
use crate::ops::bindings::{BindingsGenerator, BindingsRequest};
use crate::ops::embed::SourceEmbedScanner;
use crate::ops::keel_build::BuildServices;

// Re-export fixtures for convenience
pub use fixtures::*;

fn tool_failure(tool: &str) -> anyhow::Error {
    BuildError::Tool {
        tool: tool.to_string(),
        message: "exit code 1".to_string(),
        stderr: format!("{}: simulated failure\n", tool),
    }
    .into()
}

/// Ordered record of what the fakes were asked to do.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Debug, Default)]
struct ToolchainState {
    calls: Vec<CompileRequest>,
    fail_on: Option<Arch>,
    required: Vec<PathBuf>,
}

/// Toolchain that writes a small file instead of compiling.
#[derive(Debug, Clone, Default)]
pub struct FakeToolchain {
    state: Arc<Mutex<ToolchainState>>,
    log: EventLog,
}

impl FakeToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_log(log: EventLog) -> Self {
        FakeToolchain {
            state: Arc::default(),
            log,
        }
    }

    /// Fail every compile for `arch`.
    pub fn fail_on(&self, arch: Arch) {
        self.state.lock().unwrap().fail_on = Some(arch);
    }

    /// Fail unless `path` exists when compiling.
    pub fn require_path(&self, path: PathBuf) {
        self.state.lock().unwrap().required.push(path);
    }

    /// Every compile requested so far.
    pub fn calls(&self) -> Vec<CompileRequest> {
        self.state.lock().unwrap().calls.clone()
    }
}

impl Toolchain for FakeToolchain {
    fn name(&self) -> &str {
        "fake"
    }

    fn compile(&self, request: &CompileRequest) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(request.clone());

        if let Some(missing) = state.required.iter().find(|p| !p.exists()) {
            bail!("required path missing at compile time: {}", missing.display());
        }
        if state.fail_on == Some(request.arch) {
            return Err(tool_failure("compiler"));
        }

        fs::write(&request.output, format!("binary {}", request.arch))?;
        self.log
            .push(format!("compile {}/{}", request.platform, request.arch));
        Ok(())
    }
}

/// Fuser that concatenates its inputs.
#[derive(Debug, Clone, Default)]
pub struct FakeFuser {
    fail: Arc<Mutex<bool>>,
    log: EventLog,
}

impl FakeFuser {
    /// Fail every fuse.
    pub fn fail(&self) {
        *self.fail.lock().unwrap() = true;
    }
}

impl BinaryFuser for FakeFuser {
    fn fuse(
        &self,
        dir: &Path,
        output: &str,
        inputs: &[String],
        _timeout: Option<Duration>,
    ) -> Result<()> {
        if *self.fail.lock().unwrap() {
            return Err(tool_failure("lipo"));
        }

        let mut fused = String::new();
        for input in inputs {
            fused.push_str(&fs::read_to_string(dir.join(input))?);
        }
        fs::write(dir.join(output), fused)?;
        self.log
            .push(format!("fuse {} <- {}", output, inputs.join(" ")));
        Ok(())
    }
}

/// Bindings generator that records its requests.
#[derive(Debug, Clone, Default)]
pub struct RecordingBindings {
    requests: Arc<Mutex<Vec<BindingsRequest>>>,
    log: EventLog,
}

impl RecordingBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<BindingsRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl BindingsGenerator for RecordingBindings {
    fn generate(&self, request: &BindingsRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        self.log.push("bindings");
        Ok("generated".to_string())
    }
}

/// Packager that only records the host it ran for.
#[derive(Debug, Clone, Default)]
pub struct RecordingPackager {
    log: EventLog,
}

impl Packager for RecordingPackager {
    fn package(&self, opts: &BuildOptions, host: &str) -> Result<()> {
        if opts.compiled_binary.is_none() {
            bail!("nothing to package");
        }
        self.log.push(format!("package {}", host));
        Ok(())
    }
}

/// Resource compiler that writes a placeholder object.
#[derive(Debug, Clone, Default)]
pub struct FakeResourceCompiler {
    log: EventLog,
}

impl ResourceCompiler for FakeResourceCompiler {
    fn compile(
        &self,
        script: &Path,
        output: &Path,
        arch: Arch,
        _timeout: Option<Duration>,
    ) -> Result<()> {
        let script = fs::read_to_string(script)?;
        fs::write(output, script)?;
        self.log.push(format!("resources {}", arch));
        Ok(())
    }
}

/// A full set of fakes sharing one event log.
pub struct FakeServices {
    pub toolchain: FakeToolchain,
    pub fuser: FakeFuser,
    pub bindings: RecordingBindings,
    pub packager: RecordingPackager,
    pub resources: FakeResourceCompiler,
    pub host: String,
    log: EventLog,
}

impl FakeServices {
    /// Fakes for a build running on `host`.
    pub fn new(host: &str) -> Self {
        let log = EventLog::default();
        FakeServices {
            toolchain: FakeToolchain::with_log(log.clone()),
            fuser: FakeFuser {
                fail: Arc::default(),
                log: log.clone(),
            },
            bindings: RecordingBindings {
                requests: Arc::default(),
                log: log.clone(),
            },
            packager: RecordingPackager { log: log.clone() },
            resources: FakeResourceCompiler { log: log.clone() },
            host: host.to_string(),
            log,
        }
    }

    /// Build services backed by these fakes and the real embed scanner.
    pub fn services(&self) -> BuildServices {
        BuildServices {
            registry: BuilderRegistry::new(),
            toolchain: Arc::new(self.toolchain.clone()),
            fuser: Box::new(self.fuser.clone()),
            bindings: Box::new(self.bindings.clone()),
            packager: Box::new(self.packager.clone()),
            scanner: Box::new(SourceEmbedScanner::new(&EmbedConfig::default()).unwrap()),
            resources: Box::new(self.resources.clone()),
            host: self.host.clone(),
        }
    }

    /// Everything the fakes did, in order.
    pub fn events(&self) -> Vec<String> {
        self.log.events()
    }
}
