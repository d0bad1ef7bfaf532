//! Compiler toolchain abstraction.
//!
//! A toolchain turns a prepared project into one binary for a single
//! `(platform, arch)` pair. Universal binaries are assembled above this layer
//! from two single-architecture compiles.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use crate::core::error::BuildError;
use crate::core::platform::{Arch, Platform};
use crate::util::process::ProcessBuilder;

/// Compiler wrapper used for obfuscated builds.
pub const OBFUSCATOR: &str = "garble";

/// One single-architecture compile.
#[derive(Debug, Clone)]
pub struct CompileRequest {
    /// Directory the compiler runs in
    pub project_root: PathBuf,
    pub platform: Platform,
    pub arch: Arch,
    /// Full path of the binary to produce
    pub output: PathBuf,
    pub tags: Vec<String>,
    pub ldflags: String,
    pub trim_path: bool,
    pub race_detector: bool,
    pub force_build: bool,
    pub timeout: Option<Duration>,
}

/// A compiler that can build the project for one target.
pub trait Toolchain {
    /// Short name for status lines.
    fn name(&self) -> &str;

    /// Compile `request`, leaving the binary at `request.output`.
    fn compile(&self, request: &CompileRequest) -> Result<()>;
}

/// Toolchain driven through a `build` subcommand with GOOS/GOARCH style
/// target selection.
#[derive(Debug, Clone)]
pub struct GoToolchain {
    program: String,
    wrapper_args: Vec<String>,
}

impl GoToolchain {
    /// Use `program` as the compiler.
    pub fn new(program: impl Into<String>) -> Self {
        GoToolchain {
            program: program.into(),
            wrapper_args: Vec::new(),
        }
    }

    /// Compile through the obfuscating wrapper, passing it `args` first.
    pub fn obfuscated(args: &str) -> Self {
        GoToolchain {
            program: OBFUSCATOR.to_string(),
            wrapper_args: args.split_whitespace().map(str::to_string).collect(),
        }
    }

    /// The process that compiles `request`.
    pub fn command(&self, request: &CompileRequest) -> ProcessBuilder {
        let mut cmd = ProcessBuilder::new(&self.program)
            .args(&self.wrapper_args)
            .arg("build");

        if !request.tags.is_empty() {
            cmd = cmd.arg("-tags").arg(request.tags.join(","));
        }
        if !request.ldflags.trim().is_empty() {
            cmd = cmd.arg("-ldflags").arg(request.ldflags.trim());
        }
        if request.trim_path {
            cmd = cmd.arg("-trimpath");
        }
        if request.race_detector {
            cmd = cmd.arg("-race");
        }
        if request.force_build {
            cmd = cmd.arg("-a");
        }

        cmd.arg("-o")
            .arg(&request.output)
            .cwd(&request.project_root)
            .env("GOOS", request.platform.as_str())
            .env("GOARCH", request.arch.as_str())
            .env("CGO_ENABLED", "1")
            .timeout(request.timeout)
    }
}

impl Toolchain for GoToolchain {
    fn name(&self) -> &str {
        &self.program
    }

    fn compile(&self, request: &CompileRequest) -> Result<()> {
        let output = self
            .command(request)
            .exec_and_check()
            .map_err(|e| BuildError::tool(format!("compiler `{}`", self.program), e))?;

        if !output.stdout.trim().is_empty() {
            tracing::debug!("{}", output.stdout.trim_end());
        }
        Ok(())
    }
}
