//! Universal binary fusion.
//!
//! A universal binary is built as two ordinary single-architecture compiles
//! followed by a merge. [`UniversalPlan`] names the intermediate files; the
//! merge step is the barrier that needs both of them.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;

use crate::core::error::BuildError;
use crate::core::platform::Arch;
use crate::util::process::ProcessBuilder;

/// One architecture slice of a universal binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice {
    pub arch: Arch,
    /// Filename inside the bin directory, `<base>-<arch>`
    pub filename: String,
}

/// Intermediate and final filenames for a universal build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniversalPlan {
    /// Filename of the fused binary
    pub base: String,
    pub slices: Vec<Slice>,
}

impl UniversalPlan {
    /// Plan a universal build producing `base`.
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        let slices = Arch::UNIVERSAL_SLICES
            .iter()
            .map(|&arch| Slice {
                arch,
                filename: format!("{}-{}", base, arch),
            })
            .collect();

        UniversalPlan { base, slices }
    }

    /// Intermediate filenames, in compile order.
    pub fn slice_filenames(&self) -> Vec<String> {
        self.slices.iter().map(|s| s.filename.clone()).collect()
    }
}

/// Merges single-architecture binaries into one.
pub trait BinaryFuser {
    /// Merge `inputs` into `output`. Paths are relative to `dir`.
    fn fuse(
        &self,
        dir: &Path,
        output: &str,
        inputs: &[String],
        timeout: Option<Duration>,
    ) -> Result<()>;
}

/// Fuses binaries with `lipo -create`.
#[derive(Debug, Clone)]
pub struct LipoFuser {
    program: String,
}

impl LipoFuser {
    pub fn new() -> Self {
        LipoFuser {
            program: "lipo".to_string(),
        }
    }

    /// The `lipo` invocation for a merge.
    pub fn command(&self, dir: &Path, output: &str, inputs: &[String]) -> ProcessBuilder {
        ProcessBuilder::new(&self.program)
            .args(["-create", "-output", output])
            .args(inputs)
            .cwd(dir)
    }
}

impl Default for LipoFuser {
    fn default() -> Self {
        Self::new()
    }
}

impl BinaryFuser for LipoFuser {
    fn fuse(
        &self,
        dir: &Path,
        output: &str,
        inputs: &[String],
        timeout: Option<Duration>,
    ) -> Result<()> {
        let cmd = self.command(dir, output, inputs).timeout(timeout);
        tracing::debug!("running lipo: {}", cmd.display_command());
        cmd.exec_and_check()
            .map_err(|e| BuildError::tool("lipo", e))?;
        Ok(())
    }
}
