//! Application builders.
//!
//! A [`Builder`] knows how to build the frontend and compile the application
//! for one output type. The pipeline picks exactly one builder per build from
//! the [`BuilderRegistry`] and drives it through [`BuilderGuard`], which makes
//! sure `clean_up` runs however the build ends.

pub mod desktop;
pub mod fusion;
pub mod package;
pub mod resources;
pub mod toolchain;

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use crate::core::error::BuildError;
use crate::core::options::{BuildOptions, OutputType};
use crate::core::project::Project;
use crate::util::shell::Shell;

pub use desktop::DesktopBuilder;
pub use fusion::{BinaryFuser, LipoFuser, UniversalPlan};
pub use package::{HostPackager, Packager};
pub use resources::{GeneratedFile, ResourceCompiler, Windres};
pub use toolchain::{CompileRequest, GoToolchain, Toolchain};

/// Capabilities every output type provides.
pub trait Builder {
    /// Hand the builder the project it is building.
    fn set_project_data(&mut self, project: Arc<Project>);

    /// Filename of the binary `opts` describes, inside the bin directory.
    fn output_filename(&self, opts: &BuildOptions) -> String;

    /// Build the frontend assets.
    fn build_frontend(&mut self, opts: &BuildOptions, shell: &Shell) -> Result<()>;

    /// Compile one binary for `opts.platform`/`opts.arch`, record it in
    /// `opts.compiled_binary` and return its path.
    fn compile_project(&mut self, opts: &mut BuildOptions, shell: &Shell) -> Result<PathBuf>;

    /// Register a temporary file that `clean_up` must delete if it still exists.
    fn track_intermediate(&mut self, path: PathBuf);

    /// Stop tracking a temporary file that has been dealt with.
    fn release_intermediate(&mut self, path: &Path);

    /// Release everything the builder still holds.
    fn clean_up(&mut self) -> Result<()>;
}

type BuilderFactory = fn(Arc<dyn Toolchain>) -> Box<dyn Builder>;

/// Maps output types to builders.
pub struct BuilderRegistry {
    factories: HashMap<OutputType, BuilderFactory>,
}

impl BuilderRegistry {
    /// Create a registry with all built-in builders.
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register(OutputType::Desktop, |toolchain| {
            Box::new(DesktopBuilder::new(toolchain))
        });
        registry.register(OutputType::Dev, |toolchain| {
            Box::new(DesktopBuilder::new(toolchain))
        });

        registry
    }

    /// Create a registry with no builders.
    pub fn empty() -> Self {
        BuilderRegistry {
            factories: HashMap::new(),
        }
    }

    /// Register the builder for an output type, replacing any existing one.
    pub fn register(&mut self, output_type: OutputType, factory: BuilderFactory) {
        self.factories.insert(output_type, factory);
    }

    /// Create the builder for `output_type`.
    pub fn create(
        &self,
        output_type: OutputType,
        toolchain: Arc<dyn Toolchain>,
    ) -> Result<Box<dyn Builder>, BuildError> {
        self.factories
            .get(&output_type)
            .map(|factory| factory(toolchain))
            .ok_or_else(|| BuildError::UnknownOutputType(output_type.to_string()))
    }

    /// Check if an output type has a builder.
    pub fn contains(&self, output_type: OutputType) -> bool {
        self.factories.contains_key(&output_type)
    }
}

impl Default for BuilderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns a builder for the duration of a build.
///
/// [`release`](BuilderGuard::release) runs `clean_up` and reports its error.
/// Dropping the guard without releasing, as happens when a stage fails and
/// the pipeline returns early, still runs `clean_up` and logs any failure.
pub struct BuilderGuard {
    builder: Option<Box<dyn Builder>>,
}

impl BuilderGuard {
    pub fn new(builder: Box<dyn Builder>) -> Self {
        BuilderGuard {
            builder: Some(builder),
        }
    }

    /// Clean up the builder, returning any cleanup error.
    pub fn release(mut self) -> Result<()> {
        match self.builder.take() {
            Some(mut builder) => builder.clean_up(),
            None => Ok(()),
        }
    }
}

impl Deref for BuilderGuard {
    type Target = dyn Builder;

    fn deref(&self) -> &Self::Target {
        // Only `release` and `drop` take the builder, and both consume the guard.
        match &self.builder {
            Some(builder) => builder.as_ref(),
            None => unreachable!("builder accessed after release"),
        }
    }
}

impl DerefMut for BuilderGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.builder {
            Some(builder) => builder.as_mut(),
            None => unreachable!("builder accessed after release"),
        }
    }
}

impl Drop for BuilderGuard {
    fn drop(&mut self) {
        if let Some(mut builder) = self.builder.take() {
            if let Err(e) = builder.clean_up() {
                tracing::warn!("builder cleanup failed: {:#}", e);
            }
        }
    }
}
