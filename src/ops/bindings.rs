//! Client bindings generation.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use crate::core::error::BuildError;
use crate::core::options::BuildOptions;
use crate::core::project::CommandLine;
use crate::util::process::ProcessBuilder;
use crate::util::shell::{Shell, Status};

/// Inputs for one bindings generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingsRequest {
    pub project_root: PathBuf,
    /// Tags the generator compiles the backend with
    pub tags: Vec<String>,
    /// Tidy dependency metadata first
    pub tidy: bool,
    pub timeout: Option<Duration>,
}

impl BindingsRequest {
    pub fn from_options(opts: &BuildOptions) -> Self {
        BindingsRequest {
            project_root: opts.project.path.clone(),
            tags: opts.effective_tags(),
            tidy: !opts.skip_mod_tidy,
            timeout: opts.process_timeout,
        }
    }
}

/// Generates client bindings from backend method signatures.
pub trait BindingsGenerator {
    /// Generate bindings, returning the generator's output.
    fn generate(&self, request: &BindingsRequest) -> Result<String>;
}

/// Runs the bindings command configured in the manifest.
#[derive(Debug, Clone)]
pub struct CommandBindingsGenerator {
    command: Option<CommandLine>,
}

impl CommandBindingsGenerator {
    pub fn new(command: Option<CommandLine>) -> Self {
        CommandBindingsGenerator { command }
    }

    /// The generator process for `request`, or `None` if no command is configured.
    pub fn command(&self, request: &BindingsRequest) -> Option<ProcessBuilder> {
        let argv = self.command.as_ref()?.to_args();
        let mut cmd = ProcessBuilder::from_argv(&argv)?;

        if !request.tags.is_empty() {
            cmd = cmd.arg("-tags").arg(request.tags.join(","));
        }
        Some(
            cmd.arg(format!("-tidy={}", request.tidy))
                .cwd(&request.project_root)
                .timeout(request.timeout),
        )
    }
}

impl BindingsGenerator for CommandBindingsGenerator {
    fn generate(&self, request: &BindingsRequest) -> Result<String> {
        let Some(cmd) = self.command(request) else {
            tracing::info!("no bindings command configured; skipping bindings generation");
            return Ok(String::new());
        };

        tracing::debug!("running bindings generator: {}", cmd.display_command());
        let output = cmd
            .exec_and_check()
            .map_err(|e| BuildError::tool("bindings generator", e))?;
        Ok(output.stdout)
    }
}

/// Generate bindings for the build described by `opts`.
pub fn generate_bindings(
    generator: &dyn BindingsGenerator,
    opts: &BuildOptions,
    shell: &Shell,
) -> Result<()> {
    let request = BindingsRequest::from_options(opts);
    let label = if opts.obfuscated {
        "obfuscated bindings"
    } else {
        "bindings"
    };

    let spinner = shell.spinner(Status::Generating, label);
    let result = generator.generate(&request);
    spinner.finish();

    let output = result?;
    shell.verbose_output(&output);
    Ok(())
}
