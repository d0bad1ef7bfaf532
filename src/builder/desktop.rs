//! Desktop application builder.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::builder::toolchain::{CompileRequest, Toolchain};
use crate::builder::Builder;
use crate::core::error::BuildError;
use crate::core::options::{BuildOptions, Mode};
use crate::core::platform::Platform;
use crate::core::project::{CommandLine, Project};
use crate::util::fs::remove_dir_all_if_exists;
use crate::util::process::{find_executable, ProcessBuilder};
use crate::util::shell::{Shell, Status};

/// Compressor used when `compress` is set.
pub const COMPRESSOR: &str = "upx";

/// Builds desktop applications: frontend commands from the manifest, then
/// the toolchain, then optional compression.
pub struct DesktopBuilder {
    toolchain: Arc<dyn Toolchain>,
    project: Option<Arc<Project>>,
    intermediates: Vec<PathBuf>,
}

impl DesktopBuilder {
    pub fn new(toolchain: Arc<dyn Toolchain>) -> Self {
        DesktopBuilder {
            toolchain,
            project: None,
            intermediates: Vec::new(),
        }
    }

    fn project(&self) -> Result<Arc<Project>> {
        self.project
            .clone()
            .context("builder has no project data; call set_project_data first")
    }

    /// Compiler tags for `opts`: user tags, then the builder and mode tags.
    pub fn compile_tags(opts: &BuildOptions) -> Vec<String> {
        let mut tags = opts.effective_tags();
        let mode_tag = match opts.mode {
            Mode::Production => "production",
            Mode::Dev => "dev",
            Mode::Debug => "debug",
        };
        for tag in ["desktop", mode_tag] {
            if !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        }
        tags
    }

    /// Linker flags for `opts`.
    pub fn linker_flags(opts: &BuildOptions) -> String {
        let mut flags: Vec<&str> = opts.ldflags.split_whitespace().collect();
        if opts.mode == Mode::Production {
            flags.extend(["-w", "-s"]);
            if opts.platform == Platform::Windows && !opts.windows_console {
                flags.extend(["-H", "windowsgui"]);
            }
        }
        flags.join(" ")
    }

    fn run_frontend_command(
        &self,
        label: &str,
        command: &CommandLine,
        dir: &Path,
        opts: &BuildOptions,
        shell: &Shell,
    ) -> Result<()> {
        let args = command.to_args();
        let Some(cmd) = ProcessBuilder::from_argv(&args) else {
            return Ok(());
        };
        let display = cmd.display_command();

        let spinner = shell.spinner(Status::Building, label);
        let result = cmd.cwd(dir).timeout(opts.process_timeout).exec_and_check();
        spinner.finish();

        let output = result.map_err(|e| BuildError::tool(format!("frontend command `{}`", display), e))?;
        shell.verbose_output(&output.stdout);
        Ok(())
    }

    fn compress(&self, binary: &Path, opts: &BuildOptions, shell: &Shell) -> Result<()> {
        let Some(compressor) = find_executable(COMPRESSOR) else {
            bail!("`{}` not found in PATH; install it or build without compression", COMPRESSOR);
        };
        let cmd = ProcessBuilder::new(compressor)
            .args(opts.compress_flags.split_whitespace())
            .arg(binary)
            .timeout(opts.process_timeout);

        let spinner = shell.spinner(Status::Compiling, format!("compressing {}", binary.display()));
        let result = cmd.exec_and_check();
        spinner.finish();

        let output = result.map_err(|e| BuildError::tool(COMPRESSOR, e))?;
        shell.verbose_output(&output.stdout);
        Ok(())
    }
}

impl Builder for DesktopBuilder {
    fn set_project_data(&mut self, project: Arc<Project>) {
        self.project = Some(project);
    }

    fn output_filename(&self, opts: &BuildOptions) -> String {
        let mut name = match &opts.output_file {
            Some(file) => file.clone(),
            None => {
                let project = self.project.as_ref().unwrap_or(&opts.project);
                let mut name = project.output_name().to_string();
                if opts.mode == Mode::Dev {
                    name.push_str("-dev");
                }
                name
            }
        };

        if opts.platform == Platform::Windows && !name.to_lowercase().ends_with(".exe") {
            name.push_str(".exe");
        }
        name
    }

    fn build_frontend(&mut self, opts: &BuildOptions, shell: &Shell) -> Result<()> {
        let project = self.project()?;
        let frontend = &project.frontend;

        let build = match opts.mode {
            Mode::Dev => frontend.dev_build.as_ref().or(frontend.build.as_ref()),
            _ => frontend.build.as_ref(),
        };
        let install = frontend.install.as_ref();

        if install.is_none() && build.is_none() {
            shell.status(Status::Skipped, "frontend build (no frontend commands configured)");
            return Ok(());
        }

        let dir = project.frontend_dir();
        if !dir.is_dir() {
            bail!("frontend directory not found: {}", dir.display());
        }

        if let Some(install) = install {
            self.run_frontend_command("frontend dependencies", install, &dir, opts, shell)?;
        }
        if let Some(build) = build {
            self.run_frontend_command("frontend", build, &dir, opts, shell)?;
        }

        Ok(())
    }

    fn compile_project(&mut self, opts: &mut BuildOptions, shell: &Shell) -> Result<PathBuf> {
        let project = self.project()?;

        if opts.clean_bin_directory {
            remove_dir_all_if_exists(&opts.bin_directory)?;
        }
        fs::create_dir_all(&opts.bin_directory)
            .map_err(|e| BuildError::io("create directory", &opts.bin_directory, e))?;

        let output = opts.bin_directory.join(self.output_filename(opts));
        let request = CompileRequest {
            project_root: project.path.clone(),
            platform: opts.platform,
            arch: opts.arch,
            output: output.clone(),
            tags: Self::compile_tags(opts),
            ldflags: Self::linker_flags(opts),
            trim_path: opts.trim_path,
            race_detector: opts.race_detector,
            force_build: opts.force_build,
            timeout: opts.process_timeout,
        };

        tracing::debug!(
            "compiling {} for {} with {}",
            output.display(),
            opts.target_key(),
            self.toolchain.name()
        );
        let spinner = shell.spinner(
            Status::Compiling,
            format!("{} ({})", project.name, opts.target_key()),
        );
        let result = self.toolchain.compile(&request);
        spinner.finish();
        result?;

        if opts.compress {
            self.compress(&output, opts, shell)?;
        }

        opts.compiled_binary = Some(output.clone());
        Ok(output)
    }

    fn track_intermediate(&mut self, path: PathBuf) {
        if !self.intermediates.contains(&path) {
            self.intermediates.push(path);
        }
    }

    fn release_intermediate(&mut self, path: &Path) {
        self.intermediates.retain(|p| p != path);
    }

    fn clean_up(&mut self) -> Result<()> {
        let mut first_error = None;
        for path in self.intermediates.drain(..) {
            match fs::remove_file(&path) {
                Ok(()) => tracing::debug!("removed intermediate {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => {
                    tracing::warn!("failed to remove {}: {}", path.display(), source);
                    first_error.get_or_insert(BuildError::Cleanup { path, source });
                }
            }
        }

        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}
