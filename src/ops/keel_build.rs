//! Implementation of `keel build`.
//!
//! The pipeline runs, in order: pre-build hooks, embed directory
//! provisioning, bindings generation, the frontend build, compilation
//! (fusing a universal binary when asked) with packaging, and post-build
//! hooks. Each stage can be switched off through [`BuildOptions`]; the first
//! failing stage stops the build.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use crate::builder::fusion::{BinaryFuser, LipoFuser, UniversalPlan};
use crate::builder::package::{HostPackager, Packager};
use crate::builder::resources::{generate_windows_resources, ResourceCompiler, Windres};
use crate::builder::toolchain::{GoToolchain, Toolchain};
use crate::builder::{Builder, BuilderGuard, BuilderRegistry};
use crate::core::error::{BuildError, HookPhase};
use crate::core::options::BuildOptions;
use crate::core::platform::{host_platform_name, Arch, Platform};
use crate::ops::bindings::{generate_bindings, BindingsGenerator, CommandBindingsGenerator};
use crate::ops::embed::{create_embed_directories, EmbedScanner, SourceEmbedScanner};
use crate::ops::hooks::{hook_keys, HookArgs, HookRunner};
use crate::util::fs::remove_dir_all_if_exists;
use crate::util::shell::{Shell, Status};

/// Build tag that opts Windows builds into the experimental native
/// WebView2 loader.
pub const EXPERIMENTAL_WEBVIEW_LOADER_TAG: &str = "exp_webview2loader";

/// External collaborators of a build.
pub struct BuildServices {
    pub registry: BuilderRegistry,
    pub toolchain: Arc<dyn Toolchain>,
    pub fuser: Box<dyn BinaryFuser>,
    pub bindings: Box<dyn BindingsGenerator>,
    pub packager: Box<dyn Packager>,
    pub scanner: Box<dyn EmbedScanner>,
    pub resources: Box<dyn ResourceCompiler>,
    /// Operating system the build runs on
    pub host: String,
}

impl BuildServices {
    /// The real tools for `opts`.
    pub fn for_options(opts: &BuildOptions) -> Result<Self> {
        let toolchain: Arc<dyn Toolchain> = if opts.obfuscated {
            Arc::new(GoToolchain::obfuscated(&opts.obfuscator_args))
        } else {
            Arc::new(GoToolchain::new(&opts.compiler))
        };

        Ok(BuildServices {
            registry: BuilderRegistry::new(),
            toolchain,
            fuser: Box::new(LipoFuser::new()),
            bindings: Box::new(CommandBindingsGenerator::new(
                opts.project.bindings.command.clone(),
            )),
            packager: Box::new(HostPackager),
            scanner: Box::new(SourceEmbedScanner::for_project(&opts.project)?),
            resources: Box::new(Windres::new()),
            host: host_platform_name().to_string(),
        })
    }
}

/// Result of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    /// The final binary, `None` when compilation was skipped
    pub compiled_binary: Option<PathBuf>,
    pub bin_directory: PathBuf,
}

/// Run the build pipeline.
///
/// `options` is copied; the caller's value is left untouched.
pub fn build(options: &BuildOptions, services: &BuildServices, shell: &Shell) -> Result<BuildOutcome> {
    let mut opts = options.clone();
    let project = Arc::clone(&opts.project);
    let bin_directory = project.bin_dir();
    opts.bin_directory = bin_directory.clone();

    tracing::debug!(
        "building {} ({}) for {} in {}",
        project.name,
        opts.output_type,
        opts.target_key(),
        project.path.display()
    );

    let builder = services
        .registry
        .create(opts.output_type, Arc::clone(&services.toolchain))?;
    let mut builder = BuilderGuard::new(builder);
    builder.set_project_data(Arc::clone(&project));

    // Keys and the platform value are fixed before a universal build
    // rewrites `opts.arch`.
    let keys = hook_keys(opts.platform, opts.arch);
    let target = opts.target_key();
    let hooks = HookRunner::new(&project, &services.host, &bin_directory, shell);
    let verbose = opts.is_verbose();

    hooks.run_phase(
        HookPhase::Pre,
        &keys,
        &HookArgs::pre_build(&target),
        verbose,
        opts.process_timeout,
    )?;

    for dir in create_embed_directories(services.scanner.as_ref(), &project.path)? {
        shell.status(Status::Created, format!("embed directory {}", dir.display()));
    }

    if opts.skip_bindings {
        tracing::debug!("skipping bindings generation");
    } else {
        generate_bindings(services.bindings.as_ref(), &opts, shell)?;
    }

    if opts.skip_frontend {
        tracing::debug!("skipping frontend build");
    } else {
        builder.build_frontend(&opts, shell)?;
    }

    let compiled_binary = if opts.skip_application {
        shell.status(Status::Skipped, "application compile");
        None
    } else {
        Some(compile_application(&mut *builder, &mut opts, services, shell)?)
    };

    hooks.run_phase(
        HookPhase::Post,
        &keys,
        &HookArgs::post_build(&target, compiled_binary.as_deref()),
        verbose,
        opts.process_timeout,
    )?;

    builder.release()?;

    Ok(BuildOutcome {
        compiled_binary,
        bin_directory,
    })
}

/// Compile the application and package it.
///
/// Windows resources are generated first when packaging for Windows and
/// removed again afterwards. A compile error takes precedence over a failure
/// to remove them.
pub fn compile_application(
    builder: &mut dyn Builder,
    opts: &mut BuildOptions,
    services: &BuildServices,
    shell: &Shell,
) -> Result<PathBuf> {
    let resources = if opts.pack && opts.platform == Platform::Windows {
        shell.status(Status::Generating, "bundle assets");
        Some(generate_windows_resources(
            &opts.project,
            services.resources.as_ref(),
            opts.arch,
            opts.process_timeout,
        )?)
    } else {
        None
    };

    let compiled = if opts.is_universal() {
        compile_universal(builder, opts, services, shell)
    } else {
        builder.compile_project(opts, shell)
    };

    if let Some(resources) = resources {
        match (&compiled, resources.remove()) {
            (Ok(_), Err(e)) => return Err(e.into()),
            (Err(_), Err(e)) => tracing::warn!("{}", e),
            _ => {}
        }
    }
    let compiled = compiled?;

    if opts.pack && opts.platform != Platform::Windows {
        shell.status(Status::Packaging, opts.project.product_name());
        services.packager.package(opts, &services.host)?;
    }

    if opts.platform == Platform::Windows {
        shell.note(webview_loader_note(&opts.user_tags));
    }

    Ok(compiled)
}

/// Compile both slices of a universal binary and fuse them.
///
/// The slices are registered with the builder before they are compiled, so
/// they are removed by `clean_up` if anything below fails.
pub fn compile_universal(
    builder: &mut dyn Builder,
    opts: &mut BuildOptions,
    services: &BuildServices,
    shell: &Shell,
) -> Result<PathBuf> {
    if opts.clean_bin_directory {
        remove_dir_all_if_exists(&opts.bin_directory)?;
        opts.clean_bin_directory = false;
    }

    let plan = UniversalPlan::new(builder.output_filename(opts));

    for slice in &plan.slices {
        let path = opts.bin_directory.join(&slice.filename);
        opts.arch = slice.arch;
        opts.output_file = Some(slice.filename.clone());

        builder.track_intermediate(path.clone());
        tracing::debug!("building {} target: {}", slice.arch, path.display());
        builder.compile_project(opts, shell)?;
    }

    shell.status(
        Status::Fusing,
        format!("{} ({})", plan.base, plan.slice_filenames().join(", ")),
    );
    services.fuser.fuse(
        &opts.bin_directory,
        &plan.base,
        &plan.slice_filenames(),
        opts.process_timeout,
    )?;

    for slice in &plan.slices {
        let path = opts.bin_directory.join(&slice.filename);
        fs::remove_file(&path).map_err(|source| BuildError::Cleanup {
            path: path.clone(),
            source,
        })?;
        builder.release_intermediate(&path);
    }

    let output = opts.bin_directory.join(&plan.base);
    opts.arch = Arch::Universal;
    opts.output_file = Some(plan.base);
    opts.compiled_binary = Some(output.clone());
    Ok(output)
}

fn webview_loader_note(user_tags: &[String]) -> String {
    if user_tags.iter().any(|t| t == EXPERIMENTAL_WEBVIEW_LOADER_TAG) {
        return "thanks for testing the experimental native WebView2 loader; please report any \
                feedback or bugs you think are related to it"
            .to_string();
    }

    let mut tags = user_tags.to_vec();
    tags.push(EXPERIMENTAL_WEBVIEW_LOADER_TAG.to_string());
    format!(
        "an experimental native WebView2 loader is available; try it by building with `-tags {}`",
        tags.join(",")
    )
}
