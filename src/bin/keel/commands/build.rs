//! `keel build` command

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::cli::{BuildArgs, GlobalArgs};
use keel::core::options::{BuildOptions, Mode, OutputType};
use keel::core::platform::parse_target;
use keel::core::project::Project;
use keel::ops::keel_build::{build, BuildServices};
use keel::util::shell::{Status, Verbosity};
use keel::util::fs::relative_path;
use keel::util::GlobalContext;

pub fn execute(args: BuildArgs, global: &GlobalArgs) -> Result<()> {
    // Unknown output types are rejected before anything else happens
    let output_type: OutputType = args.output_type.parse()?;
    let mode: Mode = args.mode.parse().map_err(|e: String| anyhow!(e))?;
    let target = args
        .platform
        .as_deref()
        .map(parse_target)
        .transpose()
        .map_err(|e| anyhow!(e))?;

    let ctx = GlobalContext::new()?;
    let manifest_path = ctx.find_manifest()?;
    let project = Arc::new(Project::load(&manifest_path)?);

    // Load configuration (global + project)
    let config = ctx.load_config(&project.path);

    let fallback = config
        .build
        .verbosity
        .map(Verbosity::from_level)
        .unwrap_or(Verbosity::Normal);
    let shell = Arc::new(super::shell(global, fallback));

    let mut opts = BuildOptions::new(Arc::clone(&project));
    if let Some((platform, arch)) = target {
        opts = opts.with_target(platform, arch);
    }
    opts.output_type = output_type;
    opts.mode = mode;
    opts.verbosity = shell.verbosity();

    // CLI > config > default
    if let Some(compiler) = args.compiler.or(config.build.compiler.clone()) {
        opts.compiler = compiler;
    }
    opts.ldflags = [config.build.ldflags.clone(), args.ldflags]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    opts.user_tags = config.build.tags.clone();
    if let Some(tags) = &args.tags {
        opts.user_tags.extend(
            tags.split([',', ' '])
                .filter(|t| !t.is_empty())
                .map(str::to_string),
        );
    }
    opts.compress = args.upx;
    opts.compress_flags = args
        .upx_flags
        .or(config.build.compress_flags.clone())
        .unwrap_or_default();
    opts.process_timeout = match args.timeout {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => config.build.process_timeout(),
    };

    opts.pack = args.pack;
    opts.output_file = args.output;
    opts.clean_bin_directory = args.clean;
    opts.skip_frontend = args.skip_frontend;
    opts.skip_bindings = args.skip_bindings;
    opts.skip_application = args.skip_application;
    opts.skip_mod_tidy = args.skip_mod_tidy;
    opts.obfuscated = args.obfuscated;
    opts.obfuscator_args = args.garble_args;
    opts.trim_path = args.trimpath;
    opts.race_detector = args.race;
    opts.force_build = args.force;
    opts.windows_console = args.windows_console;
    opts.bundle_name = args.bundle_name;

    let services = BuildServices::for_options(&opts)?;

    let span = shell.span(
        Status::Building,
        format!("{} ({}, {})", project.name, opts.target_key(), opts.output_type),
    );
    let outcome = build(&opts, &services, &shell)?;

    match &outcome.compiled_binary {
        Some(binary) => {
            span.finish_with_message(relative_path(ctx.cwd(), binary).display().to_string())
        }
        None => span.finish_with_message(format!("{} (compile skipped)", project.name)),
    }

    Ok(())
}
