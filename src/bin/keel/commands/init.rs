//! `keel init` command

use anyhow::{Context, Result};

use crate::cli::{GlobalArgs, InitArgs};
use keel::ops::keel_init::{init_project, InitOptions};
use keel::util::shell::{Status, Verbosity};

pub fn execute(args: InitArgs, global: &GlobalArgs) -> Result<()> {
    let shell = super::shell(global, Verbosity::Normal);

    let path = match args.path {
        Some(path) => path,
        None => std::env::current_dir().context("failed to get current directory")?,
    };

    // Default the name to the directory name
    let name = match args.name {
        Some(name) => name,
        None => path
            .file_name()
            .and_then(|n| n.to_str())
            .context("could not determine project name from directory")?
            .to_string(),
    };

    let manifest = init_project(
        &path,
        &InitOptions {
            name: name.clone(),
            frontend_dir: args.frontend_dir,
        },
    )?;

    shell.status(Status::Created, format!("`{}` ({})", name, manifest.display()));

    Ok(())
}
