//! Command implementations

pub mod build;
pub mod completions;
pub mod init;

use keel::util::shell::{ColorChoice, Shell, Verbosity};

use crate::cli::GlobalArgs;

/// The shell for a command, `fallback` applying when no flag was given.
pub fn shell(global: &GlobalArgs, fallback: Verbosity) -> Shell {
    let verbosity = if global.verbose {
        Verbosity::Verbose
    } else if global.quiet {
        Verbosity::Quiet
    } else {
        fallback
    };
    let color = if global.no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };
    Shell::new(verbosity, color)
}
