//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Keel - A build orchestrator for native desktop applications
#[derive(Parser)]
#[command(name = "keel")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags accepted by every command.
#[derive(Args)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Print nothing but errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the application in the current project
    Build(BuildArgs),

    /// Write a starter keel.toml
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Output type to build (desktop, dev)
    #[arg(long, default_value = "desktop")]
    pub output_type: String,

    /// Build mode (production, dev, debug)
    #[arg(short, long, default_value = "production")]
    pub mode: String,

    /// Target as <platform>/<arch>, e.g. darwin/universal (defaults to the host)
    #[arg(long)]
    pub platform: Option<String>,

    /// Compiler command (overrides config)
    #[arg(long)]
    pub compiler: Option<String>,

    /// Extra linker flags
    #[arg(long, allow_hyphen_values = true)]
    pub ldflags: Option<String>,

    /// Build tags, comma or space separated
    #[arg(long)]
    pub tags: Option<String>,

    /// Package the application after compiling
    #[arg(short = 'p', long)]
    pub pack: bool,

    /// Compress the binary with upx
    #[arg(long)]
    pub upx: bool,

    /// Flags passed to upx
    #[arg(long, allow_hyphen_values = true)]
    pub upx_flags: Option<String>,

    /// Output filename
    #[arg(short, long)]
    pub output: Option<String>,

    /// Empty the bin directory before compiling
    #[arg(long)]
    pub clean: bool,

    /// Skip the frontend build
    #[arg(short = 's', long)]
    pub skip_frontend: bool,

    /// Skip bindings generation
    #[arg(long)]
    pub skip_bindings: bool,

    /// Skip compiling the application
    #[arg(long)]
    pub skip_application: bool,

    /// Skip tidying dependency metadata during bindings generation
    #[arg(long)]
    pub skip_mod_tidy: bool,

    /// Obfuscate the application with garble
    #[arg(long)]
    pub obfuscated: bool,

    /// Arguments passed to garble
    #[arg(long, default_value = "-literals -tiny -seed=random", allow_hyphen_values = true)]
    pub garble_args: String,

    /// Remove local file system paths from the binary
    #[arg(long)]
    pub trimpath: bool,

    /// Build with the race detector
    #[arg(long)]
    pub race: bool,

    /// Force a rebuild of all packages
    #[arg(long)]
    pub force: bool,

    /// Keep the console window for Windows production builds
    #[arg(long)]
    pub windows_console: bool,

    /// Name of the macOS application bundle
    #[arg(long)]
    pub bundle_name: Option<String>,

    /// Limit for each external process in seconds, 0 for no limit
    #[arg(long)]
    pub timeout: Option<u64>,
}

#[derive(Args)]
pub struct InitArgs {
    /// Project name (defaults to directory name)
    #[arg(long)]
    pub name: Option<String>,

    /// Frontend directory, relative to the project root
    #[arg(long, default_value = "frontend")]
    pub frontend_dir: String,

    /// Directory to initialize (defaults to current directory)
    pub path: Option<PathBuf>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
