//! Core data types for Keel.

pub mod error;
pub mod options;
pub mod platform;
pub mod project;

pub use error::{BuildError, HookPhase};
pub use options::{BuildOptions, Mode, OutputType};
pub use platform::{Arch, Platform};
pub use project::{CommandLine, Project};
