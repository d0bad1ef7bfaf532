//! High-level operations.
//!
//! This module contains the implementation of Keel commands.

pub mod bindings;
pub mod embed;
pub mod hooks;
pub mod keel_build;
pub mod keel_init;

pub use bindings::{generate_bindings, BindingsGenerator, BindingsRequest, CommandBindingsGenerator};
pub use embed::{create_embed_directories, EmbedDetail, EmbedScanner, SourceEmbedScanner};
pub use hooks::{hook_keys, HookArgs, HookInvocation, HookOutcome, HookRunner};
pub use keel_build::{build, BuildOutcome, BuildServices};
pub use keel_init::{init_project, InitOptions};
