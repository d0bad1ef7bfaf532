//! Keel - A build orchestrator for native desktop applications
//!
//! This crate provides the core library functionality for Keel: the build
//! pipeline, its hooks, embed directory provisioning, bindings generation,
//! platform compilation with universal binary fusion, and packaging.

pub mod builder;
pub mod core;
pub mod ops;
pub mod util;

/// Test utilities and fakes for Keel unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides recording implementations of the external
/// tools the pipeline drives.
#[cfg(test)]
pub mod test_support;

pub use crate::core::{BuildError, BuildOptions, Project};
pub use ops::{build, BuildOutcome, BuildServices};
pub use util::context::GlobalContext;
