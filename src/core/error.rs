//! Build error taxonomy.
//!
//! Stage functions return `anyhow::Result`; the errors they raise for
//! configuration, I/O, tool, hook and cleanup failures are `BuildError` values,
//! so callers can `downcast_ref::<BuildError>()` to find out which kind of
//! failure stopped the pipeline.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::util::process::ProcessError;

/// Which hook phase a hook belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    Pre,
    Post,
}

impl HookPhase {
    pub const fn as_str(&self) -> &'static str {
        match self {
            HookPhase::Pre => "pre",
            HookPhase::Post => "post",
        }
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fatal build failure.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("cannot build assets for output type `{0}`")]
    UnknownOutputType(String),

    #[error("failed to {action} `{}`", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{tool} failed: {message}{}", stderr_suffix(stderr))]
    Tool {
        tool: String,
        message: String,
        stderr: String,
    },

    #[error("{phase} build hook '{key}' failed: {message}{}", stderr_suffix(stderr))]
    Hook {
        phase: HookPhase,
        key: String,
        message: String,
        stderr: String,
    },

    #[error("cleanup failed: could not remove `{}`", path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl BuildError {
    /// Wrap an I/O failure on `path`.
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        BuildError::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// Wrap a failed external tool invocation.
    pub fn tool(tool: impl Into<String>, err: ProcessError) -> Self {
        BuildError::Tool {
            tool: tool.into(),
            stderr: err.stderr().to_string(),
            message: err.to_string(),
        }
    }

    /// Wrap a failed hook invocation.
    pub fn hook(phase: HookPhase, key: impl Into<String>, err: ProcessError) -> Self {
        BuildError::Hook {
            phase,
            key: key.into(),
            stderr: err.stderr().to_string(),
            message: err.to_string(),
        }
    }

    /// Captured standard error of the failing process, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            BuildError::Tool { stderr, .. } | BuildError::Hook { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(" - {}", trimmed)
    }
}
