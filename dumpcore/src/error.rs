//! Typed failures of the core-dump pipeline.
//!
//! Every variant maps to exactly one [`Stage`] so callers can tell which step
//! of the pipeline gave up.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::core::types::Stage;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum DumpCoreError {
    /// The config source produced no usable pattern.
    #[error("invalid core files configuration: {reason}")]
    Config { reason: String },

    #[error("failed to run crashing process `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: BoxError,
    },

    #[error("crashing process `{command}` did not exit within {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("child was expected to abort but exited successfully (`{command}`)")]
    AbortExpected { command: String },

    #[error("captured process id {raw:?} is not valid")]
    InvalidPid { raw: String },

    #[error("core files pattern is empty")]
    EmptyPattern,

    #[error("failed to move core file from {} to {}", from.display(), to.display())]
    Relocation {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DumpCoreError {
    /// Stage that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            DumpCoreError::Config { .. } => Stage::ConfigResolving,
            DumpCoreError::Spawn { .. }
            | DumpCoreError::Timeout { .. }
            | DumpCoreError::AbortExpected { .. }
            | DumpCoreError::InvalidPid { .. } => Stage::Spawning,
            DumpCoreError::EmptyPattern => Stage::Resolving,
            DumpCoreError::Relocation { .. } => Stage::Relocating,
        }
    }
}

/// Failures of the shell-script exercise processor.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to read submission {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to execute submission {}", path.display())]
    Exec {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
}
