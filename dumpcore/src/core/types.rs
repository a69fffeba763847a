//! Shared deterministic types for the core-dump pipeline.
//!
//! These types define the contracts between pipeline stages. They carry no
//! I/O handles and are created fresh for every invocation.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Process name substituted for `%f`. Fixed by convention, never discovered.
pub const CRASHING_PROCESS_NAME: &str = "node";

/// OS core-file naming configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreFilesConfig {
    /// Kernel pattern, e.g. `/cores/core.%P`.
    pub global_pattern: String,
}

/// One request to produce and relocate a core dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreDumpRequest {
    /// Script to run under the runtime. `None` runs the default crash expression.
    pub script_path: Option<PathBuf>,
    /// Directory the core file is moved into.
    pub dest_directory: PathBuf,
    /// Show the "please wait" notifier while the pipeline runs.
    pub progress: bool,
}

impl CoreDumpRequest {
    pub fn new(dest_directory: impl Into<PathBuf>) -> Self {
        Self {
            script_path: None,
            dest_directory: dest_directory.into(),
            progress: false,
        }
    }

    pub fn with_script(mut self, script_path: impl Into<PathBuf>) -> Self {
        self.script_path = Some(script_path.into());
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }
}

/// Raw result of running the crashing child, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnOutcome {
    /// Stdout text selected as the pid candidate.
    pub captured_pid_text: String,
    /// Exit code; `None` when the child was terminated by a signal.
    pub exit_code: Option<i32>,
}

/// Final location of the relocated core file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelocationResult {
    pub destination_path: PathBuf,
}

/// How the pid is picked out of the child's stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PidCapture {
    /// Only the most recent stdout chunk read before exit.
    #[default]
    LastChunk,
    /// First whitespace-delimited decimal integer across all stdout.
    FirstInteger,
}

/// Pipeline stage, used for logging and to attribute failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ConfigResolving,
    Spawning,
    Resolving,
    Relocating,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::ConfigResolving => "config_resolving",
            Stage::Spawning => "spawning",
            Stage::Resolving => "resolving",
            Stage::Relocating => "relocating",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
