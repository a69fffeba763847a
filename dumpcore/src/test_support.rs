//! Test-only fakes for pipeline collaborators.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::core::pattern::resolve_core_path;
use crate::core::pid::parse_pid;
use crate::core::types::SpawnOutcome;
use crate::error::DumpCoreError;
use crate::io::launcher::{CrashLauncher, Launched};
use crate::io::progress::ProgressReporter;
use crate::io::relocate::{FsRelocator, Relocator};

/// Shared, ordered log of collaborator calls.
#[derive(Debug, Clone, Default)]
pub struct Events(Arc<Mutex<Vec<String>>>);

impl Events {
    pub fn push(&self, event: impl Into<String>) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.into());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Progress reporter that records `progress:start` / `progress:stop`.
pub struct RecordingProgress {
    events: Events,
}

impl RecordingProgress {
    pub fn new(events: &Events) -> Self {
        Self {
            events: events.clone(),
        }
    }
}

impl ProgressReporter for RecordingProgress {
    type Handle = String;

    fn start(&self, text: &str, delay: Duration) -> String {
        self.events
            .push(format!("progress:start:{}ms:{text}", delay.as_millis()));
        text.to_string()
    }

    fn stop(&self, _handle: String) {
        self.events.push("progress:stop");
    }
}

/// Launcher returning a fixed outcome without spawning anything.
#[derive(Debug, Clone)]
pub struct ScriptedLauncher {
    outcome: SpawnOutcome,
    core_pattern: Option<String>,
    events: Option<Events>,
}

impl ScriptedLauncher {
    /// Child that aborted (exit 134) after printing `stdout`.
    pub fn crashed(stdout: &str) -> Self {
        Self::exited(stdout, Some(134))
    }

    /// Child that exited with `exit_code` after printing `stdout`.
    pub fn exited(stdout: &str, exit_code: Option<i32>) -> Self {
        Self {
            outcome: SpawnOutcome {
                captured_pid_text: stdout.to_string(),
                exit_code,
            },
            core_pattern: None,
            events: None,
        }
    }

    /// Also write a fake core file where `pattern` predicts the OS would.
    pub fn writing_core(mut self, pattern: &str) -> Self {
        self.core_pattern = Some(pattern.to_string());
        self
    }

    pub fn recording(mut self, events: &Events) -> Self {
        self.events = Some(events.clone());
        self
    }
}

impl CrashLauncher for ScriptedLauncher {
    fn launch(&self, _script: Option<&Path>) -> Result<Launched, DumpCoreError> {
        if let Some(events) = &self.events {
            events.push("launch");
        }
        if let (Some(pattern), Some(pid)) = (
            &self.core_pattern,
            parse_pid(&self.outcome.captured_pid_text),
        ) {
            let path = resolve_core_path(pattern, pid)?;
            write_core_file(&path).map_err(|err| DumpCoreError::Spawn {
                command: "scripted".to_string(),
                source: err.into(),
            })?;
        }
        Ok(Launched {
            command: "scripted".to_string(),
            outcome: self.outcome.clone(),
        })
    }
}

/// Relocator that records `relocate` and then moves the file for real.
pub struct RecordingRelocator {
    events: Events,
}

impl RecordingRelocator {
    pub fn new(events: &Events) -> Self {
        Self {
            events: events.clone(),
        }
    }
}

impl Relocator for RecordingRelocator {
    fn relocate(&self, core_path: &Path, dest_directory: &Path) -> Result<PathBuf, DumpCoreError> {
        self.events.push("relocate");
        FsRelocator.relocate(core_path, dest_directory)
    }
}

/// Write a small stand-in core file, creating parent directories.
pub fn write_core_file(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, b"core").with_context(|| format!("write {}", path.display()))
}

/// Write an executable `/bin/sh` script standing in for the runtime.
pub fn write_fake_runtime(dir: &Path, body: &str) -> Result<PathBuf> {
    let path = dir.join("fake-node");
    fs::write(&path, format!("#!/bin/sh\n{body}\n"))
        .with_context(|| format!("write {}", path.display()))?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("chmod {}", path.display()))?;
    Ok(path)
}
