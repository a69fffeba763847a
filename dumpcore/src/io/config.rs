//! Tool configuration, read from a TOML file.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::types::PidCapture;
use crate::io::core_config::CorePatternSource;
use crate::io::launcher::ShellCrashLauncher;

pub const DEFAULT_PROGRESS_MESSAGE: &str = "Please wait while a core dump is being generated";
pub const DEFAULT_PROGRESS_DELAY_MS: u64 = 300;

/// dumpcore configuration (TOML).
///
/// Missing fields fall back to defaults that match a stock Darwin setup
/// running `node`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DumpConfig {
    /// POSIX shell used to raise the core limit and start the runtime.
    pub shell: PathBuf,

    /// Runtime started with `--abort-on-uncaught-exception`.
    pub runtime: String,

    /// Which stdout bytes are read as the crashing process id.
    pub pid_capture: PidCapture,

    /// Kill the crashing child after this many seconds. Unset waits forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spawn_timeout_secs: Option<u64>,

    /// Keep at most this many bytes of child stdout/stderr.
    pub output_limit_bytes: usize,

    pub progress: ProgressConfig,

    pub core_pattern: CorePatternSource,

    pub exercise: ExerciseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProgressConfig {
    pub message: String,
    pub delay_ms: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            message: DEFAULT_PROGRESS_MESSAGE.to_string(),
            delay_ms: DEFAULT_PROGRESS_DELAY_MS,
        }
    }
}

impl ProgressConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Settings for the shell-script exercise processor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExerciseConfig {
    pub shell: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for ExerciseConfig {
    fn default() -> Self {
        Self {
            shell: PathBuf::from("/bin/bash"),
            timeout_secs: None,
        }
    }
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            shell: PathBuf::from("/bin/bash"),
            runtime: "node".to_string(),
            pid_capture: PidCapture::LastChunk,
            spawn_timeout_secs: None,
            output_limit_bytes: 100_000,
            progress: ProgressConfig::default(),
            core_pattern: CorePatternSource::default(),
            exercise: ExerciseConfig::default(),
        }
    }
}

impl DumpConfig {
    pub fn validate(&self) -> Result<()> {
        if self.shell.as_os_str().is_empty() {
            return Err(anyhow!("shell must be non-empty"));
        }
        if self.runtime.trim().is_empty() {
            return Err(anyhow!("runtime must be non-empty"));
        }
        if self.spawn_timeout_secs == Some(0) {
            return Err(anyhow!("spawn_timeout_secs must be > 0 when set"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.exercise.shell.as_os_str().is_empty() {
            return Err(anyhow!("exercise.shell must be non-empty"));
        }
        if self.exercise.timeout_secs == Some(0) {
            return Err(anyhow!("exercise.timeout_secs must be > 0 when set"));
        }
        self.core_pattern.validate()
    }

    /// Crash launcher configured from this file.
    pub fn launcher(&self) -> ShellCrashLauncher {
        ShellCrashLauncher {
            shell: self.shell.clone(),
            runtime: self.runtime.clone(),
            pid_capture: self.pid_capture,
            timeout: self.spawn_timeout_secs.map(Duration::from_secs),
            output_limit_bytes: self.output_limit_bytes,
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `DumpConfig::default()`.
pub fn load_config(path: &Path) -> Result<DumpConfig> {
    if !path.exists() {
        let cfg = DumpConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: DumpConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Write `cfg` to `path` through a hidden temp file in the same directory.
///
/// An existing file is only replaced when `overwrite` is set; returns whether
/// the file was written.
pub fn write_config(path: &Path, cfg: &DumpConfig, overwrite: bool) -> Result<bool> {
    cfg.validate()?;
    if path.exists() && !overwrite {
        debug!(path = %path.display(), "config exists, leaving it untouched");
        return Ok(false);
    }
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    replace_file(path, &buf)?;
    debug!(path = %path.display(), "config written");
    Ok(true)
}

fn replace_file(path: &Path, contents: &str) -> Result<()> {
    let name = path
        .file_name()
        .with_context(|| format!("config path has no file name {}", path.display()))?;
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;

    let mut tmp_name = OsString::from(".");
    tmp_name.push(name);
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    if let Err(err) = fs::rename(&tmp_path, path) {
        if let Err(cleanup) = fs::remove_file(&tmp_path) {
            debug!(err = %cleanup, "temp config not removed");
        }
        return Err(err).with_context(|| format!("replace config {}", path.display()));
    }
    Ok(())
}
