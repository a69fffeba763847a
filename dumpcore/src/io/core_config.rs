//! Where the OS core-file naming pattern comes from.
//!
//! The pipeline only needs a pattern string; it does not care how it was found.
//! Sources are injected into the dumper, never reached through global state.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::core::types::CoreFilesConfig;
use crate::error::DumpCoreError;
use crate::io::process::run_command;

/// Darwin's sysctl key for the core file pattern.
pub const DEFAULT_SYSCTL_KEY: &str = "kern.corefile";

const SYSCTL_TIMEOUT: Duration = Duration::from_secs(10);
const SYSCTL_OUTPUT_LIMIT_BYTES: usize = 4096;

/// Lookup of the OS core naming configuration.
///
/// `Ok(None)` means the lookup worked but found nothing usable.
pub trait CoreFilesConfigSource {
    fn core_files_config(&self) -> Result<Option<CoreFilesConfig>>;
}

impl<F> CoreFilesConfigSource for F
where
    F: Fn() -> Result<Option<CoreFilesConfig>>,
{
    fn core_files_config(&self) -> Result<Option<CoreFilesConfig>> {
        self()
    }
}

/// Configured pattern source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum CorePatternSource {
    /// Ask `sysctl -n <key>`.
    Sysctl {
        #[serde(default = "default_sysctl_key")]
        key: String,
    },
    /// Use a fixed pattern.
    Static { pattern: String },
}

fn default_sysctl_key() -> String {
    DEFAULT_SYSCTL_KEY.to_string()
}

impl Default for CorePatternSource {
    fn default() -> Self {
        CorePatternSource::Sysctl {
            key: default_sysctl_key(),
        }
    }
}

impl CorePatternSource {
    pub fn validate(&self) -> Result<()> {
        match self {
            CorePatternSource::Sysctl { key } if key.trim().is_empty() => {
                Err(anyhow!("core_pattern.key must be non-empty"))
            }
            CorePatternSource::Static { pattern } if pattern.trim().is_empty() => {
                Err(anyhow!("core_pattern.pattern must be non-empty"))
            }
            _ => Ok(()),
        }
    }
}

impl CoreFilesConfigSource for CorePatternSource {
    fn core_files_config(&self) -> Result<Option<CoreFilesConfig>> {
        match self {
            CorePatternSource::Sysctl { key } => read_sysctl_pattern(key),
            CorePatternSource::Static { pattern } => Ok(Some(CoreFilesConfig {
                global_pattern: pattern.clone(),
            })),
        }
    }
}

#[instrument]
fn read_sysctl_pattern(key: &str) -> Result<Option<CoreFilesConfig>> {
    let mut cmd = Command::new("sysctl");
    cmd.arg("-n").arg(key);
    let output = run_command(cmd, None, Some(SYSCTL_TIMEOUT), SYSCTL_OUTPUT_LIMIT_BYTES)
        .with_context(|| format!("run sysctl -n {key}"))?;
    if output.timed_out {
        bail!("sysctl -n {key} timed out");
    }
    if !output.status.success() {
        bail!(
            "sysctl -n {key} failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    let pattern = String::from_utf8_lossy(&output.stdout()).trim().to_string();
    debug!(%pattern, "read core pattern");
    if pattern.is_empty() {
        return Ok(None);
    }
    Ok(Some(CoreFilesConfig {
        global_pattern: pattern,
    }))
}

/// Ask `source` for the pattern, turning every failure mode into [`DumpCoreError::Config`].
pub fn resolve_core_files_config<S: CoreFilesConfigSource + ?Sized>(
    source: &S,
) -> Result<CoreFilesConfig, DumpCoreError> {
    match source.core_files_config() {
        Ok(Some(config)) if !config.global_pattern.trim().is_empty() => Ok(config),
        Ok(Some(_)) => Err(DumpCoreError::Config {
            reason: "core files pattern is empty".to_string(),
        }),
        Ok(None) => Err(DumpCoreError::Config {
            reason: "no core files configuration".to_string(),
        }),
        Err(err) => Err(DumpCoreError::Config {
            reason: format!("{err:#}"),
        }),
    }
}
