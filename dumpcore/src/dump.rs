//! Core-dump pipeline orchestration.
//!
//! Stages run strictly in order and the first failure ends the run:
//!
//! ```text
//! ConfigResolving -> Spawning -> Resolving -> Relocating -> Done
//!        \______________\____________\____________\-------> Failed
//! ```
//!
//! The optional progress notifier is held by a guard for the whole run, so it
//! is stopped on every exit path before the result reaches the caller.

use std::time::Duration;

use tracing::{debug, info, instrument};

use crate::core::pattern::resolve_core_path;
use crate::core::types::{CoreDumpRequest, RelocationResult, Stage};
use crate::error::DumpCoreError;
use crate::io::config::{DEFAULT_PROGRESS_DELAY_MS, DEFAULT_PROGRESS_MESSAGE, DumpConfig};
use crate::io::core_config::{CoreFilesConfigSource, CorePatternSource, resolve_core_files_config};
use crate::io::launcher::{CrashLauncher, ShellCrashLauncher, spawn_and_validate};
use crate::io::progress::{ProgressGuard, ProgressReporter, TerminalProgress};
use crate::io::relocate::{FsRelocator, Relocator};

/// Runs the capture pipeline with injected collaborators.
pub struct CoreDumper<C, L, R, P> {
    config_source: C,
    launcher: L,
    relocator: R,
    progress: P,
    progress_message: String,
    progress_delay: Duration,
}

/// Dumper wired to the real shell, filesystem, and terminal.
pub type SystemCoreDumper =
    CoreDumper<CorePatternSource, ShellCrashLauncher, FsRelocator, TerminalProgress>;

impl SystemCoreDumper {
    pub fn from_config(cfg: &DumpConfig) -> Self {
        CoreDumper::new(
            cfg.core_pattern.clone(),
            cfg.launcher(),
            FsRelocator,
            TerminalProgress::stderr(),
        )
        .with_progress_text(cfg.progress.message.clone(), cfg.progress.delay())
    }
}

impl<C, L, R, P> CoreDumper<C, L, R, P>
where
    C: CoreFilesConfigSource,
    L: CrashLauncher,
    R: Relocator,
    P: ProgressReporter,
{
    pub fn new(config_source: C, launcher: L, relocator: R, progress: P) -> Self {
        Self {
            config_source,
            launcher,
            relocator,
            progress,
            progress_message: DEFAULT_PROGRESS_MESSAGE.to_string(),
            progress_delay: Duration::from_millis(DEFAULT_PROGRESS_DELAY_MS),
        }
    }

    pub fn with_progress_text(mut self, message: impl Into<String>, delay: Duration) -> Self {
        self.progress_message = message.into();
        self.progress_delay = delay;
        self
    }

    /// Produce a core dump and move it into `request.dest_directory`.
    ///
    /// The progress notifier, if requested, has been stopped by the time this returns.
    #[instrument(skip_all, fields(dest = %request.dest_directory.display(), progress = request.progress))]
    pub fn dump_core(&self, request: &CoreDumpRequest) -> Result<RelocationResult, DumpCoreError> {
        let _progress = request.progress.then(|| {
            ProgressGuard::start(&self.progress, &self.progress_message, self.progress_delay)
        });

        let result = self.run_stages(request);
        if let Err(err) = &result {
            debug!(stage = %err.stage(), err = %err, "error when dumping core");
        }
        result
    }

    /// Callback form of [`dump_core`](Self::dump_core). `callback` runs exactly
    /// once, after the progress notifier has been stopped.
    pub fn dump_core_then<T>(
        &self,
        request: &CoreDumpRequest,
        callback: impl FnOnce(Result<RelocationResult, DumpCoreError>) -> T,
    ) -> T {
        let result = self.dump_core(request);
        callback(result)
    }

    fn run_stages(&self, request: &CoreDumpRequest) -> Result<RelocationResult, DumpCoreError> {
        enter(Stage::ConfigResolving);
        let config = resolve_core_files_config(&self.config_source)?;

        enter(Stage::Spawning);
        let pid = spawn_and_validate(&self.launcher, request.script_path.as_deref())?;

        enter(Stage::Resolving);
        let core_path = resolve_core_path(&config.global_pattern, pid)?;

        enter(Stage::Relocating);
        let destination_path = self
            .relocator
            .relocate(&core_path, &request.dest_directory)?;

        info!(pid, destination = %destination_path.display(), "core dump relocated");
        Ok(RelocationResult { destination_path })
    }
}

fn enter(stage: Stage) {
    debug!(%stage, "entering stage");
}
