//! Launching the deliberately crashing child.
//!
//! The [`CrashLauncher`] trait decouples the pipeline from real process
//! execution. Tests use scripted launchers that return predetermined outcomes
//! without spawning anything.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::core::pid::{select_pid_text, validate_outcome};
use crate::core::types::{PidCapture, SpawnOutcome};
use crate::error::DumpCoreError;
use crate::io::process::run_command;

/// Runtime flag that turns an uncaught exception into an abort.
pub const ABORT_FLAG: &str = "--abort-on-uncaught-exception";
/// Expression run when no script is given: print the pid, then fault.
pub const DEFAULT_CRASH_EXPRESSION: &str = "console.log(process.pid); undef();";

/// Fixed shell text. The runtime arrives as `$0` and its arguments as `$@`,
/// so no caller-supplied value is ever parsed by the shell.
const SHELL_SCRIPT: &str = "ulimit -c unlimited; \"$0\" --abort-on-uncaught-exception \"$@\"";

/// Fully described crash invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashCommand {
    pub shell: PathBuf,
    pub runtime: String,
    pub script: Option<PathBuf>,
}

impl CrashCommand {
    pub fn new(shell: impl Into<PathBuf>, runtime: impl Into<String>, script: Option<&Path>) -> Self {
        Self {
            shell: shell.into(),
            runtime: runtime.into(),
            script: script.map(Path::to_path_buf),
        }
    }

    /// Arguments handed to the runtime after the abort flag.
    pub fn runtime_args(&self) -> Vec<OsString> {
        match &self.script {
            Some(script) => vec![script.clone().into_os_string()],
            None => vec!["-e".into(), DEFAULT_CRASH_EXPRESSION.into()],
        }
    }

    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(SHELL_SCRIPT)
            .arg(&self.runtime)
            .args(self.runtime_args());
        cmd
    }

    /// Human-readable shell line, in the form core-pattern tooling expects.
    pub fn display_line(&self) -> String {
        let target = match &self.script {
            Some(script) => script.display().to_string(),
            None => format!("-e '{DEFAULT_CRASH_EXPRESSION}'"),
        };
        format!(
            "{} -c \"ulimit -c unlimited; {} {ABORT_FLAG} {target}\"",
            self.shell.display(),
            self.runtime
        )
    }
}

/// A finished crash attempt, not yet validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launched {
    /// Command line used, for diagnostics.
    pub command: String,
    pub outcome: SpawnOutcome,
}

/// Abstraction over how the crashing child is produced.
pub trait CrashLauncher {
    /// Run one crashing child to completion. `script` of `None` means the default expression.
    fn launch(&self, script: Option<&Path>) -> Result<Launched, DumpCoreError>;
}

/// Launcher that runs the runtime under a POSIX shell with unlimited core size.
#[derive(Debug, Clone)]
pub struct ShellCrashLauncher {
    pub shell: PathBuf,
    pub runtime: String,
    pub pid_capture: PidCapture,
    pub timeout: Option<Duration>,
    pub output_limit_bytes: usize,
}

impl Default for ShellCrashLauncher {
    fn default() -> Self {
        Self {
            shell: PathBuf::from("/bin/bash"),
            runtime: "node".to_string(),
            pid_capture: PidCapture::default(),
            timeout: None,
            output_limit_bytes: 100_000,
        }
    }
}

impl CrashLauncher for ShellCrashLauncher {
    #[instrument(skip_all, fields(runtime = %self.runtime, pid_capture = ?self.pid_capture))]
    fn launch(&self, script: Option<&Path>) -> Result<Launched, DumpCoreError> {
        let crash = CrashCommand::new(&self.shell, &self.runtime, script);
        let command = crash.display_line();
        info!(%command, "launching crashing process");

        let output = run_command(crash.to_command(), None, self.timeout, self.output_limit_bytes)
            .map_err(|err| DumpCoreError::Spawn {
                command: command.clone(),
                source: err.into(),
            })?;

        for chunk in &output.stdout_chunks {
            debug!(stdout = %String::from_utf8_lossy(chunk), "child stdout");
        }
        if !output.stderr.is_empty() {
            debug!(stderr = %String::from_utf8_lossy(&output.stderr), "child stderr");
        }

        if output.timed_out {
            warn!(%command, "crashing process timed out");
            return Err(DumpCoreError::Timeout {
                command,
                timeout: self.timeout.unwrap_or_default(),
            });
        }

        debug!(exit_code = ?output.exit_code(), signal = ?output.signal(), "crashing process exited");
        Ok(Launched {
            command,
            outcome: SpawnOutcome {
                captured_pid_text: select_pid_text(
                    &output.stdout_chunks,
                    output.stdout_last_read.as_deref(),
                    self.pid_capture,
                ),
                exit_code: output.exit_code(),
            },
        })
    }
}

/// Launch the crashing child and validate that it aborted with a usable pid.
pub fn spawn_and_validate<L: CrashLauncher + ?Sized>(
    launcher: &L,
    script: Option<&Path>,
) -> Result<u32, DumpCoreError> {
    let launched = launcher.launch(script)?;
    let pid = validate_outcome(&launched.outcome, &launched.command)?;
    debug!(pid, "captured crashing process id");
    Ok(pid)
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    use crate::test_support::{ScriptedLauncher, write_fake_runtime};

    fn launcher_for(runtime: &Path) -> ShellCrashLauncher {
        ShellCrashLauncher {
            shell: PathBuf::from("/bin/sh"),
            runtime: runtime.display().to_string(),
            ..ShellCrashLauncher::default()
        }
    }

    #[test]
    fn default_target_runs_inline_expression() {
        let crash = CrashCommand::new("/bin/bash", "node", None);
        assert_eq!(
            crash.runtime_args(),
            vec![OsString::from("-e"), OsString::from(DEFAULT_CRASH_EXPRESSION)]
        );
        assert_eq!(
            crash.display_line(),
            "/bin/bash -c \"ulimit -c unlimited; node --abort-on-uncaught-exception -e 'console.log(process.pid); undef();'\""
        );
    }

    #[test]
    fn script_path_is_passed_as_argument_not_shell_text() {
        let script = Path::new("/tmp/evil; rm -rf x.js");
        let crash = CrashCommand::new("/bin/bash", "node", Some(script));
        let cmd = crash.to_command();
        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(args[0], "-c");
        assert_eq!(args[1], SHELL_SCRIPT);
        assert_eq!(args[2], "node");
        assert_eq!(args[3], script.as_os_str());
        assert_eq!(args.len(), 4);
    }

    #[test]
    fn captures_pid_of_crashing_runtime() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runtime = write_fake_runtime(temp.path(), "echo $$; exit 134").expect("runtime");
        let launched = launcher_for(&runtime).launch(None).expect("launch");
        assert_eq!(launched.outcome.exit_code, Some(134));
        let pid = launched.outcome.captured_pid_text.trim().parse::<u32>();
        assert!(pid.is_ok(), "pid text {:?}", launched.outcome.captured_pid_text);
    }

    #[test]
    fn runtime_receives_abort_flag_and_script() {
        let temp = tempfile::tempdir().expect("tempdir");
        let args_file = temp.path().join("args");
        let body = format!(
            "printf '%s|%s' \"$1\" \"$2\" > '{}'; echo $$; exit 1",
            args_file.display()
        );
        let runtime = write_fake_runtime(temp.path(), &body).expect("runtime");
        let script = temp.path().join("crash me.js");
        let launched = launcher_for(&runtime)
            .launch(Some(&script))
            .expect("launch");

        let seen = std::fs::read_to_string(&args_file).expect("read args");
        assert_eq!(seen, format!("{ABORT_FLAG}|{}", script.display()));
        assert!(launched.command.contains("crash me.js"));
        assert_eq!(launched.outcome.exit_code, Some(1));
    }

    #[test]
    fn clean_exit_fails_validation() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runtime = write_fake_runtime(temp.path(), "echo $$; exit 0").expect("runtime");
        let err = spawn_and_validate(&launcher_for(&runtime), None).unwrap_err();
        assert!(matches!(err, DumpCoreError::AbortExpected { .. }));
    }

    #[test]
    fn non_numeric_stdout_fails_validation() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runtime = write_fake_runtime(temp.path(), "echo hello; exit 1").expect("runtime");
        let err = spawn_and_validate(&launcher_for(&runtime), None).unwrap_err();
        match err {
            DumpCoreError::InvalidPid { raw } => assert_eq!(raw, "hello\n"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_shell_is_spawn_error() {
        let launcher = ShellCrashLauncher {
            shell: PathBuf::from("/definitely/not/a/shell"),
            ..ShellCrashLauncher::default()
        };
        let err = launcher.launch(None).unwrap_err();
        assert!(matches!(err, DumpCoreError::Spawn { .. }));
    }

    #[test]
    fn hung_runtime_is_killed_at_the_timeout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runtime =
            write_fake_runtime(temp.path(), "echo $$; sleep 8; exit 134").expect("runtime");
        let launcher = ShellCrashLauncher {
            timeout: Some(Duration::from_millis(300)),
            ..launcher_for(&runtime)
        };

        let started = Instant::now();
        let err = launcher.launch(None).unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, DumpCoreError::Timeout { .. }));
        assert!(elapsed < Duration::from_secs(4), "waited {elapsed:?}");
    }

    #[test]
    fn last_chunk_pid_is_read_past_the_output_limit() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runtime = write_fake_runtime(
            temp.path(),
            "echo some-long-banner-text; sleep 0.2; echo $$; exit 134",
        )
        .expect("runtime");
        let launcher = ShellCrashLauncher {
            output_limit_bytes: 8,
            ..launcher_for(&runtime)
        };

        let pid = spawn_and_validate(&launcher, None).expect("pid");
        assert!(pid > 0);
    }

    #[test]
    fn scripted_launcher_pid_is_validated() {
        let launcher = ScriptedLauncher::crashed("812\n");
        assert_eq!(spawn_and_validate(&launcher, None).expect("pid"), 812);
    }
}
