//! Shell-script exercise processor.
//!
//! Runs a learner's submitted script between fixture commands and hands the
//! result to a checking closure. Only the submission body and fixture fragments
//! reach the shell; the submission path never does.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::Duration;

use tracing::{debug, instrument};

use crate::error::ScriptError;
use crate::io::process::run_command;

/// Result of one submission run, passed to the checker.
#[derive(Debug)]
pub struct ScriptRun {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl ScriptRun {
    pub fn success(&self) -> bool {
        self.status.success() && !self.timed_out
    }
}

/// A shell exercise: fixture commands run before and after the submission.
#[derive(Debug, Clone)]
pub struct ShellScriptExercise {
    pub shell: PathBuf,
    pub pre_commands: Vec<String>,
    pub post_commands: Vec<String>,
    pub timeout: Option<Duration>,
    pub output_limit_bytes: usize,
}

impl ShellScriptExercise {
    pub fn new(shell: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
            pre_commands: Vec::new(),
            post_commands: Vec::new(),
            timeout: None,
            output_limit_bytes: 100_000,
        }
    }

    pub fn pre(mut self, commands: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.pre_commands.extend(commands.into_iter().map(Into::into));
        self
    }

    pub fn post(mut self, commands: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.post_commands.extend(commands.into_iter().map(Into::into));
        self
    }

    /// Read `submission` and run it, returning the raw result.
    #[instrument(skip_all, fields(submission = %submission.display()))]
    pub fn run(&self, submission: &Path) -> Result<ScriptRun, ScriptError> {
        let body = fs::read_to_string(submission).map_err(|source| ScriptError::Read {
            path: submission.to_path_buf(),
            source,
        })?;
        let script = compose_script(&self.pre_commands, &body, &self.post_commands);
        debug!(%script, "executing script");

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c").arg(&script);
        let output = run_command(cmd, None, self.timeout, self.output_limit_bytes).map_err(
            |err| ScriptError::Exec {
                path: submission.to_path_buf(),
                source: err.into(),
            },
        )?;

        Ok(ScriptRun {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout()).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            timed_out: output.timed_out,
        })
    }

    /// Run `submission` and forward the result to `check`.
    pub fn process<T>(
        &self,
        submission: &Path,
        check: impl FnOnce(ScriptRun) -> T,
    ) -> Result<T, ScriptError> {
        let run = self.run(submission)?;
        Ok(check(run))
    }
}

/// Join pre-commands, body, and post-commands into one script.
///
/// Commands within a fixture group are `;`-separated. Groups go on their own
/// lines so a trailing comment in the body cannot swallow the post-commands.
pub fn compose_script(pre: &[String], body: &str, post: &[String]) -> String {
    let groups = [pre.join(";"), body.trim_end().to_string(), post.join(";")];
    groups
        .into_iter()
        .filter(|group| !group.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
