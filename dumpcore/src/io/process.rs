//! Helpers for running child processes with optional timeouts and bounded output.

use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{Signal, killpg};
#[cfg(unix)]
use nix::unistd::Pid;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    /// Stdout as read from the pipe, one entry per read, up to the output limit.
    pub stdout_chunks: Vec<Vec<u8>>,
    /// Most recent stdout read, kept even when it fell beyond the output limit.
    pub stdout_last_read: Option<Vec<u8>>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn stdout(&self) -> Vec<u8> {
        self.stdout_chunks.concat()
    }

    /// Exit code, or `None` if the child was killed by a signal.
    pub fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }

    /// Signal that terminated the child, if any.
    #[cfg(unix)]
    pub fn signal(&self) -> Option<i32> {
        use std::os::unix::process::ExitStatusExt;
        self.status.signal()
    }

    #[cfg(not(unix))]
    pub fn signal(&self) -> Option<i32> {
        None
    }
}

/// Run a command and capture stdout/stderr without risking pipe deadlocks.
///
/// Output is read concurrently while the child runs. `output_limit_bytes` bounds the amount of
/// stdout/stderr stored in memory (bytes beyond this are discarded while still draining the pipe).
/// With `timeout = None` the call waits for the child indefinitely. With a timeout the child
/// runs in its own process group, and on expiry the whole group is killed so that grandchildren
/// holding the output pipes cannot keep the call waiting.
#[instrument(skip_all, fields(timeout_secs = timeout.map(|t| t.as_secs()), output_limit_bytes))]
pub fn run_command(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    timeout: Option<Duration>,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    if stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    #[cfg(unix)]
    if timeout.is_some() {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    if let Some(input) = stdin {
        let mut child_stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin was not piped"))?;
        child_stdin.write_all(input).context("write stdin")?;
    }

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    let mut timed_out = false;
    let status = match timeout {
        None => child.wait().context("wait for command")?,
        Some(timeout) => match child.wait_timeout(timeout).context("wait for command")? {
            Some(status) => status,
            None => {
                warn!(
                    timeout_secs = timeout.as_secs(),
                    "command timed out, killing"
                );
                timed_out = true;
                kill_tree(&mut child).context("kill command")?;
                child.wait().context("wait command after kill")?
            }
        },
    };

    let stdout = join_output(stdout_handle).context("join stdout")?;
    let stderr = join_output(stderr_handle).context("join stderr")?;
    let (stdout_truncated, stderr_truncated) = (stdout.truncated, stderr.truncated);

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout_chunks: stdout.chunks,
        stdout_last_read: stdout.last_read,
        stderr: stderr.chunks.concat(),
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

#[derive(Debug, Default)]
struct Captured {
    chunks: Vec<Vec<u8>>,
    last_read: Option<Vec<u8>>,
    truncated: usize,
}

/// Kill the child's process group, which `run_command` creates whenever a timeout is set.
#[cfg(unix)]
fn kill_tree(child: &mut Child) -> Result<()> {
    let pgid = i32::try_from(child.id()).context("child pid out of range")?;
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        // ESRCH: the whole group exited between the wait and the kill.
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(err) => Err(err).context("kill process group"),
    }
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) -> Result<()> {
    child.kill().context("kill child")
}

fn join_output(handle: thread::JoinHandle<Result<Captured>>) -> Result<Captured> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<Captured> {
    let mut captured = Captured::default();
    let mut kept = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(kept);
        if remaining > 0 {
            let keep = n.min(remaining);
            captured.chunks.push(chunk[..keep].to_vec());
            kept += keep;
            captured.truncated += n.saturating_sub(keep);
        } else {
            captured.truncated += n;
        }
        captured.last_read = Some(chunk[..n].to_vec());
    }

    Ok(captured)
}
