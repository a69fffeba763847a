//! Pid capture and exit validation for the crashing child.
//!
//! The child reports its own pid on stdout. Which bytes count as "the pid" is
//! controlled by [`PidCapture`]; `LastChunk` keeps only the most recent read
//! chunk, so a child that writes more after its pid loses it. The most recent
//! read is tracked apart from the size-capped stdout, so the cap never changes
//! which chunk `LastChunk` sees.

use crate::core::types::{PidCapture, SpawnOutcome};
use crate::error::DumpCoreError;

/// Pick the pid candidate text.
///
/// `kept` is the stored stdout in read order (possibly capped); `last_read` is
/// the most recent chunk read from the pipe, whether or not it was stored.
pub fn select_pid_text(kept: &[Vec<u8>], last_read: Option<&[u8]>, mode: PidCapture) -> String {
    match mode {
        PidCapture::LastChunk => last_read
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .unwrap_or_default(),
        PidCapture::FirstInteger => {
            let joined: Vec<u8> = kept.concat();
            String::from_utf8_lossy(&joined)
                .split_whitespace()
                .find(|word| word.bytes().all(|b| b.is_ascii_digit()))
                .unwrap_or_default()
                .to_string()
        }
    }
}

/// Parse captured text into a pid. Empty, non-numeric, zero, and negative are rejected.
pub fn parse_pid(raw: &str) -> Option<u32> {
    match raw.trim().parse::<u32>() {
        Ok(pid) if pid > 0 => Some(pid),
        _ => None,
    }
}

/// Validate a finished child: it must have crashed and reported a usable pid.
///
/// `command` is only used to annotate the error.
pub fn validate_outcome(outcome: &SpawnOutcome, command: &str) -> Result<u32, DumpCoreError> {
    if outcome.exit_code == Some(0) {
        return Err(DumpCoreError::AbortExpected {
            command: command.to_string(),
        });
    }
    parse_pid(&outcome.captured_pid_text).ok_or_else(|| DumpCoreError::InvalidPid {
        raw: outcome.captured_pid_text.clone(),
    })
}
