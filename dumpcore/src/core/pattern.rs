//! Core-file path prediction from the kernel naming pattern.

use std::path::PathBuf;

use crate::core::types::CRASHING_PROCESS_NAME;
use crate::error::DumpCoreError;

/// Pattern token replaced by the process id.
pub const PID_TOKEN: &str = "%P";
/// Pattern token replaced by the executable name.
pub const NAME_TOKEN: &str = "%f";

/// Substitute `%P` and `%f` in `pattern` to predict where the OS wrote the core.
///
/// Every occurrence of each token is replaced; other characters, including
/// unknown `%` tokens, are left untouched.
pub fn resolve_core_path(pattern: &str, pid: u32) -> Result<PathBuf, DumpCoreError> {
    if pattern.is_empty() {
        return Err(DumpCoreError::EmptyPattern);
    }
    let resolved = pattern
        .replace(PID_TOKEN, &pid.to_string())
        .replace(NAME_TOKEN, CRASHING_PROCESS_NAME);
    Ok(PathBuf::from(resolved))
}
