//! Stable exit codes for dumpcore CLI commands.

use crate::core::types::Stage;

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid arguments, config file, or other errors outside the pipeline.
pub const INVALID: i32 = 1;
/// No usable core files pattern.
pub const CONFIG: i32 = 2;
/// Crashing child could not be run, did not crash, or reported no pid.
pub const SPAWN: i32 = 3;
/// Core path could not be predicted from the pattern.
pub const RESOLVE: i32 = 4;
/// Core file could not be moved.
pub const RELOCATE: i32 = 5;

/// Exit code for a pipeline failure in `stage`.
pub fn for_stage(stage: Stage) -> i32 {
    match stage {
        Stage::ConfigResolving => CONFIG,
        Stage::Spawning => SPAWN,
        Stage::Resolving => RESOLVE,
        Stage::Relocating => RELOCATE,
    }
}
