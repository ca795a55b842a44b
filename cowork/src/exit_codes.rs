//! Stable exit codes for cowork CLI commands.

/// Command succeeded, including the explicit empty-plan outcome.
pub const OK: i32 = 0;
/// Invalid arguments, configuration, or plan (validation failed).
pub const INVALID: i32 = 1;
/// A step failed and was not recovered; execution stopped there.
pub const STEP_FAILED: i32 = 2;
