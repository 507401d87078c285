//! Stable exit codes for treeflood CLI commands.

/// Command succeeded; explorations finished with every robot stopped.
pub const OK: i32 = 0;
/// Invalid arguments, config or tree, or any other error.
pub const INVALID: i32 = 1;
/// The exploration hit `max_steps` before every robot stopped.
pub const STEP_LIMIT: i32 = 3;
/// A robot failed (listener error, knowledge invariant violation, panic).
pub const ROBOT_FAILED: i32 = 4;
/// A pulse exceeded `pulse_timeout_ms`; some robot stalled.
pub const PULSE_TIMEOUT: i32 = 5;
