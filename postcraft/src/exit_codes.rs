//! Stable exit codes for postcraft CLI commands.

/// Command succeeded; for `run`, the post was published.
pub const OK: i32 = 0;
/// Invalid config, unreachable setup or another error outside the workflow.
pub const INVALID: i32 = 1;
/// `postcraft run` ended before publishing (quit or end of input).
pub const ABANDONED: i32 = 2;
