//! Stable exit codes for editflow CLI commands.

/// Command succeeded; for `write`, the edit was saved.
pub const OK: i32 = 0;
/// Invalid arguments, config, or another error before any edit ran.
pub const INVALID: i32 = 1;
/// The edit was computed but not approved, and was reverted.
pub const REJECTED: i32 = 2;
/// The edit pipeline reported a failure (access, timeout, I/O, ...).
pub const FAILED: i32 = 3;
