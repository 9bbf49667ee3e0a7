//! Stable exit codes for transpipe CLI commands.

/// Command succeeded: outputs present, implementations matched, or source valid.
pub const OK: i32 = 0;
/// Command failed due to invalid configuration, unreadable input, or other errors.
pub const INVALID: i32 = 1;
/// `compare` found differing behavior, or `validate` rejected the source.
pub const MISMATCH: i32 = 2;
/// `run` finished but at least one expected output key is empty.
pub const INCOMPLETE: i32 = 3;
