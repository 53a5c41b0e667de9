//! Exit code constants for CLI commands
//!
//! - 0: Success
//! - 1: The analysis could not complete (missing workflow, I/O, timeout)
//! - 2: The workflows or the configuration are invalid (cycle, path explosion,
//!   parse error, bad setting)

/// Successful execution
pub const EXIT_SUCCESS: i32 = 0;

/// General error
pub const EXIT_WARNING: i32 = 1;

/// Validation errors or critical failures
pub const EXIT_ERROR: i32 = 2;
