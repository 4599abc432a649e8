//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions where applicable.

/// Success - operation completed without errors
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Configuration error - missing mode, invalid file, malformed rule
pub const CONFIG_ERROR: i32 = 2;

/// Chart error - invalid chart, failed lint, packaging failure
pub const CHART_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Git error - a branch, commit or push failed
pub const GIT_ERROR: i32 = 6;
