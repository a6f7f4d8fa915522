//! Standard exit codes for sfxkit binaries
//!
//! The stub itself only distinguishes success from failure; the builder
//! reports the finer-grained codes below.

/// Successful execution
pub const EXIT_SUCCESS: i32 = 0;

/// Generic error
pub const EXIT_ERROR: i32 = 1;

/// Panic or unrecoverable error
pub const EXIT_PANIC: i32 = 101;

/// Trailer or archive format error
pub const EXIT_FORMAT_ERROR: i32 = 102;

/// I/O error (file not found, permission denied, disk error)
pub const EXIT_IO_ERROR: i32 = 106;

/// Cleanup refused by a safety guard
pub const EXIT_SAFETY_GUARD_ERROR: i32 = 107;

/// Build/packaging error
pub const EXIT_BUILD_ERROR: i32 = 108;

/// Shortcut, registration or self-delete failure
pub const EXIT_INTEGRATION_ERROR: i32 = 109;

/// Invalid command-line arguments
pub const EXIT_INVALID_ARGS: i32 = 105;
