/*!
 * Core Types
 * Common types used across the supervisor
 */

/// Process ID type (OS-assigned)
pub use nix::unistd::Pid;

/// Exit status of a terminated process: exit code if it exited normally,
/// terminating signal number if it was killed
pub type ExitStatus = i32;

/// Conventional success status
pub const EXIT_SUCCESS: ExitStatus = 0;

/// Conventional failure status
pub const EXIT_FAILURE: ExitStatus = 1;
