/*!
 * Core Module
 * Shared types and error definitions
 */

pub mod errors;
pub mod types;

pub use errors::{SupervisorError, SupervisorResult};
pub use types::{ExitStatus, Pid, EXIT_FAILURE, EXIT_SUCCESS};
