/*!
 * ProcWatch Library
 * Single-threaded Unix process supervision: fork-based child handles with
 * guaranteed reaping on drop, and a signal-driven supervision loop
 */

pub mod core;
pub mod monitoring;
pub mod poller;
pub mod process;
pub mod signals;

// Re-exports
pub use crate::core::{ExitStatus, Pid, SupervisorError, SupervisorResult, EXIT_FAILURE, EXIT_SUCCESS};
pub use crate::monitoring::init_tracing;
pub use crate::poller::{Action, Direction, Outcome, Poller};
pub use crate::process::{exec_replace, ChildHandle, ProcessManager};
pub use crate::signals::{tracked_signals, SignalMask, SignalNotifier, TRACKED_SIGNALS};
