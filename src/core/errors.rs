/*!
 * Error Types
 * Centralized error handling with thiserror and miette support
 */

use crate::core::types::ExitStatus;
use miette::Diagnostic;
use thiserror::Error;

/// Supervisor operation result
pub type SupervisorResult<T> = Result<T, SupervisorError>;

/// Supervisor errors
#[derive(Error, Debug, Diagnostic)]
pub enum SupervisorError {
    #[error("{call} failed: {source}")]
    #[diagnostic(code(procwatch::syscall))]
    Syscall {
        call: &'static str,
        #[source]
        source: nix::Error,
    },

    #[error("could not inspect /proc/self/task: {0}")]
    #[diagnostic(code(procwatch::task_probe))]
    TaskProbe(#[from] std::io::Error),

    #[error("process spawned in multi-threaded program ({tasks} tasks)")]
    #[diagnostic(
        code(procwatch::multithreaded_fork),
        help("fork and signal-mask semantics are only safe in a single-threaded parent")
    )]
    MultiThreadedFork { tasks: u64 },

    #[error("nonblocking wait: process was not waitable")]
    #[diagnostic(code(procwatch::not_waitable))]
    NotWaitable,

    #[error("waitid: unexpected pid in status (expected {expected}, got {actual})")]
    #[diagnostic(
        code(procwatch::wrong_pid),
        help("the waiting primitive returned status for the wrong target")
    )]
    WrongPid { expected: i32, actual: i32 },

    #[error("waitid: unexpected wait outcome: {0}")]
    #[diagnostic(code(procwatch::unexpected_wait_status))]
    UnexpectedWaitStatus(String),

    #[error("`{0}': wait on already-terminated process")]
    #[diagnostic(
        code(procwatch::wait_after_termination),
        help("a terminated handle has no further state changes to consume")
    )]
    WaitAfterTermination(String),

    #[error("`{name}': process died on signal {signal}")]
    #[diagnostic(code(procwatch::died_on_signal))]
    DiedOnSignal { name: String, signal: ExitStatus },

    #[error("`{name}': process exited with failure status {status}")]
    #[diagnostic(code(procwatch::exited_with_failure))]
    ExitedWithFailure { name: String, status: ExitStatus },

    #[error("exec `{program}' failed: {source}")]
    #[diagnostic(code(procwatch::exec_failed))]
    ExecFailed {
        program: String,
        #[source]
        source: nix::Error,
    },

    #[error("argument contains interior NUL byte")]
    #[diagnostic(code(procwatch::nul_byte))]
    NulByte(#[from] std::ffi::NulError),
}

impl SupervisorError {
    /// Wrap a failed system call with the name of the call
    pub fn syscall(call: &'static str, source: nix::Error) -> Self {
        Self::Syscall { call, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn syscall_error_names_the_call() {
        let err = SupervisorError::syscall("fork", nix::Error::EAGAIN);
        assert!(err.to_string().starts_with("fork failed"));
    }

    #[test]
    fn failure_reports_match_expected_format() {
        let died = SupervisorError::DiedOnSignal {
            name: "worker".into(),
            signal: 9,
        };
        assert_eq!(died.to_string(), "`worker': process died on signal 9");

        let exited = SupervisorError::ExitedWithFailure {
            name: "worker".into(),
            status: 7,
        };
        assert_eq!(
            exited.to_string(),
            "`worker': process exited with failure status 7"
        );
    }
}
