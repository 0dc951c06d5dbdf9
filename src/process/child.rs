/*!
 * Child Handle
 * One spawned process and its observed lifecycle state. Dropping the
 * handle forcibly reaps the process: scope exit can never leak a child.
 */

use std::fs;
use std::os::unix::fs::MetadataExt;

use log::{debug, error};
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitid, Id, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, ForkResult};

use crate::core::errors::{SupervisorError, SupervisorResult};
use crate::core::types::{ExitStatus, Pid, EXIT_FAILURE};
use crate::signals::SignalMask;

/// Verify the calling process is single-threaded before forking.
///
/// /proc/self/task has one subdirectory per task, so its link count is
/// 2 + the number of tasks. fork in a multi-threaded process inherits
/// locks and signal state in ways this crate does not support.
fn assert_single_threaded() -> SupervisorResult<()> {
    let meta = fs::metadata("/proc/self/task")?;
    let links = meta.nlink();
    if links != 3 {
        return Err(SupervisorError::MultiThreadedFork {
            tasks: links.saturating_sub(2),
        });
    }
    Ok(())
}

/// A supervised child process.
///
/// Exactly one handle owns a given pid's lifecycle bookkeeping; transfer of
/// that ownership is an ordinary Rust move, so use-after-transfer cannot
/// compile. Dropping the handle runs the teardown protocol until the
/// process has terminated and been reaped.
#[derive(Debug)]
pub struct ChildHandle {
    name: String,
    pid: Pid,
    running: bool,
    terminated: bool,
    exit_status: Option<ExitStatus>,
    died_on_signal: bool,
    graceful_termination_signal: Signal,
}

impl ChildHandle {
    /// Fork and run `child_procedure` in the new process, with SIGTERM as
    /// the graceful termination signal
    pub fn spawn<F>(name: impl Into<String>, child_procedure: F) -> SupervisorResult<Self>
    where
        F: FnOnce() -> SupervisorResult<ExitStatus>,
    {
        Self::spawn_with_signal(name, child_procedure, Signal::SIGTERM)
    }

    /// Fork and run `child_procedure` in the new process.
    ///
    /// The child's signal mask is reset to block nothing before the
    /// procedure runs; the procedure's return value becomes the child's
    /// exit status. An `Err` is logged and the child exits with
    /// `EXIT_FAILURE`. The parent returns immediately with the new pid.
    pub fn spawn_with_signal<F>(
        name: impl Into<String>,
        child_procedure: F,
        termination_signal: Signal,
    ) -> SupervisorResult<Self>
    where
        F: FnOnce() -> SupervisorResult<ExitStatus>,
    {
        let name = name.into();
        assert_single_threaded()?;

        match unsafe { fork() }.map_err(|e| SupervisorError::syscall("fork", e))? {
            ForkResult::Child => {
                let status = match SignalMask::empty()
                    .set_as_mask()
                    .and_then(|_| child_procedure())
                {
                    Ok(status) => status,
                    Err(e) => {
                        error!("`{name}': {e}");
                        EXIT_FAILURE
                    }
                };
                // _exit, not exit: never unwind or run atexit handlers in
                // the forked image.
                unsafe { nix::libc::_exit(status) }
            }
            ForkResult::Parent { child } => {
                debug!("`{name}': spawned as pid {child}");
                Ok(Self {
                    name,
                    pid: child,
                    running: true,
                    terminated: false,
                    exit_status: None,
                    died_on_signal: false,
                    graceful_termination_signal: termination_signal,
                })
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// False only while the process is stopped and not yet continued
    pub fn running(&self) -> bool {
        self.running
    }

    /// True once the process has exited or been killed; never reverts
    pub fn terminated(&self) -> bool {
        self.terminated
    }

    /// Exit code or terminating signal number; `Some` exactly when
    /// [`terminated`](Self::terminated) is true
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    /// Whether a signal (rather than a normal exit) ended the process
    pub fn died_on_signal(&self) -> bool {
        self.died_on_signal
    }

    fn check_pid(&self, status: &WaitStatus) -> SupervisorResult<()> {
        match status.pid() {
            Some(pid) if pid == self.pid => Ok(()),
            other => Err(SupervisorError::WrongPid {
                expected: self.pid.as_raw(),
                actual: other.map(Pid::as_raw).unwrap_or(0),
            }),
        }
    }

    /// Non-blocking, non-consuming probe: does the process have a pending
    /// state change? Repeatable without side effects.
    pub fn is_waitable(&self) -> SupervisorResult<bool> {
        if self.terminated {
            return Err(SupervisorError::WaitAfterTermination(self.name.clone()));
        }

        let status = waitid(
            Id::Pid(self.pid),
            WaitPidFlag::WEXITED
                | WaitPidFlag::WSTOPPED
                | WaitPidFlag::WCONTINUED
                | WaitPidFlag::WNOHANG
                | WaitPidFlag::WNOWAIT,
        )
        .map_err(|e| SupervisorError::syscall("waitid", e))?;

        match status {
            WaitStatus::StillAlive => Ok(false),
            other => {
                self.check_pid(&other)?;
                Ok(true)
            }
        }
    }

    /// Consume exactly one pending state change and fold it into the
    /// handle's state.
    ///
    /// In non-blocking mode, fails with [`SupervisorError::NotWaitable`] if
    /// nothing was pending: only call it after [`Self::is_waitable`] has
    /// confirmed readiness.
    pub fn wait(&mut self, nonblocking: bool) -> SupervisorResult<()> {
        if self.terminated {
            return Err(SupervisorError::WaitAfterTermination(self.name.clone()));
        }

        let mut flags =
            WaitPidFlag::WEXITED | WaitPidFlag::WSTOPPED | WaitPidFlag::WCONTINUED;
        if nonblocking {
            flags |= WaitPidFlag::WNOHANG;
        }

        let status =
            waitid(Id::Pid(self.pid), flags).map_err(|e| SupervisorError::syscall("waitid", e))?;

        match status {
            WaitStatus::StillAlive => Err(SupervisorError::NotWaitable),
            WaitStatus::Exited(_, code) => {
                self.check_pid(&status)?;
                self.terminated = true;
                self.exit_status = Some(code);
                Ok(())
            }
            WaitStatus::Signaled(_, signal, _core_dumped) => {
                self.check_pid(&status)?;
                self.terminated = true;
                self.exit_status = Some(signal as ExitStatus);
                self.died_on_signal = true;
                Ok(())
            }
            WaitStatus::Stopped(..) => {
                self.check_pid(&status)?;
                self.running = false;
                Ok(())
            }
            WaitStatus::Continued(_) => {
                self.check_pid(&status)?;
                self.running = true;
                Ok(())
            }
            other => Err(SupervisorError::UnexpectedWaitStatus(format!("{other:?}"))),
        }
    }

    /// If the process is stopped, ask it to continue; no-op otherwise
    pub fn resume(&mut self) -> SupervisorResult<()> {
        if !self.running {
            self.signal(Signal::SIGCONT)?;
        }
        Ok(())
    }

    /// Deliver `sig` to the process. Signaling an already-terminated
    /// process is a silent no-op: its pid may have been reclaimed.
    pub fn signal(&self, sig: Signal) -> SupervisorResult<()> {
        if self.terminated {
            return Ok(());
        }
        kill(self.pid, sig).map_err(|e| SupervisorError::syscall("kill", e))
    }

    /// Descriptive failure for a terminated, non-zero-status process
    pub fn failure(&self) -> SupervisorError {
        let status = self.exit_status.unwrap_or(EXIT_FAILURE);
        if self.died_on_signal {
            SupervisorError::DiedOnSignal {
                name: self.name.clone(),
                signal: status,
            }
        } else {
            SupervisorError::ExitedWithFailure {
                name: self.name.clone(),
                status,
            }
        }
    }
}

impl Drop for ChildHandle {
    /// Teardown protocol: keep resuming, signaling, and reaping until the
    /// process has terminated. Errors are logged, never propagated; Drop
    /// may already be running during unwind of another error.
    fn drop(&mut self) {
        while !self.terminated {
            let attempt = (|| {
                self.resume()?;
                self.signal(self.graceful_termination_signal)?;
                self.wait(false)
            })();
            if let Err(e) = attempt {
                error!("`{}': teardown failed: {e}", self.name);
                return;
            }
        }
        debug!("`{}': pid {} reaped", self.name, self.pid);
    }
}
