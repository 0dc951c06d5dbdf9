/*!
 * Process Supervisor
 * Tracks spawned children and reaps them through a signal-driven event
 * loop; the first failing child aborts the whole supervision loop
 */

use std::os::fd::AsRawFd;
use std::sync::Arc;

use dashmap::DashMap;
use log::{error, info, warn};
use nix::poll::PollTimeout;
use nix::sys::signal::Signal;
use nix::sys::signalfd::siginfo;
use parking_lot::Mutex;

use crate::core::errors::SupervisorResult;
use crate::core::types::{ExitStatus, Pid, EXIT_FAILURE, EXIT_SUCCESS};
use crate::poller::{Action, Direction, Outcome, Poller};
use crate::process::child::ChildHandle;
use crate::process::exec::exec_replace;
use crate::signals::{SignalMask, SignalNotifier};

/// Supervises child processes from a single-threaded parent.
///
/// Construction blocks the tracked signal set from asynchronous delivery
/// and routes it through a signal notifier registered with the event loop;
/// the mask stays installed for the life of the process. Children are
/// owned by the supervisor and are forcibly reaped by their handles' Drop
/// when the supervisor itself is dropped.
pub struct ProcessManager {
    children: Arc<DashMap<Pid, ChildHandle>>,
    // The notifier is shared with the registered poll callback and must
    // outlive the registration; the supervisor keeps its half alive here.
    _notifier: Arc<Mutex<SignalNotifier>>,
    _mask: SignalMask,
    poller: Poller,
}

impl ProcessManager {
    pub fn new() -> SupervisorResult<Self> {
        let mask = SignalMask::tracked();
        // Tracked signals are delivered only through the notifier from
        // here on, never as asynchronous handlers.
        mask.set_as_mask()?;

        let notifier = SignalNotifier::new(&mask)?;
        let notifier_fd = notifier.as_raw_fd();
        let notifier = Arc::new(Mutex::new(notifier));
        let children: Arc<DashMap<Pid, ChildHandle>> = Arc::new(DashMap::new());

        let mut poller = Poller::new();
        let cb_notifier = Arc::clone(&notifier);
        let cb_children = Arc::clone(&children);
        poller.add_action(Action::new(&notifier_fd, Direction::In, move || {
            match cb_notifier.lock().read_signal()? {
                Some(sig) => dispatch_signal(&cb_children, &sig),
                None => Ok(Outcome::Continue),
            }
        }));

        Ok(Self {
            children,
            _notifier: notifier,
            _mask: mask,
            poller,
        })
    }

    /// Spawn `program` with `args` as a tracked child; the supervisor
    /// becomes the sole owner of its handle
    pub fn spawn(&mut self, program: &str, args: &[String]) -> SupervisorResult<Pid> {
        let exec_program = program.to_string();
        let exec_args = args.to_vec();
        let child = ChildHandle::spawn(program, move || {
            exec_replace(&exec_program, &exec_args).map(|never| match never {})
        })?;

        let pid = child.pid();
        info!("`{program}': tracking pid {pid}");
        self.children.insert(pid, child);
        Ok(pid)
    }

    /// Number of currently tracked children
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Run the event loop until a callback reports an exit outcome;
    /// returns that exit status
    pub fn drive(&mut self) -> SupervisorResult<ExitStatus> {
        loop {
            if let Outcome::Exit(status) = self.poller.poll(PollTimeout::NONE)? {
                return Ok(status);
            }
        }
    }

    /// Spawn then drive: blocks until the supervision loop exits
    pub fn run(&mut self, program: &str, args: &[String]) -> SupervisorResult<ExitStatus> {
        self.spawn(program, args)?;
        self.drive()
    }
}

/// Dispatch one signal record read from the notifier.
fn dispatch_signal(
    children: &DashMap<Pid, ChildHandle>,
    sig: &siginfo,
) -> SupervisorResult<Outcome> {
    match Signal::try_from(sig.ssi_signo as i32) {
        Ok(Signal::SIGCHLD) => reap_children(children),
        Ok(
            signal @ (Signal::SIGABRT
            | Signal::SIGHUP
            | Signal::SIGINT
            | Signal::SIGQUIT
            | Signal::SIGTERM),
        ) => {
            warn!("interrupted by signal {signal}");
            Ok(Outcome::Exit(EXIT_FAILURE))
        }
        Ok(signal) => {
            error!("unexpected signal {signal}");
            Ok(Outcome::Exit(EXIT_FAILURE))
        }
        Err(_) => {
            error!("unknown signal {}", sig.ssi_signo);
            Ok(Outcome::Exit(EXIT_FAILURE))
        }
    }
}

/// Scan every tracked child for pending state changes.
///
/// One SIGCHLD may be a coalesced notification covering several children,
/// so the whole mapping is rescanned rather than trusting the record's
/// pid alone.
fn reap_children(children: &DashMap<Pid, ChildHandle>) -> SupervisorResult<Outcome> {
    if children.is_empty() {
        error!("received SIGCHLD without any children");
        return Ok(Outcome::Exit(EXIT_FAILURE));
    }

    let pids: Vec<Pid> = children.iter().map(|entry| *entry.key()).collect();
    for pid in pids {
        let mut reaped = false;

        if let Some(mut entry) = children.get_mut(&pid) {
            let child = entry.value_mut();

            if !child.is_waitable()? {
                continue;
            }
            child.wait(true)?;

            if child.terminated() {
                if child.exit_status() != Some(EXIT_SUCCESS) {
                    error!("{}", child.failure());
                    return Ok(Outcome::Exit(EXIT_FAILURE));
                }
                info!("`{}': pid {pid} exited cleanly", child.name());
                reaped = true;
            } else if !child.running() {
                error!("`{}': pid {pid} stopped unexpectedly", child.name());
                return Ok(Outcome::Exit(EXIT_FAILURE));
            }
        }

        if reaped {
            children.remove(&pid);
        }
    }

    // All supervised work finished cleanly; nothing is left to wake the
    // loop, so report success instead of polling forever.
    if children.is_empty() {
        return Ok(Outcome::Exit(EXIT_SUCCESS));
    }

    Ok(Outcome::Continue)
}
