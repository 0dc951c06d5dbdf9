/*!
 * Signal Sets
 * Tracked signal set and thread signal-mask management
 */

use nix::sys::signal::{SigSet, Signal};

use crate::core::errors::{SupervisorError, SupervisorResult};

/// Signals the supervisor intercepts: the child-status-change signal plus
/// the standard termination-request signals.
pub const TRACKED_SIGNALS: [Signal; 6] = [
    Signal::SIGCHLD,
    Signal::SIGABRT,
    Signal::SIGHUP,
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGTERM,
];

/// The fixed set of signals routed through the supervisor's notifier
pub fn tracked_signals() -> SigSet {
    let mut set = SigSet::empty();
    for sig in TRACKED_SIGNALS {
        set.add(sig);
    }
    set
}

/// A signal mask that can be installed as the calling thread's mask.
///
/// The supervisor installs the tracked set at construction so the signals
/// are delivered only through its notifier; the child branch of a fork
/// installs the empty mask before the child procedure runs.
#[derive(Debug, Clone, Copy)]
pub struct SignalMask {
    set: SigSet,
}

impl SignalMask {
    pub fn new(set: SigSet) -> Self {
        Self { set }
    }

    /// Mask blocking nothing
    pub fn empty() -> Self {
        Self {
            set: SigSet::empty(),
        }
    }

    /// Mask blocking the tracked signal set
    pub fn tracked() -> Self {
        Self {
            set: tracked_signals(),
        }
    }

    pub fn sigset(&self) -> &SigSet {
        &self.set
    }

    /// Install this set as the calling thread's signal mask, replacing the
    /// previous mask. In the supervisor's verified single-threaded model
    /// this is the process-wide mask.
    pub fn set_as_mask(&self) -> SupervisorResult<()> {
        self.set
            .thread_set_mask()
            .map_err(|e| SupervisorError::syscall("sigprocmask", e))
    }
}
