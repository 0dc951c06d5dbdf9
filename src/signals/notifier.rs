/*!
 * Signal Notifier
 * Converts asynchronous signal delivery into readable events on a
 * descriptor, consumed synchronously by the event loop
 */

use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};

use nix::sys::signalfd::{siginfo, SfdFlags, SignalFd};

use crate::core::errors::{SupervisorError, SupervisorResult};
use crate::signals::set::SignalMask;

/// A signal-notification channel scoped to a fixed signal set.
///
/// The signals in the set must be blocked from asynchronous delivery (see
/// [`SignalMask::set_as_mask`]) or they will still be handled the ordinary
/// way instead of queuing on this descriptor.
#[derive(Debug)]
pub struct SignalNotifier {
    fd: SignalFd,
}

impl SignalNotifier {
    /// Open a notifier for every signal in `mask`
    pub fn new(mask: &SignalMask) -> SupervisorResult<Self> {
        let fd = SignalFd::with_flags(mask.sigset(), SfdFlags::SFD_CLOEXEC)
            .map_err(|e| SupervisorError::syscall("signalfd", e))?;
        Ok(Self { fd })
    }

    /// Read one pending signal record; `None` if nothing is queued
    pub fn read_signal(&mut self) -> SupervisorResult<Option<siginfo>> {
        self.fd
            .read_signal()
            .map_err(|e| SupervisorError::syscall("read(signalfd)", e))
    }
}

impl AsFd for SignalNotifier {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl AsRawFd for SignalNotifier {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}
