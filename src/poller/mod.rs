/*!
 * Poller
 * Readiness-driven event loop: registered callbacks fire when their
 * descriptor becomes ready, and decide whether the loop keeps running
 */

use std::os::fd::{AsRawFd, BorrowedFd, RawFd};

use log::debug;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

use crate::core::errors::{SupervisorError, SupervisorResult};
use crate::core::types::ExitStatus;

/// Readiness direction a callback is interested in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    fn flags(self) -> PollFlags {
        match self {
            Direction::In => PollFlags::POLLIN,
            Direction::Out => PollFlags::POLLOUT,
        }
    }
}

/// What a callback decided about the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Keep polling
    Continue,
    /// Stop the loop and report this status
    Exit(ExitStatus),
}

/// A registered descriptor and the callback to run when it is ready.
///
/// The registrant must keep the descriptor open for as long as the action
/// is registered; the poller only borrows it at poll time.
pub struct Action {
    fd: RawFd,
    direction: Direction,
    callback: Box<dyn FnMut() -> SupervisorResult<Outcome>>,
}

impl Action {
    pub fn new<F>(fd: &impl AsRawFd, direction: Direction, callback: F) -> Self
    where
        F: FnMut() -> SupervisorResult<Outcome> + 'static,
    {
        Self {
            fd: fd.as_raw_fd(),
            direction,
            callback: Box::new(callback),
        }
    }
}

/// Multiplexes descriptor readiness over a set of registered actions
#[derive(Default)]
pub struct Poller {
    actions: Vec<Action>,
}

impl Poller {
    pub fn new() -> Self {
        Self {
            actions: Vec::new(),
        }
    }

    pub fn add_action(&mut self, action: Action) {
        debug!(
            "registered fd {} for {:?} readiness",
            action.fd, action.direction
        );
        self.actions.push(action);
    }

    /// Wait up to `timeout` for readiness and service every ready action.
    ///
    /// Returns the first [`Outcome::Exit`] a callback reports, otherwise
    /// [`Outcome::Continue`] once all ready actions have been serviced.
    pub fn poll(&mut self, timeout: PollTimeout) -> SupervisorResult<Outcome> {
        let mut pollfds: Vec<PollFd> = self
            .actions
            .iter()
            // Registrants keep their descriptors alive for the lifetime of
            // the action, so the borrow is valid for this call.
            .map(|a| unsafe {
                PollFd::new(BorrowedFd::borrow_raw(a.fd), a.direction.flags())
            })
            .collect();

        match poll(&mut pollfds, timeout) {
            Ok(_) => {}
            Err(Errno::EINTR) => return Ok(Outcome::Continue),
            Err(e) => return Err(SupervisorError::syscall("poll", e)),
        }

        let revents: Vec<PollFlags> = pollfds
            .iter()
            .map(|fd| fd.revents().unwrap_or(PollFlags::empty()))
            .collect();
        drop(pollfds);

        for (action, revents) in self.actions.iter_mut().zip(revents) {
            if revents.intersects(PollFlags::POLLERR | PollFlags::POLLNVAL) {
                return Err(SupervisorError::syscall("poll", Errno::EBADF));
            }

            if revents.intersects(action.direction.flags() | PollFlags::POLLHUP) {
                if let Outcome::Exit(status) = (action.callback)()? {
                    return Ok(Outcome::Exit(status));
                }
            }
        }

        Ok(Outcome::Continue)
    }
}
