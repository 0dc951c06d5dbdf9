/*!
 * Supervisor Run Tests
 * Run without the libtest harness: forking requires a single-threaded
 * process, and the default harness runs every test on a spawned thread.
 */

use std::io::Write;
use std::os::fd::AsFd;
use std::os::unix::fs::PermissionsExt;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::signal::{raise, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag};
use pretty_assertions::assert_eq;

use procwatch::{ProcessManager, SignalMask, SignalNotifier, EXIT_FAILURE, EXIT_SUCCESS};

fn main() {
    run("single child exits zero", single_child_exits_zero);
    run("single child exits nonzero", single_child_exits_nonzero);
    run("argv is forwarded to the program", argv_is_forwarded);
    run("coalesced notifications reap all children", coalesced_reap);
    run("interrupt aborts the loop and teardown reaps", interrupt_aborts_loop);
    run("stray sigchld without children fails", stray_sigchld_fails);
    run("stopped child aborts the loop", stopped_child_aborts_loop);
    println!("all supervisor run tests passed");
}

fn run(name: &str, test: fn()) {
    drain_pending_signals();
    print!("test {name} ... ");
    test();
    println!("ok");
}

/// Consume tracked signals left queued by a previous scenario so they
/// cannot leak into the next manager's notifier.
fn drain_pending_signals() {
    let mask = SignalMask::tracked();
    mask.set_as_mask().unwrap();
    let mut notifier = SignalNotifier::new(&mask).unwrap();

    loop {
        let ready = {
            let mut fds = [PollFd::new(notifier.as_fd(), PollFlags::POLLIN)];
            poll(&mut fds, PollTimeout::ZERO).unwrap() > 0
        };
        if !ready {
            break;
        }
        notifier.read_signal().unwrap();
    }
}

fn single_child_exits_zero() {
    let mut manager = ProcessManager::new().unwrap();
    let status = manager.run("true", &[]).unwrap();

    assert_eq!(status, EXIT_SUCCESS);
    assert_eq!(manager.child_count(), 0);
}

fn single_child_exits_nonzero() {
    let mut manager = ProcessManager::new().unwrap();
    let status = manager
        .run("sh", &["-c".into(), "exit 7".into()])
        .unwrap();

    assert_eq!(status, EXIT_FAILURE);
    // The mapping is abandoned on failure, not emptied.
    assert_eq!(manager.child_count(), 1);
}

fn argv_is_forwarded() {
    let dir = tempfile::tempdir().unwrap();
    let script_path = dir.path().join("echo-args.sh");
    let out_path = dir.path().join("out");

    let mut script = std::fs::File::create(&script_path).unwrap();
    writeln!(script, "#!/bin/sh").unwrap();
    writeln!(script, "echo \"$2 $3\" > \"$1\"").unwrap();
    drop(script);
    std::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755)).unwrap();

    let mut manager = ProcessManager::new().unwrap();
    let status = manager
        .run(
            "sh",
            &[
                script_path.to_str().unwrap().to_string(),
                out_path.to_str().unwrap().to_string(),
                "alpha".to_string(),
                "beta".to_string(),
            ],
        )
        .unwrap();

    assert_eq!(status, EXIT_SUCCESS);
    let out = std::fs::read_to_string(&out_path).unwrap();
    assert_eq!(out.trim(), "alpha beta");
}

fn coalesced_reap() {
    let mut manager = ProcessManager::new().unwrap();
    for _ in 0..5 {
        manager.spawn("true", &[]).unwrap();
    }
    assert_eq!(manager.child_count(), 5);

    let status = manager.drive().unwrap();
    assert_eq!(status, EXIT_SUCCESS);
    assert_eq!(manager.child_count(), 0);
}

fn interrupt_aborts_loop() {
    let mut manager = ProcessManager::new().unwrap();
    let pid = manager.spawn("sleep", &["30".into()]).unwrap();

    // SIGINT is blocked and queues on the notifier; the loop must report
    // failure without the child having exited.
    raise(Signal::SIGINT).unwrap();
    let status = manager.drive().unwrap();
    assert_eq!(status, EXIT_FAILURE);
    assert_eq!(manager.child_count(), 1);

    // Unwinding the supervisor must forcibly terminate and reap the child.
    drop(manager);
    assert_eq!(waitpid(pid, Some(WaitPidFlag::WNOHANG)), Err(Errno::ECHILD));
}

fn stray_sigchld_fails() {
    let mut manager = ProcessManager::new().unwrap();

    raise(Signal::SIGCHLD).unwrap();
    let status = manager.drive().unwrap();
    assert_eq!(status, EXIT_FAILURE);
}

fn stopped_child_aborts_loop() {
    let mut manager = ProcessManager::new().unwrap();
    let pid = manager.spawn("sleep", &["30".into()]).unwrap();

    nix::sys::signal::kill(pid, Signal::SIGSTOP).unwrap();
    let status = manager.drive().unwrap();
    assert_eq!(status, EXIT_FAILURE);

    drop(manager);
    assert_eq!(waitpid(pid, Some(WaitPidFlag::WNOHANG)), Err(Errno::ECHILD));
}
