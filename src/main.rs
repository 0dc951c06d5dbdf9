/*!
 * ProcWatch - Main Entry Point
 *
 * Runs a program under supervision: the child is tracked and reaped
 * through the signal-driven event loop, and the supervisor's exit status
 * becomes this process's exit status.
 */

use std::error::Error;

use tracing::info;

use procwatch::{init_tracing, ProcessManager};

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    let mut argv = std::env::args().skip(1);
    let program = argv
        .next()
        .ok_or("usage: procwatch <program> [args...]")?;
    let args: Vec<String> = argv.collect();

    let mut manager = ProcessManager::new()?;
    info!(program = %program, "supervising");

    let status = manager.run(&program, &args)?;
    info!(status, "supervision loop finished");

    std::process::exit(status)
}
