/*!
 * Exec Helper
 * Replace the current process image with a named external program
 */

use std::convert::Infallible;
use std::ffi::CString;

use nix::unistd::execvp;

use crate::core::errors::{SupervisorError, SupervisorResult};

/// Replace the calling process's image with `program` invoked with `args`.
///
/// `program` is resolved against PATH and also becomes argv[0]. On success
/// this never returns; the only observable outcome is the failure error.
pub fn exec_replace(program: &str, args: &[String]) -> SupervisorResult<Infallible> {
    let prog = CString::new(program)?;

    let mut argv = Vec::with_capacity(args.len() + 1);
    argv.push(prog.clone());
    for arg in args {
        argv.push(CString::new(arg.as_str())?);
    }

    match execvp(&prog, &argv) {
        Ok(never) => match never {},
        Err(err) => Err(SupervisorError::ExecFailed {
            program: program.to_string(),
            source: err,
        }),
    }
}
