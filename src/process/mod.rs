/*!
 * Process Module
 * Child process lifecycle and supervision
 */

mod child;
mod exec;
mod supervisor;

pub use child::ChildHandle;
pub use exec::exec_replace;
pub use supervisor::ProcessManager;
