/*!
 * Signals Module
 * Signal-mask setup and synchronous signal notification
 */

mod notifier;
mod set;

pub use notifier::SignalNotifier;
pub use set::{tracked_signals, SignalMask, TRACKED_SIGNALS};
