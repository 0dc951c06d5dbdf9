/*!
 * Monitoring Module
 * Tracing and diagnostics support
 */

mod tracer;

pub use tracer::init_tracing;
