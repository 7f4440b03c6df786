//! # rdc-viewer — frame-sync harness
//!
//! Consumer-side harness for the `rdc-core` pipeline. Stands in for
//! the GUI shell: drives a loopback engine that paints into its own
//! buffer, polls deliveries on a render-style schedule, and logs the
//! regions a real widget would repaint.

pub mod config;
pub mod engine;
pub mod sink;
