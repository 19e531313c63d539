//! Forwarding pipeline module.

mod forwarder;
mod stats;

pub use forwarder::{Forwarder, Output};
pub use stats::{ForwardStats, OutputStats};
