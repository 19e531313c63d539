//! # Contracts
//!
//! Frozen interface contracts shared by every fanout crate: the `Sink`
//! capability, the error taxonomy and the configuration model.
//! Business crates only depend on this crate, never the other way around.

mod config;
mod error;
mod sink;

pub use config::*;
pub use error::*;
pub use sink::*;
