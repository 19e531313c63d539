//! Command implementations.

mod run;
mod schemes;
mod validate;

pub use run::run_forwarder;
pub use schemes::run_schemes;
pub use validate::run_validate;
