//! Output resolution
//!
//! Turns `scheme://argument` strings into [`contracts::Sink`]s. Dial schemes
//! (`tcp`, `unix`, `http(s)`, `ws(s)`, `file`, `stdout`, `stderr`) are built
//! here; listening schemes are delegated to the `broadcast` crate.
//!
//! ```ignore
//! let registry = Registry::new();
//! let mut sink = registry.resolve("tcp-listen://:9000").await?;
//! sink.write(b"hello\n").await?;
//! sink.close().await?;
//! ```

pub mod registry;
pub mod scheme;
pub mod sinks;

pub use contracts::{BoxSink, ListenConfig, Sink, SinkError};
pub use registry::{split_spec, Constructor, Registry};
pub use scheme::{Scheme, SchemeInfo};
