//! Transport adapters
//!
//! The listening variants differ only in how a downstream connection is
//! accepted. An [`Acceptor`] yields connections; a [`Connection`] is a
//! write-only byte stream owned by exactly one subscriber.

mod http;
mod stream;

use std::io;

use async_trait::async_trait;
use bytes::Bytes;

pub use self::http::{HttpAcceptor, HttpMode};
pub use self::stream::{StreamConnection, TcpAcceptor, UnixAcceptor};

/// One accepted downstream consumer
#[async_trait]
pub trait Connection: Send + 'static {
    /// Peer description (used for logging)
    fn peer(&self) -> &str;

    /// Write one payload fully
    async fn send(&mut self, payload: Bytes) -> io::Result<()>;

    /// Flush and release the connection
    async fn shutdown(&mut self);
}

/// Owned, type-erased connection
pub type BoxConnection = Box<dyn Connection>;

/// Outcome of a failed accept
#[derive(Debug)]
pub enum AcceptError {
    /// One bad inbound attempt; keep accepting
    Transient(String),
    /// Listener is unusable; stop accepting
    Fatal(String),
}

impl AcceptError {
    /// Classify an accept-call IO error
    pub fn from_io(err: io::Error) -> Self {
        if is_transient(&err) {
            Self::Transient(err.to_string())
        } else {
            Self::Fatal(err.to_string())
        }
    }
}

fn is_transient(err: &io::Error) -> bool {
    // EMFILE / ENFILE: out of descriptors, may recover once peers hang up
    if matches!(err.raw_os_error(), Some(23) | Some(24)) {
        return true;
    }
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    )
}

/// Source of downstream connections for one listening sink
#[async_trait]
pub trait Acceptor: Send + 'static {
    /// Wait for the next inbound connection
    async fn accept(&mut self) -> Result<BoxConnection, AcceptError>;

    /// Bound address, as reported to callers
    fn local_addr(&self) -> String;

    /// Release the underlying listener
    async fn release(&mut self) {}
}
