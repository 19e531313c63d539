//! Stream-socket adapters (TCP and Unix domain)

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, UnixListener};
use tracing::{debug, warn};

use super::{AcceptError, Acceptor, BoxConnection, Connection};

/// Any async byte stream used as a subscriber connection
pub struct StreamConnection<S> {
    stream: S,
    peer: String,
}

impl<S> StreamConnection<S> {
    pub fn new(stream: S, peer: impl Into<String>) -> Self {
        Self {
            stream,
            peer: peer.into(),
        }
    }
}

#[async_trait]
impl<S> Connection for StreamConnection<S>
where
    S: AsyncWrite + Unpin + Send + 'static,
{
    fn peer(&self) -> &str {
        &self.peer
    }

    async fn send(&mut self, payload: Bytes) -> io::Result<()> {
        self.stream.write_all(&payload).await
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!(peer = %self.peer, error = %e, "Stream shutdown failed");
        }
    }
}

/// TCP accept side
pub struct TcpAcceptor {
    listener: TcpListener,
    local_addr: String,
    nodelay: bool,
}

impl TcpAcceptor {
    /// Bind a TCP listener
    pub async fn bind(address: &str, nodelay: bool) -> io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        let local_addr = listener.local_addr()?.to_string();
        Ok(Self {
            listener,
            local_addr,
            nodelay,
        })
    }
}

#[async_trait]
impl Acceptor for TcpAcceptor {
    async fn accept(&mut self) -> Result<BoxConnection, AcceptError> {
        let (socket, peer_addr) = self.listener.accept().await.map_err(AcceptError::from_io)?;

        if self.nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                warn!(peer = %peer_addr, error = %e, "Failed to configure socket");
            }
        }

        Ok(Box::new(StreamConnection::new(socket, peer_addr.to_string())))
    }

    fn local_addr(&self) -> String {
        self.local_addr.clone()
    }
}

/// Unix domain socket accept side
///
/// The socket file is unlinked when the listener is released.
pub struct UnixAcceptor {
    listener: UnixListener,
    path: PathBuf,
    next_peer: u64,
}

impl UnixAcceptor {
    /// Bind a Unix listener at `path`
    pub fn bind(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let listener = UnixListener::bind(&path)?;
        Ok(Self {
            listener,
            path,
            next_peer: 0,
        })
    }
}

#[async_trait]
impl Acceptor for UnixAcceptor {
    async fn accept(&mut self) -> Result<BoxConnection, AcceptError> {
        let (socket, _) = self.listener.accept().await.map_err(AcceptError::from_io)?;
        // Client sockets are unnamed, number them instead
        self.next_peer += 1;
        let peer = format!("{}#{}", self.path.display(), self.next_peer);
        Ok(Box::new(StreamConnection::new(socket, peer)))
    }

    fn local_addr(&self) -> String {
        self.path.display().to_string()
    }

    async fn release(&mut self) {
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to remove socket file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::{TcpStream, UnixStream};

    #[tokio::test]
    async fn test_tcp_acceptor_yields_writable_connection() {
        let mut acceptor = TcpAcceptor::bind("127.0.0.1:0", true).await.unwrap();
        let mut client = TcpStream::connect(acceptor.local_addr()).await.unwrap();

        let mut conn = acceptor.accept().await.unwrap();
        conn.send(Bytes::from_static(b"hello")).await.unwrap();
        conn.shutdown().await;

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"hello");
    }

    #[tokio::test]
    async fn test_unix_acceptor_release_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.sock");

        let mut acceptor = UnixAcceptor::bind(&path).unwrap();
        assert!(path.exists());

        let mut client = UnixStream::connect(&path).await.unwrap();
        let mut conn = acceptor.accept().await.unwrap();
        assert!(conn.peer().ends_with("#1"));
        conn.send(Bytes::from_static(b"x")).await.unwrap();

        let mut byte = [0u8; 1];
        client.read_exact(&mut byte).await.unwrap();
        assert_eq!(&byte, b"x");

        acceptor.release().await;
        assert!(!path.exists());
    }
}
