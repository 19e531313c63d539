//! StreamSink - dialed TCP or Unix stream socket

use async_trait::async_trait;
use contracts::{Sink, SinkError};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, UnixStream};
use tracing::{debug, instrument};

/// One outbound stream connection; writes pass straight through
pub struct StreamSink<S> {
    name: &'static str,
    peer: String,
    stream: Option<S>,
}

impl StreamSink<TcpStream> {
    /// `tcp://host:port`
    #[instrument(name = "tcp_dial")]
    pub async fn tcp(address: &str) -> Result<Self, SinkError> {
        let stream = TcpStream::connect(address)
            .await
            .map_err(|e| SinkError::dial("tcp", address, e.to_string()))?;
        // Latency matters more than packet count for small frames
        stream.set_nodelay(true)?;

        debug!(peer = %address, "TCP output connected");
        Ok(Self::new("tcp", address, stream))
    }
}

impl StreamSink<UnixStream> {
    /// `unix:///path/to.sock`
    #[instrument(name = "unix_dial")]
    pub async fn unix(path: &str) -> Result<Self, SinkError> {
        let stream = UnixStream::connect(path)
            .await
            .map_err(|e| SinkError::dial("unix", path, e.to_string()))?;

        debug!(peer = %path, "Unix output connected");
        Ok(Self::new("unix", path, stream))
    }
}

impl<S> StreamSink<S> {
    fn new(name: &'static str, peer: &str, stream: S) -> Self {
        Self {
            name,
            peer: peer.to_string(),
            stream: Some(stream),
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }
}

#[async_trait]
impl<S> Sink for StreamSink<S>
where
    S: AsyncWrite + Send + Unpin,
{
    fn name(&self) -> &str {
        self.name
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize, SinkError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| SinkError::closed(self.name))?;
        stream
            .write_all(buf)
            .await
            .map_err(|e| SinkError::write(self.name, e.to_string()))?;
        Ok(buf.len())
    }

    #[instrument(name = "stream_sink_close", skip(self), fields(sink = %self.name, peer = %self.peer))]
    async fn close(&mut self) -> Result<(), SinkError> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        stream.shutdown().await?;
        debug!("Stream output closed");
        Ok(())
    }
}
