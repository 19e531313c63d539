//! StdioSink - process stdout / stderr

use async_trait::async_trait;
use contracts::{Sink, SinkError};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, instrument};

/// Writes straight to a process stream; close flushes but never closes it
pub struct StdioSink {
    name: &'static str,
    out: Box<dyn AsyncWrite + Send + Unpin>,
    closed: bool,
}

impl StdioSink {
    pub fn stdout() -> Self {
        Self::from_writer("stdout", Box::new(tokio::io::stdout()))
    }

    pub fn stderr() -> Self {
        Self::from_writer("stderr", Box::new(tokio::io::stderr()))
    }

    fn from_writer(name: &'static str, out: Box<dyn AsyncWrite + Send + Unpin>) -> Self {
        Self {
            name,
            out,
            closed: false,
        }
    }
}

#[async_trait]
impl Sink for StdioSink {
    fn name(&self) -> &str {
        self.name
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize, SinkError> {
        if self.closed {
            return Err(SinkError::closed(self.name));
        }
        self.out
            .write_all(buf)
            .await
            .map_err(|e| SinkError::write(self.name, e.to_string()))?;
        Ok(buf.len())
    }

    #[instrument(name = "stdio_sink_close", skip(self), fields(sink = %self.name))]
    async fn close(&mut self) -> Result<(), SinkError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.out.flush().await?;
        debug!("StdioSink flushed");
        Ok(())
    }
}
