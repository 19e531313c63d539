//! Sink trait - the output capability
//!
//! Every destination, dial or listen, implements this trait.

use async_trait::async_trait;

use crate::SinkError;

/// Byte-stream output
///
/// The producer owns the sink and must close it exactly once; a second
/// `close` is a no-op, a `write` after `close` fails with [`SinkError::Closed`].
#[async_trait]
pub trait Sink: Send {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one payload
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, buf: &[u8]) -> Result<usize, SinkError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), SinkError>;

    /// Bound address for listening sinks
    fn local_addr(&self) -> Option<String> {
        None
    }
}

/// Owned, type-erased sink as handed out by the registry
pub type BoxSink = Box<dyn Sink>;

#[async_trait]
impl Sink for BoxSink {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize, SinkError> {
        (**self).write(buf).await
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        (**self).close().await
    }

    fn local_addr(&self) -> Option<String> {
        (**self).local_addr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct VecSink {
        data: Vec<u8>,
        closed: bool,
    }

    #[async_trait]
    impl Sink for VecSink {
        fn name(&self) -> &str {
            "vec"
        }

        async fn write(&mut self, buf: &[u8]) -> Result<usize, SinkError> {
            if self.closed {
                return Err(SinkError::closed("vec"));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        async fn close(&mut self) -> Result<(), SinkError> {
            self.closed = true;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_boxed_sink_forwards() {
        let mut sink: BoxSink = Box::new(VecSink {
            data: Vec::new(),
            closed: false,
        });

        assert_eq!(sink.write(b"abc").await.unwrap(), 3);
        assert_eq!(sink.name(), "vec");
        assert!(sink.local_addr().is_none());
        sink.close().await.unwrap();
        assert!(sink.write(b"x").await.unwrap_err().is_closed());
    }
}
