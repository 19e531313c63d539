//! Forwarder - cuts the input into frames and writes each frame to every output.
//!
//! An output whose write fails is closed and retired; the run continues as
//! long as one output is left.

use std::future::Future;
use std::time::Instant;

use anyhow::{bail, Result};
use contracts::{BoxSink, Framing, InputConfig, Sink};
use observability::record_output_write_latency_us;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tracing::{debug, info, instrument, warn};

use super::{ForwardStats, OutputStats};

/// One resolved output
pub struct Output {
    pub sink: BoxSink,
    stats: OutputStats,
}

impl Output {
    pub fn new(uri: impl Into<String>, sink: BoxSink) -> Self {
        Self {
            sink,
            stats: OutputStats::new(uri),
        }
    }
}

pub struct Forwarder {
    outputs: Vec<Output>,
    input: InputConfig,
}

impl Forwarder {
    pub fn new(outputs: Vec<Output>, input: InputConfig) -> Self {
        Self { outputs, input }
    }

    /// Forward `reader` until end of input or `shutdown` completes, then
    /// close every output.
    ///
    /// # Errors
    /// Input read failure, or every output having failed.
    #[instrument(name = "forwarder_run", skip_all, fields(outputs = self.outputs.len()))]
    pub async fn run<R, S>(mut self, reader: R, shutdown: S) -> Result<ForwardStats>
    where
        R: AsyncRead + Unpin,
        S: Future<Output = ()>,
    {
        let start = Instant::now();
        let mut stats = ForwardStats::default();

        let result = self.pump(reader, shutdown, &mut stats).await;
        self.close_all().await;

        stats.duration = start.elapsed();
        stats.outputs = self.outputs.into_iter().map(|o| o.stats).collect();

        info!(
            frames = stats.frames_read,
            bytes = stats.bytes_read,
            live_outputs = stats.live_outputs(),
            "Forwarding finished"
        );
        result.map(|()| stats)
    }

    async fn pump<R, S>(&mut self, reader: R, shutdown: S, stats: &mut ForwardStats) -> Result<()>
    where
        R: AsyncRead + Unpin,
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut reader = BufReader::new(reader);
        let mut buf = vec![0u8; self.input.chunk_size];
        let mut line = Vec::new();

        loop {
            let frame: &[u8] = match self.input.framing {
                Framing::Line => {
                    line.clear();
                    let read = tokio::select! {
                        _ = &mut shutdown => {
                            stats.interrupted = true;
                            return Ok(());
                        }
                        read = reader.read_until(b'\n', &mut line) => read?,
                    };
                    if read == 0 {
                        break;
                    }
                    &line
                }
                Framing::Chunk => {
                    let read = tokio::select! {
                        _ = &mut shutdown => {
                            stats.interrupted = true;
                            return Ok(());
                        }
                        read = reader.read(&mut buf) => read?,
                    };
                    if read == 0 {
                        break;
                    }
                    &buf[..read]
                }
            };

            stats.frames_read += 1;
            stats.bytes_read += frame.len() as u64;
            self.broadcast(frame).await;

            if self.outputs.iter().all(|o| o.stats.failed) {
                bail!("all outputs failed");
            }
        }

        debug!("End of input");
        Ok(())
    }

    async fn broadcast(&mut self, frame: &[u8]) {
        for output in self.outputs.iter_mut().filter(|o| !o.stats.failed) {
            let started = Instant::now();
            match output.sink.write(frame).await {
                Ok(written) => {
                    let latency_us = started.elapsed().as_secs_f64() * 1e6;
                    record_output_write_latency_us(&output.stats.uri, latency_us);
                    output.stats.latency_us.push(latency_us);
                    output.stats.writes += 1;
                    output.stats.bytes += written as u64;
                }
                Err(e) => {
                    warn!(output = %output.stats.uri, error = %e, "Output failed, retiring it");
                    output.stats.failed = true;
                    if let Err(e) = output.sink.close().await {
                        debug!(output = %output.stats.uri, error = %e, "Close after failure");
                    }
                }
            }
        }
    }

    async fn close_all(&mut self) {
        for output in self.outputs.iter_mut().filter(|o| !o.stats.failed) {
            if let Err(e) = output.sink.close().await {
                warn!(output = %output.stats.uri, error = %e, "Output close failed");
            }
        }
    }
}
