//! HttpSink - one streaming POST per sink
//!
//! The request is started at construction and its chunked body is fed by
//! `write`. Connection errors therefore surface on the first write or on
//! close, never earlier.

use std::io;

use async_trait::async_trait;
use bytes::Bytes;
use contracts::{Sink, SinkError};
use reqwest::{Body, Client, StatusCode, Url};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, instrument, warn};

type Request = JoinHandle<Result<StatusCode, reqwest::Error>>;

/// Streaming HTTP POST output
///
/// Unlike the socket sinks, `post` does not wait for the connection: it only
/// validates the URL. A refused or unreachable server is reported as
/// `SinkError::Dial` by the first `write` that finds the request gone, or by
/// `close`. A non-2xx response is reported by `close`.
pub struct HttpSink {
    name: &'static str,
    url: String,
    body: Option<mpsc::Sender<io::Result<Bytes>>>,
    request: Option<Request>,
}

impl HttpSink {
    /// Start a streaming POST to `url`
    #[instrument(name = "http_dial", skip(name))]
    pub fn post(name: &'static str, url: &str) -> Result<Self, SinkError> {
        let parsed =
            Url::parse(url).map_err(|e| SinkError::invalid_argument(name, url, e.to_string()))?;
        let client = Client::builder()
            .build()
            .map_err(|e| SinkError::dial(name, url, e.to_string()))?;

        let (body_tx, body_rx) = mpsc::channel::<io::Result<Bytes>>(1);
        let request = client
            .post(parsed)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(Body::wrap_stream(ReceiverStream::new(body_rx)));

        let request = tokio::spawn(async move {
            let response = request.send().await?;
            Ok(response.status())
        });

        debug!("HTTP output started");
        Ok(Self {
            name,
            url: url.to_string(),
            body: Some(body_tx),
            request: Some(request),
        })
    }

    /// Wait for the request and turn its outcome into a sink result
    async fn finish(&mut self) -> Result<(), SinkError> {
        let Some(request) = self.request.take() else {
            return Ok(());
        };
        match request.await {
            Ok(Ok(status)) if status.is_success() => Ok(()),
            Ok(Ok(status)) => Err(SinkError::write(
                self.name,
                format!("{} responded {}", self.url, status),
            )),
            Ok(Err(e)) => Err(SinkError::dial(self.name, &self.url, e.to_string())),
            Err(e) => Err(SinkError::write(self.name, e.to_string())),
        }
    }
}

#[async_trait]
impl Sink for HttpSink {
    fn name(&self) -> &str {
        self.name
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize, SinkError> {
        let body = self
            .body
            .as_ref()
            .ok_or_else(|| SinkError::closed(self.name))?;

        if body.send(Ok(Bytes::copy_from_slice(buf))).await.is_err() {
            // Request ended early; report why
            self.body = None;
            self.finish().await?;
            return Err(SinkError::write(self.name, "request body closed by server"));
        }
        Ok(buf.len())
    }

    #[instrument(name = "http_sink_close", skip(self), fields(url = %self.url))]
    async fn close(&mut self) -> Result<(), SinkError> {
        if self.body.take().is_none() && self.request.is_none() {
            return Ok(());
        }
        let result = self.finish().await;
        if let Err(e) = &result {
            warn!(error = %e, "HTTP output finished with error");
        }
        result
    }
}
