//! WsSink - WebSocket client, one binary message per write

use async_trait::async_trait;
use contracts::{Sink, SinkError};
use futures::SinkExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, instrument};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WsSink {
    name: &'static str,
    url: String,
    socket: Option<Socket>,
}

impl WsSink {
    /// Complete the WebSocket handshake with `url`
    #[instrument(name = "ws_dial", skip(name))]
    pub async fn connect(name: &'static str, url: &str) -> Result<Self, SinkError> {
        let (socket, response) = connect_async(url)
            .await
            .map_err(|e| SinkError::dial(name, url, e.to_string()))?;

        debug!(status = %response.status(), "WebSocket output connected");
        Ok(Self {
            name,
            url: url.to_string(),
            socket: Some(socket),
        })
    }
}

#[async_trait]
impl Sink for WsSink {
    fn name(&self) -> &str {
        self.name
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize, SinkError> {
        let socket = self
            .socket
            .as_mut()
            .ok_or_else(|| SinkError::closed(self.name))?;
        socket
            .send(Message::Binary(buf.to_vec()))
            .await
            .map_err(|e| SinkError::write(self.name, e.to_string()))?;
        Ok(buf.len())
    }

    #[instrument(name = "ws_sink_close", skip(self), fields(url = %self.url))]
    async fn close(&mut self) -> Result<(), SinkError> {
        let Some(mut socket) = self.socket.take() else {
            return Ok(());
        };
        socket
            .close(None)
            .await
            .map_err(|e| SinkError::write(self.name, e.to_string()))?;
        debug!("WebSocket output closed");
        Ok(())
    }
}
