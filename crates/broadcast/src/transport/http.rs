//! HTTP-mounted adapters (streaming response body and WebSocket upgrade)
//!
//! An axum server owns the socket. Each matching request is turned into a
//! connection and handed to the accept loop over a channel, after which the
//! HTTP framing is irrelevant to broadcasting.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use bytes::Bytes;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use super::{AcceptError, Acceptor, BoxConnection, Connection};

/// Handoff depth between request handlers and the accept loop
const HANDOFF_CAPACITY: usize = 64;

/// How long release waits for the HTTP server to drain
const SERVER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// What a matching request becomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMode {
    /// Long-lived chunked response body
    Stream,
    /// WebSocket, one binary message per payload
    WebSocket,
}

#[derive(Clone)]
struct HttpState {
    handoff: mpsc::Sender<BoxConnection>,
}

/// Accept side backed by an axum server
pub struct HttpAcceptor {
    incoming: mpsc::Receiver<BoxConnection>,
    local_addr: String,
    stop: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<io::Result<()>>>,
}

impl HttpAcceptor {
    /// Bind `address` and mount the handler at `path` (every path if `None`)
    pub async fn bind(address: &str, path: Option<&str>, mode: HttpMode) -> io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        let local_addr = listener.local_addr()?.to_string();

        let (handoff, incoming) = mpsc::channel(HANDOFF_CAPACITY);
        let router = build_router(path, mode, HttpState { handoff });

        let (stop, stopped) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                let _ = stopped.await;
            })
            .await
        });

        Ok(Self {
            incoming,
            local_addr,
            stop: Some(stop),
            server: Some(server),
        })
    }
}

fn build_router(path: Option<&str>, mode: HttpMode, state: HttpState) -> Router {
    let router = match (mode, path) {
        (HttpMode::Stream, Some(path)) => Router::new().route(path, any(stream_handler)),
        (HttpMode::Stream, None) => Router::new().fallback(stream_handler),
        (HttpMode::WebSocket, Some(path)) => Router::new().route(path, any(websocket_handler)),
        (HttpMode::WebSocket, None) => Router::new().fallback(websocket_handler),
    };
    router.with_state(state)
}

#[async_trait]
impl Acceptor for HttpAcceptor {
    async fn accept(&mut self) -> Result<BoxConnection, AcceptError> {
        self.incoming
            .recv()
            .await
            .ok_or_else(|| AcceptError::Fatal("http server stopped".to_string()))
    }

    fn local_addr(&self) -> String {
        self.local_addr.clone()
    }

    async fn release(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.incoming.close();

        let Some(mut server) = self.server.take() else {
            return;
        };
        match tokio::time::timeout(SERVER_DRAIN_TIMEOUT, &mut server).await {
            Ok(Ok(Ok(()))) => debug!(addr = %self.local_addr, "HTTP server stopped"),
            Ok(Ok(Err(e))) => warn!(addr = %self.local_addr, error = %e, "HTTP server error"),
            Ok(Err(e)) => warn!(addr = %self.local_addr, error = ?e, "HTTP server task failed"),
            Err(_) => {
                warn!(addr = %self.local_addr, "HTTP server did not drain, aborting");
                server.abort();
            }
        }
    }
}

async fn stream_handler(
    State(state): State<HttpState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Response {
    let (body_tx, body_rx) = mpsc::channel::<io::Result<Bytes>>(1);
    let conn = BodyConnection {
        body: Some(body_tx),
        peer: peer.to_string(),
    };

    if state.handoff.send(Box::new(conn)).await.is_err() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    (
        [
            (header::CONTENT_TYPE, "application/octet-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(ReceiverStream::new(body_rx)),
    )
        .into_response()
}

async fn websocket_handler(
    State(state): State<HttpState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            warn!(peer = %peer, error = %rejection, "Rejected malformed WebSocket upgrade");
            return rejection.into_response();
        }
    };

    upgrade
        .on_failed_upgrade(move |e| {
            warn!(peer = %peer, error = %e, "WebSocket upgrade failed");
        })
        .on_upgrade(move |socket| async move {
            let conn = WebSocketConnection {
                socket,
                peer: peer.to_string(),
            };
            if state.handoff.send(Box::new(conn)).await.is_err() {
                debug!(peer = %peer, "Listener gone, dropping WebSocket");
            }
        })
}

/// Streaming response body of one HTTP request
struct BodyConnection {
    body: Option<mpsc::Sender<io::Result<Bytes>>>,
    peer: String,
}

#[async_trait]
impl Connection for BodyConnection {
    fn peer(&self) -> &str {
        &self.peer
    }

    async fn send(&mut self, payload: Bytes) -> io::Result<()> {
        let body = self
            .body
            .as_ref()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;
        body.send(Ok(payload))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "http client went away"))
    }

    async fn shutdown(&mut self) {
        // Ending the stream completes the chunked response
        self.body = None;
    }
}

/// Upgraded WebSocket
struct WebSocketConnection {
    socket: WebSocket,
    peer: String,
}

#[async_trait]
impl Connection for WebSocketConnection {
    fn peer(&self) -> &str {
        &self.peer
    }

    async fn send(&mut self, payload: Bytes) -> io::Result<()> {
        self.socket
            .send(Message::Binary(payload.to_vec()))
            .await
            .map_err(io::Error::other)
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.socket.send(Message::Close(None)).await {
            debug!(peer = %self.peer, error = %e, "WebSocket close failed");
        }
    }
}
