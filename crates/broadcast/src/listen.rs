//! Listening sink constructors
//!
//! Each binds its transport synchronously (bind errors are returned to the
//! caller) and then starts the accept loop.

use std::path::Path;

use contracts::{ListenConfig, SinkError};
use tracing::instrument;

use crate::address;
use crate::broadcaster::Broadcaster;
use crate::transport::{HttpAcceptor, HttpMode, TcpAcceptor, UnixAcceptor};

/// `tcp-listen://[host]:port`
#[instrument(name = "tcp_listen", skip(config))]
pub async fn tcp_listen(argument: &str, config: &ListenConfig) -> Result<Broadcaster, SinkError> {
    let scheme = "tcp-listen";
    let address = address::socket_address(argument)
        .map_err(|e| SinkError::invalid_argument(scheme, argument, e))?;

    let acceptor = TcpAcceptor::bind(&address, config.tcp_nodelay)
        .await
        .map_err(|e| SinkError::bind(scheme, &address, e))?;

    Ok(Broadcaster::spawn(scheme, acceptor, config.clone()))
}

/// `unix-listen:///path/to.sock`
#[instrument(name = "unix_listen", skip(config))]
pub async fn unix_listen(argument: &str, config: &ListenConfig) -> Result<Broadcaster, SinkError> {
    let scheme = "unix-listen";
    let acceptor =
        UnixAcceptor::bind(Path::new(argument)).map_err(|e| SinkError::bind(scheme, argument, e))?;

    Ok(Broadcaster::spawn(scheme, acceptor, config.clone()))
}

/// `http-listen://[host]:port[/path]`
#[instrument(name = "http_listen", skip(config))]
pub async fn http_listen(argument: &str, config: &ListenConfig) -> Result<Broadcaster, SinkError> {
    mounted("http-listen", argument, HttpMode::Stream, config).await
}

/// `ws-listen://[host]:port[/path]`
#[instrument(name = "ws_listen", skip(config))]
pub async fn ws_listen(argument: &str, config: &ListenConfig) -> Result<Broadcaster, SinkError> {
    mounted("ws-listen", argument, HttpMode::WebSocket, config).await
}

async fn mounted(
    scheme: &str,
    argument: &str,
    mode: HttpMode,
    config: &ListenConfig,
) -> Result<Broadcaster, SinkError> {
    let parsed = address::http_address(argument)
        .map_err(|e| SinkError::invalid_argument(scheme, argument, e))?;

    let acceptor = HttpAcceptor::bind(&parsed.address, parsed.path.as_deref(), mode)
        .await
        .map_err(|e| SinkError::bind(scheme, &parsed.address, e))?;

    Ok(Broadcaster::spawn(scheme, acceptor, config.clone()))
}
