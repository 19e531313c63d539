//! # Broadcast
//!
//! Listening sinks: one written byte stream fanned out to every connected
//! downstream consumer.
//!
//! 负责：
//! - 接入下游连接 (TCP / Unix / WebSocket / HTTP)
//! - Fan-out 到所有订阅者
//! - 隔离慢订阅者，不阻塞生产者
//!
//! # Architecture
//!
//! ```text
//!   producer ──write()──► Broadcaster ──try_send──► [queue] ─► sender task ─► conn
//!                              ▲        └─try_send──► [queue] ─► sender task ─► conn
//!                              │
//!                        accept task ◄── Acceptor (tcp / unix / ws / http)
//! ```
//!
//! Payloads are `bytes::Bytes`, so every subscriber queue shares one
//! allocation per write.

pub mod address;
pub mod broadcaster;
pub mod listen;
pub mod metrics;
mod subscriber;
pub mod transport;

pub use broadcaster::Broadcaster;
pub use contracts::{ListenConfig, Sink, SinkError};
pub use listen::{http_listen, tcp_listen, unix_listen, ws_listen};
pub use metrics::{BroadcastMetrics, MetricsSnapshot};
pub use transport::{AcceptError, Acceptor, BoxConnection, Connection};
