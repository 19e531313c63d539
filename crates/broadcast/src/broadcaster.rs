//! Broadcaster - fan-out core shared by every listening sink

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use contracts::{ListenConfig, Sink, SinkError};
use futures::future::join_all;
use observability::DropReason;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::metrics::BroadcastMetrics;
use crate::subscriber::{Enqueue, Subscriber};
use crate::transport::{AcceptError, Acceptor, BoxConnection};

/// Pause after a transient accept error
const ACCEPT_BACKOFF: Duration = Duration::from_millis(10);

struct State {
    subscribers: HashMap<u64, Subscriber>,
    closed: bool,
    /// Set when the accept loop died
    failure: Option<String>,
}

/// State shared between the producer, the accept task and sender tasks
pub(crate) struct Shared {
    name: String,
    state: Mutex<State>,
    metrics: Arc<BroadcastMetrics>,
    next_id: AtomicU64,
    config: ListenConfig,
}

impl Shared {
    fn closed_error(&self, state: &State) -> SinkError {
        match &state.failure {
            Some(cause) => SinkError::ListenerFailed {
                sink_name: self.name.clone(),
                cause: cause.clone(),
            },
            None => SinkError::closed(&self.name),
        }
    }

    /// Enqueue a copy of `payload` for every live subscriber
    fn broadcast(&self, payload: Bytes) -> Result<usize, SinkError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(self.closed_error(&state));
        }

        let mut overflowed = Vec::new();
        let mut gone = Vec::new();
        let mut delivered = 0usize;

        for (id, subscriber) in &state.subscribers {
            match subscriber.try_enqueue(payload.clone()) {
                Enqueue::Queued => delivered += 1,
                Enqueue::Full => overflowed.push(*id),
                Enqueue::Gone => gone.push(*id),
            }
        }

        for id in overflowed {
            let Some(subscriber) = state.subscribers.remove(&id) else {
                continue;
            };
            if subscriber.retire() {
                self.metrics.inc_dropped_slow_count();
                observability::record_subscriber_dropped(&self.name, DropReason::QueueFull);
                warn!(
                    sink = %self.name,
                    subscriber = id,
                    peer = %subscriber.peer(),
                    capacity = self.config.queue_capacity,
                    "Queue full, dropping slow subscriber"
                );
            }
        }
        for id in gone {
            state.subscribers.remove(&id);
        }

        self.metrics.set_active(state.subscribers.len());
        self.metrics.record_payload(payload.len());
        observability::record_bytes_broadcast(&self.name, payload.len(), delivered);

        Ok(delivered)
    }

    /// Add a freshly accepted connection
    fn attach(self: &Arc<Self>, conn: BoxConnection) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock();
        if state.closed {
            debug!(sink = %self.name, peer = %conn.peer(), "Closed, refusing connection");
            return;
        }

        let subscriber = Subscriber::spawn(
            id,
            conn,
            self.config.queue_capacity,
            Arc::downgrade(self),
            self.config.shutdown_timeout(),
        );

        info!(
            sink = %self.name,
            subscriber = id,
            peer = %subscriber.peer(),
            subscribers = state.subscribers.len() + 1,
            "Subscriber added"
        );

        state.subscribers.insert(id, subscriber);
        self.metrics.inc_accepted_count();
        self.metrics.set_active(state.subscribers.len());
        observability::record_subscriber_accepted(&self.name);
    }

    /// Remove a subscriber whose sender gave up
    pub(crate) fn detach(&self, id: u64, reason: DropReason) {
        let mut state = self.state.lock();
        if let Some(subscriber) = state.subscribers.remove(&id) {
            let lost = SinkError::SubscriberLost {
                subscriber_id: id,
                reason: reason.as_str().to_string(),
            };
            info!(sink = %self.name, peer = %subscriber.peer(), error = %lost, "Subscriber removed");
        }
        if reason == DropReason::ConnectionError {
            self.metrics.inc_lost_count();
        }
        self.metrics.set_active(state.subscribers.len());
        observability::record_subscriber_dropped(&self.name, reason);
    }

    /// Mark closed and hand back every subscriber, still running
    fn shut_down(&self, failure: Option<String>) -> Vec<Subscriber> {
        let mut state = self.state.lock();
        state.closed = true;
        if state.failure.is_none() {
            state.failure = failure;
        }

        let subscribers: Vec<Subscriber> = state.subscribers.drain().map(|(_, s)| s).collect();
        self.metrics.set_active(0);
        subscribers
    }

    /// Flush every subscriber's backlog concurrently, bounded by the shutdown timeout
    async fn drain_all(&self, subscribers: Vec<Subscriber>) {
        let timeout = self.config.shutdown_timeout();
        let claimed = join_all(subscribers.into_iter().map(|s| s.drain(timeout))).await;
        for _ in claimed.into_iter().filter(|claimed| *claimed) {
            observability::record_subscriber_dropped(&self.name, DropReason::Shutdown);
        }
    }
}

/// Listening sink: every write is replicated to all connected subscribers
///
/// Subscribers that cannot keep up (queue full) are disconnected; the
/// producer never waits on network I/O.
pub struct Broadcaster {
    shared: Arc<Shared>,
    local_addr: String,
    shutdown_tx: watch::Sender<bool>,
    accept_handle: Option<JoinHandle<()>>,
}

impl Broadcaster {
    /// Start broadcasting to connections produced by `acceptor`
    pub fn spawn<A: Acceptor>(name: impl Into<String>, acceptor: A, config: ListenConfig) -> Self {
        let name = name.into();
        let local_addr = acceptor.local_addr();

        let shared = Arc::new(Shared {
            name: name.clone(),
            state: Mutex::new(State {
                subscribers: HashMap::new(),
                closed: false,
                failure: None,
            }),
            metrics: Arc::new(BroadcastMetrics::new()),
            next_id: AtomicU64::new(1),
            config,
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let accept_handle = tokio::spawn(accept_loop(acceptor, Arc::clone(&shared), shutdown_rx));

        info!(sink = %name, addr = %local_addr, "Listening");

        Self {
            shared,
            local_addr,
            shutdown_tx,
            accept_handle: Some(accept_handle),
        }
    }

    /// Number of currently attached subscribers
    pub fn subscriber_count(&self) -> usize {
        self.shared.state.lock().subscribers.len()
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<BroadcastMetrics> {
        &self.shared.metrics
    }

    /// Whether the broadcaster stopped accepting writes
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Why the accept loop stopped, if it failed
    pub fn failure(&self) -> Option<String> {
        self.shared.state.lock().failure.clone()
    }

    /// Broadcast an already shared payload
    ///
    /// Returns the number of subscribers it was queued for.
    pub fn send(&self, payload: Bytes) -> Result<usize, SinkError> {
        let start = Instant::now();
        let result = self.shared.broadcast(payload);
        observability::record_write_latency_us(
            &self.shared.name,
            start.elapsed().as_secs_f64() * 1_000_000.0,
        );
        result
    }

    /// Flush queued payloads, disconnect every subscriber and release the listener
    ///
    /// Payloads accepted by `write` before the close are still delivered,
    /// unless a subscriber cannot take them within the shutdown timeout.
    #[instrument(name = "broadcaster_close", skip(self), fields(sink = %self.shared.name))]
    pub async fn shutdown(&mut self) -> Result<(), SinkError> {
        let Some(accept_handle) = self.accept_handle.take() else {
            return Ok(());
        };

        let subscribers = self.shared.shut_down(None);
        let _ = self.shutdown_tx.send(true);

        let count = subscribers.len();
        self.shared.drain_all(subscribers).await;

        let timeout = self.shared.config.shutdown_timeout();
        let mut accept_handle = accept_handle;
        match tokio::time::timeout(timeout, &mut accept_handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = ?e, "Accept task panicked"),
            Err(_) => {
                warn!("Accept task did not stop, aborting");
                accept_handle.abort();
            }
        }

        info!(subscribers = count, "Broadcaster closed");
        Ok(())
    }
}

#[async_trait]
impl Sink for Broadcaster {
    fn name(&self) -> &str {
        &self.shared.name
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize, SinkError> {
        self.send(Bytes::copy_from_slice(buf))?;
        Ok(buf.len())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        self.shutdown().await
    }

    fn local_addr(&self) -> Option<String> {
        Some(self.local_addr.clone())
    }
}

impl Drop for Broadcaster {
    fn drop(&mut self) {
        if self.accept_handle.is_some() {
            // Dropped without close: stop every task, don't wait
            for subscriber in self.shared.shut_down(None) {
                if subscriber.retire() {
                    observability::record_subscriber_dropped(&self.shared.name, DropReason::Shutdown);
                }
            }
            let _ = self.shutdown_tx.send(true);
        }
    }
}

/// Accept connections until shut down or the listener breaks
#[instrument(name = "broadcaster_accept_loop", skip_all, fields(sink = %shared.name))]
async fn accept_loop<A: Acceptor>(
    mut acceptor: A,
    shared: Arc<Shared>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            accepted = acceptor.accept() => match accepted {
                Ok(conn) => shared.attach(conn),
                Err(AcceptError::Transient(e)) => {
                    warn!(error = %e, "Accept failed, continuing");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
                Err(AcceptError::Fatal(e)) => {
                    error!(error = %e, "Listener failed, shutting down");
                    let subscribers = shared.shut_down(Some(e));
                    let shared = Arc::clone(&shared);
                    tokio::spawn(async move { shared.drain_all(subscribers).await });
                    break;
                }
            },
        }
    }

    acceptor.release().await;
    debug!("Listener released");
}
