//! Subscriber - one downstream connection with isolated queue and sender task

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use observability::DropReason;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::broadcaster::Shared;
use crate::transport::BoxConnection;

/// Result of offering a payload to a subscriber queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Enqueue {
    Queued,
    Full,
    Gone,
}

/// Handle to a running subscriber sender
pub(crate) struct Subscriber {
    id: u64,
    peer: String,
    /// Bounded queue feeding the sender task
    tx: mpsc::Sender<Bytes>,
    /// Flipped exactly once, by whoever tears the subscriber down
    alive: Arc<AtomicBool>,
    stop: Arc<Notify>,
    worker_handle: JoinHandle<()>,
}

impl Subscriber {
    /// Create a subscriber and spawn its sender task
    pub(crate) fn spawn(
        id: u64,
        conn: BoxConnection,
        queue_capacity: usize,
        shared: Weak<Shared>,
        shutdown_timeout: Duration,
    ) -> Self {
        let peer = conn.peer().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let alive = Arc::new(AtomicBool::new(true));
        let stop = Arc::new(Notify::new());

        let worker = SenderLoop {
            id,
            conn,
            rx,
            alive: Arc::clone(&alive),
            stop: Arc::clone(&stop),
            shared,
            shutdown_timeout,
        };
        let worker_handle = tokio::spawn(worker.run());

        Self {
            id,
            peer,
            tx,
            alive,
            stop,
            worker_handle,
        }
    }

    pub(crate) fn peer(&self) -> &str {
        &self.peer
    }

    /// Offer a payload without waiting
    pub(crate) fn try_enqueue(&self, payload: Bytes) -> Enqueue {
        match self.tx.try_send(payload) {
            Ok(()) => Enqueue::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => Enqueue::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => Enqueue::Gone,
        }
    }

    /// Mark not-alive and stop the sender at once, dropping its backlog
    ///
    /// Returns true only for the call that performed the transition.
    pub(crate) fn retire(&self) -> bool {
        if self.alive.swap(false, Ordering::AcqRel) {
            self.stop.notify_one();
            true
        } else {
            false
        }
    }

    /// Close the queue and let the sender flush what is already in it
    ///
    /// The sender is stopped only if the queue is not drained within
    /// `timeout`. Returns true for the call that performed the not-alive
    /// transition.
    pub(crate) async fn drain(self, timeout: Duration) -> bool {
        let Self {
            id,
            peer,
            tx,
            alive,
            stop,
            worker_handle,
        } = self;

        let claimed = alive.swap(false, Ordering::AcqRel);
        // Last sender gone: `recv` yields the backlog, then `None`
        drop(tx);

        let mut handle = worker_handle;
        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(subscriber = id, error = ?e, "Sender task panicked"),
            Err(_) => {
                debug!(subscriber = id, peer = %peer, "Backlog not flushed in time, stopping sender");
                stop.notify_one();
                join_worker(id, &peer, handle, timeout).await;
            }
        }
        claimed
    }
}

async fn join_worker(id: u64, peer: &str, mut handle: JoinHandle<()>, timeout: Duration) {
    match tokio::time::timeout(timeout, &mut handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(subscriber = id, error = ?e, "Sender task panicked"),
        Err(_) => {
            warn!(subscriber = id, peer = %peer, "Sender task stuck, aborting");
            handle.abort();
        }
    }
}

struct SenderLoop {
    id: u64,
    conn: BoxConnection,
    rx: mpsc::Receiver<Bytes>,
    alive: Arc<AtomicBool>,
    stop: Arc<Notify>,
    shared: Weak<Shared>,
    shutdown_timeout: Duration,
}

impl SenderLoop {
    /// Drain the queue onto the connection until stopped, closed or broken
    #[instrument(
        name = "subscriber_sender_loop",
        skip(self),
        fields(subscriber = self.id, peer = %self.conn.peer())
    )]
    async fn run(mut self) {
        debug!("Sender started");

        let failure = loop {
            let payload = tokio::select! {
                biased;
                _ = self.stop.notified() => break None,
                next = self.rx.recv() => match next {
                    Some(payload) => payload,
                    None => break None,
                },
            };

            tokio::select! {
                biased;
                _ = self.stop.notified() => break None,
                result = self.conn.send(payload) => {
                    if let Err(e) = result {
                        break Some(e);
                    }
                }
            }
        };

        if let Some(e) = failure {
            debug!(error = %e, "Connection write failed");
            if self.alive.swap(false, Ordering::AcqRel) {
                if let Some(shared) = self.shared.upgrade() {
                    shared.detach(self.id, DropReason::ConnectionError);
                }
            }
        }

        if tokio::time::timeout(self.shutdown_timeout, self.conn.shutdown())
            .await
            .is_err()
        {
            debug!("Connection shutdown timed out");
        }

        debug!("Sender stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Connection;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::io;
    use tokio::time::sleep;

    /// Mock connection for testing
    struct MockConnection {
        received: Arc<Mutex<Vec<Bytes>>>,
        closed: Arc<AtomicBool>,
        should_fail: bool,
        delay_ms: u64,
    }

    impl MockConnection {
        fn new(delay_ms: u64, should_fail: bool) -> (Self, Arc<Mutex<Vec<Bytes>>>, Arc<AtomicBool>) {
            let received = Arc::new(Mutex::new(Vec::new()));
            let closed = Arc::new(AtomicBool::new(false));
            let conn = Self {
                received: Arc::clone(&received),
                closed: Arc::clone(&closed),
                should_fail,
                delay_ms,
            };
            (conn, received, closed)
        }
    }

    #[async_trait]
    impl Connection for MockConnection {
        fn peer(&self) -> &str {
            "mock"
        }

        async fn send(&mut self, payload: Bytes) -> io::Result<()> {
            if self.delay_ms > 0 {
                sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.should_fail {
                return Err(io::Error::from(io::ErrorKind::BrokenPipe));
            }
            self.received.lock().push(payload);
            Ok(())
        }

        async fn shutdown(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_subscriber_delivers_in_order() {
        let (conn, received, closed) = MockConnection::new(0, false);
        let subscriber = Subscriber::spawn(1, Box::new(conn), 10, Weak::new(), Duration::from_secs(1));

        for i in 0..5u8 {
            assert_eq!(subscriber.try_enqueue(Bytes::from(vec![i])), Enqueue::Queued);
        }

        wait_until(|| received.lock().len() == 5).await;
        let got: Vec<u8> = received.lock().iter().map(|b| b[0]).collect();
        assert_eq!(got, vec![0, 1, 2, 3, 4]);

        assert!(subscriber.retire());
        assert!(!subscriber.retire());
        subscriber.drain(Duration::from_secs(1)).await;
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_subscriber_queue_full() {
        let (conn, _received, _closed) = MockConnection::new(100, false);

        // Small queue capacity
        let subscriber = Subscriber::spawn(2, Box::new(conn), 2, Weak::new(), Duration::from_secs(1));

        let outcomes: Vec<Enqueue> = (0..10u8)
            .map(|i| subscriber.try_enqueue(Bytes::from(vec![i])))
            .collect();
        assert!(outcomes.contains(&Enqueue::Full));

        subscriber.retire();
        subscriber.drain(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_subscriber_connection_failure_stops_sender() {
        let (conn, _received, closed) = MockConnection::new(0, true);
        let subscriber = Subscriber::spawn(3, Box::new(conn), 10, Weak::new(), Duration::from_secs(1));

        subscriber.try_enqueue(Bytes::from_static(b"x"));
        wait_until(|| closed.load(Ordering::SeqCst)).await;

        // The sender already claimed the transition
        assert!(!subscriber.retire());
        wait_until(|| subscriber.try_enqueue(Bytes::from_static(b"y")) == Enqueue::Gone).await;
    }

    #[tokio::test]
    async fn test_retire_interrupts_inflight_write() {
        // A write that takes far longer than the test
        let (conn, received, closed) = MockConnection::new(60_000, false);
        let subscriber = Subscriber::spawn(4, Box::new(conn), 10, Weak::new(), Duration::from_secs(1));

        subscriber.try_enqueue(Bytes::from_static(b"stuck"));
        sleep(Duration::from_millis(20)).await;

        assert!(subscriber.retire());
        let start = std::time::Instant::now();
        subscriber.drain(Duration::from_secs(5)).await;

        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(closed.load(Ordering::SeqCst));
        assert!(received.lock().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_drain_flushes_backlog() {
        let (conn, received, closed) = MockConnection::new(0, false);
        let subscriber = Subscriber::spawn(5, Box::new(conn), 10, Weak::new(), Duration::from_secs(1));

        // Queued but the sender has not run yet on this runtime
        for i in 0..3u8 {
            assert_eq!(subscriber.try_enqueue(Bytes::from(vec![i])), Enqueue::Queued);
        }
        assert!(subscriber.drain(Duration::from_secs(1)).await);

        let got: Vec<u8> = received.lock().iter().map(|b| b[0]).collect();
        assert_eq!(got, vec![0, 1, 2]);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_drain_stops_stuck_sender_after_timeout() {
        let (conn, received, closed) = MockConnection::new(60_000, false);
        let subscriber = Subscriber::spawn(6, Box::new(conn), 10, Weak::new(), Duration::from_secs(1));

        subscriber.try_enqueue(Bytes::from_static(b"stuck"));
        let start = std::time::Instant::now();
        subscriber.drain(Duration::from_millis(100)).await;

        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(closed.load(Ordering::SeqCst));
        assert!(received.lock().is_empty());
    }
}
