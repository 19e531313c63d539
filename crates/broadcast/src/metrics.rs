//! Broadcaster metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Metrics for a single listening sink
#[derive(Debug, Default)]
pub struct BroadcastMetrics {
    /// Currently attached subscribers
    active: AtomicUsize,
    /// Total accepted subscribers
    accepted_count: AtomicU64,
    /// Subscribers dropped because their queue was full
    dropped_slow_count: AtomicU64,
    /// Subscribers lost to connection errors
    lost_count: AtomicU64,
    /// Total payloads written by the producer
    payload_count: AtomicU64,
    /// Total payload bytes written by the producer
    byte_count: AtomicU64,
}

impl BroadcastMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current subscriber count
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Set current subscriber count
    pub fn set_active(&self, active: usize) {
        self.active.store(active, Ordering::Relaxed);
    }

    /// Get total accepted count
    pub fn accepted_count(&self) -> u64 {
        self.accepted_count.load(Ordering::Relaxed)
    }

    /// Increment accepted count
    pub fn inc_accepted_count(&self) {
        self.accepted_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get slow-subscriber drop count
    pub fn dropped_slow_count(&self) -> u64 {
        self.dropped_slow_count.load(Ordering::Relaxed)
    }

    /// Increment slow-subscriber drop count
    pub fn inc_dropped_slow_count(&self) {
        self.dropped_slow_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get connection-error loss count
    pub fn lost_count(&self) -> u64 {
        self.lost_count.load(Ordering::Relaxed)
    }

    /// Increment connection-error loss count
    pub fn inc_lost_count(&self) {
        self.lost_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get payload count
    pub fn payload_count(&self) -> u64 {
        self.payload_count.load(Ordering::Relaxed)
    }

    /// Get byte count
    pub fn byte_count(&self) -> u64 {
        self.byte_count.load(Ordering::Relaxed)
    }

    /// Record one producer write
    pub fn record_payload(&self, bytes: usize) {
        self.payload_count.fetch_add(1, Ordering::Relaxed);
        self.byte_count.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active: self.active(),
            accepted_count: self.accepted_count(),
            dropped_slow_count: self.dropped_slow_count(),
            lost_count: self.lost_count(),
            payload_count: self.payload_count(),
            byte_count: self.byte_count(),
        }
    }
}

/// Snapshot of broadcaster metrics (for reporting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub active: usize,
    pub accepted_count: u64,
    pub dropped_slow_count: u64,
    pub lost_count: u64,
    pub payload_count: u64,
    pub byte_count: u64,
}
