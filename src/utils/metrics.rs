//! Observability and Metrics
//!
//! Counters for monitoring the stream transport: connections, packets read
//! and dispatched, and the failures each layer absorbs without stopping.
//!
//! Uses atomic counters for thread-safe metrics collection. One `Metrics`
//! instance is shared as `Arc<Metrics>` by the acceptor, every receiver and
//! the dispatch workers of a server.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Metrics collector for transport operations
#[derive(Debug)]
pub struct Metrics {
    /// Total connections accepted
    pub connections_total: AtomicU64,
    /// Currently open connections
    pub connections_active: AtomicU64,
    /// Packets read off connections
    pub packets_received: AtomicU64,
    /// Packets handed to the packet handler
    pub packets_dispatched: AtomicU64,
    /// Payload bytes read off connections
    pub bytes_received: AtomicU64,
    /// Packet handler failures and panics
    pub handler_errors: AtomicU64,
    /// Receivers that ended on a read failure
    pub connection_errors: AtomicU64,
    /// Failed accept attempts
    pub accept_errors: AtomicU64,
    /// Communication errors reported for identified peers
    pub communication_errors: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
            packets_dispatched: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            handler_errors: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            accept_errors: AtomicU64::new(0),
            communication_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a new connection
    pub fn connection_established(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection closed
    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record a packet read off a connection
    pub fn packet_received(&self, byte_count: u64) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a packet handled without error
    pub fn packet_dispatched(&self) {
        self.packets_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handler_error(&self) {
        self.handler_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_error(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn accept_error(&self) {
        self.accept_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn communication_error(&self) {
        self.communication_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn active_connections(&self) -> u64 {
        self.connections_active.load(Ordering::Relaxed)
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            packets_dispatched: self.packets_dispatched.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            handler_errors: self.handler_errors.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            accept_errors: self.accept_errors.load(Ordering::Relaxed),
            communication_errors: self.communication_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            connections_total = snapshot.connections_total,
            connections_active = snapshot.connections_active,
            packets_received = snapshot.packets_received,
            packets_dispatched = snapshot.packets_dispatched,
            bytes_received = snapshot.bytes_received,
            handler_errors = snapshot.handler_errors,
            connection_errors = snapshot.connection_errors,
            accept_errors = snapshot.accept_errors,
            communication_errors = snapshot.communication_errors,
            uptime_seconds = snapshot.uptime_seconds,
            "Transport metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connections_active: u64,
    pub packets_received: u64,
    pub packets_dispatched: u64,
    pub bytes_received: u64,
    pub handler_errors: u64,
    pub connection_errors: u64,
    pub accept_errors: u64,
    pub communication_errors: u64,
    pub uptime_seconds: u64,
}

/// Timer for measuring operation duration, logged on drop
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_ms = duration.as_millis(),
            "Operation completed"
        );
    }
}
