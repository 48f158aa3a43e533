//! Observability and Metrics
//!
//! Per-connection counters for property and event traffic.
//!
//! Uses atomic counters so callbacks running on any thread can record
//! without taking a lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Metrics collector owned by one connection
#[derive(Debug)]
pub struct Metrics {
    /// Property reads served or requested
    pub property_gets: AtomicU64,
    /// Property writes served or requested
    pub property_sets: AtomicU64,
    /// Property operations that ended in an error
    pub property_errors: AtomicU64,
    /// String getters that asked for a larger buffer
    pub buffer_renegotiations: AtomicU64,
    /// Property requests forwarded to a remote service
    pub remote_requests: AtomicU64,
    /// Remote property requests that hit the access timeout
    pub remote_timeouts: AtomicU64,
    /// Events emitted by this connection
    pub events_sent: AtomicU64,
    /// Events received from the bus
    pub events_received: AtomicU64,
    /// Subscription callbacks invoked
    pub callbacks_invoked: AtomicU64,
    /// Subscription callbacks that returned an error
    pub callback_failures: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            property_gets: AtomicU64::new(0),
            property_sets: AtomicU64::new(0),
            property_errors: AtomicU64::new(0),
            buffer_renegotiations: AtomicU64::new(0),
            remote_requests: AtomicU64::new(0),
            remote_timeouts: AtomicU64::new(0),
            events_sent: AtomicU64::new(0),
            events_received: AtomicU64::new(0),
            callbacks_invoked: AtomicU64::new(0),
            callback_failures: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn property_get(&self) {
        self.property_gets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn property_set(&self) {
        self.property_sets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn property_error(&self) {
        self.property_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn buffer_renegotiation(&self) {
        self.buffer_renegotiations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn remote_request(&self) {
        self.remote_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn remote_timeout(&self) {
        self.remote_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn event_sent(&self) {
        self.events_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn event_received(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one callback invocation and whether it failed
    pub fn callback_invoked(&self, failed: bool) {
        self.callbacks_invoked.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.callback_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            property_gets: self.property_gets.load(Ordering::Relaxed),
            property_sets: self.property_sets.load(Ordering::Relaxed),
            property_errors: self.property_errors.load(Ordering::Relaxed),
            buffer_renegotiations: self.buffer_renegotiations.load(Ordering::Relaxed),
            remote_requests: self.remote_requests.load(Ordering::Relaxed),
            remote_timeouts: self.remote_timeouts.load(Ordering::Relaxed),
            events_sent: self.events_sent.load(Ordering::Relaxed),
            events_received: self.events_received.load(Ordering::Relaxed),
            callbacks_invoked: self.callbacks_invoked.load(Ordering::Relaxed),
            callback_failures: self.callback_failures.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            property_gets = snapshot.property_gets,
            property_sets = snapshot.property_sets,
            property_errors = snapshot.property_errors,
            buffer_renegotiations = snapshot.buffer_renegotiations,
            remote_requests = snapshot.remote_requests,
            remote_timeouts = snapshot.remote_timeouts,
            events_sent = snapshot.events_sent,
            events_received = snapshot.events_received,
            callbacks_invoked = snapshot.callbacks_invoked,
            callback_failures = snapshot.callback_failures,
            uptime_seconds = snapshot.uptime_seconds,
            "Connection metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub property_gets: u64,
    pub property_sets: u64,
    pub property_errors: u64,
    pub buffer_renegotiations: u64,
    pub remote_requests: u64,
    pub remote_timeouts: u64,
    pub events_sent: u64,
    pub events_received: u64,
    pub callbacks_invoked: u64,
    pub callback_failures: u64,
    pub uptime_seconds: u64,
}

/// Timer for measuring operation duration
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
