//! Stream metrics.
//!
//! Provides atomic counters for monitoring stream connections.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Metrics shared by every connection of a stream manager.
#[derive(Debug)]
pub struct StreamMetrics {
    /// Transport open attempts, first connects and reconnects alike.
    open_attempts: AtomicU64,

    /// Open attempts that succeeded.
    opens: AtomicU64,

    /// Open attempts made after a close.
    reconnects: AtomicU64,

    /// Sessions that ended by close or error.
    disconnects: AtomicU64,

    /// Connections terminated by replacement or unsubscribe.
    teardowns: AtomicU64,

    /// Messages delivered to an observer.
    messages_delivered: AtomicU64,

    /// Malformed messages dropped.
    messages_dropped: AtomicU64,

    /// Start time for rate calculation.
    start_time: Instant,
}

impl Default for StreamMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamMetrics {
    /// Creates a new metrics instance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            open_attempts: AtomicU64::new(0),
            opens: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            disconnects: AtomicU64::new(0),
            teardowns: AtomicU64::new(0),
            messages_delivered: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Records an open attempt; `reconnect` marks attempts following a close.
    pub fn record_open_attempt(&self, reconnect: bool) {
        self.open_attempts.fetch_add(1, Ordering::Relaxed);
        if reconnect {
            self.reconnects.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records a successful open.
    pub fn record_open(&self) {
        self.opens.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a session ending.
    pub fn record_disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a connection teardown.
    pub fn record_teardown(&self) {
        self.teardowns.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a delivered message.
    pub fn record_delivered(&self) {
        self.messages_delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a dropped message.
    pub fn record_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns total open attempts.
    #[must_use]
    pub fn open_attempts(&self) -> u64 {
        self.open_attempts.load(Ordering::Relaxed)
    }

    /// Returns successful opens.
    #[must_use]
    pub fn opens(&self) -> u64 {
        self.opens.load(Ordering::Relaxed)
    }

    /// Returns reconnect attempts.
    #[must_use]
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    /// Returns ended sessions.
    #[must_use]
    pub fn disconnects(&self) -> u64 {
        self.disconnects.load(Ordering::Relaxed)
    }

    /// Returns connection teardowns.
    #[must_use]
    pub fn teardowns(&self) -> u64 {
        self.teardowns.load(Ordering::Relaxed)
    }

    /// Returns delivered messages.
    #[must_use]
    pub fn messages_delivered(&self) -> u64 {
        self.messages_delivered.load(Ordering::Relaxed)
    }

    /// Returns dropped messages.
    #[must_use]
    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped.load(Ordering::Relaxed)
    }

    /// Returns the uptime.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns delivered messages per second.
    #[must_use]
    pub fn messages_per_second(&self) -> f64 {
        let elapsed = self.uptime().as_secs_f64();
        if elapsed > 0.0 {
            self.messages_delivered() as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Returns a snapshot of all metrics.
    #[must_use]
    pub fn snapshot(&self) -> StreamMetricsSnapshot {
        StreamMetricsSnapshot {
            open_attempts: self.open_attempts(),
            opens: self.opens(),
            reconnects: self.reconnects(),
            disconnects: self.disconnects(),
            teardowns: self.teardowns(),
            messages_delivered: self.messages_delivered(),
            messages_dropped: self.messages_dropped(),
            uptime: self.uptime(),
            messages_per_second: self.messages_per_second(),
        }
    }
}

/// A point-in-time snapshot of stream metrics.
#[derive(Debug, Clone, Serialize)]
pub struct StreamMetricsSnapshot {
    /// Transport open attempts.
    pub open_attempts: u64,
    /// Successful opens.
    pub opens: u64,
    /// Reconnect attempts.
    pub reconnects: u64,
    /// Ended sessions.
    pub disconnects: u64,
    /// Connection teardowns.
    pub teardowns: u64,
    /// Delivered messages.
    pub messages_delivered: u64,
    /// Dropped messages.
    pub messages_dropped: u64,
    /// Uptime.
    pub uptime: Duration,
    /// Delivered messages per second.
    pub messages_per_second: f64,
}
