//! Transport metrics types.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// A serializable snapshot of a transport's counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransportMetrics {
    /// Total number of exchanges issued.
    pub exchanges: u64,

    /// Exchanges that ended with an error.
    pub failed_exchanges: u64,

    /// Exchanges currently streaming.
    pub active_exchanges: u64,

    /// Redirects followed.
    pub redirects: u64,

    /// Total body bytes received.
    pub bytes_received: u64,

    /// Total body chunks received.
    pub chunks_received: u64,

    /// Average time from issuing a request to its response headers, in milliseconds.
    pub average_time_to_headers_ms: f64,
}

/// Lock-free counters updated by a running transport.
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    /// Exchanges issued (atomic counter).
    pub exchanges: AtomicU64,

    /// Failed exchanges (atomic counter).
    pub failed_exchanges: AtomicU64,

    /// Exchanges currently streaming (atomic gauge).
    pub active_exchanges: AtomicU64,

    /// Redirects followed (atomic counter).
    pub redirects: AtomicU64,

    /// Body bytes received (atomic counter).
    pub bytes_received: AtomicU64,

    /// Body chunks received (atomic counter).
    pub chunks_received: AtomicU64,

    /// Exponential moving average of time-to-headers in microseconds.
    avg_time_to_headers_us: AtomicU64,
}

impl AtomicMetrics {
    /// Creates a new `AtomicMetrics` instance with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a body chunk of `len` bytes.
    pub fn record_chunk(&self, len: usize) {
        self.chunks_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(len as u64, Ordering::Relaxed);
    }

    /// Updates the time-to-headers average using an exponential moving average (EMA).
    pub fn update_time_to_headers_us(&self, latency_us: u64) {
        let current = self.avg_time_to_headers_us.load(Ordering::Relaxed);
        let new_avg = if current == 0 {
            latency_us
        } else {
            // EMA with alpha = 0.1; saturating so long-stalled handshakes cannot overflow
            current.saturating_mul(9).saturating_add(latency_us) / 10
        };
        self.avg_time_to_headers_us.store(new_avg, Ordering::Relaxed);
    }

    /// Creates a serializable snapshot from the current atomic values.
    pub fn snapshot(&self) -> TransportMetrics {
        TransportMetrics {
            exchanges: self.exchanges.load(Ordering::Relaxed),
            failed_exchanges: self.failed_exchanges.load(Ordering::Relaxed),
            active_exchanges: self.active_exchanges.load(Ordering::Relaxed),
            redirects: self.redirects.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            chunks_received: self.chunks_received.load(Ordering::Relaxed),
            average_time_to_headers_ms: (self.avg_time_to_headers_us.load(Ordering::Relaxed)
                as f64)
                / 1000.0,
        }
    }

    /// Resets all counters to zero.
    pub fn reset(&self) {
        self.exchanges.store(0, Ordering::Relaxed);
        self.failed_exchanges.store(0, Ordering::Relaxed);
        self.active_exchanges.store(0, Ordering::Relaxed);
        self.redirects.store(0, Ordering::Relaxed);
        self.bytes_received.store(0, Ordering::Relaxed);
        self.chunks_received.store(0, Ordering::Relaxed);
        self.avg_time_to_headers_us.store(0, Ordering::Relaxed);
    }
}
