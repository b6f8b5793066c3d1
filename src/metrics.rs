use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-stage counters.
///
/// A stage template owns one `StageMetrics`; clones share the counters, so
/// every activation of the same template adds to the same totals.
#[derive(Debug, Clone)]
pub struct StageMetrics {
    /// Values taken from the input stream
    received: Arc<AtomicU64>,
    /// Values handed to the output (or, for a buffering stage, to its buffer)
    forwarded: Arc<AtomicU64>,
    /// Values rejected by the stage predicate
    discarded: Arc<AtomicU64>,
    /// Values emitted by a buffering stage after the release delay
    released: Arc<AtomicU64>,
    /// Creation time for throughput calculation
    start_time: Instant,
}

impl StageMetrics {
    /// Create a new metrics collector for a stage
    pub fn new() -> Self {
        Self {
            received: Arc::new(AtomicU64::new(0)),
            forwarded: Arc::new(AtomicU64::new(0)),
            discarded: Arc::new(AtomicU64::new(0)),
            released: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    /// Record a value taken from the input
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a value handed downstream
    pub fn record_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a value rejected by the predicate
    pub fn record_discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a value released from the buffer
    pub fn record_released(&self) {
        self.released.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the total number of values received
    pub fn total_received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Get the total number of values forwarded
    pub fn total_forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    /// Get the total number of values discarded
    pub fn total_discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    /// Get the total number of values released
    pub fn total_released(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }

    /// Forwarded values per second since the stage was created
    pub fn throughput_per_sec(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            0.0
        } else {
            self.total_forwarded() as f64 / elapsed
        }
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            received: self.total_received(),
            forwarded: self.total_forwarded(),
            discarded: self.total_discarded(),
            released: self.total_released(),
            throughput_per_sec: self.throughput_per_sec(),
            elapsed: self.start_time.elapsed(),
        }
    }
}

impl Default for StageMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Values received
    pub received: u64,
    /// Values forwarded
    pub forwarded: u64,
    /// Values discarded
    pub discarded: u64,
    /// Values released by a buffering stage
    pub released: u64,
    /// Forwarded values per second
    pub throughput_per_sec: f64,
    /// Time since the stage was created
    pub elapsed: Duration,
}

impl MetricsSnapshot {
    /// Format metrics as a human-readable string
    pub fn format(&self) -> String {
        format!(
            "Received: {}, Forwarded: {}, Discarded: {}, Released: {}, \
             Throughput: {:.2} items/s, Elapsed: {:.2}s",
            self.received,
            self.forwarded,
            self.discarded,
            self.released,
            self.throughput_per_sec,
            self.elapsed.as_secs_f64()
        )
    }
}
