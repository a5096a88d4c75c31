//! Metrics collection for kernel dispatch monitoring.

use hdrhistogram::Histogram;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Per-run kernel metrics collector
#[derive(Debug)]
pub struct KernelMetrics {
    // Dispatch counters
    dispatches: AtomicU64,
    verify_failures: AtomicU64,

    // Transfer volume
    bytes_written: AtomicU64,
    bytes_read: AtomicU64,

    // Latency histogram (protected by RwLock for interior mutability)
    latency_histogram: RwLock<Histogram<u64>>,

    // Creation time
    start_time: Instant,
}

impl KernelMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        // Create histogram with 3 significant figures and max value of 1 hour in nanoseconds
        let histogram =
            Histogram::new_with_max(3_600_000_000_000, 3).expect("Failed to create histogram");

        Self {
            dispatches: AtomicU64::new(0),
            verify_failures: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
            latency_histogram: RwLock::new(histogram),
            start_time: Instant::now(),
        }
    }

    /// Record a completed dispatch with its duration
    pub fn record_dispatch(&self, duration_ns: u64) {
        self.dispatches.fetch_add(1, Ordering::Relaxed);

        if let Some(mut hist) = self.latency_histogram.try_write() {
            let _ = hist.record(duration_ns);
        }
    }

    /// Record a verification failure
    pub fn record_verify_failure(&self) {
        self.verify_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record bytes uploaded to the device
    pub fn record_write(&self, bytes: usize) {
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record bytes read back from the device
    pub fn record_read(&self, bytes: usize) {
        self.bytes_read.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let histogram = self.latency_histogram.read();

        MetricsSnapshot {
            uptime: self.start_time.elapsed(),
            dispatches: self.dispatches.load(Ordering::Relaxed),
            verify_failures: self.verify_failures.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            avg_latency_ns: if histogram.len() > 0 {
                histogram.mean() as u64
            } else {
                0
            },
            p50_latency_ns: histogram.value_at_quantile(0.50),
            p95_latency_ns: histogram.value_at_quantile(0.95),
            p99_latency_ns: histogram.value_at_quantile(0.99),
            max_latency_ns: histogram.max(),
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        self.dispatches.store(0, Ordering::Relaxed);
        self.verify_failures.store(0, Ordering::Relaxed);
        self.bytes_written.store(0, Ordering::Relaxed);
        self.bytes_read.store(0, Ordering::Relaxed);

        if let Some(mut hist) = self.latency_histogram.try_write() {
            hist.reset();
        }
    }
}

impl Default for KernelMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub uptime: std::time::Duration,
    pub dispatches: u64,
    pub verify_failures: u64,
    pub bytes_written: u64,
    pub bytes_read: u64,
    pub avg_latency_ns: u64,
    pub p50_latency_ns: u64,
    pub p95_latency_ns: u64,
    pub p99_latency_ns: u64,
    pub max_latency_ns: u64,
}

impl MetricsSnapshot {
    /// Calculate dispatches per second
    pub fn dispatches_per_second(&self) -> f64 {
        let seconds = self.uptime.as_secs_f64();
        if seconds == 0.0 {
            return 0.0;
        }
        self.dispatches as f64 / seconds
    }

    /// Total bytes moved between host and device
    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_written + self.bytes_read
    }
}
