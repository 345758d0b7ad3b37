//! Metrics for casework client operations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Metrics collector for a client instance.
///
/// Counters are atomic so a shared reference can be read while the client is
/// in use.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Total requests made.
    requests_total: AtomicU64,
    /// Failed requests.
    requests_failed: AtomicU64,
    /// Re-logins performed after an auth denial.
    relogins_total: AtomicU64,
    /// Total request latency in microseconds.
    latency_total_us: AtomicU64,
    /// Request count for latency calculation.
    latency_count: AtomicU64,
}

impl Metrics {
    /// Creates a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_relogin(&self) {
        self.relogins_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_latency(&self, duration: Duration) {
        self.latency_total_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.latency_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Gets the total request count.
    pub fn total_requests(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    /// Gets the failed request count.
    pub fn failed_requests(&self) -> u64 {
        self.requests_failed.load(Ordering::Relaxed)
    }

    /// Gets the re-login count.
    pub fn relogins(&self) -> u64 {
        self.relogins_total.load(Ordering::Relaxed)
    }

    /// Gets the average request latency, when any request completed.
    pub fn average_latency(&self) -> Option<Duration> {
        let count = self.latency_count.load(Ordering::Relaxed);
        if count == 0 {
            return None;
        }
        let total = self.latency_total_us.load(Ordering::Relaxed);
        Some(Duration::from_micros(total / count))
    }
}
