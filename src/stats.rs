use crate::payload::extract_timestamp;
use serde_json::Value;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Counters shared by every simulated client, the ramp and the reporter.
///
/// All updates are single atomic operations, so event callbacks running on
/// different worker threads never lose increments.
#[derive(Debug, Default)]
pub struct Metrics {
    connected: AtomicU64,
    connect_failures: AtomicU64,
    events_total: AtomicU64,
    events_in_window: AtomicU64,
    events_reported: AtomicU64,
    latency_count: AtomicU64,
    latency_sum: AtomicI64,
    latency_max: AtomicI64,
    timestamp_misses: AtomicU64,
}

/// Point-in-time copy of the cumulative counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connected: u64,
    pub connect_failures: u64,
    pub events_total: u64,
    /// Sum of every closed window, i.e. what the reports have accounted for.
    pub events_reported: u64,
    pub latency_count: u64,
    pub latency_sum: i64,
    pub latency_max: i64,
    pub timestamp_misses: u64,
}

impl MetricsSnapshot {
    /// Mean lag rounded to whole milliseconds, `None` before the first sample.
    pub fn average_lag(&self) -> Option<i64> {
        if self.latency_count == 0 {
            return None;
        }
        let mean = self.latency_sum as f64 / self.latency_count as f64;
        // Half-way values round toward positive infinity.
        Some((mean + 0.5).floor() as i64)
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_connect(&self) {
        self.connected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connect_failure(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Single entry point for every inbound event, whatever its name.
    pub fn record_event(&self, payload: &Value, now_millis: i64) {
        self.events_total.fetch_add(1, Ordering::Relaxed);
        self.events_in_window.fetch_add(1, Ordering::Relaxed);
        self.record_latency(payload, now_millis);
    }

    pub fn record_latency(&self, payload: &Value, now_millis: i64) {
        match extract_timestamp(payload) {
            Some(ts) => self.record_lag((now_millis as f64 - ts).round() as i64),
            None => {
                self.timestamp_misses.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Negative lag (clock skew) counts toward the sum but can never raise
    /// the max, which starts at zero.
    pub fn record_lag(&self, lag: i64) {
        self.latency_count.fetch_add(1, Ordering::Relaxed);
        let _ = self
            .latency_sum
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |sum| {
                Some(sum.saturating_add(lag))
            });
        self.latency_max.fetch_max(lag, Ordering::Relaxed);
    }

    /// Events seen since the previous call; resets the window to zero.
    pub fn tick_window(&self) -> u64 {
        let window = self.events_in_window.swap(0, Ordering::AcqRel);
        self.events_reported.fetch_add(window, Ordering::AcqRel);
        window
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connected: self.connected.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            events_total: self.events_total.load(Ordering::Relaxed),
            events_reported: self.events_reported.load(Ordering::Acquire),
            latency_count: self.latency_count.load(Ordering::Relaxed),
            latency_sum: self.latency_sum.load(Ordering::Relaxed),
            latency_max: self.latency_max.load(Ordering::Relaxed),
            timestamp_misses: self.timestamp_misses.load(Ordering::Relaxed),
        }
    }
}
