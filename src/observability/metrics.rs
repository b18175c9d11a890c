use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters for one scan, shared by the procedures that run it
#[derive(Default)]
pub struct ScanMetrics {
    remote_calls: AtomicU64,
    remote_failures: AtomicU64,
    rows_received: AtomicU64,
    rows_rejected: AtomicU64,
    total_call_latency_us: AtomicU64,
}

/// Point-in-time copy of [`ScanMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub remote_calls: u64,
    pub remote_failures: u64,
    pub rows_received: u64,
    pub rows_rejected: u64,
    pub avg_call_latency_us: u64,
}

impl ScanMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_call(&self) -> Instant {
        Instant::now()
    }

    pub fn finish_call(&self, start: Instant, ok: bool) {
        let latency_us = start.elapsed().as_micros() as u64;
        self.total_call_latency_us
            .fetch_add(latency_us, Ordering::Relaxed);
        self.remote_calls.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.remote_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_rows(&self, received: usize, rejected: usize) {
        self.rows_received
            .fetch_add(received as u64, Ordering::Relaxed);
        self.rows_rejected
            .fetch_add(rejected as u64, Ordering::Relaxed);
    }

    pub fn remote_calls(&self) -> u64 {
        self.remote_calls.load(Ordering::Relaxed)
    }

    pub fn remote_failures(&self) -> u64 {
        self.remote_failures.load(Ordering::Relaxed)
    }

    pub fn avg_call_latency_us(&self) -> u64 {
        let calls = self.remote_calls();
        if calls == 0 {
            return 0;
        }
        self.total_call_latency_us.load(Ordering::Relaxed) / calls
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            remote_calls: self.remote_calls(),
            remote_failures: self.remote_failures(),
            rows_received: self.rows_received.load(Ordering::Relaxed),
            rows_rejected: self.rows_rejected.load(Ordering::Relaxed),
            avg_call_latency_us: self.avg_call_latency_us(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_failures_separately() {
        let metrics = ScanMetrics::new();
        let start = metrics.start_call();
        metrics.finish_call(start, true);
        let start = metrics.start_call();
        metrics.finish_call(start, false);
        metrics.record_rows(10, 3);

        let snap = metrics.snapshot();
        assert_eq!(snap.remote_calls, 2);
        assert_eq!(snap.remote_failures, 1);
        assert_eq!(snap.rows_received, 10);
        assert_eq!(snap.rows_rejected, 3);
    }
}
