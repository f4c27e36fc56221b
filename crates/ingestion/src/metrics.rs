//! Per-source ingestion counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Ingestion metrics
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Readings delivered to the core
    pub samples_received: AtomicU64,

    /// Ticks where the source had nothing (empty frame / `None`)
    pub samples_missing: AtomicU64,

    /// Extra attempts spent in retry loops
    pub read_retries: AtomicU64,

    /// Reads that failed after every retry
    pub read_failures: AtomicU64,
}

impl IngestionMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a delivered reading
    pub fn record_received(&self) {
        self.samples_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a tick without a reading
    pub fn record_missing(&self) {
        self.samples_missing.fetch_add(1, Ordering::Relaxed);
    }

    /// Record retry attempts beyond the first
    pub fn record_retries(&self, extra_attempts: u32) {
        if extra_attempts > 0 {
            self.read_retries
                .fetch_add(u64::from(extra_attempts), Ordering::Relaxed);
        }
    }

    /// Record a read that exhausted its retries
    pub fn record_failure(&self) {
        self.read_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            samples_received: self.samples_received.load(Ordering::Relaxed),
            samples_missing: self.samples_missing.load(Ordering::Relaxed),
            read_retries: self.read_retries.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub samples_received: u64,
    pub samples_missing: u64,
    pub read_retries: u64,
    pub read_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let m = IngestionMetrics::new();
        m.record_received();
        m.record_received();
        m.record_missing();
        m.record_retries(0);
        m.record_retries(2);
        m.record_failure();
        assert_eq!(
            m.snapshot(),
            MetricsSnapshot {
                samples_received: 2,
                samples_missing: 1,
                read_retries: 2,
                read_failures: 1,
            }
        );
    }
}
