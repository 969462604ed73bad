//! Flush statistics
//!
//! Counters are updated outside the buffer lock, so a snapshot taken while
//! flushes are running is approximate across fields.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Point-in-time view of flush activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushStats {
    /// Flushes that reached the store successfully
    pub flushes: u64,
    /// Events written to the store
    pub events_persisted: u64,
    /// Flushes that failed
    pub failed_flushes: u64,
    /// Events put back into the buffer after a retryable failure
    pub events_requeued: u64,
    /// Events lost to non-retryable failures
    pub events_dropped: u64,
    /// Events currently waiting in the buffer
    pub buffered: usize,
}

#[derive(Debug, Default)]
pub(super) struct FlushCounters {
    flushes: AtomicU64,
    events_persisted: AtomicU64,
    failed_flushes: AtomicU64,
    events_requeued: AtomicU64,
    events_dropped: AtomicU64,
}

impl FlushCounters {
    pub(super) fn record_success(&self, events: usize) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.events_persisted.fetch_add(events as u64, Ordering::Relaxed);
    }

    pub(super) fn record_requeue(&self, events: usize) {
        self.failed_flushes.fetch_add(1, Ordering::Relaxed);
        self.events_requeued.fetch_add(events as u64, Ordering::Relaxed);
    }

    pub(super) fn record_drop(&self, events: usize) {
        self.failed_flushes.fetch_add(1, Ordering::Relaxed);
        self.events_dropped.fetch_add(events as u64, Ordering::Relaxed);
    }

    pub(super) fn snapshot(&self, buffered: usize) -> FlushStats {
        FlushStats {
            flushes: self.flushes.load(Ordering::Relaxed),
            events_persisted: self.events_persisted.load(Ordering::Relaxed),
            failed_flushes: self.failed_flushes.load(Ordering::Relaxed),
            events_requeued: self.events_requeued.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            buffered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_snapshot() {
        let counters = FlushCounters::default();
        counters.record_success(4);
        counters.record_success(2);
        counters.record_requeue(3);
        counters.record_drop(1);

        let stats = counters.snapshot(5);
        assert_eq!(stats.flushes, 2);
        assert_eq!(stats.events_persisted, 6);
        assert_eq!(stats.failed_flushes, 2);
        assert_eq!(stats.events_requeued, 3);
        assert_eq!(stats.events_dropped, 1);
        assert_eq!(stats.buffered, 5);
    }

    #[test]
    fn test_stats_serialize() {
        let json = serde_json::to_string(&FlushStats::default()).unwrap();
        assert!(json.contains("\"events_persisted\":0"));
    }
}
