//! # Capture Counters
//!
//! Lock-free counters updated from every connection's record path and read
//! for end-of-run reporting. None of these drive control decisions.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-Driver counters with atomic updates.
#[derive(Debug, Default)]
pub struct DriverCounters {
    /// Mutations received from all streams
    docs_received: AtomicU64,
    /// System events and events for unsubscribed collections
    sys_or_unsubbed_received: AtomicU64,
    /// Partitions moved to `Completed`
    partitions_completed: AtomicU64,
    /// Errors forwarded to the error channel
    errors_reported: AtomicU64,
    /// Errors swallowed (allowed cause or Driver already stopped)
    errors_suppressed: AtomicU64,
}

impl DriverCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_doc(&self) {
        self.docs_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sys_or_unsubbed(&self) {
        self.sys_or_unsubbed_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_partition_completed(&self) {
        self.partitions_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error_reported(&self) {
        self.errors_reported.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error_suppressed(&self) {
        self.errors_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn docs_received(&self) -> u64 {
        self.docs_received.load(Ordering::Relaxed)
    }

    pub fn sys_or_unsubbed_received(&self) -> u64 {
        self.sys_or_unsubbed_received.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            docs_received: self.docs_received.load(Ordering::Relaxed),
            sys_or_unsubbed_received: self.sys_or_unsubbed_received.load(Ordering::Relaxed),
            partitions_completed: self.partitions_completed.load(Ordering::Relaxed),
            errors_reported: self.errors_reported.load(Ordering::Relaxed),
            errors_suppressed: self.errors_suppressed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`DriverCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub docs_received: u64,
    pub sys_or_unsubbed_received: u64,
    pub partitions_completed: u64,
    pub errors_reported: u64,
    pub errors_suppressed: u64,
}

impl CounterSnapshot {
    /// All events seen on the streams, mutations plus system events.
    pub fn total_events(&self) -> u64 {
        self.docs_received + self.sys_or_unsubbed_received
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_snapshot() {
        let counters = DriverCounters::new();
        counters.record_doc();
        counters.record_doc();
        counters.record_sys_or_unsubbed();
        counters.record_partition_completed();
        counters.record_error_suppressed();

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.docs_received, 2);
        assert_eq!(snapshot.sys_or_unsubbed_received, 1);
        assert_eq!(snapshot.partitions_completed, 1);
        assert_eq!(snapshot.errors_reported, 0);
        assert_eq!(snapshot.errors_suppressed, 1);
        assert_eq!(snapshot.total_events(), 3);
    }

    #[test]
    fn test_concurrent_increments() {
        let counters = Arc::new(DriverCounters::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counters = counters.clone();
                std::thread::spawn(move || {
                    for _ in 0..10_000 {
                        counters.record_doc();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counters.docs_received(), 80_000);
    }
}
