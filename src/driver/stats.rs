//! Driver Statistics
//!
//! Cache-line aligned counters updated on every reconciliation.

use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache line size for alignment (64 bytes on most modern CPUs)
pub const CACHE_LINE_SIZE: usize = 64;

/// Cumulative reconciliation counters, aligned to prevent false sharing
#[repr(C, align(64))]
#[derive(Debug)]
pub struct DriverStats {
    /// Reconciliations started
    pub reconciliations: AtomicU64,
    /// Zone operations applied to fabrics
    pub operations_applied: AtomicU64,
    /// Reconciliations skipped because of a pending edit session
    pub skipped_busy: AtomicU64,
    /// Reconciliations that ended in an error
    pub failures: AtomicU64,
    /// Last update timestamp (Unix millis)
    pub last_update_ms: AtomicU64,
    _padding: [u8; 24],
}

const _: () = assert!(std::mem::size_of::<DriverStats>() <= CACHE_LINE_SIZE);

impl Default for DriverStats {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverStats {
    pub fn new() -> Self {
        Self {
            reconciliations: AtomicU64::new(0),
            operations_applied: AtomicU64::new(0),
            skipped_busy: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            last_update_ms: AtomicU64::new(0),
            _padding: [0; 24],
        }
    }

    #[inline]
    pub fn record_started(&self) {
        self.reconciliations.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    #[inline]
    pub fn record_applied(&self, operations: usize) {
        self.operations_applied
            .fetch_add(operations as u64, Ordering::Relaxed);
        self.touch();
    }

    #[inline]
    pub fn record_skipped(&self) {
        self.skipped_busy.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    #[inline]
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    #[inline]
    fn touch(&self) {
        self.last_update_ms
            .store(Utc::now().timestamp_millis() as u64, Ordering::Release);
    }

    /// Create a snapshot of current counters
    pub fn snapshot(&self) -> DriverStatsSnapshot {
        DriverStatsSnapshot {
            reconciliations: self.reconciliations.load(Ordering::Relaxed),
            operations_applied: self.operations_applied.load(Ordering::Relaxed),
            skipped_busy: self.skipped_busy.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of driver counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriverStatsSnapshot {
    pub reconciliations: u64,
    pub operations_applied: u64,
    pub skipped_busy: u64,
    pub failures: u64,
}
