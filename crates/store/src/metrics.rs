//! Store metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one store instance
#[derive(Debug, Default)]
pub struct StoreMetrics {
    /// Chunk records appended
    records_written: AtomicU64,
    /// Ledger folds (session_totals calls)
    ledger_reads: AtomicU64,
    /// Params / mapping / session index writes
    state_writes: AtomicU64,
    /// Failed operations
    failure_count: AtomicU64,
}

impl StoreMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records_written(&self) -> u64 {
        self.records_written.load(Ordering::Relaxed)
    }

    pub fn inc_records_written(&self) {
        self.records_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ledger_reads(&self) -> u64 {
        self.ledger_reads.load(Ordering::Relaxed)
    }

    pub fn inc_ledger_reads(&self) {
        self.ledger_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn state_writes(&self) -> u64 {
        self.state_writes.load(Ordering::Relaxed)
    }

    pub fn inc_state_writes(&self) {
        self.state_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Track a result, counting failures
    pub fn observe<T, E>(&self, result: std::result::Result<T, E>) -> std::result::Result<T, E> {
        if result.is_err() {
            self.inc_failure_count();
        }
        result
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_written: self.records_written(),
            ledger_reads: self.ledger_reads(),
            state_writes: self.state_writes(),
            failure_count: self.failure_count(),
        }
    }
}

/// Snapshot of store metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_written: u64,
    pub ledger_reads: u64,
    pub state_writes: u64,
    pub failure_count: u64,
}
