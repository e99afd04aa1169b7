//! Decode counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Ingestion metrics
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Chunks decoded successfully
    pub chunks_decoded: AtomicU64,

    /// Samples produced by the decoder
    pub samples_decoded: AtomicU64,

    /// Payloads whose length was not a multiple of the record size
    pub truncated_payloads: AtomicU64,

    /// Missing or undecodable payloads
    pub decode_errors: AtomicU64,
}

impl IngestionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_decoded(&self, samples: usize) {
        self.chunks_decoded.fetch_add(1, Ordering::Relaxed);
        self.samples_decoded
            .fetch_add(samples as u64, Ordering::Relaxed);
    }

    pub fn record_truncated(&self) {
        self.truncated_payloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            chunks_decoded: self.chunks_decoded.load(Ordering::Relaxed),
            samples_decoded: self.samples_decoded.load(Ordering::Relaxed),
            truncated_payloads: self.truncated_payloads.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub chunks_decoded: u64,
    pub samples_decoded: u64,
    pub truncated_payloads: u64,
    pub decode_errors: u64,
}
