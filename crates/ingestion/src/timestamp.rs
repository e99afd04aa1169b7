//! Timestamp mapper
//!
//! Fallback chain: fresh chunk reference -> persisted device mapping -> raw device clock.

use contracts::{MappingSource, MotionSample, TimestampMapping, TimestampedSample};

/// Mapping chosen for one chunk
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedMapping {
    pub mapping: Option<TimestampMapping>,
    pub source: MappingSource,
}

impl ResolvedMapping {
    /// Mapping that should be persisted for the device (only fresh ones)
    pub fn fresh(&self) -> Option<TimestampMapping> {
        match self.source {
            MappingSource::Chunk => self.mapping,
            _ => None,
        }
    }

    /// Wall-clock timestamp for one sample
    pub fn timestamp_of(&self, sample: &MotionSample) -> i64 {
        match &self.mapping {
            Some(mapping) => mapping.timestamp_of(sample.sample_number),
            None => sample.device_timestamp_ms as i64,
        }
    }

    pub fn apply(&self, samples: &[MotionSample]) -> Vec<TimestampedSample> {
        samples
            .iter()
            .map(|s| TimestampedSample {
                sample: *s,
                timestamp_ms: self.timestamp_of(s),
            })
            .collect()
    }
}

/// Sample-number to wall-clock mapper
#[derive(Debug, Clone, Copy)]
pub struct TimestampMapper {
    nominal_period_ms: f64,
}

impl TimestampMapper {
    pub fn new(nominal_period_ms: f64) -> Self {
        Self { nominal_period_ms }
    }

    pub fn nominal_period_ms(&self) -> f64 {
        self.nominal_period_ms
    }

    /// Pick the mapping for a chunk. Never fails.
    ///
    /// A chunk reference counts only when `reference_time_ms > 0` and a start
    /// sample is present.
    pub fn resolve(
        &self,
        reference_time_ms: Option<i64>,
        start_sample: Option<u32>,
        persisted: Option<TimestampMapping>,
    ) -> ResolvedMapping {
        match (reference_time_ms, start_sample) {
            (Some(reference), Some(start)) if reference > 0 => ResolvedMapping {
                mapping: Some(TimestampMapping {
                    start_sample: start,
                    reference_epoch_ms: reference,
                    nominal_period_ms: self.nominal_period_ms,
                }),
                source: MappingSource::Chunk,
            },
            _ => match persisted {
                Some(mapping) => ResolvedMapping {
                    mapping: Some(mapping),
                    source: MappingSource::Persisted,
                },
                None => ResolvedMapping {
                    mapping: None,
                    source: MappingSource::DeviceClock,
                },
            },
        }
    }
}

impl Default for TimestampMapper {
    fn default() -> Self {
        Self::new(10.0)
    }
}
