//! Ingestion Pipeline main entry

use std::sync::Arc;

use contracts::{ChunkRequest, MappingSource, TimestampMapping, TimestampedSample};
use tracing::{debug, instrument};

use crate::decoder::decode_payload;
use crate::error::Result;
use crate::stats::IngestionMetrics;
use crate::temperature::{TemperatureSummary, summarize};
use crate::timestamp::{ResolvedMapping, TimestampMapper};

/// A decoded, wall-clock mapped chunk ready for the step engine
#[derive(Debug, Clone)]
pub struct PreparedChunk {
    /// Samples in payload order (not yet de-duplicated)
    pub samples: Vec<TimestampedSample>,

    pub mapping: ResolvedMapping,

    pub temperature: TemperatureSummary,

    /// Trailing bytes dropped by the decoder
    pub truncated_bytes: usize,
}

impl PreparedChunk {
    pub fn mapping_source(&self) -> MappingSource {
        self.mapping.source
    }

    /// Mapping to persist for the device, if the chunk carried a fresh reference
    pub fn fresh_mapping(&self) -> Option<TimestampMapping> {
        self.mapping.fresh()
    }
}

/// Ingestion Pipeline
///
/// Decode -> timestamp map -> temperature summary. Stateless apart from metrics;
/// the persisted device mapping is supplied by the caller.
#[derive(Debug, Clone)]
pub struct IngestionPipeline {
    mapper: TimestampMapper,

    /// Shared metrics
    metrics: Arc<IngestionMetrics>,
}

impl IngestionPipeline {
    pub fn new(nominal_period_ms: f64) -> Self {
        Self {
            mapper: TimestampMapper::new(nominal_period_ms),
            metrics: Arc::new(IngestionMetrics::new()),
        }
    }

    /// Prepare one chunk
    ///
    /// Fails only when the payload is absent or its encoding is invalid.
    #[instrument(
        name = "ingestion_prepare_chunk",
        skip(self, request, persisted_mapping),
        fields(device_id = %request.device_id, chunk = %request.chunk_name)
    )]
    pub fn prepare(
        &self,
        request: &ChunkRequest,
        persisted_mapping: Option<TimestampMapping>,
    ) -> Result<PreparedChunk> {
        let decoded = decode_payload(&request.device_id, request.payload.as_ref())
            .inspect_err(|_| self.metrics.record_decode_error())?;

        self.metrics.record_decoded(decoded.samples.len());
        if decoded.truncated_bytes > 0 {
            self.metrics.record_truncated();
            metrics::counter!("collar_steps_truncated_payloads_total").increment(1);
        }

        let mapping = self.mapper.resolve(
            request.reference_time_ms,
            request.start_sample,
            persisted_mapping,
        );
        let samples = mapping.apply(&decoded.samples);

        let temperature = summarize(
            &request.temp_data,
            request.temp_first_timestamp_ms,
            samples.first().map(|s| s.timestamp_ms),
        );

        debug!(
            samples = samples.len(),
            mapping_source = ?mapping.source,
            temperatures = request.temp_data.len(),
            "chunk prepared"
        );

        Ok(PreparedChunk {
            samples,
            mapping,
            temperature,
            truncated_bytes: decoded.truncated_bytes,
        })
    }

    pub fn mapper(&self) -> &TimestampMapper {
        &self.mapper
    }

    /// Get metrics reference
    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }
}

impl Default for IngestionPipeline {
    fn default() -> Self {
        Self::new(TimestampMapper::default().nominal_period_ms())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::encode_samples;
    use crate::synth::SyntheticMotion;
    use bytes::Bytes;
    use contracts::ChunkPayload;

    fn make_request(samples: usize) -> ChunkRequest {
        let motion = SyntheticMotion::new(50).rest(samples).build();
        ChunkRequest::raw("collar-01", "chunk-0001.bin", encode_samples(&motion))
    }

    #[test]
    fn test_prepare_with_fresh_reference() {
        let pipeline = IngestionPipeline::default();
        let request = make_request(4)
            .with_reference(1_700_000_000_000, 50)
            .with_temperatures(vec![38.0, 39.0], None);

        let prepared = pipeline.prepare(&request, None).unwrap();
        assert_eq!(prepared.samples.len(), 4);
        assert_eq!(prepared.mapping_source(), MappingSource::Chunk);
        assert_eq!(prepared.samples[2].timestamp_ms, 1_700_000_000_020);
        assert_eq!(prepared.temperature.avg_c, Some(38.5));
        assert_eq!(
            prepared.temperature.timeline[1].timestamp_ms,
            1_700_000_001_000
        );
        assert!(prepared.fresh_mapping().is_some());
    }

    #[test]
    fn test_prepare_counts_truncation() {
        let pipeline = IngestionPipeline::default();
        let mut raw = encode_samples(&SyntheticMotion::new(0).rest(2).build()).to_vec();
        raw.extend_from_slice(&[0u8; 5]);
        let request = ChunkRequest::raw("collar-01", "odd.bin", Bytes::from(raw));

        let prepared = pipeline.prepare(&request, None).unwrap();
        assert_eq!(prepared.samples.len(), 2);
        assert_eq!(prepared.truncated_bytes, 5);
        assert_eq!(prepared.mapping_source(), MappingSource::DeviceClock);

        let snapshot = pipeline.metrics().snapshot();
        assert_eq!(snapshot.truncated_payloads, 1);
        assert_eq!(snapshot.samples_decoded, 2);
    }

    #[test]
    fn test_prepare_rejects_missing_payload() {
        let pipeline = IngestionPipeline::default();
        let mut request = make_request(1);
        request.payload = None;
        assert!(pipeline.prepare(&request, None).is_err());

        request.payload = Some(ChunkPayload::Base64("%%%".into()));
        assert!(pipeline.prepare(&request, None).is_err());
        assert_eq!(pipeline.metrics().snapshot().decode_errors, 2);
    }
}
