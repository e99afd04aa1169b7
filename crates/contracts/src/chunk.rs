//! Chunk request/outcome contracts
//!
//! A chunk is the unit of ingestion: decoded and processed atomically.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{DeviceId, MappingSource, SessionId, SessionKey, TemperatureReading};

/// Sample payload as delivered by transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChunkPayload {
    /// Raw little-endian sample records
    Raw(Bytes),
    /// Base64 text of the raw records
    Base64(String),
}

/// How the engine should pick the session for a chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionIntent {
    /// Use the device's active session; fail if there is none
    #[default]
    Active,
    /// Use this session id
    Explicit(SessionId),
    /// Create and activate a new session, deactivating any prior one
    StartNew,
}

/// One ingested batch of samples plus optional temperatures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRequest {
    pub device_id: DeviceId,

    #[serde(default)]
    pub intent: SessionIntent,

    /// Caller-side name (file name, upload id); recorded with the step delta
    pub chunk_name: String,

    pub payload: Option<ChunkPayload>,

    /// Temperature readings, one per second
    #[serde(default)]
    pub temp_data: Vec<f64>,

    /// Epoch ms of `temp_data[0]`
    #[serde(default)]
    pub temp_first_timestamp_ms: Option<i64>,

    /// Epoch ms at which `start_sample` was taken
    #[serde(default)]
    pub reference_time_ms: Option<i64>,

    #[serde(default)]
    pub start_sample: Option<u32>,
}

impl ChunkRequest {
    /// Chunk with a raw payload for the device's active session
    pub fn raw(device_id: impl Into<DeviceId>, chunk_name: impl Into<String>, data: Bytes) -> Self {
        Self {
            device_id: device_id.into(),
            intent: SessionIntent::Active,
            chunk_name: chunk_name.into(),
            payload: Some(ChunkPayload::Raw(data)),
            temp_data: Vec::new(),
            temp_first_timestamp_ms: None,
            reference_time_ms: None,
            start_sample: None,
        }
    }

    pub fn with_intent(mut self, intent: SessionIntent) -> Self {
        self.intent = intent;
        self
    }

    pub fn with_reference(mut self, reference_time_ms: i64, start_sample: u32) -> Self {
        self.reference_time_ms = Some(reference_time_ms);
        self.start_sample = Some(start_sample);
        self
    }

    pub fn with_temperatures(mut self, temps: Vec<f64>, first_timestamp_ms: Option<i64>) -> Self {
        self.temp_data = temps;
        self.temp_first_timestamp_ms = first_timestamp_ms;
        self
    }
}

/// Result of processing one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkOutcome {
    /// Session actually used
    pub session_id: SessionId,

    /// Cumulative delta produced by this chunk
    pub steps_in_chunk: u64,

    pub cumulative_steps: u64,

    /// Running steps produced by this chunk (included in `steps_in_chunk`)
    pub running_steps: u64,

    /// Peaks excluded as leg shake in this chunk
    pub shake_removed: u64,

    /// Newly accepted samples (duplicates excluded)
    pub samples_processed: usize,

    /// Session high-water mark after this chunk
    pub last_sample_number: Option<u32>,

    pub temp_avg_c: Option<f64>,

    pub temperature_timeline: Vec<TemperatureReading>,

    pub mapping_source: MappingSource,

    /// Trailing bytes discarded from a non-multiple-of-32 payload
    pub truncated_bytes: usize,
}

/// Persisted per-chunk step delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub device_id: DeviceId,
    pub session_id: SessionId,
    pub chunk_name: String,
    pub steps: u64,
    pub running_steps: u64,
    pub shake_removed: u64,
    pub samples_processed: u64,
    pub first_sample_number: Option<u32>,
    pub last_sample_number: Option<u32>,
    pub temp_avg_c: Option<f64>,
    #[serde(default)]
    pub temperatures: Vec<TemperatureReading>,
}

impl ChunkRecord {
    pub fn session_key(&self) -> SessionKey {
        SessionKey {
            device_id: self.device_id.clone(),
            session_id: self.session_id.clone(),
        }
    }
}

/// Totals reconstructed from persisted chunk records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTotals {
    /// Sum of recorded step deltas
    pub cumulative_steps: u64,
    pub running_steps: u64,
    pub shake_removed: u64,
    /// Highest sample number ever recorded for the session
    pub last_sample_number: Option<u32>,
    pub chunks: u64,
}

impl SessionTotals {
    /// Fold one record into the totals.
    pub fn accumulate(&mut self, record: &ChunkRecord) {
        self.cumulative_steps += record.steps;
        self.running_steps += record.running_steps;
        self.shake_removed += record.shake_removed;
        self.last_sample_number = match (self.last_sample_number, record.last_sample_number) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self.chunks += 1;
    }
}

impl<'a> FromIterator<&'a ChunkRecord> for SessionTotals {
    fn from_iter<I: IntoIterator<Item = &'a ChunkRecord>>(iter: I) -> Self {
        let mut totals = SessionTotals::default();
        for record in iter {
            totals.accumulate(record);
        }
        totals
    }
}

/// Read-only view of a session's in-memory state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub key: SessionKey,
    pub cumulative_steps: u64,
    pub running_steps: u64,
    pub shake_removed: u64,
    pub last_sample_number: Option<u32>,
    /// Detected peaks waiting for the next processing-window flush
    pub pending_peaks: usize,
    /// Whether the snapshot came from resident memory (false = rebuilt from storage)
    pub resident: bool,
}
