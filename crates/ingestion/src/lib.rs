//! # Ingestion Pipeline
//!
//! Collar chunk ingestion module.
//!
//! Responsibilities:
//! - Decode 32-byte little-endian motion records (raw or base64 transport)
//! - Map sample numbers onto the wall clock
//! - Summarize chunk temperatures into an average and a 1 Hz timeline
//! - Encode and synthesize traces for tests and simulators
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::IngestionPipeline;
//!
//! let pipeline = IngestionPipeline::new(10.0);
//! let prepared = pipeline.prepare(&request, persisted_mapping)?;
//! for sample in &prepared.samples {
//!     println!("{} @ {}", sample.sample_number(), sample.timestamp_ms);
//! }
//! ```

mod decoder;
mod error;
mod stats;
mod pipeline;
mod synth;
mod temperature;
mod timestamp;

// Re-exports
pub use decoder::{
    DecodedPayload, decode_payload, decode_samples, encode_samples, encode_samples_base64,
};
pub use error::{IngestionError, Result};
pub use stats::{IngestionMetrics, MetricsSnapshot};
pub use pipeline::{IngestionPipeline, PreparedChunk};
pub use synth::{MotionProfile, REST_MAGNITUDE, SyntheticMotion};
pub use temperature::{TEMPERATURE_INTERVAL_MS, TemperatureSummary, summarize};
pub use timestamp::{ResolvedMapping, TimestampMapper};
