//! Sample decoder
//!
//! Fixed 32-byte little-endian records:
//! `[u32 sample_number][u32 device_timestamp_ms][f32 ax][f32 ay][f32 az][f32 gx][f32 gy][f32 gz]`

use base64::{Engine as _, engine::general_purpose};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use contracts::{ChunkPayload, DeviceId, MotionSample, SAMPLE_RECORD_SIZE};
use tracing::{trace, warn};

use crate::error::{IngestionError, Result};

/// Decoder output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedPayload {
    pub samples: Vec<MotionSample>,

    /// Trailing bytes that did not form a whole record
    pub truncated_bytes: usize,
}

/// Decode raw bytes into samples.
///
/// Produces `len / 32` samples; a partial trailing record is dropped.
pub fn decode_samples(data: &[u8]) -> DecodedPayload {
    let count = data.len() / SAMPLE_RECORD_SIZE;
    let truncated_bytes = data.len() % SAMPLE_RECORD_SIZE;

    let mut buf = &data[..count * SAMPLE_RECORD_SIZE];
    let mut samples = Vec::with_capacity(count);
    while buf.remaining() >= SAMPLE_RECORD_SIZE {
        samples.push(MotionSample {
            sample_number: buf.get_u32_le(),
            device_timestamp_ms: buf.get_u32_le(),
            ax: buf.get_f32_le(),
            ay: buf.get_f32_le(),
            az: buf.get_f32_le(),
            gx: buf.get_f32_le(),
            gy: buf.get_f32_le(),
            gz: buf.get_f32_le(),
        });
    }

    DecodedPayload {
        samples,
        truncated_bytes,
    }
}

/// Decode a chunk payload, resolving its transport encoding first.
pub fn decode_payload(device_id: &DeviceId, payload: Option<&ChunkPayload>) -> Result<DecodedPayload> {
    let decoded = match payload {
        None => {
            return Err(IngestionError::MissingPayload {
                device_id: device_id.to_string(),
            });
        }
        Some(ChunkPayload::Raw(bytes)) => decode_samples(bytes),
        Some(ChunkPayload::Base64(text)) => {
            let raw = general_purpose::STANDARD
                .decode(text.trim())
                .map_err(|e| IngestionError::InvalidEncoding {
                    device_id: device_id.to_string(),
                    message: e.to_string(),
                })?;
            decode_samples(&raw)
        }
    };

    if decoded.truncated_bytes > 0 {
        warn!(
            device_id = %device_id,
            truncated_bytes = decoded.truncated_bytes,
            samples = decoded.samples.len(),
            "payload length is not a multiple of the record size, trailing bytes dropped"
        );
    }
    trace!(device_id = %device_id, samples = decoded.samples.len(), "payload decoded");

    Ok(decoded)
}

/// Encode samples with the same record layout
pub fn encode_samples(samples: &[MotionSample]) -> Bytes {
    let mut buf = BytesMut::with_capacity(samples.len() * SAMPLE_RECORD_SIZE);
    for s in samples {
        buf.put_u32_le(s.sample_number);
        buf.put_u32_le(s.device_timestamp_ms);
        buf.put_f32_le(s.ax);
        buf.put_f32_le(s.ay);
        buf.put_f32_le(s.az);
        buf.put_f32_le(s.gx);
        buf.put_f32_le(s.gy);
        buf.put_f32_le(s.gz);
    }
    buf.freeze()
}

/// Base64 transport form of [`encode_samples`]
pub fn encode_samples_base64(samples: &[MotionSample]) -> String {
    general_purpose::STANDARD.encode(encode_samples(samples))
}
