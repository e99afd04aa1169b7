//! MotionSample - Decoder output
//!
//! Typed motion samples and the timestamp mapping that places them on the wall clock.

use serde::{Deserialize, Serialize};

/// Size of one encoded sample record on the wire.
pub const SAMPLE_RECORD_SIZE: usize = 32;

/// One accelerometer + gyroscope reading from the device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    /// Device-assigned monotonic sequence number
    pub sample_number: u32,

    /// Device clock (ms since device boot)
    pub device_timestamp_ms: u32,

    pub ax: f32,
    pub ay: f32,
    pub az: f32,
    pub gx: f32,
    pub gy: f32,
    pub gz: f32,
}

impl MotionSample {
    /// Combined acceleration magnitude
    #[inline]
    pub fn accel_magnitude(&self) -> f64 {
        let (x, y, z) = (self.ax as f64, self.ay as f64, self.az as f64);
        (x * x + y * y + z * z).sqrt()
    }
}

/// Motion sample placed on the wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimestampedSample {
    pub sample: MotionSample,

    /// Epoch milliseconds (or raw device ms when no mapping exists)
    pub timestamp_ms: i64,
}

impl TimestampedSample {
    #[inline]
    pub fn sample_number(&self) -> u32 {
        self.sample.sample_number
    }
}

/// Sample-number to wall-clock mapping, owned by the device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimestampMapping {
    /// Sample number observed at `reference_epoch_ms`
    pub start_sample: u32,

    /// Epoch milliseconds of `start_sample`
    pub reference_epoch_ms: i64,

    /// Nominal device sample period (ms)
    pub nominal_period_ms: f64,
}

impl TimestampMapping {
    /// Wall-clock timestamp of a sample number.
    ///
    /// Sample numbers before `start_sample` map to earlier timestamps.
    #[inline]
    pub fn timestamp_of(&self, sample_number: u32) -> i64 {
        let offset = sample_number as i64 - self.start_sample as i64;
        self.reference_epoch_ms + (offset as f64 * self.nominal_period_ms).round() as i64
    }
}

/// Where a chunk's timestamps came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingSource {
    /// Derived from the chunk's own reference time
    Chunk,
    /// Reused from the device's persisted mapping
    Persisted,
    /// Raw device timestamps (no mapping ever seen)
    DeviceClock,
}

/// One temperature reading on the wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureReading {
    pub timestamp_ms: i64,
    pub celsius: f64,
}
