//! Synthetic motion source
//!
//! Deterministic collar traces for tests, simulators and the `synth` command.
//! Each segment drives the acceleration magnitude as
//! `base + amplitude * sin(2πk / period)` on the z axis and gyroscope X as
//! `gyro_amplitude * cos(2πk / period)`.

use std::f64::consts::PI;

use contracts::MotionSample;

/// Resting magnitude (gravity only)
pub const REST_MAGNITUDE: f64 = 9.8;

/// Periodic motion pattern
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionProfile {
    pub base: f64,
    pub amplitude: f64,
    /// Samples per cycle
    pub period: usize,
    pub gyro_amplitude: f64,
}

impl MotionProfile {
    /// Walking gait, raw peaks at 15.5 m/s²
    pub const WALK: Self = Self {
        base: 11.0,
        amplitude: 4.5,
        period: 16,
        gyro_amplitude: 0.2,
    };

    /// Running gait, raw peaks at 25 m/s² with shallow valleys
    pub const RUN: Self = Self {
        base: 16.0,
        amplitude: 9.0,
        period: 16,
        gyro_amplitude: 1.5,
    };

    /// Leg shake: mid-height peaks, no body rotation
    pub const SHAKE: Self = Self {
        base: 14.0,
        amplitude: 5.5,
        period: 16,
        gyro_amplitude: 0.0,
    };

    fn magnitude(&self, k: usize) -> f64 {
        let phase = 2.0 * PI * k as f64 / self.period as f64;
        (self.base + self.amplitude * phase.sin()).max(0.0)
    }

    fn gyro(&self, k: usize) -> f64 {
        let phase = 2.0 * PI * k as f64 / self.period as f64;
        self.gyro_amplitude * phase.cos()
    }
}

#[derive(Debug, Clone, Copy)]
enum Segment {
    Rest(usize),
    Periodic { profile: MotionProfile, cycles: usize },
}

/// Segment-by-segment synthetic trace builder
#[derive(Debug, Clone)]
pub struct SyntheticMotion {
    start_sample: u32,
    device_period_ms: u32,
    segments: Vec<Segment>,
}

impl SyntheticMotion {
    pub fn new(start_sample: u32) -> Self {
        Self {
            start_sample,
            device_period_ms: 10,
            segments: Vec::new(),
        }
    }

    /// Device clock step between samples
    pub fn device_period_ms(mut self, period_ms: u32) -> Self {
        self.device_period_ms = period_ms;
        self
    }

    /// Flat gravity-only samples
    pub fn rest(mut self, samples: usize) -> Self {
        self.segments.push(Segment::Rest(samples));
        self
    }

    pub fn walk(self, cycles: usize) -> Self {
        self.periodic(MotionProfile::WALK, cycles)
    }

    pub fn run(self, cycles: usize) -> Self {
        self.periodic(MotionProfile::RUN, cycles)
    }

    pub fn shake(self, cycles: usize) -> Self {
        self.periodic(MotionProfile::SHAKE, cycles)
    }

    pub fn periodic(mut self, profile: MotionProfile, cycles: usize) -> Self {
        self.segments.push(Segment::Periodic { profile, cycles });
        self
    }

    /// Total samples the builder will produce
    pub fn len(&self) -> usize {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Rest(n) => *n,
                Segment::Periodic { profile, cycles } => profile.period * cycles,
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn build(&self) -> Vec<MotionSample> {
        let mut out = Vec::with_capacity(self.len());
        let mut number = self.start_sample;

        let mut push = |magnitude: f64, gyro: f64, out: &mut Vec<MotionSample>| {
            out.push(MotionSample {
                sample_number: number,
                device_timestamp_ms: number.wrapping_mul(self.device_period_ms),
                ax: 0.0,
                ay: 0.0,
                az: magnitude as f32,
                gx: gyro as f32,
                gy: 0.0,
                gz: 0.0,
            });
            number = number.wrapping_add(1);
        };

        for segment in &self.segments {
            match *segment {
                Segment::Rest(n) => {
                    for _ in 0..n {
                        push(REST_MAGNITUDE, 0.0, &mut out);
                    }
                }
                Segment::Periodic { profile, cycles } => {
                    for k in 0..profile.period * cycles {
                        push(profile.magnitude(k), profile.gyro(k), &mut out);
                    }
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_are_contiguous() {
        let samples = SyntheticMotion::new(1_000).rest(3).walk(2).rest(1).build();
        assert_eq!(samples.len(), 36);
        assert_eq!(samples[0].sample_number, 1_000);
        assert_eq!(samples[35].sample_number, 1_035);
        assert_eq!(samples[35].device_timestamp_ms, 10_350);
    }

    #[test]
    fn test_walk_peak_height() {
        let samples = SyntheticMotion::new(0).walk(1).build();
        let peak = samples
            .iter()
            .map(|s| s.accel_magnitude())
            .fold(f64::MIN, f64::max);
        assert!((peak - 15.5).abs() < 1e-4);
        assert_eq!(samples[4].accel_magnitude(), peak);
    }

    #[test]
    fn test_shake_has_still_gyro() {
        let samples = SyntheticMotion::new(0).shake(2).build();
        assert!(samples.iter().all(|s| s.gx == 0.0));
    }
}
