//! Running / leg-shake classification, run once per processing window.
//!
//! Order: running bouts, then shake spans over what is still pending, then
//! every remaining pending peak above threshold is a normal step.

use contracts::AlgorithmParams;

use crate::features::{Peak, PeakStatus, Valley};

/// Minimum gyroscope history for the variance test
pub const MIN_GYRO_SAMPLES: usize = 10;

/// Result of classifying one window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowTally {
    pub normal_steps: u64,
    pub running_steps: u64,
    pub shake_removed: u64,
}

impl WindowTally {
    /// Steps added to the cumulative count
    pub fn counted_steps(&self) -> u64 {
        self.normal_steps + self.running_steps
    }
}

/// Matching valley: first valley after the peak, else the last one before it.
pub fn matching_valley(peak: &Peak, valleys: &[Valley]) -> Option<Valley> {
    valleys
        .iter()
        .find(|v| v.index > peak.index)
        .or_else(|| valleys.iter().rev().find(|v| v.index < peak.index))
        .copied()
}

/// `(peak - valley) < (peak - diff)` against the matching valley; fails without one
fn swing_within(peak: &Peak, valleys: &[Valley], diff: f64) -> bool {
    matching_valley(peak, valleys)
        .is_some_and(|valley| (peak.value - valley.value) < (peak.value - diff))
}

/// Population variance, `None` below [`MIN_GYRO_SAMPLES`]
pub fn population_variance(values: &[f64]) -> Option<f64> {
    if values.len() < MIN_GYRO_SAMPLES {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    Some(values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n)
}

/// Classify a window, tagging peaks in place
pub fn classify(
    peaks: &mut [Peak],
    valleys: &[Valley],
    gyro: &[f64],
    params: &AlgorithmParams,
) -> WindowTally {
    let running_steps = tag_running(peaks, valleys, params);
    let shake_removed = tag_shakes(peaks, valleys, gyro, params);

    let mut normal_steps = 0;
    for peak in peaks.iter_mut() {
        if peak.is_pending() && peak.value > params.peak_threshold {
            peak.status = PeakStatus::CountedAsStep;
            normal_steps += 1;
        }
    }

    WindowTally {
        normal_steps,
        running_steps,
        shake_removed,
    }
}

fn tag_running(peaks: &mut [Peak], valleys: &[Valley], params: &AlgorithmParams) -> u64 {
    let mut running_steps = 0;
    let mut i = 0;

    while i < peaks.len() {
        if !peaks[i].is_pending() || peaks[i].value <= params.run_start_threshold {
            i += 1;
            continue;
        }

        let start = i;
        let end = (start + 1..peaks.len()).find(|&j| {
            peaks[j].value < params.run_end_threshold_high
                || peaks[j].value < params.run_end_threshold_low
        });
        // unterminated bout
        let Some(end) = end else { break };

        let confirmed = peaks[start..=end]
            .iter()
            .all(|peak| swing_within(peak, valleys, params.run_peak_valley_diff));

        if confirmed {
            let span = (peaks[end].index - peaks[start].index) as f64;
            let steps = (span * params.run_scaling_factor / params.baseline_step_samples as f64)
                .round() as u64;
            running_steps += steps;
            for peak in &mut peaks[start..=end] {
                peak.status = PeakStatus::CountedAsRun;
            }
        }

        i = end + 1;
    }

    running_steps
}

fn tag_shakes(
    peaks: &mut [Peak],
    valleys: &[Valley],
    gyro: &[f64],
    params: &AlgorithmParams,
) -> u64 {
    let still = population_variance(gyro).is_some_and(|v| v <= params.shake_variance_threshold);
    let pending: Vec<usize> = (0..peaks.len()).filter(|&i| peaks[i].is_pending()).collect();

    let mut removed = 0;
    let mut p = 0;
    while p < pending.len() {
        if peaks[pending[p]].value <= params.shake_start_threshold {
            p += 1;
            continue;
        }

        let end = (p + 1..pending.len())
            .find(|&q| peaks[pending[q]].value < params.shake_start_threshold);
        let Some(end) = end else { break };

        let span = &pending[p..end];
        let shaking = still
            && span
                .iter()
                .all(|&i| peaks[i].value <= params.shake_regional_peak_max)
            && span
                .iter()
                .all(|&i| swing_within(&peaks[i], valleys, params.shake_peak_valley_diff));

        if shaking {
            for &i in span {
                peaks[i].status = PeakStatus::CountedAsShake;
            }
            removed += span.len() as u64;
        }

        p = end;
    }

    removed
}
