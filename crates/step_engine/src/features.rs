//! Peak / valley feature extraction over the filtered magnitude.
//!
//! Sample indices are absolute (monotonic over the life of the extractor), so
//! trimming the history after a flush never shifts them. Centers that fall in
//! the trimmed tail at a flush boundary are not evaluated.

use contracts::{AlgorithmParams, MotionSample};

use crate::filter::MovingAverage;

/// Classification state of a detected peak
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeakStatus {
    Pending,
    CountedAsRun,
    CountedAsShake,
    CountedAsStep,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub value: f64,
    pub index: u64,
    pub status: PeakStatus,
}

impl Peak {
    pub fn is_pending(&self) -> bool {
        self.status == PeakStatus::Pending
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Valley {
    pub value: f64,
    pub index: u64,
}

/// Per-session filter, histories and open feature lists
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    filter: MovingAverage,
    accel: Vec<f64>,
    gyro: Vec<f64>,
    /// Absolute index of `accel[0]`
    history_start: u64,
    peaks: Vec<Peak>,
    valleys: Vec<Valley>,
    /// Centers below this absolute index never produce features
    suppress_before: u64,
    /// Highest sample number fed so far
    last_consumed: Option<u32>,

    peak_threshold: f64,
    peak_n: usize,
    valley_n: usize,
    process_window: usize,
}

impl FeatureExtractor {
    pub fn new(params: &AlgorithmParams) -> Self {
        Self {
            filter: MovingAverage::new(params.filter_window),
            accel: Vec::with_capacity(params.process_window_samples),
            gyro: Vec::with_capacity(params.process_window_samples),
            history_start: 0,
            peaks: Vec::new(),
            valleys: Vec::new(),
            suppress_before: 0,
            last_consumed: None,
            peak_threshold: params.peak_threshold,
            peak_n: params.peak_window_n,
            valley_n: params.valley_window_n,
            process_window: params.process_window_samples,
        }
    }

    /// Absolute index the next sample will get
    #[inline]
    pub fn next_index(&self) -> u64 {
        self.history_start + self.accel.len() as u64
    }

    pub fn last_consumed(&self) -> Option<u32> {
        self.last_consumed
    }

    /// Whether this sample was already fed
    #[inline]
    pub fn has_consumed(&self, sample_number: u32) -> bool {
        self.last_consumed.is_some_and(|last| sample_number <= last)
    }

    /// The next `count` samples update filter and history without producing
    /// features (warm-up replay).
    pub fn suppress_next(&mut self, count: usize) {
        self.suppress_before = self.next_index() + count as u64;
    }

    /// Feed one sample. Returns `true` when the processing window is full and
    /// the caller should classify and then [`FeatureExtractor::finish_window`].
    pub fn push(&mut self, sample: &MotionSample) -> bool {
        let filtered = self.filter.push(sample.accel_magnitude());
        self.accel.push(filtered);
        self.gyro.push(sample.gx as f64);
        self.last_consumed = Some(
            self.last_consumed
                .map_or(sample.sample_number, |last| last.max(sample.sample_number)),
        );

        self.detect_peak();
        self.detect_valley();

        self.accel.len() >= self.process_window
    }

    fn detect_peak(&mut self) {
        let n = self.peak_n;
        let len = self.accel.len();
        if len < 2 * n + 1 {
            return;
        }
        let center = len - 1 - n;
        let index = self.history_start + center as u64;
        if index < self.suppress_before {
            return;
        }

        let value = self.accel[center];
        if value <= self.peak_threshold {
            return;
        }
        let strict_max = (center - n..=center + n)
            .filter(|&i| i != center)
            .all(|i| self.accel[i] < value);
        if strict_max {
            self.peaks.push(Peak {
                value,
                index,
                status: PeakStatus::Pending,
            });
        }
    }

    fn detect_valley(&mut self) {
        let n = self.valley_n;
        let len = self.accel.len();
        if len < 2 * n + 1 || len < 2 * self.peak_n + 1 {
            return;
        }
        let center = len - 1 - n;
        let index = self.history_start + center as u64;
        if index < self.suppress_before {
            return;
        }

        let value = self.accel[center];
        let strict_min = (center - n..=center + n)
            .filter(|&i| i != center)
            .all(|i| self.accel[i] > value);
        if strict_min {
            self.valleys.push(Valley { value, index });
        }
    }

    pub fn peaks(&self) -> &[Peak] {
        &self.peaks
    }

    pub fn peaks_mut(&mut self) -> &mut [Peak] {
        &mut self.peaks
    }

    pub fn valleys(&self) -> &[Valley] {
        &self.valleys
    }

    pub fn gyro_history(&self) -> &[f64] {
        &self.gyro
    }

    pub fn history_len(&self) -> usize {
        self.accel.len()
    }

    /// Split borrow for classification
    pub fn window_mut(&mut self) -> (&mut [Peak], &[Valley], &[f64]) {
        (&mut self.peaks, &self.valleys, &self.gyro)
    }

    /// Drop classified features and trim histories to the last `peak_n` entries
    pub fn finish_window(&mut self) {
        self.peaks.clear();
        self.valleys.clear();

        let keep = self.peak_n;
        let len = self.accel.len();
        if len > keep {
            let drop = len - keep;
            self.accel.drain(..drop);
            self.gyro.drain(..drop);
            self.history_start += drop as u64;
        }
    }
}
