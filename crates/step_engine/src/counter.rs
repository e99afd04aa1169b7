//! Per-session step counter.

use contracts::{AlgorithmParams, MotionSample, SessionTotals};
use tracing::debug;

use crate::classifier::{classify, WindowTally};
use crate::features::FeatureExtractor;

/// Deltas produced by one chunk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkTally {
    pub steps: u64,
    pub running_steps: u64,
    pub shake_removed: u64,
    pub windows_flushed: u64,
}

/// Samples surviving de-duplication
#[derive(Debug, Clone, Default)]
pub struct Accepted {
    /// Sorted by sample number, unique, above the high-water mark
    pub samples: Vec<MotionSample>,
    /// Stale or repeated samples that were dropped
    pub duplicates: usize,
}

/// Session counter state
///
/// Cloned as a staging copy for each chunk; the copy replaces the original only
/// after the chunk record is persisted.
#[derive(Debug, Clone)]
pub struct SessionCounter {
    params: AlgorithmParams,
    extractor: FeatureExtractor,
    cumulative_steps: u64,
    running_steps: u64,
    shake_removed: u64,
    /// Highest sample number ever accepted
    last_sample_number: Option<u32>,
    /// Samples of the last chunk that carried new data, kept for warm-up replay
    previous_chunk: Vec<MotionSample>,
}

impl SessionCounter {
    pub fn new(params: AlgorithmParams) -> Self {
        Self {
            extractor: FeatureExtractor::new(&params),
            params,
            cumulative_steps: 0,
            running_steps: 0,
            shake_removed: 0,
            last_sample_number: None,
            previous_chunk: Vec::new(),
        }
    }

    /// Counter rebuilt from persisted totals (no peak/valley sub-state)
    pub fn seeded(params: AlgorithmParams, totals: &SessionTotals) -> Self {
        Self {
            cumulative_steps: totals.cumulative_steps,
            running_steps: totals.running_steps,
            shake_removed: totals.shake_removed,
            last_sample_number: totals.last_sample_number,
            ..Self::new(params)
        }
    }

    /// Swap in new params with a fresh detector
    ///
    /// Tallies, the high-water mark and the previous-chunk buffer are kept.
    pub fn reconfigure(&mut self, params: AlgorithmParams) {
        self.extractor = FeatureExtractor::new(&params);
        self.params = params;
    }

    /// Keep samples above the high-water mark, sorted and unique
    pub fn accept(&self, samples: &[MotionSample]) -> Accepted {
        let mut fresh: Vec<MotionSample> = samples
            .iter()
            .filter(|s| self.last_sample_number.map_or(true, |hw| s.sample_number > hw))
            .copied()
            .collect();
        fresh.sort_by_key(|s| s.sample_number);
        fresh.dedup_by_key(|s| s.sample_number);

        Accepted {
            duplicates: samples.len() - fresh.len(),
            samples: fresh,
        }
    }

    /// Run accepted samples through the detector
    ///
    /// Previous-chunk samples the detector has not consumed are replayed first
    /// as warm-up context.
    pub fn process(&mut self, accepted: &[MotionSample]) -> ChunkTally {
        let before = (self.cumulative_steps, self.running_steps, self.shake_removed);

        let warmup: Vec<MotionSample> = self
            .previous_chunk
            .iter()
            .filter(|s| !self.extractor.has_consumed(s.sample_number))
            .copied()
            .collect();
        if !warmup.is_empty() {
            debug!(samples = warmup.len(), "replaying previous chunk as warm-up");
            self.extractor.suppress_next(warmup.len());
        }

        let mut windows_flushed = 0;
        for sample in warmup.iter().chain(accepted) {
            if self.extractor.has_consumed(sample.sample_number) {
                continue;
            }
            if self.extractor.push(sample) {
                self.flush_window();
                windows_flushed += 1;
            }
        }

        if let Some(last) = accepted.last() {
            self.last_sample_number = Some(last.sample_number);
            self.previous_chunk = accepted.to_vec();
        }

        ChunkTally {
            steps: self.cumulative_steps - before.0,
            running_steps: self.running_steps - before.1,
            shake_removed: self.shake_removed - before.2,
            windows_flushed,
        }
    }

    fn flush_window(&mut self) {
        let (peaks, valleys, gyro) = self.extractor.window_mut();
        let tally: WindowTally = classify(peaks, valleys, gyro, &self.params);

        self.cumulative_steps += tally.counted_steps();
        self.running_steps += tally.running_steps;
        self.shake_removed += tally.shake_removed;
        self.extractor.finish_window();

        debug!(
            normal = tally.normal_steps,
            running = tally.running_steps,
            shake_removed = tally.shake_removed,
            cumulative = self.cumulative_steps,
            "processing window flushed"
        );
    }

    pub fn params(&self) -> &AlgorithmParams {
        &self.params
    }

    pub fn cumulative_steps(&self) -> u64 {
        self.cumulative_steps
    }

    pub fn running_steps(&self) -> u64 {
        self.running_steps
    }

    pub fn shake_removed(&self) -> u64 {
        self.shake_removed
    }

    pub fn last_sample_number(&self) -> Option<u32> {
        self.last_sample_number
    }

    /// Peaks detected but not yet classified
    pub fn pending_peaks(&self) -> usize {
        self.extractor.peaks().len()
    }

    pub fn previous_chunk_len(&self) -> usize {
        self.previous_chunk.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingestion::SyntheticMotion;

    fn make_counter() -> SessionCounter {
        SessionCounter::new(AlgorithmParams::default())
    }

    fn run_chunk(counter: &mut SessionCounter, samples: &[MotionSample]) -> ChunkTally {
        let accepted = counter.accept(samples);
        counter.process(&accepted.samples)
    }

    #[test]
    fn test_walk_counts_cycles_after_flush() {
        let mut counter = make_counter();
        let trace = SyntheticMotion::new(0).rest(16).walk(10).rest(100).build();

        let tally = run_chunk(&mut counter, &trace);
        assert_eq!(tally.windows_flushed, 1);
        assert_eq!(tally.steps, 10);
        assert_eq!(counter.cumulative_steps(), 10);
    }

    #[test]
    fn test_steps_wait_for_window_flush() {
        let mut counter = make_counter();
        let trace = SyntheticMotion::new(0).rest(16).walk(4).build();

        let tally = run_chunk(&mut counter, &trace);
        assert_eq!(tally.steps, 0);
        assert_eq!(counter.pending_peaks(), 4);
    }

    #[test]
    fn test_running_segment() {
        let mut counter = make_counter();
        let trace = SyntheticMotion::new(0)
            .rest(16)
            .run(10)
            .walk(5)
            .rest(100)
            .build();

        let tally = run_chunk(&mut counter, &trace);
        // bout spans 160 samples: 160 * 1.2 / 16
        assert_eq!(tally.running_steps, 12);
        assert_eq!(tally.steps, 12 + 4);
    }

    #[test]
    fn test_shake_segment_is_removed() {
        let mut counter = make_counter();
        let trace = SyntheticMotion::new(0)
            .rest(16)
            .shake(6)
            .walk(3)
            .rest(120)
            .build();

        let tally = run_chunk(&mut counter, &trace);
        assert_eq!(tally.shake_removed, 6);
        assert_eq!(tally.steps, 3);
    }

    #[test]
    fn test_accept_filters_and_sorts() {
        let mut counter = SessionCounter::seeded(
            AlgorithmParams::default(),
            &SessionTotals {
                cumulative_steps: 5,
                last_sample_number: Some(10),
                ..Default::default()
            },
        );
        let trace = SyntheticMotion::new(8).rest(6).build();
        let mut shuffled = vec![trace[5], trace[3], trace[4], trace[3], trace[0]];
        shuffled.push(trace[5]);

        let accepted = counter.accept(&shuffled);
        let numbers: Vec<_> = accepted.samples.iter().map(|s| s.sample_number).collect();
        assert_eq!(numbers, vec![11, 12, 13]);
        assert_eq!(accepted.duplicates, 3);

        counter.process(&accepted.samples);
        assert_eq!(counter.last_sample_number(), Some(13));
        assert_eq!(counter.cumulative_steps(), 5);
    }

    #[test]
    fn test_split_chunks_match_single_chunk() {
        let trace = SyntheticMotion::new(0).rest(16).walk(20).rest(200).build();

        let mut whole = make_counter();
        run_chunk(&mut whole, &trace);

        let mut split = make_counter();
        let (a, b) = trace.split_at(137);
        run_chunk(&mut split, a);
        run_chunk(&mut split, b);

        assert_eq!(whole.cumulative_steps(), split.cumulative_steps());
        assert_eq!(whole.pending_peaks(), split.pending_peaks());
    }

    #[test]
    fn test_reconfigure_keeps_tallies_and_replays_warmup() {
        let mut counter = make_counter();
        let trace = SyntheticMotion::new(0).rest(16).walk(10).rest(100).build();
        run_chunk(&mut counter, &trace);
        assert_eq!(counter.cumulative_steps(), 10);

        counter.reconfigure(AlgorithmParams {
            peak_threshold: 11.0,
            ..Default::default()
        });
        assert_eq!(counter.cumulative_steps(), 10);
        assert_eq!(counter.last_sample_number(), Some(275));
        assert_eq!(counter.previous_chunk_len(), trace.len());
        assert_eq!(counter.params().peak_threshold, 11.0);

        // the replayed chunk must not be counted again
        let next = SyntheticMotion::new(276).rest(300).build();
        let tally = run_chunk(&mut counter, &next);
        assert_eq!(tally.steps, 0);
    }
}
