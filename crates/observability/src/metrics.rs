//! Step engine metrics
//!
//! Facade calls per processed chunk plus an in-memory aggregator for run summaries.

use std::collections::HashMap;

use contracts::ChunkOutcome;
use metrics::{counter, gauge, histogram};

/// Record metrics for one committed chunk
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_chunk_outcome;
///
/// let outcome = engine.process_chunk(request).await?;
/// record_chunk_outcome(&outcome);
/// ```
pub fn record_chunk_outcome(outcome: &ChunkOutcome) {
    counter!("collar_steps_chunks_total", "status" => "ok").increment(1);
    counter!("collar_steps_steps_total").increment(outcome.steps_in_chunk);
    counter!("collar_steps_samples_total").increment(outcome.samples_processed as u64);
    histogram!("collar_steps_chunk_steps").record(outcome.steps_in_chunk as f64);
}

/// Record the running/shake deltas of one chunk
pub fn record_behavior_deltas(running_steps: u64, shake_removed: u64) {
    if running_steps > 0 {
        counter!("collar_steps_running_steps_total").increment(running_steps);
    }
    if shake_removed > 0 {
        counter!("collar_steps_shake_removed_total").increment(shake_removed);
    }
}

/// Record a rejected or failed chunk
pub fn record_chunk_failure(reason: &'static str) {
    counter!("collar_steps_chunks_total", "status" => reason).increment(1);
}

/// Record samples filtered as stale or duplicated
pub fn record_duplicate_samples(count: usize) {
    if count > 0 {
        counter!("collar_steps_duplicate_samples_total").increment(count as u64);
    }
}

pub fn record_sessions_evicted(count: usize) {
    if count > 0 {
        counter!("collar_steps_sessions_evicted_total").increment(count as u64);
    }
}

pub fn record_params_updated() {
    counter!("collar_steps_params_updates_total").increment(1);
}

/// Current number of resident session slots
pub fn set_active_sessions(count: usize) {
    gauge!("collar_steps_active_sessions").set(count as f64);
}

/// Step metrics aggregator
///
/// Aggregates chunk outcomes in memory for summaries.
#[derive(Debug, Clone, Default)]
pub struct StepMetricsAggregator {
    pub total_chunks: u64,
    pub failed_chunks: u64,
    pub total_steps: u64,
    pub running_steps: u64,
    pub shake_removed: u64,
    pub samples_processed: u64,
    pub truncated_chunks: u64,

    /// Steps per chunk
    pub chunk_steps: RunningStats,

    /// Accepted samples per chunk
    pub chunk_samples: RunningStats,

    /// Chunk temperature averages (°C)
    pub temperature: RunningStats,

    /// Latest cumulative count per session
    pub session_totals: HashMap<String, u64>,
}

impl StepMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update aggregate statistics
    pub fn update(&mut self, outcome: &ChunkOutcome) {
        self.total_chunks += 1;
        self.total_steps += outcome.steps_in_chunk;
        self.running_steps += outcome.running_steps;
        self.shake_removed += outcome.shake_removed;
        self.samples_processed += outcome.samples_processed as u64;
        if outcome.truncated_bytes > 0 {
            self.truncated_chunks += 1;
        }

        self.chunk_steps.push(outcome.steps_in_chunk as f64);
        self.chunk_samples.push(outcome.samples_processed as f64);
        if let Some(avg) = outcome.temp_avg_c {
            self.temperature.push(avg);
        }

        self.session_totals
            .insert(outcome.session_id.to_string(), outcome.cumulative_steps);
    }

    pub fn record_failure(&mut self) {
        self.failed_chunks += 1;
    }

    /// Build a summary report
    pub fn summary(&self) -> MetricsSummary {
        let attempted = self.total_chunks + self.failed_chunks;
        MetricsSummary {
            total_chunks: self.total_chunks,
            failed_chunks: self.failed_chunks,
            total_steps: self.total_steps,
            running_steps: self.running_steps,
            shake_removed: self.shake_removed,
            samples_processed: self.samples_processed,
            failure_rate: if attempted > 0 {
                self.failed_chunks as f64 / attempted as f64 * 100.0
            } else {
                0.0
            },
            truncated_chunks: self.truncated_chunks,
            chunk_steps: StatsSummary::from(&self.chunk_steps),
            chunk_samples: StatsSummary::from(&self.chunk_samples),
            temperature_c: StatsSummary::from(&self.temperature),
            session_totals: self.session_totals.clone(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Metrics summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_chunks: u64,
    pub failed_chunks: u64,
    pub total_steps: u64,
    pub running_steps: u64,
    pub shake_removed: u64,
    pub samples_processed: u64,
    pub failure_rate: f64,
    pub truncated_chunks: u64,
    pub chunk_steps: StatsSummary,
    pub chunk_samples: StatsSummary,
    pub temperature_c: StatsSummary,
    pub session_totals: HashMap<String, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Step Metrics Summary ===")?;
        writeln!(f, "Chunks processed: {}", self.total_chunks)?;
        writeln!(
            f,
            "Chunks failed: {} ({:.2}%)",
            self.failed_chunks, self.failure_rate
        )?;
        writeln!(f, "Samples processed: {}", self.samples_processed)?;
        writeln!(f, "Steps counted: {}", self.total_steps)?;
        writeln!(f, "  of which running: {}", self.running_steps)?;
        writeln!(f, "Shake peaks removed: {}", self.shake_removed)?;
        writeln!(f, "Truncated payloads: {}", self.truncated_chunks)?;
        writeln!(f, "Steps per chunk: {}", self.chunk_steps)?;
        writeln!(f, "Samples per chunk: {}", self.chunk_samples)?;
        writeln!(f, "Temperature (°C): {}", self.temperature_c)?;

        if !self.session_totals.is_empty() {
            writeln!(f, "Session totals:")?;
            let mut sessions: Vec<_> = self.session_totals.iter().collect();
            sessions.sort();
            for (session, total) in sessions {
                writeln!(f, "  {}: {}", session, total)?;
            }
        }

        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::MappingSource;

    fn make_outcome(session: &str, steps: u64, cumulative: u64) -> ChunkOutcome {
        ChunkOutcome {
            session_id: session.into(),
            steps_in_chunk: steps,
            cumulative_steps: cumulative,
            running_steps: 2,
            shake_removed: 1,
            samples_processed: 300,
            last_sample_number: Some(299),
            temp_avg_c: Some(38.2),
            temperature_timeline: Vec::new(),
            mapping_source: MappingSource::Chunk,
            truncated_bytes: 0,
        }
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = StepMetricsAggregator::new();
        aggregator.update(&make_outcome("s1", 4, 184));
        aggregator.update(&make_outcome("s1", 6, 190));
        aggregator.record_failure();

        assert_eq!(aggregator.total_chunks, 2);
        assert_eq!(aggregator.total_steps, 10);
        assert_eq!(aggregator.running_steps, 4);
        assert_eq!(aggregator.samples_processed, 600);
        assert_eq!(aggregator.session_totals.get("s1"), Some(&190));

        let summary = aggregator.summary();
        assert!((summary.failure_rate - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(summary.chunk_steps.count, 2);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = StepMetricsAggregator::new();
        aggregator.update(&make_outcome("walk-1", 12, 12));

        let output = format!("{}", aggregator.summary());
        assert!(output.contains("Chunks processed: 1"));
        assert!(output.contains("Steps counted: 12"));
        assert!(output.contains("walk-1: 12"));
        assert!(output.contains("0.00%"));
    }

    #[test]
    fn test_facade_calls_without_recorder() {
        // No recorder installed: calls must be no-ops
        record_chunk_outcome(&make_outcome("s", 1, 1));
        record_behavior_deltas(3, 0);
        record_chunk_failure("storage");
        record_duplicate_samples(5);
        set_active_sessions(2);
    }
}
