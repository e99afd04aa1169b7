//! Pipeline statistics and metrics.

use std::time::Duration;

use contracts::ChunkOutcome;
use observability::StepMetricsAggregator;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Chunks handed to the engine
    pub chunks_submitted: u64,

    /// Chunks rejected and skipped
    pub chunks_skipped: u64,

    /// Total duration of the run
    pub duration: Duration,

    /// Outcome of the last committed chunk
    pub last_outcome: Option<ChunkOutcome>,

    /// Per-chunk step metrics
    pub step_metrics: StepMetricsAggregator,
}

impl PipelineStats {
    /// Chunks per second throughput
    pub fn chunks_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.chunks_submitted as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Cumulative total of the session after the run
    pub fn cumulative_steps(&self) -> Option<u64> {
        self.last_outcome.as_ref().map(|o| o.cumulative_steps)
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Run Statistics ===\n");

        println!("Overview");
        println!("   ├─ Duration: {:.3}s", self.duration.as_secs_f64());
        println!("   ├─ Chunks submitted: {}", self.chunks_submitted);
        println!("   ├─ Chunks skipped: {}", self.chunks_skipped);
        println!("   └─ Chunks/s: {:.2}", self.chunks_per_sec());

        if let Some(ref outcome) = self.last_outcome {
            println!("\nSession {}", outcome.session_id);
            println!("   ├─ Cumulative steps: {}", outcome.cumulative_steps);
            match outcome.last_sample_number {
                Some(n) => println!("   └─ Last sample: {}", n),
                None => println!("   └─ Last sample: (none)"),
            }
        }

        println!("\n{}", self.step_metrics.summary());
    }
}
