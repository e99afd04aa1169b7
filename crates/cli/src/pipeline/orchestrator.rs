//! Pipeline orchestrator - feeds chunks through the step engine in order.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use contracts::{ChunkRequest, ServiceBlueprint, SessionIntent};
use step_engine::{EngineError, StepEngine};
use store::Store;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::PipelineStats;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The service configuration (after CLI overrides)
    pub blueprint: ServiceBlueprint,

    /// Abort on the first rejected chunk instead of skipping undecodable ones
    pub fail_fast: bool,

    /// Print each outcome as a JSON line
    pub print_json: bool,
}

/// Engine plus its background eviction task
pub struct Pipeline {
    config: PipelineConfig,
    engine: Arc<StepEngine<Store>>,
    eviction: JoinHandle<()>,
}

impl Pipeline {
    /// Open the configured store and start the engine
    pub async fn open(config: PipelineConfig) -> Result<Self> {
        let blueprint = &config.blueprint;

        // Initialize Metrics (optional)
        if let Some(port) = blueprint.observability.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let store = store::open_store(&blueprint.store)
            .await
            .with_context(|| format!("Failed to open {:?} store", blueprint.store.kind))?;

        info!(
            store = ?store.kind(),
            path = %blueprint.store.path.display(),
            idle_timeout_s = blueprint.engine.idle_timeout_s,
            "Step engine configured"
        );

        let engine = Arc::new(
            StepEngine::new(
                Arc::new(store),
                blueprint.engine.clone(),
                blueprint.params.resolve(),
            )
            .context("Invalid default algorithm params")?,
        );
        let eviction = engine.spawn_eviction();

        Ok(Self {
            config,
            engine,
            eviction,
        })
    }

    pub fn engine(&self) -> &Arc<StepEngine<Store>> {
        &self.engine
    }

    /// Process chunks in order
    ///
    /// Once a chunk commits, the rest of the run is pinned to its session.
    pub async fn run(&self, chunks: Vec<ChunkRequest>) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let mut stats = PipelineStats::default();

        info!(chunks = chunks.len(), "Pipeline running");

        for mut chunk in chunks {
            if let Some(ref last) = stats.last_outcome {
                chunk.intent = SessionIntent::Explicit(last.session_id.clone());
            }
            let chunk_name = chunk.chunk_name.clone();
            stats.chunks_submitted += 1;

            match self.engine.process_chunk(chunk).await {
                Ok(outcome) => {
                    stats.step_metrics.update(&outcome);

                    if self.config.print_json {
                        let line = serde_json::to_string(&outcome)
                            .context("Failed to serialize chunk outcome")?;
                        println!("{}", line);
                    } else {
                        info!(
                            chunk = %chunk_name,
                            session_id = %outcome.session_id,
                            samples = outcome.samples_processed,
                            steps = outcome.steps_in_chunk,
                            cumulative = outcome.cumulative_steps,
                            running = outcome.running_steps,
                            shake_removed = outcome.shake_removed,
                            "Chunk processed"
                        );
                    }
                    stats.last_outcome = Some(outcome);
                }
                Err(e) if matches!(e, EngineError::Decode(_)) && !self.config.fail_fast => {
                    warn!(chunk = %chunk_name, error = %e, "Skipping undecodable chunk");
                    stats.step_metrics.record_failure();
                    stats.chunks_skipped += 1;
                }
                Err(e) => {
                    stats.step_metrics.record_failure();
                    return Err(e).with_context(|| format!("Chunk '{}' rejected", chunk_name));
                }
            }
        }

        stats.duration = start_time.elapsed();
        info!(
            duration_secs = stats.duration.as_secs_f64(),
            chunks_per_sec = format!("{:.2}", stats.chunks_per_sec()),
            "Pipeline finished"
        );

        Ok(stats)
    }

    /// Stop the eviction task
    pub fn shutdown(self) {
        self.eviction.abort();
    }
}
