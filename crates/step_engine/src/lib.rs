//! # Step Engine
//!
//! Streaming step counter for collar motion data.
//!
//! Responsibilities:
//! - Moving-average filtering and strict peak/valley detection
//! - Running and leg-shake classification per processing window
//! - Per-session counters with sample de-duplication and chunk continuity
//! - Crash recovery from persisted step deltas, idle-session eviction
//!
//! ## Example
//!
//! ```ignore
//! use step_engine::StepEngine;
//!
//! let engine = StepEngine::new(store, blueprint.engine.clone(), blueprint.params.resolve())?;
//!
//! let outcome = engine.process_chunk(request).await?;
//! println!("+{} steps, {} total", outcome.steps_in_chunk, outcome.cumulative_steps);
//! ```

mod classifier;
mod counter;
mod engine;
mod error;
mod features;
mod filter;

// Re-exports
pub use classifier::{
    classify, matching_valley, population_variance, WindowTally, MIN_GYRO_SAMPLES,
};
pub use counter::{Accepted, ChunkTally, SessionCounter};
pub use engine::StepEngine;
pub use error::{EngineError, Result};
pub use features::{FeatureExtractor, Peak, PeakStatus, Valley};
pub use filter::MovingAverage;

// Re-export contracts types
pub use contracts::{
    AlgorithmParams, AlgorithmParamsPatch, ChunkOutcome, ChunkRequest, EngineSettings,
    SessionSnapshot,
};
