//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace: motion
//! samples, chunk requests/outcomes, algorithm parameters, configuration records,
//! and the collaborator traits the step engine persists through.
//! Business crates depend on this crate, never the reverse.
//!
//! ## Time Model
//! - Wall-clock timestamps are epoch milliseconds (`i64`)
//! - `sample_number` is the device sequence number and the de-duplication key

mod blueprint;
mod chunk;
mod error;
mod ids;
mod params;
mod sample;
mod store;

pub use blueprint::*;
pub use chunk::*;
pub use error::*;
pub use ids::{DeviceId, SessionId, SessionKey};
pub use params::*;
pub use sample::*;
pub use store::{LocalSessionRegistry, LocalStepStore, SessionRegistry, StepStore};
