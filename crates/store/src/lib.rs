//! # Store
//!
//! Session registry and step storage backends.
//!
//! Responsibilities:
//! - Session identity (active session per device, explicit lookups)
//! - Append-only ledger of per-chunk step deltas, stamped with `recorded_at`
//! - Per-session algorithm params and per-device timestamp mappings
//!
//! Session totals are always folded from the ledger, so a restarted engine
//! resumes from exactly what was recorded.

pub mod backend;
pub mod error;
pub mod file;
pub mod ledger;
pub mod memory;
pub mod metrics;

pub use backend::{open_store, Store};
pub use contracts::{SessionRegistry, StepStore};
pub use error::StoreError;
pub use file::FileStore;
pub use ledger::LedgerEntry;
pub use memory::MemoryStore;
pub use metrics::{MetricsSnapshot, StoreMetrics};
