//! Collaborator traits - session registry and step storage
//!
//! The engine owns no durable state; everything that must survive a restart goes
//! through these traits.

use crate::{
    AlgorithmParams, ChunkRecord, ContractError, DeviceId, SessionId, SessionKey, SessionTotals,
    TimestampMapping,
};

/// Session identity resolution
#[trait_variant::make(SessionRegistry: Send)]
pub trait LocalSessionRegistry {
    /// Active session of a device, if any
    async fn active_session(&self, device_id: &DeviceId)
        -> Result<Option<SessionId>, ContractError>;

    /// Create and activate a new session, deactivating any prior one
    async fn start_session(&self, device_id: &DeviceId) -> Result<SessionId, ContractError>;

    /// Whether the session exists (active or not)
    async fn session_exists(&self, key: &SessionKey) -> Result<bool, ContractError>;
}

/// Durable per-session totals, params and per-device timestamp mappings
#[trait_variant::make(StepStore: Send)]
pub trait LocalStepStore {
    /// Totals folded from all recorded chunk deltas of the session
    async fn session_totals(&self, key: &SessionKey) -> Result<SessionTotals, ContractError>;

    /// Append one chunk's step delta
    async fn record_chunk(&self, record: &ChunkRecord) -> Result<(), ContractError>;

    /// Stored params of the session (None = never set)
    async fn load_params(&self, key: &SessionKey)
        -> Result<Option<AlgorithmParams>, ContractError>;

    async fn save_params(
        &self,
        key: &SessionKey,
        params: &AlgorithmParams,
    ) -> Result<(), ContractError>;

    /// Last derived mapping of the device
    async fn load_mapping(
        &self,
        device_id: &DeviceId,
    ) -> Result<Option<TimestampMapping>, ContractError>;

    async fn save_mapping(
        &self,
        device_id: &DeviceId,
        mapping: &TimestampMapping,
    ) -> Result<(), ContractError>;
}
