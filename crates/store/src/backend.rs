//! Store selected from configuration

use std::sync::Arc;

use contracts::{
    AlgorithmParams, ChunkRecord, ContractError, DeviceId, SessionId, SessionKey,
    SessionRegistry, SessionTotals, StepStore, StoreConfig, StoreKind, TimestampMapping,
};
use tracing::instrument;

use crate::error::Result;
use crate::file::FileStore;
use crate::ledger::LedgerEntry;
use crate::memory::MemoryStore;
use crate::metrics::StoreMetrics;

/// Either backend behind one concrete type
#[derive(Debug)]
pub enum Store {
    Memory(MemoryStore),
    File(FileStore),
}

/// Create the configured store
#[instrument(name = "store_open", skip(config), fields(kind = ?config.kind))]
pub async fn open_store(config: &StoreConfig) -> Result<Store> {
    match config.kind {
        StoreKind::Memory => Ok(Store::Memory(MemoryStore::new())),
        StoreKind::File => Ok(Store::File(FileStore::open(&config.path).await?)),
    }
}

impl Store {
    pub fn kind(&self) -> StoreKind {
        match self {
            Self::Memory(_) => StoreKind::Memory,
            Self::File(_) => StoreKind::File,
        }
    }

    pub fn metrics(&self) -> Arc<StoreMetrics> {
        match self {
            Self::Memory(store) => store.metrics(),
            Self::File(store) => store.metrics(),
        }
    }

    /// Known sessions of a device, sorted by id
    pub async fn sessions_of(&self, device_id: &DeviceId) -> Vec<SessionId> {
        match self {
            Self::Memory(store) => store.sessions_of(device_id),
            Self::File(store) => store.sessions_of(device_id).await,
        }
    }

    /// Ledger entries of a session, oldest first
    pub async fn entries(&self, key: &SessionKey) -> Result<Vec<LedgerEntry>> {
        match self {
            Self::Memory(store) => Ok(store.entries(key)),
            Self::File(store) => store.entries(key).await,
        }
    }
}

impl SessionRegistry for Store {
    async fn active_session(
        &self,
        device_id: &DeviceId,
    ) -> std::result::Result<Option<SessionId>, ContractError> {
        match self {
            Self::Memory(store) => store.active_session(device_id).await,
            Self::File(store) => store.active_session(device_id).await,
        }
    }

    async fn start_session(
        &self,
        device_id: &DeviceId,
    ) -> std::result::Result<SessionId, ContractError> {
        match self {
            Self::Memory(store) => store.start_session(device_id).await,
            Self::File(store) => store.start_session(device_id).await,
        }
    }

    async fn session_exists(&self, key: &SessionKey) -> std::result::Result<bool, ContractError> {
        match self {
            Self::Memory(store) => store.session_exists(key).await,
            Self::File(store) => store.session_exists(key).await,
        }
    }
}

impl StepStore for Store {
    async fn session_totals(
        &self,
        key: &SessionKey,
    ) -> std::result::Result<SessionTotals, ContractError> {
        match self {
            Self::Memory(store) => store.session_totals(key).await,
            Self::File(store) => store.session_totals(key).await,
        }
    }

    async fn record_chunk(&self, record: &ChunkRecord) -> std::result::Result<(), ContractError> {
        match self {
            Self::Memory(store) => store.record_chunk(record).await,
            Self::File(store) => store.record_chunk(record).await,
        }
    }

    async fn load_params(
        &self,
        key: &SessionKey,
    ) -> std::result::Result<Option<AlgorithmParams>, ContractError> {
        match self {
            Self::Memory(store) => store.load_params(key).await,
            Self::File(store) => store.load_params(key).await,
        }
    }

    async fn save_params(
        &self,
        key: &SessionKey,
        params: &AlgorithmParams,
    ) -> std::result::Result<(), ContractError> {
        match self {
            Self::Memory(store) => store.save_params(key, params).await,
            Self::File(store) => store.save_params(key, params).await,
        }
    }

    async fn load_mapping(
        &self,
        device_id: &DeviceId,
    ) -> std::result::Result<Option<TimestampMapping>, ContractError> {
        match self {
            Self::Memory(store) => store.load_mapping(device_id).await,
            Self::File(store) => store.load_mapping(device_id).await,
        }
    }

    async fn save_mapping(
        &self,
        device_id: &DeviceId,
        mapping: &TimestampMapping,
    ) -> std::result::Result<(), ContractError> {
        match self {
            Self::Memory(store) => store.save_mapping(device_id, mapping).await,
            Self::File(store) => store.save_mapping(device_id, mapping).await,
        }
    }
}
