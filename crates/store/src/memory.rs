//! MemoryStore - volatile, process-local storage

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use contracts::{
    AlgorithmParams, ChunkRecord, ContractError, DeviceId, SessionId, SessionKey,
    SessionRegistry, SessionTotals, StepStore, TimestampMapping,
};
use tracing::{debug, instrument};

use crate::ledger::{self, LedgerEntry};
use crate::metrics::StoreMetrics;

#[derive(Debug, Default)]
struct MemoryState {
    next_seq: u64,
    active: HashMap<DeviceId, SessionId>,
    sessions: HashSet<SessionKey>,
    ledger: HashMap<SessionKey, Vec<LedgerEntry>>,
    params: HashMap<SessionKey, AlgorithmParams>,
    mappings: HashMap<DeviceId, TimestampMapping>,
}

/// Store that keeps everything in memory; lost on restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    metrics: Arc<StoreMetrics>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metrics(&self) -> Arc<StoreMetrics> {
        self.metrics.clone()
    }

    /// Register a session with a known id, optionally making it active
    pub fn insert_session(&self, key: SessionKey, activate: bool) {
        let mut state = self.lock();
        if activate {
            state
                .active
                .insert(key.device_id.clone(), key.session_id.clone());
        }
        state.sessions.insert(key);
    }

    /// Known sessions of a device
    pub fn sessions_of(&self, device_id: &DeviceId) -> Vec<SessionId> {
        let state = self.lock();
        let mut ids: Vec<SessionId> = state
            .sessions
            .iter()
            .filter(|key| &key.device_id == device_id)
            .map(|key| key.session_id.clone())
            .collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }

    /// Ledger entries of a session, oldest first
    pub fn entries(&self, key: &SessionKey) -> Vec<LedgerEntry> {
        self.lock().ledger.get(key).cloned().unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionRegistry for MemoryStore {
    async fn active_session(
        &self,
        device_id: &DeviceId,
    ) -> Result<Option<SessionId>, ContractError> {
        Ok(self.lock().active.get(device_id).cloned())
    }

    #[instrument(name = "memory_store_start_session", skip(self), fields(device_id = %device_id))]
    async fn start_session(&self, device_id: &DeviceId) -> Result<SessionId, ContractError> {
        let mut state = self.lock();
        state.next_seq += 1;
        let session_id = ledger::session_id(device_id, state.next_seq);

        state
            .sessions
            .insert(SessionKey::new(device_id.clone(), session_id.clone()));
        if let Some(previous) = state.active.insert(device_id.clone(), session_id.clone()) {
            debug!(previous = %previous, "previous session deactivated");
        }
        self.metrics.inc_state_writes();
        Ok(session_id)
    }

    async fn session_exists(&self, key: &SessionKey) -> Result<bool, ContractError> {
        Ok(self.lock().sessions.contains(key))
    }
}

impl StepStore for MemoryStore {
    async fn session_totals(&self, key: &SessionKey) -> Result<SessionTotals, ContractError> {
        self.metrics.inc_ledger_reads();
        let state = self.lock();
        Ok(state
            .ledger
            .get(key)
            .map(|entries| ledger::fold(entries))
            .unwrap_or_default())
    }

    async fn record_chunk(&self, record: &ChunkRecord) -> Result<(), ContractError> {
        let mut state = self.lock();
        state
            .ledger
            .entry(record.session_key())
            .or_default()
            .push(LedgerEntry::now(record.clone()));
        self.metrics.inc_records_written();
        Ok(())
    }

    async fn load_params(
        &self,
        key: &SessionKey,
    ) -> Result<Option<AlgorithmParams>, ContractError> {
        Ok(self.lock().params.get(key).cloned())
    }

    async fn save_params(
        &self,
        key: &SessionKey,
        params: &AlgorithmParams,
    ) -> Result<(), ContractError> {
        self.lock().params.insert(key.clone(), params.clone());
        self.metrics.inc_state_writes();
        Ok(())
    }

    async fn load_mapping(
        &self,
        device_id: &DeviceId,
    ) -> Result<Option<TimestampMapping>, ContractError> {
        Ok(self.lock().mappings.get(device_id).copied())
    }

    async fn save_mapping(
        &self,
        device_id: &DeviceId,
        mapping: &TimestampMapping,
    ) -> Result<(), ContractError> {
        self.lock().mappings.insert(device_id.clone(), *mapping);
        self.metrics.inc_state_writes();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(key: &SessionKey, steps: u64, last: u32) -> ChunkRecord {
        ChunkRecord {
            device_id: key.device_id.clone(),
            session_id: key.session_id.clone(),
            chunk_name: format!("chunk-{last}"),
            steps,
            running_steps: 0,
            shake_removed: 0,
            samples_processed: 100,
            first_sample_number: Some(last - 99),
            last_sample_number: Some(last),
            temp_avg_c: Some(38.1),
            temperatures: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_start_session_replaces_active() {
        let store = MemoryStore::new();
        let device = DeviceId::from("collar-01");

        assert_eq!(store.active_session(&device).await.unwrap(), None);
        let first = store.start_session(&device).await.unwrap();
        let second = store.start_session(&device).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(store.active_session(&device).await.unwrap(), Some(second));
        assert_eq!(store.sessions_of(&device).len(), 2);
        // deactivated sessions still exist
        let key = SessionKey::new(device, first);
        assert!(store.session_exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_totals_fold_recorded_deltas() {
        let store = MemoryStore::new();
        let key = SessionKey::new("collar-01", "s1");
        store.insert_session(key.clone(), true);

        store.record_chunk(&make_record(&key, 100, 199)).await.unwrap();
        store.record_chunk(&make_record(&key, 80, 299)).await.unwrap();

        let totals = store.session_totals(&key).await.unwrap();
        assert_eq!(totals.cumulative_steps, 180);
        assert_eq!(totals.last_sample_number, Some(299));
        assert_eq!(store.entries(&key).len(), 2);
        assert_eq!(store.metrics().snapshot().records_written, 2);

        let other = SessionKey::new("collar-01", "s2");
        assert_eq!(store.session_totals(&other).await.unwrap(), SessionTotals::default());
    }

    #[tokio::test]
    async fn test_params_and_mapping() {
        let store = MemoryStore::new();
        let key = SessionKey::new("collar-01", "s1");
        assert!(store.load_params(&key).await.unwrap().is_none());

        let params = AlgorithmParams {
            peak_threshold: 12.0,
            ..Default::default()
        };
        store.save_params(&key, &params).await.unwrap();
        assert_eq!(store.load_params(&key).await.unwrap(), Some(params));

        let mapping = TimestampMapping {
            start_sample: 10,
            reference_epoch_ms: 1_700_000_000_000,
            nominal_period_ms: 10.0,
        };
        store.save_mapping(&key.device_id, &mapping).await.unwrap();
        assert_eq!(store.load_mapping(&key.device_id).await.unwrap(), Some(mapping));
    }
}
