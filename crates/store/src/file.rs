//! FileStore - JSON state files plus one append-only JSONL ledger per session
//!
//! Layout under the root directory:
//!
//! ```text
//! sessions.json                      session index (active map, known sessions)
//! ledger/<device>/<session>.jsonl    chunk deltas, one entry per line
//! params/<device>/<session>.json     stored algorithm params
//! mappings/<device>.json             last timestamp mapping
//! ```

use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use contracts::{
    AlgorithmParams, ChunkRecord, ContractError, DeviceId, SessionId, SessionKey,
    SessionRegistry, SessionTotals, StepStore, TimestampMapping,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, StoreError};
use crate::ledger::{self, path_component, LedgerEntry};
use crate::metrics::StoreMetrics;

const INDEX_FILE: &str = "sessions.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionIndex {
    next_seq: u64,
    active: HashMap<DeviceId, SessionId>,
    sessions: HashSet<SessionKey>,
}

/// Durable store rooted at a directory
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    index: Mutex<SessionIndex>,
    metrics: Arc<StoreMetrics>,
}

impl FileStore {
    /// Open (or create) a store directory
    #[instrument(name = "file_store_open", skip(root), fields(root = %root.as_ref().display()))]
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| StoreError::io("open", &root, e))?;

        let index: SessionIndex = read_json(&root.join(INDEX_FILE), "open")
            .await?
            .unwrap_or_default();
        info!(
            sessions = index.sessions.len(),
            active = index.active.len(),
            "file store opened"
        );

        Ok(Self {
            root,
            index: Mutex::new(index),
            metrics: Arc::new(StoreMetrics::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metrics(&self) -> Arc<StoreMetrics> {
        self.metrics.clone()
    }

    /// Known sessions of a device
    pub async fn sessions_of(&self, device_id: &DeviceId) -> Vec<SessionId> {
        let index = self.index.lock().await;
        let mut ids: Vec<SessionId> = index
            .sessions
            .iter()
            .filter(|key| &key.device_id == device_id)
            .map(|key| key.session_id.clone())
            .collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }

    /// Ledger entries of a session, oldest first
    pub async fn entries(&self, key: &SessionKey) -> Result<Vec<LedgerEntry>> {
        read_ledger(&self.ledger_path(key)).await
    }

    fn ledger_path(&self, key: &SessionKey) -> PathBuf {
        self.root
            .join("ledger")
            .join(path_component(&key.device_id))
            .join(format!("{}.jsonl", path_component(&key.session_id)))
    }

    fn params_path(&self, key: &SessionKey) -> PathBuf {
        self.root
            .join("params")
            .join(path_component(&key.device_id))
            .join(format!("{}.json", path_component(&key.session_id)))
    }

    fn mapping_path(&self, device_id: &DeviceId) -> PathBuf {
        self.root
            .join("mappings")
            .join(format!("{}.json", path_component(device_id)))
    }

    async fn append_entry(&self, entry: &LedgerEntry) -> Result<()> {
        let path = self.ledger_path(&entry.record.session_key());
        ensure_parent(&path, "record_chunk").await?;

        let mut line =
            serde_json::to_string(entry).map_err(|e| StoreError::serde("record_chunk", e))?;
        line.push('\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| StoreError::io("record_chunk", &path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| StoreError::io("record_chunk", &path, e))?;
        file.sync_data()
            .await
            .map_err(|e| StoreError::io("record_chunk", &path, e))?;
        Ok(())
    }
}

impl SessionRegistry for FileStore {
    async fn active_session(
        &self,
        device_id: &DeviceId,
    ) -> std::result::Result<Option<SessionId>, ContractError> {
        Ok(self.index.lock().await.active.get(device_id).cloned())
    }

    #[instrument(name = "file_store_start_session", skip(self), fields(device_id = %device_id))]
    async fn start_session(
        &self,
        device_id: &DeviceId,
    ) -> std::result::Result<SessionId, ContractError> {
        let mut index = self.index.lock().await;
        let seq = index.next_seq + 1;
        let session_id = ledger::session_id(device_id, seq);

        let mut next = SessionIndex {
            next_seq: seq,
            active: index.active.clone(),
            sessions: index.sessions.clone(),
        };
        next.active.insert(device_id.clone(), session_id.clone());
        next.sessions
            .insert(SessionKey::new(device_id.clone(), session_id.clone()));

        // in-memory index follows the file only after a successful write
        let written = write_json(&self.root.join(INDEX_FILE), &next, "start_session").await;
        self.metrics.observe(written)?;
        *index = next;
        self.metrics.inc_state_writes();

        debug!(session_id = %session_id, "session index written");
        Ok(session_id)
    }

    async fn session_exists(&self, key: &SessionKey) -> std::result::Result<bool, ContractError> {
        Ok(self.index.lock().await.sessions.contains(key))
    }
}

impl StepStore for FileStore {
    async fn session_totals(
        &self,
        key: &SessionKey,
    ) -> std::result::Result<SessionTotals, ContractError> {
        self.metrics.inc_ledger_reads();
        let entries = self.metrics.observe(self.entries(key).await)?;
        Ok(ledger::fold(&entries))
    }

    #[instrument(
        name = "file_store_record_chunk",
        skip(self, record),
        fields(device_id = %record.device_id, session_id = %record.session_id, steps = record.steps)
    )]
    async fn record_chunk(&self, record: &ChunkRecord) -> std::result::Result<(), ContractError> {
        let entry = LedgerEntry::now(record.clone());
        self.metrics.observe(self.append_entry(&entry).await)?;
        self.metrics.inc_records_written();
        Ok(())
    }

    async fn load_params(
        &self,
        key: &SessionKey,
    ) -> std::result::Result<Option<AlgorithmParams>, ContractError> {
        let params = read_json(&self.params_path(key), "load_params").await;
        Ok(self.metrics.observe(params)?)
    }

    async fn save_params(
        &self,
        key: &SessionKey,
        params: &AlgorithmParams,
    ) -> std::result::Result<(), ContractError> {
        let written = write_json(&self.params_path(key), params, "save_params").await;
        self.metrics.observe(written)?;
        self.metrics.inc_state_writes();
        Ok(())
    }

    async fn load_mapping(
        &self,
        device_id: &DeviceId,
    ) -> std::result::Result<Option<TimestampMapping>, ContractError> {
        let mapping = read_json(&self.mapping_path(device_id), "load_mapping").await;
        Ok(self.metrics.observe(mapping)?)
    }

    async fn save_mapping(
        &self,
        device_id: &DeviceId,
        mapping: &TimestampMapping,
    ) -> std::result::Result<(), ContractError> {
        let written = write_json(&self.mapping_path(device_id), mapping, "save_mapping").await;
        self.metrics.observe(written)?;
        self.metrics.inc_state_writes();
        Ok(())
    }
}

async fn ensure_parent(path: &Path, operation: &'static str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(operation, parent, e))?;
    }
    Ok(())
}

/// Read a JSON file; `None` when it does not exist
async fn read_json<T: DeserializeOwned>(path: &Path, operation: &'static str) -> Result<Option<T>> {
    match fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::serde(operation, e)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(operation, path, e)),
    }
}

/// Write a JSON file through a temp file and rename
async fn write_json<T: Serialize>(path: &Path, value: &T, operation: &'static str) -> Result<()> {
    ensure_parent(path, operation).await?;
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| StoreError::serde(operation, e))?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)
        .await
        .map_err(|e| StoreError::io(operation, &tmp, e))?;
    fs::rename(&tmp, path)
        .await
        .map_err(|e| StoreError::io(operation, path, e))
}

/// Parse a ledger file
///
/// A final line without its newline is a torn append and is skipped; any other
/// unparsable line is corruption.
async fn read_ledger(path: &Path) -> Result<Vec<LedgerEntry>> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::io("session_totals", path, e)),
    };

    let complete = content.ends_with('\n');
    let lines: Vec<&str> = content.lines().collect();
    let mut entries = Vec::with_capacity(lines.len());

    for (i, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<LedgerEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) if i + 1 == lines.len() && !complete => {
                warn!(path = %path.display(), error = %e, "skipping torn ledger line");
            }
            Err(e) => {
                return Err(StoreError::Corrupt {
                    path: path.to_path_buf(),
                    line: i + 1,
                    message: e.to_string(),
                })
            }
        }
    }

    Ok(entries)
}
