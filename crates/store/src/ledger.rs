//! Ledger entries and the helpers both stores share.

use chrono::{DateTime, Utc};
use contracts::{ChunkRecord, DeviceId, SessionId, SessionTotals};
use serde::{Deserialize, Serialize};

/// One persisted chunk delta
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub record: ChunkRecord,
}

impl LedgerEntry {
    /// Stamp a record with the current time
    pub fn now(record: ChunkRecord) -> Self {
        Self {
            recorded_at: Utc::now(),
            record,
        }
    }
}

/// Fold entries into session totals
pub fn fold(entries: &[LedgerEntry]) -> SessionTotals {
    entries.iter().map(|entry| &entry.record).collect()
}

/// New session id: UTC start time plus a store-wide sequence number
pub fn session_id(device_id: &DeviceId, seq: u64) -> SessionId {
    let started = Utc::now().format("%Y%m%dT%H%M%SZ");
    SessionId::from(format!("{device_id}-{started}-{seq}"))
}

/// File-name-safe encoding of an identifier
///
/// Bytes outside `[A-Za-z0-9_-]` become `%XX`, so distinct ids never collide.
pub fn path_component(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(steps: u64, last: u32) -> ChunkRecord {
        ChunkRecord {
            device_id: "collar-01".into(),
            session_id: "s1".into(),
            chunk_name: "a.bin".to_string(),
            steps,
            running_steps: 0,
            shake_removed: 0,
            samples_processed: 32,
            first_sample_number: Some(0),
            last_sample_number: Some(last),
            temp_avg_c: None,
            temperatures: Vec::new(),
        }
    }

    #[test]
    fn test_entry_json_is_flat() {
        let entry = LedgerEntry::now(make_record(4, 31));
        let json = serde_json::to_value(&entry).unwrap();

        assert!(json.get("recorded_at").is_some());
        assert_eq!(json["steps"], 4);
        assert_eq!(json["device_id"], "collar-01");

        let parsed: LedgerEntry = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_fold() {
        let entries = vec![
            LedgerEntry::now(make_record(100, 500)),
            LedgerEntry::now(make_record(80, 900)),
        ];
        let totals = fold(&entries);
        assert_eq!(totals.cumulative_steps, 180);
        assert_eq!(totals.last_sample_number, Some(900));
        assert_eq!(totals.chunks, 2);
    }

    #[test]
    fn test_path_component() {
        assert_eq!(path_component("collar-01"), "collar-01");
        assert_eq!(path_component("a/b"), "a%2Fb");
        assert_ne!(path_component("a.b"), path_component("a%2Eb"));
    }

    #[test]
    fn test_session_id_carries_device_and_seq() {
        let id = session_id(&"collar-01".into(), 7);
        assert!(id.starts_with("collar-01-"));
        assert!(id.ends_with("-7"));
    }
}
