//! # Integration Tests
//!
//! Cross-crate scenarios for the step engine.
//!
//! Covers:
//! - Configuration contract snapshots
//! - Restart recovery and storage failure retries
//! - Chunking, de-duplication and eviction behavior end to end

#[cfg(test)]
mod support {
    use std::sync::atomic::{AtomicBool, Ordering};

    use contracts::{
        AlgorithmParams, ChunkRecord, ChunkRequest, ContractError, DeviceId, EngineSettings,
        MotionSample, SessionId, SessionIntent, SessionKey, SessionRegistry, SessionTotals,
        StepStore, TimestampMapping,
    };
    use ingestion::encode_samples;
    use std::sync::Arc;
    use step_engine::StepEngine;
    use store::{MemoryStore, StoreError};

    pub const DEVICE: &str = "collar-01";

    pub fn make_engine<S>(store: Arc<S>) -> StepEngine<S>
    where
        S: SessionRegistry + StepStore + Send + Sync + 'static,
    {
        StepEngine::new(store, EngineSettings::default(), AlgorithmParams::default()).unwrap()
    }

    pub fn make_chunk(name: &str, samples: &[MotionSample], intent: SessionIntent) -> ChunkRequest {
        ChunkRequest::raw(DEVICE, name, encode_samples(samples)).with_intent(intent)
    }

    /// Memory store whose chunk writes can be switched off
    #[derive(Debug, Default)]
    pub struct FlakyStore {
        pub inner: MemoryStore,
        fail_writes: AtomicBool,
    }

    impl FlakyStore {
        pub fn set_failing(&self, failing: bool) {
            self.fail_writes.store(failing, Ordering::SeqCst);
        }
    }

    impl SessionRegistry for FlakyStore {
        async fn active_session(
            &self,
            device_id: &DeviceId,
        ) -> Result<Option<SessionId>, ContractError> {
            self.inner.active_session(device_id).await
        }

        async fn start_session(&self, device_id: &DeviceId) -> Result<SessionId, ContractError> {
            self.inner.start_session(device_id).await
        }

        async fn session_exists(&self, key: &SessionKey) -> Result<bool, ContractError> {
            self.inner.session_exists(key).await
        }
    }

    impl StepStore for FlakyStore {
        async fn session_totals(&self, key: &SessionKey) -> Result<SessionTotals, ContractError> {
            self.inner.session_totals(key).await
        }

        async fn record_chunk(&self, record: &ChunkRecord) -> Result<(), ContractError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StoreError::unavailable("record_chunk", "ledger offline").into());
            }
            self.inner.record_chunk(record).await
        }

        async fn load_params(
            &self,
            key: &SessionKey,
        ) -> Result<Option<AlgorithmParams>, ContractError> {
            self.inner.load_params(key).await
        }

        async fn save_params(
            &self,
            key: &SessionKey,
            params: &AlgorithmParams,
        ) -> Result<(), ContractError> {
            self.inner.save_params(key, params).await
        }

        async fn load_mapping(
            &self,
            device_id: &DeviceId,
        ) -> Result<Option<TimestampMapping>, ContractError> {
            self.inner.load_mapping(device_id).await
        }

        async fn save_mapping(
            &self,
            device_id: &DeviceId,
            mapping: &TimestampMapping,
        ) -> Result<(), ContractError> {
            self.inner.save_mapping(device_id, mapping).await
        }
    }
}

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{LogFormat, StoreKind};

    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
        assert_eq!(contracts::SAMPLE_RECORD_SIZE, 32);
    }

    #[test]
    fn test_full_config_snapshot() {
        let toml = r#"
[engine]
nominal_period_ms = 31.25
idle_timeout_s = 600
eviction_interval_s = 30

[params]
peak_threshold = 11.0
process_window_samples = 128

[store]
kind = "memory"

[observability]
log_format = "json"
log_level = "debug"
metrics_port = 9100
"#;
        let blueprint = ConfigLoader::load_from_str(toml, ConfigFormat::Toml).unwrap();
        assert_eq!(blueprint.engine.nominal_period_ms, 31.25);
        assert_eq!(blueprint.engine.idle_timeout_s, 600);
        assert_eq!(blueprint.store.kind, StoreKind::Memory);
        assert_eq!(blueprint.observability.log_format, LogFormat::Json);
        assert_eq!(blueprint.observability.metrics_port, Some(9100));

        let params = blueprint.params.resolve();
        assert_eq!(params.peak_threshold, 11.0);
        assert_eq!(params.process_window_samples, 128);
        assert_eq!(params.filter_window, 5);

        let json = ConfigLoader::to_json(&blueprint).unwrap();
        let reparsed = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(reparsed.params, blueprint.params);
        assert_eq!(reparsed.engine, blueprint.engine);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::{BufMut, BytesMut};
    use contracts::{
        AlgorithmParamsPatch, ChunkRecord, SessionIntent, SessionKey, SessionRegistry, StepStore,
    };
    use ingestion::{encode_samples, SyntheticMotion};
    use store::{FileStore, MemoryStore};
    use tempfile::tempdir;

    use crate::support::{make_chunk, make_engine, FlakyStore, DEVICE};

    /// 276 samples: rest16, walk(cycles), rest; one window flush
    fn walk_chunk(start: u32, cycles: usize) -> Vec<contracts::MotionSample> {
        SyntheticMotion::new(start)
            .rest(16)
            .walk(cycles)
            .rest(260 - 16 * cycles)
            .build()
    }

    #[tokio::test]
    async fn test_persisted_180_plus_4() {
        let store = Arc::new(MemoryStore::new());
        let key = SessionKey::new(DEVICE, "s-180");
        store.insert_session(key.clone(), true);
        store
            .record_chunk(&ChunkRecord {
                device_id: key.device_id.clone(),
                session_id: key.session_id.clone(),
                chunk_name: "earlier".to_string(),
                steps: 180,
                running_steps: 0,
                shake_removed: 0,
                samples_processed: 1000,
                first_sample_number: Some(0),
                last_sample_number: Some(999),
                temp_avg_c: None,
                temperatures: Vec::new(),
            })
            .await
            .unwrap();

        let engine = make_engine(store);
        let outcome = engine
            .process_chunk(make_chunk("next", &walk_chunk(1000, 4), SessionIntent::Active))
            .await
            .unwrap();

        assert_eq!(outcome.session_id, key.session_id);
        assert_eq!(outcome.steps_in_chunk, 4);
        assert_eq!(outcome.cumulative_steps, 184);
        assert_eq!(outcome.last_sample_number, Some(1275));
    }

    #[tokio::test]
    async fn test_restart_recovery_with_file_store() {
        let dir = tempdir().unwrap();
        let first = walk_chunk(0, 10);
        let second = walk_chunk(260, 6);

        let session_id = {
            let engine = make_engine(Arc::new(FileStore::open(dir.path()).await.unwrap()));
            let outcome = engine
                .process_chunk(make_chunk("a", &first, SessionIntent::StartNew))
                .await
                .unwrap();
            assert_eq!(outcome.cumulative_steps, 10);
            outcome.session_id
        };

        // fresh process: totals come from the ledger
        let engine = make_engine(Arc::new(FileStore::open(dir.path()).await.unwrap()));
        let replayed = engine
            .process_chunk(make_chunk("a", &first, SessionIntent::Active))
            .await
            .unwrap();
        assert_eq!(replayed.session_id, session_id);
        assert_eq!(replayed.steps_in_chunk, 0);
        assert_eq!(replayed.cumulative_steps, 10);

        let next = engine
            .process_chunk(make_chunk("b", &second, SessionIntent::Active))
            .await
            .unwrap();
        assert!(next.cumulative_steps >= 10);
        assert_eq!(next.cumulative_steps, 10 + next.steps_in_chunk);

        let key = SessionKey::new(DEVICE, session_id);
        assert_eq!(engine.store().entries(&key).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_storage_failure_leaves_state_untouched() {
        let trace = SyntheticMotion::new(0).rest(16).walk(30).rest(300).build();
        let (a, b) = trace.split_at(300);

        let control = make_engine(Arc::new(MemoryStore::new()));
        control
            .process_chunk(make_chunk("a", a, SessionIntent::StartNew))
            .await
            .unwrap();
        let expected = control
            .process_chunk(make_chunk("b", b, SessionIntent::Active))
            .await
            .unwrap();

        let store = Arc::new(FlakyStore::default());
        let engine = make_engine(store.clone());
        let first = engine
            .process_chunk(make_chunk("a", a, SessionIntent::StartNew))
            .await
            .unwrap();
        let key = SessionKey::new(DEVICE, first.session_id.clone());
        let before = engine.session_snapshot(&key).await.unwrap();

        store.set_failing(true);
        let err = engine
            .process_chunk(make_chunk("b", b, SessionIntent::Active))
            .await
            .unwrap_err();
        assert!(err.is_storage());
        assert_eq!(err.kind(), "storage_error");
        assert_eq!(engine.session_snapshot(&key).await.unwrap(), before);

        store.set_failing(false);
        let retried = engine
            .process_chunk(make_chunk("b", b, SessionIntent::Active))
            .await
            .unwrap();
        assert_eq!(retried.steps_in_chunk, expected.steps_in_chunk);
        assert_eq!(retried.cumulative_steps, expected.cumulative_steps);
        assert_eq!(store.inner.entries(&key).len(), 2);
    }

    #[tokio::test]
    async fn test_chunking_does_not_change_totals() {
        let trace = SyntheticMotion::new(0)
            .rest(16)
            .walk(12)
            .run(10)
            .walk(6)
            .shake(5)
            .walk(4)
            .rest(400)
            .build();

        let mut totals = Vec::new();
        for size in [trace.len(), 100, 33, 256] {
            let engine = make_engine(Arc::new(MemoryStore::new()));
            let mut last = None;
            for (i, part) in trace.chunks(size).enumerate() {
                let intent = if i == 0 {
                    SessionIntent::StartNew
                } else {
                    SessionIntent::Active
                };
                let outcome = engine
                    .process_chunk(make_chunk(&format!("part-{i}"), part, intent))
                    .await
                    .unwrap();
                last = Some(outcome);
            }
            let last = last.unwrap();
            totals.push((last.cumulative_steps, last.last_sample_number));
        }

        assert!(totals[0].0 > 0);
        assert!(totals.iter().all(|t| *t == totals[0]), "{totals:?}");
    }

    #[tokio::test]
    async fn test_overlapping_and_shuffled_chunks() {
        let trace = SyntheticMotion::new(0).rest(16).walk(20).rest(400).build();

        let clean = make_engine(Arc::new(MemoryStore::new()));
        clean
            .process_chunk(make_chunk("all", &trace, SessionIntent::StartNew))
            .await
            .unwrap();
        let session = clean.store().active_session(&DEVICE.into()).await.unwrap().unwrap();
        let expected = clean
            .session_snapshot(&SessionKey::new(DEVICE, session))
            .await
            .unwrap();

        let engine = make_engine(Arc::new(MemoryStore::new()));
        let mut first = trace[..200].to_vec();
        first.reverse();
        let outcome = engine
            .process_chunk(make_chunk("a", &first, SessionIntent::StartNew))
            .await
            .unwrap();
        assert_eq!(outcome.samples_processed, 200);

        // resend the tail of the first chunk with the rest
        let overlap = engine
            .process_chunk(make_chunk("b", &trace[150..], SessionIntent::Active))
            .await
            .unwrap();
        assert_eq!(overlap.samples_processed, trace.len() - 200);

        let snapshot = engine
            .session_snapshot(&SessionKey::new(DEVICE, outcome.session_id))
            .await
            .unwrap();
        assert_eq!(snapshot.cumulative_steps, expected.cumulative_steps);
        assert_eq!(snapshot.pending_peaks, expected.pending_peaks);
    }

    #[tokio::test]
    async fn test_param_update_resets_detection_only() {
        let engine = make_engine(Arc::new(MemoryStore::new()));
        let first = engine
            .process_chunk(make_chunk("a", &walk_chunk(0, 4), SessionIntent::StartNew))
            .await
            .unwrap();
        assert_eq!(first.cumulative_steps, 4);
        let key = SessionKey::new(DEVICE, first.session_id.clone());

        let strict = AlgorithmParamsPatch {
            peak_threshold: Some(16.0),
            ..Default::default()
        };
        engine.update_params(&key, &strict).await.unwrap();
        let muted = engine
            .process_chunk(make_chunk("b", &walk_chunk(260, 4), SessionIntent::Active))
            .await
            .unwrap();
        assert_eq!(muted.steps_in_chunk, 0);
        assert_eq!(muted.cumulative_steps, 4);

        let relaxed = AlgorithmParamsPatch {
            peak_threshold: Some(10.5),
            ..Default::default()
        };
        engine.update_params(&key, &relaxed).await.unwrap();
        let counted = engine
            .process_chunk(make_chunk("c", &walk_chunk(520, 4), SessionIntent::Active))
            .await
            .unwrap();
        assert_eq!(counted.steps_in_chunk, 4);
        assert_eq!(counted.cumulative_steps, 8);
    }

    #[tokio::test]
    async fn test_eviction_then_resume() {
        let engine = make_engine(Arc::new(MemoryStore::new()));
        let first = engine
            .process_chunk(make_chunk("a", &walk_chunk(0, 5), SessionIntent::StartNew))
            .await
            .unwrap();

        assert_eq!(engine.evict_idle_for(Duration::ZERO).await, 1);
        assert_eq!(engine.resident_sessions(), 0);

        let duplicate = engine
            .process_chunk(make_chunk("a", &walk_chunk(0, 5), SessionIntent::Active))
            .await
            .unwrap();
        assert_eq!(duplicate.steps_in_chunk, 0);
        assert_eq!(duplicate.cumulative_steps, first.cumulative_steps);

        let next = engine
            .process_chunk(make_chunk("b", &walk_chunk(260, 3), SessionIntent::Active))
            .await
            .unwrap();
        assert!(next.cumulative_steps >= first.cumulative_steps);
        assert_eq!(engine.resident_sessions(), 1);
    }

    #[tokio::test]
    async fn test_sessions_of_different_devices_run_concurrently() {
        let engine = Arc::new(make_engine(Arc::new(MemoryStore::new())));

        let tasks: Vec<_> = ["collar-a", "collar-b", "collar-c"]
            .into_iter()
            .map(|device| {
                let engine = engine.clone();
                tokio::spawn(async move {
                    let request = contracts::ChunkRequest::raw(
                        device,
                        "a",
                        encode_samples(&walk_chunk(0, 7)),
                    )
                    .with_intent(SessionIntent::StartNew);
                    engine.process_chunk(request).await
                })
            })
            .collect();

        for task in tasks {
            let outcome = task.await.unwrap().unwrap();
            assert_eq!(outcome.cumulative_steps, 7);
        }
        assert_eq!(engine.resident_sessions(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_session_chunks_serialize_under_eviction() {
        let engine = Arc::new(make_engine(Arc::new(MemoryStore::new())));
        let trace = SyntheticMotion::new(0).rest(16).walk(10).rest(600).build();

        let opening = engine
            .process_chunk(make_chunk("open", &trace[..40], SessionIntent::StartNew))
            .await
            .unwrap();
        let key = SessionKey::new(DEVICE, opening.session_id.clone());

        // overlapping windows of the same trace, all racing for one session
        let tasks: Vec<_> = (0..12)
            .map(|i| {
                let engine = engine.clone();
                let part = trace[i * 50..(i * 50 + 120).min(trace.len())].to_vec();
                tokio::spawn(async move {
                    engine
                        .process_chunk(make_chunk(&format!("part-{i}"), &part, SessionIntent::Active))
                        .await
                })
            })
            .collect();

        let evictor = {
            let engine = engine.clone();
            tokio::spawn(async move {
                let mut evicted = 0;
                for _ in 0..200 {
                    evicted += engine.evict_idle_for(Duration::ZERO).await;
                    tokio::task::yield_now().await;
                }
                evicted
            })
        };

        let mut deltas = opening.steps_in_chunk;
        let mut max_cumulative = opening.cumulative_steps;
        for task in tasks {
            let outcome = task.await.unwrap().unwrap();
            assert_eq!(outcome.session_id, key.session_id);
            deltas += outcome.steps_in_chunk;
            max_cumulative = max_cumulative.max(outcome.cumulative_steps);
        }
        evictor.await.unwrap();

        let persisted = engine.store().session_totals(&key).await.unwrap();
        assert_eq!(deltas, persisted.cumulative_steps);
        assert_eq!(max_cumulative, persisted.cumulative_steps);
        assert!(persisted.cumulative_steps <= 10, "{persisted:?}");
        assert_eq!(engine.store().entries(&key).len(), 13);

        let snapshot = engine.session_snapshot(&key).await.unwrap();
        assert_eq!(snapshot.cumulative_steps, persisted.cumulative_steps);
    }

    #[tokio::test]
    async fn test_truncated_payload_still_counts() {
        let engine = make_engine(Arc::new(MemoryStore::new()));
        let mut payload = BytesMut::from(&encode_samples(&walk_chunk(0, 4))[..]);
        payload.put_slice(&[0xAB; 13]);

        let request = contracts::ChunkRequest::raw(DEVICE, "torn", payload.freeze())
            .with_intent(SessionIntent::StartNew);
        let outcome = engine.process_chunk(request).await.unwrap();
        assert_eq!(outcome.truncated_bytes, 13);
        assert_eq!(outcome.samples_processed, 276);
        assert_eq!(outcome.steps_in_chunk, 4);
    }
}
