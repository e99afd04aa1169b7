//! Session step engine.
//!
//! Locking: the slot table is a short `std::sync::Mutex` critical section that is
//! never held across `.await`. Each session slot has its own async mutex; storage
//! calls happen under that lock only, so distinct sessions run in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::{
    AlgorithmParams, AlgorithmParamsPatch, ChunkOutcome, ChunkRecord, ChunkRequest,
    ContractError, DeviceId, EngineSettings, MotionSample, SessionId, SessionIntent, SessionKey,
    SessionRegistry, SessionSnapshot, StepStore,
};
use ingestion::IngestionPipeline;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::counter::SessionCounter;
use crate::error::Result;

/// In-memory state of one session
#[derive(Debug)]
struct SessionSlot {
    /// Built lazily from storage on first use
    counter: Option<SessionCounter>,
    last_active: Instant,
    /// Set by eviction; holders must re-resolve the slot
    evicted: bool,
}

impl SessionSlot {
    fn new() -> Self {
        Self {
            counter: None,
            last_active: Instant::now(),
            evicted: false,
        }
    }

    fn touch(&mut self) {
        self.last_active = Instant::now();
    }
}

type SlotHandle = Arc<AsyncMutex<SessionSlot>>;

/// Streaming step engine over a session registry and step store
pub struct StepEngine<S> {
    store: Arc<S>,
    pipeline: IngestionPipeline,
    settings: EngineSettings,
    default_params: AlgorithmParams,
    slots: Mutex<HashMap<SessionKey, SlotHandle>>,
}

impl<S> StepEngine<S>
where
    S: SessionRegistry + StepStore + Send + Sync + 'static,
{
    /// Build an engine over `store`
    ///
    /// Fails with `ConfigValidation` when `default_params` do not pass
    /// [`AlgorithmParams::check`].
    pub fn new(
        store: Arc<S>,
        settings: EngineSettings,
        default_params: AlgorithmParams,
    ) -> Result<Self> {
        default_params.check()?;
        Ok(Self {
            store,
            pipeline: IngestionPipeline::new(settings.nominal_period_ms),
            settings,
            default_params,
            slots: Mutex::new(HashMap::new()),
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn default_params(&self) -> &AlgorithmParams {
        &self.default_params
    }

    pub fn pipeline(&self) -> &IngestionPipeline {
        &self.pipeline
    }

    /// Number of sessions held in memory
    pub fn resident_sessions(&self) -> usize {
        self.lock_slots().len()
    }

    /// Process one chunk atomically
    ///
    /// Nothing in memory advances unless the chunk record is persisted.
    #[instrument(
        name = "step_engine_process_chunk",
        skip(self, request),
        fields(device_id = %request.device_id, chunk = %request.chunk_name)
    )]
    pub async fn process_chunk(&self, request: ChunkRequest) -> Result<ChunkOutcome> {
        let result = self.process_chunk_inner(&request).await;
        if let Err(e) = &result {
            observability::record_chunk_failure(e.kind());
            warn!(error = %e, kind = e.kind(), "chunk rejected");
        }
        result
    }

    async fn process_chunk_inner(&self, request: &ChunkRequest) -> Result<ChunkOutcome> {
        let device_id = &request.device_id;
        let persisted = self.store.load_mapping(device_id).await?;
        let prepared = self.pipeline.prepare(request, persisted)?;
        let session_id = self.resolve_session(device_id, &request.intent).await?;
        let key = SessionKey::new(device_id.clone(), session_id.clone());
        let decoded: Vec<MotionSample> = prepared.samples.iter().map(|s| s.sample).collect();

        loop {
            let slot = self.slot(&key);
            let mut guard = slot.lock().await;
            if guard.evicted {
                continue;
            }

            let mut staged = match &guard.counter {
                Some(counter) => counter.clone(),
                None => self.load_counter(&key).await?,
            };
            let accepted = staged.accept(&decoded);
            let tally = staged.process(&accepted.samples);

            let record = ChunkRecord {
                device_id: device_id.clone(),
                session_id: session_id.clone(),
                chunk_name: request.chunk_name.clone(),
                steps: tally.steps,
                running_steps: tally.running_steps,
                shake_removed: tally.shake_removed,
                samples_processed: accepted.samples.len() as u64,
                first_sample_number: accepted.samples.first().map(|s| s.sample_number),
                last_sample_number: accepted.samples.last().map(|s| s.sample_number),
                temp_avg_c: prepared.temperature.avg_c,
                temperatures: prepared.temperature.timeline.clone(),
            };

            if let Some(mapping) = prepared.fresh_mapping() {
                self.store.save_mapping(device_id, &mapping).await?;
            }
            self.store.record_chunk(&record).await?;

            let outcome = ChunkOutcome {
                session_id: session_id.clone(),
                steps_in_chunk: tally.steps,
                cumulative_steps: staged.cumulative_steps(),
                running_steps: tally.running_steps,
                shake_removed: tally.shake_removed,
                samples_processed: accepted.samples.len(),
                last_sample_number: staged.last_sample_number(),
                temp_avg_c: prepared.temperature.avg_c,
                temperature_timeline: prepared.temperature.timeline.clone(),
                mapping_source: prepared.mapping_source(),
                truncated_bytes: prepared.truncated_bytes,
            };

            guard.counter = Some(staged);
            guard.touch();
            drop(guard);

            observability::record_chunk_outcome(&outcome);
            observability::record_behavior_deltas(tally.running_steps, tally.shake_removed);
            observability::record_duplicate_samples(accepted.duplicates);
            debug!(
                session_id = %session_id,
                samples = outcome.samples_processed,
                duplicates = accepted.duplicates,
                steps = outcome.steps_in_chunk,
                cumulative = outcome.cumulative_steps,
                "chunk committed"
            );

            return Ok(outcome);
        }
    }

    async fn resolve_session(
        &self,
        device_id: &DeviceId,
        intent: &SessionIntent,
    ) -> Result<SessionId> {
        match intent {
            SessionIntent::Active => Ok(self
                .store
                .active_session(device_id)
                .await?
                .ok_or_else(|| ContractError::missing_session(device_id.as_str()))?),
            SessionIntent::Explicit(session_id) => {
                let key = SessionKey::new(device_id.clone(), session_id.clone());
                if !self.store.session_exists(&key).await? {
                    return Err(
                        ContractError::unknown_session(device_id.as_str(), session_id.as_str())
                            .into(),
                    );
                }
                Ok(session_id.clone())
            }
            SessionIntent::StartNew => {
                let session_id = self.store.start_session(device_id).await?;
                info!(device_id = %device_id, session_id = %session_id, "session started");
                Ok(session_id)
            }
        }
    }

    async fn load_counter(&self, key: &SessionKey) -> Result<SessionCounter> {
        let totals = self.store.session_totals(key).await?;
        let params = self
            .store
            .load_params(key)
            .await?
            .unwrap_or_else(|| self.default_params.clone());

        info!(
            device_id = %key.device_id,
            session_id = %key.session_id,
            cumulative = totals.cumulative_steps,
            last_sample = ?totals.last_sample_number,
            "session counter seeded from storage"
        );
        Ok(SessionCounter::seeded(params, &totals))
    }

    /// Merge a params patch into the session's stored params
    ///
    /// The resident counter restarts detection with the new values; its
    /// cumulative total and high-water mark are kept.
    #[instrument(
        name = "step_engine_update_params",
        skip(self, patch),
        fields(device_id = %key.device_id, session_id = %key.session_id)
    )]
    pub async fn update_params(
        &self,
        key: &SessionKey,
        patch: &AlgorithmParamsPatch,
    ) -> Result<AlgorithmParams> {
        if !self.store.session_exists(key).await? {
            return Err(ContractError::unknown_session(
                key.device_id.as_str(),
                key.session_id.as_str(),
            )
            .into());
        }

        loop {
            let slot = self.slot(key);
            let mut guard = slot.lock().await;
            if guard.evicted {
                continue;
            }

            let stored = self
                .store
                .load_params(key)
                .await?
                .unwrap_or_else(|| self.default_params.clone());
            let merged = patch.merge_into(&stored);
            merged.check()?;
            self.store.save_params(key, &merged).await?;

            if let Some(counter) = guard.counter.as_mut() {
                counter.reconfigure(merged.clone());
            }
            guard.touch();
            drop(guard);

            observability::record_params_updated();
            info!("session params updated, detector reset");
            return Ok(merged);
        }
    }

    /// Effective params of a session (stored, or the engine defaults)
    pub async fn session_params(&self, key: &SessionKey) -> Result<AlgorithmParams> {
        Ok(self
            .store
            .load_params(key)
            .await?
            .unwrap_or_else(|| self.default_params.clone()))
    }

    /// Read-only view of a session, rebuilt from storage when not resident
    pub async fn session_snapshot(&self, key: &SessionKey) -> Result<SessionSnapshot> {
        let resident = self.lock_slots().get(key).cloned();
        if let Some(slot) = resident {
            let guard = slot.lock().await;
            if let (false, Some(counter)) = (guard.evicted, guard.counter.as_ref()) {
                return Ok(SessionSnapshot {
                    key: key.clone(),
                    cumulative_steps: counter.cumulative_steps(),
                    running_steps: counter.running_steps(),
                    shake_removed: counter.shake_removed(),
                    last_sample_number: counter.last_sample_number(),
                    pending_peaks: counter.pending_peaks(),
                    resident: true,
                });
            }
        }

        if !self.store.session_exists(key).await? {
            return Err(ContractError::unknown_session(
                key.device_id.as_str(),
                key.session_id.as_str(),
            )
            .into());
        }
        let totals = self.store.session_totals(key).await?;
        Ok(SessionSnapshot {
            key: key.clone(),
            cumulative_steps: totals.cumulative_steps,
            running_steps: totals.running_steps,
            shake_removed: totals.shake_removed,
            last_sample_number: totals.last_sample_number,
            pending_peaks: 0,
            resident: false,
        })
    }

    /// Evict sessions idle longer than the configured timeout
    pub async fn evict_idle(&self) -> usize {
        self.evict_idle_for(Duration::from_secs(self.settings.idle_timeout_s))
            .await
    }

    /// Evict sessions idle for at least `max_idle`
    ///
    /// Persisted totals are untouched; an evicted session is rebuilt from
    /// storage on its next chunk.
    #[instrument(name = "step_engine_evict_idle", skip(self))]
    pub async fn evict_idle_for(&self, max_idle: Duration) -> usize {
        let candidates: Vec<(SessionKey, SlotHandle)> = self
            .lock_slots()
            .iter()
            .map(|(key, slot)| (key.clone(), slot.clone()))
            .collect();

        let mut evicted = 0;
        for (key, slot) in candidates {
            let mut guard = slot.lock().await;
            if guard.evicted || guard.last_active.elapsed() < max_idle {
                continue;
            }
            guard.evicted = true;
            {
                let mut slots = self.lock_slots();
                if slots
                    .get(&key)
                    .is_some_and(|current| Arc::ptr_eq(current, &slot))
                {
                    slots.remove(&key);
                }
            }
            evicted += 1;
            info!(
                device_id = %key.device_id,
                session_id = %key.session_id,
                "idle session evicted"
            );
        }

        observability::record_sessions_evicted(evicted);
        observability::set_active_sessions(self.resident_sessions());
        evicted
    }

    /// Run [`StepEngine::evict_idle`] every `eviction_interval_s`
    ///
    /// The task ends once the engine is dropped.
    pub fn spawn_eviction(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::downgrade(self);
        let period = Duration::from_secs(self.settings.eviction_interval_s);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(engine) = engine.upgrade() else {
                    break;
                };
                engine.evict_idle().await;
            }
            debug!("eviction task stopped");
        })
    }

    fn slot(&self, key: &SessionKey) -> SlotHandle {
        let mut slots = self.lock_slots();
        let slot = slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(SessionSlot::new())))
            .clone();
        observability::set_active_sessions(slots.len());
        slot
    }

    fn lock_slots(&self) -> MutexGuard<'_, HashMap<SessionKey, SlotHandle>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
