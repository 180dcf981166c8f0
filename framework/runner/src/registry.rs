use crate::session::SessionSlot;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use session_tunnel_core::prelude::ShutdownHandle;
use session_tunnel_model::{ClientId, RunId, RunRecord, RunStats, RunStatus};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::watch;

/// The in-memory side of a run that this process owns.
pub(crate) struct RunState {
    pub(crate) record: RunRecord,
    /// Sessions spawned and not yet finalized.
    pub(crate) live: BTreeMap<ClientId, SessionSlot>,
    pub(crate) stop_requested: bool,
}

/// Handle to a run owned by this process.
///
/// Counters live behind a single lock that only the run's spawn loop writes through, so a
/// snapshot never sees a half-applied update.
pub struct RunHandle {
    run_id: RunId,
    shutdown: ShutdownHandle,
    state: Mutex<RunState>,
    finished: watch::Sender<Option<RunStats>>,
}

impl RunHandle {
    pub(crate) fn new(record: RunRecord) -> Self {
        let (finished, _) = watch::channel(None);
        Self {
            run_id: record.run_id.clone(),
            shutdown: ShutdownHandle::new(),
            state: Mutex::new(RunState {
                record,
                live: BTreeMap::new(),
                stop_requested: false,
            }),
            finished,
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn status(&self) -> RunStatus {
        self.state.lock().record.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Consistent view of the run's counters and live sessions.
    pub fn snapshot(&self) -> RunStats {
        let state = self.state.lock();
        let record = &state.record;
        RunStats {
            run_id: record.run_id.clone(),
            status: record.status,
            started_at: record.started_at,
            completed_at: record.completed_at,
            spawned: record.spawned,
            completed: record.completed,
            failed: record.failed,
            running: state.live.values().map(|slot| slot.lock().live()).collect(),
        }
    }

    /// The stats the run finished with, if it has finished.
    pub fn final_stats(&self) -> Option<RunStats> {
        self.finished.borrow().clone()
    }

    /// Ask the run to stop. Sessions are cancelled and no new ones are spawned.
    pub fn request_stop(&self) {
        let mut state = self.state.lock();
        if state.record.status.is_terminal() {
            return;
        }
        if !state.stop_requested {
            log::info!("Stop requested for run {}", self.run_id);
            state.stop_requested = true;
        }
        drop(state);
        self.shutdown.shutdown();
    }

    pub fn stop_requested(&self) -> bool {
        self.state.lock().stop_requested
    }

    /// Wait for the run to reach a terminal state and return its final stats.
    pub async fn wait_terminal(&self) -> RunStats {
        let mut receiver = self.finished.subscribe();
        let stats = match receiver.wait_for(|stats| stats.is_some()).await {
            Ok(stats) => stats.clone(),
            // The sender lives as long as this handle, so this can't happen while we hold `self`.
            Err(_) => None,
        };
        stats.unwrap_or_else(|| self.snapshot())
    }

    pub(crate) fn shutdown_handle(&self) -> &ShutdownHandle {
        &self.shutdown
    }

    /// Apply a change to the run state under its lock and return a copy of the resulting record.
    pub(crate) fn update<F>(&self, f: F) -> RunRecord
    where
        F: FnOnce(&mut RunState),
    {
        let mut state = self.state.lock();
        f(&mut state);
        state.record.clone()
    }

    pub(crate) fn live_slots(&self) -> Vec<(ClientId, SessionSlot)> {
        self.state
            .lock()
            .live
            .iter()
            .map(|(id, slot)| (id.clone(), slot.clone()))
            .collect()
    }

    /// Publish the final stats. Only the first call has any effect.
    pub(crate) fn publish_final(&self) -> RunStats {
        let stats = self.snapshot();
        self.finished.send_if_modified(|current| {
            if current.is_some() {
                false
            } else {
                *current = Some(stats.clone());
                true
            }
        });
        self.final_stats().unwrap_or(stats)
    }

    /// Mark the run as failed when its spawn loop died without finishing it.
    pub(crate) fn fail_abruptly(&self) -> RunRecord {
        let record = self.update(|state| {
            if !state.record.status.is_terminal() {
                state.record.status = RunStatus::Failed;
                state.record.completed_at = Some(Utc::now());
            }
            state.live.clear();
        });
        self.shutdown.shutdown();
        self.publish_final();
        record
    }
}

/// The runs owned by this process.
///
/// This is the source of truth for whether a run is alive. Cloning gives another view of the
/// same registry.
#[derive(Clone, Default)]
pub struct RunRegistry {
    runs: Arc<RwLock<HashMap<RunId, Arc<RunHandle>>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, handle: Arc<RunHandle>) {
        self.runs.write().insert(handle.run_id().clone(), handle);
    }

    pub fn get(&self, run_id: &RunId) -> Option<Arc<RunHandle>> {
        self.runs.read().get(run_id).cloned()
    }

    pub fn contains(&self, run_id: &RunId) -> bool {
        self.runs.read().contains_key(run_id)
    }

    /// Whether the run is registered and has not reached a terminal state.
    pub fn is_active(&self, run_id: &RunId) -> bool {
        self.get(run_id).is_some_and(|handle| !handle.is_terminal())
    }

    /// Drop a run from the registry. Returns `false` if it was not registered.
    pub fn forget(&self, run_id: &RunId) -> bool {
        self.runs.write().remove(run_id).is_some()
    }

    pub fn active_run_ids(&self) -> Vec<RunId> {
        let mut ids = self
            .runs
            .read()
            .values()
            .filter(|handle| !handle.is_terminal())
            .map(|handle| handle.run_id().clone())
            .collect::<Vec<_>>();
        ids.sort();
        ids
    }
}
