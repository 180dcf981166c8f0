use crate::cleanup::CleanupManager;
use crate::executor::StepExecutor;
use crate::plan::RunPlan;
use crate::registry::RunHandle;
use crate::session::{run_session, SessionPlan, SessionProgress};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use session_tunnel_core::prelude::ShutdownListener;
use session_tunnel_instruments::Collector;
use session_tunnel_model::{
    ClientId, ClientSession, ErrorType, RunConfig, RunStats, RunStatus, SessionStatus,
};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};

/// Why the spawn loop stopped spawning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpawnEnd {
    Deadline,
    MaxClients,
    Stop,
}

impl Display for SpawnEnd {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SpawnEnd::Deadline => write!(f, "run duration elapsed"),
            SpawnEnd::MaxClients => write!(f, "max clients spawned"),
            SpawnEnd::Stop => write!(f, "stop requested"),
        }
    }
}

/// Coordinates a single run from `running` to its terminal state.
///
/// The loop is the only place that spawns sessions and the only writer of the run counters.
/// Sessions report back over a channel so that finalization is serialized here too.
pub(crate) struct SpawnLoop {
    pub(crate) handle: Arc<RunHandle>,
    pub(crate) plan: RunPlan,
    pub(crate) config: RunConfig,
    pub(crate) collector: Collector,
    pub(crate) executor: Arc<dyn StepExecutor>,
    pub(crate) cleanup: CleanupManager,
    pub(crate) think_time_scale: f64,
    pub(crate) rng: StdRng,
    pub(crate) spawned: u64,
}

type LiveTasks = HashMap<ClientId, JoinHandle<()>>;

impl SpawnLoop {
    pub(crate) async fn run(mut self) -> RunStats {
        let run_id = self.handle.run_id().clone();

        let record = self
            .handle
            .update(|state| state.record.status = RunStatus::Running);
        if let Err(e) = self.collector.run_updated(&record).await {
            log::error!("Could not mark run {run_id} as running, failing the run: {e}");
            let record = self.handle.update(|state| {
                state.record.status = RunStatus::Failed;
                state.record.completed_at = Some(Utc::now());
            });
            if let Err(e) = self.collector.run_updated(&record).await {
                log::error!("Could not persist failure of run {run_id}: {e}");
            }
            return self.handle.publish_final();
        }

        log::info!(
            "Run {run_id} started: cap {}, spawn every {:?} for {:?}",
            self.config.concurrency_cap,
            self.config.spawn_interval(),
            self.config.run_duration()
        );

        let (report_sender, mut reports) = mpsc::unbounded_channel::<ClientSession>();
        let mut live = LiveTasks::new();
        let mut stop_listener = self.handle.shutdown_handle().new_listener();

        let deadline = Instant::now() + self.config.run_duration();
        let mut ticker = interval(self.config.spawn_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let end = loop {
            if self
                .config
                .max_clients
                .is_some_and(|max| self.spawned >= max)
            {
                break SpawnEnd::MaxClients;
            }

            tokio::select! {
                biased;

                _ = stop_listener.wait_for_shutdown() => break SpawnEnd::Stop,
                Some(session) = reports.recv() => self.finalize(&mut live, session).await,
                _ = sleep_until(deadline) => break SpawnEnd::Deadline,
                _ = ticker.tick() => {
                    if Instant::now() >= deadline {
                        break SpawnEnd::Deadline;
                    }
                    if live.len() < self.config.concurrency_cap {
                        self.spawn(&mut live, &report_sender).await;
                    } else {
                        log::trace!("Run {run_id} at concurrency cap, skipping tick");
                    }
                }
            }
        };

        let record = self
            .handle
            .update(|state| state.record.status = RunStatus::Stopping);
        if let Err(e) = self.collector.run_updated(&record).await {
            log::error!("Could not persist stopping state of run {run_id}: {e}");
        }
        log::info!(
            "Run {run_id} stopping ({end}), waiting for {} sessions",
            live.len()
        );

        self.drain(&mut live, &mut reports, &mut stop_listener, end, deadline)
            .await;

        let status = if self.handle.stop_requested() {
            RunStatus::Stopped
        } else {
            RunStatus::Completed
        };
        let record = self.handle.update(|state| {
            state.record.status = status;
            state.record.completed_at = Some(Utc::now());
        });
        if let Err(e) = self.collector.run_updated(&record).await {
            log::error!("Could not persist final state of run {run_id}: {e}");
        }

        if self.config.cleanup_after {
            match self.cleanup.purge_resources(&run_id).await {
                Ok(report) if report.is_complete() => {
                    log::info!(
                        "Removed {} test resources created by run {run_id}",
                        report.total_deleted()
                    );
                }
                Ok(report) => {
                    log::warn!(
                        "Cleanup after run {run_id} left {} resources behind",
                        report.failures.len()
                    );
                }
                Err(e) => log::error!("Cleanup after run {run_id} failed: {e}"),
            }
        }

        let stats = self.handle.publish_final();
        log::info!(
            "Run {run_id} {}: {} spawned, {} completed, {} failed",
            stats.status,
            stats.spawned,
            stats.completed,
            stats.failed
        );
        stats
    }

    async fn spawn(
        &mut self,
        live: &mut LiveTasks,
        report_sender: &mpsc::UnboundedSender<ClientSession>,
    ) {
        let planned = self.plan.scenarios.sample(&mut self.rng);
        let scenario = planned.scenario.clone();
        let persona = planned.personas[self.rng.gen_range(0..planned.personas.len())].clone();

        self.spawned += 1;
        let run_id = self.handle.run_id().clone();
        let client_id = ClientId::for_run(&run_id, self.spawned);
        let session = ClientSession::new(
            client_id.clone(),
            run_id.clone(),
            scenario.id.clone(),
            persona.id.clone(),
        );
        let slot = SessionProgress::new_slot(session.clone(), scenario.steps.len());

        let spawned = self.spawned;
        self.handle.update(|state| {
            state.record.spawned = spawned;
            state.live.insert(client_id.clone(), slot.clone());
        });
        log::debug!("Spawned {client_id} running {} as {}", scenario.id, persona.id);

        if let Err(e) = self.collector.session_started(&session).await {
            log::error!("Could not persist new session {client_id}, failing it: {e}");
            let failed = {
                let mut progress = slot.lock();
                progress.session.record_error(
                    ErrorType::Persistence,
                    None,
                    "session",
                    format!("could not persist session: {e}"),
                );
                progress.session.finish(SessionStatus::Failed);
                progress.session.clone()
            };
            self.finalize(live, failed).await;
            return;
        }

        let plan = SessionPlan {
            run_id,
            client_id: client_id.clone(),
            scenario,
            persona,
            test_data_prefix: self.config.test_data_prefix.clone(),
            think_time_scale: self.think_time_scale,
        };
        let executor = self.executor.clone();
        let shutdown_listener = self.handle.shutdown_handle().new_listener();
        let session_rng = StdRng::seed_from_u64(self.rng.gen());
        let report_sender = report_sender.clone();

        let task = tokio::spawn(async move {
            let session = run_session(plan, executor, slot, session_rng, shutdown_listener).await;
            if report_sender.send(session).is_err() {
                log::debug!("Run finished before the session could report");
            }
        });
        live.insert(client_id, task);
    }

    /// Wait for in-flight sessions, then force-finalize whatever is left.
    async fn drain(
        &mut self,
        live: &mut LiveTasks,
        reports: &mut mpsc::UnboundedReceiver<ClientSession>,
        stop_listener: &mut ShutdownListener,
        end: SpawnEnd,
        deadline: Instant,
    ) {
        let grace = self.config.grace_period();
        let mut stopping = end == SpawnEnd::Stop;
        let mut drain_deadline = if stopping {
            Instant::now() + grace
        } else {
            deadline.max(Instant::now()) + grace
        };

        while !live.is_empty() {
            tokio::select! {
                biased;

                Some(session) = reports.recv() => self.finalize(live, session).await,
                _ = stop_listener.wait_for_shutdown(), if !stopping => {
                    stopping = true;
                    drain_deadline = drain_deadline.min(Instant::now() + grace);
                    log::info!("Run {} cancelling {} sessions", self.handle.run_id(), live.len());
                }
                _ = sleep_until(drain_deadline) => break,
            }
        }

        while let Ok(session) = reports.try_recv() {
            self.finalize(live, session).await;
        }

        if live.is_empty() {
            return;
        }

        log::warn!(
            "Run {} forcing {} sessions to finish after the grace period",
            self.handle.run_id(),
            live.len()
        );
        for task in live.values() {
            task.abort();
        }
        for (_, slot) in self.handle.live_slots() {
            let session = slot
                .lock()
                .force_timeout("session did not finish within the grace period");
            self.finalize(live, session).await;
        }
    }

    /// Count a finished session and persist it. A session is only ever counted once.
    async fn finalize(&mut self, live: &mut LiveTasks, session: ClientSession) {
        live.remove(&session.client_id);

        let mut first_report = false;
        let record = self.handle.update(|state| {
            if state.live.remove(&session.client_id).is_none() {
                return;
            }
            first_report = true;
            match session.status {
                SessionStatus::Completed => state.record.completed += 1,
                _ => state.record.failed += 1,
            }
        });
        if !first_report {
            log::warn!("Ignoring repeated report for session {}", session.client_id);
            return;
        }

        log::debug!(
            "Session {} finished with status {} after {} errors",
            session.client_id,
            session.status,
            session.errors.len()
        );

        if let Err(e) = self.collector.session_finished(&session).await {
            log::error!("Could not persist session {}: {e}", session.client_id);
        }
        if let Err(e) = self.collector.run_updated(&record).await {
            log::error!("Could not persist counters of run {}: {e}", record.run_id);
        }
    }
}
