use crate::cleanup::CleanupManager;
use crate::error::OrchestratorError;
use crate::executor::StepExecutor;
use crate::plan::plan_run;
use crate::registry::{RunHandle, RunRegistry};
use crate::run::SpawnLoop;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use session_tunnel_catalog::Catalog;
use session_tunnel_instruments::{Collector, CollectorError, ResultsOptions, RunResults};
use session_tunnel_model::{RunConfig, RunId, RunRecord, RunStats};
use session_tunnel_store::{RunFilter, RunStore};
use std::sync::Arc;

/// A persisted run, with live stats if this process is still running it.
#[derive(Debug, Clone, Serialize)]
pub struct RunOverview {
    pub record: RunRecord,
    pub live: Option<RunStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunListing {
    pub runs: Vec<RunOverview>,
    /// Runs owned by this process that have not finished yet.
    pub active_run_ids: Vec<RunId>,
}

/// Starts, observes and stops runs.
///
/// Each run is driven by its own spawn loop task. The orchestrator only keeps handles to them in
/// its [RunRegistry], so it is cheap to clone and share.
#[derive(Clone)]
pub struct Orchestrator {
    catalog: Arc<Catalog>,
    collector: Collector,
    executor: Arc<dyn StepExecutor>,
    registry: RunRegistry,
    think_time_scale: f64,
}

impl Orchestrator {
    pub fn new(
        catalog: Arc<Catalog>,
        store: Arc<dyn RunStore>,
        executor: Arc<dyn StepExecutor>,
    ) -> Self {
        Self {
            catalog,
            collector: Collector::new(store),
            executor,
            registry: RunRegistry::new(),
            think_time_scale: 1.0,
        }
    }

    /// Scale persona think time between steps. `0.0` removes it, as does a scale that isn't finite.
    pub fn with_think_time_scale(mut self, think_time_scale: f64) -> Self {
        self.think_time_scale = if think_time_scale.is_finite() {
            think_time_scale.max(0.0)
        } else {
            0.0
        };
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }

    pub fn collector(&self) -> &Collector {
        &self.collector
    }

    pub fn cleanup(&self) -> CleanupManager {
        CleanupManager::new(self.collector.store().clone(), self.registry.clone())
    }

    /// Validate `config`, create the run and start spawning sessions.
    ///
    /// Returns as soon as the run exists. Nothing is persisted if the configuration is rejected.
    pub async fn start(&self, config: RunConfig) -> Result<RunId, OrchestratorError> {
        let plan = plan_run(&config, &self.catalog)?;

        let run_id = RunId::generate();
        let record = RunRecord::new(run_id.clone(), config.clone());
        self.collector
            .run_created(&record)
            .await
            .map_err(OrchestratorError::Persistence)?;

        let handle = Arc::new(RunHandle::new(record));
        self.registry.register(handle.clone());

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let spawn_loop = SpawnLoop {
            handle: handle.clone(),
            plan,
            config,
            collector: self.collector.clone(),
            executor: self.executor.clone(),
            cleanup: self.cleanup(),
            think_time_scale: self.think_time_scale,
            rng,
            spawned: 0,
        };

        let collector = self.collector.clone();
        tokio::spawn(async move {
            let run_id = handle.run_id().clone();
            if let Err(e) = tokio::spawn(spawn_loop.run()).await {
                log::error!("Spawn loop for run {run_id} died: {e}");
                let record = handle.fail_abruptly();
                if let Err(e) = collector.run_updated(&record).await {
                    log::error!("Could not persist failure of run {run_id}: {e}");
                }
            }
        });

        log::info!("Created run {run_id}");
        Ok(run_id)
    }

    /// Live stats of a run owned by this process.
    pub fn stats(&self, run_id: &RunId) -> Option<RunStats> {
        self.registry.get(run_id).map(|handle| handle.snapshot())
    }

    /// Stop a run and wait for it to finish. Stopping a finished run returns its final stats.
    pub async fn stop(&self, run_id: &RunId) -> Result<RunStats, OrchestratorError> {
        match self.registry.get(run_id) {
            Some(handle) => {
                if let Some(stats) = handle.final_stats() {
                    return Ok(stats);
                }
                handle.request_stop();
                Ok(handle.wait_terminal().await)
            }
            None => self.persisted_final_stats(run_id).await,
        }
    }

    /// Wait for a run to finish on its own.
    pub async fn wait(&self, run_id: &RunId) -> Result<RunStats, OrchestratorError> {
        match self.registry.get(run_id) {
            Some(handle) => Ok(handle.wait_terminal().await),
            None => self.persisted_final_stats(run_id).await,
        }
    }

    pub async fn list_runs(&self, filter: &RunFilter) -> Result<RunListing, OrchestratorError> {
        let records = self
            .collector
            .store()
            .list_runs(filter)
            .await
            .map_err(OrchestratorError::Store)?;

        let runs = records
            .into_iter()
            .map(|record| {
                let live = self
                    .registry
                    .get(&record.run_id)
                    .filter(|handle| !handle.is_terminal())
                    .map(|handle| handle.snapshot());
                RunOverview { record, live }
            })
            .collect();

        Ok(RunListing {
            runs,
            active_run_ids: self.registry.active_run_ids(),
        })
    }

    pub async fn results(
        &self,
        run_id: &RunId,
        options: &ResultsOptions,
    ) -> Result<RunResults, CollectorError> {
        self.collector.results(run_id, options).await
    }

    /// Final stats for a run this process doesn't own, rebuilt from its persisted record.
    async fn persisted_final_stats(&self, run_id: &RunId) -> Result<RunStats, OrchestratorError> {
        let record = self
            .collector
            .store()
            .get_run(run_id)
            .await
            .map_err(OrchestratorError::Store)?
            .ok_or_else(|| OrchestratorError::NotFound(run_id.clone()))?;

        if !record.status.is_terminal() {
            return Err(OrchestratorError::Orphaned(run_id.clone()));
        }

        Ok(RunStats {
            run_id: record.run_id,
            status: record.status,
            started_at: record.started_at,
            completed_at: record.completed_at,
            spawned: record.spawned,
            completed: record.completed,
            failed: record.failed,
            running: Vec::new(),
        })
    }
}
