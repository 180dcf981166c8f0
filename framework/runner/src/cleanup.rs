use crate::registry::RunRegistry;
use chrono::Utc;
use serde::Serialize;
use session_tunnel_model::{ResourceRef, RunId};
use session_tunnel_store::{RunStore, StoreError};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CleanupError {
    #[error("run {0} is still active, stop it before cleaning up")]
    RunActive(RunId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Something cleanup could not delete. The rest of the pass carried on without it.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CleanupFailure {
    pub run_id: RunId,
    pub resource: Option<ResourceRef>,
    pub message: String,
}

/// Number of rows deleted per entity, plus whatever could not be deleted.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CleanupReport {
    pub runs: u64,
    pub sessions: u64,
    pub errors: u64,
    /// Deleted resources keyed by their kind label, e.g. `chat_messages`.
    pub resources: BTreeMap<String, u64>,
    pub failures: Vec<CleanupFailure>,
}

impl CleanupReport {
    pub fn total_deleted(&self) -> u64 {
        self.runs + self.sessions + self.errors + self.resources.values().sum::<u64>()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn merge(&mut self, other: CleanupReport) {
        self.runs += other.runs;
        self.sessions += other.sessions;
        self.errors += other.errors;
        for (kind, count) in other.resources {
            *self.resources.entry(kind).or_default() += count;
        }
        self.failures.extend(other.failures);
    }
}

/// Deletes the data runs leave behind.
///
/// Every deletion is keyed by id, so running a pass again after an interruption only deletes
/// what is left.
#[derive(Clone)]
pub struct CleanupManager {
    store: Arc<dyn RunStore>,
    registry: RunRegistry,
}

impl CleanupManager {
    pub fn new(store: Arc<dyn RunStore>, registry: RunRegistry) -> Self {
        Self { store, registry }
    }

    /// Delete a run along with its sessions, errors and the resources its sessions created.
    ///
    /// Resources go first, children before parents. If any resource can't be deleted the rows
    /// describing the run are kept so that the pass can be retried later.
    pub async fn cleanup_run(&self, run_id: &RunId) -> Result<CleanupReport, CleanupError> {
        if self.registry.is_active(run_id) {
            return Err(CleanupError::RunActive(run_id.clone()));
        }

        let mut report = self.purge_resources(run_id).await?;
        if !report.is_complete() {
            log::warn!(
                "Keeping records of run {run_id}, {} resources could not be deleted",
                report.failures.len()
            );
            return Ok(report);
        }

        report.errors = self.store.delete_errors(run_id).await?;
        report.sessions = self.store.delete_sessions(run_id).await?;
        report.runs = self.store.delete_run(run_id).await?;
        self.registry.forget(run_id);

        log::info!(
            "Cleaned up run {run_id}: {} runs, {} sessions, {} errors, {} resources",
            report.runs,
            report.sessions,
            report.errors,
            report.resources.values().sum::<u64>()
        );

        Ok(report)
    }

    /// Delete only the resources a run's sessions created, leaving its records in place.
    pub async fn purge_resources(&self, run_id: &RunId) -> Result<CleanupReport, CleanupError> {
        let sessions = self.store.list_sessions(run_id).await?;

        let mut resources = sessions
            .into_iter()
            .flat_map(|session| session.created_resources)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>();
        resources.sort_by(|a, b| {
            a.kind
                .dependency_rank()
                .cmp(&b.kind.dependency_rank())
                .then_with(|| a.cmp(b))
        });

        let mut report = CleanupReport::default();
        for resource in resources {
            match self.store.delete_resource(&resource).await {
                Ok(true) => {
                    *report
                        .resources
                        .entry(resource.kind.label().to_string())
                        .or_default() += 1;
                }
                Ok(false) => {
                    log::trace!("Resource {resource} was already deleted");
                }
                Err(e) => {
                    log::warn!("Could not delete {resource} for run {run_id}: {e}");
                    report.failures.push(CleanupFailure {
                        run_id: run_id.clone(),
                        resource: Some(resource),
                        message: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    /// Clean up every inactive run that started more than `older_than` ago.
    pub async fn sweep(&self, older_than: chrono::Duration) -> Result<CleanupReport, CleanupError> {
        let cutoff = Utc::now() - older_than;
        let run_ids = self.store.runs_started_before(cutoff).await?;
        log::info!("Sweeping {} runs started before {cutoff}", run_ids.len());

        let mut report = CleanupReport::default();
        for run_id in run_ids {
            if self.registry.is_active(&run_id) {
                log::info!("Skipping active run {run_id}");
                continue;
            }

            match self.cleanup_run(&run_id).await {
                Ok(run_report) => report.merge(run_report),
                Err(e) => {
                    log::error!("Could not clean up run {run_id}: {e}");
                    report.failures.push(CleanupFailure {
                        run_id,
                        resource: None,
                        message: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }
}
