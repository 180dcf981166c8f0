use crate::{RunFilter, StoreError, StoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use session_tunnel_model::{ClientId, ClientSession, ResourceRef, RunId, RunRecord, TestError};
use std::collections::{BTreeMap, BTreeSet};

/// The rows behind both store implementations.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub(crate) struct Tables {
    runs: BTreeMap<RunId, RunRecord>,
    sessions: BTreeMap<ClientId, ClientSession>,
    /// Insertion order of sessions per run.
    session_order: BTreeMap<RunId, Vec<ClientId>>,
    errors: Vec<TestError>,
    resources: BTreeSet<ResourceRef>,
}

impl Tables {
    pub(crate) fn insert_run(&mut self, run: &RunRecord) -> StoreResult<()> {
        if self.runs.contains_key(&run.run_id) {
            return Err(StoreError::Duplicate {
                entity: "run",
                id: run.run_id.to_string(),
            });
        }
        self.runs.insert(run.run_id.clone(), run.clone());
        Ok(())
    }

    pub(crate) fn update_run(&mut self, run: &RunRecord) -> StoreResult<()> {
        match self.runs.get_mut(&run.run_id) {
            Some(existing) => {
                *existing = run.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                entity: "run",
                id: run.run_id.to_string(),
            }),
        }
    }

    pub(crate) fn get_run(&self, run_id: &RunId) -> Option<RunRecord> {
        self.runs.get(run_id).cloned()
    }

    pub(crate) fn list_runs(&self, filter: &RunFilter) -> Vec<RunRecord> {
        let mut runs = self
            .runs
            .values()
            .filter(|run| filter.status.is_none_or(|status| run.status == status))
            .cloned()
            .collect::<Vec<_>>();
        runs.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| b.run_id.cmp(&a.run_id))
        });
        if let Some(limit) = filter.limit {
            runs.truncate(limit);
        }
        runs
    }

    pub(crate) fn runs_started_before(&self, cutoff: DateTime<Utc>) -> Vec<RunId> {
        self.runs
            .values()
            .filter(|run| run.started_at < cutoff)
            .map(|run| run.run_id.clone())
            .collect()
    }

    pub(crate) fn insert_session(&mut self, session: &ClientSession) -> StoreResult<()> {
        if self.sessions.contains_key(&session.client_id) {
            return Err(StoreError::Duplicate {
                entity: "session",
                id: session.client_id.to_string(),
            });
        }
        self.session_order
            .entry(session.run_id.clone())
            .or_default()
            .push(session.client_id.clone());
        self.sessions
            .insert(session.client_id.clone(), session.clone());
        Ok(())
    }

    pub(crate) fn update_session(&mut self, session: &ClientSession) -> StoreResult<()> {
        match self.sessions.get_mut(&session.client_id) {
            Some(existing) => {
                *existing = session.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                entity: "session",
                id: session.client_id.to_string(),
            }),
        }
    }

    pub(crate) fn list_sessions(&self, run_id: &RunId) -> Vec<ClientSession> {
        self.session_order
            .get(run_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.sessions.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn insert_errors(&mut self, errors: &[TestError]) {
        self.errors.extend_from_slice(errors);
    }

    pub(crate) fn list_errors(&self, run_id: &RunId) -> Vec<TestError> {
        self.errors
            .iter()
            .filter(|e| &e.run_id == run_id)
            .cloned()
            .collect()
    }

    pub(crate) fn insert_resource(&mut self, resource: &ResourceRef) {
        self.resources.insert(resource.clone());
    }

    pub(crate) fn resource_exists(&self, resource: &ResourceRef) -> bool {
        self.resources.contains(resource)
    }

    pub(crate) fn delete_resource(&mut self, resource: &ResourceRef) -> bool {
        self.resources.remove(resource)
    }

    pub(crate) fn delete_errors(&mut self, run_id: &RunId) -> u64 {
        let before = self.errors.len();
        self.errors.retain(|e| &e.run_id != run_id);
        (before - self.errors.len()) as u64
    }

    pub(crate) fn delete_sessions(&mut self, run_id: &RunId) -> u64 {
        let Some(ids) = self.session_order.remove(run_id) else {
            return 0;
        };
        ids.iter()
            .filter(|id| self.sessions.remove(*id).is_some())
            .count() as u64
    }

    pub(crate) fn delete_run(&mut self, run_id: &RunId) -> u64 {
        u64::from(self.runs.remove(run_id).is_some())
    }
}
