use crate::ids::{ClientId, RunId};
use crate::record::RunStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point in time view of a run's counters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunStats {
    pub run_id: RunId,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub spawned: u64,
    pub completed: u64,
    pub failed: u64,
    /// Sessions that were running when the snapshot was taken.
    pub running: Vec<LiveSession>,
}

impl RunStats {
    pub fn clients_running(&self) -> usize {
        self.running.len()
    }

    pub fn running_client_ids(&self) -> Vec<&ClientId> {
        self.running.iter().map(|s| &s.client_id).collect()
    }

    /// Percentage of spawned sessions that completed. Zero when nothing was spawned.
    pub fn success_rate(&self) -> f64 {
        if self.spawned == 0 {
            0.0
        } else {
            self.completed as f64 / self.spawned as f64 * 100.0
        }
    }
}

/// Progress of one running session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LiveSession {
    pub client_id: ClientId,
    pub scenario: String,
    pub persona: String,
    /// Index of the step in progress, `None` before the first step starts.
    pub current_step: Option<usize>,
    pub total_steps: usize,
    pub current_step_type: Option<String>,
    pub description: String,
    pub started_at: DateTime<Utc>,
}
