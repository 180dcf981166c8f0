use itertools::Itertools;
use serde::{Deserialize, Serialize};
use session_tunnel_model::{ClientSession, ErrorType, RunRecord, SessionStatus, TestError};
use std::collections::{BTreeMap, BTreeSet};

/// Number of sample messages kept per error type when none is asked for.
pub const DEFAULT_SAMPLE_LIMIT: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsOptions {
    /// Include every session row in the results.
    pub include_sessions: bool,
    pub sample_limit: usize,
}

impl Default for ResultsOptions {
    fn default() -> Self {
        Self {
            include_sessions: false,
            sample_limit: DEFAULT_SAMPLE_LIMIT,
        }
    }
}

/// Aggregated view of a run, computed from its persisted sessions and errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResults {
    pub run: RunRecord,
    pub summary: ResultsSummary,
    pub scenarios: BTreeMap<String, ScenarioBreakdown>,
    pub errors_by_type: BTreeMap<ErrorType, ErrorTypeBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sessions: Option<Vec<ClientSession>>,
    /// Every error of the run, grouped by type.
    pub errors: BTreeMap<ErrorType, Vec<TestError>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsSummary {
    pub total_sessions: usize,
    pub completed: usize,
    pub failed: usize,
    pub running: usize,
    /// Percentage of sessions that completed, 0 when the run has no sessions.
    pub success_rate: f64,
    pub total_errors: usize,
    pub unique_error_types: usize,
    /// Wall-clock duration of the run, 0 while it is still going.
    pub total_duration_ms: u64,
    /// Mean duration of the finished sessions, 0 when none have finished.
    pub average_session_duration_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioBreakdown {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub running: usize,
    pub avg_duration_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorTypeBreakdown {
    pub count: usize,
    pub scenarios: BTreeSet<String>,
    pub samples: Vec<ErrorSample>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSample {
    pub message: String,
    pub step_type: String,
}

/// Build the results for a run. Never fails, an empty run produces the zero shape.
pub fn summarize(
    run: RunRecord,
    sessions: Vec<ClientSession>,
    errors: Vec<TestError>,
    options: &ResultsOptions,
) -> RunResults {
    let completed = count_status(&sessions, SessionStatus::Completed);
    let failed = count_status(&sessions, SessionStatus::Failed);
    let running = count_status(&sessions, SessionStatus::Running);

    let success_rate = if sessions.is_empty() {
        0.0
    } else {
        completed as f64 / sessions.len() as f64 * 100.0
    };

    let scenarios = sessions
        .iter()
        .into_group_map_by(|s| s.scenario.clone())
        .into_iter()
        .map(|(scenario, sessions)| {
            let breakdown = ScenarioBreakdown {
                total: sessions.len(),
                passed: sessions
                    .iter()
                    .filter(|s| s.status == SessionStatus::Completed)
                    .count(),
                failed: sessions
                    .iter()
                    .filter(|s| s.status == SessionStatus::Failed)
                    .count(),
                running: sessions
                    .iter()
                    .filter(|s| s.status == SessionStatus::Running)
                    .count(),
                avg_duration_ms: mean_duration_ms(sessions.iter().copied()),
            };
            (scenario, breakdown)
        })
        .collect::<BTreeMap<_, _>>();

    let grouped_errors = errors
        .into_iter()
        .sorted_by_key(|e| e.occurred_at)
        .into_group_map_by(|e| e.error_type)
        .into_iter()
        .collect::<BTreeMap<_, _>>();

    let errors_by_type = grouped_errors
        .iter()
        .map(|(error_type, errors)| {
            let breakdown = ErrorTypeBreakdown {
                count: errors.len(),
                scenarios: errors.iter().map(|e| e.scenario.clone()).collect(),
                samples: errors
                    .iter()
                    .take(options.sample_limit)
                    .map(|e| ErrorSample {
                        message: e.message.clone(),
                        step_type: e.step_type.clone(),
                    })
                    .collect(),
            };
            (*error_type, breakdown)
        })
        .collect::<BTreeMap<_, _>>();

    let summary = ResultsSummary {
        total_sessions: sessions.len(),
        completed,
        failed,
        running,
        success_rate,
        total_errors: grouped_errors.values().map(Vec::len).sum(),
        unique_error_types: grouped_errors.len(),
        total_duration_ms: run.duration_ms(),
        average_session_duration_ms: mean_duration_ms(sessions.iter()),
    };

    RunResults {
        run,
        summary,
        scenarios,
        errors_by_type,
        sessions: options.include_sessions.then_some(sessions),
        errors: grouped_errors,
    }
}

fn count_status(sessions: &[ClientSession], status: SessionStatus) -> usize {
    sessions.iter().filter(|s| s.status == status).count()
}

fn mean_duration_ms<'a>(sessions: impl Iterator<Item = &'a ClientSession>) -> f64 {
    let durations = sessions
        .filter_map(ClientSession::duration_ms)
        .collect::<Vec<_>>();
    if durations.is_empty() {
        0.0
    } else {
        durations.iter().sum::<u64>() as f64 / durations.len() as f64
    }
}
