use crate::results::{ErrorTypeBreakdown, RunResults, ScenarioBreakdown};
use session_tunnel_model::{ClientSession, ErrorType, RunRecord};
use tabled::Tabled;

#[derive(Tabled)]
pub struct SummaryRow {
    pub status: String,
    pub sessions: usize,
    pub completed: usize,
    pub failed: usize,
    pub running: usize,
    #[tabled(rename = "success_%", display = "float2")]
    pub success_rate: f64,
    pub errors: usize,
    #[tabled(display = "float2")]
    pub avg_session_ms: f64,
    pub duration_ms: u64,
}

impl From<&RunResults> for SummaryRow {
    fn from(results: &RunResults) -> Self {
        Self {
            status: results.run.status.to_string(),
            sessions: results.summary.total_sessions,
            completed: results.summary.completed,
            failed: results.summary.failed,
            running: results.summary.running,
            success_rate: results.summary.success_rate,
            errors: results.summary.total_errors,
            avg_session_ms: results.summary.average_session_duration_ms,
            duration_ms: results.summary.total_duration_ms,
        }
    }
}

#[derive(Tabled)]
pub struct ScenarioRow {
    pub scenario: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub running: usize,
    #[tabled(display = "float2")]
    pub avg_duration_ms: f64,
}

impl ScenarioRow {
    pub fn new(scenario: &str, breakdown: &ScenarioBreakdown) -> Self {
        Self {
            scenario: scenario.to_string(),
            total: breakdown.total,
            passed: breakdown.passed,
            failed: breakdown.failed,
            running: breakdown.running,
            avg_duration_ms: breakdown.avg_duration_ms,
        }
    }
}

#[derive(Tabled)]
pub struct ErrorTypeRow {
    pub error_type: String,
    pub count: usize,
    pub scenarios: String,
    pub samples: String,
}

impl ErrorTypeRow {
    pub fn new(error_type: ErrorType, breakdown: &ErrorTypeBreakdown) -> Self {
        Self {
            error_type: error_type.to_string(),
            count: breakdown.count,
            scenarios: breakdown
                .scenarios
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
            samples: breakdown
                .samples
                .iter()
                .map(|s| format!("[{}] {}", s.step_type, s.message))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[derive(Tabled)]
pub struct SessionRow {
    pub client_id: String,
    pub scenario: String,
    pub persona: String,
    pub status: String,
    pub steps: usize,
    pub errors: usize,
    pub duration_ms: String,
}

impl From<&ClientSession> for SessionRow {
    fn from(session: &ClientSession) -> Self {
        Self {
            client_id: session.client_id.to_string(),
            scenario: session.scenario.clone(),
            persona: session.persona.clone(),
            status: session.status.to_string(),
            steps: session.steps.len(),
            errors: session.errors.len(),
            duration_ms: session
                .duration_ms()
                .map(|ms| ms.to_string())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

#[derive(Tabled)]
pub struct RunRow {
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub spawned: u64,
    pub completed: u64,
    pub failed: u64,
    pub duration_ms: u64,
}

impl From<&RunRecord> for RunRow {
    fn from(run: &RunRecord) -> Self {
        Self {
            run_id: run.run_id.to_string(),
            status: run.status.to_string(),
            started_at: run.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            spawned: run.spawned,
            completed: run.completed,
            failed: run.failed,
            duration_ms: run.duration_ms(),
        }
    }
}

fn float2(n: &f64) -> String {
    format!("{:.2}", n)
}
