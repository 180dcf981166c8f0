use crate::config::RunConfig;
use crate::ids::{new_error_id, ClientId, RunId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Lifecycle of a run.
///
/// `pending -> running -> stopping -> {completed | stopped}`, or `failed` if the run could not
/// proceed at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Stopping,
    Completed,
    Stopped,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

impl Display for RunStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "stopping" => Ok(Self::Stopping),
            "completed" => Ok(Self::Completed),
            "stopped" => Ok(Self::Stopped),
            "failed" => Ok(Self::Failed),
            _ => Err(anyhow::anyhow!("Unknown run status: {s}")),
        }
    }
}

/// The persisted shape of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    pub run_id: RunId,
    pub config: RunConfig,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub spawned: u64,
    pub completed: u64,
    pub failed: u64,
}

impl RunRecord {
    pub fn new(run_id: RunId, config: RunConfig) -> Self {
        Self {
            run_id,
            config,
            status: RunStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            spawned: 0,
            completed: 0,
            failed: 0,
        }
    }

    /// Wall-clock duration of the run, zero while it has not finished.
    pub fn duration_ms(&self) -> u64 {
        self.completed_at
            .map(|end| millis_between(self.started_at, end))
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl Display for SessionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Failed,
    Skipped,
}

/// Completion marker for one scenario step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepRecord {
    pub index: usize,
    pub step_type: String,
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub error: Option<String>,
}

impl StepRecord {
    pub fn skipped(index: usize, step_type: impl Into<String>) -> Self {
        Self {
            index,
            step_type: step_type.into(),
            status: StepStatus::Skipped,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
            error: None,
        }
    }

    pub fn finished(
        index: usize,
        step_type: impl Into<String>,
        started_at: DateTime<Utc>,
        error: Option<String>,
    ) -> Self {
        let completed_at = Utc::now();
        Self {
            index,
            step_type: step_type.into(),
            status: if error.is_some() {
                StepStatus::Failed
            } else {
                StepStatus::Success
            },
            started_at,
            completed_at: Some(completed_at),
            duration_ms: Some(millis_between(started_at, completed_at)),
            error,
        }
    }
}

/// Type of an external record a session created.
///
/// The order in which kinds are deleted follows [ResourceKind::dependency_rank].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    ChatMessage,
    ChatSession,
    Contact,
    Diagnostic,
    OrderItem,
    Order,
    Other(String),
}

impl ResourceKind {
    /// Lower ranks are deleted first. Child records rank below the records they point at.
    pub fn dependency_rank(&self) -> u8 {
        match self {
            Self::ChatMessage | Self::OrderItem => 0,
            Self::Other(_) => 1,
            Self::ChatSession | Self::Contact | Self::Diagnostic | Self::Order => 2,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::ChatMessage => "chat_messages",
            Self::ChatSession => "chat_sessions",
            Self::Contact => "contacts",
            Self::Diagnostic => "diagnostics",
            Self::OrderItem => "order_items",
            Self::Order => "orders",
            Self::Other(kind) => kind,
        }
    }
}

/// Opaque reference to something a session created in the system under test.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub id: String,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl Display for ResourceRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind.label(), self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    ApiError,
    ValidationError,
    Timeout,
    Assertion,
    Exception,
    NetworkError,
    Cancelled,
    Configuration,
    Persistence,
}

impl ErrorType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ApiError => "api_error",
            Self::ValidationError => "validation_error",
            Self::Timeout => "timeout",
            Self::Assertion => "assertion",
            Self::Exception => "exception",
            Self::NetworkError => "network_error",
            Self::Cancelled => "cancelled",
            Self::Configuration => "configuration",
            Self::Persistence => "persistence",
        }
    }
}

impl Display for ErrorType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error observed by a session. Never modified once recorded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestError {
    pub error_id: String,
    pub run_id: RunId,
    pub client_id: ClientId,
    pub scenario: String,
    pub persona: String,
    pub error_type: ErrorType,
    /// `None` when the error doesn't belong to a particular step, e.g. a shutdown timeout.
    pub step_index: Option<usize>,
    pub step_type: String,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

/// One simulated client executing one scenario with one persona.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientSession {
    pub client_id: ClientId,
    pub run_id: RunId,
    pub scenario: String,
    pub persona: String,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub steps: Vec<StepRecord>,
    pub created_resources: Vec<ResourceRef>,
    pub errors: Vec<TestError>,
}

impl ClientSession {
    pub fn new(
        client_id: ClientId,
        run_id: RunId,
        scenario: impl Into<String>,
        persona: impl Into<String>,
    ) -> Self {
        Self {
            client_id,
            run_id,
            scenario: scenario.into(),
            persona: persona.into(),
            status: SessionStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            steps: Vec::new(),
            created_resources: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status != SessionStatus::Running
    }

    /// Append an error to this session and return a copy of it.
    pub fn record_error(
        &mut self,
        error_type: ErrorType,
        step_index: Option<usize>,
        step_type: impl Into<String>,
        message: impl Into<String>,
    ) -> TestError {
        let error = TestError {
            error_id: new_error_id(),
            run_id: self.run_id.clone(),
            client_id: self.client_id.clone(),
            scenario: self.scenario.clone(),
            persona: self.persona.clone(),
            error_type,
            step_index,
            step_type: step_type.into(),
            message: message.into(),
            occurred_at: Utc::now(),
        };
        self.errors.push(error.clone());
        error
    }

    /// Move the session into a terminal state.
    ///
    /// Returns `false`, leaving the session untouched, if it was already terminal or if `status`
    /// is not a terminal status.
    pub fn finish(&mut self, status: SessionStatus) -> bool {
        if self.is_terminal() || status == SessionStatus::Running {
            return false;
        }

        self.status = status;
        self.completed_at = Some(Utc::now());
        true
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.completed_at
            .map(|end| millis_between(self.started_at, end))
    }
}

fn millis_between(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    (end - start).num_milliseconds().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> ClientSession {
        ClientSession::new(
            ClientId::from("run_client_1"),
            RunId::from("run"),
            "quick_browse",
            "startup_sarah",
        )
    }

    #[test]
    fn session_finishes_exactly_once() {
        let mut session = session();
        assert!(!session.finish(SessionStatus::Running));
        assert!(session.finish(SessionStatus::Failed));
        let completed_at = session.completed_at;

        assert!(!session.finish(SessionStatus::Completed));
        assert_eq!(SessionStatus::Failed, session.status);
        assert_eq!(completed_at, session.completed_at);
        assert!(session.duration_ms().is_some());
    }

    #[test]
    fn recorded_errors_carry_session_context() {
        let mut session = session();
        let error = session.record_error(ErrorType::Timeout, Some(2), "navigate", "took too long");

        assert_eq!(1, session.errors.len());
        assert_eq!(error, session.errors[0]);
        assert_eq!("quick_browse", error.scenario);
        assert_eq!("startup_sarah", error.persona);
        assert_eq!(RunId::from("run"), error.run_id);
    }

    #[test]
    fn child_resources_rank_before_parents() {
        assert!(
            ResourceKind::OrderItem.dependency_rank() < ResourceKind::Order.dependency_rank()
        );
        assert!(
            ResourceKind::ChatMessage.dependency_rank()
                < ResourceKind::ChatSession.dependency_rank()
        );
    }

    #[test]
    fn run_status_round_trips_through_strings() {
        for status in [
            RunStatus::Pending,
            RunStatus::Running,
            RunStatus::Stopping,
            RunStatus::Completed,
            RunStatus::Stopped,
            RunStatus::Failed,
        ] {
            assert_eq!(status, status.as_str().parse::<RunStatus>().unwrap());
        }
        assert!("finished".parse::<RunStatus>().is_err());
    }

    #[test]
    fn unfinished_run_has_zero_duration() {
        let run = RunRecord::new(RunId::from("run"), RunConfig::new(vec![]));
        assert_eq!(0, run.duration_ms());
        assert_eq!(RunStatus::Pending, run.status);
    }
}
