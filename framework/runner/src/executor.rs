use crate::context::StepContext;
use async_trait::async_trait;
use session_tunnel_catalog::{Step, ValidationRule};
use session_tunnel_model::{ErrorType, ResourceRef};

/// Performs scenario steps against the system under test.
///
/// Implementations are shared by every session of every run, so anything a single session needs
/// to remember between steps belongs in the [StepContext].
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute(&self, step: &Step, ctx: &mut StepContext) -> Result<StepOutcome, StepError>;

    /// Check one of the scenario's expected outcomes against what the session left behind.
    ///
    /// Called for every rule once all steps ran without ending the session. Executors that cannot
    /// read the target system back accept every rule.
    async fn validate(
        &self,
        _rule: &ValidationRule,
        _ctx: &mut StepContext,
    ) -> Result<(), StepError> {
        Ok(())
    }
}

/// What a successful step did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutcome {
    /// Records the step created in the target system. Tracked so cleanup can remove them.
    pub created: Vec<ResourceRef>,
}

impl StepOutcome {
    pub fn done() -> Self {
        Self::default()
    }

    pub fn created(created: Vec<ResourceRef>) -> Self {
        Self { created }
    }
}

/// A failed step. The error type ends up on the recorded test error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{error_type}: {message}")]
pub struct StepError {
    pub error_type: ErrorType,
    pub message: String,
    /// Records the step created before it failed. They are tracked for cleanup like any other.
    pub created: Vec<ResourceRef>,
}

impl StepError {
    pub fn new(error_type: ErrorType, message: impl Into<String>) -> Self {
        Self {
            error_type,
            message: message.into(),
            created: Vec::new(),
        }
    }

    pub fn with_created(mut self, created: Vec<ResourceRef>) -> Self {
        self.created = created;
        self
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::new(ErrorType::ApiError, message)
    }

    pub fn assertion(message: impl Into<String>) -> Self {
        Self::new(ErrorType::Assertion, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorType::Timeout, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorType::ValidationError, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorType::Cancelled, "session cancelled")
    }

    pub fn is_cancellation(&self) -> bool {
        self.error_type == ErrorType::Cancelled
    }
}
