use session_tunnel_catalog::{CatalogError, PersonaMismatch};
use session_tunnel_model::RunId;
use session_tunnel_store::StoreError;

/// A run configuration that can't be started. No run record exists when this is returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("at least one scenario is required")]
    NoScenarios,
    #[error("concurrency cap must be at least 1")]
    ZeroConcurrency,
    #[error("spawn interval must be greater than zero")]
    ZeroSpawnInterval,
    #[error("run duration must be greater than zero")]
    ZeroRunDuration,
    #[error("scenario {scenario} has weight 0, weights must be at least 1")]
    ZeroWeight { scenario: String },
    #[error("scenario {scenario} has no steps")]
    EmptyScenario { scenario: String },
    #[error("scenario {scenario} has no personas to pick from")]
    NoPersonas { scenario: String },
    #[error("test data prefix must not be empty")]
    EmptyTestDataPrefix,
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    PersonaMismatch(#[from] PersonaMismatch),
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("invalid run configuration: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("could not create the run record: {0}")]
    Persistence(#[source] StoreError),
    #[error("run not found: {0}")]
    NotFound(RunId),
    #[error("run {0} is not terminal but is not owned by this orchestrator")]
    Orphaned(RunId),
    #[error(transparent)]
    Store(StoreError),
}
