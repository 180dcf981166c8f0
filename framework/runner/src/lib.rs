mod cleanup;
mod context;
mod error;
mod executor;
mod orchestrator;
mod plan;
mod registry;
mod run;
mod session;
mod simulated;
mod weighted;

pub mod prelude {
    pub use crate::cleanup::{CleanupError, CleanupFailure, CleanupManager, CleanupReport};
    pub use crate::context::StepContext;
    pub use crate::error::{ConfigurationError, OrchestratorError};
    pub use crate::executor::{StepError, StepExecutor, StepOutcome};
    pub use crate::orchestrator::{Orchestrator, RunListing, RunOverview};
    pub use crate::registry::{RunHandle, RunRegistry};
    pub use crate::simulated::SimulatedExecutor;
}
