//! The persistence sink for runs, client sessions, test errors and the resources sessions create.
//!
//! [RunStore] is the seam the orchestrator, collector and cleanup code write through. Writes are
//! always scoped by run id or client id so concurrent runs never touch each other's rows.

mod file;
mod memory;
mod tables;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use session_tunnel_model::{ClientSession, ResourceRef, RunId, RunRecord, RunStatus, TestError};

pub use file::JsonFileStore;
pub use memory::InMemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("{entity} already exists: {id}")]
    Duplicate { entity: &'static str, id: String },
    #[error("could not delete {resource}: {reason}")]
    DeleteRefused {
        resource: ResourceRef,
        reason: String,
    },
    #[error("store file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Which runs [RunStore::list_runs] should return.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunFilter {
    pub status: Option<RunStatus>,
    pub limit: Option<usize>,
}

impl RunFilter {
    pub fn with_status(mut self, status: RunStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[async_trait]
pub trait RunStore: Send + Sync {
    async fn insert_run(&self, run: &RunRecord) -> StoreResult<()>;

    async fn update_run(&self, run: &RunRecord) -> StoreResult<()>;

    async fn get_run(&self, run_id: &RunId) -> StoreResult<Option<RunRecord>>;

    /// Runs matching `filter`, newest first.
    async fn list_runs(&self, filter: &RunFilter) -> StoreResult<Vec<RunRecord>>;

    async fn runs_started_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<RunId>>;

    async fn insert_session(&self, session: &ClientSession) -> StoreResult<()>;

    async fn update_session(&self, session: &ClientSession) -> StoreResult<()>;

    /// Sessions of a run, in the order they were inserted.
    async fn list_sessions(&self, run_id: &RunId) -> StoreResult<Vec<ClientSession>>;

    async fn insert_errors(&self, errors: &[TestError]) -> StoreResult<()>;

    async fn list_errors(&self, run_id: &RunId) -> StoreResult<Vec<TestError>>;

    /// Record that a resource exists in the system under test.
    async fn insert_resource(&self, resource: &ResourceRef) -> StoreResult<()>;

    /// Returns `false` if there was nothing to delete.
    async fn delete_resource(&self, resource: &ResourceRef) -> StoreResult<bool>;

    /// Each of the `delete_*` operations returns the number of rows removed.
    async fn delete_errors(&self, run_id: &RunId) -> StoreResult<u64>;

    async fn delete_sessions(&self, run_id: &RunId) -> StoreResult<u64>;

    async fn delete_run(&self, run_id: &RunId) -> StoreResult<u64>;
}
