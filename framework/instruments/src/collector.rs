use crate::results::{summarize, ResultsOptions, RunResults};
use session_tunnel_model::{ClientSession, RunId, RunRecord};
use session_tunnel_store::{RunStore, StoreError, StoreResult};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("run not found: {0}")]
    RunNotFound(RunId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Writes run, session and error rows to the store and reads them back as [RunResults].
#[derive(Clone)]
pub struct Collector {
    store: Arc<dyn RunStore>,
}

impl Collector {
    pub fn new(store: Arc<dyn RunStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RunStore> {
        &self.store
    }

    pub async fn run_created(&self, run: &RunRecord) -> StoreResult<()> {
        self.store.insert_run(run).await
    }

    pub async fn run_updated(&self, run: &RunRecord) -> StoreResult<()> {
        self.store.update_run(run).await
    }

    pub async fn session_started(&self, session: &ClientSession) -> StoreResult<()> {
        self.store.insert_session(session).await
    }

    /// Persist the terminal state of a session together with its errors.
    ///
    /// If the session row was never written, because the store was unavailable at spawn, it is
    /// inserted instead.
    pub async fn session_finished(&self, session: &ClientSession) -> StoreResult<()> {
        match self.store.update_session(session).await {
            Err(StoreError::NotFound { .. }) => self.store.insert_session(session).await?,
            other => other?,
        }
        self.store.insert_errors(&session.errors).await
    }

    pub async fn results(
        &self,
        run_id: &RunId,
        options: &ResultsOptions,
    ) -> Result<RunResults, CollectorError> {
        let run = self
            .store
            .get_run(run_id)
            .await?
            .ok_or_else(|| CollectorError::RunNotFound(run_id.clone()))?;
        let sessions = self.store.list_sessions(run_id).await?;
        let errors = self.store.list_errors(run_id).await?;

        log::debug!(
            "Summarizing run {run_id} with {} sessions and {} errors",
            sessions.len(),
            errors.len()
        );

        Ok(summarize(run, sessions, errors, options))
    }
}
