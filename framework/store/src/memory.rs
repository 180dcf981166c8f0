use crate::tables::Tables;
use crate::{RunFilter, RunStore, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use session_tunnel_model::{ClientSession, ResourceRef, RunId, RunRecord, TestError};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

/// A store that keeps everything in memory.
///
/// Also useful as a test double: the whole store can be taken offline, individual resources
/// can be made to refuse deletion and resource inserts can be made to fail after a budget.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    offline: AtomicBool,
    undeletable: Mutex<HashSet<ResourceRef>>,
    insert_budget: Mutex<Option<usize>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every operation fails with [StoreError::Unavailable].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn refuse_delete(&self, resource: ResourceRef) {
        self.undeletable.lock().insert(resource);
    }

    /// Accept `count` more resource inserts, then refuse every later one.
    pub fn refuse_inserts_after(&self, count: usize) {
        *self.insert_budget.lock() = Some(count);
    }

    pub fn resource_exists(&self, resource: &ResourceRef) -> bool {
        self.tables.lock().resource_exists(resource)
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("in-memory store is offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RunStore for InMemoryStore {
    async fn insert_run(&self, run: &RunRecord) -> StoreResult<()> {
        self.check_online()?;
        self.tables.lock().insert_run(run)
    }

    async fn update_run(&self, run: &RunRecord) -> StoreResult<()> {
        self.check_online()?;
        self.tables.lock().update_run(run)
    }

    async fn get_run(&self, run_id: &RunId) -> StoreResult<Option<RunRecord>> {
        self.check_online()?;
        Ok(self.tables.lock().get_run(run_id))
    }

    async fn list_runs(&self, filter: &RunFilter) -> StoreResult<Vec<RunRecord>> {
        self.check_online()?;
        Ok(self.tables.lock().list_runs(filter))
    }

    async fn runs_started_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<RunId>> {
        self.check_online()?;
        Ok(self.tables.lock().runs_started_before(cutoff))
    }

    async fn insert_session(&self, session: &ClientSession) -> StoreResult<()> {
        self.check_online()?;
        self.tables.lock().insert_session(session)
    }

    async fn update_session(&self, session: &ClientSession) -> StoreResult<()> {
        self.check_online()?;
        self.tables.lock().update_session(session)
    }

    async fn list_sessions(&self, run_id: &RunId) -> StoreResult<Vec<ClientSession>> {
        self.check_online()?;
        Ok(self.tables.lock().list_sessions(run_id))
    }

    async fn insert_errors(&self, errors: &[TestError]) -> StoreResult<()> {
        self.check_online()?;
        self.tables.lock().insert_errors(errors);
        Ok(())
    }

    async fn list_errors(&self, run_id: &RunId) -> StoreResult<Vec<TestError>> {
        self.check_online()?;
        Ok(self.tables.lock().list_errors(run_id))
    }

    async fn insert_resource(&self, resource: &ResourceRef) -> StoreResult<()> {
        self.check_online()?;
        if let Some(remaining) = self.insert_budget.lock().as_mut() {
            if *remaining == 0 {
                return Err(StoreError::Unavailable(format!(
                    "insert budget used up, refused {resource}"
                )));
            }
            *remaining -= 1;
        }
        self.tables.lock().insert_resource(resource);
        Ok(())
    }

    async fn delete_resource(&self, resource: &ResourceRef) -> StoreResult<bool> {
        self.check_online()?;
        if self.undeletable.lock().contains(resource) {
            return Err(StoreError::DeleteRefused {
                resource: resource.clone(),
                reason: "resource is locked".to_string(),
            });
        }
        Ok(self.tables.lock().delete_resource(resource))
    }

    async fn delete_errors(&self, run_id: &RunId) -> StoreResult<u64> {
        self.check_online()?;
        Ok(self.tables.lock().delete_errors(run_id))
    }

    async fn delete_sessions(&self, run_id: &RunId) -> StoreResult<u64> {
        self.check_online()?;
        Ok(self.tables.lock().delete_sessions(run_id))
    }

    async fn delete_run(&self, run_id: &RunId) -> StoreResult<u64> {
        self.check_online()?;
        Ok(self.tables.lock().delete_run(run_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use session_tunnel_model::{ClientId, ResourceKind, RunConfig, RunStatus};

    fn run(id: &str) -> RunRecord {
        RunRecord::new(RunId::from(id), RunConfig::new(vec![]))
    }

    #[tokio::test]
    async fn offline_store_rejects_writes() {
        let store = InMemoryStore::new();
        store.set_offline(true);

        let err = store.insert_run(&run("a")).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        store.set_offline(false);
        store.insert_run(&run("a")).await.unwrap();
        assert!(store.get_run(&RunId::from("a")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn duplicate_run_is_rejected() {
        let store = InMemoryStore::new();
        store.insert_run(&run("a")).await.unwrap();
        assert!(matches!(
            store.insert_run(&run("a")).await,
            Err(StoreError::Duplicate { entity: "run", .. })
        ));
    }

    #[tokio::test]
    async fn list_runs_filters_by_status() {
        let store = InMemoryStore::new();
        let mut done = run("done");
        done.status = RunStatus::Completed;
        store.insert_run(&done).await.unwrap();
        store.insert_run(&run("pending")).await.unwrap();

        let completed = store
            .list_runs(&RunFilter::default().with_status(RunStatus::Completed))
            .await
            .unwrap();
        assert_eq!(1, completed.len());
        assert_eq!(RunId::from("done"), completed[0].run_id);

        let limited = store
            .list_runs(&RunFilter::default().with_limit(1))
            .await
            .unwrap();
        assert_eq!(1, limited.len());
    }

    #[tokio::test]
    async fn sessions_are_scoped_to_their_run() {
        let store = InMemoryStore::new();
        for (run_id, seq) in [("a", 1), ("b", 1), ("a", 2)] {
            let run_id = RunId::from(run_id);
            let session = ClientSession::new(
                ClientId::for_run(&run_id, seq),
                run_id,
                "quick_browse",
                "startup_sarah",
            );
            store.insert_session(&session).await.unwrap();
        }

        let sessions = store.list_sessions(&RunId::from("a")).await.unwrap();
        assert_eq!(
            vec![ClientId::from("a_client_1"), ClientId::from("a_client_2")],
            sessions
                .into_iter()
                .map(|s| s.client_id)
                .collect::<Vec<_>>()
        );

        assert_eq!(2, store.delete_sessions(&RunId::from("a")).await.unwrap());
        assert_eq!(0, store.delete_sessions(&RunId::from("a")).await.unwrap());
        assert_eq!(1, store.list_sessions(&RunId::from("b")).await.unwrap().len());
    }

    #[tokio::test]
    async fn refused_deletes_keep_the_resource() {
        let store = InMemoryStore::new();
        let resource = ResourceRef::new(ResourceKind::Order, "test_e2e_order_1");
        store.insert_resource(&resource).await.unwrap();
        store.refuse_delete(resource.clone());

        assert!(store.delete_resource(&resource).await.is_err());
        assert!(store.resource_exists(&resource));
    }
}
