use crate::tables::Tables;
use crate::{RunFilter, RunStore, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use session_tunnel_model::{ClientSession, ResourceRef, RunId, RunRecord, TestError};
use std::path::{Path, PathBuf};

/// A store backed by a single JSON file.
///
/// The file is read once when the store is opened and rewritten after every change. It is meant
/// for the command line tool, where one process drives one run and later invocations inspect or
/// clean up what it left behind.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    tables: Mutex<Tables>,
    // Held across snapshot and write so an older snapshot can never overwrite a newer one.
    flush_lock: tokio::sync::Mutex<()>,
}

impl JsonFileStore {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let tables = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                Tables::default()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            Tables::default()
        };
        log::debug!("Opened store at {}", path.display());

        Ok(Self {
            path,
            tables: Mutex::new(tables),
            flush_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply a change to a copy of the tables and only keep it once the file has been replaced.
    async fn write<T>(&self, change: impl FnOnce(&mut Tables) -> StoreResult<T>) -> StoreResult<T> {
        let _guard = self.flush_lock.lock().await;
        let mut staged = self.tables.lock().clone();
        let out = change(&mut staged)?;
        let content = serde_json::to_vec_pretty(&staged)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        *self.tables.lock() = staged;
        Ok(out)
    }

    fn read<T>(&self, query: impl FnOnce(&Tables) -> T) -> StoreResult<T> {
        Ok(query(&self.tables.lock()))
    }
}

#[async_trait]
impl RunStore for JsonFileStore {
    async fn insert_run(&self, run: &RunRecord) -> StoreResult<()> {
        self.write(|t| t.insert_run(run)).await
    }

    async fn update_run(&self, run: &RunRecord) -> StoreResult<()> {
        self.write(|t| t.update_run(run)).await
    }

    async fn get_run(&self, run_id: &RunId) -> StoreResult<Option<RunRecord>> {
        self.read(|t| t.get_run(run_id))
    }

    async fn list_runs(&self, filter: &RunFilter) -> StoreResult<Vec<RunRecord>> {
        self.read(|t| t.list_runs(filter))
    }

    async fn runs_started_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<RunId>> {
        self.read(|t| t.runs_started_before(cutoff))
    }

    async fn insert_session(&self, session: &ClientSession) -> StoreResult<()> {
        self.write(|t| t.insert_session(session)).await
    }

    async fn update_session(&self, session: &ClientSession) -> StoreResult<()> {
        self.write(|t| t.update_session(session)).await
    }

    async fn list_sessions(&self, run_id: &RunId) -> StoreResult<Vec<ClientSession>> {
        self.read(|t| t.list_sessions(run_id))
    }

    async fn insert_errors(&self, errors: &[TestError]) -> StoreResult<()> {
        if errors.is_empty() {
            return Ok(());
        }
        self.write(|t| {
            t.insert_errors(errors);
            Ok(())
        })
        .await
    }

    async fn list_errors(&self, run_id: &RunId) -> StoreResult<Vec<TestError>> {
        self.read(|t| t.list_errors(run_id))
    }

    async fn insert_resource(&self, resource: &ResourceRef) -> StoreResult<()> {
        self.write(|t| {
            t.insert_resource(resource);
            Ok(())
        })
        .await
    }

    async fn delete_resource(&self, resource: &ResourceRef) -> StoreResult<bool> {
        self.write(|t| Ok(t.delete_resource(resource))).await
    }

    async fn delete_errors(&self, run_id: &RunId) -> StoreResult<u64> {
        self.write(|t| Ok(t.delete_errors(run_id))).await
    }

    async fn delete_sessions(&self, run_id: &RunId) -> StoreResult<u64> {
        self.write(|t| Ok(t.delete_sessions(run_id))).await
    }

    async fn delete_run(&self, run_id: &RunId) -> StoreResult<u64> {
        self.write(|t| Ok(t.delete_run(run_id))).await
    }
}
