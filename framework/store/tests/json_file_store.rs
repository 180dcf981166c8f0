use pretty_assertions::assert_eq;
use session_tunnel_model::{
    ClientId, ClientSession, ErrorType, ResourceKind, ResourceRef, RunConfig, RunId, RunRecord,
    RunStatus, ScenarioWeight, SessionStatus,
};
use session_tunnel_store::{JsonFileStore, RunFilter, RunStore};

#[tokio::test]
async fn reopened_store_sees_previous_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");

    let run_id = RunId::from("e2e_reopen");
    let mut run = RunRecord::new(
        run_id.clone(),
        RunConfig::new(vec![ScenarioWeight::new("quick_browse", 1)]),
    );
    let mut session = ClientSession::new(
        ClientId::for_run(&run_id, 1),
        run_id.clone(),
        "quick_browse",
        "ready_rachel",
    );
    let resource = ResourceRef::new(ResourceKind::Contact, "test_e2e_contact_1");

    {
        let store = JsonFileStore::open(&path).unwrap();
        store.insert_run(&run).await.unwrap();
        store.insert_session(&session).await.unwrap();
        store.insert_resource(&resource).await.unwrap();

        let error = session.record_error(ErrorType::Assertion, Some(0), "navigate", "missing hero");
        session.created_resources.push(resource.clone());
        session.finish(SessionStatus::Failed);
        store.update_session(&session).await.unwrap();
        store.insert_errors(&[error]).await.unwrap();

        run.status = RunStatus::Completed;
        run.spawned = 1;
        run.failed = 1;
        store.update_run(&run).await.unwrap();
    }

    let store = JsonFileStore::open(&path).unwrap();
    assert_eq!(Some(run), store.get_run(&run_id).await.unwrap());
    assert_eq!(vec![session], store.list_sessions(&run_id).await.unwrap());
    assert_eq!(1, store.list_errors(&run_id).await.unwrap().len());
    assert!(store.delete_resource(&resource).await.unwrap());
    assert!(!store.delete_resource(&resource).await.unwrap());

    let completed = store
        .list_runs(&RunFilter::default().with_status(RunStatus::Completed))
        .await
        .unwrap();
    assert_eq!(1, completed.len());
}

#[tokio::test]
async fn deletes_report_row_counts() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::open(dir.path().join("store.json")).unwrap();

    let run_id = RunId::from("e2e_delete");
    store
        .insert_run(&RunRecord::new(run_id.clone(), RunConfig::new(vec![])))
        .await
        .unwrap();

    assert_eq!(0, store.delete_errors(&run_id).await.unwrap());
    assert_eq!(0, store.delete_sessions(&run_id).await.unwrap());
    assert_eq!(1, store.delete_run(&run_id).await.unwrap());
    assert_eq!(0, store.delete_run(&run_id).await.unwrap());
    assert_eq!(None, store.get_run(&run_id).await.unwrap());
}

#[test]
fn corrupt_file_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    std::fs::write(&path, "not json").unwrap();

    assert!(JsonFileStore::open(&path).is_err());
}

#[tokio::test]
async fn failed_write_leaves_the_store_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    let store = JsonFileStore::open(&path).unwrap();

    // A directory where the file should go makes the final rename fail.
    std::fs::create_dir(&path).unwrap();

    let run_id = RunId::from("e2e_unwritable");
    let run = RunRecord::new(
        run_id.clone(),
        RunConfig::new(vec![ScenarioWeight::new("quick_browse", 1)]),
    );
    assert!(store.insert_run(&run).await.is_err());
    assert_eq!(None, store.get_run(&run_id).await.unwrap());
    assert!(store
        .list_runs(&RunFilter::default())
        .await
        .unwrap()
        .is_empty());

    std::fs::remove_dir(&path).unwrap();
    store.insert_run(&run).await.unwrap();
    assert_eq!(Some(run), store.get_run(&run_id).await.unwrap());
}
