use pretty_assertions::assert_eq;
use session_tunnel_instruments::{Collector, CollectorError, ResultsOptions};
use session_tunnel_model::{
    ClientId, ClientSession, ErrorType, RunConfig, RunId, RunRecord, ScenarioWeight,
    SessionStatus,
};
use session_tunnel_store::{InMemoryStore, RunStore};
use std::sync::Arc;

fn new_run(id: &str) -> RunRecord {
    RunRecord::new(
        RunId::from(id),
        RunConfig::new(vec![ScenarioWeight::new("critical_path", 1)]),
    )
}

#[tokio::test]
async fn results_for_unknown_run_is_not_found() {
    let collector = Collector::new(Arc::new(InMemoryStore::new()));

    let err = collector
        .results(&RunId::from("missing"), &ResultsOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CollectorError::RunNotFound(id) if id == RunId::from("missing")));
}

#[tokio::test]
async fn brand_new_run_has_an_empty_result() {
    let collector = Collector::new(Arc::new(InMemoryStore::new()));
    let run = new_run("e2e_empty");
    collector.run_created(&run).await.unwrap();

    let results = collector
        .results(&run.run_id, &ResultsOptions::default())
        .await
        .unwrap();
    assert_eq!(0.0, results.summary.success_rate);
    assert!(results.scenarios.is_empty());
    assert!(results.errors.is_empty());
}

#[tokio::test]
async fn finished_sessions_are_persisted_with_their_errors() {
    let store = Arc::new(InMemoryStore::new());
    let collector = Collector::new(store.clone());
    let run = new_run("e2e_collect");
    collector.run_created(&run).await.unwrap();

    let mut session = ClientSession::new(
        ClientId::for_run(&run.run_id, 1),
        run.run_id.clone(),
        "critical_path",
        "A",
    );
    collector.session_started(&session).await.unwrap();
    session.record_error(ErrorType::ApiError, Some(0), "api_call", "500 from upstream");
    session.finish(SessionStatus::Failed);
    collector.session_finished(&session).await.unwrap();

    let options = ResultsOptions {
        include_sessions: true,
        ..Default::default()
    };
    let results = collector.results(&run.run_id, &options).await.unwrap();
    assert_eq!(1, results.summary.failed);
    assert_eq!(1, results.summary.total_errors);
    assert_eq!(
        "500 from upstream",
        results.errors_by_type[&ErrorType::ApiError].samples[0].message
    );
    assert_eq!(Some(vec![session]), results.sessions);
}

#[tokio::test]
async fn session_missing_at_spawn_is_inserted_on_finish() {
    let store = Arc::new(InMemoryStore::new());
    let collector = Collector::new(store.clone());
    let run_id = RunId::from("e2e_late_insert");

    let mut session = ClientSession::new(
        ClientId::for_run(&run_id, 1),
        run_id.clone(),
        "critical_path",
        "B",
    );
    session.finish(SessionStatus::Completed);
    collector.session_finished(&session).await.unwrap();

    assert_eq!(1, store.list_sessions(&run_id).await.unwrap().len());
}
