mod common;

use common::{catalog, config, TimedExecutor};
use pretty_assertions::assert_eq;
use session_tunnel_instruments::ResultsOptions;
use session_tunnel_model::{ErrorType, RunId, RunStatus, SessionStatus};
use session_tunnel_runner::prelude::{ConfigurationError, Orchestrator, OrchestratorError};
use session_tunnel_store::{InMemoryStore, RunFilter, RunStore};
use std::sync::Arc;
use std::time::Duration;

fn orchestrator(store: &Arc<InMemoryStore>, executor: TimedExecutor) -> Orchestrator {
    Orchestrator::new(catalog(), store.clone(), Arc::new(executor)).with_think_time_scale(0.0)
}

#[tokio::test(start_paused = true)]
async fn capped_run_spawns_max_clients_then_completes() {
    let store = Arc::new(InMemoryStore::new());
    let executor = TimedExecutor::new(Duration::from_millis(250));
    let gauge = executor.gauge.clone();
    let orchestrator = orchestrator(&store, executor);

    let mut cfg = config("critical_path");
    cfg.concurrency_cap = 2;
    cfg.spawn_interval_ms = 100;
    cfg.run_duration_ms = 500;
    cfg.max_clients = Some(3);

    let run_id = orchestrator.start(cfg).await.unwrap();
    let stats = orchestrator.wait(&run_id).await.unwrap();

    assert_eq!(RunStatus::Completed, stats.status);
    assert_eq!(3, stats.spawned);
    assert_eq!(3, stats.completed);
    assert_eq!(0, stats.failed);
    assert!(stats.running.is_empty());
    assert!(gauge.max() <= 2, "{} sessions ran at once", gauge.max());

    let sessions = store.list_sessions(&run_id).await.unwrap();
    assert_eq!(3, sessions.len());
    assert!(sessions.iter().all(|s| s.status == SessionStatus::Completed));

    let persisted = store.get_run(&run_id).await.unwrap().unwrap();
    assert_eq!(RunStatus::Completed, persisted.status);
    assert_eq!(3, persisted.completed);
}

#[tokio::test(start_paused = true)]
async fn running_sessions_never_exceed_the_cap() {
    let store = Arc::new(InMemoryStore::new());
    let executor = TimedExecutor::new(Duration::from_millis(300));
    let gauge = executor.gauge.clone();
    let orchestrator = orchestrator(&store, executor);

    let mut cfg = config("critical_path");
    cfg.concurrency_cap = 2;
    cfg.spawn_interval_ms = 10;
    cfg.run_duration_ms = 1_000;

    let run_id = orchestrator.start(cfg).await.unwrap();
    loop {
        let stats = orchestrator.stats(&run_id).unwrap();
        assert!(stats.clients_running() <= 2);
        if stats.status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(gauge.max() <= 2);
    let stats = orchestrator.wait(&run_id).await.unwrap();
    assert!(stats.spawned >= 2);
    assert_eq!(stats.spawned, stats.completed + stats.failed);
}

#[tokio::test(start_paused = true)]
async fn spawning_stops_at_max_clients() {
    let store = Arc::new(InMemoryStore::new());
    let orchestrator = orchestrator(&store, TimedExecutor::new(Duration::from_millis(1)));

    let mut cfg = config("critical_path");
    cfg.concurrency_cap = 10;
    cfg.spawn_interval_ms = 10;
    cfg.run_duration_ms = 10_000;
    cfg.max_clients = Some(5);

    let run_id = orchestrator.start(cfg).await.unwrap();
    let stats = orchestrator.wait(&run_id).await.unwrap();

    assert_eq!(5, stats.spawned);
    assert_eq!(5, store.list_sessions(&run_id).await.unwrap().len());
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_in_flight_sessions() {
    let store = Arc::new(InMemoryStore::new());
    let orchestrator = orchestrator(&store, TimedExecutor::new(Duration::from_secs(10)));

    let mut cfg = config("critical_path");
    cfg.concurrency_cap = 1;
    cfg.spawn_interval_ms = 100;
    cfg.run_duration_ms = 60_000;

    let run_id = orchestrator.start(cfg).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(1, orchestrator.stats(&run_id).unwrap().clients_running());

    let stats = orchestrator.stop(&run_id).await.unwrap();
    assert_eq!(RunStatus::Stopped, stats.status);
    assert_eq!(1, stats.spawned);
    assert_eq!(1, stats.failed);

    let sessions = store.list_sessions(&run_id).await.unwrap();
    assert_eq!(SessionStatus::Failed, sessions[0].status);
    assert_eq!(ErrorType::Cancelled, sessions[0].errors[0].error_type);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(1, orchestrator.stats(&run_id).unwrap().spawned);
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent() {
    let store = Arc::new(InMemoryStore::new());
    let orchestrator = orchestrator(&store, TimedExecutor::new(Duration::from_millis(500)));

    let mut cfg = config("critical_path");
    cfg.spawn_interval_ms = 100;
    cfg.run_duration_ms = 60_000;

    let run_id = orchestrator.start(cfg).await.unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;

    let first = orchestrator.stop(&run_id).await.unwrap();
    let second = orchestrator.stop(&run_id).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first, orchestrator.wait(&run_id).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn stopping_a_finished_run_returns_its_final_stats() {
    let store = Arc::new(InMemoryStore::new());
    let orchestrator = orchestrator(&store, TimedExecutor::new(Duration::from_millis(10)));

    let mut cfg = config("critical_path");
    cfg.spawn_interval_ms = 50;
    cfg.run_duration_ms = 200;

    let run_id = orchestrator.start(cfg).await.unwrap();
    let finished = orchestrator.wait(&run_id).await.unwrap();
    assert_eq!(RunStatus::Completed, finished.status);

    assert_eq!(finished, orchestrator.stop(&run_id).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn always_failing_step_fails_the_session_once() {
    let store = Arc::new(InMemoryStore::new());
    let orchestrator = orchestrator(&store, TimedExecutor::new(Duration::from_millis(10)));

    let mut cfg = config("always_fails");
    cfg.spawn_interval_ms = 100;
    cfg.run_duration_ms = 1_000;
    cfg.max_clients = Some(1);

    let run_id = orchestrator.start(cfg).await.unwrap();
    let stats = orchestrator.wait(&run_id).await.unwrap();
    assert_eq!(1, stats.failed);
    assert_eq!(0, stats.completed);

    let sessions = store.list_sessions(&run_id).await.unwrap();
    assert_eq!(SessionStatus::Failed, sessions[0].status);

    let errors = store.list_errors(&run_id).await.unwrap();
    assert_eq!(1, errors.len());
    assert_eq!(ErrorType::ApiError, errors[0].error_type);
    assert_eq!("api_call", errors[0].step_type);
    assert_eq!(Some(0), errors[0].step_index);
}

#[tokio::test(start_paused = true)]
async fn slow_sessions_are_timed_out_after_the_grace_period() {
    let store = Arc::new(InMemoryStore::new());
    let orchestrator = orchestrator(&store, TimedExecutor::new(Duration::from_secs(10)));

    let mut cfg = config("critical_path");
    cfg.concurrency_cap = 3;
    cfg.spawn_interval_ms = 50;
    cfg.run_duration_ms = 200;
    cfg.grace_period_ms = Some(100);

    let run_id = orchestrator.start(cfg).await.unwrap();
    let stats = orchestrator.wait(&run_id).await.unwrap();

    assert_eq!(RunStatus::Completed, stats.status);
    assert_eq!(3, stats.spawned);
    assert_eq!(3, stats.failed);

    let sessions = store.list_sessions(&run_id).await.unwrap();
    assert_eq!(3, sessions.len());
    for session in &sessions {
        assert_eq!(SessionStatus::Failed, session.status);
        assert_eq!(1, session.errors.len());
        assert_eq!(ErrorType::Timeout, session.errors[0].error_type);
    }
    assert_eq!(3, store.list_errors(&run_id).await.unwrap().len());
}

#[tokio::test(start_paused = true)]
async fn results_of_a_run_without_sessions_are_empty() {
    let store = Arc::new(InMemoryStore::new());
    let orchestrator = orchestrator(&store, TimedExecutor::new(Duration::from_millis(10)));

    let mut cfg = config("critical_path");
    cfg.max_clients = Some(0);

    let run_id = orchestrator.start(cfg).await.unwrap();
    let stats = orchestrator.wait(&run_id).await.unwrap();
    assert_eq!(0, stats.spawned);
    assert_eq!(0.0, stats.success_rate());

    let results = orchestrator
        .results(&run_id, &ResultsOptions::default())
        .await
        .unwrap();
    assert_eq!(0.0, results.summary.success_rate);
    assert!(results.scenarios.is_empty());
    assert!(results.errors_by_type.is_empty());
}

#[tokio::test(start_paused = true)]
async fn invalid_config_creates_no_run() {
    let store = Arc::new(InMemoryStore::new());
    let orchestrator = orchestrator(&store, TimedExecutor::new(Duration::from_millis(10)));

    let mut cfg = config("critical_path");
    cfg.concurrency_cap = 0;
    let err = orchestrator.start(cfg).await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::Configuration(ConfigurationError::ZeroConcurrency)
    ));

    let mut cfg = config("critical_path");
    cfg.persona_ids.push("Z".to_string());
    assert!(matches!(
        orchestrator.start(cfg).await.unwrap_err(),
        OrchestratorError::Configuration(ConfigurationError::Catalog(_))
    ));

    assert!(store.list_runs(&RunFilter::default()).await.unwrap().is_empty());
    assert!(orchestrator.registry().active_run_ids().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unavailable_store_fails_start() {
    let store = Arc::new(InMemoryStore::new());
    store.set_offline(true);
    let orchestrator = orchestrator(&store, TimedExecutor::new(Duration::from_millis(10)));

    let err = orchestrator.start(config("critical_path")).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Persistence(_)));
    assert!(orchestrator.registry().active_run_ids().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unknown_run_is_not_found() {
    let store = Arc::new(InMemoryStore::new());
    let orchestrator = orchestrator(&store, TimedExecutor::new(Duration::from_millis(10)));
    let run_id = RunId::from("e2e_missing");

    assert!(orchestrator.stats(&run_id).is_none());
    assert!(matches!(
        orchestrator.stop(&run_id).await.unwrap_err(),
        OrchestratorError::NotFound(_)
    ));
}

#[tokio::test(start_paused = true)]
async fn list_runs_includes_live_stats_for_active_runs() {
    let store = Arc::new(InMemoryStore::new());
    let orchestrator = orchestrator(&store, TimedExecutor::new(Duration::from_secs(5)));

    let mut cfg = config("critical_path");
    cfg.spawn_interval_ms = 100;
    cfg.run_duration_ms = 60_000;
    let run_id = orchestrator.start(cfg).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    let listing = orchestrator.list_runs(&RunFilter::default()).await.unwrap();
    assert_eq!(vec![run_id.clone()], listing.active_run_ids);
    assert_eq!(1, listing.runs.len());
    let live = listing.runs[0].live.as_ref().unwrap();
    assert_eq!(RunStatus::Running, live.status);
    assert_eq!(2, live.clients_running());
    assert_eq!(Some("navigate"), live.running[0].current_step_type.as_deref());

    orchestrator.stop(&run_id).await.unwrap();
    let listing = orchestrator
        .list_runs(&RunFilter::default().with_status(RunStatus::Stopped))
        .await
        .unwrap();
    assert!(listing.active_run_ids.is_empty());
    assert!(listing.runs[0].live.is_none());
}
