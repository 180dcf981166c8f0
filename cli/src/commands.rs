use crate::cli::{CleanupArgs, RunArgs};
use crate::config::build_run_config;
use crate::progress::start_progress;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use session_tunnel_core::prelude::ShutdownHandle;
use session_tunnel_instruments::{
    print_results_summary, print_run_list, print_sessions, ResultsOptions, ResultsSummary,
    RunResults,
};
use session_tunnel_model::{append_json_line, RunConfig, RunId, RunStatus};
use session_tunnel_runner::prelude::{CleanupReport, Orchestrator};
use session_tunnel_store::RunFilter;
use std::path::Path;

/// One line of the summary file, written when a run finishes.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunSummaryLine {
    run_id: RunId,
    status: RunStatus,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    config: RunConfig,
    summary: ResultsSummary,
}

pub async fn run(
    orchestrator: &Orchestrator,
    args: &RunArgs,
    shutdown: ShutdownHandle,
) -> anyhow::Result<()> {
    let config = build_run_config(args, orchestrator.catalog())?;
    let planned_runtime = config.run_duration();

    let run_id = orchestrator.start(config).await?;
    println!("Started run {run_id}");

    if !args.no_progress {
        if let Some(handle) = orchestrator.registry().get(&run_id) {
            start_progress(planned_runtime, handle)?;
        }
    }

    let mut shutdown_listener = shutdown.new_listener();
    let stats = tokio::select! {
        stats = orchestrator.wait(&run_id) => stats?,
        _ = shutdown_listener.wait_for_shutdown() => {
            println!("Received shutdown signal, stopping run...");
            orchestrator.stop(&run_id).await?
        }
    };
    log::info!(
        "Run {} finished as {} after spawning {} sessions",
        run_id,
        stats.status,
        stats.spawned
    );

    let results = orchestrator
        .results(&run_id, &ResultsOptions::default())
        .await?;
    print_results_summary(&results);

    if let Some(path) = &args.summary_file {
        write_summary_line(path, &results)?;
    }

    if stats.status == RunStatus::Failed {
        anyhow::bail!("Run {run_id} failed");
    }

    Ok(())
}

fn write_summary_line(path: &Path, results: &RunResults) -> anyhow::Result<()> {
    let line = RunSummaryLine {
        run_id: results.run.run_id.clone(),
        status: results.run.status,
        started_at: results.run.started_at,
        completed_at: results.run.completed_at,
        config: results.run.config.clone(),
        summary: results.summary.clone(),
    };
    append_json_line(&line, path)
        .with_context(|| format!("Failed to write run summary to {}", path.display()))
}

pub async fn list(
    orchestrator: &Orchestrator,
    status: Option<RunStatus>,
    limit: usize,
) -> anyhow::Result<()> {
    let mut filter = RunFilter::default().with_limit(limit);
    if let Some(status) = status {
        filter = filter.with_status(status);
    }

    let listing = orchestrator.list_runs(&filter).await?;
    let records = listing
        .runs
        .into_iter()
        .map(|overview| overview.record)
        .collect::<Vec<_>>();
    print_run_list(&records);

    Ok(())
}

pub async fn results(
    orchestrator: &Orchestrator,
    run_id: &str,
    include_sessions: bool,
    json: bool,
    sample_limit: usize,
) -> anyhow::Result<()> {
    let options = ResultsOptions {
        include_sessions,
        sample_limit,
    };
    let results = orchestrator.results(&RunId::from(run_id), &options).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    print_results_summary(&results);
    if let Some(sessions) = &results.sessions {
        print_sessions(sessions);
    }

    Ok(())
}

pub async fn cleanup(orchestrator: &Orchestrator, args: &CleanupArgs) -> anyhow::Result<()> {
    let cleanup = orchestrator.cleanup();
    let report = match &args.run_id {
        Some(run_id) => cleanup.cleanup_run(&RunId::from(run_id.as_str())).await?,
        None => {
            cleanup
                .sweep(chrono::Duration::days(i64::from(args.days_old)))
                .await?
        }
    };

    print_cleanup_report(&report);
    if !report.is_complete() {
        anyhow::bail!(
            "Cleanup left {} item(s) behind, run it again to retry",
            report.failures.len()
        );
    }

    Ok(())
}

fn print_cleanup_report(report: &CleanupReport) {
    println!(
        "Deleted {} run(s), {} session(s), {} error(s)",
        report.runs, report.sessions, report.errors
    );
    for (kind, count) in &report.resources {
        println!("Deleted {count} {kind}");
    }
    for failure in &report.failures {
        match &failure.resource {
            Some(resource) => println!(
                "Failed to delete {} for run {}: {}",
                resource, failure.run_id, failure.message
            ),
            None => println!(
                "Failed to clean up run {}: {}",
                failure.run_id, failure.message
            ),
        }
    }
}
