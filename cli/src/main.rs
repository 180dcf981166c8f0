mod catalog;
mod cli;
mod commands;
mod config;
mod progress;

use anyhow::Context;
use clap::Parser;
use cli::{Command, SessionTunnelCli};
use session_tunnel_catalog::Catalog;
use session_tunnel_core::prelude::ShutdownHandle;
use session_tunnel_runner::prelude::{Orchestrator, SimulatedExecutor};
use session_tunnel_store::JsonFileStore;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = SessionTunnelCli::parse();
    log::debug!("Parsed CLI arguments: {cli:?}");

    let store = Arc::new(
        JsonFileStore::open(&cli.store)
            .with_context(|| format!("Failed to open store at {}", cli.store.display()))?,
    );
    let catalog = Arc::new(Catalog::builtin());

    let (time_scale, failure_rate) = match &cli.command {
        Command::Run(args) => (args.time_scale, args.failure_rate),
        _ => (1.0, 0.0),
    };
    let executor = SimulatedExecutor::new()
        .with_store(store.clone())
        .with_time_scale(time_scale)
        .with_failure_rate(failure_rate);
    let orchestrator = Orchestrator::new(catalog.clone(), store, Arc::new(executor))
        .with_think_time_scale(time_scale);

    match &cli.command {
        Command::Run(args) => {
            let shutdown = start_shutdown_listener();
            commands::run(&orchestrator, args, shutdown).await
        }
        Command::List { status, limit } => commands::list(&orchestrator, *status, *limit).await,
        Command::Results {
            run_id,
            sessions,
            json,
            samples,
        } => commands::results(&orchestrator, run_id, *sessions, *json, *samples).await,
        Command::Cleanup(args) => commands::cleanup(&orchestrator, args).await,
        Command::Catalog => catalog::print_catalog(&catalog),
    }
}

/// Trigger a shutdown on Ctrl-C so an in-progress run is stopped rather than abandoned.
fn start_shutdown_listener() -> ShutdownHandle {
    let handle = ShutdownHandle::new();

    let listener_handle = handle.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => listener_handle.shutdown(),
            Err(e) => log::error!("Failed to listen for Ctrl-C: {e}"),
        }
    });

    handle
}
