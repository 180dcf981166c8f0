use crate::cli::RunArgs;
use anyhow::Context;
use session_tunnel_catalog::Catalog;
use session_tunnel_model::{RunConfig, ScenarioWeight};
use std::path::Path;

/// Build the config for a new run.
///
/// Values are layered: stock defaults, then the run file, then the preset, then flags.
pub fn build_run_config(args: &RunArgs, catalog: &Catalog) -> anyhow::Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => load_run_file(path)?,
        None => RunConfig::new(Vec::new()),
    };

    if let Some(preset) = args.preset {
        config.scenarios = catalog
            .list_scenarios(Some(preset))
            .into_iter()
            .map(|scenario| ScenarioWeight::new(scenario.id.clone(), 1))
            .collect();
    }

    if !args.scenario.is_empty() {
        config.scenarios = args
            .scenario
            .iter()
            .map(|(id, weight)| ScenarioWeight::new(id.clone(), *weight))
            .collect();
    }

    if config.scenarios.is_empty() {
        anyhow::bail!(
            "No scenarios to run. Pass --scenario, --preset or a run file with --config, see `session-tunnel catalog` for what is available"
        );
    }

    if !args.persona.is_empty() {
        config.persona_ids = args.persona.clone();
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency_cap = concurrency;
    }
    if let Some(interval) = args.spawn_interval_ms {
        config.spawn_interval_ms = interval;
    }
    if let Some(duration) = args.duration {
        config.run_duration_ms = duration.saturating_mul(1_000);
    }
    if args.max_clients.is_some() {
        config.max_clients = args.max_clients;
    }
    if args.grace_period_ms.is_some() {
        config.grace_period_ms = args.grace_period_ms;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if let Some(prefix) = &args.test_data_prefix {
        config.test_data_prefix = prefix.clone();
    }
    if args.no_cleanup {
        config.cleanup_after = false;
    }

    Ok(config)
}

fn load_run_file(path: &Path) -> anyhow::Result<RunConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read run file {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse run file {}", path.display()))
}
