use crate::error::ConfigurationError;
use crate::weighted::WeightedTable;
use session_tunnel_catalog::{Catalog, Persona, Scenario};
use session_tunnel_model::RunConfig;
use std::sync::Arc;

/// A scenario a run can spawn, with the personas it may be played by.
#[derive(Debug)]
pub(crate) struct PlannedScenario {
    pub(crate) scenario: Arc<Scenario>,
    pub(crate) personas: Vec<Arc<Persona>>,
}

/// Everything resolved from the catalog that the spawn loop needs to pick sessions.
#[derive(Debug)]
pub(crate) struct RunPlan {
    pub(crate) scenarios: WeightedTable<PlannedScenario>,
}

/// Check a run configuration against the catalog and resolve it into a plan.
///
/// Nothing is persisted before this succeeds.
pub(crate) fn plan_run(config: &RunConfig, catalog: &Catalog) -> Result<RunPlan, ConfigurationError> {
    if config.scenarios.is_empty() {
        return Err(ConfigurationError::NoScenarios);
    }
    if config.concurrency_cap == 0 {
        return Err(ConfigurationError::ZeroConcurrency);
    }
    if config.spawn_interval_ms == 0 {
        return Err(ConfigurationError::ZeroSpawnInterval);
    }
    if config.run_duration_ms == 0 {
        return Err(ConfigurationError::ZeroRunDuration);
    }
    if config.test_data_prefix.is_empty() {
        return Err(ConfigurationError::EmptyTestDataPrefix);
    }

    let mut entries = Vec::with_capacity(config.scenarios.len());
    for entry in &config.scenarios {
        if entry.weight == 0 {
            return Err(ConfigurationError::ZeroWeight {
                scenario: entry.id.clone(),
            });
        }

        let scenario = catalog.scenario(&entry.id)?;
        if scenario.steps.is_empty() {
            return Err(ConfigurationError::EmptyScenario {
                scenario: scenario.id.clone(),
            });
        }

        let pool = config.persona_pool(entry);
        let personas = if pool.is_empty() {
            catalog.list_personas(None)?
        } else {
            catalog.list_personas(Some(pool))?
        };
        if personas.is_empty() {
            return Err(ConfigurationError::NoPersonas {
                scenario: scenario.id.clone(),
            });
        }

        for persona in &personas {
            scenario.validate_persona(persona)?;
        }

        log::debug!(
            "Planned scenario {} with weight {} and {} personas",
            scenario.id,
            entry.weight,
            personas.len()
        );

        entries.push((
            PlannedScenario {
                scenario: Arc::new(scenario.clone()),
                personas: personas.into_iter().cloned().map(Arc::new).collect(),
            },
            entry.weight,
        ));
    }

    // Weights were checked above so the table can't be empty.
    let scenarios = WeightedTable::new(entries).ok_or(ConfigurationError::NoScenarios)?;
    Ok(RunPlan { scenarios })
}
