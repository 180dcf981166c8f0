use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Prefix applied to every piece of test data a session creates in the target system.
pub const DEFAULT_TEST_DATA_PREFIX: &str = "test_e2e_";

/// The configuration a run is started with.
///
/// A copy of this is stored on the [crate::RunRecord] and never changes after the run is created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    /// Scenarios to pick from, with their relative weights.
    #[serde(default)]
    pub scenarios: Vec<ScenarioWeight>,
    /// Persona pool shared by every scenario that doesn't set its own.
    ///
    /// An empty pool means every persona in the catalog.
    #[serde(default)]
    pub persona_ids: Vec<String>,
    /// Maximum number of sessions running at the same time.
    #[serde(default = "default_concurrency_cap")]
    pub concurrency_cap: usize,
    /// Time between spawn ticks, in milliseconds.
    #[serde(default = "default_spawn_interval_ms")]
    pub spawn_interval_ms: u64,
    /// Wall-clock window during which new sessions may be spawned, in milliseconds.
    #[serde(default = "default_run_duration_ms")]
    pub run_duration_ms: u64,
    /// Total number of sessions to spawn before the run ends on its own.
    #[serde(default)]
    pub max_clients: Option<u64>,
    /// Delete the resources created by sessions once the run is terminal.
    #[serde(default = "default_cleanup_after")]
    pub cleanup_after: bool,
    #[serde(default = "default_test_data_prefix")]
    pub test_data_prefix: String,
    /// How long in-flight sessions are awaited during shutdown before they are force-finalized.
    ///
    /// Defaults to three spawn intervals.
    #[serde(default)]
    pub grace_period_ms: Option<u64>,
    /// Seed for scenario and persona selection. Runs with the same seed spawn in the same order.
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioWeight {
    pub id: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
    /// Overrides [RunConfig::persona_ids] for this scenario.
    #[serde(default)]
    pub persona_ids: Option<Vec<String>>,
}

impl ScenarioWeight {
    pub fn new(id: impl Into<String>, weight: u32) -> Self {
        Self {
            id: id.into(),
            weight,
            persona_ids: None,
        }
    }

    pub fn with_personas(mut self, persona_ids: Vec<String>) -> Self {
        self.persona_ids = Some(persona_ids);
        self
    }
}

impl RunConfig {
    /// A config with the stock defaults for everything except the scenario set.
    pub fn new(scenarios: Vec<ScenarioWeight>) -> Self {
        Self {
            scenarios,
            persona_ids: Vec::new(),
            concurrency_cap: default_concurrency_cap(),
            spawn_interval_ms: default_spawn_interval_ms(),
            run_duration_ms: default_run_duration_ms(),
            max_clients: None,
            cleanup_after: default_cleanup_after(),
            test_data_prefix: default_test_data_prefix(),
            grace_period_ms: None,
            seed: None,
        }
    }

    pub fn spawn_interval(&self) -> Duration {
        Duration::from_millis(self.spawn_interval_ms)
    }

    pub fn run_duration(&self) -> Duration {
        Duration::from_millis(self.run_duration_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(
            self.grace_period_ms
                .unwrap_or_else(|| self.spawn_interval_ms.saturating_mul(3)),
        )
    }

    /// The persona pool for a scenario entry, falling back to the run-level pool.
    pub fn persona_pool<'a>(&'a self, entry: &'a ScenarioWeight) -> &'a [String] {
        entry
            .persona_ids
            .as_deref()
            .unwrap_or(self.persona_ids.as_slice())
    }
}

fn default_concurrency_cap() -> usize {
    3
}

fn default_spawn_interval_ms() -> u64 {
    5_000
}

fn default_run_duration_ms() -> u64 {
    60_000
}

fn default_cleanup_after() -> bool {
    true
}

fn default_test_data_prefix() -> String {
    DEFAULT_TEST_DATA_PREFIX.to_string()
}

fn default_weight() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grace_period_defaults_to_three_spawn_intervals() {
        let mut config = RunConfig::new(vec![ScenarioWeight::new("quick_browse", 1)]);
        config.spawn_interval_ms = 200;
        assert_eq!(Duration::from_millis(600), config.grace_period());

        config.grace_period_ms = Some(50);
        assert_eq!(Duration::from_millis(50), config.grace_period());
    }

    #[test]
    fn scenario_pool_overrides_run_pool() {
        let mut config = RunConfig::new(vec![
            ScenarioWeight::new("a", 1),
            ScenarioWeight::new("b", 1).with_personas(vec!["tom".to_string()]),
        ]);
        config.persona_ids = vec!["sarah".to_string(), "eric".to_string()];

        assert_eq!(2, config.persona_pool(&config.scenarios[0]).len());
        assert_eq!(["tom".to_string()], config.persona_pool(&config.scenarios[1]));
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: RunConfig =
            serde_json::from_str(r#"{"scenarios":[{"id":"critical_path"}],"runDurationMs":500}"#)
                .unwrap();

        assert_eq!(1, config.scenarios[0].weight);
        assert_eq!(3, config.concurrency_cap);
        assert_eq!(5_000, config.spawn_interval_ms);
        assert_eq!(500, config.run_duration_ms);
        assert!(config.cleanup_after);
        assert_eq!(DEFAULT_TEST_DATA_PREFIX, config.test_data_prefix);
    }
}
