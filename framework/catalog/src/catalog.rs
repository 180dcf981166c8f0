use crate::persona::Persona;
use crate::scenario::{DelayRange, Scenario};
use crate::validation::ExpectedOutcomes;
use std::collections::{BTreeSet, HashMap};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    #[error("unknown scenario: {0}")]
    UnknownScenario(String),
    #[error("unknown persona: {0}")]
    UnknownPersona(String),
    #[error("unknown scenario preset: {0}")]
    UnknownPreset(String),
    #[error("duplicate id in catalog: {0}")]
    Duplicate(String),
    #[error("persona {persona} has pace {pace}, expected a finite value of at least 0")]
    InvalidPace { persona: String, pace: f64 },
}

/// Named, fixed subsets of the built-in scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioPreset {
    All,
    Critical,
    Smoke,
    Chat,
    Ecommerce,
}

impl ScenarioPreset {
    pub const VALUES: [ScenarioPreset; 5] = [
        Self::All,
        Self::Critical,
        Self::Smoke,
        Self::Chat,
        Self::Ecommerce,
    ];

    /// Scenario ids in this preset. `None` means every scenario in the catalog.
    pub fn scenario_ids(self) -> Option<&'static [&'static str]> {
        match self {
            Self::All => None,
            Self::Critical => Some(&["browse_and_buy", "chat_to_diagnostic", "full_funnel"]),
            Self::Smoke => Some(&["quick_browse"]),
            Self::Chat => Some(&["chat_to_diagnostic", "full_funnel", "support_escalation"]),
            Self::Ecommerce => Some(&["browse_and_buy", "abandoned_cart"]),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Critical => "critical",
            Self::Smoke => "smoke",
            Self::Chat => "chat",
            Self::Ecommerce => "ecommerce",
        }
    }
}

impl Display for ScenarioPreset {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScenarioPreset {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "critical" | "critical-path" => Ok(Self::Critical),
            "smoke" | "smoke-test" => Ok(Self::Smoke),
            "chat" => Ok(Self::Chat),
            "ecommerce" | "e-commerce" => Ok(Self::Ecommerce),
            _ => Err(CatalogError::UnknownPreset(s.to_string())),
        }
    }
}

/// Read-only registry of scenarios and personas.
///
/// Lookups by id are O(1). Listing keeps the order the entries were registered in.
#[derive(Debug, Clone)]
pub struct Catalog {
    scenarios: Vec<Scenario>,
    personas: Vec<Persona>,
    scenario_index: HashMap<String, usize>,
    persona_index: HashMap<String, usize>,
}

impl Catalog {
    pub fn new(scenarios: Vec<Scenario>, personas: Vec<Persona>) -> Result<Self, CatalogError> {
        let scenario_index = index_by_id(scenarios.iter().map(|s| s.id.as_str()))?;
        let persona_index = index_by_id(personas.iter().map(|p| p.id.as_str()))?;
        if let Some(persona) = personas
            .iter()
            .find(|p| !p.pace.is_finite() || p.pace < 0.0)
        {
            return Err(CatalogError::InvalidPace {
                persona: persona.id.clone(),
                pace: persona.pace,
            });
        }

        Ok(Self {
            scenarios,
            personas,
            scenario_index,
            persona_index,
        })
    }

    /// The scenarios and personas shipped with Session Tunnel.
    pub fn builtin() -> Self {
        let scenarios = crate::builtin::scenarios();
        let personas = crate::builtin::personas();
        Self {
            scenario_index: scenarios
                .iter()
                .enumerate()
                .map(|(i, s)| (s.id.clone(), i))
                .collect(),
            persona_index: personas
                .iter()
                .enumerate()
                .map(|(i, p)| (p.id.clone(), i))
                .collect(),
            scenarios,
            personas,
        }
    }

    pub fn scenario(&self, id: &str) -> Result<&Scenario, CatalogError> {
        self.scenario_index
            .get(id)
            .map(|i| &self.scenarios[*i])
            .ok_or_else(|| CatalogError::UnknownScenario(id.to_string()))
    }

    pub fn persona(&self, id: &str) -> Result<&Persona, CatalogError> {
        self.persona_index
            .get(id)
            .map(|i| &self.personas[*i])
            .ok_or_else(|| CatalogError::UnknownPersona(id.to_string()))
    }

    /// Scenarios in a preset, or every scenario when no preset is given.
    ///
    /// Preset members missing from a custom catalog are left out.
    pub fn list_scenarios(&self, preset: Option<ScenarioPreset>) -> Vec<&Scenario> {
        match preset.and_then(ScenarioPreset::scenario_ids) {
            None => self.scenarios.iter().collect(),
            Some(ids) => ids.iter().filter_map(|id| self.scenario(id).ok()).collect(),
        }
    }

    /// The personas with the given ids, in the order asked for, or every persona.
    pub fn list_personas(&self, ids: Option<&[String]>) -> Result<Vec<&Persona>, CatalogError> {
        match ids {
            None => Ok(self.personas.iter().collect()),
            Some(ids) => ids.iter().map(|id| self.persona(id)).collect(),
        }
    }

    pub fn scenarios_by_tag(&self, tag: &str) -> Vec<&Scenario> {
        self.scenarios.iter().filter(|s| s.has_tag(tag)).collect()
    }

    pub fn high_value_personas(&self) -> Vec<&Persona> {
        self.personas.iter().filter(|p| p.is_high_value()).collect()
    }

    /// Build a new scenario out of steps taken from existing ones.
    ///
    /// Unknown scenario ids and out of range step indices are skipped.
    pub fn composite_scenario(
        &self,
        id: impl Into<String>,
        name: impl Into<String>,
        sources: &[(&str, &[usize])],
    ) -> Scenario {
        let name = name.into();
        let mut steps = Vec::new();
        let mut tags = BTreeSet::new();

        for (scenario_id, indices) in sources {
            let Ok(scenario) = self.scenario(scenario_id) else {
                continue;
            };
            steps.extend(
                indices
                    .iter()
                    .filter_map(|i| scenario.steps.get(*i))
                    .cloned(),
            );
            tags.extend(scenario.tags.iter().cloned());
        }

        let estimated_duration_ms = steps.len() as u64 * 5_000;
        Scenario {
            id: id.into(),
            description: format!("Composite scenario: {name}"),
            name,
            steps,
            delay_range: DelayRange::new(500, 2_000),
            expected_outcomes: ExpectedOutcomes::none(),
            estimated_duration_ms,
            tags: std::iter::once("composite".to_string())
                .chain(tags)
                .collect(),
        }
    }
}

/// Sum of the estimated durations of `scenarios`.
pub fn estimate_total_duration<'a>(scenarios: impl IntoIterator<Item = &'a Scenario>) -> Duration {
    scenarios
        .into_iter()
        .map(Scenario::estimated_duration)
        .sum()
}

fn index_by_id<'a>(
    ids: impl Iterator<Item = &'a str>,
) -> Result<HashMap<String, usize>, CatalogError> {
    let mut index = HashMap::new();
    for (i, id) in ids.enumerate() {
        if index.insert(id.to_string(), i).is_some() {
            return Err(CatalogError::Duplicate(id.to_string()));
        }
    }
    Ok(index)
}
