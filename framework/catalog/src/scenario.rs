use crate::persona::{Persona, PersonaParam};
use crate::step::Step;
use crate::validation::ExpectedOutcomes;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// An ordered script of steps representing one user workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<ScenarioStep>,
    /// Range the think time between two steps is drawn from, before the persona's pace is applied.
    #[serde(default)]
    pub delay_range: DelayRange,
    /// Checked once every step ran without ending the session.
    #[serde(default)]
    pub expected_outcomes: ExpectedOutcomes,
    #[serde(default)]
    pub estimated_duration_ms: u64,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A step as it appears in a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioStep {
    #[serde(flatten)]
    pub action: Step,
    /// A failure of this step is recorded but does not end the session.
    #[serde(default)]
    pub non_fatal: bool,
    /// Chance, 0 to 1, that the step is skipped.
    #[serde(default)]
    pub skip_probability: f64,
}

impl ScenarioStep {
    pub fn fatal(action: Step) -> Self {
        Self {
            action,
            non_fatal: false,
            skip_probability: 0.0,
        }
    }

    pub fn non_fatal(action: Step) -> Self {
        Self {
            action,
            non_fatal: true,
            skip_probability: 0.0,
        }
    }

    pub fn with_skip_probability(mut self, skip_probability: f64) -> Self {
        self.skip_probability = skip_probability;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Default for DelayRange {
    fn default() -> Self {
        Self::none()
    }
}

impl DelayRange {
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min_ms: min_ms.min(max_ms),
            max_ms: max_ms.max(min_ms),
        }
    }

    pub fn none() -> Self {
        Self {
            min_ms: 0,
            max_ms: 0,
        }
    }

    /// Pick a point in the range. `position` is clamped to `0..=1`.
    pub fn at(&self, position: f64) -> Duration {
        let span = self.max_ms.saturating_sub(self.min_ms) as f64;
        Duration::from_millis(self.min_ms + (span * position.clamp(0.0, 1.0)) as u64)
    }
}

/// Why a persona can't be used with a scenario.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersonaMismatch {
    #[error("scenario {scenario} has no steps")]
    NoSteps { scenario: String },
    #[error("persona {persona} does not supply {param} required by step {step_index} ({step_type}) of scenario {scenario}")]
    MissingParam {
        scenario: String,
        persona: String,
        step_index: usize,
        step_type: &'static str,
        param: PersonaParam,
    },
}

impl Scenario {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn estimated_duration(&self) -> Duration {
        Duration::from_millis(self.estimated_duration_ms)
    }

    /// Check that the scenario can run and that `persona` supplies every parameter its steps read.
    pub fn validate_persona(&self, persona: &Persona) -> Result<(), PersonaMismatch> {
        if self.steps.is_empty() {
            return Err(PersonaMismatch::NoSteps {
                scenario: self.id.clone(),
            });
        }

        for (step_index, step) in self.steps.iter().enumerate() {
            for param in step.action.required_persona_params() {
                if !persona.supplies(param) {
                    return Err(PersonaMismatch::MissingParam {
                        scenario: self.id.clone(),
                        persona: persona.id.clone(),
                        step_index,
                        step_type: step.action.step_type(),
                        param,
                    });
                }
            }
        }

        Ok(())
    }
}
