use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// A named set of behavioural parameters applied to a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub name: String,
    pub company: String,
    pub role: PersonaRole,
    pub urgency: Urgency,
    pub budget: String,
    /// 1 to 10.
    pub tech_savvy: u8,
    pub communication_style: CommunicationStyle,
    pub pain_points: Vec<String>,
    /// Chance, 0 to 1, that the persona raises an objection in a chat turn.
    pub objection_probability: f64,
    pub common_objections: Vec<String>,
    /// Multiplier applied to the think time between steps.
    #[serde(default = "default_pace")]
    pub pace: f64,
    #[serde(default)]
    pub diagnostic_responses: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaRole {
    DecisionMaker,
    Researcher,
    Technical,
    BudgetHolder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationStyle {
    Brief,
    Detailed,
    Questioning,
    /// The persona never writes its own chat messages.
    Scripted,
}

/// A persona parameter a step can depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersonaParam {
    ContactDetails,
    DiagnosticResponses,
    ChatStyle,
}

impl Display for PersonaParam {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ContactDetails => f.write_str("contact details"),
            Self::DiagnosticResponses => f.write_str("diagnostic responses"),
            Self::ChatStyle => f.write_str("chat style"),
        }
    }
}

fn default_pace() -> f64 {
    1.0
}

impl Persona {
    pub fn supplies(&self, param: PersonaParam) -> bool {
        match param {
            PersonaParam::ContactDetails => {
                !self.name.trim().is_empty() && !self.company.trim().is_empty()
            }
            PersonaParam::DiagnosticResponses => self
                .diagnostic_responses
                .as_ref()
                .is_some_and(|r| r.as_object().is_some_and(|o| !o.is_empty())),
            PersonaParam::ChatStyle => self.communication_style != CommunicationStyle::Scripted,
        }
    }

    /// A unique email address for one instance of this persona.
    ///
    /// Every address starts with the test data prefix so cleanup can find it.
    pub fn test_email(&self, test_data_prefix: &str) -> String {
        format!(
            "{test_data_prefix}{}_{}@sessiontunnel.test",
            self.id,
            nanoid::nanoid!(8, &nanoid::alphabet::SAFE)
        )
        .to_lowercase()
    }

    pub fn is_high_value(&self) -> bool {
        self.role == PersonaRole::DecisionMaker
            && matches!(self.budget.as_str(), "$15K-$50K" | "$50K+")
    }
}
