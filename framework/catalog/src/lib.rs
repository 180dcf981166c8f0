//! Scenario and persona registries.
//!
//! Everything here is read-only configuration. A [Catalog] is built once, either from the
//! built-in data with [Catalog::builtin] or from caller supplied entries with [Catalog::new], and
//! then shared by every run.

mod builtin;
mod catalog;
mod persona;
mod scenario;
mod step;
mod validation;

pub use catalog::{estimate_total_duration, Catalog, CatalogError, ScenarioPreset};
pub use persona::{CommunicationStyle, Persona, PersonaParam, PersonaRole, Urgency};
pub use scenario::{DelayRange, PersonaMismatch, Scenario, ScenarioStep};
pub use step::{HttpMethod, Interaction, PaymentMethod, Step};
pub use validation::{ExpectedOutcomes, RuleCondition, ValidationRule};
