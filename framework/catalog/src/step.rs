use crate::persona::PersonaParam;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One action a simulated client performs against the target system.
///
/// Each variant carries the parameters for that kind of action. Executing a step is the job of a
/// step executor, this type only describes what should happen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    Navigate {
        path: String,
        #[serde(default)]
        wait_for_selector: Option<String>,
    },
    Browse {
        section: String,
        duration_ms: u64,
        #[serde(default)]
        interactions: Vec<Interaction>,
    },
    Chat {
        intent: String,
        /// Generated from the intent and the persona when not set.
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        expected_response_contains: Vec<String>,
    },
    Diagnostic {
        complete_all_categories: bool,
        #[serde(default)]
        skip_categories: Vec<String>,
        #[serde(default)]
        use_persona_responses: bool,
    },
    AddToCart {
        #[serde(default)]
        product_id: Option<String>,
        #[serde(default)]
        product_type: Option<String>,
        #[serde(default = "default_quantity")]
        quantity: u32,
    },
    Checkout {
        payment_method: PaymentMethod,
        #[serde(default)]
        use_persona_contact: bool,
    },
    ContactForm {
        #[serde(default)]
        fields: BTreeMap<String, String>,
        #[serde(default)]
        use_persona_data: bool,
    },
    WaitForWebhook {
        webhook: String,
        timeout_ms: u64,
    },
    ValidateDatabase {
        table: String,
        #[serde(default)]
        conditions: serde_json::Map<String, serde_json::Value>,
        #[serde(default)]
        expected_count: Option<u64>,
    },
    Screenshot {
        name: String,
        #[serde(default)]
        full_page: bool,
    },
    Delay {
        duration_ms: u64,
        /// Vary the duration by up to 20% either way.
        #[serde(default)]
        randomize: bool,
        #[serde(default)]
        description: Option<String>,
    },
    ApiCall {
        endpoint: String,
        method: HttpMethod,
        #[serde(default)]
        body: Option<serde_json::Value>,
        #[serde(default)]
        expected_status: Option<u16>,
        #[serde(default)]
        description: Option<String>,
    },
    AdminAction {
        action: String,
        #[serde(default)]
        target: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
    WaitForData {
        table: String,
        #[serde(default)]
        conditions: serde_json::Map<String, serde_json::Value>,
        timeout_ms: u64,
        #[serde(default)]
        poll_interval_ms: Option<u64>,
        #[serde(default)]
        expected_count: Option<u64>,
        #[serde(default)]
        description: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interaction {
    Scroll,
    Hover,
    Click,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    StripeTest,
    Free,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

fn default_quantity() -> u32 {
    1
}

impl Step {
    pub fn navigate(path: impl Into<String>, wait_for_selector: impl Into<String>) -> Self {
        Self::Navigate {
            path: path.into(),
            wait_for_selector: Some(wait_for_selector.into()),
        }
    }

    pub fn browse(section: impl Into<String>, duration_ms: u64, interactions: &[Interaction]) -> Self {
        Self::Browse {
            section: section.into(),
            duration_ms,
            interactions: interactions.to_vec(),
        }
    }

    pub fn chat(intent: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Chat {
            intent: intent.into(),
            message: Some(message.into()),
            expected_response_contains: Vec::new(),
        }
    }

    pub fn delay(duration_ms: u64, randomize: bool) -> Self {
        Self::Delay {
            duration_ms,
            randomize,
            description: None,
        }
    }

    pub fn screenshot(name: impl Into<String>) -> Self {
        Self::Screenshot {
            name: name.into(),
            full_page: false,
        }
    }

    pub fn validate_database(table: impl Into<String>, expected_count: Option<u64>) -> Self {
        Self::ValidateDatabase {
            table: table.into(),
            conditions: serde_json::Map::new(),
            expected_count,
        }
    }

    pub fn wait_for_webhook(webhook: impl Into<String>, timeout_ms: u64) -> Self {
        Self::WaitForWebhook {
            webhook: webhook.into(),
            timeout_ms,
        }
    }

    /// The step kind as recorded on step results and errors.
    pub fn step_type(&self) -> &'static str {
        match self {
            Self::Navigate { .. } => "navigate",
            Self::Browse { .. } => "browse",
            Self::Chat { .. } => "chat",
            Self::Diagnostic { .. } => "diagnostic",
            Self::AddToCart { .. } => "add_to_cart",
            Self::Checkout { .. } => "checkout",
            Self::ContactForm { .. } => "contact_form",
            Self::WaitForWebhook { .. } => "wait_for_webhook",
            Self::ValidateDatabase { .. } => "validate_database",
            Self::Screenshot { .. } => "screenshot",
            Self::Delay { .. } => "delay",
            Self::ApiCall { .. } => "api_call",
            Self::AdminAction { .. } => "admin_action",
            Self::WaitForData { .. } => "wait_for_data",
        }
    }

    /// Human readable description used for live progress.
    pub fn describe(&self) -> String {
        match self {
            Self::Navigate { path, .. } => format!("Navigating to {path}"),
            Self::Browse { section, .. } => format!("Browsing {section}"),
            Self::Chat { intent, .. } => format!("Chatting - {intent}"),
            Self::Diagnostic { .. } => "Completing diagnostic assessment".to_string(),
            Self::AddToCart { .. } => "Adding item to cart".to_string(),
            Self::Checkout { .. } => "Processing checkout".to_string(),
            Self::ContactForm { .. } => "Submitting contact form".to_string(),
            Self::WaitForWebhook { webhook, .. } => format!("Waiting for {webhook} webhook"),
            Self::ValidateDatabase { table, .. } => format!("Validating records in {table}"),
            Self::Screenshot { name, .. } => format!("Taking screenshot {name}"),
            Self::Delay { description, .. } => description
                .clone()
                .unwrap_or_else(|| "Waiting...".to_string()),
            Self::ApiCall {
                method,
                endpoint,
                description,
                ..
            } => description
                .clone()
                .unwrap_or_else(|| format!("API: {} {endpoint}", method.as_str())),
            Self::AdminAction {
                action,
                description,
                ..
            } => description
                .clone()
                .unwrap_or_else(|| format!("Admin action: {action}")),
            Self::WaitForData {
                table, description, ..
            } => description
                .clone()
                .unwrap_or_else(|| format!("Waiting for data in {table}")),
        }
    }

    /// Persona parameters this step reads when it runs.
    pub fn required_persona_params(&self) -> Vec<PersonaParam> {
        match self {
            Self::Diagnostic {
                use_persona_responses: true,
                ..
            } => vec![PersonaParam::DiagnosticResponses],
            Self::Checkout {
                use_persona_contact: true,
                ..
            }
            | Self::ContactForm {
                use_persona_data: true,
                ..
            } => vec![PersonaParam::ContactDetails],
            Self::Chat { message: None, .. } => vec![PersonaParam::ChatStyle],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn steps_serialize_with_a_type_tag() {
        let step = Step::navigate("/store", "[data-testid=\"product-grid\"]");
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!("navigate", json["type"]);

        let parsed: Step =
            serde_json::from_str(r#"{"type":"add_to_cart","product_type":"ebook"}"#).unwrap();
        assert_eq!(
            Step::AddToCart {
                product_id: None,
                product_type: Some("ebook".to_string()),
                quantity: 1,
            },
            parsed
        );
        assert_eq!("add_to_cart", parsed.step_type());
    }

    #[test]
    fn persona_backed_steps_declare_their_params() {
        let diagnostic = Step::Diagnostic {
            complete_all_categories: true,
            skip_categories: vec![],
            use_persona_responses: true,
        };
        assert_eq!(
            vec![PersonaParam::DiagnosticResponses],
            diagnostic.required_persona_params()
        );
        assert!(Step::screenshot("home").required_persona_params().is_empty());
        assert!(Step::chat("greeting", "Hi")
            .required_persona_params()
            .is_empty());
    }
}
