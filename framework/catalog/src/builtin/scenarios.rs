use crate::scenario::{DelayRange, Scenario, ScenarioStep};
use crate::step::{Interaction, PaymentMethod, Step};
use crate::validation::{ExpectedOutcomes, ValidationRule};
use std::collections::BTreeMap;

const HERO: &str = "[data-section=\"hero\"]";
const CONTACT: &str = "[data-section=\"contact\"]";
const PRODUCT_GRID: &str = "[data-testid=\"product-grid\"]";
const SERVICES_GRID: &str = "[data-testid=\"services-grid\"]";
const CHECKOUT_FORM: &str = "[data-testid=\"checkout-form\"]";

pub(crate) fn scenarios() -> Vec<Scenario> {
    vec![
        browse_and_buy(),
        chat_to_diagnostic(),
        service_inquiry(),
        full_funnel(),
        abandoned_cart(),
        support_escalation(),
        quick_browse(),
    ]
}

/// Steps whose type is in `fatal` end the session when they fail, everything else is recorded
/// and skipped over.
fn script(fatal: &[&str], actions: Vec<Step>) -> Vec<ScenarioStep> {
    actions
        .into_iter()
        .map(|action| {
            if fatal.contains(&action.step_type()) {
                ScenarioStep::fatal(action)
            } else {
                ScenarioStep::non_fatal(action)
            }
        })
        .collect()
}

fn tags(tags: &[&str]) -> Vec<String> {
    tags.iter().map(|t| t.to_string()).collect()
}

fn diagnostic() -> Step {
    Step::Diagnostic {
        complete_all_categories: true,
        skip_categories: Vec::new(),
        use_persona_responses: true,
    }
}

fn contact_form() -> Step {
    Step::ContactForm {
        fields: BTreeMap::new(),
        use_persona_data: true,
    }
}

fn add_to_cart(product_type: &str) -> Step {
    Step::AddToCart {
        product_id: None,
        product_type: Some(product_type.to_string()),
        quantity: 1,
    }
}

fn completed_in(table: &str, expected_count: Option<u64>) -> Step {
    let mut conditions = serde_json::Map::new();
    conditions.insert("status".to_string(), "completed".into());
    Step::ValidateDatabase {
        table: table.to_string(),
        conditions,
        expected_count,
    }
}

fn browse_and_buy() -> Scenario {
    Scenario {
        id: "browse_and_buy".to_string(),
        name: "Browse and Buy".to_string(),
        description: "Browse products, add to cart, complete checkout with a test payment"
            .to_string(),
        steps: script(
            &["navigate", "validate_database", "add_to_cart", "checkout"],
            vec![
                Step::navigate("/", HERO),
                Step::browse("store", 3_000, &[Interaction::Scroll]),
                Step::navigate("/store", PRODUCT_GRID),
                Step::delay(2_000, true),
                add_to_cart("ebook"),
                Step::delay(1_000, false),
                Step::screenshot("cart-with-item"),
                Step::navigate("/checkout", CHECKOUT_FORM),
                Step::Checkout {
                    payment_method: PaymentMethod::StripeTest,
                    use_persona_contact: true,
                },
                completed_in("orders", Some(1)),
                Step::screenshot("checkout-success"),
            ],
        ),
        delay_range: DelayRange::new(500, 2_000),
        expected_outcomes: ExpectedOutcomes::data(vec![
            ValidationRule::equals("orders", "status", "completed"),
            ValidationRule::exists("order_items", "id"),
        ]),
        estimated_duration_ms: 30_000,
        tags: tags(&["e-commerce", "checkout", "stripe", "critical-path"]),
    }
}

fn chat_to_diagnostic() -> Scenario {
    let mut steps = script(
        &["navigate", "validate_database", "chat", "diagnostic"],
        vec![
            Step::navigate("/", CONTACT),
            Step::browse("contact", 2_000, &[Interaction::Scroll]),
            Step::chat(
                "greeting",
                "Hi, I am interested in learning more about your services",
            ),
            Step::delay(2_000, true),
            Step::chat(
                "trigger_diagnostic",
                "I would like to perform an AI audit of my business",
            ),
            diagnostic(),
            Step::screenshot("diagnostic-complete"),
            completed_in("diagnostic_audits", Some(1)),
            Step::wait_for_webhook("diagnostic_completion", 10_000),
        ],
    );
    steps[8].skip_probability = 0.2;

    Scenario {
        id: "chat_to_diagnostic".to_string(),
        name: "Chat to Diagnostic".to_string(),
        description:
            "Engage with the chat assistant, trigger a diagnostic assessment and complete every category"
                .to_string(),
        steps,
        delay_range: DelayRange::new(1_000, 3_000),
        expected_outcomes: ExpectedOutcomes::data(vec![
            ValidationRule::equals("diagnostic_audits", "status", "completed"),
            ValidationRule::exists("diagnostic_audits", "urgency_score"),
            ValidationRule::exists("diagnostic_audits", "opportunity_score"),
            ValidationRule::exists("chat_messages", "id"),
        ]),
        estimated_duration_ms: 120_000,
        tags: tags(&["chat", "diagnostic", "lead-qualification", "critical-path"]),
    }
}

fn service_inquiry() -> Scenario {
    let mut steps = script(
        &["navigate", "validate_database", "contact_form"],
        vec![
            Step::navigate("/", HERO),
            Step::browse("about", 2_000, &[Interaction::Scroll]),
            Step::navigate("/services", SERVICES_GRID),
            Step::delay(3_000, true),
            Step::screenshot("services-page"),
            Step::navigate("/#contact", CONTACT),
            contact_form(),
            Step::screenshot("contact-form-submitted"),
            Step::validate_database("contact_submissions", Some(1)),
            Step::wait_for_webhook("lead_qualification", 10_000),
        ],
    );
    steps[9].skip_probability = 0.3;

    Scenario {
        id: "service_inquiry".to_string(),
        name: "Service Inquiry".to_string(),
        description: "Browse services, select one for inquiry, submit the contact form".to_string(),
        steps,
        delay_range: DelayRange::new(500, 2_000),
        expected_outcomes: ExpectedOutcomes::data(vec![
            ValidationRule::exists("contact_submissions", "email"),
            ValidationRule::exists("contact_submissions", "name"),
        ]),
        estimated_duration_ms: 25_000,
        tags: tags(&["services", "contact-form", "lead-generation"]),
    }
}

fn full_funnel() -> Scenario {
    let mut steps = script(
        &[
            "navigate",
            "validate_database",
            "chat",
            "diagnostic",
            "contact_form",
        ],
        vec![
            Step::navigate("/", HERO),
            Step::browse("projects", 3_000, &[Interaction::Scroll, Interaction::Hover]),
            Step::browse("store", 2_000, &[Interaction::Scroll]),
            Step::browse("about", 2_000, &[Interaction::Scroll]),
            Step::browse("contact", 1_000, &[]),
            Step::chat(
                "introduction",
                "Hello, I have been looking at your portfolio and I am impressed",
            ),
            Step::delay(2_000, true),
            Step::chat(
                "interest",
                "I think we might need some help with our business processes",
            ),
            Step::delay(1_500, true),
            Step::chat(
                "trigger_diagnostic",
                "Could you help me identify what areas we should focus on? Maybe do an assessment?",
            ),
            diagnostic(),
            Step::screenshot("diagnostic-results"),
            contact_form(),
            completed_in("diagnostic_audits", None),
            Step::validate_database("contact_submissions", None),
            Step::wait_for_webhook("diagnostic_completion", 15_000),
        ],
    );
    steps[1].skip_probability = 0.2;
    steps[2].skip_probability = 0.3;
    steps[15].skip_probability = 0.2;

    Scenario {
        id: "full_funnel".to_string(),
        name: "Full Funnel Journey".to_string(),
        description: "Complete customer journey: chat, diagnostic, contact".to_string(),
        steps,
        delay_range: DelayRange::new(1_000, 4_000),
        expected_outcomes: ExpectedOutcomes::data(vec![
            ValidationRule::equals("diagnostic_audits", "status", "completed"),
            ValidationRule::exists("contact_submissions", "email"),
            ValidationRule::exists("chat_sessions", "session_id"),
        ]),
        estimated_duration_ms: 180_000,
        tags: tags(&["full-funnel", "chat", "diagnostic", "contact", "critical-path"]),
    }
}

fn abandoned_cart() -> Scenario {
    Scenario {
        id: "abandoned_cart".to_string(),
        name: "Abandoned Cart".to_string(),
        description: "Add items to the cart, start checkout, then abandon and come back".to_string(),
        steps: script(
            &["navigate", "add_to_cart"],
            vec![
                Step::navigate("/store", PRODUCT_GRID),
                Step::delay(2_000, true),
                add_to_cart("ebook"),
                Step::delay(1_500, false),
                add_to_cart("training"),
                Step::screenshot("cart-multiple-items"),
                Step::navigate("/checkout", CHECKOUT_FORM),
                Step::delay(3_000, true),
                Step::navigate("/", HERO),
                Step::screenshot("exit-intent-popup"),
                Step::Delay {
                    duration_ms: 5_000,
                    randomize: false,
                    description: Some("Waiting for exit intent".to_string()),
                },
                Step::navigate("/checkout", CHECKOUT_FORM),
                Step::screenshot("cart-recovered"),
            ],
        ),
        delay_range: DelayRange::new(1_000, 3_000),
        expected_outcomes: ExpectedOutcomes::none(),
        estimated_duration_ms: 35_000,
        tags: tags(&["cart", "abandonment", "exit-intent", "recovery"]),
    }
}

fn support_escalation() -> Scenario {
    let mut escalated = serde_json::Map::new();
    escalated.insert("is_escalated".to_string(), true.into());

    Scenario {
        id: "support_escalation".to_string(),
        name: "Support Escalation".to_string(),
        description: "Ask complex or urgent questions to trigger human escalation".to_string(),
        steps: script(
            &["navigate", "chat"],
            vec![
                Step::navigate("/#contact", CONTACT),
                Step::chat("urgent_help", "I need urgent help with a problem I am having"),
                Step::delay(2_000, true),
                Step::chat(
                    "complex_question",
                    "We have a very complex integration requirement involving legacy systems and compliance requirements. Can I speak to someone who handles enterprise implementations?",
                ),
                Step::delay(2_000, true),
                Step::chat(
                    "request_human",
                    "I would prefer to speak with a human about this",
                ),
                Step::screenshot("escalation-triggered"),
                Step::ValidateDatabase {
                    table: "chat_sessions".to_string(),
                    conditions: escalated,
                    expected_count: None,
                },
            ],
        ),
        delay_range: DelayRange::new(1_500, 3_000),
        expected_outcomes: ExpectedOutcomes::data(vec![ValidationRule::equals(
            "chat_sessions",
            "is_escalated",
            true,
        )]),
        estimated_duration_ms: 30_000,
        tags: tags(&["chat", "escalation", "support"]),
    }
}

fn quick_browse() -> Scenario {
    Scenario {
        id: "quick_browse".to_string(),
        name: "Quick Browse (Smoke Test)".to_string(),
        description: "Quick navigation through all main sections".to_string(),
        steps: script(
            &["navigate"],
            vec![
                Step::navigate("/", HERO),
                Step::screenshot("home-page"),
                Step::browse("projects", 1_000, &[]),
                Step::browse("store", 1_000, &[]),
                Step::browse("about", 1_000, &[]),
                Step::browse("contact", 1_000, &[]),
                Step::navigate("/store", PRODUCT_GRID),
                Step::screenshot("store-page"),
                Step::navigate("/services", SERVICES_GRID),
                Step::screenshot("services-page"),
                Step::navigate("/", HERO),
            ],
        ),
        delay_range: DelayRange::new(200, 500),
        expected_outcomes: ExpectedOutcomes::none(),
        estimated_duration_ms: 15_000,
        tags: tags(&["smoke-test", "navigation", "quick"]),
    }
}
