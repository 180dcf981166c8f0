#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use session_tunnel_catalog::{
    Catalog, DelayRange, ExpectedOutcomes, HttpMethod, PaymentMethod, Persona, Scenario,
    ScenarioStep, Step, ValidationRule,
};
use session_tunnel_model::{ErrorType, ResourceKind, ResourceRef, RunConfig, ScenarioWeight};
use session_tunnel_runner::prelude::{StepContext, StepError, StepExecutor, StepOutcome};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Test catalog: a one-step `critical_path`, a one-step `always_fails` and a `shopping` scenario
/// that creates resources, played by personas `A` and `B`.
pub fn catalog() -> Arc<Catalog> {
    let scenarios = vec![
        scenario(
            "critical_path",
            vec![ScenarioStep::fatal(Step::navigate("/", "#hero"))],
        ),
        scenario(
            "always_fails",
            vec![ScenarioStep::fatal(Step::ApiCall {
                endpoint: "/api/broken".to_string(),
                method: HttpMethod::Post,
                body: None,
                expected_status: Some(200),
                description: None,
            })],
        ),
        scenario(
            "shopping",
            vec![
                ScenarioStep::fatal(Step::chat("greeting", "Hello")),
                ScenarioStep::fatal(Step::AddToCart {
                    product_id: Some("audit".to_string()),
                    product_type: None,
                    quantity: 1,
                }),
                ScenarioStep::fatal(Step::Checkout {
                    payment_method: PaymentMethod::StripeTest,
                    use_persona_contact: true,
                }),
            ],
        ),
    ];

    Arc::new(Catalog::new(scenarios, personas()).unwrap())
}

/// Catalog of `scenarios` played by personas `A` and `B`, both with the given pace.
pub fn catalog_with(scenarios: Vec<Scenario>, pace: f64) -> Arc<Catalog> {
    let personas = personas()
        .into_iter()
        .map(|mut persona| {
            persona.pace = pace;
            persona
        })
        .collect();
    Arc::new(Catalog::new(scenarios, personas).unwrap())
}

fn personas() -> Vec<Persona> {
    let builtin = Catalog::builtin();
    [("A", "ready_rachel"), ("B", "enterprise_eric")]
        .into_iter()
        .map(|(id, source)| {
            let mut persona = builtin.persona(source).unwrap().clone();
            persona.id = id.to_string();
            persona
        })
        .collect()
}

pub fn scenario(id: &str, steps: Vec<ScenarioStep>) -> Scenario {
    Scenario {
        id: id.to_string(),
        name: id.to_string(),
        description: String::new(),
        steps,
        delay_range: DelayRange::none(),
        expected_outcomes: ExpectedOutcomes::none(),
        estimated_duration_ms: 0,
        tags: Vec::new(),
    }
}

pub fn config(scenario: &str) -> RunConfig {
    let mut config = RunConfig::new(vec![ScenarioWeight::new(scenario, 1)]);
    config.persona_ids = vec!["A".to_string(), "B".to_string()];
    config.cleanup_after = false;
    config.seed = Some(7);
    config
}

/// Tracks how many steps are executing right now and the most seen at once.
#[derive(Debug, Default)]
pub struct Gauge {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl Gauge {
    pub fn max(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }

    fn enter(self: &Arc<Self>) -> GaugeGuard {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
        GaugeGuard(self.clone())
    }
}

struct GaugeGuard(Arc<Gauge>);

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Every step takes `step_time` and succeeds, except `api_call` steps which fail with an API error.
pub struct TimedExecutor {
    pub step_time: Duration,
    pub gauge: Arc<Gauge>,
}

impl TimedExecutor {
    pub fn new(step_time: Duration) -> Self {
        Self {
            step_time,
            gauge: Arc::new(Gauge::default()),
        }
    }
}

#[async_trait]
impl StepExecutor for TimedExecutor {
    async fn execute(&self, step: &Step, ctx: &mut StepContext) -> Result<StepOutcome, StepError> {
        let _guard = self.gauge.enter();
        ctx.shutdown_listener()
            .cancellable(tokio::time::sleep(self.step_time))
            .await
            .map_err(|_| StepError::cancelled())?;

        match step {
            Step::ApiCall { endpoint, .. } => Err(StepError::new(
                ErrorType::ApiError,
                format!("{endpoint} returned 500"),
            )),
            _ => Ok(StepOutcome::done()),
        }
    }
}

/// Runs steps instantly and remembers their types. `api_call` steps fail with an API error,
/// `checkout` steps fail after creating an order and `screenshot` steps panic. Validation rules
/// fail on table `missing` and panic on table `broken`.
#[derive(Default)]
pub struct ScriptedExecutor {
    pub executed: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl StepExecutor for ScriptedExecutor {
    async fn execute(&self, step: &Step, _ctx: &mut StepContext) -> Result<StepOutcome, StepError> {
        self.executed.lock().push(step.step_type().to_string());
        match step {
            Step::ApiCall { endpoint, .. } => {
                Err(StepError::api(format!("{endpoint} returned 500")))
            }
            Step::Checkout { .. } => Err(StepError::api("payment declined").with_created(vec![
                ResourceRef::new(ResourceKind::Order, "test_e2e_order_1"),
            ])),
            Step::Screenshot { name, .. } => panic!("renderer crashed taking {name}"),
            _ => Ok(StepOutcome::done()),
        }
    }

    async fn validate(
        &self,
        rule: &ValidationRule,
        _ctx: &mut StepContext,
    ) -> Result<(), StepError> {
        match rule.table.as_str() {
            "missing" => Err(StepError::validation(format!(
                "expected {}.{} to exist",
                rule.table, rule.field
            ))),
            "broken" => panic!("lost the connection to {}", rule.table),
            _ => Ok(()),
        }
    }
}
