use crate::context::StepContext;
use crate::executor::{StepError, StepExecutor, StepOutcome};
use async_trait::async_trait;
use rand::Rng;
use serde_json::{json, Value};
use session_tunnel_catalog::{Step, ValidationRule};
use session_tunnel_model::{ErrorType, ResourceKind, ResourceRef};
use session_tunnel_store::RunStore;
use std::sync::Arc;
use std::time::Duration;

const CHAT_SESSION_KEY: &str = "chat_session_id";
const CART_KEY: &str = "cart";
const ROWS_KEY: &str = "rows";

/// A dry-run executor that pretends to drive the target system.
///
/// Every step takes a plausible amount of (scaled) time and reports the records the real action
/// would have created. When a store is attached the records are registered there too, which lets
/// cleanup be exercised end to end without a real target system. The rows those records would
/// hold are kept per session, so expected outcomes are checked against them.
#[derive(Clone)]
pub struct SimulatedExecutor {
    store: Option<Arc<dyn RunStore>>,
    time_scale: f64,
    failure_rate: f64,
}

impl Default for SimulatedExecutor {
    fn default() -> Self {
        Self {
            store: None,
            time_scale: 1.0,
            failure_rate: 0.0,
        }
    }
}

impl SimulatedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(mut self, store: Arc<dyn RunStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Multiplier applied to every simulated step duration. `0.0` makes steps instant.
    pub fn with_time_scale(mut self, time_scale: f64) -> Self {
        self.time_scale = time_scale.max(0.0);
        self
    }

    /// Probability, per step, of a simulated network failure.
    pub fn with_failure_rate(mut self, failure_rate: f64) -> Self {
        self.failure_rate = failure_rate.clamp(0.0, 1.0);
        self
    }

    async fn pause(&self, ctx: &mut StepContext, base: Duration) -> Result<(), StepError> {
        let duration = Duration::try_from_secs_f64(base.as_secs_f64() * self.time_scale)
            .unwrap_or(Duration::MAX);
        if duration.is_zero() {
            return Ok(());
        }

        ctx.shutdown_listener()
            .cancellable(tokio::time::sleep(duration))
            .await
            .map_err(|_| StepError::cancelled())
    }

    async fn register(&self, created: &[ResourceRef]) -> Result<(), StepError> {
        let Some(store) = &self.store else {
            return Ok(());
        };

        for (inserted, resource) in created.iter().enumerate() {
            if let Err(e) = store.insert_resource(resource).await {
                return Err(StepError::api(format!("could not create {resource}: {e}"))
                    .with_created(created[..inserted].to_vec()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StepExecutor for SimulatedExecutor {
    async fn execute(&self, step: &Step, ctx: &mut StepContext) -> Result<StepOutcome, StepError> {
        let base = simulated_duration(step, ctx);
        self.pause(ctx, base).await?;

        if !matches!(step, Step::Delay { .. })
            && self.failure_rate > 0.0
            && ctx.rng().gen::<f64>() < self.failure_rate
        {
            return Err(StepError::new(
                ErrorType::NetworkError,
                format!("simulated network failure during {}", step.step_type()),
            ));
        }

        let created = match step {
            Step::Chat { intent, message, .. } => {
                let text = message
                    .clone()
                    .unwrap_or_else(|| format!("[{intent}] as {}", ctx.persona().name));
                log::trace!("[{}] chat: {text}", ctx.client_id());

                let mut created = Vec::new();
                if !ctx.scratch().contains_key(CHAT_SESSION_KEY) {
                    let id = ctx.new_resource_id("chat_session");
                    ctx.scratch()
                        .insert(CHAT_SESSION_KEY.to_string(), Value::String(id.clone()));
                    created.push(ResourceRef::new(ResourceKind::ChatSession, id));
                }
                for label in ["chat_message_user", "chat_message_assistant"] {
                    created.push(ResourceRef::new(
                        ResourceKind::ChatMessage,
                        ctx.new_resource_id(label),
                    ));
                }
                created
            }
            Step::Diagnostic { .. } => vec![ResourceRef::new(
                ResourceKind::Diagnostic,
                ctx.new_resource_id("diagnostic"),
            )],
            Step::AddToCart {
                product_id,
                product_type,
                quantity,
            } => {
                let item = json!({
                    "product_id": product_id,
                    "product_type": product_type,
                    "quantity": quantity,
                });
                match ctx.scratch().entry(CART_KEY.to_string()).or_insert_with(|| json!([])) {
                    Value::Array(items) => items.push(item),
                    other => *other = json!([item]),
                }
                Vec::new()
            }
            Step::Checkout {
                payment_method,
                use_persona_contact,
            } => {
                let items = match ctx.scratch().remove(CART_KEY) {
                    Some(Value::Array(items)) if !items.is_empty() => items,
                    _ => return Err(StepError::validation("cannot check out an empty cart")),
                };
                if *use_persona_contact {
                    let email = ctx.contact_email().to_string();
                    log::trace!(
                        "[{}] checking out with {payment_method:?} as {email}",
                        ctx.client_id()
                    );
                }

                let mut created = vec![ResourceRef::new(
                    ResourceKind::Order,
                    ctx.new_resource_id("order"),
                )];
                created.extend(items.iter().map(|_| {
                    ResourceRef::new(ResourceKind::OrderItem, ctx.new_resource_id("order_item"))
                }));
                created
            }
            Step::ContactForm {
                use_persona_data, ..
            } => {
                if *use_persona_data {
                    let email = ctx.contact_email().to_string();
                    log::trace!("[{}] submitting contact form as {email}", ctx.client_id());
                }
                vec![ResourceRef::new(
                    ResourceKind::Contact,
                    ctx.new_resource_id("contact"),
                )]
            }
            Step::ValidateDatabase {
                table,
                expected_count,
                ..
            }
            | Step::WaitForData {
                table,
                expected_count,
                ..
            } => {
                check_created_count(ctx, table, *expected_count)?;
                Vec::new()
            }
            Step::ApiCall {
                expected_status: Some(status),
                endpoint,
                method,
                ..
            } if !(200..300).contains(status) => {
                return Err(StepError::api(format!(
                    "{} {endpoint} cannot return {status} in a dry run",
                    method.as_str()
                )));
            }
            _ => Vec::new(),
        };

        self.register(&created).await?;
        record_rows(ctx, step, &created);
        Ok(StepOutcome::created(created))
    }

    async fn validate(
        &self,
        rule: &ValidationRule,
        ctx: &mut StepContext,
    ) -> Result<(), StepError> {
        let values = session_rows(ctx, &rule.table)
            .into_iter()
            .flatten()
            .filter_map(|row| row.get(&rule.field).cloned())
            .collect::<Vec<_>>();
        rule.check(&values).map_err(StepError::validation)
    }
}

/// Keep the rows the real target system would hold for `created`.
fn record_rows(ctx: &mut StepContext, step: &Step, created: &[ResourceRef]) {
    let session_id = ctx
        .scratch()
        .get(CHAT_SESSION_KEY)
        .cloned()
        .unwrap_or(Value::Null);

    for resource in created {
        let row = match resource.kind {
            ResourceKind::ChatSession => {
                json!({ "id": resource.id, "session_id": resource.id, "is_escalated": false })
            }
            ResourceKind::ChatMessage => json!({ "id": resource.id, "session_id": session_id }),
            ResourceKind::Diagnostic => json!({
                "id": resource.id,
                "status": "completed",
                "urgency_score": ctx.rng().gen_range(1..=10),
                "opportunity_score": ctx.rng().gen_range(1..=10),
            }),
            ResourceKind::Order => json!({ "id": resource.id, "status": "completed" }),
            ResourceKind::OrderItem => json!({ "id": resource.id }),
            ResourceKind::Contact => {
                let email = ctx.contact_email().to_string();
                json!({ "id": resource.id, "name": ctx.persona().name, "email": email })
            }
            ResourceKind::Other(_) => continue,
        };
        let Some(table) = table_name(&resource.kind) else {
            continue;
        };
        if let Some(rows) = session_rows(ctx, table) {
            rows.push(row);
        }
    }

    if let Step::Chat { intent, .. } = step {
        if intent.contains("human") || intent.contains("escalat") {
            let sessions = session_rows(ctx, "chat_sessions").into_iter().flatten();
            for session in sessions.filter_map(Value::as_object_mut) {
                session.insert("is_escalated".to_string(), Value::Bool(true));
            }
        }
    }
}

fn session_rows<'a>(ctx: &'a mut StepContext, table: &str) -> Option<&'a mut Vec<Value>> {
    match ctx
        .scratch()
        .entry(ROWS_KEY.to_string())
        .or_insert_with(|| json!({}))
    {
        Value::Object(tables) => match tables.entry(table).or_insert_with(|| json!([])) {
            Value::Array(rows) => Some(rows),
            _ => None,
        },
        _ => None,
    }
}

/// How long the real action would roughly take, before scaling.
fn simulated_duration(step: &Step, ctx: &mut StepContext) -> Duration {
    let ms = match step {
        Step::Navigate { .. } => 800,
        Step::Browse { duration_ms, .. } => *duration_ms,
        Step::Chat { .. } => 1_500,
        Step::Diagnostic { .. } => 4_000,
        Step::AddToCart { .. } => 500,
        Step::Checkout { .. } => 3_000,
        Step::ContactForm { .. } => 1_500,
        Step::WaitForWebhook { timeout_ms, .. } => (*timeout_ms).min(2_000),
        Step::ValidateDatabase { .. } => 200,
        Step::Screenshot { .. } => 300,
        Step::Delay {
            duration_ms,
            randomize,
            ..
        } => {
            if *randomize && *duration_ms > 0 {
                let factor = ctx.rng().gen_range(0.8..=1.2);
                (*duration_ms as f64 * factor) as u64
            } else {
                *duration_ms
            }
        }
        Step::ApiCall { .. } => 400,
        Step::AdminAction { .. } => 600,
        Step::WaitForData {
            poll_interval_ms,
            timeout_ms,
            ..
        } => poll_interval_ms.unwrap_or(1_000).min(*timeout_ms),
    };
    Duration::from_millis(ms)
}

fn table_kind(table: &str) -> Option<ResourceKind> {
    match table {
        "chat_messages" => Some(ResourceKind::ChatMessage),
        "chat_sessions" => Some(ResourceKind::ChatSession),
        "contact_submissions" | "contacts" => Some(ResourceKind::Contact),
        "diagnostic_audits" | "diagnostics" => Some(ResourceKind::Diagnostic),
        "order_items" => Some(ResourceKind::OrderItem),
        "orders" => Some(ResourceKind::Order),
        _ => None,
    }
}

fn table_name(kind: &ResourceKind) -> Option<&'static str> {
    match kind {
        ResourceKind::ChatMessage => Some("chat_messages"),
        ResourceKind::ChatSession => Some("chat_sessions"),
        ResourceKind::Contact => Some("contact_submissions"),
        ResourceKind::Diagnostic => Some("diagnostic_audits"),
        ResourceKind::OrderItem => Some("order_items"),
        ResourceKind::Order => Some("orders"),
        ResourceKind::Other(_) => None,
    }
}

fn check_created_count(
    ctx: &StepContext,
    table: &str,
    expected_count: Option<u64>,
) -> Result<(), StepError> {
    let (Some(expected), Some(kind)) = (expected_count, table_kind(table)) else {
        return Ok(());
    };

    let found = ctx.created().iter().filter(|r| r.kind == kind).count() as u64;
    if found == expected {
        Ok(())
    } else {
        Err(StepError::assertion(format!(
            "expected {expected} rows in {table}, found {found}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use session_tunnel_catalog::{Catalog, PaymentMethod};
    use session_tunnel_core::prelude::ShutdownHandle;
    use session_tunnel_model::{ClientId, RunId};
    use session_tunnel_store::InMemoryStore;

    fn context(shutdown: &ShutdownHandle) -> StepContext {
        let catalog = Catalog::builtin();
        let run_id = RunId::from("e2e_sim");
        StepContext::new(
            run_id.clone(),
            ClientId::for_run(&run_id, 1),
            Arc::new(catalog.scenario("browse_and_buy").unwrap().clone()),
            Arc::new(catalog.persona("ready_rachel").unwrap().clone()),
            "test_e2e_",
            StdRng::seed_from_u64(1),
            shutdown.new_listener(),
        )
    }

    async fn run(
        executor: &SimulatedExecutor,
        step: Step,
        ctx: &mut StepContext,
    ) -> Result<StepOutcome, StepError> {
        let outcome = executor.execute(&step, ctx).await;
        if let Ok(outcome) = &outcome {
            ctx.record_created(&outcome.created);
        }
        outcome
    }

    #[tokio::test(start_paused = true)]
    async fn checkout_creates_order_and_items() {
        let store = Arc::new(InMemoryStore::new());
        let executor = SimulatedExecutor::new().with_store(store.clone());
        let shutdown = ShutdownHandle::new();
        let mut ctx = context(&shutdown);

        for product in ["audit", "workshop"] {
            run(
                &executor,
                Step::AddToCart {
                    product_id: Some(product.to_string()),
                    product_type: None,
                    quantity: 1,
                },
                &mut ctx,
            )
            .await
            .unwrap();
        }
        let outcome = run(
            &executor,
            Step::Checkout {
                payment_method: PaymentMethod::StripeTest,
                use_persona_contact: true,
            },
            &mut ctx,
        )
        .await
        .unwrap();

        let kinds = outcome
            .created
            .iter()
            .map(|r| r.kind.clone())
            .collect::<Vec<_>>();
        assert_eq!(
            vec![
                ResourceKind::Order,
                ResourceKind::OrderItem,
                ResourceKind::OrderItem
            ],
            kinds
        );
        assert!(outcome.created.iter().all(|r| r.id.starts_with("test_e2e_")));
        assert!(outcome.created.iter().all(|r| store.resource_exists(r)));

        run(&executor, Step::validate_database("orders", Some(1)), &mut ctx)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn empty_cart_checkout_is_a_validation_error() {
        let executor = SimulatedExecutor::new();
        let shutdown = ShutdownHandle::new();
        let mut ctx = context(&shutdown);

        let err = run(
            &executor,
            Step::Checkout {
                payment_method: PaymentMethod::Free,
                use_persona_contact: false,
            },
            &mut ctx,
        )
        .await
        .unwrap_err();
        assert_eq!(ErrorType::ValidationError, err.error_type);
    }

    #[tokio::test(start_paused = true)]
    async fn chat_session_is_created_once() {
        let executor = SimulatedExecutor::new();
        let shutdown = ShutdownHandle::new();
        let mut ctx = context(&shutdown);

        run(&executor, Step::chat("greeting", "hello"), &mut ctx)
            .await
            .unwrap();
        run(&executor, Step::chat("follow_up", "more"), &mut ctx)
            .await
            .unwrap();

        let sessions = ctx
            .created()
            .iter()
            .filter(|r| r.kind == ResourceKind::ChatSession)
            .count();
        assert_eq!(1, sessions);
        assert_eq!(5, ctx.created().len());

        let err = run(
            &executor,
            Step::validate_database("chat_sessions", Some(2)),
            &mut ctx,
        )
        .await
        .unwrap_err();
        assert_eq!(ErrorType::Assertion, err.error_type);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_a_long_step() {
        let executor = SimulatedExecutor::new();
        let shutdown = ShutdownHandle::new();
        let mut ctx = context(&shutdown);

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.shutdown();
        });

        let err = run(&executor, Step::delay(60_000, false), &mut ctx)
            .await
            .unwrap_err();
        assert!(err.is_cancellation());
    }

    #[tokio::test(start_paused = true)]
    async fn certain_failure_rate_always_fails() {
        let executor = SimulatedExecutor::new()
            .with_time_scale(0.0)
            .with_failure_rate(1.0);
        let shutdown = ShutdownHandle::new();
        let mut ctx = context(&shutdown);

        let err = run(&executor, Step::screenshot("home"), &mut ctx)
            .await
            .unwrap_err();
        assert_eq!(ErrorType::NetworkError, err.error_type);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_insert_reports_what_was_already_created() {
        let store = Arc::new(InMemoryStore::new());
        store.refuse_inserts_after(1);
        let executor = SimulatedExecutor::new().with_store(store.clone());
        let shutdown = ShutdownHandle::new();
        let mut ctx = context(&shutdown);

        let err = run(&executor, Step::chat("greeting", "hello"), &mut ctx)
            .await
            .unwrap_err();

        assert_eq!(ErrorType::ApiError, err.error_type);
        assert_eq!(1, err.created.len());
        assert_eq!(ResourceKind::ChatSession, err.created[0].kind);
        assert!(store.resource_exists(&err.created[0]));
    }

    #[tokio::test(start_paused = true)]
    async fn expected_outcomes_are_checked_against_session_rows() {
        let executor = SimulatedExecutor::new().with_time_scale(0.0);
        let shutdown = ShutdownHandle::new();
        let mut ctx = context(&shutdown);
        let escalated = ValidationRule::equals("chat_sessions", "is_escalated", true);

        let err = executor
            .validate(&ValidationRule::exists("chat_messages", "id"), &mut ctx)
            .await
            .unwrap_err();
        assert_eq!(ErrorType::ValidationError, err.error_type);

        run(&executor, Step::chat("urgent_help", "help"), &mut ctx)
            .await
            .unwrap();
        executor
            .validate(&ValidationRule::exists("chat_messages", "id"), &mut ctx)
            .await
            .unwrap();
        assert!(executor.validate(&escalated, &mut ctx).await.is_err());

        run(&executor, Step::chat("request_human", "a person please"), &mut ctx)
            .await
            .unwrap();
        executor.validate(&escalated, &mut ctx).await.unwrap();
    }
}
