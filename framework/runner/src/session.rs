use crate::context::StepContext;
use crate::executor::{StepError, StepExecutor};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use session_tunnel_catalog::{Persona, Scenario};
use session_tunnel_core::prelude::ShutdownListener;
use session_tunnel_model::{
    ClientId, ClientSession, ErrorType, LiveSession, RunId, SessionStatus, StepRecord,
};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

/// The session record plus what it is doing right now.
///
/// Shared between the session task, which is the only writer, and the run that spawned it, which
/// reads it for live stats and to force-finalize the session if it never finishes.
#[derive(Debug)]
pub(crate) struct SessionProgress {
    pub(crate) session: ClientSession,
    pub(crate) total_steps: usize,
    pub(crate) current_step: Option<usize>,
    pub(crate) current_step_type: Option<String>,
    pub(crate) description: String,
}

pub(crate) type SessionSlot = Arc<Mutex<SessionProgress>>;

impl SessionProgress {
    pub(crate) fn new_slot(session: ClientSession, total_steps: usize) -> SessionSlot {
        Arc::new(Mutex::new(Self {
            session,
            total_steps,
            current_step: None,
            current_step_type: None,
            description: "Starting scenario".to_string(),
        }))
    }

    pub(crate) fn live(&self) -> LiveSession {
        LiveSession {
            client_id: self.session.client_id.clone(),
            scenario: self.session.scenario.clone(),
            persona: self.session.persona.clone(),
            current_step: self.current_step,
            total_steps: self.total_steps,
            current_step_type: self.current_step_type.clone(),
            description: self.description.clone(),
            started_at: self.session.started_at,
        }
    }

    /// Fail the session because it did not finish in time. A session that already reached a
    /// terminal state is left alone.
    pub(crate) fn force_timeout(&mut self, message: &str) -> ClientSession {
        if !self.session.is_terminal() {
            let step_type = self
                .current_step_type
                .clone()
                .unwrap_or_else(|| "session".to_string());
            self.session
                .record_error(ErrorType::Timeout, self.current_step, step_type, message);
            self.session.finish(SessionStatus::Failed);
        }
        self.session.clone()
    }
}

/// What a session needs to run, fixed at spawn time.
pub(crate) struct SessionPlan {
    pub(crate) run_id: RunId,
    pub(crate) client_id: ClientId,
    pub(crate) scenario: Arc<Scenario>,
    pub(crate) persona: Arc<Persona>,
    pub(crate) test_data_prefix: String,
    pub(crate) think_time_scale: f64,
}

enum StepFlow {
    Continue,
    Abort,
}

/// Run one scenario with one persona until it reaches a terminal state.
///
/// Steps run strictly in order. Cancellation is checked before each step and during think time.
/// Whatever happens, the returned session is terminal: a panic anywhere in the session is recorded
/// as an exception and fails it.
pub(crate) async fn run_session(
    plan: SessionPlan,
    executor: Arc<dyn StepExecutor>,
    slot: SessionSlot,
    rng: StdRng,
    shutdown_listener: ShutdownListener,
) -> ClientSession {
    let client_id = plan.client_id.clone();
    let result = AssertUnwindSafe(drive_session(
        plan,
        executor,
        slot.clone(),
        rng,
        shutdown_listener,
    ))
    .catch_unwind()
    .await;

    match result {
        Ok(session) => session,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            log::error!("[{client_id}] Session panicked: {message}");
            let mut progress = slot.lock();
            if !progress.session.is_terminal() {
                let step_index = progress.current_step;
                let step_type = progress
                    .current_step_type
                    .clone()
                    .unwrap_or_else(|| "session".to_string());
                progress
                    .session
                    .record_error(ErrorType::Exception, step_index, step_type, message);
                progress.session.finish(SessionStatus::Failed);
            }
            progress.session.clone()
        }
    }
}

async fn drive_session(
    plan: SessionPlan,
    executor: Arc<dyn StepExecutor>,
    slot: SessionSlot,
    mut rng: StdRng,
    mut shutdown_listener: ShutdownListener,
) -> ClientSession {
    let scenario = plan.scenario.clone();
    let persona = plan.persona.clone();

    if let Err(mismatch) = scenario.validate_persona(&persona) {
        log::warn!("[{}] Cannot start session: {mismatch}", plan.client_id);
        let mut progress = slot.lock();
        progress
            .session
            .record_error(ErrorType::Configuration, None, "validation", mismatch.to_string());
        progress.session.finish(SessionStatus::Failed);
        return progress.session.clone();
    }

    log::debug!(
        "[{}] Starting scenario {} as {}",
        plan.client_id,
        scenario.id,
        persona.id
    );

    let mut ctx = StepContext::new(
        plan.run_id.clone(),
        plan.client_id.clone(),
        scenario.clone(),
        persona.clone(),
        plan.test_data_prefix.clone(),
        StdRng::seed_from_u64(rng.gen()),
        shutdown_listener.clone(),
    );

    let mut status = SessionStatus::Completed;
    let total_steps = scenario.steps.len();
    for (index, step) in scenario.steps.iter().enumerate() {
        let step_type = step.action.step_type();

        if shutdown_listener.should_shutdown() {
            record_cancelled(&slot, index, step_type, "session cancelled before the step started");
            status = SessionStatus::Failed;
            break;
        }

        if step.skip_probability > 0.0 && rng.gen::<f64>() < step.skip_probability {
            log::trace!("[{}] Skipping step {index} ({step_type})", plan.client_id);
            slot.lock()
                .session
                .steps
                .push(StepRecord::skipped(index, step_type));
            continue;
        }

        {
            let mut progress = slot.lock();
            progress.current_step = Some(index);
            progress.current_step_type = Some(step_type.to_string());
            progress.description = step.action.describe();
        }
        ctx.begin_step(index);

        let started_at = Utc::now();
        let result = AssertUnwindSafe(executor.execute(&step.action, &mut ctx))
            .catch_unwind()
            .await;

        if let Ok(Err(e)) = &result {
            if !e.created.is_empty() {
                ctx.record_created(&e.created);
                slot.lock()
                    .session
                    .created_resources
                    .extend(e.created.iter().cloned());
            }
        }

        let flow = match result {
            Ok(Ok(outcome)) => {
                ctx.record_created(&outcome.created);
                let mut progress = slot.lock();
                progress
                    .session
                    .steps
                    .push(StepRecord::finished(index, step_type, started_at, None));
                progress.session.created_resources.extend(outcome.created);
                StepFlow::Continue
            }
            Ok(Err(e)) if e.is_cancellation() => {
                record_cancelled(&slot, index, step_type, &e.message);
                StepFlow::Abort
            }
            Ok(Err(e)) => {
                log::debug!("[{}] Step {index} ({step_type}) failed: {e}", plan.client_id);
                record_step_failure(&slot, index, step_type, started_at, &e);
                if step.non_fatal {
                    StepFlow::Continue
                } else {
                    StepFlow::Abort
                }
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                log::error!(
                    "[{}] Step {index} ({step_type}) panicked: {message}",
                    plan.client_id
                );
                record_step_failure(
                    &slot,
                    index,
                    step_type,
                    started_at,
                    &StepError::new(ErrorType::Exception, message),
                );
                StepFlow::Abort
            }
        };

        if let StepFlow::Abort = flow {
            status = SessionStatus::Failed;
            break;
        }

        if index + 1 < total_steps {
            let pause = think_time(&scenario, &persona, plan.think_time_scale, &mut rng);
            if !pause.is_zero()
                && shutdown_listener
                    .cancellable(tokio::time::sleep(pause))
                    .await
                    .is_err()
            {
                record_cancelled(&slot, index + 1, "think_time", "session cancelled between steps");
                status = SessionStatus::Failed;
                break;
            }
        }
    }

    if matches!(status, SessionStatus::Completed) && !scenario.expected_outcomes.is_empty() {
        {
            let mut progress = slot.lock();
            progress.current_step = None;
            progress.current_step_type = Some("validation".to_string());
            progress.description = "Checking expected outcomes".to_string();
        }

        for rule in &scenario.expected_outcomes.data_validation {
            if let Err(e) = executor.validate(rule, &mut ctx).await {
                log::debug!(
                    "[{}] Expected outcome on {}.{} not met: {e}",
                    plan.client_id,
                    rule.table,
                    rule.field
                );
                slot.lock().session.record_error(
                    ErrorType::ValidationError,
                    None,
                    "validation",
                    e.message,
                );
                status = SessionStatus::Failed;
            }
        }
    }

    let mut progress = slot.lock();
    progress.description = "Scenario complete".to_string();
    progress.session.finish(status);
    log::debug!(
        "[{}] Finished scenario {} with status {}",
        plan.client_id,
        scenario.id,
        progress.session.status
    );
    progress.session.clone()
}

fn think_time(scenario: &Scenario, persona: &Persona, scale: f64, rng: &mut StdRng) -> Duration {
    let base = scenario.delay_range.at(rng.gen::<f64>());
    let factor = persona.pace * scale;
    if factor.is_nan() || factor <= 0.0 || base.is_zero() {
        return Duration::ZERO;
    }

    Duration::try_from_secs_f64(base.as_secs_f64() * factor).unwrap_or_else(|e| {
        log::warn!(
            "Think time {base:?} x {factor} for persona {} is out of range, not pausing: {e}",
            persona.id
        );
        Duration::ZERO
    })
}

fn record_cancelled(slot: &SessionSlot, index: usize, step_type: &str, message: &str) {
    slot.lock()
        .session
        .record_error(ErrorType::Cancelled, Some(index), step_type, message);
}

fn record_step_failure(
    slot: &SessionSlot,
    index: usize,
    step_type: &str,
    started_at: DateTime<Utc>,
    error: &StepError,
) {
    let mut progress = slot.lock();
    progress.session.steps.push(StepRecord::finished(
        index,
        step_type,
        started_at,
        Some(error.message.clone()),
    ));
    progress
        .session
        .record_error(error.error_type, Some(index), step_type, error.message.clone());
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "step panicked".to_string()
    }
}
