use rand::rngs::StdRng;
use session_tunnel_catalog::{Persona, Scenario};
use session_tunnel_core::prelude::ShutdownListener;
use session_tunnel_model::{ClientId, ResourceRef, RunId};
use std::collections::HashMap;
use std::sync::Arc;

/// Everything a step executor can see about the session it is working for.
///
/// One context is created per session and lives until the session ends.
pub struct StepContext {
    run_id: RunId,
    client_id: ClientId,
    scenario: Arc<Scenario>,
    persona: Arc<Persona>,
    test_data_prefix: String,
    step_index: usize,
    contact_email: Option<String>,
    created: Vec<ResourceRef>,
    scratch: HashMap<String, serde_json::Value>,
    rng: StdRng,
    shutdown_listener: ShutdownListener,
}

impl StepContext {
    pub fn new(
        run_id: RunId,
        client_id: ClientId,
        scenario: Arc<Scenario>,
        persona: Arc<Persona>,
        test_data_prefix: impl Into<String>,
        rng: StdRng,
        shutdown_listener: ShutdownListener,
    ) -> Self {
        Self {
            run_id,
            client_id,
            scenario,
            persona,
            test_data_prefix: test_data_prefix.into(),
            step_index: 0,
            contact_email: None,
            created: Vec::new(),
            scratch: HashMap::new(),
            rng,
            shutdown_listener,
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn test_data_prefix(&self) -> &str {
        &self.test_data_prefix
    }

    /// Index of the step being executed.
    pub fn step_index(&self) -> usize {
        self.step_index
    }

    /// The email address this session uses whenever it submits contact details.
    ///
    /// Generated on first use and stable for the rest of the session.
    pub fn contact_email(&mut self) -> &str {
        let persona = &self.persona;
        let prefix = &self.test_data_prefix;
        self.contact_email
            .get_or_insert_with(|| persona.test_email(prefix))
    }

    /// Id for a new record in the target system, carrying the test data prefix.
    pub fn new_resource_id(&self, label: &str) -> String {
        format!(
            "{}{label}_{}",
            self.test_data_prefix,
            nanoid::nanoid!(10, &nanoid::alphabet::SAFE)
        )
    }

    /// Resources created by earlier steps of this session.
    pub fn created(&self) -> &[ResourceRef] {
        &self.created
    }

    /// Free-form state carried between steps of this session.
    pub fn scratch(&mut self) -> &mut HashMap<String, serde_json::Value> {
        &mut self.scratch
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn shutdown_listener(&mut self) -> &mut ShutdownListener {
        &mut self.shutdown_listener
    }

    pub(crate) fn begin_step(&mut self, step_index: usize) {
        self.step_index = step_index;
    }

    pub(crate) fn record_created(&mut self, created: &[ResourceRef]) {
        self.created.extend_from_slice(created);
    }
}
