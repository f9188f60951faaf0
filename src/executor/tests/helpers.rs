//! Shared fixtures for executor tests

use std::sync::Arc;

use crate::collaborators::{
    ActionOutcome, AutomationProvider, CollabError, Collaborators, LocalCapture,
};
use crate::executor::Value;
use crate::parser::{self, Program};
use crate::store::ContextStore;
use crate::types::RunState;

/// Automation that always defers, forcing the handler to suspend.
pub struct DeferredAutomation;

impl AutomationProvider for DeferredAutomation {
    fn perform(&self, _context: &Value, _instruction: &str) -> Result<ActionOutcome, CollabError> {
        Ok(ActionOutcome::Deferred)
    }
}

/// Automation that always fails.
pub struct FailingAutomation;

impl AutomationProvider for FailingAutomation {
    fn perform(&self, _context: &Value, _instruction: &str) -> Result<ActionOutcome, CollabError> {
        Err(CollabError("automation backend unreachable".to_string()))
    }
}

pub fn local_env() -> Collaborators {
    Collaborators::local()
}

pub fn env_with(automation: impl AutomationProvider + 'static) -> Collaborators {
    Collaborators {
        automation: Arc::new(automation),
        capture: Arc::new(LocalCapture::default()),
    }
}

pub fn program(source: &str) -> Program {
    parser::parse(source).expect("test program must parse")
}

/// Store with one freshly created run for the given program name.
pub async fn store_with_run(program_name: &str, initial: Option<Value>) -> (ContextStore, RunState) {
    let store = ContextStore::new();
    let run = RunState::new(program_name, initial);
    store.create(run.clone()).await;
    (store, run)
}
