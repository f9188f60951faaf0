use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::executor::Value;
use crate::parser::{OpKind, INITIAL_INPUT_VAR};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Paused,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// Identity of the step a paused run is waiting on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingOperation {
    pub step_index: usize,
    #[serde(rename = "type")]
    pub op: OpKind,
    /// What the supplied data will satisfy: the declared result variable for
    /// user input, the instruction for a deferred app action.
    pub target: String,
}

/// One entry in a run's execution history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub step_index: usize,
    pub op: OpKind,
    pub outcome: String,
}

/// Durable per-run execution state.
///
/// Owned exclusively by the context store; the executor checks a copy out
/// for the duration of one request and hands every mutation back through
/// `save` before the response is produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub id: Uuid,
    /// Name of the registered program this run executes.
    pub program: String,
    /// Index of the next step to execute. Never decreases.
    pub program_counter: usize,
    /// Accumulated bindings. Keys are only added or overwritten, never
    /// removed.
    pub variables: HashMap<String, Value>,
    pub status: RunStatus,
    pub pending_operation: Option<PendingOperation>,
    /// Value supplied on the resume path, consumed by the step that
    /// suspended when it re-runs.
    pub injected_input: Option<Value>,
    /// Latest payload published by a `response(...)` step.
    pub response: Option<Value>,
    pub error: Option<String>,
    pub history: Vec<StepRecord>,
    pub created_at: DateTime<Utc>,
    pub touched_at: DateTime<Utc>,
}

impl RunState {
    pub fn new(program: &str, initial_input: Option<Value>) -> Self {
        let now = Utc::now();
        let mut variables = HashMap::new();
        if let Some(value) = initial_input {
            variables.insert(INITIAL_INPUT_VAR.to_string(), value);
        }

        RunState {
            id: Uuid::new_v4(),
            program: program.to_string(),
            program_counter: 0,
            variables,
            status: RunStatus::Running,
            pending_operation: None,
            injected_input: None,
            response: None,
            error: None,
            history: Vec::new(),
            created_at: now,
            touched_at: now,
        }
    }

    pub fn bind(&mut self, name: &str, value: Value) {
        self.variables.insert(name.to_string(), value);
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }
}
