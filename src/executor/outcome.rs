//! Step outcome types
//!
//! Suspension is an expected, frequent path, so it is a first-class return
//! value rather than an error.

use serde::{Deserialize, Serialize};

use super::values::Value;

/// What a suspended step is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Awaiting {
    UserInput,
    ActionResult,
}

/// Result of applying one handler to one step.
#[derive(Debug)]
pub enum StepOutcome {
    /// The step finished; the value is bound to the step's result variable
    /// if one is declared.
    Completed(Value),
    /// The step cannot finish without external data. The run pauses and the
    /// same step re-runs on resume, this time with the injected input
    /// available.
    Suspended { awaiting: Awaiting, target: String },
    /// Unrecoverable step error; the run is marked failed.
    Failed(String),
}
