//! Operation handlers
//!
//! One handler per operation in the fixed set, dispatched through an
//! exhaustive table. Handlers are deterministic given the run's variables
//! and the collaborator results, and never block on external latency: an
//! asynchronous collaborator produces a `Suspended` outcome instead.

use std::collections::HashMap;

use tracing::debug;

use super::outcome::{Awaiting, StepOutcome};
use super::values::Value;
use crate::collaborators::{ActionOutcome, CaptureMode, Collaborators};
use crate::parser::{Arg, OpKind, Step, INITIAL_INPUT_VAR};
use crate::types::RunState;

/// Shared handler contract.
pub trait Handler {
    fn apply(&self, run: &mut RunState, step: &Step, env: &Collaborators) -> StepOutcome;
}

/// Exhaustive dispatch table. Adding an operation means adding an `OpKind`
/// variant and an arm here.
pub fn handler_for(op: OpKind) -> &'static dyn Handler {
    match op {
        OpKind::UserInput => &UserInput,
        OpKind::AppOperation => &AppOperation,
        OpKind::MenuAction => &MenuAction,
        OpKind::SummaryResult => &SummaryResult,
        OpKind::Response => &Response,
    }
}

/* ===================== Argument resolution ===================== */

/// Resolve an argument against the run's bindings.
///
/// The parser guarantees references point at earlier bindings, so the only
/// way a lookup can miss is the reserved initial variable when the run was
/// started without input data.
fn resolve(run: &RunState, arg: &Arg) -> Result<Value, String> {
    match arg {
        Arg::Lit(value) => Ok(value.clone()),
        Arg::Var(name) => run.lookup(name).cloned().ok_or_else(|| {
            if name == INITIAL_INPUT_VAR {
                "run was started without input data but the program reads 'input'".to_string()
            } else {
                format!("variable '{}' has no value", name)
            }
        }),
    }
}

fn resolve_positional(run: &RunState, step: &Step, index: usize) -> Result<Value, String> {
    let arg = step.positional.get(index).ok_or_else(|| {
        format!(
            "{} requires a context argument at position {}",
            step.op.name(),
            index
        )
    })?;
    resolve(run, arg)
}

/* ===================== user_input ===================== */

/// Suspends until the resume path supplies a value, then completes with the
/// `input` field of the supplied mapping.
pub struct UserInput;

impl Handler for UserInput {
    fn apply(&self, run: &mut RunState, step: &Step, _env: &Collaborators) -> StepOutcome {
        match run.injected_input.take() {
            Some(Value::Obj(map)) => match map.get("input") {
                Some(value) => StepOutcome::Completed(value.clone()),
                None => StepOutcome::Failed("input data must contain an 'input' field".to_string()),
            },
            Some(value) => StepOutcome::Completed(value),
            None => StepOutcome::Suspended {
                awaiting: Awaiting::UserInput,
                target: step
                    .result_var
                    .clone()
                    .unwrap_or_else(|| INITIAL_INPUT_VAR.to_string()),
            },
        }
    }
}

/* ===================== app_operation ===================== */

/// Delegates an instruction to the automation collaborator. A deferred
/// action suspends the run; the action result arrives via resume.
pub struct AppOperation;

impl Handler for AppOperation {
    fn apply(&self, run: &mut RunState, step: &Step, env: &Collaborators) -> StepOutcome {
        // A value injected on resume is the result of the deferred action.
        if let Some(result) = run.injected_input.take() {
            return StepOutcome::Completed(result);
        }

        let context = match resolve_positional(run, step, 0) {
            Ok(v) => v,
            Err(e) => return StepOutcome::Failed(e),
        };

        let instruction = match step.kwarg("instruction").map(|arg| resolve(run, arg)) {
            Some(Ok(Value::Str(s))) => s,
            Some(Ok(other)) => {
                return StepOutcome::Failed(format!(
                    "instruction must be a string, got {:?}",
                    other
                ))
            }
            Some(Err(e)) => return StepOutcome::Failed(e),
            None => return StepOutcome::Failed("app_operation requires an instruction".to_string()),
        };

        debug!(instruction = %instruction, "dispatching app action");

        match env.automation.perform(&context, &instruction) {
            Ok(ActionOutcome::Completed(value)) => StepOutcome::Completed(value),
            Ok(ActionOutcome::Deferred) => StepOutcome::Suspended {
                awaiting: Awaiting::ActionResult,
                target: instruction,
            },
            Err(e) => StepOutcome::Failed(e.to_string()),
        }
    }
}

/* ===================== menu_action ===================== */

/// Keyword-driven capture dispatch: `save_pic` captures a screenshot,
/// `get_report` generates a report, optionally over the artifact named by
/// `pic`. Always synchronous.
pub struct MenuAction;

impl Handler for MenuAction {
    fn apply(&self, run: &mut RunState, step: &Step, env: &Collaborators) -> StepOutcome {
        let context = match resolve_positional(run, step, 0) {
            Ok(v) => v,
            Err(e) => return StepOutcome::Failed(e),
        };

        let mode = if step.kwarg("save_pic").is_some() {
            CaptureMode::Screenshot
        } else if step.kwarg("get_report").is_some() {
            CaptureMode::Report
        } else {
            return StepOutcome::Failed(
                "menu_action requires either save_pic or get_report".to_string(),
            );
        };

        let target = match step.kwarg("pic").map(|arg| resolve(run, arg)) {
            Some(Ok(Value::Handle(handle))) => Some(handle.id),
            Some(Ok(Value::Str(s))) => Some(s),
            Some(Ok(other)) => {
                return StepOutcome::Failed(format!("pic must name an artifact, got {:?}", other))
            }
            Some(Err(e)) => return StepOutcome::Failed(e),
            None => None,
        };

        match env.capture.capture(&context, mode, target.as_deref()) {
            Ok(handle) => StepOutcome::Completed(Value::Handle(handle)),
            Err(e) => StepOutcome::Failed(e.to_string()),
        }
    }
}

/* ===================== summary_result ===================== */

/// Pure transformation over the accumulated variables. No collaborator and
/// no suspension.
pub struct SummaryResult;

impl Handler for SummaryResult {
    fn apply(&self, run: &mut RunState, step: &Step, _env: &Collaborators) -> StepOutcome {
        let context = match resolve_positional(run, step, 0) {
            Ok(v) => v,
            Err(e) => return StepOutcome::Failed(e),
        };

        // Sorted so the summary is identical across runs with the same
        // bindings.
        let mut artifacts: Vec<&str> = run
            .variables
            .values()
            .filter_map(|v| match v {
                Value::Handle(h) => Some(h.id.as_str()),
                _ => None,
            })
            .collect();
        artifacts.sort_unstable();

        let mut summary = HashMap::new();
        summary.insert(
            "steps_completed".to_string(),
            Value::Num(run.program_counter as f64),
        );
        summary.insert(
            "variables_bound".to_string(),
            Value::Num(run.variables.len() as f64),
        );
        summary.insert(
            "artifacts".to_string(),
            Value::List(
                artifacts
                    .into_iter()
                    .map(|id| Value::Str(id.to_string()))
                    .collect(),
            ),
        );
        summary.insert("context".to_string(), context);

        StepOutcome::Completed(Value::Obj(summary))
    }
}

/* ===================== response ===================== */

/// Publishes an externally visible payload. The run keeps going unless this
/// is the last step.
pub struct Response;

impl Handler for Response {
    fn apply(&self, run: &mut RunState, step: &Step, _env: &Collaborators) -> StepOutcome {
        let payload = match resolve_positional(run, step, 0) {
            Ok(v) => v,
            Err(e) => return StepOutcome::Failed(e),
        };

        run.response = Some(payload);
        StepOutcome::Completed(Value::Null)
    }
}
