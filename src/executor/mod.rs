//! Executor - the run state machine
//!
//! Walks a parsed program against a `RunState`, dispatching each step to its
//! handler. A `Completed` outcome advances the program counter; `Suspended`
//! pauses the run without advancing, so the same step re-runs on resume with
//! the injected input available; `Failed` terminates the run.
//!
//! Progress is persisted through the context store after every step. A step
//! is never reported as done before its save returns, so a persistence
//! failure cannot leave the run claiming progress it does not have.

pub mod handlers;
pub mod outcome;
pub mod values;

#[cfg(test)]
mod tests;

pub use handlers::{handler_for, Handler};
pub use outcome::{Awaiting, StepOutcome};
pub use values::{json_to_value, value_to_json, ArtifactHandle, Value};

use tracing::{debug, info};

use crate::collaborators::Collaborators;
use crate::error::EngineResult;
use crate::parser::Program;
use crate::store::ContextStore;
use crate::types::{PendingOperation, RunState, RunStatus, StepRecord};

/// Drive a running run forward until it pauses, fails, or completes.
///
/// The caller must hold the run's lease and is responsible for the
/// paused-state bookkeeping (input injection, idempotent poll) before
/// calling in; this function only ever sees a run in `Running` status or one
/// that has nothing left to do.
pub async fn advance(
    store: &ContextStore,
    program: &Program,
    run: &mut RunState,
    env: &Collaborators,
) -> EngineResult<()> {
    while run.status == RunStatus::Running && run.program_counter < program.len() {
        let step = &program.steps[run.program_counter];
        debug!(id = %run.id, pc = run.program_counter, op = step.op.name(), "executing step");

        match handler_for(step.op).apply(run, step, env) {
            StepOutcome::Completed(value) => {
                if let Some(name) = step.result_var.clone() {
                    run.bind(&name, value);
                }
                run.history.push(StepRecord {
                    step_index: run.program_counter,
                    op: step.op,
                    outcome: "completed".to_string(),
                });
                run.program_counter += 1;
                store.save(run.id, run.clone()).await?;
            }

            StepOutcome::Suspended { awaiting, target } => {
                run.status = RunStatus::Paused;
                run.pending_operation = Some(PendingOperation {
                    step_index: run.program_counter,
                    op: step.op,
                    target,
                });
                run.history.push(StepRecord {
                    step_index: run.program_counter,
                    op: step.op,
                    outcome: "suspended".to_string(),
                });
                store.save(run.id, run.clone()).await?;

                info!(id = %run.id, pc = run.program_counter, ?awaiting, "run paused");
                return Ok(());
            }

            StepOutcome::Failed(message) => {
                run.status = RunStatus::Failed;
                run.error = Some(message.clone());
                run.history.push(StepRecord {
                    step_index: run.program_counter,
                    op: step.op,
                    outcome: "failed".to_string(),
                });
                store.save(run.id, run.clone()).await?;

                info!(id = %run.id, pc = run.program_counter, error = %message, "run failed");
                return Ok(());
            }
        }
    }

    if run.status == RunStatus::Running {
        run.status = RunStatus::Completed;
        store.save(run.id, run.clone()).await?;
        info!(id = %run.id, steps = run.program_counter, "run completed");
    }

    Ok(())
}
