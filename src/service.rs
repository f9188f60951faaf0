//! Entry service
//!
//! Transport-agnostic orchestration over the executor and context store.
//! One request either starts a new run or continues an existing one; the
//! reply is always one of paused / completed / failed, shaped for whatever
//! transport sits above.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::warn;
use uuid::Uuid;

use crate::collaborators::Collaborators;
use crate::error::{EngineError, EngineResult};
use crate::executor::{self, json_to_value, value_to_json};
use crate::programs::ProgramLibrary;
use crate::store::{ContextStore, RetentionPolicy};
use crate::types::{PendingOperation, RunState, RunStatus};

/// One start-or-continue request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineRequest {
    /// Absent to start a new run.
    pub execution_id: Option<Uuid>,
    /// Program to execute; only consulted when starting. Falls back to the
    /// engine's configured default.
    pub program: Option<String>,
    /// Data satisfying the pending operation of a paused run, or the initial
    /// `input` binding when starting.
    pub input_data: Option<JsonValue>,
}

/// Reply at the service boundary.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum EngineReply {
    Paused {
        execution_id: Uuid,
        waiting_for_input: bool,
        pending_operation: Option<PendingOperation>,
    },
    Completed {
        execution_id: Uuid,
        result: JsonValue,
        steps_completed: usize,
    },
    Failed {
        execution_id: Uuid,
        error: String,
    },
}

/// The engine: program library + context store + collaborators.
///
/// Holds no process-global state; independent engines coexist freely, which
/// is what the tests do.
pub struct Engine {
    store: ContextStore,
    programs: ProgramLibrary,
    collaborators: Collaborators,
    default_program: Option<String>,
}

impl Engine {
    pub fn new(collaborators: Collaborators) -> Self {
        Engine {
            store: ContextStore::new(),
            programs: ProgramLibrary::new(),
            collaborators,
            default_program: None,
        }
    }

    pub fn with_default_program(mut self, name: &str) -> Self {
        self.default_program = Some(name.to_string());
        self
    }

    pub fn programs(&self) -> &ProgramLibrary {
        &self.programs
    }

    pub fn store(&self) -> &ContextStore {
        &self.store
    }

    /// The single entry point: start a new run, resume a paused one, or
    /// poll. Holds the run's lease for the whole invocation so two requests
    /// for the same id never interleave.
    pub async fn start_or_resume(&self, request: EngineRequest) -> EngineResult<EngineReply> {
        match request.execution_id {
            None => self.start(request).await,
            Some(id) => self.resume(id, request.input_data).await,
        }
    }

    /// Forced cleanup of a run, regardless of status.
    pub async fn delete(&self, id: Uuid) {
        self.store.delete(id).await;
    }

    /// Apply the retention policy to terminal runs.
    pub async fn sweep(&self, policy: &RetentionPolicy) -> usize {
        self.store.sweep(policy).await
    }

    async fn start(&self, request: EngineRequest) -> EngineResult<EngineReply> {
        let name = request
            .program
            .or_else(|| self.default_program.clone())
            .ok_or_else(|| EngineError::UnknownProgram("<no program specified>".to_string()))?;

        let program = self
            .programs
            .get(&name)
            .ok_or_else(|| EngineError::UnknownProgram(name.clone()))?;

        let initial = request.input_data.as_ref().map(json_to_value);
        let mut run = RunState::new(&name, initial);
        let id = self.store.create(run.clone()).await;

        // Uncontended: nobody else knows this id yet.
        let _lease = self.store.lease(id).await?;

        executor::advance(&self.store, &program, &mut run, &self.collaborators).await?;
        Ok(reply_for(&run))
    }

    async fn resume(&self, id: Uuid, input_data: Option<JsonValue>) -> EngineResult<EngineReply> {
        let _lease = self.store.lease(id).await?;
        let mut run = self.store.get(id).await?;

        if run.status.is_terminal() {
            return Err(EngineError::InvalidState {
                id,
                status: run.status,
            });
        }

        match (run.status, input_data) {
            (RunStatus::Paused, Some(data)) => {
                // The injected value satisfies the pending operation; the
                // suspended step re-runs and consumes it.
                run.injected_input = Some(json_to_value(&data));
                run.pending_operation = None;
                run.status = RunStatus::Running;
                self.store.save(id, run.clone()).await?;
            }
            (RunStatus::Paused, None) => {
                // Idempotent poll: no step re-executes.
                return Ok(reply_for(&run));
            }
            (RunStatus::Running, _) => {
                // A previous request died between create and its first save.
                // The lease is ours, so carrying on is safe.
                warn!(%id, "run found in running state; continuing");
            }
            (_, _) => unreachable!("terminal states rejected above"),
        }

        let program = self
            .programs
            .get(&run.program)
            .ok_or_else(|| EngineError::UnknownProgram(run.program.clone()))?;

        executor::advance(&self.store, &program, &mut run, &self.collaborators).await?;
        Ok(reply_for(&run))
    }
}

fn reply_for(run: &RunState) -> EngineReply {
    match run.status {
        RunStatus::Paused => EngineReply::Paused {
            execution_id: run.id,
            waiting_for_input: true,
            pending_operation: run.pending_operation.clone(),
        },
        RunStatus::Completed => EngineReply::Completed {
            execution_id: run.id,
            result: run
                .response
                .as_ref()
                .map(value_to_json)
                .unwrap_or(JsonValue::Null),
            steps_completed: run.program_counter,
        },
        RunStatus::Failed => EngineReply::Failed {
            execution_id: run.id,
            error: run
                .error
                .clone()
                .unwrap_or_else(|| "unknown error".to_string()),
        },
        // advance() never exits with a run still marked running.
        RunStatus::Running => EngineReply::Failed {
            execution_id: run.id,
            error: "internal: run still running after advance".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::collaborators::{
        ActionOutcome, AutomationProvider, CollabError, Collaborators, LocalCapture,
    };
    use crate::executor::Value;
    use crate::parser::OpKind;

    struct FailingAutomation;

    impl AutomationProvider for FailingAutomation {
        fn perform(
            &self,
            _context: &Value,
            _instruction: &str,
        ) -> Result<ActionOutcome, CollabError> {
            Err(CollabError("backend down".to_string()))
        }
    }

    fn engine_with(source: &str, collaborators: Collaborators) -> Engine {
        let engine = Engine::new(collaborators).with_default_program("main");
        engine.programs().register("main", source).unwrap();
        engine
    }

    fn engine(source: &str) -> Engine {
        engine_with(source, Collaborators::local())
    }

    fn start() -> EngineRequest {
        EngineRequest::default()
    }

    fn resume(id: Uuid, input: JsonValue) -> EngineRequest {
        EngineRequest {
            execution_id: Some(id),
            program: None,
            input_data: Some(input),
        }
    }

    #[tokio::test]
    async fn test_input_then_respond_echoes_supplied_value() {
        let engine = engine("x = user_input()\nresponse(x)");

        let reply = engine.start_or_resume(start()).await.unwrap();
        let id = match reply {
            EngineReply::Paused {
                execution_id,
                waiting_for_input,
                pending_operation,
            } => {
                assert!(waiting_for_input);
                let pending = pending_operation.unwrap();
                assert_eq!(pending.op, OpKind::UserInput);
                assert_eq!(pending.target, "x");
                execution_id
            }
            other => panic!("expected paused, got {:?}", other),
        };

        let reply = engine
            .start_or_resume(resume(id, json!({"input": "hello"})))
            .await
            .unwrap();

        match reply {
            EngineReply::Completed {
                execution_id,
                result,
                steps_completed,
            } => {
                assert_eq!(execution_id, id);
                assert_eq!(result, json!("hello"));
                assert_eq!(steps_completed, 2);
            }
            other => panic!("expected completed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_poll_without_input_is_idempotent() {
        let engine = engine("x = user_input()\nresponse(x)");

        let id = match engine.start_or_resume(start()).await.unwrap() {
            EngineReply::Paused { execution_id, .. } => execution_id,
            other => panic!("expected paused, got {:?}", other),
        };

        // Poll twice with no input: same paused state, nothing re-executes.
        for _ in 0..2 {
            let request = EngineRequest {
                execution_id: Some(id),
                program: None,
                input_data: None,
            };
            match engine.start_or_resume(request).await.unwrap() {
                EngineReply::Paused {
                    pending_operation, ..
                } => {
                    assert_eq!(pending_operation.unwrap().step_index, 0);
                }
                other => panic!("expected paused, got {:?}", other),
            }
        }

        let stored = engine.store().get(id).await.unwrap();
        assert_eq!(stored.program_counter, 0);
        assert_eq!(stored.history.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_run_rejects_resume() {
        let engine = engine_with(
            "x = app_operation(input, instruction='go')\nresponse(x)",
            Collaborators {
                automation: Arc::new(FailingAutomation),
                capture: Arc::new(LocalCapture::default()),
            },
        );

        let request = EngineRequest {
            execution_id: None,
            program: None,
            input_data: Some(json!({"page": "home"})),
        };
        let id = match engine.start_or_resume(request).await.unwrap() {
            EngineReply::Failed {
                execution_id,
                error,
            } => {
                assert!(error.contains("backend down"));
                execution_id
            }
            other => panic!("expected failed, got {:?}", other),
        };

        match engine.start_or_resume(resume(id, json!({}))).await {
            Err(EngineError::InvalidState { status, .. }) => {
                assert_eq!(status, RunStatus::Failed)
            }
            other => panic!("expected InvalidState, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_execution_id_is_not_found() {
        let engine = engine("response(input)");
        let missing = Uuid::new_v4();

        match engine.start_or_resume(resume(missing, json!({}))).await {
            Err(EngineError::NotFound(id)) => assert_eq!(id, missing),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_program_rejected_at_start() {
        let engine = Engine::new(Collaborators::local());

        let request = EngineRequest {
            execution_id: None,
            program: Some("nope".to_string()),
            input_data: None,
        };
        assert!(matches!(
            engine.start_or_resume(request).await,
            Err(EngineError::UnknownProgram(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_request_for_same_run_is_busy() {
        let engine = engine("x = user_input()\nresponse(x)");

        let id = match engine.start_or_resume(start()).await.unwrap() {
            EngineReply::Paused { execution_id, .. } => execution_id,
            other => panic!("expected paused, got {:?}", other),
        };

        // Another request is mid-flight on this run.
        let _held = engine.store().lease(id).await.unwrap();

        match engine
            .start_or_resume(resume(id, json!({"input": "hi"})))
            .await
        {
            Err(EngineError::Busy(busy_id)) => assert_eq!(busy_id, id),
            other => panic!("expected Busy, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_distinct_runs_progress_independently() {
        let engine = Arc::new(engine("x = user_input()\nresponse(x)"));

        let a = match engine.start_or_resume(start()).await.unwrap() {
            EngineReply::Paused { execution_id, .. } => execution_id,
            other => panic!("expected paused, got {:?}", other),
        };
        let b = match engine.start_or_resume(start()).await.unwrap() {
            EngineReply::Paused { execution_id, .. } => execution_id,
            other => panic!("expected paused, got {:?}", other),
        };
        assert_ne!(a, b);

        let (ra, rb) = tokio::join!(
            engine.start_or_resume(resume(a, json!({"input": "one"}))),
            engine.start_or_resume(resume(b, json!({"input": "two"}))),
        );

        match ra.unwrap() {
            EngineReply::Completed { result, .. } => assert_eq!(result, json!("one")),
            other => panic!("expected completed, got {:?}", other),
        }
        match rb.unwrap() {
            EngineReply::Completed { result, .. } => assert_eq!(result, json!("two")),
            other => panic!("expected completed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_is_forced_cleanup() {
        let engine = engine("x = user_input()\nresponse(x)");

        let id = match engine.start_or_resume(start()).await.unwrap() {
            EngineReply::Paused { execution_id, .. } => execution_id,
            other => panic!("expected paused, got {:?}", other),
        };

        engine.delete(id).await;

        match engine.start_or_resume(resume(id, json!({}))).await {
            Err(EngineError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_initial_input_binds_reserved_variable() {
        let engine = engine("response(input)");

        let request = EngineRequest {
            execution_id: None,
            program: None,
            input_data: Some(json!({"user": "ada", "items": [1, 2]})),
        };

        match engine.start_or_resume(request).await.unwrap() {
            EngineReply::Completed { result, .. } => {
                assert_eq!(result, json!({"user": "ada", "items": [1.0, 2.0]}));
            }
            other => panic!("expected completed, got {:?}", other),
        }
    }
}
