//! Collaborator interfaces consumed by operation handlers
//!
//! Automation and capture backends are opaque to the engine: handlers hand
//! them resolved values and get back either a result or, for automation, a
//! deferral. A deferral makes the handler suspend instead of blocking the
//! run on external latency.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::executor::{ArtifactHandle, Value};

#[derive(Debug, Error)]
#[error("{0}")]
pub struct CollabError(pub String);

/// What an automation collaborator did with an instruction.
#[derive(Debug)]
pub enum ActionOutcome {
    /// The action finished synchronously; the value is the modified context.
    Completed(Value),
    /// The action was accepted but runs asynchronously. The run suspends and
    /// the action result arrives through the resume path.
    Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    Screenshot,
    Report,
}

/// Drives an external application with a natural-language instruction.
pub trait AutomationProvider: Send + Sync {
    fn perform(&self, context: &Value, instruction: &str) -> Result<ActionOutcome, CollabError>;
}

/// Captures a screenshot or generates a report over captured artifacts.
pub trait CaptureProvider: Send + Sync {
    fn capture(
        &self,
        context: &Value,
        mode: CaptureMode,
        target_artifact: Option<&str>,
    ) -> Result<ArtifactHandle, CollabError>;
}

/// Bundle of collaborators handed to every handler invocation.
#[derive(Clone)]
pub struct Collaborators {
    pub automation: Arc<dyn AutomationProvider>,
    pub capture: Arc<dyn CaptureProvider>,
}

impl Collaborators {
    /// Local stand-ins, used by the CLI and anywhere no real backend is
    /// wired up.
    pub fn local() -> Self {
        Collaborators {
            automation: Arc::new(LocalAutomation),
            capture: Arc::new(LocalCapture::default()),
        }
    }
}

/* ===================== Local implementations ===================== */

/// Synchronous automation stand-in: annotates the context with the
/// instruction it was given and reports success.
pub struct LocalAutomation;

impl AutomationProvider for LocalAutomation {
    fn perform(&self, context: &Value, instruction: &str) -> Result<ActionOutcome, CollabError> {
        info!(instruction, "performing app action");

        let mut map = match context {
            Value::Obj(m) => m.clone(),
            other => {
                let mut m = std::collections::HashMap::new();
                m.insert("context".to_string(), other.clone());
                m
            }
        };
        map.insert(
            "last_instruction".to_string(),
            Value::Str(instruction.to_string()),
        );
        Ok(ActionOutcome::Completed(Value::Obj(map)))
    }
}

/// Capture stand-in that mints sequential artifact handles.
#[derive(Default)]
pub struct LocalCapture {
    counter: AtomicU64,
}

impl CaptureProvider for LocalCapture {
    fn capture(
        &self,
        _context: &Value,
        mode: CaptureMode,
        target_artifact: Option<&str>,
    ) -> Result<ArtifactHandle, CollabError> {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let kind = match mode {
            CaptureMode::Screenshot => "screenshot",
            CaptureMode::Report => "report",
        };
        info!(kind, target = target_artifact, "capturing artifact");

        Ok(ArtifactHandle {
            id: format!("{}-{}", kind, n),
            kind: kind.to_string(),
        })
    }
}
