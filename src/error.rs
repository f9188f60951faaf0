//! Error taxonomy
//!
//! Two families:
//! - `ParseError`: load-time only. A program that parses never produces a
//!   parse error at run time.
//! - `EngineError`: per-request failures surfaced at the service boundary.

use thiserror::Error;
use uuid::Uuid;

use crate::types::RunStatus;

/// Errors produced while parsing a program source.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Line does not match any recognized statement shape.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// Call target is not in the fixed operation set.
    #[error("unknown operation '{name}' on line {line}")]
    UnknownOperation { name: String, line: usize },

    /// Argument references a variable no earlier step binds.
    #[error("undefined variable '{name}' on line {line}")]
    UndefinedVariable { name: String, line: usize },
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Errors surfaced by the engine for a single request.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No run exists for the supplied execution id.
    #[error("unknown execution_id {0}")]
    NotFound(Uuid),

    /// The run is terminal and rejects further mutation.
    #[error("execution {id} already terminal ({status:?})")]
    InvalidState { id: Uuid, status: RunStatus },

    /// Another request holds this run's lease. Transient; callers retry.
    #[error("execution {0} busy, retry")]
    Busy(Uuid),

    /// No program registered under this name.
    #[error("unknown program '{0}'")]
    UnknownProgram(String),

    /// Persistence failure. Progress since the last successful save is
    /// not claimed by the response.
    #[error("store failure: {0}")]
    Store(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
