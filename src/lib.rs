pub mod cli;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod executor;
pub mod parser;
pub mod programs;
pub mod service;
pub mod store;
pub mod types;

// Re-export main types
pub use error::{EngineError, ParseError};
pub use service::{Engine, EngineReply, EngineRequest};
pub use types::{PendingOperation, RunState, RunStatus};
