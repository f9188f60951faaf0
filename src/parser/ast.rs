//! Parsed program representation
//!
//! A `Program` is an ordered list of `Step`s. It is immutable once built and
//! is shared read-only across every run that executes it.

use serde::{Deserialize, Serialize};

use crate::executor::Value;

/// The fixed operation set. Adding an operation means adding a variant here
/// and an arm in the handler dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    UserInput,
    AppOperation,
    MenuAction,
    SummaryResult,
    Response,
}

impl OpKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "user_input" => Some(OpKind::UserInput),
            "app_operation" => Some(OpKind::AppOperation),
            "menu_action" => Some(OpKind::MenuAction),
            "summary_result" => Some(OpKind::SummaryResult),
            "response" => Some(OpKind::Response),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OpKind::UserInput => "user_input",
            OpKind::AppOperation => "app_operation",
            OpKind::MenuAction => "menu_action",
            OpKind::SummaryResult => "summary_result",
            OpKind::Response => "response",
        }
    }
}

/// One argument value: a literal or a reference to an earlier binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Arg {
    Lit(Value),
    Var(String),
}

/// One parsed statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Variable bound when the step completes, if the statement assigns one.
    pub result_var: Option<String>,
    pub op: OpKind,
    pub positional: Vec<Arg>,
    /// Keyword arguments in source order.
    pub keyword: Vec<(String, Arg)>,
    /// 1-based source line, for diagnostics.
    pub line: usize,
}

impl Step {
    /// Look up a keyword argument by name.
    pub fn kwarg(&self, name: &str) -> Option<&Arg> {
        self.keyword
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub steps: Vec<Step>,
}

impl Program {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
