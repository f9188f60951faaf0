//! PEST-based parser for the automation language
//!
//! Produces an ordered `Program` of `Step`s. Parsing is pure: the same
//! source always yields a structurally identical program, and all variable
//! reference errors are caught here, never at run time.

use pest::Parser;
use pest_derive::Parser;

use crate::error::{ParseError, ParseResult};
use crate::executor::Value;

pub mod ast;
pub mod validator;

#[cfg(test)]
mod tests;

pub use ast::{Arg, OpKind, Program, Step};

/// Reserved variable bound from the initial `input_data` of a run. The
/// validator treats it as always defined.
pub const INITIAL_INPUT_VAR: &str = "input";

#[derive(Parser)]
#[grammar = "parser/grammar.pest"]
struct SeqParser;

/* ===================== Public API ===================== */

/// Parse a source string into a validated program.
pub fn parse(source: &str) -> ParseResult<Program> {
    let mut pairs =
        SeqParser::parse(Rule::program, source).map_err(|e| ParseError::Syntax(e.to_string()))?;

    let program = pairs.next().expect("grammar yields exactly one program");

    let mut steps = Vec::new();
    for pair in program.into_inner() {
        match pair.as_rule() {
            Rule::statement => steps.push(build_statement(pair)?),
            Rule::EOI => {}
            other => {
                return Err(ParseError::Syntax(format!(
                    "unexpected rule at top level: {:?}",
                    other
                )))
            }
        }
    }

    let program = Program { steps };
    validator::validate(&program)?;
    Ok(program)
}

/* ===================== AST Builder ===================== */

fn build_statement(pair: pest::iterators::Pair<Rule>) -> ParseResult<Step> {
    let inner = pair.into_inner().next().expect("statement has one child");

    match inner.as_rule() {
        Rule::assignment => {
            // assignment = { identifier ~ "=" ~ call }
            let mut parts = inner.into_inner();
            let target = parts.next().expect("assignment target");
            let call = parts.next().expect("assignment call");
            build_call(call, Some(target.as_str().to_string()))
        }
        Rule::call => build_call(inner, None),
        other => Err(ParseError::Syntax(format!(
            "unexpected statement rule: {:?}",
            other
        ))),
    }
}

fn build_call(pair: pest::iterators::Pair<Rule>, result_var: Option<String>) -> ParseResult<Step> {
    let line = pair.line_col().0;
    let mut inner = pair.into_inner();

    let name_pair = inner.next().expect("call name");
    let name = name_pair.as_str();
    let op = OpKind::from_name(name).ok_or_else(|| ParseError::UnknownOperation {
        name: name.to_string(),
        line,
    })?;

    let mut positional = Vec::new();
    let mut keyword = Vec::new();

    for arg_pair in inner {
        let arg_inner = arg_pair.into_inner().next().expect("arg has one child");
        match arg_inner.as_rule() {
            Rule::kwarg => {
                let mut parts = arg_inner.into_inner();
                let key = parts.next().expect("kwarg key").as_str().to_string();
                let value_pair = parts
                    .next()
                    .expect("kwarg value")
                    .into_inner()
                    .next()
                    .expect("kwarg value child");
                keyword.push((key, build_arg(value_pair)?));
            }
            Rule::literal | Rule::var_ref => positional.push(build_arg(arg_inner)?),
            other => {
                return Err(ParseError::Syntax(format!(
                    "unexpected argument rule: {:?}",
                    other
                )))
            }
        }
    }

    Ok(Step {
        result_var,
        op,
        positional,
        keyword,
        line,
    })
}

fn build_arg(pair: pest::iterators::Pair<Rule>) -> ParseResult<Arg> {
    match pair.as_rule() {
        Rule::var_ref => Ok(Arg::Var(pair.as_str().to_string())),
        Rule::literal => {
            let inner = pair.into_inner().next().expect("literal has one child");
            build_arg(inner)
        }
        Rule::boolean => Ok(Arg::Lit(Value::Bool(pair.as_str() == "true"))),
        Rule::null_lit => Ok(Arg::Lit(Value::Null)),
        Rule::number => {
            let text = pair.as_str();
            let value = text
                .parse::<f64>()
                .map_err(|e| ParseError::Syntax(format!("bad number '{}': {}", text, e)))?;
            Ok(Arg::Lit(Value::Num(value)))
        }
        Rule::string => {
            let content = pair.into_inner().next().expect("string content");
            Ok(Arg::Lit(Value::Str(content.as_str().to_string())))
        }
        other => Err(ParseError::Syntax(format!(
            "unexpected value rule: {:?}",
            other
        ))),
    }
}
