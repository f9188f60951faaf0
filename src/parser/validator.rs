//! Static validation of variable references
//!
//! Every variable an argument names must be bound by a strictly earlier step
//! in the same program, or be the reserved initial input variable. Running a
//! validated program can therefore never hit an unbound variable.

use std::collections::HashSet;

use super::ast::{Arg, Program, Step};
use super::INITIAL_INPUT_VAR;
use crate::error::{ParseError, ParseResult};

pub fn validate(program: &Program) -> ParseResult<()> {
    let mut bound: HashSet<&str> = HashSet::new();
    bound.insert(INITIAL_INPUT_VAR);

    for step in &program.steps {
        check_step(step, &bound)?;

        // Bindings become visible only to later steps.
        if let Some(name) = &step.result_var {
            bound.insert(name);
        }
    }

    Ok(())
}

fn check_step<'a>(step: &'a Step, bound: &HashSet<&'a str>) -> ParseResult<()> {
    let refs = step
        .positional
        .iter()
        .chain(step.keyword.iter().map(|(_, v)| v));

    for arg in refs {
        if let Arg::Var(name) = arg {
            if !bound.contains(name.as_str()) {
                return Err(ParseError::UndefinedVariable {
                    name: name.clone(),
                    line: step.line,
                });
            }
        }
    }

    Ok(())
}
