//! Bytecode interpreter.
//!
//! A typed stack machine that runs a [`Program`] against the current
//! bindings of a [`VariableTable`] and produces exactly one [`Value`].
//!
//! - **Interpreter**: reusable execution context (stack bound, regex cache)
//! - **strings**: string-specialised operators
//! - **RuntimeError**: faults that abort one execution

pub mod error;
pub mod machine;
pub mod strings;

pub use error::{RuntimeError, RuntimeResult};
pub use machine::{Interpreter, DEFAULT_STACK_LIMIT, STACK_MARGIN};
pub use strings::PatternCache;

use crate::bytecode::Program;
use crate::row::{Value, VariableTable};

/// Execute with a fresh interpreter and default limits
pub fn execute<'a>(program: &'a Program, variables: &'a VariableTable) -> RuntimeResult<Value<'a>> {
    Interpreter::new().execute(program, variables)
}

/// Execute and reduce the result to its truthiness
pub fn evaluate_predicate(program: &Program, variables: &VariableTable) -> RuntimeResult<bool> {
    Interpreter::new().evaluate_predicate(program, variables)
}
