//! Expression compiler.
//!
//! Turns filter expression text into a [`Program`] in a single pass: the
//! recursive-descent parser emits bytecode while it parses, resolving
//! variable names against a [`VariableTable`] and propagating static types
//! so that operators are emitted in their specialised form whenever the
//! operand types are known.
//!
//! All scanning and emission state lives in a [`Parser`] value, so any
//! number of compilations may run side by side.

pub mod error;
pub mod lexer;
pub mod parser;
pub mod token;

pub use error::{CompileError, CompileResult, OverflowKind};
pub use lexer::{Lexer, DEFAULT_MAX_TOKEN_LEN};
pub use parser::Parser;
pub use token::{Spanned, Token};

use crate::bytecode::Program;
use crate::row::VariableTable;
use log::debug;

/// Default maximum number of instructions in a program, `Halt` included
pub const DEFAULT_MAX_PROGRAM_LEN: usize = 1024;

/// Default bound on parenthesis / conditional / negation nesting
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Resource limits for one compilation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    pub max_program_len: usize,
    pub max_token_len: usize,
    pub max_depth: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            max_program_len: DEFAULT_MAX_PROGRAM_LEN,
            max_token_len: DEFAULT_MAX_TOKEN_LEN,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Compile `expression` against `variables` with the default limits
pub fn compile(expression: &str, variables: &VariableTable) -> CompileResult<Program> {
    compile_with(expression, variables, &CompileOptions::default())
}

/// Compile `expression` against `variables`.
///
/// Every variable referenced by name must already be present in the table.
/// On error no program is produced.
pub fn compile_with(
    expression: &str,
    variables: &VariableTable,
    options: &CompileOptions,
) -> CompileResult<Program> {
    let (program, data_type) = Parser::new(expression, variables, options)?.compile()?;
    debug!(
        "Compiled '{}' into {} instructions (result type {})",
        expression,
        program.len(),
        data_type
    );
    Ok(program)
}
