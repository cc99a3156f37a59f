//! Row data visible to expressions.
//!
//! This module provides:
//! - The value model shared by variables, program literals and the interpreter
//! - The variable table a row is bound into

pub mod value;
pub mod variable;

pub use value::{parse_timestamp, DataType, Value, DATE_FORMAT};
pub use variable::{Variable, VariableError, VariableTable};
