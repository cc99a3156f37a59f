//! Error types for program execution.

use crate::row::DataType;
use thiserror::Error;

/// Faults that abort one execution. No partial value is ever returned
/// alongside an error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("Division by zero at instruction {pc}")]
    DivisionByZero { pc: usize },

    #[error("Program halted with an empty stack")]
    NoResult,

    #[error("Program halted with {depth} values on the stack, expected 1")]
    StackImbalance { depth: usize },

    #[error("Invalid opcode '{op}' at instruction {pc}")]
    InvalidOpcode { op: String, pc: usize },

    #[error("Stack overflow: limit is {limit}")]
    StackOverflow { limit: usize },

    #[error("Stack underflow at instruction {pc}")]
    StackUnderflow { pc: usize },

    #[error("Variable #{index} has no value")]
    UnboundVariable { index: usize },

    #[error("Program counter {pc} out of range")]
    ProgramCounterOutOfRange { pc: usize },

    #[error(
        "Type mismatch for '{operator}' at instruction {pc}: {}",
        describe_operands(.left, .right)
    )]
    TypeMismatch {
        operator: &'static str,
        left: DataType,
        right: Option<DataType>,
        pc: usize,
    },

    #[error("Invalid repeat count {count}")]
    InvalidRepeatCount { count: f64 },

    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Invalid timestamp '{text}', expected YYYY-MM-DDTHH:MM:SS")]
    InvalidTimestamp { text: String },

    #[error("Failed to allocate {requested} bytes")]
    Allocation { requested: usize },
}

fn describe_operands(left: &DataType, right: &Option<DataType>) -> String {
    match right {
        Some(right) => format!("{} and {}", left, right),
        None => left.to_string(),
    }
}

/// Result type for execution
pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            RuntimeError::DivisionByZero { pc: 2 }.to_string(),
            "Division by zero at instruction 2"
        );
        assert_eq!(
            RuntimeError::TypeMismatch {
                operator: "+",
                left: DataType::Number,
                right: Some(DataType::String),
                pc: 4,
            }
            .to_string(),
            "Type mismatch for '+' at instruction 4: number and string"
        );
        assert_eq!(
            RuntimeError::TypeMismatch {
                operator: "!",
                left: DataType::DateTime,
                right: None,
                pc: 0,
            }
            .to_string(),
            "Type mismatch for '!' at instruction 0: datetime"
        );
    }
}
