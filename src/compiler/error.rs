//! Error types for expression compilation.

use crate::row::DataType;
use std::fmt;
use thiserror::Error;

/// Which bounded resource a compilation exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowKind {
    /// Instruction buffer
    Program,
    /// Identifier or numeric literal length
    Token,
    /// Parenthesis / conditional / negation nesting
    Nesting,
}

impl fmt::Display for OverflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowKind::Program => write!(f, "Program"),
            OverflowKind::Token => write!(f, "Token"),
            OverflowKind::Nesting => write!(f, "Nesting"),
        }
    }
}

/// Errors that abort a compilation. Every variant carries the byte offset
/// of the offending token in the source expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("Undefined symbol '{symbol}' at position {position}")]
    UndefinedSymbol { symbol: char, position: usize },

    #[error("Can't find trailing {quote} for string starting at position {position}")]
    UnterminatedString { quote: char, position: usize },

    #[error("Invalid number '{text}' at position {position}")]
    InvalidNumber { text: String, position: usize },

    #[error("Undefined variable '{name}' at position {position}")]
    UndefinedVariable { name: String, position: usize },

    #[error(
        "Type mismatch for '{operator}' at position {position}: {}",
        describe_operands(.left, .right)
    )]
    TypeMismatch {
        operator: &'static str,
        left: DataType,
        right: Option<DataType>,
        position: usize,
    },

    #[error("{kind} overflow at position {position}: limit is {limit}")]
    Overflow {
        kind: OverflowKind,
        limit: usize,
        position: usize,
    },

    #[error("Expected {expected}, found {found} at position {position}")]
    ExpectedToken {
        expected: &'static str,
        found: String,
        position: usize,
    },
}

impl CompileError {
    /// Byte offset of the offending token
    pub fn position(&self) -> usize {
        match self {
            CompileError::UndefinedSymbol { position, .. }
            | CompileError::UnterminatedString { position, .. }
            | CompileError::InvalidNumber { position, .. }
            | CompileError::UndefinedVariable { position, .. }
            | CompileError::TypeMismatch { position, .. }
            | CompileError::Overflow { position, .. }
            | CompileError::ExpectedToken { position, .. } => *position,
        }
    }
}

fn describe_operands(left: &DataType, right: &Option<DataType>) -> String {
    match right {
        Some(right) => format!("{} and {}", left, right),
        None => left.to_string(),
    }
}

/// Result type for compilation
pub type CompileResult<T> = Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CompileError::TypeMismatch {
            operator: "+",
            left: DataType::Number,
            right: Some(DataType::String),
            position: 2,
        };
        assert_eq!(
            err.to_string(),
            "Type mismatch for '+' at position 2: number and string"
        );

        let err = CompileError::TypeMismatch {
            operator: "!",
            left: DataType::DateTime,
            right: None,
            position: 0,
        };
        assert_eq!(
            err.to_string(),
            "Type mismatch for '!' at position 0: datetime"
        );

        let err = CompileError::Overflow {
            kind: OverflowKind::Program,
            limit: 1024,
            position: 17,
        };
        assert_eq!(
            err.to_string(),
            "Program overflow at position 17: limit is 1024"
        );
        assert_eq!(err.position(), 17);

        let err = CompileError::UnterminatedString {
            quote: '\'',
            position: 4,
        };
        assert_eq!(
            err.to_string(),
            "Can't find trailing ' for string starting at position 4"
        );
    }
}
