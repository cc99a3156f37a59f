pub mod bytecode;
pub mod compiler;
pub mod config;
pub mod filter;
pub mod interpreter;
pub mod row;

pub use bytecode::Program;
pub use compiler::{compile, compile_with, CompileError, CompileOptions};
pub use interpreter::{evaluate_predicate, execute, Interpreter, RuntimeError};
pub use row::{DataType, Value, VariableTable};
