//! Bytecode shared by the compiler and the interpreter.
//!
//! Opcodes are an explicit tagged enumeration: every polymorphic operator is
//! emitted as `Op::Apply(family, operator)`, where the family is either fixed
//! at compile time (`Number`, `String`, `Timestamp`) or left `Generic` for the
//! interpreter to resolve from the runtime operand type.

pub mod op;
pub mod program;
pub mod typing;

pub use op::{Family, Op, Operator};
pub use program::{Label, PatchSite, Program, ProgramBuilder, ProgramFull};
pub use typing::{is_condition, merge_branches, Resolution};
