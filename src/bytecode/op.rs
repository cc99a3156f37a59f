//! Instruction set of the expression stack machine.

use std::fmt;

/// Operators that exist in a generic and in type-specialised flavours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,

    // Comparison
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
    Eq,

    // Logical
    And,
    Or,
    Not,

    // Membership
    In,
    Rin,
}

impl Operator {
    /// Source spelling of the operator
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Ne => "!=",
            Operator::Le => "<=",
            Operator::Ge => ">=",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Eq => "=",
            Operator::And => "&",
            Operator::Or => "|",
            Operator::Not => "!",
            Operator::In => "in",
            Operator::Rin => "rin",
        }
    }

    /// Disassembly mnemonic
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Operator::Add => "ADD",
            Operator::Sub => "SUB",
            Operator::Mul => "MUL",
            Operator::Div => "DIV",
            Operator::Ne => "NEQ",
            Operator::Le => "LE",
            Operator::Ge => "GE",
            Operator::Lt => "LT",
            Operator::Gt => "GT",
            Operator::Eq => "EQ",
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::Not => "NOT",
            Operator::In => "IN",
            Operator::Rin => "RIN",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Operator::Ne
                | Operator::Le
                | Operator::Ge
                | Operator::Lt
                | Operator::Gt
                | Operator::Eq
        )
    }

    /// Number of stack operands consumed
    pub fn arity(&self) -> usize {
        match self {
            Operator::Not => 1,
            _ => 2,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operand family an operator instance is specialised for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// Resolved at run time from the operand types on the stack
    Generic,
    Number,
    String,
    Timestamp,
}

impl Family {
    fn suffix(&self) -> &'static str {
        match self {
            Family::Generic => "",
            Family::Number => ".NUM",
            Family::String => ".STR",
            Family::Timestamp => ".TIME",
        }
    }
}

/// One instruction.
///
/// Jump targets are absolute instruction indices. `PushStr` owns its literal,
/// so dropping the instruction sequence releases every literal exactly once.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Nop,
    PushNum(f64),
    PushStr(Box<str>),
    PushVar(usize),
    Jump(usize),
    JumpIfZero(usize),
    Apply(Family, Operator),
    Halt,
}

impl Op {
    /// Net change in stack depth after executing this instruction
    pub fn stack_effect(&self) -> isize {
        match self {
            Op::PushNum(_) | Op::PushStr(_) | Op::PushVar(_) => 1,
            Op::JumpIfZero(_) => -1,
            Op::Apply(_, op) => 1 - op.arity() as isize,
            Op::Nop | Op::Jump(_) | Op::Halt => 0,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Nop => write!(f, "NOP"),
            Op::PushNum(n) => write!(f, "PUSH {}", n),
            Op::PushStr(s) => write!(f, "PUSH '{}'", s),
            Op::PushVar(index) => write!(f, "PUSH #{}", index),
            Op::Jump(target) => write!(f, "JP   {:03X}", target),
            Op::JumpIfZero(target) => write!(f, "JPZ  {:03X}", target),
            Op::Apply(family, op) => write!(f, "{}{}", op.mnemonic(), family.suffix()),
            Op::Halt => write!(f, "HALT"),
        }
    }
}
