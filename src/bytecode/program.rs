//! Compiled programs and the builder the compiler emits into.

use super::op::Op;
use crate::row::VariableTable;
use std::fmt::Write;
use thiserror::Error;

/// The builder ran out of instruction slots
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Program exceeds {capacity} instructions")]
pub struct ProgramFull {
    pub capacity: usize,
}

/// A flat instruction sequence ending in `Halt`.
///
/// Self-contained: string literals live inside their `PushStr` instructions,
/// so a program can outlive the source text and the compiler that built it.
/// Dropping the program releases everything it owns.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    ops: Vec<Op>,
    max_stack_depth: usize,
}

impl Program {
    /// Wrap a hand-built instruction sequence. No validation is performed;
    /// the interpreter defends against malformed programs at run time.
    pub fn from_ops(ops: Vec<Op>) -> Self {
        let max_stack_depth = Self::compute_stack_depth(&ops);
        Self {
            ops,
            max_stack_depth,
        }
    }

    #[inline]
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Upper bound of the stack depth reached by any execution path
    #[inline]
    pub fn max_stack_depth(&self) -> usize {
        self.max_stack_depth
    }

    /// String literals embedded in the program
    pub fn literals(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            Op::PushStr(s) => Some(s.as_ref()),
            _ => None,
        })
    }

    /// Render one line per instruction. Variable names are shown when the
    /// table the program was compiled against is given.
    pub fn disassemble(&self, variables: Option<&VariableTable>) -> String {
        let mut out = String::new();
        for (i, op) in self.ops.iter().enumerate() {
            let _ = write!(out, "0x{:03X}\t", i);
            match (op, variables.and_then(|vars| vars_name(vars, op))) {
                (Op::PushVar(index), Some(name)) => {
                    let _ = write!(out, "PUSH {} [{}]", name, index);
                }
                _ => {
                    let _ = write!(out, "{}", op);
                }
            }
            out.push('\n');
        }
        out
    }

    // Linear scan; both branches of a conditional are counted, so the
    // result may overestimate but never underestimates.
    fn compute_stack_depth(ops: &[Op]) -> usize {
        let mut depth: isize = 0;
        let mut max_depth: isize = 1;
        for op in ops {
            depth += op.stack_effect();
            max_depth = max_depth.max(depth);
        }
        max_depth as usize
    }
}

fn vars_name<'v>(variables: &'v VariableTable, op: &Op) -> Option<&'v str> {
    match op {
        Op::PushVar(index) => variables.get(*index).map(|v| v.name()),
        _ => None,
    }
}

/// Handle to an emitted jump whose target is not known yet.
/// Consumed by [`ProgramBuilder::patch`], so each placeholder is resolved once.
#[must_use = "an unpatched jump leaves a placeholder target in the program"]
#[derive(Debug)]
pub struct PatchSite(usize);

/// An instruction index usable as a jump target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

/// Capacity-checked instruction buffer.
///
/// One slot is always kept free for the final `Halt`, so a finished program
/// holds at most `capacity` instructions.
#[derive(Debug)]
pub struct ProgramBuilder {
    ops: Vec<Op>,
    capacity: usize,
}

impl ProgramBuilder {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ops: Vec::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    /// Append an instruction
    pub fn emit(&mut self, op: Op) -> Result<(), ProgramFull> {
        if self.ops.len() + 1 >= self.capacity {
            return Err(ProgramFull {
                capacity: self.capacity,
            });
        }
        self.ops.push(op);
        Ok(())
    }

    /// Append a jump with a placeholder target, e.g. `emit_jump(Op::JumpIfZero)`
    pub fn emit_jump(&mut self, jump: fn(usize) -> Op) -> Result<PatchSite, ProgramFull> {
        let site = PatchSite(self.ops.len());
        // Placeholder, out of range until patched
        self.emit(jump(usize::MAX))?;
        Ok(site)
    }

    /// Index of the next instruction to be emitted
    pub fn here(&self) -> Label {
        Label(self.ops.len())
    }

    /// Resolve a previously emitted jump
    pub fn patch(&mut self, site: PatchSite, target: Label) {
        match &mut self.ops[site.0] {
            Op::Jump(t) | Op::JumpIfZero(t) => *t = target.0,
            other => unreachable!("patch site {} holds {:?}", site.0, other),
        }
    }

    /// Terminate with `Halt` and produce the program
    pub fn finish(mut self) -> Program {
        self.ops.push(Op::Halt);
        Program::from_ops(self.ops)
    }
}
