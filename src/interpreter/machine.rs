// Stack machine executing compiled programs
//
// - No recursion, linear dispatch
// - Values pushed from the program or the variable table are borrowed;
//   only operator results own their strings
// - The stack lives for one execution, so every owned intermediate is
//   dropped before `execute` returns

use super::error::{RuntimeError, RuntimeResult};
use super::strings::{self, PatternCache};
use crate::bytecode::{Family, Op, Operator, Program};
use crate::row::{parse_timestamp, Value, VariableTable};
use smallvec::SmallVec;
use std::borrow::Cow;
use std::cmp::Ordering;

/// Default number of stack slots
pub const DEFAULT_STACK_LIMIT: usize = 1024;

/// Slots kept free below the limit; pushes fail once the stack reaches
/// `limit - STACK_MARGIN`
pub const STACK_MARGIN: usize = 10;

/// Inline stack storage; typical filter expressions stay well below it
const STACK_INLINE_CAPACITY: usize = 16;

type Stack<'a> = SmallVec<[Value<'a>; STACK_INLINE_CAPACITY]>;

/// Reusable execution context.
///
/// Holds no per-execution state besides the regex cache, so one interpreter
/// can run any number of programs. Not shared between threads; give each
/// thread its own.
#[derive(Debug)]
pub struct Interpreter {
    stack_limit: usize,
    patterns: PatternCache,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_stack_limit(DEFAULT_STACK_LIMIT)
    }

    pub fn with_stack_limit(stack_limit: usize) -> Self {
        Self {
            stack_limit,
            patterns: PatternCache::new(),
        }
    }

    pub fn stack_limit(&self) -> usize {
        self.stack_limit
    }

    /// Run `program` against the current bindings in `variables`.
    ///
    /// The result may borrow from both arguments; drop it before rebinding
    /// the table for the next row.
    pub fn execute<'a>(
        &mut self,
        program: &'a Program,
        variables: &'a VariableTable,
    ) -> RuntimeResult<Value<'a>> {
        let ops = program.ops();
        let capacity = self.stack_limit.saturating_sub(STACK_MARGIN);
        let mut stack: Stack<'a> =
            SmallVec::with_capacity(program.max_stack_depth().min(capacity));
        let mut pc = 0;

        loop {
            let op = ops
                .get(pc)
                .ok_or(RuntimeError::ProgramCounterOutOfRange { pc })?;
            let at = pc;
            pc += 1;

            // Check before the push so the bound is never exceeded
            if op.stack_effect() > 0 && stack.len() >= capacity {
                return Err(RuntimeError::StackOverflow {
                    limit: self.stack_limit,
                });
            }

            match op {
                Op::Nop => {}
                Op::PushNum(n) => stack.push(Value::Number(*n)),
                Op::PushStr(s) => stack.push(Value::String(Cow::Borrowed(&**s))),
                Op::PushVar(index) => {
                    let value = variables
                        .get(*index)
                        .and_then(|var| var.value())
                        .ok_or(RuntimeError::UnboundVariable { index: *index })?;
                    stack.push(value.reborrow());
                }
                Op::Jump(target) => pc = *target,
                Op::JumpIfZero(target) => {
                    if !pop(&mut stack, at)?.is_truthy() {
                        pc = *target;
                    }
                }
                Op::Apply(family, Operator::Not) => {
                    let operand = pop(&mut stack, at)?;
                    let result = self.apply_unary(*family, operand, at)?;
                    stack.push(result);
                }
                Op::Apply(family, operator) => {
                    let right = pop(&mut stack, at)?;
                    let left = pop(&mut stack, at)?;
                    let result = self.apply_binary(*family, *operator, left, right, at)?;
                    stack.push(result);
                }
                Op::Halt => return finish(stack),
            }
        }
    }

    /// Run `program` and reduce the result to its truthiness
    pub fn evaluate_predicate(
        &mut self,
        program: &Program,
        variables: &VariableTable,
    ) -> RuntimeResult<bool> {
        self.execute(program, variables)
            .map(|value| value.is_truthy())
    }

    fn apply_unary<'a>(
        &mut self,
        family: Family,
        operand: Value<'a>,
        pc: usize,
    ) -> RuntimeResult<Value<'a>> {
        let family = match family {
            Family::Generic => Operator::Not
                .resolve_unary(operand.data_type())
                .map(|resolution| resolution.family)
                .ok_or_else(|| mismatch(Operator::Not, &operand, None, pc))?,
            specialised => specialised,
        };

        match (family, &operand) {
            (Family::Number, Value::Number(n)) => Ok(truth(*n == 0.0)),
            (Family::String, Value::String(s)) => Ok(truth(s.is_empty())),
            (Family::Number, _) | (Family::String, _) => {
                Err(mismatch(Operator::Not, &operand, None, pc))
            }
            _ => Err(invalid_opcode(family, Operator::Not, pc)),
        }
    }

    fn apply_binary<'a>(
        &mut self,
        family: Family,
        operator: Operator,
        left: Value<'a>,
        right: Value<'a>,
        pc: usize,
    ) -> RuntimeResult<Value<'a>> {
        // The one runtime dispatch point: same rules the compiler uses,
        // applied to the operands actually on the stack
        let family = match family {
            Family::Generic => operator
                .resolve(left.data_type(), right.data_type())
                .map(|resolution| resolution.family)
                .ok_or_else(|| mismatch(operator, &left, Some(&right), pc))?,
            specialised => specialised,
        };

        match family {
            Family::Number => match (&left, &right) {
                (Value::Number(l), Value::Number(r)) => apply_number(operator, *l, *r, pc),
                _ => Err(mismatch(operator, &left, Some(&right), pc)),
            },
            Family::String => self.apply_string(operator, left, right, pc),
            Family::Timestamp => apply_timestamp(operator, &left, &right, pc),
            Family::Generic => Err(invalid_opcode(family, operator, pc)),
        }
    }

    fn apply_string<'a>(
        &mut self,
        operator: Operator,
        left: Value<'a>,
        right: Value<'a>,
        pc: usize,
    ) -> RuntimeResult<Value<'a>> {
        if operator == Operator::Mul {
            return match (&left, &right) {
                (Value::String(text), Value::Number(count)) => {
                    strings::repeat(text, *count).map(Value::String)
                }
                _ => Err(mismatch(operator, &left, Some(&right), pc)),
            };
        }

        let (l, r) = match (left, right) {
            (Value::String(l), Value::String(r)) => (l, r),
            (left, right) => return Err(mismatch(operator, &left, Some(&right), pc)),
        };

        let result = match operator {
            Operator::Add => Value::String(strings::concat(l, &r)?),
            Operator::Sub => Value::String(strings::remove_first(l, &r)?),
            Operator::Div => Value::String(strings::truncate_at(l, &r)),
            Operator::Eq => truth(strings::prefix_cmp(&l, &r) == Ordering::Equal),
            Operator::Ne => truth(strings::prefix_cmp(&l, &r) != Ordering::Equal),
            Operator::Lt => truth(strings::prefix_cmp(&l, &r) == Ordering::Less),
            Operator::Gt => truth(strings::prefix_cmp(&l, &r) == Ordering::Greater),
            Operator::Le => truth(strings::prefix_cmp(&l, &r) != Ordering::Greater),
            Operator::Ge => truth(strings::prefix_cmp(&l, &r) != Ordering::Less),
            Operator::And => truth(!l.is_empty() && !r.is_empty()),
            Operator::Or => truth(!l.is_empty() || !r.is_empty()),
            // needle in haystack
            Operator::In => truth(r.contains(&*l)),
            // pattern rin subject
            Operator::Rin => truth(self.patterns.is_match(&l, &r)?),
            Operator::Mul | Operator::Not => {
                return Err(invalid_opcode(Family::String, operator, pc))
            }
        };

        Ok(result)
    }
}

fn apply_number(operator: Operator, l: f64, r: f64, pc: usize) -> RuntimeResult<Value<'static>> {
    let result = match operator {
        Operator::Add => Value::Number(l + r),
        Operator::Sub => Value::Number(l - r),
        Operator::Mul => Value::Number(l * r),
        Operator::Div => {
            if r == 0.0 {
                return Err(RuntimeError::DivisionByZero { pc });
            }
            Value::Number(l / r)
        }
        Operator::Eq => truth(l == r),
        Operator::Ne => truth(l != r),
        Operator::Lt => truth(l < r),
        Operator::Gt => truth(l > r),
        Operator::Le => truth(l <= r),
        Operator::Ge => truth(l >= r),
        Operator::And => truth(l != 0.0 && r != 0.0),
        Operator::Or => truth(l != 0.0 || r != 0.0),
        Operator::In | Operator::Rin | Operator::Not => {
            return Err(invalid_opcode(Family::Number, operator, pc))
        }
    };
    Ok(result)
}

/// Compare as epoch seconds. String operands are parsed on the fly.
fn apply_timestamp(
    operator: Operator,
    left: &Value<'_>,
    right: &Value<'_>,
    pc: usize,
) -> RuntimeResult<Value<'static>> {
    if !operator.is_comparison() {
        return Err(invalid_opcode(Family::Timestamp, operator, pc));
    }

    let (l, r) = match (epoch_seconds(left), epoch_seconds(right)) {
        (Some(l), Some(r)) => (l?, r?),
        _ => return Err(mismatch(operator, left, Some(right), pc)),
    };

    let ordering = l.cmp(&r);
    let result = match operator {
        Operator::Eq => ordering == Ordering::Equal,
        Operator::Ne => ordering != Ordering::Equal,
        Operator::Lt => ordering == Ordering::Less,
        Operator::Gt => ordering == Ordering::Greater,
        Operator::Le => ordering != Ordering::Greater,
        _ => ordering != Ordering::Less,
    };
    Ok(truth(result))
}

/// `None` for operands that can never be a timestamp
fn epoch_seconds(value: &Value<'_>) -> Option<RuntimeResult<i64>> {
    match value {
        Value::Timestamp(t) => Some(Ok(t.and_utc().timestamp())),
        Value::String(s) => Some(
            parse_timestamp(s)
                .map(|t| t.and_utc().timestamp())
                .ok_or_else(|| RuntimeError::InvalidTimestamp {
                    text: s.to_string(),
                }),
        ),
        Value::Number(_) => None,
    }
}

fn pop<'a>(stack: &mut Stack<'a>, pc: usize) -> RuntimeResult<Value<'a>> {
    stack.pop().ok_or(RuntimeError::StackUnderflow { pc })
}

fn finish(mut stack: Stack<'_>) -> RuntimeResult<Value<'_>> {
    match stack.len() {
        0 => Err(RuntimeError::NoResult),
        1 => pop(&mut stack, 0),
        depth => Err(RuntimeError::StackImbalance { depth }),
    }
}

fn truth(value: bool) -> Value<'static> {
    Value::Number(if value { 1.0 } else { 0.0 })
}

fn mismatch(
    operator: Operator,
    left: &Value<'_>,
    right: Option<&Value<'_>>,
    pc: usize,
) -> RuntimeError {
    RuntimeError::TypeMismatch {
        operator: operator.as_str(),
        left: left.data_type(),
        right: right.map(|r| r.data_type()),
        pc,
    }
}

fn invalid_opcode(family: Family, operator: Operator, pc: usize) -> RuntimeError {
    RuntimeError::InvalidOpcode {
        op: Op::Apply(family, operator).to_string(),
        pc,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(ops: Vec<Op>) -> RuntimeResult<Value<'static>> {
        let program = Program::from_ops(ops);
        let vars = VariableTable::new();
        Interpreter::new()
            .execute(&program, &vars)
            .map(|value| value.into_owned())
    }

    #[test]
    fn test_number_arithmetic() {
        let result = run(vec![
            Op::PushNum(7.0),
            Op::PushNum(2.0),
            Op::Apply(Family::Number, Operator::Sub),
            Op::Halt,
        ]);
        assert_eq!(result, Ok(Value::Number(5.0)));
    }

    #[test]
    fn test_division_by_zero() {
        let result = run(vec![
            Op::PushNum(1.0),
            Op::PushNum(0.0),
            Op::Apply(Family::Number, Operator::Div),
            Op::Halt,
        ]);
        assert_eq!(result, Err(RuntimeError::DivisionByZero { pc: 2 }));
    }

    #[test]
    fn test_halt_checks_stack() {
        assert_eq!(run(vec![Op::Halt]), Err(RuntimeError::NoResult));
        assert_eq!(
            run(vec![Op::PushNum(1.0), Op::PushNum(2.0), Op::Halt]),
            Err(RuntimeError::StackImbalance { depth: 2 })
        );
    }

    #[test]
    fn test_malformed_programs() {
        assert_eq!(
            run(vec![Op::Apply(Family::Number, Operator::Add), Op::Halt]),
            Err(RuntimeError::StackUnderflow { pc: 0 })
        );
        assert_eq!(
            run(vec![Op::PushNum(1.0)]),
            Err(RuntimeError::ProgramCounterOutOfRange { pc: 1 })
        );
        assert_eq!(
            run(vec![Op::Jump(99)]),
            Err(RuntimeError::ProgramCounterOutOfRange { pc: 99 })
        );
        assert_eq!(
            run(vec![Op::PushVar(0), Op::Halt]),
            Err(RuntimeError::UnboundVariable { index: 0 })
        );
    }

    #[test]
    fn test_invalid_opcode() {
        assert_eq!(
            run(vec![
                Op::PushNum(1.0),
                Op::PushNum(2.0),
                Op::Apply(Family::Timestamp, Operator::Add),
                Op::Halt,
            ]),
            Err(RuntimeError::InvalidOpcode {
                op: "ADD.TIME".to_string(),
                pc: 2
            })
        );
        assert!(matches!(
            run(vec![
                Op::PushStr("a".into()),
                Op::PushStr("b".into()),
                Op::Apply(Family::Number, Operator::In),
                Op::Halt,
            ]),
            Err(RuntimeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_specialised_op_rejects_wrong_operands() {
        let result = run(vec![
            Op::PushStr("a".into()),
            Op::PushNum(1.0),
            Op::Apply(Family::Number, Operator::Add),
            Op::Halt,
        ]);
        assert!(matches!(result, Err(RuntimeError::TypeMismatch { pc: 2, .. })));
    }

    #[test]
    fn test_generic_dispatch() {
        let mut vars = VariableTable::with_names(["a", "b"]);
        vars.bind(0, Value::from("abc")).unwrap();
        vars.bind(1, Value::from("ab")).unwrap();

        let program = Program::from_ops(vec![
            Op::PushVar(0),
            Op::PushVar(1),
            Op::Apply(Family::Generic, Operator::Eq),
            Op::Halt,
        ]);
        let mut interpreter = Interpreter::new();
        assert_eq!(
            interpreter.execute(&program, &vars),
            Ok(Value::Number(1.0))
        );

        let mut vars = VariableTable::with_names(["a", "b"]);
        vars.bind(0, Value::Number(1.0)).unwrap();
        vars.bind(1, Value::from("x")).unwrap();
        assert!(matches!(
            interpreter.execute(&program, &vars),
            Err(RuntimeError::TypeMismatch { operator: "=", .. })
        ));
    }

    #[test]
    fn test_conditional_jumps() {
        // 0 ? 'yes' : 'no'
        let result = run(vec![
            Op::PushNum(0.0),
            Op::JumpIfZero(4),
            Op::PushStr("yes".into()),
            Op::Jump(5),
            Op::PushStr("no".into()),
            Op::Halt,
        ]);
        assert_eq!(result, Ok(Value::from("no")));
    }

    #[test]
    fn test_stack_overflow() {
        let mut ops = vec![Op::PushNum(1.0); 8];
        ops.extend(std::iter::repeat(Op::Apply(Family::Number, Operator::Add)).take(7));
        ops.push(Op::Halt);
        let program = Program::from_ops(ops);
        let vars = VariableTable::new();

        let mut small = Interpreter::with_stack_limit(STACK_MARGIN + 4);
        assert_eq!(
            small.execute(&program, &vars),
            Err(RuntimeError::StackOverflow {
                limit: STACK_MARGIN + 4
            })
        );
        assert_eq!(
            Interpreter::new().execute(&program, &vars),
            Ok(Value::Number(8.0))
        );
    }

    #[test]
    fn test_borrowed_values_stay_borrowed() {
        let mut vars = VariableTable::new();
        vars.push("name", Value::from("caller owned"));
        let program = Program::from_ops(vec![Op::PushVar(0), Op::Halt]);

        let value = Interpreter::new().execute(&program, &vars).unwrap();
        assert!(!value.is_owned());
        assert_eq!(value.as_str(), Some("caller owned"));
    }

    #[test]
    fn test_timestamp_comparison() {
        let mut vars = VariableTable::new();
        vars.push(
            "at",
            Value::Timestamp(parse_timestamp("2024-03-01T12:00:00").unwrap()),
        );
        let program = Program::from_ops(vec![
            Op::PushVar(0),
            Op::PushStr("2024-01-01T00:00:00".into()),
            Op::Apply(Family::Timestamp, Operator::Gt),
            Op::Halt,
        ]);
        let mut interpreter = Interpreter::new();
        assert_eq!(interpreter.evaluate_predicate(&program, &vars), Ok(true));

        let program = Program::from_ops(vec![
            Op::PushVar(0),
            Op::PushStr("yesterday".into()),
            Op::Apply(Family::Timestamp, Operator::Gt),
            Op::Halt,
        ]);
        assert_eq!(
            interpreter.execute(&program, &vars),
            Err(RuntimeError::InvalidTimestamp {
                text: "yesterday".to_string()
            })
        );
    }
}
