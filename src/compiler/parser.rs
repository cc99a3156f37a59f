// Expression parser - recursive descent that emits bytecode directly

use super::error::{CompileError, CompileResult, OverflowKind};
use super::lexer::Lexer;
use super::token::{Spanned, Token};
use super::CompileOptions;
use crate::bytecode::{
    is_condition, merge_branches, Op, Operator, Program, ProgramBuilder, ProgramFull,
};
use crate::row::{DataType, VariableTable};

/// One compilation. Owns every piece of mutable state (scan position,
/// current token, instruction buffer), so independent compilations never
/// interfere with each other.
///
/// Each `parse_*` method emits the code for its subtree and returns the
/// static type of the value that code leaves on the stack.
pub struct Parser<'src, 'v> {
    lexer: Lexer<'src>,
    current: Spanned<'src>,
    variables: &'v VariableTable,
    builder: ProgramBuilder,
    max_depth: usize,
    depth: usize,
}

impl<'src, 'v> Parser<'src, 'v> {
    pub fn new(
        input: &'src str,
        variables: &'v VariableTable,
        options: &CompileOptions,
    ) -> CompileResult<Self> {
        let mut lexer = Lexer::new(input).with_max_token_len(options.max_token_len);
        let current = lexer.next_token()?;
        Ok(Parser {
            lexer,
            current,
            variables,
            builder: ProgramBuilder::with_capacity(options.max_program_len),
            max_depth: options.max_depth,
            depth: 0,
        })
    }

    /// Parse the whole input and return the finished program
    pub fn compile(mut self) -> CompileResult<(Program, DataType)> {
        let data_type = self.parse_expression()?;
        if self.current.token != Token::Eof {
            return Err(self.unexpected("end of expression"));
        }
        Ok((self.builder.finish(), data_type))
    }

    /// expression := conditional
    fn parse_expression(&mut self) -> CompileResult<DataType> {
        self.nested(|parser| parser.parse_conditional())
    }

    /// conditional := or ( "?" expression ":" expression )?
    fn parse_conditional(&mut self) -> CompileResult<DataType> {
        let condition = self.parse_or()?;
        if self.current.token != Token::Question {
            return Ok(condition);
        }

        let position = self.current.position;
        if !is_condition(condition) {
            return Err(CompileError::TypeMismatch {
                operator: "?",
                left: condition,
                right: None,
                position,
            });
        }
        self.advance()?;

        let to_false = self
            .builder
            .emit_jump(Op::JumpIfZero)
            .map_err(|e| overflow(e, position))?;
        let when_true = self.parse_expression()?;
        let to_end = self
            .builder
            .emit_jump(Op::Jump)
            .map_err(|e| overflow(e, position))?;

        self.expect(Token::Colon, "':' for conditional expression")?;
        self.builder.patch(to_false, self.builder.here());

        let when_false = self.parse_expression()?;
        self.builder.patch(to_end, self.builder.here());

        merge_branches(when_true, when_false).ok_or(CompileError::TypeMismatch {
            operator: "?:",
            left: when_true,
            right: Some(when_false),
            position,
        })
    }

    /// or := and ( "|" and )*
    fn parse_or(&mut self) -> CompileResult<DataType> {
        let mut left = self.parse_and()?;

        while self.current.token == Token::Or {
            let position = self.current.position;
            self.advance()?;
            let right = self.parse_and()?;
            left = self.emit_binary(Operator::Or, left, right, position)?;
        }

        Ok(left)
    }

    /// and := not ( "&" not )*
    fn parse_and(&mut self) -> CompileResult<DataType> {
        let mut left = self.parse_not()?;

        while self.current.token == Token::And {
            let position = self.current.position;
            self.advance()?;
            let right = self.parse_not()?;
            left = self.emit_binary(Operator::And, left, right, position)?;
        }

        Ok(left)
    }

    /// not := "!" not | relational
    fn parse_not(&mut self) -> CompileResult<DataType> {
        if self.current.token != Token::Not {
            return self.parse_relational();
        }

        let position = self.current.position;
        self.advance()?;
        let operand = self.nested(|parser| parser.parse_not())?;

        let resolution =
            Operator::Not
                .resolve_unary(operand)
                .ok_or(CompileError::TypeMismatch {
                    operator: Operator::Not.as_str(),
                    left: operand,
                    right: None,
                    position,
                })?;
        self.emit(Op::Apply(resolution.family, Operator::Not), position)?;
        Ok(resolution.output)
    }

    /// relational := additive ( relop additive )?
    ///
    /// Non-associative: `a < b < c` leaves the second `<` unconsumed.
    fn parse_relational(&mut self) -> CompileResult<DataType> {
        let left = self.parse_additive()?;

        match self.current.token.relational_operator() {
            Some(op) => {
                let position = self.current.position;
                self.advance()?;
                let right = self.parse_additive()?;
                self.emit_binary(op, left, right, position)
            }
            None => Ok(left),
        }
    }

    /// additive := term ( ("+" | "-") term )*
    fn parse_additive(&mut self) -> CompileResult<DataType> {
        let mut left = self.parse_term()?;

        while let Some(op) = self.current.token.additive_operator() {
            let position = self.current.position;
            self.advance()?;
            let right = self.parse_term()?;
            left = self.emit_binary(op, left, right, position)?;
        }

        Ok(left)
    }

    /// term := factor ( ("*" | "/") factor )*
    fn parse_term(&mut self) -> CompileResult<DataType> {
        let mut left = self.parse_factor()?;

        while let Some(op) = self.current.token.multiplicative_operator() {
            let position = self.current.position;
            self.advance()?;
            let right = self.parse_factor()?;
            left = self.emit_binary(op, left, right, position)?;
        }

        Ok(left)
    }

    /// factor := number | string | true | false | #index | name | "(" expression ")"
    fn parse_factor(&mut self) -> CompileResult<DataType> {
        let position = self.current.position;

        let data_type = match self.current.token.clone() {
            Token::Number(n) => {
                self.emit(Op::PushNum(n), position)?;
                DataType::Number
            }
            Token::True => {
                self.emit(Op::PushNum(1.0), position)?;
                DataType::Number
            }
            Token::False => {
                self.emit(Op::PushNum(0.0), position)?;
                DataType::Number
            }
            Token::String(s) => {
                self.emit(Op::PushStr(s.into()), position)?;
                DataType::String
            }
            Token::Identifier(name) => {
                let index =
                    self.variables
                        .resolve(name)
                        .ok_or_else(|| CompileError::UndefinedVariable {
                            name: name.to_string(),
                            position,
                        })?;
                self.emit(Op::PushVar(index), position)?;
                self.variable_type(index)
            }
            Token::Index(index) => {
                if index >= self.variables.len() {
                    return Err(CompileError::UndefinedVariable {
                        name: format!("#{}", index),
                        position,
                    });
                }
                self.emit(Op::PushVar(index), position)?;
                // Positional references are numeric unless the table knows better
                match self.variable_type(index) {
                    DataType::Unknown => DataType::Number,
                    known => known,
                }
            }
            Token::LeftParen => {
                self.advance()?;
                let data_type = self.parse_expression()?;
                if self.current.token != Token::RightParen {
                    return Err(self.unexpected("')'"));
                }
                data_type
            }
            _ => return Err(self.unexpected("operand")),
        };

        self.advance()?;
        Ok(data_type)
    }

    /// Type-check a binary operator and emit its specialised (or generic) form
    fn emit_binary(
        &mut self,
        op: Operator,
        left: DataType,
        right: DataType,
        position: usize,
    ) -> CompileResult<DataType> {
        let resolution = op
            .resolve(left, right)
            .ok_or(CompileError::TypeMismatch {
                operator: op.as_str(),
                left,
                right: Some(right),
                position,
            })?;
        self.emit(Op::Apply(resolution.family, op), position)?;
        Ok(resolution.output)
    }

    fn variable_type(&self, index: usize) -> DataType {
        self.variables
            .get(index)
            .map(|v| v.data_type())
            .unwrap_or(DataType::Unknown)
    }

    fn emit(&mut self, op: Op, position: usize) -> CompileResult<()> {
        self.builder.emit(op).map_err(|e| overflow(e, position))
    }

    /// Advance to next token
    fn advance(&mut self) -> CompileResult<()> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    /// Expect a specific token
    fn expect(&mut self, token: Token<'static>, expected: &'static str) -> CompileResult<()> {
        if self.current.token == token {
            self.advance()
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn unexpected(&self, expected: &'static str) -> CompileError {
        CompileError::ExpectedToken {
            expected,
            found: self.current.token.describe(),
            position: self.current.position,
        }
    }

    /// Run a recursive step with the nesting depth bounded
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> CompileResult<T>) -> CompileResult<T> {
        if self.depth >= self.max_depth {
            return Err(CompileError::Overflow {
                kind: OverflowKind::Nesting,
                limit: self.max_depth,
                position: self.current.position,
            });
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }
}

fn overflow(err: ProgramFull, position: usize) -> CompileError {
    CompileError::Overflow {
        kind: OverflowKind::Program,
        limit: err.capacity,
        position,
    }
}
