// Expression lexer - tokenizes filter expressions

use super::error::{CompileError, CompileResult, OverflowKind};
use super::token::{Spanned, Token, SYMBOLS};

/// Default limit for identifier and numeric literal length
pub const DEFAULT_MAX_TOKEN_LEN: usize = 31;

pub struct Lexer<'src> {
    input: &'src str,
    position: usize,
    max_token_len: usize,
}

impl<'src> Lexer<'src> {
    pub fn new(input: &'src str) -> Self {
        Lexer {
            input,
            position: 0,
            max_token_len: DEFAULT_MAX_TOKEN_LEN,
        }
    }

    pub fn with_max_token_len(mut self, max_token_len: usize) -> Self {
        self.max_token_len = max_token_len;
        self
    }

    /// Get the next token from the input
    pub fn next_token(&mut self) -> CompileResult<Spanned<'src>> {
        self.skip_whitespace();

        let start = self.position;
        let ch = match self.current_char() {
            Some(ch) => ch,
            None => {
                return Ok(Spanned {
                    token: Token::Eof,
                    position: start,
                })
            }
        };

        let token = match ch {
            '"' | '\'' => self.read_string(ch)?,
            '#' => self.read_index()?,
            c if c.is_ascii_digit() || c == '.' => self.read_number()?,
            _ => match self.read_symbol() {
                Some(token) => token,
                None if ch.is_ascii_alphabetic() || ch == '_' => self.read_identifier()?,
                None => {
                    return Err(CompileError::UndefinedSymbol {
                        symbol: ch,
                        position: start,
                    })
                }
            },
        };

        Ok(Spanned {
            token,
            position: start,
        })
    }

    fn rest(&self) -> &'src str {
        &self.input[self.position..]
    }

    fn current_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Skip whitespace characters
    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        let trimmed = rest.trim_start_matches(|c: char| c.is_ascii_whitespace());
        self.position += rest.len() - trimmed.len();
    }

    /// Consume the longest run of characters matching `pred`
    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'src str {
        let rest = self.rest();
        let len = rest.find(|c: char| !pred(c)).unwrap_or(rest.len());
        self.position += len;
        &rest[..len]
    }

    /// Enforce the identifier/literal length limit
    fn check_len(&self, text: &str, start: usize) -> CompileResult<()> {
        if text.len() > self.max_token_len {
            return Err(CompileError::Overflow {
                kind: OverflowKind::Token,
                limit: self.max_token_len,
                position: start,
            });
        }
        Ok(())
    }

    /// Read a quoted string literal
    fn read_string(&mut self, quote: char) -> CompileResult<Token<'src>> {
        let start = self.position;
        let body = &self.input[start + 1..];

        match body.find(quote) {
            Some(len) => {
                self.position = start + 1 + len + 1;
                Ok(Token::String(&body[..len]))
            }
            None => Err(CompileError::UnterminatedString {
                quote,
                position: start,
            }),
        }
    }

    /// Read a positional reference: `#` followed by digits
    fn read_index(&mut self) -> CompileResult<Token<'src>> {
        let start = self.position;
        self.position += 1;

        let digits = self.take_while(|c| c.is_ascii_digit());
        if digits.is_empty() {
            return Err(CompileError::UndefinedSymbol {
                symbol: '#',
                position: start,
            });
        }
        self.check_len(digits, start)?;

        digits
            .parse::<usize>()
            .map(Token::Index)
            .map_err(|_| CompileError::InvalidNumber {
                text: digits.to_string(),
                position: start,
            })
    }

    /// Read a number: greedy over digits and dots
    fn read_number(&mut self) -> CompileResult<Token<'src>> {
        let start = self.position;
        let text = self.take_while(|c| c.is_ascii_digit() || c == '.');
        self.check_len(text, start)?;

        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| CompileError::InvalidNumber {
                text: text.to_string(),
                position: start,
            })
    }

    /// Probe the operator/keyword table in order. Keywords only match at a
    /// word boundary, so `index` stays an identifier.
    fn read_symbol(&mut self) -> Option<Token<'src>> {
        let rest = self.rest();

        for (text, token) in SYMBOLS {
            if !rest.starts_with(text) {
                continue;
            }
            if token.is_keyword() && rest[text.len()..].starts_with(is_identifier_char) {
                continue;
            }
            self.position += text.len();
            return Some(token.clone());
        }

        None
    }

    /// Read an identifier
    fn read_identifier(&mut self) -> CompileResult<Token<'src>> {
        let start = self.position;
        let name = self.take_while(is_identifier_char);
        self.check_len(name, start)?;
        Ok(Token::Identifier(name))
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
