// Expression tokens for lexical analysis

use crate::bytecode::Operator;

#[derive(Debug, Clone, PartialEq)]
pub enum Token<'src> {
    // Literals
    Number(f64),
    String(&'src str),
    Index(usize),
    Identifier(&'src str),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    NotEqual,
    LessEqual,
    GreaterEqual,
    Less,
    Greater,
    Equal,
    And,
    Or,
    Not,
    In,
    Rin,

    // Conditional
    Question,
    Colon,

    // Delimiters
    LeftParen,
    RightParen,

    // Keywords
    True,
    False,

    // Special
    Eof,
}

/// Fixed operator/keyword table, probed in order. Multi-character operators
/// precede their single-character prefixes.
pub const SYMBOLS: &[(&str, Token<'static>)] = &[
    ("+", Token::Plus),
    ("-", Token::Minus),
    ("*", Token::Star),
    ("/", Token::Slash),
    ("!=", Token::NotEqual),
    ("<=", Token::LessEqual),
    (">=", Token::GreaterEqual),
    ("<", Token::Less),
    (">", Token::Greater),
    ("=", Token::Equal),
    ("&", Token::And),
    ("|", Token::Or),
    ("!", Token::Not),
    ("in", Token::In),
    ("rin", Token::Rin),
    ("?", Token::Question),
    (":", Token::Colon),
    ("(", Token::LeftParen),
    (")", Token::RightParen),
    ("true", Token::True),
    ("false", Token::False),
];

/// A token and the byte offset it starts at
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<'src> {
    pub token: Token<'src>,
    pub position: usize,
}

impl<'src> Token<'src> {
    /// Check if the token is a keyword
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            Token::In | Token::Rin | Token::True | Token::False
        )
    }

    /// Additive operators: `+ -`
    pub fn additive_operator(&self) -> Option<Operator> {
        match self {
            Token::Plus => Some(Operator::Add),
            Token::Minus => Some(Operator::Sub),
            _ => None,
        }
    }

    /// Multiplicative operators: `* /`
    pub fn multiplicative_operator(&self) -> Option<Operator> {
        match self {
            Token::Star => Some(Operator::Mul),
            Token::Slash => Some(Operator::Div),
            _ => None,
        }
    }

    /// Relational and membership operators
    pub fn relational_operator(&self) -> Option<Operator> {
        match self {
            Token::Equal => Some(Operator::Eq),
            Token::NotEqual => Some(Operator::Ne),
            Token::Less => Some(Operator::Lt),
            Token::Greater => Some(Operator::Gt),
            Token::LessEqual => Some(Operator::Le),
            Token::GreaterEqual => Some(Operator::Ge),
            Token::In => Some(Operator::In),
            Token::Rin => Some(Operator::Rin),
            _ => None,
        }
    }

    /// Human readable form for diagnostics
    pub fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", n),
            Token::String(s) => format!("string '{}'", s),
            Token::Index(i) => format!("#{}", i),
            Token::Identifier(name) => format!("identifier '{}'", name),
            Token::Eof => "end of expression".to_string(),
            other => format!("'{}'", other.symbol().unwrap_or("?")),
        }
    }

    /// Source spelling of operator, punctuation and keyword tokens
    pub fn symbol(&self) -> Option<&'static str> {
        let text = match self {
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::NotEqual => "!=",
            Token::LessEqual => "<=",
            Token::GreaterEqual => ">=",
            Token::Less => "<",
            Token::Greater => ">",
            Token::Equal => "=",
            Token::And => "&",
            Token::Or => "|",
            Token::Not => "!",
            Token::In => "in",
            Token::Rin => "rin",
            Token::Question => "?",
            Token::Colon => ":",
            Token::LeftParen => "(",
            Token::RightParen => ")",
            Token::True => "true",
            Token::False => "false",
            _ => return None,
        };
        Some(text)
    }
}
