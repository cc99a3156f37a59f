//! Values bound to variables and produced by expression evaluation.

use chrono::NaiveDateTime;
use std::borrow::Cow;
use std::fmt;

/// Timestamp layout accepted in row cells and string operands
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Static type of a variable or of a compiled sub-expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Number,
    String,
    DateTime,
    /// Not yet assigned; resolved by the interpreter at run time
    Unknown,
}

impl DataType {
    /// Probe the type of a raw cell: number first, then timestamp, then string.
    pub fn infer(text: &str) -> Self {
        if text.parse::<f64>().is_ok() {
            DataType::Number
        } else if parse_timestamp(text).is_some() {
            DataType::DateTime
        } else {
            DataType::String
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Number => "number",
            DataType::String => "string",
            DataType::DateTime => "datetime",
            DataType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A number, a string or a timestamp.
///
/// Strings are copy-on-write: `Cow::Borrowed` aliases storage owned by the
/// caller (a variable table or a program literal) and is never released by
/// the engine, `Cow::Owned` was produced during evaluation and is dropped
/// exactly once when the value is overwritten or popped.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    Number(f64),
    String(Cow<'a, str>),
    Timestamp(NaiveDateTime),
}

impl<'a> Value<'a> {
    /// Parse a raw cell as the given type. `Unknown` infers the type first.
    pub fn parse_as(text: &str, data_type: DataType) -> Option<Value<'static>> {
        match data_type {
            DataType::Number => text.parse::<f64>().ok().map(Value::Number),
            DataType::DateTime => parse_timestamp(text).map(Value::Timestamp),
            DataType::String => Some(Value::String(Cow::Owned(text.to_string()))),
            DataType::Unknown => Value::parse_as(text, DataType::infer(text)),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Value::Number(_) => DataType::Number,
            Value::String(_) => DataType::String,
            Value::Timestamp(_) => DataType::DateTime,
        }
    }

    /// Truthiness used by conditional jumps and filter predicates:
    /// non-zero numbers and non-empty strings are true, timestamps always are.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Timestamp(_) => true,
        }
    }

    /// Whether this value owns heap storage the engine is responsible for
    pub fn is_owned(&self) -> bool {
        matches!(self, Value::String(Cow::Owned(_)))
    }

    /// A copy that borrows any string payload from `self`
    pub fn reborrow(&self) -> Value<'_> {
        match self {
            Value::Number(n) => Value::Number(*n),
            Value::String(s) => Value::String(Cow::Borrowed(s.as_ref())),
            Value::Timestamp(t) => Value::Timestamp(*t),
        }
    }

    /// Detach the value from whatever it borrows
    pub fn into_owned(self) -> Value<'static> {
        match self {
            Value::Number(n) => Value::Number(n),
            Value::String(s) => Value::String(Cow::Owned(s.into_owned())),
            Value::Timestamp(t) => Value::Timestamp(t),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_ref()),
            _ => None,
        }
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => f.write_str(s),
            Value::Timestamp(t) => write!(f, "{}", t.format(DATE_FORMAT)),
        }
    }
}

impl From<f64> for Value<'_> {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl<'a> From<&'a str> for Value<'a> {
    fn from(s: &'a str) -> Self {
        Value::String(Cow::Borrowed(s))
    }
}

impl From<String> for Value<'_> {
    fn from(s: String) -> Self {
        Value::String(Cow::Owned(s))
    }
}

impl From<NaiveDateTime> for Value<'_> {
    fn from(t: NaiveDateTime) -> Self {
        Value::Timestamp(t)
    }
}

/// Parse `YYYY-MM-DDTHH:MM:SS`
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, DATE_FORMAT).ok()
}
