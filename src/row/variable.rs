//! The variable table an expression is compiled and evaluated against.

use super::value::{DataType, Value};
use std::borrow::Cow;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VariableError {
    #[error("Variable index {index} out of range for table with {len} variables")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Value of type {actual} cannot be bound to variable '{name}' of type {expected}")]
    TypeConflict {
        name: String,
        expected: DataType,
        actual: DataType,
    },
}

/// A named slot. The type is fixed once assigned; the value is refreshed per row.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    name: String,
    data_type: DataType,
    /// Type assigned by the first binding, restored once cells parse as it again
    probed: DataType,
    value: Option<Value<'static>>,
}

impl Variable {
    /// A variable with no type and no value yet
    pub fn unresolved(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: DataType::Unknown,
            probed: DataType::Unknown,
            value: None,
        }
    }

    pub fn new(name: impl Into<String>, value: Value<'_>) -> Self {
        Self {
            name: name.into(),
            data_type: value.data_type(),
            probed: value.data_type(),
            value: Some(value.into_owned()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn value(&self) -> Option<&Value<'static>> {
        self.value.as_ref()
    }

    /// Overwrite the value from a raw cell. Keeps the current type when the
    /// cell parses as it, otherwise re-infers. A column that fell back to
    /// String returns to its probed type as soon as a cell parses as that
    /// type again. Returns `true` if the type changed.
    fn set_text(&mut self, text: &str) -> bool {
        if self.data_type == DataType::String
            && !matches!(self.probed, DataType::String | DataType::Unknown)
        {
            if let Some(value) = Value::parse_as(text, self.probed) {
                self.data_type = self.probed;
                self.value = Some(value);
                return true;
            }
        }

        if self.data_type == DataType::String {
            // Reuse the existing buffer, rows are rebound at high volume
            if let Some(Value::String(Cow::Owned(buf))) = &mut self.value {
                buf.clear();
                buf.push_str(text);
                return false;
            }
        }

        match Value::parse_as(text, self.data_type) {
            Some(value) if self.data_type != DataType::Unknown => {
                self.value = Some(value);
                false
            }
            _ => {
                let data_type = DataType::infer(text);
                self.value = Value::parse_as(text, data_type);
                if self.probed == DataType::Unknown {
                    self.probed = data_type;
                }
                let changed = data_type != self.data_type;
                self.data_type = data_type;
                changed
            }
        }
    }
}

/// Ordered, name- and index-addressable list of variables.
///
/// A compiled program refers to variables by position, so the layout
/// (count, order, types) must stay the same between compilation and every
/// execution of that program. Values may be rebound freely.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableTable {
    variables: Vec<Variable>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table of unresolved variables, e.g. from a CSV header
    pub fn with_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            variables: names.into_iter().map(Variable::unresolved).collect(),
        }
    }

    /// Append a variable and return its index
    pub fn push(&mut self, name: impl Into<String>, value: Value<'_>) -> usize {
        self.variables.push(Variable::new(name, value));
        self.variables.len() - 1
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Variable> {
        self.variables.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter()
    }

    /// Look a name up: exact match first, otherwise the first variable whose
    /// name starts with `name`.
    pub fn resolve(&self, name: &str) -> Option<usize> {
        self.variables
            .iter()
            .position(|v| v.name == name)
            .or_else(|| {
                self.variables
                    .iter()
                    .position(|v| v.name.starts_with(name))
            })
    }

    /// Bind a typed value. An unresolved variable takes the value's type;
    /// a resolved one rejects a value of a different type.
    pub fn bind(&mut self, index: usize, value: Value<'_>) -> Result<(), VariableError> {
        let len = self.variables.len();
        let var = self
            .variables
            .get_mut(index)
            .ok_or(VariableError::IndexOutOfRange { index, len })?;

        let actual = value.data_type();
        if var.data_type != DataType::Unknown && var.data_type != actual {
            return Err(VariableError::TypeConflict {
                name: var.name.clone(),
                expected: var.data_type,
                actual,
            });
        }

        if var.probed == DataType::Unknown {
            var.probed = actual;
        }
        var.data_type = actual;
        var.value = Some(value.into_owned());
        Ok(())
    }

    /// Rebind one variable from a raw cell. Returns `true` if its type changed,
    /// which invalidates programs compiled against the previous layout.
    pub fn bind_text(&mut self, index: usize, text: &str) -> Result<bool, VariableError> {
        let len = self.variables.len();
        self.variables
            .get_mut(index)
            .map(|var| var.set_text(text))
            .ok_or(VariableError::IndexOutOfRange { index, len })
    }

    /// Rebind the leading variables from a row of cells.
    /// Returns `true` if any variable changed type.
    pub fn bind_row<S: AsRef<str>>(&mut self, cells: &[S]) -> bool {
        let mut changed = false;
        for (var, cell) in self.variables.iter_mut().zip(cells) {
            changed |= var.set_text(cell.as_ref());
        }
        changed
    }
}
