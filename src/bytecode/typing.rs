//! Operand type rules.
//!
//! The compiler applies them to static types to pick the specialised family
//! it emits; the interpreter applies them to runtime types when it meets a
//! `Generic` instruction. Keeping one table means both sides agree on which
//! operand combinations are legal.

use super::op::{Family, Operator};
use crate::row::DataType;

/// Specialised family to execute and the type of the produced value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub family: Family,
    pub output: DataType,
}

impl Resolution {
    fn new(family: Family, output: DataType) -> Self {
        Self { family, output }
    }
}

impl Operator {
    /// Resolve a binary operator for the given operand types.
    /// `None` means the combination is a type mismatch.
    pub fn resolve(&self, left: DataType, right: DataType) -> Option<Resolution> {
        use DataType::*;

        let unknown = left == Unknown || right == Unknown;

        match self {
            Operator::Add | Operator::Sub | Operator::Div => match (left, right) {
                (Number, Number) => Some(Resolution::new(Family::Number, Number)),
                (String, String) => Some(Resolution::new(Family::String, String)),
                (DateTime, _) | (_, DateTime) => None,
                (Unknown, Unknown) => Some(Resolution::new(Family::Generic, Unknown)),
                // One side known: a successful run can only produce that type
                (Unknown, known) | (known, Unknown) => {
                    Some(Resolution::new(Family::Generic, known))
                }
                _ => None,
            },

            // String repetition: text * count
            Operator::Mul => match (left, right) {
                (Number, Number) => Some(Resolution::new(Family::Number, Number)),
                (String, Number) => Some(Resolution::new(Family::String, String)),
                (String, Unknown) => Some(Resolution::new(Family::Generic, String)),
                (Unknown, Number) | (Unknown, Unknown) => {
                    Some(Resolution::new(Family::Generic, Unknown))
                }
                (Number, Unknown) => Some(Resolution::new(Family::Generic, Number)),
                _ => None,
            },

            Operator::Ne
            | Operator::Le
            | Operator::Ge
            | Operator::Lt
            | Operator::Gt
            | Operator::Eq => match (left, right) {
                (Number, Number) => Some(Resolution::new(Family::Number, Number)),
                (String, String) => Some(Resolution::new(Family::String, Number)),
                (DateTime, DateTime) | (DateTime, String) | (String, DateTime) => {
                    Some(Resolution::new(Family::Timestamp, Number))
                }
                _ if unknown => Some(Resolution::new(Family::Generic, Number)),
                _ => None,
            },

            Operator::And | Operator::Or => match (left, right) {
                (Number, Number) => Some(Resolution::new(Family::Number, Number)),
                (String, String) => Some(Resolution::new(Family::String, Number)),
                (DateTime, _) | (_, DateTime) => None,
                _ if unknown => Some(Resolution::new(Family::Generic, Number)),
                _ => None,
            },

            Operator::In | Operator::Rin => match (left, right) {
                (String, String) => Some(Resolution::new(Family::String, Number)),
                (String, Unknown) | (Unknown, String) | (Unknown, Unknown) => {
                    Some(Resolution::new(Family::Generic, Number))
                }
                _ => None,
            },

            Operator::Not => None,
        }
    }

    /// Resolve a unary operator for the given operand type
    pub fn resolve_unary(&self, operand: DataType) -> Option<Resolution> {
        match (self, operand) {
            (Operator::Not, DataType::Number) => {
                Some(Resolution::new(Family::Number, DataType::Number))
            }
            (Operator::Not, DataType::String) => {
                Some(Resolution::new(Family::String, DataType::Number))
            }
            (Operator::Not, DataType::Unknown) => {
                Some(Resolution::new(Family::Generic, DataType::Number))
            }
            _ => None,
        }
    }
}

/// Result type of a conditional whose branches have the given types
pub fn merge_branches(when_true: DataType, when_false: DataType) -> Option<DataType> {
    match (when_true, when_false) {
        (a, b) if a == b => Some(a),
        (DataType::Unknown, _) | (_, DataType::Unknown) => Some(DataType::Unknown),
        _ => None,
    }
}

/// Whether a value of this type can drive a conditional jump
pub fn is_condition(data_type: DataType) -> bool {
    matches!(
        data_type,
        DataType::Number | DataType::String | DataType::Unknown
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use DataType::*;

    #[test]
    fn test_arithmetic_rules() {
        assert_eq!(
            Operator::Add.resolve(Number, Number),
            Some(Resolution::new(Family::Number, Number))
        );
        assert_eq!(
            Operator::Add.resolve(String, String),
            Some(Resolution::new(Family::String, String))
        );
        assert_eq!(Operator::Add.resolve(Number, String), None);
        assert_eq!(Operator::Sub.resolve(DateTime, DateTime), None);
        assert_eq!(
            Operator::Div.resolve(Unknown, Number),
            Some(Resolution::new(Family::Generic, Number))
        );
    }

    #[test]
    fn test_repeat_rules() {
        assert_eq!(
            Operator::Mul.resolve(String, Number),
            Some(Resolution::new(Family::String, String))
        );
        assert_eq!(Operator::Mul.resolve(String, String), None);
        assert_eq!(Operator::Mul.resolve(Number, String), None);
    }

    #[test]
    fn test_comparison_rules() {
        assert_eq!(
            Operator::Eq.resolve(String, String),
            Some(Resolution::new(Family::String, Number))
        );
        assert_eq!(
            Operator::Lt.resolve(DateTime, String),
            Some(Resolution::new(Family::Timestamp, Number))
        );
        assert_eq!(Operator::Gt.resolve(Number, String), None);
        assert_eq!(Operator::Gt.resolve(DateTime, Number), None);
        assert_eq!(
            Operator::Ge.resolve(Unknown, String),
            Some(Resolution::new(Family::Generic, Number))
        );
    }

    #[test]
    fn test_membership_rules() {
        assert_eq!(
            Operator::In.resolve(String, String),
            Some(Resolution::new(Family::String, Number))
        );
        assert_eq!(Operator::In.resolve(Number, String), None);
        assert_eq!(Operator::Rin.resolve(Number, Number), None);
    }

    #[test]
    fn test_unary_and_branches() {
        assert_eq!(
            Operator::Not.resolve_unary(String),
            Some(Resolution::new(Family::String, Number))
        );
        assert_eq!(Operator::Not.resolve_unary(DateTime), None);
        assert_eq!(Operator::Not.resolve(Number, Number), None);

        assert_eq!(merge_branches(String, String), Some(String));
        assert_eq!(merge_branches(Number, String), None);
        assert_eq!(merge_branches(Unknown, String), Some(Unknown));
        assert!(is_condition(String));
        assert!(!is_condition(DateTime));
    }
}
