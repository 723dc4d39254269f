//! Expression tree for filter predicates
//!
//! Expressions are immutable trees of three node kinds:
//! - Constant: a non-null literal value
//! - Path: a reference to an entity attribute
//! - Call: an operator from the fixed catalog applied to ordered arguments
//!
//! Composition always builds new nodes; nothing is mutated in place, so a
//! tree can be shared between threads and cached freely.

pub mod operator;
pub mod path;

pub use operator::{Arity, Operator};
pub use path::Path;

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Filter expression node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expression {
    /// Literal value
    Constant(Constant),
    /// Attribute reference
    Path(Path),
    /// Operator application
    Call(Call),
}

/// Non-null literal value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Constant(Value);

impl Constant {
    /// Wrap a value, rejecting `Value::Null`
    pub fn new(value: impl Into<Value>) -> Result<Self, ExpressionError> {
        let value = value.into();
        if value.is_null() {
            return Err(ExpressionError::NullValue);
        }
        Ok(Self(value))
    }

    /// The literal value
    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Unwrap the literal value
    pub fn into_value(self) -> Value {
        self.0
    }
}

/// Operator applied to an ordered list of arguments
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Call {
    operator: Operator,
    arguments: Vec<Expression>,
}

impl Call {
    /// Operator of this call
    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Arguments in declaration order
    pub fn arguments(&self) -> &[Expression] {
        &self.arguments
    }
}

impl Expression {
    /// Literal node; fails with [`ExpressionError::NullValue`] for null
    pub fn constant(value: impl Into<Value>) -> Result<Self, ExpressionError> {
        Ok(Expression::Constant(Constant::new(value)?))
    }

    /// Attribute node
    pub fn path(path: Path) -> Self {
        Expression::Path(path)
    }

    /// Operator node; fails with [`ExpressionError::Arity`] when the argument
    /// count does not fit the operator
    pub fn call(operator: Operator, arguments: Vec<Expression>) -> Result<Self, ExpressionError> {
        let arity = operator.arity();
        if !arity.accepts(arguments.len()) {
            return Err(ExpressionError::Arity {
                operator,
                expected: arity,
                actual: arguments.len(),
            });
        }
        Ok(Expression::Call(Call {
            operator,
            arguments,
        }))
    }

    /// Two-argument operator node
    pub fn binary(
        operator: Operator,
        left: Expression,
        right: Expression,
    ) -> Result<Self, ExpressionError> {
        Self::call(operator, vec![left, right])
    }

    /// Conjunction of two or more expressions
    pub fn and(arguments: Vec<Expression>) -> Result<Self, ExpressionError> {
        Self::call(Operator::And, arguments)
    }

    /// Disjunction of two or more expressions
    pub fn or(arguments: Vec<Expression>) -> Result<Self, ExpressionError> {
        Self::call(Operator::Or, arguments)
    }

    /// Negation
    pub fn not(expression: Expression) -> Self {
        Expression::Call(Call {
            operator: Operator::Not,
            arguments: vec![expression],
        })
    }

    /// Get as call
    pub fn as_call(&self) -> Option<&Call> {
        match self {
            Expression::Call(call) => Some(call),
            _ => None,
        }
    }

    /// Get as path
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Expression::Path(path) => Some(path),
            _ => None,
        }
    }

    /// Get as constant
    pub fn as_constant(&self) -> Option<&Constant> {
        match self {
            Expression::Constant(constant) => Some(constant),
            _ => None,
        }
    }

    /// All paths referenced in this tree, depth-first, left to right
    pub fn paths(&self) -> Vec<&Path> {
        let mut paths = Vec::new();
        self.collect_paths(&mut paths);
        paths
    }

    fn collect_paths<'a>(&'a self, paths: &mut Vec<&'a Path>) {
        match self {
            Expression::Constant(_) => {}
            Expression::Path(path) => paths.push(path),
            Expression::Call(call) => {
                for argument in &call.arguments {
                    argument.collect_paths(paths);
                }
            }
        }
    }
}

impl From<Path> for Expression {
    fn from(path: Path) -> Self {
        Expression::Path(path)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Constant(c) => write!(f, "{}", c.value()),
            Expression::Path(p) => write!(f, "{}", p),
            Expression::Call(call) => {
                write!(f, "{}(", call.operator)?;
                for (i, arg) in call.arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Expression construction errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpressionError {
    #[error("Operator {operator} takes {expected} arguments, got {actual}")]
    Arity {
        operator: Operator,
        expected: Arity,
        actual: usize,
    },

    #[error("Constant value cannot be null")]
    NullValue,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn age() -> Expression {
        Expression::path(Path::of("age"))
    }

    #[test]
    fn test_constant_rejects_null() {
        assert_eq!(Expression::constant(Value::Null), Err(ExpressionError::NullValue));
        assert!(Expression::constant(18).is_ok());
    }

    #[test]
    fn test_call_arity() {
        let eighteen = Expression::constant(18).unwrap();

        let err = Expression::call(Operator::GreaterThan, vec![age()]).unwrap_err();
        assert_eq!(
            err,
            ExpressionError::Arity {
                operator: Operator::GreaterThan,
                expected: Arity::Exactly(2),
                actual: 1,
            }
        );

        assert!(Expression::and(vec![age()]).is_err());
        assert!(Expression::call(Operator::Not, vec![age(), age()]).is_err());
        assert!(Expression::binary(Operator::GreaterThan, age(), eighteen).is_ok());
    }

    #[test]
    fn test_structural_equality() {
        let a = Expression::binary(Operator::Equal, age(), Expression::constant(1).unwrap()).unwrap();
        let b = Expression::binary(
            Operator::Equal,
            Expression::path(Path::parse("age")),
            Expression::constant(1).unwrap(),
        )
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_paths_in_order() {
        let expr = Expression::and(vec![
            Expression::binary(Operator::Equal, Expression::path(Path::of("a")), Expression::constant(1).unwrap()).unwrap(),
            Expression::not(Expression::binary(
                Operator::Equal,
                Expression::path(Path::of("b")),
                Expression::constant(2).unwrap(),
            ).unwrap()),
        ])
        .unwrap();

        let names: Vec<String> = expr.paths().iter().map(|p| p.to_string_path()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(expr.to_string(), "AND(EQUAL(a, 1), NOT(EQUAL(b, 2)))");
    }
}
