//! Operator catalog shared by every backend
//!
//! The set is closed: a backend picks the subset it can render and reports
//! the rest as unsupported instead of adding operators of its own.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operators that a [`Call`](super::Call) can apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// `a = b`
    Equal,
    /// `a != b`
    NotEqual,
    /// `a < b`
    LessThan,
    /// `a <= b`
    LessThanOrEqual,
    /// `a > b`
    GreaterThan,
    /// `a >= b`
    GreaterThanOrEqual,
    /// All arguments hold
    And,
    /// At least one argument holds
    Or,
    /// Negation of the single argument
    Not,
    /// Attribute is one of a set of constants
    In,
    /// Attribute is none of a set of constants
    NotIn,
    /// Optional attribute has a value
    IsPresent,
    /// Optional attribute has no value
    IsAbsent,
    /// Text attribute starts with a prefix
    StartsWith,
    /// Text attribute ends with a suffix
    EndsWith,
    /// Text attribute contains a substring
    Contains,
    /// Text attribute matches a regular expression
    Matches,
}

/// Number of arguments an operator accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many arguments
    Exactly(usize),
    /// This many arguments or more
    AtLeast(usize),
}

impl Arity {
    /// Check an argument count against this arity
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Arity::Exactly(n) => count == *n,
            Arity::AtLeast(n) => count >= *n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "exactly {}", n),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

impl Operator {
    /// Argument count this operator requires
    pub fn arity(&self) -> Arity {
        match self {
            Operator::And | Operator::Or => Arity::AtLeast(2),
            Operator::Not | Operator::IsPresent | Operator::IsAbsent => Arity::Exactly(1),
            _ => Arity::Exactly(2),
        }
    }

    /// `AND`, `OR` and `NOT`
    pub fn is_logical(&self) -> bool {
        matches!(self, Operator::And | Operator::Or | Operator::Not)
    }

    /// The six binary comparisons
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Operator::Equal
                | Operator::NotEqual
                | Operator::LessThan
                | Operator::LessThanOrEqual
                | Operator::GreaterThan
                | Operator::GreaterThanOrEqual
        )
    }

    /// Catalog name, used in error messages
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Equal => "EQUAL",
            Operator::NotEqual => "NOT_EQUAL",
            Operator::LessThan => "LESS_THAN",
            Operator::LessThanOrEqual => "LESS_THAN_OR_EQUAL",
            Operator::GreaterThan => "GREATER_THAN",
            Operator::GreaterThanOrEqual => "GREATER_THAN_OR_EQUAL",
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::Not => "NOT",
            Operator::In => "IN",
            Operator::NotIn => "NOT_IN",
            Operator::IsPresent => "IS_PRESENT",
            Operator::IsAbsent => "IS_ABSENT",
            Operator::StartsWith => "STARTS_WITH",
            Operator::EndsWith => "ENDS_WITH",
            Operator::Contains => "CONTAINS",
            Operator::Matches => "MATCHES",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
