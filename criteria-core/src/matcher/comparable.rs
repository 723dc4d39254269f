//! Comparable matchers (`<`, `<=`, `>`, `>=` and ranges)

use super::{
    required, CriteriaContext, CriteriaCreator, CriteriaError, CriteriaState, Matcher,
    ObjectMatcher,
};
use crate::expression::{Expression, Operator, Path};
use crate::value::Value;
use std::fmt;
use std::marker::PhantomData;

/// Ordering predicates for attributes whose values have a natural order
pub trait ComparableMatcher<R, V>: ObjectMatcher<R, V>
where
    V: Into<Value> + PartialOrd,
{
    /// Attribute is less than (but not equal to) `upper`.
    ///
    /// Use [`is_at_most`](Self::is_at_most) for less-or-equal.
    fn is_less_than(self, upper: impl Into<V>) -> Result<R, CriteriaError> {
        let upper = required::<V>(upper.into(), "upper")?;
        self.into_context().create_root(|e| {
            Expression::binary(Operator::LessThan, e, Expression::constant(upper)?)
        })
    }

    /// Attribute is greater than (but not equal to) `lower`.
    ///
    /// Use [`is_at_least`](Self::is_at_least) for greater-or-equal.
    fn is_greater_than(self, lower: impl Into<V>) -> Result<R, CriteriaError> {
        let lower = required::<V>(lower.into(), "lower")?;
        self.into_context().create_root(|e| {
            Expression::binary(Operator::GreaterThan, e, Expression::constant(lower)?)
        })
    }

    /// Attribute is less than or equal to `upper_inclusive`
    fn is_at_most(self, upper_inclusive: impl Into<V>) -> Result<R, CriteriaError> {
        let upper = required::<V>(upper_inclusive.into(), "upper_inclusive")?;
        self.into_context().create_root(|e| {
            Expression::binary(Operator::LessThanOrEqual, e, Expression::constant(upper)?)
        })
    }

    /// Attribute is greater than or equal to `lower_inclusive`
    fn is_at_least(self, lower_inclusive: impl Into<V>) -> Result<R, CriteriaError> {
        let lower = required::<V>(lower_inclusive.into(), "lower_inclusive")?;
        self.into_context().create_root(|e| {
            Expression::binary(Operator::GreaterThanOrEqual, e, Expression::constant(lower)?)
        })
    }

    /// Attribute is in `[lower_inclusive, upper_inclusive]`.
    ///
    /// Builds one `AND(>=, <=)` node so the range stays a single predicate.
    fn is_between(
        self,
        lower_inclusive: impl Into<V>,
        upper_inclusive: impl Into<V>,
    ) -> Result<R, CriteriaError> {
        let lower = required::<V>(lower_inclusive.into(), "lower_inclusive")?;
        let upper = required::<V>(upper_inclusive.into(), "upper_inclusive")?;
        self.into_context().create_root(|e| {
            let lower = Expression::binary(
                Operator::GreaterThanOrEqual,
                e.clone(),
                Expression::constant(lower)?,
            )?;
            let upper =
                Expression::binary(Operator::LessThanOrEqual, e, Expression::constant(upper)?)?;
            Expression::and(vec![lower, upper])
        })
    }
}

/// Matcher for comparable attributes (numbers, dates as integers, ...)
pub struct ComparableCriteria<R, V> {
    context: CriteriaContext<R>,
    _value: PhantomData<fn() -> V>,
}

impl<R, V: Into<Value> + PartialOrd> ComparableCriteria<R, V> {
    pub fn new(context: CriteriaContext<R>) -> Self {
        Self {
            context,
            _value: PhantomData,
        }
    }

    pub fn creator() -> CriteriaCreator<Self, R> {
        Self::new
    }
}

impl<R, V: Into<Value> + PartialOrd> Matcher<R> for ComparableCriteria<R, V> {
    type Detached = ComparableCriteria<CriteriaState, V>;

    fn into_context(self) -> CriteriaContext<R> {
        self.context
    }

    fn detached(path: Path) -> Self::Detached {
        ComparableCriteria::new(CriteriaContext::detached(path))
    }
}

impl<R, V: Into<Value> + PartialOrd> ObjectMatcher<R, V> for ComparableCriteria<R, V> {}

impl<R, V: Into<Value> + PartialOrd> ComparableMatcher<R, V> for ComparableCriteria<R, V> {}

impl<R, V> fmt::Debug for ComparableCriteria<R, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComparableCriteria")
            .field("path", self.context.path())
            .finish()
    }
}
