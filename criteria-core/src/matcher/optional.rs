//! Matchers for attributes that may be absent

use super::{CriteriaContext, CriteriaCreator, CriteriaError, CriteriaState, Matcher, ObjectMatcher};
use crate::expression::{Expression, Operator, Path};
use crate::value::Value;
use std::fmt;
use std::marker::PhantomData;

/// Presence predicates
pub trait OptionalMatcher<R>: Matcher<R> {
    /// Attribute is set
    fn is_present(self) -> Result<R, CriteriaError> {
        self.into_context()
            .create_root(|e| Expression::call(Operator::IsPresent, vec![e]))
    }

    /// Attribute is missing or null
    fn is_absent(self) -> Result<R, CriteriaError> {
        self.into_context()
            .create_root(|e| Expression::call(Operator::IsAbsent, vec![e]))
    }
}

/// Matcher for `Option<V>` attributes.
///
/// Equality takes `Option<V>` so that passing `None` is rejected as a null
/// argument; use [`OptionalMatcher::is_absent`] to match missing values.
pub struct OptionalCriteria<R, V> {
    context: CriteriaContext<R>,
    _value: PhantomData<fn() -> V>,
}

impl<R, V: Into<Value>> OptionalCriteria<R, V> {
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

impl<R, V: Into<Value>> Matcher<R> for OptionalCriteria<R, V> {
    type Detached = OptionalCriteria<CriteriaState, V>;

    fn into_context(self) -> CriteriaContext<R> {
        self.context
    }

    fn detached(path: Path) -> Self::Detached {
        OptionalCriteria::new(CriteriaContext::detached(path))
    }
}

impl<R, V: Into<Value>> OptionalMatcher<R> for OptionalCriteria<R, V> {}

impl<R, V: Into<Value>> ObjectMatcher<R, Option<V>> for OptionalCriteria<R, V> {}

impl<R, V> fmt::Debug for OptionalCriteria<R, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionalCriteria")
            .field("path", self.context.path())
            .finish()
    }
}
