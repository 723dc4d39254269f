//! Text matchers

use super::{
    required, ComparableMatcher, CriteriaContext, CriteriaCreator, CriteriaError, CriteriaState,
    Matcher, ObjectMatcher,
};
use crate::expression::{Expression, Operator, Path};
use std::fmt;

/// Ordering plus text predicates for string attributes
pub trait StringMatcher<R>: ComparableMatcher<R, String> {
    fn starts_with(self, prefix: impl Into<String>) -> Result<R, CriteriaError> {
        text(self, Operator::StartsWith, prefix.into(), "prefix")
    }

    fn ends_with(self, suffix: impl Into<String>) -> Result<R, CriteriaError> {
        text(self, Operator::EndsWith, suffix.into(), "suffix")
    }

    fn contains(self, substring: impl Into<String>) -> Result<R, CriteriaError> {
        text(self, Operator::Contains, substring.into(), "substring")
    }

    /// Attribute matches a regular expression.
    ///
    /// Not every backend can evaluate this; the region backend rejects it.
    fn matches(self, pattern: impl Into<String>) -> Result<R, CriteriaError> {
        text(self, Operator::Matches, pattern.into(), "pattern")
    }
}

fn text<R, M: Matcher<R>>(
    matcher: M,
    operator: Operator,
    argument: String,
    name: &'static str,
) -> Result<R, CriteriaError> {
    let argument = required(argument, name)?;
    matcher
        .into_context()
        .create_root(|e| Expression::binary(operator, e, Expression::constant(argument)?))
}

/// Matcher for string attributes
pub struct StringCriteria<R> {
    context: CriteriaContext<R>,
}

impl<R> StringCriteria<R> {
    pub fn new(context: CriteriaContext<R>) -> Self {
        Self { context }
    }

    pub fn creator() -> CriteriaCreator<Self, R> {
        Self::new
    }
}

impl<R> Matcher<R> for StringCriteria<R> {
    type Detached = StringCriteria<CriteriaState>;

    fn into_context(self) -> CriteriaContext<R> {
        self.context
    }

    fn detached(path: Path) -> Self::Detached {
        StringCriteria::new(CriteriaContext::detached(path))
    }
}

impl<R> ObjectMatcher<R, String> for StringCriteria<R> {}

impl<R> ComparableMatcher<R, String> for StringCriteria<R> {}

impl<R> StringMatcher<R> for StringCriteria<R> {}

impl<R> fmt::Debug for StringCriteria<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringCriteria")
            .field("path", self.context.path())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::person;
    use super::*;
    use crate::matcher::Criteria;

    #[test]
    fn test_text_operators() {
        let filter = person().id.starts_with("p-").unwrap().filter().unwrap();
        assert_eq!(filter.to_string(), "STARTS_WITH(id, \"p-\")");

        let filter = person().address.city.ends_with("bon").unwrap().filter().unwrap();
        assert_eq!(filter.to_string(), "ENDS_WITH(address.city, \"bon\")");

        let filter = person().id.contains("x").unwrap().filter().unwrap();
        assert_eq!(filter.as_call().unwrap().operator(), Operator::Contains);

        let filter = person().id.matches("^p[0-9]+$").unwrap().filter().unwrap();
        assert_eq!(filter.as_call().unwrap().operator(), Operator::Matches);
    }

    #[test]
    fn test_strings_are_comparable() {
        let filter = person().id.is_between("a", "m").unwrap().filter().unwrap();
        assert_eq!(
            filter.to_string(),
            "AND(GREATER_THAN_OR_EQUAL(id, \"a\"), LESS_THAN_OR_EQUAL(id, \"m\"))"
        );
    }

    #[test]
    fn test_not_scoped_to_attribute() {
        let filter = person()
            .id
            .not(|id| id.starts_with("tmp"))
            .unwrap()
            .filter()
            .unwrap();
        assert_eq!(filter.to_string(), "NOT(STARTS_WITH(id, \"tmp\"))");
    }
}
