//! Boolean matchers

use super::{CriteriaContext, CriteriaCreator, CriteriaError, CriteriaState, Matcher, ObjectMatcher};
use crate::expression::Path;
use std::fmt;

pub trait BooleanMatcher<R>: ObjectMatcher<R, bool> {
    fn is_true(self) -> Result<R, CriteriaError> {
        self.is_equal_to(true)
    }

    fn is_false(self) -> Result<R, CriteriaError> {
        self.is_equal_to(false)
    }
}

/// Matcher for boolean attributes
pub struct BooleanCriteria<R> {
    context: CriteriaContext<R>,
}

impl<R> BooleanCriteria<R> {
    pub fn new(context: CriteriaContext<R>) -> Self {
        Self { context }
    }

    pub fn creator() -> CriteriaCreator<Self, R> {
        Self::new
    }
}

impl<R> Matcher<R> for BooleanCriteria<R> {
    type Detached = BooleanCriteria<CriteriaState>;

    fn into_context(self) -> CriteriaContext<R> {
        self.context
    }

    fn detached(path: Path) -> Self::Detached {
        BooleanCriteria::new(CriteriaContext::detached(path))
    }
}

impl<R> ObjectMatcher<R, bool> for BooleanCriteria<R> {}

impl<R> BooleanMatcher<R> for BooleanCriteria<R> {}

impl<R> fmt::Debug for BooleanCriteria<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BooleanCriteria")
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
    fn test_is_true_and_false() {
        let filter = person().active.is_true().unwrap().filter().unwrap();
        assert_eq!(filter.to_string(), "EQUAL(active, true)");

        let filter = person().active.is_false().unwrap().filter().unwrap();
        assert_eq!(filter.to_string(), "EQUAL(active, false)");
    }
}
