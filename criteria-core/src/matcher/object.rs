//! Equality matchers

use super::{required, CriteriaContext, CriteriaCreator, CriteriaError, CriteriaState, Matcher};
use crate::expression::{Expression, Operator, Path};
use crate::value::Value;
use std::fmt;
use std::marker::PhantomData;

/// Equality and membership predicates (`=`, `!=`, `IN`, `NOT IN`)
pub trait ObjectMatcher<R, V: Into<Value>>: Matcher<R> {
    /// Attribute equals `value`
    fn is_equal_to(self, value: impl Into<V>) -> Result<R, CriteriaError> {
        let value = required::<V>(value.into(), "value")?;
        self.into_context()
            .create_root(|e| Expression::binary(Operator::Equal, e, Expression::constant(value)?))
    }

    /// Attribute differs from `value`
    fn is_not_equal_to(self, value: impl Into<V>) -> Result<R, CriteriaError> {
        let value = required::<V>(value.into(), "value")?;
        self.into_context()
            .create_root(|e| Expression::binary(Operator::NotEqual, e, Expression::constant(value)?))
    }

    /// Attribute is one of `values`
    fn is_in<I>(self, values: I) -> Result<R, CriteriaError>
    where
        I: IntoIterator,
        I::Item: Into<V>,
    {
        let values = required_all::<I, V>(values, "values")?;
        self.into_context()
            .create_root(|e| Expression::binary(Operator::In, e, Expression::constant(values)?))
    }

    /// Attribute is none of `values`
    fn is_not_in<I>(self, values: I) -> Result<R, CriteriaError>
    where
        I: IntoIterator,
        I::Item: Into<V>,
    {
        let values = required_all::<I, V>(values, "values")?;
        self.into_context()
            .create_root(|e| Expression::binary(Operator::NotIn, e, Expression::constant(values)?))
    }
}

fn required_all<I, V>(values: I, name: &'static str) -> Result<Value, CriteriaError>
where
    I: IntoIterator,
    I::Item: Into<V>,
    V: Into<Value>,
{
    let values = values
        .into_iter()
        .map(|v| required::<V>(v.into(), name))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Array(values))
}

/// Matcher for attributes compared by equality only
pub struct ObjectCriteria<R, V> {
    context: CriteriaContext<R>,
    _value: PhantomData<fn() -> V>,
}

impl<R, V: Into<Value>> ObjectCriteria<R, V> {
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

impl<R, V: Into<Value>> Matcher<R> for ObjectCriteria<R, V> {
    type Detached = ObjectCriteria<CriteriaState, V>;

    fn into_context(self) -> CriteriaContext<R> {
        self.context
    }

    fn detached(path: Path) -> Self::Detached {
        ObjectCriteria::new(CriteriaContext::detached(path))
    }
}

impl<R, V: Into<Value>> ObjectMatcher<R, V> for ObjectCriteria<R, V> {}

impl<R, V> fmt::Debug for ObjectCriteria<R, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectCriteria")
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
    fn test_is_equal_to() {
        let filter = person().address.zip.is_equal_to(1000).unwrap().filter().unwrap();
        assert_eq!(filter.to_string(), "EQUAL(address.zip, 1000)");
    }

    #[test]
    fn test_is_in_builds_single_constant() {
        let filter = person().id.is_in(["a", "b"]).unwrap().filter().unwrap();
        let call = filter.as_call().unwrap();
        assert_eq!(call.operator(), Operator::In);
        assert_eq!(
            call.arguments()[1].as_constant().unwrap().value(),
            &Value::Array(vec![Value::from("a"), Value::from("b")])
        );
    }

    #[test]
    fn test_is_not_in() {
        let filter = person().address.zip.is_not_in([1, 2]).unwrap().filter().unwrap();
        assert_eq!(filter.to_string(), "NOT_IN(address.zip, [1, 2])");
    }

    #[test]
    fn test_null_arguments_rejected() {
        let err = person().nickname.is_equal_to(None::<String>).unwrap_err();
        assert_eq!(err, CriteriaError::NullArgument("value"));

        let err = person()
            .nickname
            .is_in(vec![Some("a".to_string()), None])
            .unwrap_err();
        assert_eq!(err, CriteriaError::NullArgument("values"));
    }
}
