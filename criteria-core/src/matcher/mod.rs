//! Typed matcher DSL
//!
//! Matchers build [`Expression`] nodes for one attribute and hand them to the
//! root factory held by their [`CriteriaContext`]. The factory folds the new
//! predicate into the accumulated [`CriteriaState`] and builds a fresh typed
//! root `R`, so every matcher call returns a criteria object that further
//! predicates can be chained on:
//!
//! ```ignore
//! let criteria = person().age.is_at_least(18)?.name.starts_with("A")?;
//! ```
//!
//! The context, not the matcher type, carries the attribute identity, which
//! is how one matcher family serves every attribute of a compatible type.

pub mod boolean;
pub mod comparable;
pub mod object;
pub mod optional;
pub mod string;

pub use boolean::{BooleanCriteria, BooleanMatcher};
pub use comparable::{ComparableCriteria, ComparableMatcher};
pub use object::{ObjectCriteria, ObjectMatcher};
pub use optional::{OptionalCriteria, OptionalMatcher};
pub use string::{StringCriteria, StringMatcher};

use crate::expression::{Expression, ExpressionError, Path};
use crate::query::Query;
use crate::value::Value;

/// Factory producing a matcher bound to an attribute context
pub type CriteriaCreator<T, R> = fn(CriteriaContext<R>) -> T;

/// Predicates accumulated so far, kept in disjunctive normal form
///
/// `and` adds to the current conjunction, `or` closes it and starts a new
/// one. The final filter is `OR(AND(..), AND(..))` with single-element
/// groups collapsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CriteriaState {
    disjunction: Vec<Expression>,
    conjunction: Vec<Expression>,
}

impl CriteriaState {
    /// Empty state (matches everything)
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predicate to the current conjunction
    pub fn and(mut self, expression: Expression) -> Self {
        self.conjunction.push(expression);
        self
    }

    /// Close the current conjunction; following predicates form a new branch
    pub fn or(mut self) -> Self {
        let conjunction = std::mem::take(&mut self.conjunction);
        if let Some(group) = combine_and(conjunction) {
            self.disjunction.push(group);
        }
        self
    }

    /// Check if no predicate has been added
    pub fn is_empty(&self) -> bool {
        self.disjunction.is_empty() && self.conjunction.is_empty()
    }

    /// Filter expression for the accumulated predicates
    pub fn filter(&self) -> Option<Expression> {
        self.clone().into_filter()
    }

    /// Consume the state into its filter expression
    pub fn into_filter(self) -> Option<Expression> {
        let mut branches = self.disjunction;
        if let Some(group) = combine_and(self.conjunction) {
            branches.push(group);
        }

        match branches.len() {
            0 => None,
            1 => branches.pop(),
            // two or more branches always satisfy OR's arity
            _ => Expression::or(branches).ok(),
        }
    }
}

fn combine_and(mut expressions: Vec<Expression>) -> Option<Expression> {
    match expressions.len() {
        0 => None,
        1 => expressions.pop(),
        _ => Expression::and(expressions).ok(),
    }
}

fn detached_root(state: CriteriaState) -> CriteriaState {
    state
}

/// Attribute context: the attribute path, the predicates accumulated on the
/// owning root, and the creator of that root
pub struct CriteriaContext<R> {
    path: Path,
    state: CriteriaState,
    creator: fn(CriteriaState) -> R,
}

impl<R> CriteriaContext<R> {
    /// Context of a criteria root; attributes are derived with [`attribute`](Self::attribute)
    pub fn root(state: CriteriaState, creator: fn(CriteriaState) -> R) -> Self {
        Self {
            path: Path::from_segments(Vec::<String>::new()),
            state,
            creator,
        }
    }

    /// Context for a (possibly nested) attribute of this context
    pub fn attribute(&self, name: &str) -> Self {
        Self {
            path: self.path.child(name),
            state: self.state.clone(),
            creator: self.creator,
        }
    }

    /// Attribute path of this context
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Predicates accumulated on the owning root
    pub fn state(&self) -> &CriteriaState {
        &self.state
    }

    /// Root factory: apply `transform` to this attribute's path expression,
    /// add the result to the accumulated predicates, and build a new root
    pub fn create_root<F>(self, transform: F) -> Result<R, CriteriaError>
    where
        F: FnOnce(Expression) -> Result<Expression, ExpressionError>,
    {
        let expression = transform(Expression::path(self.path))?;
        Ok((self.creator)(self.state.and(expression)))
    }
}

impl CriteriaContext<CriteriaState> {
    /// Context whose root is the bare accumulated state, used for scoped
    /// sub-expressions such as negation
    pub fn detached(path: Path) -> Self {
        Self {
            path,
            state: CriteriaState::new(),
            creator: detached_root,
        }
    }
}

impl<R> Clone for CriteriaContext<R> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            state: self.state.clone(),
            creator: self.creator,
        }
    }
}

impl<R> std::fmt::Debug for CriteriaContext<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CriteriaContext")
            .field("path", &self.path)
            .field("state", &self.state)
            .finish()
    }
}

/// Base of every matcher family
pub trait Matcher<R>: Sized {
    /// The same matcher family bound to a detached context
    type Detached;

    /// Context this matcher is bound to
    fn into_context(self) -> CriteriaContext<R>;

    /// Build the detached variant of this matcher for `path`
    fn detached(path: Path) -> Self::Detached;

    /// Negate the predicates `f` builds on this attribute
    ///
    /// `NOT` scopes exactly the sub-expression produced inside `f`.
    fn not<F>(self, f: F) -> Result<R, CriteriaError>
    where
        F: FnOnce(Self::Detached) -> Result<CriteriaState, CriteriaError>,
    {
        let context = self.into_context();
        let inner = f(Self::detached(context.path().clone()))?;
        let negated = inner.into_filter().ok_or(CriteriaError::EmptyNegation)?;
        context.create_root(|_| Ok(Expression::not(negated)))
    }
}

/// Typed criteria root
pub trait Criteria: Sized {
    /// Build the root (and all of its attribute matchers) from a state
    fn from_state(state: CriteriaState) -> Self;

    /// Predicates accumulated on this root
    fn state(&self) -> &CriteriaState;

    /// Consume the root into its accumulated predicates
    fn into_state(self) -> CriteriaState;

    /// Start a new disjunction branch
    fn or(self) -> Self {
        Self::from_state(self.into_state().or())
    }

    /// Add the negation of the predicates `f` builds on a fresh root
    fn not<F>(self, f: F) -> Result<Self, CriteriaError>
    where
        F: FnOnce(Self) -> Result<Self, CriteriaError>,
    {
        let inner = f(Self::from_state(CriteriaState::new()))?.into_state();
        let negated = inner.into_filter().ok_or(CriteriaError::EmptyNegation)?;
        Ok(Self::from_state(self.into_state().and(Expression::not(negated))))
    }

    /// Filter expression of this root
    fn filter(&self) -> Option<Expression> {
        self.state().filter()
    }

    /// Query filtering by this root's predicates
    fn to_query(&self) -> Query {
        match self.filter() {
            Some(filter) => Query::with_filter(filter),
            None => Query::new(),
        }
    }
}

/// Reject arguments that convert to `Value::Null`
pub(crate) fn required<V: Into<Value>>(value: V, name: &'static str) -> Result<Value, CriteriaError> {
    let value = value.into();
    if value.is_null() {
        return Err(CriteriaError::NullArgument(name));
    }
    Ok(value)
}

/// Matcher DSL errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CriteriaError {
    #[error("Argument '{0}' cannot be null")]
    NullArgument(&'static str),

    #[error("Negated block produced no predicate")]
    EmptyNegation,

    #[error(transparent)]
    Expression(#[from] ExpressionError),
}
