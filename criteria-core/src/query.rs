//! Query value object
//!
//! A query is a filter expression plus ordering and pagination. It is built
//! once per request and never changed afterwards.

use crate::expression::{Expression, Path};
use serde::{Deserialize, Serialize};

/// Filter, ordering and pagination for one operation
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Query {
    filter: Option<Expression>,
    collations: Vec<Collation>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Query {
    /// Create a new empty query (matches all entities)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a query with a filter
    pub fn with_filter(filter: Expression) -> Self {
        Self {
            filter: Some(filter),
            ..Self::default()
        }
    }

    /// Append a sort key
    pub fn collation(mut self, collation: Collation) -> Self {
        self.collations.push(collation);
        self
    }

    /// Sort by path in ascending order
    pub fn asc(self, path: Path) -> Self {
        self.collation(Collation::new(path, Direction::Ascending))
    }

    /// Sort by path in descending order
    pub fn desc(self, path: Path) -> Self {
        self.collation(Collation::new(path, Direction::Descending))
    }

    /// Set limit
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set offset
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Filter expression, `None` matches everything
    pub fn filter(&self) -> Option<&Expression> {
        self.filter.as_ref()
    }

    /// Sort keys in declaration order
    pub fn collations(&self) -> &[Collation] {
        &self.collations
    }

    /// Maximum number of results
    pub fn get_limit(&self) -> Option<u64> {
        self.limit
    }

    /// Number of results to skip
    pub fn get_offset(&self) -> Option<u64> {
        self.offset
    }

    /// Check if the query has neither filter, ordering nor pagination
    pub fn is_unrestricted(&self) -> bool {
        self.filter.is_none()
            && self.collations.is_empty()
            && self.limit.is_none()
            && self.offset.is_none()
    }
}

/// One sort key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Collation {
    path: Path,
    direction: Direction,
}

impl Collation {
    pub fn new(path: Path, direction: Direction) -> Self {
        Self { path, direction }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub fn is_ascending(&self) -> bool {
        matches!(self, Direction::Ascending)
    }
}
