//! Operation protocol executed by backends
//!
//! An [`Operation`] is a single-use request descriptor. Backends match on it
//! exhaustively; variants a backend does not implement are reported through
//! the result stream as unsupported.

use crate::entity::{Entity, Identity};
use crate::expression::Path;
use crate::query::Query;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Request handed to [`Backend::execute`](crate::backend::Backend::execute)
#[derive(Debug, Clone)]
pub enum Operation<E> {
    /// Stream matching entities
    Select(Select),
    /// Store entities
    Insert(Insert<E>),
    /// Remove matching entities; an absent filter removes everything
    Delete(Delete),
    /// Stream change events for matching entities until cancelled
    Watch(Watch),
    /// Assign attribute values on matching entities
    Update(Update),
}

impl<E: Entity> Operation<E> {
    pub fn select(query: Query) -> Self {
        Operation::Select(Select { query })
    }

    pub fn insert(entities: Vec<E>) -> Self {
        Operation::Insert(Insert::new(entities))
    }

    pub fn delete(query: Query) -> Self {
        Operation::Delete(Delete { query })
    }

    pub fn watch(query: Query) -> Self {
        Operation::Watch(Watch { query })
    }

    pub fn update(query: Query, assignments: Vec<(Path, Value)>) -> Self {
        Operation::Update(Update { query, assignments })
    }
}

impl<E> Operation<E> {
    /// Variant name, used in logs and error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Select(_) => "Select",
            Operation::Insert(_) => "Insert",
            Operation::Delete(_) => "Delete",
            Operation::Watch(_) => "Watch",
            Operation::Update(_) => "Update",
        }
    }
}

impl<E> fmt::Display for Operation<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Insert(insert) => write!(f, "Insert({} entities)", insert.entities.len()),
            Operation::Update(update) => {
                write!(f, "Update({} assignments)", update.assignments.len())
            }
            other => f.write_str(other.kind()),
        }
    }
}

/// Query for entities
#[derive(Debug, Clone)]
pub struct Select {
    query: Query,
}

impl Select {
    pub fn query(&self) -> &Query {
        &self.query
    }
}

/// Removal of entities matching a query
#[derive(Debug, Clone)]
pub struct Delete {
    query: Query,
}

impl Delete {
    pub fn query(&self) -> &Query {
        &self.query
    }
}

/// Continuous query over entities matching a query
#[derive(Debug, Clone)]
pub struct Watch {
    query: Query,
}

impl Watch {
    pub fn query(&self) -> &Query {
        &self.query
    }
}

/// Attribute assignment on entities matching a query
#[derive(Debug, Clone)]
pub struct Update {
    query: Query,
    assignments: Vec<(Path, Value)>,
}

impl Update {
    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn assignments(&self) -> &[(Path, Value)] {
        &self.assignments
    }
}

/// Entities to store, with the key extractor when the entity declares one
#[derive(Debug, Clone)]
pub struct Insert<E> {
    entities: Vec<E>,
    identity: Option<Identity<E>>,
}

impl<E: Entity> Insert<E> {
    pub fn new(entities: Vec<E>) -> Self {
        Self {
            entities,
            identity: E::identity(),
        }
    }
}

impl<E> Insert<E> {
    /// Insert without key extraction, regardless of the entity declaration
    pub fn unkeyed(entities: Vec<E>) -> Self {
        Self {
            entities,
            identity: None,
        }
    }

    pub fn entities(&self) -> &[E] {
        &self.entities
    }

    /// Check if keys can be extracted from the entities
    pub fn is_keyed(&self) -> bool {
        self.identity.is_some()
    }

    /// Narrow to a [`KeyedInsert`], handing the insert back when the entity
    /// has no identity declaration
    pub fn keyed(self) -> Result<KeyedInsert<E>, Self> {
        match self.identity {
            Some(identity) => {
                let entries = self
                    .entities
                    .into_iter()
                    .map(|entity| (identity.key(&entity), entity))
                    .collect();
                Ok(KeyedInsert { entries })
            }
            None => Err(self),
        }
    }
}

/// Insert whose entities are paired with their keys, in input order
#[derive(Debug, Clone)]
pub struct KeyedInsert<E> {
    entries: Vec<(Value, E)>,
}

impl<E> KeyedInsert<E> {
    pub fn entries(&self) -> &[(Value, E)] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<(Value, E)> {
        self.entries
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(key, _)| key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Completion marker of a write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteResult {
    /// The backend cannot report affected counts
    Unknown,
    /// Affected counts reported by the backend
    Counted {
        inserted: u64,
        updated: u64,
        deleted: u64,
    },
}

/// Change notification produced by a watch
#[derive(Debug, Clone, PartialEq)]
pub struct WatchEvent<E> {
    key: Value,
    kind: WatchEventKind,
    new_value: Option<E>,
}

impl<E> WatchEvent<E> {
    pub fn new(key: Value, kind: WatchEventKind, new_value: Option<E>) -> Self {
        Self {
            key,
            kind,
            new_value,
        }
    }

    pub fn key(&self) -> &Value {
        &self.key
    }

    pub fn kind(&self) -> WatchEventKind {
        self.kind
    }

    /// Entity after the change; `None` for deletions
    pub fn new_value(&self) -> Option<&E> {
        self.new_value.as_ref()
    }
}

/// What happened to the watched entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WatchEventKind {
    Created,
    Updated,
    Deleted,
}
