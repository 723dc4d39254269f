//! Entity capability and identity declaration
//!
//! Entities are plain serde types. The identity declaration marks one
//! attribute as the key; backends that store entities by key require it.

use crate::expression::Path;
use crate::value::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// Domain type that can be stored in and loaded from a backend
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Type name used in error messages
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }

    /// The attribute declared as this entity's key, if any
    fn identity() -> Option<Identity<Self>> {
        None
    }
}

/// Identity attribute of an entity: its path and a key extractor
pub struct Identity<E> {
    path: Path,
    extract: fn(&E) -> Value,
}

impl<E> Identity<E> {
    pub fn new(path: Path, extract: fn(&E) -> Value) -> Self {
        Self { path, extract }
    }

    /// Path of the key attribute
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Key of an entity
    pub fn key(&self, entity: &E) -> Value {
        (self.extract)(entity)
    }
}

impl<E> Clone for Identity<E> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            extract: self.extract,
        }
    }
}

impl<E> fmt::Debug for Identity<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity").field("path", &self.path).finish()
    }
}

/// Convert an entity to its object form
pub fn to_value<E: Serialize>(entity: &E) -> Result<Value, EntityError> {
    serde_json::to_value(entity)
        .map(Value::from)
        .map_err(|e| EntityError::Serialization(e.to_string()))
}

/// Rebuild an entity from its object form
pub fn from_value<E: DeserializeOwned>(value: Value) -> Result<E, EntityError> {
    serde_json::from_value(serde_json::Value::from(value))
        .map_err(|e| EntityError::Deserialization(e.to_string()))
}

/// Entity conversion errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntityError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}
