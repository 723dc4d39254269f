//! Backend contract
//!
//! A backend exposes one entry point, [`Backend::execute`], which turns an
//! [`Operation`] into a lazily started stream of replies. Failures never
//! escape `execute` directly; they arrive as the stream's error item.

use crate::entity::EntityError;
use crate::expression::Operator;
use crate::operation::{Operation, WatchEvent, WriteResult};
use futures::stream::BoxStream;
use futures::StreamExt;

/// Item produced by a backend stream
#[derive(Debug, Clone, PartialEq)]
pub enum Reply<E> {
    /// Entity matched by a select
    Entity(E),
    /// Completion of an insert, delete or update
    Write(WriteResult),
    /// Change observed by a watch
    Event(WatchEvent<E>),
}

impl<E> Reply<E> {
    pub fn into_entity(self) -> Option<E> {
        match self {
            Reply::Entity(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_write(self) -> Option<WriteResult> {
        match self {
            Reply::Write(w) => Some(w),
            _ => None,
        }
    }

    pub fn into_event(self) -> Option<WatchEvent<E>> {
        match self {
            Reply::Event(ev) => Some(ev),
            _ => None,
        }
    }
}

/// Stream returned by [`Backend::execute`]
pub type ReplyStream<E> = BoxStream<'static, Result<Reply<E>, BackendError>>;

/// Storage integration able to execute operations
pub trait Backend<E>: Send + Sync {
    /// Short backend name, used in error messages
    fn name(&self) -> &'static str;

    /// Execute an operation. Work starts when the stream is first polled.
    fn execute(&self, operation: Operation<E>) -> ReplyStream<E>;
}

/// Collect the entities of a select stream, stopping at the first error
pub async fn collect_entities<E>(mut stream: ReplyStream<E>) -> Result<Vec<E>, BackendError> {
    let mut entities = Vec::new();
    while let Some(reply) = stream.next().await {
        if let Some(entity) = reply?.into_entity() {
            entities.push(entity);
        }
    }
    Ok(entities)
}

/// Await the single completion signal of a write stream
pub async fn write_result<E>(mut stream: ReplyStream<E>) -> Result<WriteResult, BackendError> {
    let mut result = None;
    while let Some(reply) = stream.next().await {
        if let Some(write) = reply?.into_write() {
            result = Some(write);
        }
    }
    result.ok_or(BackendError::MissingCompletion)
}

/// Backend execution errors
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Operator {operator} is not supported by {backend}")]
    UnsupportedOperator {
        operator: Operator,
        backend: &'static str,
    },

    #[error("Operation {operation} not supported by {backend}")]
    UnsupportedOperation {
        operation: String,
        backend: &'static str,
    },

    #[error("{backend} supports only keyed inserts; entity {entity} declares no identity attribute")]
    MissingIdentity {
        entity: &'static str,
        backend: &'static str,
    },

    #[error("Watch consumer fell behind; buffer of {capacity} events overflowed")]
    Overflow { capacity: usize },

    #[error("Write stream completed without a result")]
    MissingCompletion,

    #[error("Entity conversion failed: {0}")]
    Entity(#[from] EntityError),

    #[error("{backend} native error: {source}")]
    Native {
        backend: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl BackendError {
    /// Wrap a native client failure
    pub fn native(
        backend: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        BackendError::Native {
            backend,
            source: Box::new(source),
        }
    }
}
