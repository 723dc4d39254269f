//! Criteria Core - typed criteria expressions and the backend protocol
//!
//! This crate provides the backend-agnostic building blocks:
//! - Value model and expression AST with its operator catalog
//! - Typed matcher DSL producing filter expressions
//! - Query value object (filter, ordering, pagination)
//! - Operation protocol and the backend contract
//! - Structured logging setup

pub mod backend;
pub mod entity;
pub mod expression;
pub mod logging;
pub mod matcher;
pub mod operation;
pub mod query;
pub mod value;

pub use backend::{collect_entities, write_result, Backend, BackendError, Reply, ReplyStream};
pub use entity::{Entity, EntityError, Identity};
pub use expression::{Arity, Call, Constant, Expression, ExpressionError, Operator, Path};
pub use logging::{init_logging, LoggingConfig, SlowQuery, SlowQueryLogger, SlowQueryStats};
pub use matcher::{
    BooleanCriteria, BooleanMatcher, ComparableCriteria, ComparableMatcher, Criteria,
    CriteriaContext, CriteriaCreator, CriteriaError, CriteriaState, Matcher, ObjectCriteria,
    ObjectMatcher, OptionalCriteria, OptionalMatcher, StringCriteria, StringMatcher,
};
pub use operation::{
    Delete, Insert, KeyedInsert, Operation, Select, Update, Watch, WatchEvent, WatchEventKind,
    WriteResult,
};
pub use query::{Collation, Direction, Query};
pub use value::Value;
