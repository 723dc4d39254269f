//! Criteria Region - region backend for criteria queries
//!
//! This crate runs criteria [`Operation`](criteria_core::Operation)s against
//! key/value regions:
//! - OQL compiler with bind variables and key extraction
//! - [`RegionBackend`] executing select, insert, delete and watch
//! - Continuous query bridge with bounded buffering
//! - [`MemoryRegion`], a native region kept in process memory

pub mod backend;
pub mod config;
pub mod memory;
pub mod native;
pub mod oql;
pub mod watch;

pub use backend::{RegionBackend, BACKEND_NAME};
pub use config::RegionConfig;
pub use memory::{MemoryRegion, OqlParseError, OqlParser};
pub use native::{CqEvent, CqListener, CqOperation, CqQuery, QueryService, Region, RegionError};
pub use oql::keys::extract_keys;
pub use oql::{compile_key_select, compile_select, OqlError, OqlWithVariables, QueryVisitor};
pub use watch::{WatchHandle, WatchState, WatchStream};
