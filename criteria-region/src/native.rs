//! Native region client interface
//!
//! The backend talks to a region only through these traits. Values crossing
//! the boundary are [`Value`]s: keys as stored, entities in object form.
//! Calls are synchronous and may block the calling thread.

use crate::memory::OqlParseError;
use criteria_core::Value;
use std::sync::Arc;

/// Key/value region addressed by a full path such as `/people`
pub trait Region: Send + Sync {
    /// Full path used in `FROM` clauses
    fn full_path(&self) -> &str;

    /// Store entries, replacing existing values under the same keys
    fn put_all(&self, entries: Vec<(Value, Value)>) -> Result<(), RegionError>;

    /// Remove entries by key; unknown keys are ignored
    fn remove_all(&self, keys: Vec<Value>) -> Result<(), RegionError>;

    /// Remove every entry
    fn clear(&self) -> Result<(), RegionError>;

    /// Query service of the cache this region belongs to
    fn query_service(&self) -> Arc<dyn QueryService>;
}

/// OQL execution and continuous query registration
pub trait QueryService: Send + Sync {
    /// Run a query, binding `params` to the `$1..$n` placeholders
    fn execute(&self, oql: &str, params: &[Value]) -> Result<Vec<Value>, RegionError>;

    /// Create a continuous query. Nothing is delivered until
    /// [`CqQuery::execute`] is called.
    fn new_cq(
        &self,
        oql: &str,
        listener: Arc<dyn CqListener>,
    ) -> Result<Arc<dyn CqQuery>, RegionError>;
}

/// Handle of a registered continuous query
pub trait CqQuery: Send + Sync {
    /// Start delivering events to the listener
    fn execute(&self) -> Result<(), RegionError>;

    /// Stop delivering events. Once this returns no listener callback for
    /// this query is running or will run.
    fn close(&self) -> Result<(), RegionError>;

    /// Stop delivering events without waiting for callbacks in flight.
    /// Safe to call from inside a listener callback; the region releases the
    /// registration afterwards. [`close`](Self::close) may still follow.
    fn detach(&self);

    fn is_closed(&self) -> bool;
}

/// Receiver of continuous query callbacks, invoked on the region's threads
pub trait CqListener: Send + Sync {
    fn on_event(&self, event: CqEvent);

    fn on_error(&self, error: RegionError);
}

/// Change of an entry relative to a continuous query's result set
#[derive(Debug, Clone, PartialEq)]
pub struct CqEvent {
    pub key: Value,
    pub operation: CqOperation,
    /// Value after the change; `None` when the entry left the result set
    pub new_value: Option<Value>,
}

/// Kind of result set change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CqOperation {
    /// Entry entered the result set
    Create,
    /// Entry changed and still matches
    Update,
    /// Entry was removed or no longer matches
    Destroy,
}

/// Native region errors
#[derive(Debug, thiserror::Error)]
pub enum RegionError {
    #[error("Query parse error: {0}")]
    Parse(#[from] OqlParseError),

    #[error("Query targets {requested}, region is {region}")]
    WrongRegion { requested: String, region: String },

    #[error("Continuous query {0} is closed")]
    CqClosed(String),

    #[error("Region error: {0}")]
    Other(String),
}
