//! Backend executing operations against a native region
//!
//! | operation | native calls |
//! |-----------|--------------|
//! | `Select`  | compiled `SELECT *` query |
//! | `Insert`  | `put_all` keyed by the entity identity |
//! | `Delete`  | `clear`, `remove_all` of extracted keys, or a key query followed by `remove_all` |
//! | `Watch`   | continuous query, see [`WatchStream`] |
//!
//! A `Delete` without a filter removes every entry of the region.

use crate::config::RegionConfig;
use crate::native::Region;
use crate::oql::{compile_key_select, compile_select, extract_keys, OqlWithVariables};
use crate::watch::WatchStream;
use criteria_core::entity::{from_value, to_value};
use criteria_core::{
    Backend, BackendError, Delete, Entity, EntityError, Insert, KeyedInsert, Operation, Path,
    Query, Reply, ReplyStream, Select, SlowQueryLogger, Value, Watch, WriteResult,
};
use futures::future::ready;
use futures::stream::{self, StreamExt};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info};

/// Name reported in errors raised by this backend
pub const BACKEND_NAME: &str = "RegionBackend";

/// Backend over one region holding entities of type `E`
pub struct RegionBackend<E> {
    region: Arc<dyn Region>,
    config: RegionConfig,
    slow_queries: SlowQueryLogger,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> RegionBackend<E> {
    pub fn new(region: Arc<dyn Region>) -> Self {
        Self::with_config(region, RegionConfig::default())
    }

    pub fn with_config(region: Arc<dyn Region>, config: RegionConfig) -> Self {
        let slow_queries = config.logging.slow_query_logger();
        Self {
            region,
            config,
            slow_queries,
            _entity: PhantomData,
        }
    }

    /// Share a slow query log with other backends
    pub fn with_slow_query_logger(mut self, slow_queries: SlowQueryLogger) -> Self {
        self.slow_queries = slow_queries;
        self
    }

    pub fn region(&self) -> &Arc<dyn Region> {
        &self.region
    }

    pub fn config(&self) -> &RegionConfig {
        &self.config
    }

    pub fn slow_queries(&self) -> &SlowQueryLogger {
        &self.slow_queries
    }

    fn select(&self, select: Select) -> ReplyStream<E> {
        let region = self.region.clone();
        let slow_queries = self.slow_queries.clone();
        let query = select.query().clone();
        let bind_variables = self.config.bind_variables;

        stream::once(async move {
            select_rows(region.as_ref(), &slow_queries, &query, bind_variables)
        })
        .map(|rows| {
            let items: Vec<Result<Reply<E>, BackendError>> = match rows {
                Ok(rows) => rows
                    .into_iter()
                    .map(|row| {
                        from_value::<E>(row)
                            .map(Reply::Entity)
                            .map_err(BackendError::from)
                    })
                    .collect(),
                Err(e) => vec![Err(e)],
            };
            stream::iter(items)
        })
        .flatten()
        .boxed()
    }

    fn insert(&self, insert: Insert<E>) -> ReplyStream<E> {
        let keyed = match insert.keyed() {
            Ok(keyed) => keyed,
            Err(_) => {
                return stream::once(ready(Err(BackendError::MissingIdentity {
                    entity: E::type_name(),
                    backend: BACKEND_NAME,
                })))
                .boxed()
            }
        };

        let region = self.region.clone();
        stream::once(async move { put_entities(region.as_ref(), keyed) }).boxed()
    }

    fn delete(&self, delete: Delete) -> ReplyStream<E> {
        let region = self.region.clone();
        let slow_queries = self.slow_queries.clone();
        let query = delete.query().clone();
        let bind_variables = self.config.bind_variables;
        let identity = E::identity().map(|identity| identity.path().clone());

        stream::once(async move {
            remove_matching::<E>(
                region.as_ref(),
                &slow_queries,
                &query,
                identity.as_ref(),
                bind_variables,
            )
        })
        .boxed()
    }

    fn watch(&self, watch: Watch) -> ReplyStream<E> {
        // continuous queries are registered with literal text
        match compile_select(self.region.full_path(), watch.query(), false) {
            Ok(oql) => {
                let (oql, _) = oql.into_parts();
                debug!(oql = %oql, "Compiled watch");
                WatchStream::<E>::new(self.region.query_service(), oql, self.config.watch_buffer)
                    .boxed()
            }
            Err(e) => stream::once(ready(Err(e.into_backend_error(BACKEND_NAME)))).boxed(),
        }
    }
}

impl<E: Entity> Backend<E> for RegionBackend<E> {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn execute(&self, operation: Operation<E>) -> ReplyStream<E> {
        debug!(operation = %operation, region = %self.region.full_path(), "Executing operation");
        match operation {
            Operation::Select(select) => self.select(select),
            Operation::Insert(insert) => self.insert(insert),
            Operation::Delete(delete) => self.delete(delete),
            Operation::Watch(watch) => self.watch(watch),
            other @ Operation::Update(_) => stream::once(ready(Err(
                BackendError::UnsupportedOperation {
                    operation: other.kind().to_string(),
                    backend: BACKEND_NAME,
                },
            )))
            .boxed(),
        }
    }
}

impl<E> std::fmt::Debug for RegionBackend<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionBackend")
            .field("region", &self.region.full_path())
            .field("config", &self.config)
            .finish()
    }
}

fn select_rows(
    region: &dyn Region,
    slow_queries: &SlowQueryLogger,
    query: &Query,
    bind_variables: bool,
) -> Result<Vec<Value>, BackendError> {
    let oql = compile_select(region.full_path(), query, bind_variables)
        .map_err(|e| e.into_backend_error(BACKEND_NAME))?;
    debug!(oql = %oql.oql(), variables = oql.variables().len(), "Compiled select");
    run_query(region, slow_queries, &oql)
}

fn put_entities<E: Entity>(
    region: &dyn Region,
    keyed: KeyedInsert<E>,
) -> Result<Reply<E>, BackendError> {
    let entries = keyed
        .into_entries()
        .into_iter()
        .map(|(key, entity)| to_value(&entity).map(|value| (key, value)))
        .collect::<Result<Vec<_>, EntityError>>()?;
    debug!(region = %region.full_path(), count = entries.len(), "Inserting entities");
    region
        .put_all(entries)
        .map_err(|e| BackendError::native(BACKEND_NAME, e))?;
    Ok(Reply::Write(WriteResult::Unknown))
}

/// Remove the entries matching `query`. Filters that only select by
/// `identity` are reduced to their keys without querying the region.
fn remove_matching<E>(
    region: &dyn Region,
    slow_queries: &SlowQueryLogger,
    query: &Query,
    identity: Option<&Path>,
    bind_variables: bool,
) -> Result<Reply<E>, BackendError> {
    let filter = match query.filter() {
        Some(filter) => filter,
        None => {
            info!(region = %region.full_path(), "Delete without filter, clearing region");
            region
                .clear()
                .map_err(|e| BackendError::native(BACKEND_NAME, e))?;
            return Ok(Reply::Write(WriteResult::Unknown));
        }
    };

    let keys = match identity.and_then(|identity| extract_keys(filter, identity)) {
        Some(keys) => {
            debug!(region = %region.full_path(), count = keys.len(), "Deleting by key");
            keys
        }
        None => {
            let oql = compile_key_select(region.full_path(), filter, bind_variables)
                .map_err(|e| e.into_backend_error(BACKEND_NAME))?;
            debug!(oql = %oql.oql(), variables = oql.variables().len(), "Compiled key select");
            run_query(region, slow_queries, &oql)?
        }
    };

    region
        .remove_all(keys)
        .map_err(|e| BackendError::native(BACKEND_NAME, e))?;
    Ok(Reply::Write(WriteResult::Unknown))
}

/// Run a compiled query through the region's query service
fn run_query(
    region: &dyn Region,
    slow_queries: &SlowQueryLogger,
    oql: &OqlWithVariables,
) -> Result<Vec<Value>, BackendError> {
    let tracker = slow_queries.start_query(
        oql.oql(),
        Some(region.full_path().to_string()),
        oql.variables().len(),
    );
    let result = region
        .query_service()
        .execute(oql.oql(), oql.variables())
        .map_err(|e| BackendError::native(BACKEND_NAME, e));
    slow_queries.finish_query(tracker);
    result
}
