//! In-memory region
//!
//! A complete native region kept in an ordered map: it executes the OQL the
//! compiler produces and delivers continuous query events. Used by tests and
//! by embedders that want the region backend without an external cache.
//!
//! Continuous query listeners run on the writing thread while the write is
//! still in progress, so they must not call back into the region. The one
//! exception is [`CqQuery::detach`]; the detached query is released once the
//! write completes.

pub mod filter;
pub mod parser;

pub use filter::Filter;
pub use parser::{OqlParseError, OqlParser, ParsedQuery, Projection, SortKey};

use crate::native::{CqEvent, CqListener, CqOperation, CqQuery, QueryService, Region, RegionError};
use criteria_core::Value;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Region held in process memory
#[derive(Clone)]
pub struct MemoryRegion {
    inner: Arc<Inner>,
}

struct Inner {
    path: String,
    entries: RwLock<BTreeMap<Value, Value>>,
    cqs: Arc<CqRegistry>,
    next_cq_id: AtomicU64,
    queries_executed: AtomicU64,
}

/// Running continuous queries by id
struct CqRegistry {
    running: RwLock<BTreeMap<u64, Arc<CqRegistration>>>,
    /// A query detached itself and waits to be removed
    detached: AtomicBool,
}

impl CqRegistry {
    /// Remove detached queries. Must be called without the registry locked.
    fn sweep(&self) {
        if !self.detached.swap(false, AtomicOrdering::SeqCst) {
            return;
        }
        self.running.write().retain(|id, registration| {
            let closed = registration.is_closed();
            if closed {
                debug!(cq = id, "Detached continuous query released");
            }
            !closed
        });
    }
}

struct CqRegistration {
    filter: Filter,
    listener: Arc<dyn CqListener>,
    closed: AtomicBool,
}

impl CqRegistration {
    fn is_closed(&self) -> bool {
        self.closed.load(AtomicOrdering::SeqCst)
    }
}

impl MemoryRegion {
    /// Create an empty region; `name` may be given with or without the
    /// leading `/`
    pub fn new(name: &str) -> Self {
        Self {
            inner: Arc::new(Inner {
                path: format!("/{}", name.trim_start_matches('/')),
                entries: RwLock::new(BTreeMap::new()),
                cqs: Arc::new(CqRegistry {
                    running: RwLock::new(BTreeMap::new()),
                    detached: AtomicBool::new(false),
                }),
                next_cq_id: AtomicU64::new(1),
                queries_executed: AtomicU64::new(0),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.read().is_empty()
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        self.inner
            .entries
            .read()
            .get(&key.clone().normalized_key())
            .cloned()
    }

    pub fn keys(&self) -> Vec<Value> {
        self.inner.entries.read().keys().cloned().collect()
    }

    /// Number of OQL queries run through the query service
    pub fn queries_executed(&self) -> u64 {
        self.inner.queries_executed.load(AtomicOrdering::SeqCst)
    }

    /// Number of continuous queries currently receiving events
    pub fn running_cqs(&self) -> usize {
        self.inner
            .cqs
            .running
            .read()
            .values()
            .filter(|registration| !registration.is_closed())
            .count()
    }
}

impl std::fmt::Debug for MemoryRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRegion")
            .field("path", &self.inner.path)
            .field("entries", &self.len())
            .field("running_cqs", &self.running_cqs())
            .finish()
    }
}

impl Inner {
    /// Deliver the change of one entry to every running continuous query.
    /// Called with the entry map write-locked.
    fn notify(
        cqs: &BTreeMap<u64, Arc<CqRegistration>>,
        key: &Value,
        old: Option<&Value>,
        new: Option<&Value>,
    ) {
        for registration in cqs.values() {
            if registration.is_closed() {
                continue;
            }
            let was = old.map_or(false, |v| registration.filter.matches(v));
            let is = new.map_or(false, |v| registration.filter.matches(v));
            let operation = match (was, is) {
                (false, true) => CqOperation::Create,
                (true, true) => CqOperation::Update,
                (true, false) => CqOperation::Destroy,
                (false, false) => continue,
            };
            registration.listener.on_event(CqEvent {
                key: key.clone(),
                operation,
                new_value: if is { new.cloned() } else { None },
            });
        }
    }

    fn check_region(&self, requested: &str) -> Result<(), RegionError> {
        if requested != self.path {
            return Err(RegionError::WrongRegion {
                requested: requested.to_string(),
                region: self.path.clone(),
            });
        }
        Ok(())
    }
}

impl Region for MemoryRegion {
    fn full_path(&self) -> &str {
        &self.inner.path
    }

    fn put_all(&self, entries: Vec<(Value, Value)>) -> Result<(), RegionError> {
        {
            let mut stored = self.inner.entries.write();
            let cqs = self.inner.cqs.running.read();
            for (key, value) in entries {
                let key = key.normalized_key();
                let old = stored.insert(key.clone(), value.clone());
                Inner::notify(&cqs, &key, old.as_ref(), Some(&value));
            }
            trace!(region = %self.inner.path, size = stored.len(), "put_all");
        }
        self.inner.cqs.sweep();
        Ok(())
    }

    fn remove_all(&self, keys: Vec<Value>) -> Result<(), RegionError> {
        {
            let mut stored = self.inner.entries.write();
            let cqs = self.inner.cqs.running.read();
            for key in keys {
                let key = key.normalized_key();
                if let Some(old) = stored.remove(&key) {
                    Inner::notify(&cqs, &key, Some(&old), None);
                }
            }
            trace!(region = %self.inner.path, size = stored.len(), "remove_all");
        }
        self.inner.cqs.sweep();
        Ok(())
    }

    fn clear(&self) -> Result<(), RegionError> {
        {
            let mut stored = self.inner.entries.write();
            let cqs = self.inner.cqs.running.read();
            let removed = std::mem::take(&mut *stored);
            for (key, old) in &removed {
                Inner::notify(&cqs, key, Some(old), None);
            }
            debug!(region = %self.inner.path, removed = removed.len(), "Region cleared");
        }
        self.inner.cqs.sweep();
        Ok(())
    }

    fn query_service(&self) -> Arc<dyn QueryService> {
        self.inner.clone()
    }
}

impl QueryService for Inner {
    fn execute(&self, oql: &str, params: &[Value]) -> Result<Vec<Value>, RegionError> {
        self.queries_executed.fetch_add(1, AtomicOrdering::SeqCst);

        let parsed = OqlParser::parse(oql, params)?;
        self.check_region(&parsed.region)?;

        let entries = self.entries.read();
        let matching = entries
            .iter()
            .filter(|(_, value)| parsed.filter.matches(value));

        let mut rows: Vec<&Value> = match parsed.projection {
            Projection::All => matching.map(|(_, value)| value).collect(),
            Projection::Keys => matching.map(|(key, _)| key).collect(),
        };

        if !parsed.order_by.is_empty() {
            rows.sort_by(|a, b| {
                for key in &parsed.order_by {
                    let ordering = filter::compare_for_sort(
                        filter::lookup(a, &key.field),
                        filter::lookup(b, &key.field),
                    );
                    let ordering = if key.descending {
                        ordering.reverse()
                    } else {
                        ordering
                    };
                    if ordering != std::cmp::Ordering::Equal {
                        return ordering;
                    }
                }
                std::cmp::Ordering::Equal
            });
        }

        let offset = parsed.offset.unwrap_or(0) as usize;
        let limit = parsed.limit.map_or(usize::MAX, |limit| limit as usize);

        Ok(rows.into_iter().skip(offset).take(limit).cloned().collect())
    }

    fn new_cq(
        &self,
        oql: &str,
        listener: Arc<dyn CqListener>,
    ) -> Result<Arc<dyn CqQuery>, RegionError> {
        let parsed = OqlParser::parse(oql, &[])?;
        self.check_region(&parsed.region)?;
        if parsed.projection != Projection::All {
            return Err(RegionError::Other(
                "continuous queries must select whole entries".to_string(),
            ));
        }

        let id = self.next_cq_id.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(Arc::new(MemoryCq {
            id,
            name: oql.to_string(),
            registry: self.cqs.clone(),
            registration: Arc::new(CqRegistration {
                filter: parsed.filter,
                listener,
                closed: AtomicBool::new(false),
            }),
        }))
    }
}

/// Continuous query over a [`MemoryRegion`]
struct MemoryCq {
    id: u64,
    name: String,
    registry: Arc<CqRegistry>,
    registration: Arc<CqRegistration>,
}

impl CqQuery for MemoryCq {
    fn execute(&self) -> Result<(), RegionError> {
        let mut cqs = self.registry.running.write();
        // checked under the registry lock so a concurrent close wins
        if self.registration.is_closed() {
            return Err(RegionError::CqClosed(self.name.clone()));
        }
        cqs.insert(self.id, self.registration.clone());
        debug!(cq = self.id, query = %self.name, "Continuous query running");
        Ok(())
    }

    fn close(&self) -> Result<(), RegionError> {
        // the write lock waits for callbacks in flight on writer threads
        let mut cqs = self.registry.running.write();
        self.registration.closed.store(true, AtomicOrdering::SeqCst);
        if cqs.remove(&self.id).is_some() {
            debug!(cq = self.id, "Continuous query closed");
        }
        Ok(())
    }

    fn detach(&self) {
        if !self.registration.closed.swap(true, AtomicOrdering::SeqCst) {
            self.registry.detached.store(true, AtomicOrdering::SeqCst);
            debug!(cq = self.id, "Continuous query detached");
        }
    }

    fn is_closed(&self) -> bool {
        self.registration.is_closed()
    }
}
