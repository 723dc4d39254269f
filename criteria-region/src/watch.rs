//! Continuous query bridge
//!
//! A [`WatchStream`] registers a continuous query on first poll and turns
//! its callbacks into stream items. Callbacks arrive on the region's writer
//! threads; they pass through one mutex-guarded send path into a bounded
//! channel, so the consumer never sees concurrent emissions.
//!
//! The channel never blocks the region. When it is full the watch fails:
//! the continuous query is detached at once, so the region stops running
//! it, and the consumer receives the events already buffered, then
//! [`BackendError::Overflow`].
//!
//! Cancelling (explicitly or by dropping the stream) closes the continuous
//! query before returning. No event is observable after that point.

use crate::backend::BACKEND_NAME;
use crate::native::{CqEvent, CqListener, CqOperation, CqQuery, QueryService, RegionError};
use criteria_core::entity::from_value;
use criteria_core::{BackendError, Entity, Reply, WatchEvent, WatchEventKind};
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

/// Lifecycle of a watch subscription
///
/// `Created -> Active -> {Disposed, Errored}`. Both outcomes are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchState {
    /// Not yet polled; nothing registered
    Created,
    /// Continuous query registered and delivering events
    Active,
    /// Cancelled by the consumer
    Disposed,
    /// Failed by overflow or a native error
    Errored,
}

impl WatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WatchState::Disposed | WatchState::Errored)
    }
}

struct BridgeState<E> {
    state: WatchState,
    sender: Option<mpsc::Sender<WatchEvent<E>>>,
    failure: Option<BackendError>,
    cq: Option<Arc<dyn CqQuery>>,
}

impl<E> BridgeState<E> {
    fn fail(&mut self, error: BackendError) {
        if self.state.is_terminal() {
            return;
        }
        self.state = WatchState::Errored;
        self.failure = Some(error);
        self.sender = None;
        // runs on the region's callback path, so only detach here
        if let Some(cq) = &self.cq {
            cq.detach();
        }
    }
}

/// Shared between the stream, its handles and the registered listener
struct Bridge<E> {
    shared: Mutex<BridgeState<E>>,
    capacity: usize,
}

impl<E: Entity> Bridge<E> {
    fn convert(event: CqEvent) -> Result<WatchEvent<E>, BackendError> {
        let kind = match event.operation {
            CqOperation::Create => WatchEventKind::Created,
            CqOperation::Update => WatchEventKind::Updated,
            CqOperation::Destroy => WatchEventKind::Deleted,
        };
        let new_value = event.new_value.map(from_value::<E>).transpose()?;
        Ok(WatchEvent::new(event.key, kind, new_value))
    }

    /// Dispose and close the continuous query, if one was registered
    fn cancel(&self) {
        let cq = {
            let mut shared = self.shared.lock();
            if !shared.state.is_terminal() {
                shared.state = WatchState::Disposed;
                shared.sender = None;
                info!("Watch disposed");
            }
            shared.cq.take()
        };

        if let Some(cq) = cq {
            if let Err(e) = cq.close() {
                warn!(error = %e, "Failed to close continuous query");
            }
        }
    }
}

impl<E: Entity> CqListener for Bridge<E> {
    fn on_event(&self, event: CqEvent) {
        let mut shared = self.shared.lock();
        if shared.state != WatchState::Active {
            return;
        }

        let event = match Self::convert(event) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Watch event conversion failed");
                shared.fail(e);
                return;
            }
        };

        let sent = match &shared.sender {
            Some(sender) => sender.try_send(event),
            None => return,
        };
        match sent {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(capacity = self.capacity, "Watch consumer fell behind");
                shared.fail(BackendError::Overflow {
                    capacity: self.capacity,
                });
            }
            Err(TrySendError::Closed(_)) => {
                shared.sender = None;
            }
        }
    }

    fn on_error(&self, error: RegionError) {
        warn!(error = %error, "Continuous query failed");
        self.shared
            .lock()
            .fail(BackendError::native(BACKEND_NAME, error));
    }
}

/// Stream of change events for a continuous query
pub struct WatchStream<E: Entity> {
    oql: String,
    query_service: Arc<dyn QueryService>,
    bridge: Arc<Bridge<E>>,
    receiver: ReceiverStream<WatchEvent<E>>,
    finished: bool,
}

impl<E: Entity> WatchStream<E> {
    /// Stream for `oql`, which must not contain bind variables.
    /// Nothing is registered until the stream is polled.
    pub fn new(query_service: Arc<dyn QueryService>, oql: String, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            oql,
            query_service,
            bridge: Arc::new(Bridge {
                shared: Mutex::new(BridgeState {
                    state: WatchState::Created,
                    sender: Some(sender),
                    failure: None,
                    cq: None,
                }),
                capacity,
            }),
            receiver: ReceiverStream::new(receiver),
            finished: false,
        }
    }

    pub fn oql(&self) -> &str {
        &self.oql
    }

    pub fn state(&self) -> WatchState {
        self.bridge.shared.lock().state
    }

    /// Handle able to cancel this watch from another task or thread
    pub fn handle(&self) -> WatchHandle {
        WatchHandle {
            bridge: self.bridge.clone(),
        }
    }

    /// Dispose the watch. The continuous query is closed before this returns.
    pub fn cancel(&mut self) {
        self.bridge.cancel();
        self.finished = true;
    }

    fn register(&mut self) -> Result<(), BackendError> {
        if self.bridge.shared.lock().state != WatchState::Created {
            return Ok(());
        }

        let listener: Arc<dyn CqListener> = self.bridge.clone();
        let cq = self
            .query_service
            .new_cq(&self.oql, listener)
            .map_err(|e| BackendError::native(BACKEND_NAME, e))?;

        {
            let mut shared = self.bridge.shared.lock();
            if shared.state != WatchState::Created {
                drop(shared);
                if let Err(e) = cq.close() {
                    warn!(error = %e, "Failed to close continuous query");
                }
                return Ok(());
            }
            shared.state = WatchState::Active;
            shared.cq = Some(cq.clone());
        }

        if let Err(e) = cq.execute() {
            if self.state() == WatchState::Disposed {
                return Ok(());
            }
            return Err(BackendError::native(BACKEND_NAME, e));
        }

        info!(query = %self.oql, "Watch registered");
        Ok(())
    }

    /// Terminal item once the channel is drained
    fn finish(&mut self) -> Option<BackendError> {
        self.finished = true;
        let (failure, cq) = {
            let mut shared = self.bridge.shared.lock();
            (shared.failure.take(), shared.cq.take())
        };
        if let Some(cq) = cq {
            if let Err(e) = cq.close() {
                warn!(error = %e, "Failed to close continuous query");
            }
            debug!(query = %self.oql, "Watch finished");
        }
        failure
    }
}

impl<E: Entity> Stream for WatchStream<E> {
    type Item = Result<Reply<E>, BackendError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        if let Err(e) = this.register() {
            this.bridge.shared.lock().fail(e);
            return Poll::Ready(this.finish().map(Err));
        }

        match this.receiver.poll_next_unpin(cx) {
            Poll::Ready(Some(event)) => {
                if this.state() == WatchState::Disposed {
                    this.finished = true;
                    return Poll::Ready(None);
                }
                Poll::Ready(Some(Ok(Reply::Event(event))))
            }
            Poll::Ready(None) => Poll::Ready(this.finish().map(Err)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<E: Entity> Drop for WatchStream<E> {
    fn drop(&mut self) {
        self.bridge.cancel();
    }
}

impl<E: Entity> std::fmt::Debug for WatchStream<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchStream")
            .field("oql", &self.oql)
            .field("state", &self.state())
            .finish()
    }
}

/// Cancellation handle of a [`WatchStream`]
#[derive(Clone)]
pub struct WatchHandle {
    bridge: Arc<dyn Disposable>,
}

trait Disposable: Send + Sync {
    fn dispose(&self);
    fn state(&self) -> WatchState;
}

impl<E: Entity> Disposable for Bridge<E> {
    fn dispose(&self) {
        self.cancel()
    }

    fn state(&self) -> WatchState {
        self.shared.lock().state
    }
}

impl WatchHandle {
    /// Dispose the watch. The continuous query is closed before this returns.
    pub fn cancel(&self) {
        self.bridge.dispose();
    }

    pub fn state(&self) -> WatchState {
        self.bridge.state()
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRegion;
    use crate::native::Region;
    use criteria_core::entity::to_value;
    use criteria_core::Value;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_pending, assert_ready, task};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Reading {
        sensor: String,
        level: i32,
    }

    impl Entity for Reading {}

    fn put(region: &MemoryRegion, sensor: &str, level: i32) {
        let reading = Reading {
            sensor: sensor.to_string(),
            level,
        };
        region
            .put_all(vec![(Value::from(sensor), to_value(&reading).unwrap())])
            .unwrap();
    }

    fn high_levels(region: &MemoryRegion, capacity: usize) -> WatchStream<Reading> {
        WatchStream::new(
            region.query_service(),
            "SELECT * FROM /readings WHERE level > 10".to_string(),
            capacity,
        )
    }

    #[test]
    fn test_event_wakes_consumer() {
        let region = MemoryRegion::new("readings");
        let watch = high_levels(&region, 8);
        let handle = watch.handle();
        let mut watch = task::spawn(watch);

        assert_pending!(watch.poll_next());
        assert_eq!(handle.state(), WatchState::Active);

        put(&region, "s1", 5);
        assert!(!watch.is_woken());

        put(&region, "s1", 50);
        assert!(watch.is_woken());
        let event = assert_ready!(watch.poll_next())
            .unwrap()
            .unwrap()
            .into_event()
            .unwrap();
        assert_eq!(event.kind(), WatchEventKind::Created);
        assert_eq!(event.new_value().map(|r| r.level), Some(50));
        assert_pending!(watch.poll_next());
    }

    #[test]
    fn test_overflow_wakes_consumer_with_error() {
        let region = MemoryRegion::new("readings");
        let watch = high_levels(&region, 1);
        let handle = watch.handle();
        let mut watch = task::spawn(watch);
        assert_pending!(watch.poll_next());

        put(&region, "s1", 20);
        put(&region, "s2", 30);
        assert_eq!(handle.state(), WatchState::Errored);

        assert!(assert_ready!(watch.poll_next()).unwrap().is_ok());
        let err = assert_ready!(watch.poll_next()).unwrap().unwrap_err();
        assert!(matches!(err, BackendError::Overflow { capacity: 1 }));
        assert!(assert_ready!(watch.poll_next()).is_none());
        assert_eq!(region.running_cqs(), 0);
    }

    #[test]
    fn test_overflow_releases_query_without_consumer() {
        let region = MemoryRegion::new("readings");
        let watch = high_levels(&region, 1);
        let handle = watch.handle();
        let mut watch = task::spawn(watch);
        assert_pending!(watch.poll_next());

        for sensor in ["s1", "s2", "s3"] {
            put(&region, sensor, 20);
        }
        assert_eq!(handle.state(), WatchState::Errored);
        assert_eq!(region.running_cqs(), 0);

        for i in 0..100 {
            put(&region, &format!("late{i}"), 20);
        }
        assert_eq!(region.running_cqs(), 0);

        assert!(assert_ready!(watch.poll_next()).unwrap().is_ok());
        let err = assert_ready!(watch.poll_next()).unwrap().unwrap_err();
        assert!(matches!(err, BackendError::Overflow { capacity: 1 }));
    }

    /// Continuous query whose close always fails
    #[derive(Default)]
    struct StuckCq {
        close_attempts: AtomicUsize,
    }

    impl CqQuery for StuckCq {
        fn execute(&self) -> Result<(), RegionError> {
            Ok(())
        }

        fn close(&self) -> Result<(), RegionError> {
            self.close_attempts.fetch_add(1, Ordering::SeqCst);
            Err(RegionError::Other("region offline".to_string()))
        }

        fn detach(&self) {}

        fn is_closed(&self) -> bool {
            false
        }
    }

    /// Cancels the watch while its continuous query is being created
    struct CancellingService {
        handle: Mutex<Option<WatchHandle>>,
        cq: Arc<StuckCq>,
    }

    impl QueryService for CancellingService {
        fn execute(&self, _oql: &str, _params: &[Value]) -> Result<Vec<Value>, RegionError> {
            Ok(Vec::new())
        }

        fn new_cq(
            &self,
            _oql: &str,
            _listener: Arc<dyn CqListener>,
        ) -> Result<Arc<dyn CqQuery>, RegionError> {
            if let Some(handle) = self.handle.lock().take() {
                handle.cancel();
            }
            Ok(self.cq.clone())
        }
    }

    #[test]
    fn test_close_failure_after_late_cancel_ends_quietly() {
        let cq = Arc::new(StuckCq::default());
        let service = Arc::new(CancellingService {
            handle: Mutex::new(None),
            cq: cq.clone(),
        });
        let watch: WatchStream<Reading> = WatchStream::new(
            service.clone(),
            "SELECT * FROM /readings".to_string(),
            4,
        );
        *service.handle.lock() = Some(watch.handle());
        let mut watch = task::spawn(watch);

        assert!(assert_ready!(watch.poll_next()).is_none());
        assert_eq!(cq.close_attempts.load(Ordering::SeqCst), 1);
        assert_eq!(watch.state(), WatchState::Disposed);
    }

    #[test]
    fn test_state_is_terminal_after_cancel() {
        let region = MemoryRegion::new("readings");
        let mut watch = high_levels(&region, 8);
        let handle = watch.handle();

        watch.cancel();
        assert!(handle.state().is_terminal());

        // a late native error does not move a disposed watch to errored
        watch
            .bridge
            .on_error(RegionError::Other("late".to_string()));
        assert_eq!(handle.state(), WatchState::Disposed);
    }

    #[test]
    fn test_undecodable_event_fails_watch() {
        let region = MemoryRegion::new("readings");
        let watch = high_levels(&region, 8);
        let mut watch = task::spawn(watch);
        assert_pending!(watch.poll_next());

        let mut fields = std::collections::BTreeMap::new();
        fields.insert("level".to_string(), Value::Int64(99));
        region
            .put_all(vec![(Value::from("bad"), Value::Object(fields))])
            .unwrap();

        let err = assert_ready!(watch.poll_next()).unwrap().unwrap_err();
        assert!(matches!(err, BackendError::Entity(_)));
        assert_eq!(region.running_cqs(), 0);
    }
}
