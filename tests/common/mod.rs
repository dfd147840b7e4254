//! Shared test fixtures: an in-memory backend behind `RecordClient`.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

use record_mirror::{
    apply_update, parse_diff, BatchOperation, EventHandler, MirrorError, Record, RecordClient,
    RecordEvent, RecordId, RecordMap, RecordUpdate, RecordsDiff, RemoteSubscription,
    RequestOptions, Result, Topic,
};

// ============================================================================
// Mock backend
// ============================================================================

struct PendingWrite {
    operations: Vec<BatchOperation>,
    reply: oneshot::Sender<Result<()>>,
}

#[derive(Default)]
struct MockState {
    /// Server-side records.
    records: Mutex<RecordMap>,
    /// Open subscriptions by id.
    handlers: Mutex<HashMap<usize, (Topic, EventHandler)>>,
    next_subscription: AtomicUsize,

    /// Hold writes until `settle` is called.
    gated: bool,
    /// Gated writes by call order.
    pending: Mutex<HashMap<usize, PendingWrite>>,
    next_write: AtomicUsize,

    /// Every batch received, in call order.
    writes: Mutex<Vec<Vec<BatchOperation>>>,
    /// Options seen by each request kind.
    seen_options: Mutex<Vec<(&'static str, RequestOptions)>>,

    subscribe_calls: AtomicUsize,
    unsubscribe_calls: AtomicUsize,
    fetch_calls: AtomicUsize,

    subscribe_error: Mutex<Option<MirrorError>>,
    fetch_error: Mutex<Option<MirrorError>>,
    write_error: Mutex<Option<MirrorError>>,
}

/// In-memory stand-in for a remote record service.
///
/// Successful writes are applied server-side and echoed to subscribers as
/// create/update/delete events, like a realtime backend would.
#[derive(Clone, Default)]
pub struct MockClient {
    state: Arc<MockState>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// A client whose writes wait for an explicit [`settle`](MockClient::settle).
    pub fn gated() -> Self {
        Self {
            state: Arc::new(MockState {
                gated: true,
                ..Default::default()
            }),
        }
    }

    pub fn shared(&self) -> Arc<dyn RecordClient> {
        Arc::new(self.clone())
    }

    // --- Server-side state ---

    pub fn seed(&self, records: impl IntoIterator<Item = Record>) {
        let mut server = self.state.records.lock();
        for record in records {
            server.insert(record.id.clone(), record);
        }
    }

    pub fn server_records(&self) -> RecordMap {
        self.state.records.lock().clone()
    }

    /// Push an event to every subscriber of a matching topic, as if another
    /// client had written.
    pub fn push_event(&self, event: RecordEvent) {
        let handlers: Vec<EventHandler> = self
            .state
            .handlers
            .lock()
            .values()
            .filter(|(topic, _)| topic.contains(&event.record.id))
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in handlers {
            handler(event.clone());
        }
    }

    // --- Failure injection ---

    pub fn fail_subscribe(&self, error: Option<MirrorError>) {
        *self.state.subscribe_error.lock() = error;
    }

    pub fn fail_fetch(&self, error: Option<MirrorError>) {
        *self.state.fetch_error.lock() = error;
    }

    pub fn fail_writes(&self, error: Option<MirrorError>) {
        *self.state.write_error.lock() = error;
    }

    // --- Gated writes ---

    pub fn pending_writes(&self) -> usize {
        self.state.pending.lock().len()
    }

    /// Wait until at least `count` writes are parked.
    pub async fn wait_for_pending(&self, count: usize) {
        while self.pending_writes() < count {
            tokio::task::yield_now().await;
        }
    }

    /// Settle the `index`-th write (0-based, call order). A successful write
    /// is applied server-side and echoed to subscribers before it resolves.
    pub fn settle(&self, index: usize, result: Result<()>) {
        let pending = self
            .state
            .pending
            .lock()
            .remove(&index)
            .unwrap_or_else(|| panic!("no pending write #{index}"));
        if result.is_ok() {
            self.apply_writes(&pending.operations);
        }
        let _ = pending.reply.send(result);
    }

    // --- Observations ---

    pub fn writes(&self) -> Vec<Vec<BatchOperation>> {
        self.state.writes.lock().clone()
    }

    pub fn seen_options(&self, kind: &str) -> Vec<RequestOptions> {
        self.state
            .seen_options
            .lock()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, o)| o.clone())
            .collect()
    }

    pub fn subscribe_calls(&self) -> usize {
        self.state.subscribe_calls.load(Ordering::SeqCst)
    }

    pub fn unsubscribe_calls(&self) -> usize {
        self.state.unsubscribe_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.state.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn open_subscriptions(&self) -> usize {
        self.state.handlers.lock().len()
    }

    fn apply_writes(&self, operations: &[BatchOperation]) {
        let mut events = Vec::new();
        {
            let mut server = self.state.records.lock();
            for op in operations {
                match op {
                    BatchOperation::Upsert { id, fields } => {
                        let existed = server.contains_key(id);
                        let record = apply_update(server.get(id), id, fields);
                        server.insert(id.clone(), record.clone());
                        events.push(if existed {
                            RecordEvent::update(record)
                        } else {
                            RecordEvent::create(record)
                        });
                    }
                    BatchOperation::Delete { id } => {
                        if let Some(record) = server.remove(id) {
                            events.push(RecordEvent::delete(record));
                        }
                    }
                }
            }
        }
        for event in events {
            self.push_event(event);
        }
    }
}

struct MockSubscription {
    state: Arc<MockState>,
    id: usize,
}

#[async_trait]
impl RemoteSubscription for MockSubscription {
    async fn unsubscribe(self: Box<Self>) -> Result<()> {
        self.state.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.state.handlers.lock().remove(&self.id);
        Ok(())
    }
}

#[async_trait]
impl RecordClient for MockClient {
    async fn subscribe(
        &self,
        topic: &Topic,
        handler: EventHandler,
        options: &RequestOptions,
    ) -> Result<Box<dyn RemoteSubscription>> {
        self.state.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.state
            .seen_options
            .lock()
            .push(("subscribe", options.clone()));
        // Handshake is a suspension point.
        tokio::task::yield_now().await;

        if let Some(error) = self.state.subscribe_error.lock().clone() {
            return Err(error);
        }

        let id = self.state.next_subscription.fetch_add(1, Ordering::SeqCst);
        self.state
            .handlers
            .lock()
            .insert(id, (topic.clone(), handler));
        Ok(Box::new(MockSubscription {
            state: Arc::clone(&self.state),
            id,
        }))
    }

    async fn fetch_list(&self, options: &RequestOptions) -> Result<Vec<Record>> {
        self.state.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.state.seen_options.lock().push(("fetch", options.clone()));
        if let Some(error) = self.state.fetch_error.lock().clone() {
            return Err(error);
        }
        Ok(self.state.records.lock().values().cloned().collect())
    }

    async fn fetch_one(&self, id: &RecordId, options: &RequestOptions) -> Result<Record> {
        self.state.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.state.seen_options.lock().push(("fetch", options.clone()));
        if let Some(error) = self.state.fetch_error.lock().clone() {
            return Err(error);
        }
        self.state
            .records
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| MirrorError::RecordNotFound(id.clone()))
    }

    async fn batch_write(
        &self,
        operations: Vec<BatchOperation>,
        options: &RequestOptions,
    ) -> Result<()> {
        self.state.writes.lock().push(operations.clone());
        self.state.seen_options.lock().push(("write", options.clone()));

        if self.state.gated {
            let (reply, wait) = oneshot::channel();
            let index = self.state.next_write.fetch_add(1, Ordering::SeqCst);
            self.state
                .pending
                .lock()
                .insert(index, PendingWrite { operations, reply });
            return wait
                .await
                .unwrap_or_else(|_| Err(MirrorError::request(0, "write abandoned")));
        }

        tokio::task::yield_now().await;
        if let Some(error) = self.state.write_error.lock().clone() {
            return Err(error);
        }
        self.apply_writes(&operations);
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub fn fields(value: Value) -> RecordUpdate {
    match value {
        Value::Object(obj) => obj,
        other => panic!("expected object, got {other}"),
    }
}

pub fn diff(value: Value) -> RecordsDiff {
    parse_diff(value).unwrap()
}

pub fn task(id: &str, text: &str) -> Record {
    Record::new(id).with_field("text", Value::String(text.to_string()))
}

pub fn text_of(view: &RecordMap, id: &str) -> Option<String> {
    view.get(&RecordId::new(id))
        .and_then(|r| r.get("text"))
        .and_then(Value::as_str)
        .map(String::from)
}

/// Collects everything routed to an error handler.
#[derive(Clone, Default)]
pub struct ErrorSink {
    errors: Arc<Mutex<Vec<MirrorError>>>,
}

impl ErrorSink {
    pub fn handler(&self) -> impl Fn(&MirrorError) + Send + Sync + 'static {
        let errors = Arc::clone(&self.errors);
        move |error: &MirrorError| errors.lock().push(error.clone())
    }

    pub fn errors(&self) -> Vec<MirrorError> {
        self.errors.lock().clone()
    }
}

/// Give spawned tasks (teardowns, drop-time unsubscribes) a chance to run
/// on the current-thread test runtime.
pub async fn run_pending_tasks() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
