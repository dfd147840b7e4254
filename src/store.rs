//! The record store: a live mirror of one topic plus its optimistic overlays.

use crate::client::{EventHandler, RecordAction, RecordClient, RecordEvent, RemoteSubscription};
use crate::error::{log_error_handler, ErrorHandler, MirrorError};
use crate::state::{OverlayStack, OverlayToken, Override};
use crate::subscriptions::{ChangeEvent, ObserverConfig, ObserverHandle, ObserverId, ObserverRegistry};
use crate::types::{Record, RecordId, RecordMap, RequestOptions, Topic};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Store configuration.
#[derive(Clone)]
pub struct StoreConfig {
    /// Refetch the full topic every time the subscription opens.
    /// Default: true
    pub auto_refetch: bool,

    /// Receives errors from requests that were given no handler of their own.
    /// Default: log with `tracing::error!`.
    pub on_error: ErrorHandler,

    /// Options for the automatic refetch.
    pub request_options: RequestOptions,

    /// Options for the subscription request.
    pub subscribe_options: RequestOptions,

    /// Buffer settings for observers.
    pub observer: ObserverConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            auto_refetch: true,
            on_error: log_error_handler(),
            request_options: RequestOptions::default(),
            subscribe_options: RequestOptions::default(),
            observer: ObserverConfig::default(),
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("auto_refetch", &self.auto_refetch)
            .field("request_options", &self.request_options)
            .field("subscribe_options", &self.subscribe_options)
            .field("observer", &self.observer)
            .finish_non_exhaustive()
    }
}

/// Per-call configuration for `refetch`.
#[derive(Clone, Default)]
pub struct RequestConfig {
    /// Passed through to the client.
    pub options: RequestOptions,

    /// Overrides the store's error handler for this call.
    pub on_error: Option<ErrorHandler>,
}

impl RequestConfig {
    pub fn with_options(options: RequestOptions) -> Self {
        Self {
            options,
            on_error: None,
        }
    }

    pub fn on_error(mut self, handler: impl Fn(&MirrorError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(handler));
        self
    }
}

/// How a remote request settled.
///
/// Failures have already been handed to the error handler by the time this
/// is returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Settlement {
    Committed,
    Rejected,
}

impl Settlement {
    pub fn is_committed(self) -> bool {
        self == Settlement::Committed
    }
}

/// State shared between the store and its subscription handler.
pub(crate) struct Shared {
    topic: Topic,
    /// Last server-confirmed records.
    mirror: Mutex<RecordMap>,
    /// In-flight optimistic overrides.
    overlays: Mutex<OverlayStack>,
    observers: ObserverRegistry,
    /// Open subscription, if any. Also serializes activation.
    subscription: tokio::sync::Mutex<Option<Box<dyn RemoteSubscription>>>,
    active: AtomicBool,
    /// Set when the registry pruned its last observer on its own.
    teardown_pending: AtomicBool,
    this: Weak<Shared>,
}

impl Shared {
    fn new(topic: Topic) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            topic,
            mirror: Mutex::new(RecordMap::new()),
            overlays: Mutex::new(OverlayStack::new()),
            observers: ObserverRegistry::new(),
            subscription: tokio::sync::Mutex::new(None),
            active: AtomicBool::new(false),
            teardown_pending: AtomicBool::new(false),
            this: this.clone(),
        })
    }

    /// Broadcast to observers. If that evicted the last one, the
    /// subscription is scheduled for teardown.
    fn notify(&self, event: ChangeEvent) {
        let pruned = self.observers.notify(event);
        if pruned > 0 && self.observers.observer_count() == 0 {
            self.schedule_teardown();
        }
    }

    /// Close the subscription from a spawned task when a runtime is
    /// available. Otherwise the next `activate` or `update` does it.
    fn schedule_teardown(&self) {
        self.teardown_pending.store(true, Ordering::Release);

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(topic = %self.topic, "no runtime, teardown deferred");
            return;
        };
        let this = self.this.clone();
        runtime.spawn(async move {
            if let Some(shared) = this.upgrade() {
                shared.finish_teardown().await;
            }
        });
    }

    /// Run a pending teardown, unless an observer has arrived since.
    pub(crate) async fn finish_teardown(&self) {
        if self.teardown_pending.swap(false, Ordering::AcqRel)
            && self.observers.observer_count() == 0
        {
            tracing::debug!(topic = %self.topic, "last observer dropped");
            self.close().await;
        }
    }

    async fn close(&self) {
        let subscription = {
            let mut slot = self.subscription.lock().await;
            self.active.store(false, Ordering::Release);
            slot.take()
        };

        let Some(subscription) = subscription else {
            return;
        };

        let topic = &self.topic;
        if let Err(error) = subscription.unsubscribe().await {
            tracing::warn!(%topic, %error, "failed to close subscription");
        }
        tracing::debug!(%topic, "subscription closed");
        self.notify(ChangeEvent::Deactivated);
    }

    /// Apply one subscription event to the mirror.
    fn handle_event(&self, event: RecordEvent) {
        let RecordEvent { action, record } = event;

        if !self.topic.contains(&record.id) {
            tracing::debug!(topic = %self.topic, id = %record.id, "ignoring event outside topic");
            return;
        }

        let id = record.id.clone();
        match action {
            RecordAction::Create | RecordAction::Update => {
                self.mirror.lock().insert(id.clone(), record);
            }
            RecordAction::Delete => {
                if self.mirror.lock().remove(&id).is_none() {
                    return;
                }
            }
            RecordAction::Other(action) => {
                tracing::warn!(%action, id = %id, "unknown subscription action");
                return;
            }
        }

        self.notify(ChangeEvent::MirrorChanged { ids: vec![id] });
    }

    /// Replace the mirror contents with `records`, in place.
    fn replace_mirror(&self, records: Vec<Record>) -> usize {
        let fresh: HashMap<RecordId, Record> = records
            .into_iter()
            .filter(|r| self.topic.contains(&r.id))
            .map(|r| (r.id.clone(), r))
            .collect();

        let count = {
            let mut mirror = self.mirror.lock();
            mirror.retain(|id, _| fresh.contains_key(id));
            for (id, record) in fresh {
                mirror.insert(id, record);
            }
            mirror.len()
        };

        self.notify(ChangeEvent::Refetched { count });
        count
    }

    pub(crate) fn push_override(&self, apply: Override) -> OverlayToken {
        let token = self.overlays.lock().push(apply);
        tracing::debug!(token = token.0, "pushed optimistic override");
        self.notify(ChangeEvent::OverlayPushed { token });
        token
    }

    pub(crate) fn remove_override(&self, token: OverlayToken) {
        if self.overlays.lock().remove(token) {
            tracing::debug!(token = token.0, "removed optimistic override");
            self.notify(ChangeEvent::OverlayRemoved { token });
        }
    }

    fn mirror(&self) -> RecordMap {
        self.mirror.lock().clone()
    }

    /// Mirror folded through the overlays.
    fn reconciled(&self) -> RecordMap {
        // Overrides are user code; run them with no lock held.
        let overlays = self.overlays.lock().clone();
        let mirror = self.mirror();
        overlays.compose(&mirror)
    }
}

/// Live mirror of one topic with optimistic overlays.
///
/// Reading the view through [`view`](RecordStore::view) opens the remote
/// subscription on first use. Losing the last observer, or calling
/// [`deactivate`](RecordStore::deactivate), closes it again. Observers are
/// lost through [`unobserve`](RecordStore::unobserve), by dropping their
/// handle, or by falling behind.
///
/// Dropping an active store unsubscribes from a spawned task when a tokio
/// runtime is running; outside one, call `deactivate` first.
pub struct RecordStore {
    client: Arc<dyn RecordClient>,
    pub(crate) config: StoreConfig,
    pub(crate) shared: Arc<Shared>,
}

impl RecordStore {
    /// Create a store for `topic`. Nothing is requested until first use.
    pub fn new(client: Arc<dyn RecordClient>, topic: Topic, config: StoreConfig) -> Self {
        Self {
            client,
            config,
            shared: Shared::new(topic),
        }
    }

    pub fn topic(&self) -> &Topic {
        &self.shared.topic
    }

    pub(crate) fn client(&self) -> &Arc<dyn RecordClient> {
        &self.client
    }

    // --- Subscription Lifecycle ---

    /// Open the remote subscription if it is not already open.
    ///
    /// With `auto_refetch` the mirror is reseeded before this returns.
    /// A failed subscribe is logged and leaves the store inactive, so the
    /// next call tries again.
    pub async fn activate(&self) {
        self.shared.finish_teardown().await;
        if self.shared.active.load(Ordering::Acquire) {
            return;
        }

        let mut slot = self.shared.subscription.lock().await;
        if slot.is_some() {
            return;
        }

        let shared = Arc::downgrade(&self.shared);
        let handler: EventHandler = Arc::new(move |event| {
            if let Some(shared) = shared.upgrade() {
                shared.handle_event(event);
            }
        });

        let topic = &self.shared.topic;
        match self
            .client
            .subscribe(topic, handler, &self.config.subscribe_options)
            .await
        {
            Ok(subscription) => *slot = Some(subscription),
            Err(error) => {
                tracing::warn!(%topic, %error, "failed to open subscription");
                return;
            }
        }
        tracing::debug!(%topic, "subscription opened");

        if self.config.auto_refetch {
            self.refetch(RequestConfig::with_options(
                self.config.request_options.clone(),
            ))
            .await;
        }

        self.shared.active.store(true, Ordering::Release);
        self.shared.notify(ChangeEvent::Activated);
    }

    /// Close the remote subscription. The mirror keeps its last contents.
    pub async fn deactivate(&self) {
        self.shared.close().await;
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    // --- Mirror ---

    /// Apply a subscription event. This is what the subscription handler
    /// calls; it is public so events can be fed from elsewhere.
    pub fn handle_event(&self, event: RecordEvent) {
        self.shared.handle_event(event);
    }

    /// Fetch the whole topic and replace the mirror with the result.
    ///
    /// On failure the error goes to the handler and the mirror is untouched.
    pub async fn refetch(&self, config: RequestConfig) -> Settlement {
        let result = match &self.shared.topic {
            Topic::Collection => self.client.fetch_list(&config.options).await,
            Topic::Record(id) => self
                .client
                .fetch_one(id, &config.options)
                .await
                .map(|record| vec![record]),
        };

        match result {
            Ok(records) => {
                let count = self.shared.replace_mirror(records);
                tracing::debug!(topic = %self.shared.topic, count, "mirror refetched");
                Settlement::Committed
            }
            Err(error) => {
                self.report(config.on_error.as_ref(), &error);
                Settlement::Rejected
            }
        }
    }

    /// Last server-confirmed records, without overlays.
    pub fn mirror(&self) -> RecordMap {
        self.shared.mirror()
    }

    // --- Reconciled View ---

    /// The reconciled view. Opens the subscription on first use.
    pub async fn view(&self) -> RecordMap {
        self.activate().await;
        self.snapshot()
    }

    /// The reconciled view as it is right now, without activating.
    pub fn snapshot(&self) -> RecordMap {
        self.shared.reconciled()
    }

    /// Number of optimistic overrides still waiting on their writes.
    pub fn overlay_count(&self) -> usize {
        self.shared.overlays.lock().len()
    }

    // --- Observers ---

    /// Register an observer for change events.
    pub fn observe(&self) -> ObserverHandle {
        self.shared.observers.observe(&self.config.observer)
    }

    /// Remove an observer. Removing the last one closes the subscription.
    pub async fn unobserve(&self, id: ObserverId) {
        if self.shared.observers.unobserve(id) && self.shared.observers.observer_count() == 0 {
            self.deactivate().await;
        }
    }

    pub fn observer_count(&self) -> usize {
        self.shared.observers.observer_count()
    }

    pub(crate) fn report(&self, handler: Option<&ErrorHandler>, error: &MirrorError) {
        let handler = handler.unwrap_or(&self.config.on_error);
        handler(error);
    }
}

impl Drop for RecordStore {
    fn drop(&mut self) {
        // A teardown task holding the lock will close it instead.
        let subscription = match self.shared.subscription.try_lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => return,
        };
        let Some(subscription) = subscription else {
            return;
        };
        self.shared.active.store(false, Ordering::Release);

        let topic = self.shared.topic.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(error) = subscription.unsubscribe().await {
                        tracing::warn!(%topic, %error, "failed to close subscription");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(%topic, "store dropped outside a runtime, subscription left open");
            }
        }
    }
}

impl fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStore")
            .field("topic", &self.shared.topic)
            .field("active", &self.is_active())
            .field("overlays", &self.overlay_count())
            .finish_non_exhaustive()
    }
}
