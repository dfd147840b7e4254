//! A live view of a single record.

use crate::client::RecordClient;
use crate::store::{RecordStore, RequestConfig, Settlement, StoreConfig};
use crate::types::{Record, RecordId, RecordUpdate, RecordsDiff, Topic};
use crate::update::{UpdateConfig, UpdateDiff};
use std::fmt;
use std::sync::Arc;

/// A partial update for one record, given directly or computed from the
/// record's current value (`None` if it is not loaded).
pub enum ItemUpdate {
    Static(RecordUpdate),
    Computed(Box<dyn FnOnce(Option<&Record>) -> RecordUpdate + Send>),
}

impl ItemUpdate {
    pub fn from_fn(f: impl FnOnce(Option<&Record>) -> RecordUpdate + Send + 'static) -> Self {
        ItemUpdate::Computed(Box::new(f))
    }
}

impl From<RecordUpdate> for ItemUpdate {
    fn from(update: RecordUpdate) -> Self {
        ItemUpdate::Static(update)
    }
}

impl fmt::Debug for ItemUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemUpdate::Static(update) => f.debug_tuple("Static").field(update).finish(),
            ItemUpdate::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// One record, kept in sync and optimistically updated.
#[derive(Debug)]
pub struct Item {
    store: RecordStore,
    id: RecordId,
}

impl Item {
    pub fn new(client: Arc<dyn RecordClient>, id: impl Into<RecordId>, config: StoreConfig) -> Self {
        let id = id.into();
        Self {
            store: RecordStore::new(client, Topic::Record(id.clone()), config),
            id,
        }
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    /// The record, overlays included. Opens the subscription on first use.
    pub async fn record(&self) -> Option<Record> {
        self.store.view().await.remove(&self.id)
    }

    /// The record as it is right now, without activating.
    pub fn snapshot(&self) -> Option<Record> {
        self.store.snapshot().remove(&self.id)
    }

    /// Apply `update` optimistically and write it to the backend.
    /// Null fields are deleted.
    pub async fn update(&self, update: impl Into<ItemUpdate>, config: UpdateConfig) -> Settlement {
        let id = self.id.clone();
        let update = update.into();
        let diff = UpdateDiff::from_fn(move |view| {
            let fields = match update {
                ItemUpdate::Static(fields) => fields,
                ItemUpdate::Computed(f) => f(view.get(&id)),
            };
            let mut diff = RecordsDiff::new();
            diff.insert(id, Some(fields));
            diff
        });
        self.store.update(diff, config).await
    }

    /// Delete the record.
    pub async fn delete(&self, config: UpdateConfig) -> Settlement {
        let mut diff = RecordsDiff::new();
        diff.insert(self.id.clone(), None);
        self.store.update(diff, config).await
    }

    /// Fetch the record again and replace the mirror with it.
    pub async fn refetch(&self, config: RequestConfig) -> Settlement {
        self.store.refetch(config).await
    }

    /// Close the subscription.
    pub async fn deactivate(&self) {
        self.store.deactivate().await
    }

    /// The underlying store.
    pub fn store(&self) -> &RecordStore {
        &self.store
    }
}
