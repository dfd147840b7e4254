//! A live view of a whole collection.

use crate::client::RecordClient;
use crate::store::{RecordStore, RequestConfig, Settlement, StoreConfig};
use crate::types::{Record, RecordId, RecordMap, RecordUpdate, RecordsDiff, Topic};
use crate::update::{UpdateConfig, UpdateDiff};
use std::sync::Arc;

/// Every record of one collection, kept in sync and optimistically updated.
///
/// ```ignore
/// let tasks = Collection::new(client, StoreConfig::default());
///
/// let (id, _) = tasks.create(fields(json!({"text": "New task"})), UpdateConfig::default()).await;
/// assert_eq!(tasks.records().await[&id].get("text"), Some(&json!("New task")));
/// ```
#[derive(Debug)]
pub struct Collection {
    store: RecordStore,
}

impl Collection {
    pub fn new(client: Arc<dyn RecordClient>, config: StoreConfig) -> Self {
        Self {
            store: RecordStore::new(client, Topic::Collection, config),
        }
    }

    /// All records, overlays included. Opens the subscription on first use.
    pub async fn records(&self) -> RecordMap {
        self.store.view().await
    }

    /// One record from [`records`](Collection::records).
    pub async fn record(&self, id: &RecordId) -> Option<Record> {
        self.records().await.remove(id)
    }

    /// Current records without activating the subscription.
    pub fn snapshot(&self) -> RecordMap {
        self.store.snapshot()
    }

    /// Apply `diff` optimistically and write it to the backend.
    pub async fn update(&self, diff: impl Into<UpdateDiff>, config: UpdateConfig) -> Settlement {
        self.store.update(diff, config).await
    }

    /// Create a record under a freshly generated id.
    pub async fn create(&self, fields: RecordUpdate, config: UpdateConfig) -> (RecordId, Settlement) {
        let id = RecordId::generate();
        let mut diff = RecordsDiff::new();
        diff.insert(id.clone(), Some(fields));
        let settlement = self.store.update(diff, config).await;
        (id, settlement)
    }

    /// Delete one record.
    pub async fn delete(&self, id: RecordId, config: UpdateConfig) -> Settlement {
        let mut diff = RecordsDiff::new();
        diff.insert(id, None);
        self.store.update(diff, config).await
    }

    /// Replace the mirror with a full listing.
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
