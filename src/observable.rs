//! Lazily-activated observable values.

use crate::collection::Collection;
use crate::item::Item;
use crate::store::RecordStore;
use crate::subscriptions::{ObserverHandle, ObserverId};
use crate::types::{Record, RecordMap};
use async_trait::async_trait;

/// A value backed by a remote subscription.
///
/// Reading with [`get`](Observable::get) opens the subscription if needed.
/// Observers are told when the value may have changed; removing the last
/// one closes the subscription.
#[async_trait]
pub trait Observable: Send + Sync {
    type Value: Send;

    async fn get(&self) -> Self::Value;

    fn observe(&self) -> ObserverHandle;

    async fn unobserve(&self, id: ObserverId);
}

#[async_trait]
impl Observable for RecordStore {
    type Value = RecordMap;

    async fn get(&self) -> RecordMap {
        self.view().await
    }

    fn observe(&self) -> ObserverHandle {
        RecordStore::observe(self)
    }

    async fn unobserve(&self, id: ObserverId) {
        RecordStore::unobserve(self, id).await
    }
}

#[async_trait]
impl Observable for Collection {
    type Value = RecordMap;

    async fn get(&self) -> RecordMap {
        self.records().await
    }

    fn observe(&self) -> ObserverHandle {
        self.store().observe()
    }

    async fn unobserve(&self, id: ObserverId) {
        self.store().unobserve(id).await
    }
}

#[async_trait]
impl Observable for Item {
    type Value = Option<Record>;

    async fn get(&self) -> Option<Record> {
        self.record().await
    }

    fn observe(&self) -> ObserverHandle {
        self.store().observe()
    }

    async fn unobserve(&self, id: ObserverId) {
        self.store().unobserve(id).await
    }
}
