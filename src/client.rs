//! The backing-store client the mirror is built on.
//!
//! The mirror never talks to the network itself. Everything remote goes
//! through a user-provided [`RecordClient`]: a push subscription, full-state
//! fetches, and batched writes.

use crate::error::Result;
use crate::types::{Record, RecordId, RecordUpdate, RequestOptions, Topic};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Kind of change carried by a subscription event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordAction {
    Create,
    Update,
    Delete,
    /// Anything the backend sends that the mirror does not understand.
    #[serde(untagged)]
    Other(String),
}

/// One push event from the subscription channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordEvent {
    pub action: RecordAction,
    pub record: Record,
}

impl RecordEvent {
    pub fn create(record: Record) -> Self {
        Self {
            action: RecordAction::Create,
            record,
        }
    }

    pub fn update(record: Record) -> Self {
        Self {
            action: RecordAction::Update,
            record,
        }
    }

    pub fn delete(record: Record) -> Self {
        Self {
            action: RecordAction::Delete,
            record,
        }
    }
}

/// Callback the client invokes for every pushed event.
pub type EventHandler = Arc<dyn Fn(RecordEvent) + Send + Sync>;

/// One write inside a batch request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BatchOperation {
    /// Create the record, or update it if it exists. Null fields are deleted.
    Upsert { id: RecordId, fields: RecordUpdate },
    Delete { id: RecordId },
}

impl BatchOperation {
    /// The record this operation targets.
    pub fn id(&self) -> &RecordId {
        match self {
            BatchOperation::Upsert { id, .. } => id,
            BatchOperation::Delete { id } => id,
        }
    }
}

/// A live subscription. Dropping it without calling
/// [`unsubscribe`](RemoteSubscription::unsubscribe) leaves cleanup to the
/// client implementation.
#[async_trait]
pub trait RemoteSubscription: Send + Sync {
    async fn unsubscribe(self: Box<Self>) -> Result<()>;
}

/// User-implemented access to the remote record store.
#[async_trait]
pub trait RecordClient: Send + Sync {
    /// Open a push subscription for `topic`. Events are delivered to
    /// `handler` until the returned handle is unsubscribed.
    async fn subscribe(
        &self,
        topic: &Topic,
        handler: EventHandler,
        options: &RequestOptions,
    ) -> Result<Box<dyn RemoteSubscription>>;

    /// Fetch every record of the collection.
    async fn fetch_list(&self, options: &RequestOptions) -> Result<Vec<Record>>;

    /// Fetch a single record.
    async fn fetch_one(&self, id: &RecordId, options: &RequestOptions) -> Result<Record>;

    /// Submit several writes as one request. Implementations should report
    /// multiple rejected operations as one aggregated
    /// [`MirrorError::Batch`](crate::MirrorError::Batch).
    async fn batch_write(
        &self,
        operations: Vec<BatchOperation>,
        options: &RequestOptions,
    ) -> Result<()>;
}
