//! # Record Mirror
//!
//! A live, optimistically-updated local mirror of remote record collections.
//!
//! ## Core Concepts
//!
//! - **Mirror**: the last server-confirmed records of a topic, kept current by
//!   a push subscription
//! - **Overrides**: in-flight writes, layered over the mirror until the
//!   backend answers
//! - **Reconciled view**: the mirror with every override applied in call order
//! - **Observers**: change notification for anything rendering the view
//!
//! The backend is reached only through a user-provided [`RecordClient`].
//!
//! ## Example
//!
//! ```ignore
//! use record_mirror::{parse_diff, Collection, RecordId, StoreConfig, UpdateConfig};
//! use serde_json::json;
//!
//! // `client` is your `Arc<dyn RecordClient>`.
//! let tasks = Collection::new(client, StoreConfig::default());
//! let id = RecordId::generate();
//!
//! // Create; visible immediately, before the backend confirms it.
//! tasks.update(parse_diff(json!({ id.as_str(): {"text": "New task"} }))?, UpdateConfig::default()).await;
//!
//! // Update and delete.
//! tasks.update(parse_diff(json!({ id.as_str(): {"done": true} }))?, UpdateConfig::default()).await;
//! tasks.delete(id, UpdateConfig::default()).await;
//!
//! // React to changes.
//! let handle = tasks.store().observe();
//! while let Ok(event) = handle.recv() {
//!     println!("{:?}: {} records", event, tasks.snapshot().len());
//! }
//! ```

pub mod client;
pub mod collection;
pub mod error;
pub mod id;
pub mod item;
pub mod observable;
pub mod state;
pub mod store;
pub mod subscriptions;
pub mod types;
pub mod update;

// Re-exports
pub use client::{
    BatchOperation, EventHandler, RecordAction, RecordClient, RecordEvent, RemoteSubscription,
};
pub use collection::Collection;
pub use error::{log_error_handler, BatchFailure, ErrorHandler, MirrorError, Result};
pub use id::new_record_id;
pub use item::{Item, ItemUpdate};
pub use observable::Observable;
pub use state::{apply_diff, apply_update, merge_fields, OverlayStack, OverlayToken, Override};
pub use store::{RecordStore, RequestConfig, Settlement, StoreConfig};
pub use subscriptions::{
    ChangeEvent, DropReason, ObserverConfig, ObserverHandle, ObserverId, ObserverRegistry,
};
pub use types::*;
pub use update::{batch_operations, override_from_diff, parse_diff, UpdateConfig, UpdateDiff};
