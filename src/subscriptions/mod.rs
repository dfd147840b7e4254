//! Change notification for observers of a record store.
//!
//! Every mutation of the mirror or the overlay stack is broadcast
//! synchronously to registered observers:
//! - Mirror changes from subscription events and refetches
//! - Overlay pushes and removals from optimistic updates
//! - Subscription lifecycle (activation, teardown)
//!
//! Observers get a bounded buffer; one that falls behind is dropped.
//!
//! # Example
//!
//! ```ignore
//! let handle = store.observe();
//!
//! loop {
//!     match handle.recv() {
//!         Ok(ChangeEvent::Dropped { .. }) | Err(_) => break,
//!         Ok(_) => render(store.snapshot()),
//!     }
//! }
//! ```

mod manager;
mod types;

pub use manager::ObserverRegistry;
pub use types::{ChangeEvent, DropReason, ObserverConfig, ObserverHandle, ObserverId};
