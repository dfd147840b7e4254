//! Observer types for change notification.

use crate::state::OverlayToken;
use crate::types::RecordId;
use serde::{Deserialize, Serialize};

/// Configuration for an observer.
#[derive(Clone, Debug)]
pub struct ObserverConfig {
    /// Max buffered events before dropping the observer.
    /// Default: 256
    pub buffer_size: usize,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self { buffer_size: 256 }
    }
}

/// Events delivered to observers whenever the reconciled view may have changed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    // --- Mirror Events ---
    /// Records were upserted into or removed from the mirror by a
    /// subscription event.
    MirrorChanged { ids: Vec<RecordId> },

    /// The mirror was replaced by a full refetch.
    Refetched { count: usize },

    // --- Overlay Events ---
    /// An optimistic override was pushed.
    OverlayPushed { token: OverlayToken },

    /// An optimistic override was removed after its write settled.
    OverlayRemoved { token: OverlayToken },

    // --- Lifecycle Events ---
    /// The remote subscription is open.
    Activated,

    /// The remote subscription was torn down.
    Deactivated,

    /// This observer was dropped.
    Dropped { reason: DropReason },
}

/// Why an observer was dropped.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unobserved.
    Unobserved,
}

/// Unique identifier for an observer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(pub u64);

/// Handle held by an observer.
pub struct ObserverHandle {
    pub id: ObserverId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<ChangeEvent>,
}

impl ObserverHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<ChangeEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<ChangeEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<ChangeEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Take every event currently buffered.
    pub fn drain(&self) -> Vec<ChangeEvent> {
        self.receiver.try_iter().collect()
    }
}
