//! Observer registry for broadcasting change events.

use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::types::{ChangeEvent, DropReason, ObserverConfig, ObserverHandle, ObserverId};

/// Internal observer state.
struct Observer {
    sender: Sender<ChangeEvent>,
}

/// Result of a single delivery attempt.
enum Delivery {
    Sent,
    Full,
    Gone,
}

impl Observer {
    fn try_send(&self, event: ChangeEvent) -> Delivery {
        match self.sender.try_send(event) {
            Ok(()) => Delivery::Sent,
            Err(TrySendError::Full(_)) => Delivery::Full,
            Err(TrySendError::Disconnected(_)) => Delivery::Gone,
        }
    }
}

/// Keeps the observer list and fans change events out to it.
pub struct ObserverRegistry {
    /// Active observers by ID.
    observers: RwLock<HashMap<ObserverId, Observer>>,
    /// Counter for generating observer IDs.
    next_id: AtomicU64,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new observer.
    pub fn observe(&self, config: &ObserverConfig) -> ObserverHandle {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size.max(1));

        self.observers.write().insert(id, Observer { sender });

        ObserverHandle { id, receiver }
    }

    /// Remove an observer. Returns false if it was already gone.
    pub fn unobserve(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write();
        match observers.remove(&id) {
            Some(observer) => {
                // Best effort; the receiver may already be dropped.
                let _ = observer.sender.try_send(ChangeEvent::Dropped {
                    reason: DropReason::Unobserved,
                });
                true
            }
            None => false,
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    /// Broadcast to every observer. Full buffers drop the observer;
    /// disconnected receivers are pruned silently.
    ///
    /// Returns how many observers this broadcast removed.
    pub fn notify(&self, event: ChangeEvent) -> usize {
        let mut overflowed = Vec::new();
        let mut gone = Vec::new();

        {
            let observers = self.observers.read();
            for (id, observer) in observers.iter() {
                match observer.try_send(event.clone()) {
                    Delivery::Sent => {}
                    Delivery::Full => overflowed.push(*id),
                    Delivery::Gone => gone.push(*id),
                }
            }
        }

        if overflowed.is_empty() && gone.is_empty() {
            return 0;
        }

        let mut removed = 0;
        let mut observers = self.observers.write();
        for id in gone {
            if observers.remove(&id).is_some() {
                removed += 1;
            }
        }
        for id in overflowed {
            if let Some(observer) = observers.remove(&id) {
                removed += 1;
                tracing::warn!(observer = id.0, "dropping slow observer");
                // Buffer is full, so this usually fails; that's ok.
                let _ = observer.sender.try_send(ChangeEvent::Dropped {
                    reason: DropReason::BufferOverflow,
                });
            }
        }
        removed
    }
}

impl Default for ObserverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordId;

    #[test]
    fn test_observe_unobserve() {
        let registry = ObserverRegistry::new();

        let handle = registry.observe(&ObserverConfig::default());
        assert_eq!(registry.observer_count(), 1);

        assert!(registry.unobserve(handle.id));
        assert!(!registry.unobserve(handle.id));
        assert_eq!(registry.observer_count(), 0);

        assert!(matches!(
            handle.try_recv().unwrap(),
            ChangeEvent::Dropped {
                reason: DropReason::Unobserved
            }
        ));
    }

    #[test]
    fn test_notify_reaches_all_observers() {
        let registry = ObserverRegistry::new();
        let a = registry.observe(&ObserverConfig::default());
        let b = registry.observe(&ObserverConfig::default());

        registry.notify(ChangeEvent::MirrorChanged {
            ids: vec![RecordId::new("x")],
        });

        for handle in [&a, &b] {
            let events = handle.drain();
            assert_eq!(
                events,
                vec![ChangeEvent::MirrorChanged {
                    ids: vec![RecordId::new("x")]
                }]
            );
        }
    }

    #[test]
    fn test_drop_slow_observer() {
        let registry = ObserverRegistry::new();
        let _handle = registry.observe(&ObserverConfig { buffer_size: 2 });

        let removed: usize = (0..10)
            .map(|_| registry.notify(ChangeEvent::Refetched { count: 0 }))
            .sum();

        assert_eq!(removed, 1);
        assert_eq!(registry.observer_count(), 0);
    }

    #[test]
    fn test_dropped_handle_is_pruned() {
        let registry = ObserverRegistry::new();
        let kept = registry.observe(&ObserverConfig::default());
        drop(registry.observe(&ObserverConfig::default()));

        assert_eq!(registry.notify(ChangeEvent::Activated), 1);
        assert_eq!(registry.notify(ChangeEvent::Activated), 0);
        assert_eq!(registry.observer_count(), 1);
        assert_eq!(kept.drain().len(), 2);
    }

    #[test]
    fn test_prune_disconnected_observer() {
        let registry = ObserverRegistry::new();
        let handle = registry.observe(&ObserverConfig::default());
        let keep = registry.observe(&ObserverConfig::default());
        drop(handle);

        registry.notify(ChangeEvent::Activated);

        assert_eq!(registry.observer_count(), 1);
        assert_eq!(keep.drain(), vec![ChangeEvent::Activated]);
    }
}
