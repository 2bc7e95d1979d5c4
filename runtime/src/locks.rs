//! Per-event serialization.
//!
//! The draw algorithms assume a single writer per event. [`EventLocks`] hands
//! out one async mutex per event id so that load, draw and write of one event
//! never interleave with another operation on the same event, while different
//! events proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;
use waitlist_lottery_core::EventId;

type Slot = Arc<tokio::sync::Mutex<()>>;

/// Registry of per-event mutexes.
///
/// Cloning shares the registry.
#[derive(Debug, Clone, Default)]
pub struct EventLocks {
    slots: Arc<Mutex<HashMap<EventId, Slot>>>,
}

/// Exclusive access to one event until dropped.
#[derive(Debug)]
pub struct EventGuard {
    event_id: EventId,
    _guard: OwnedMutexGuard<()>,
}

impl EventGuard {
    /// Event this guard protects
    #[must_use]
    pub const fn event_id(&self) -> &EventId {
        &self.event_id
    }
}

impl EventLocks {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `event_id`.
    pub async fn acquire(&self, event_id: &EventId) -> EventGuard {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            // Held or awaited slots have clones outside the map
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            Arc::clone(slots.entry(event_id.clone()).or_default())
        };

        let guard = slot.lock_owned().await;
        tracing::trace!(%event_id, "Acquired event lock");
        EventGuard {
            event_id: event_id.clone(),
            _guard: guard,
        }
    }

    /// Number of events with a live lock entry
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_event_is_exclusive() {
        let locks = EventLocks::new();
        let id = EventId::new("evt");

        let guard = locks.acquire(&id).await;
        let mut contender = tokio_test::task::spawn(locks.acquire(&id));
        tokio_test::assert_pending!(contender.poll());

        drop(guard);
        assert!(contender.is_woken());
        let acquired = tokio_test::assert_ready!(contender.poll());
        assert_eq!(acquired.event_id(), &id);
    }

    #[tokio::test]
    async fn different_events_do_not_block() {
        let locks = EventLocks::new();
        let _a = locks.acquire(&EventId::new("a")).await;

        let b = tokio::time::timeout(Duration::from_secs(1), locks.acquire(&EventId::new("b"))).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn idle_entries_are_pruned() {
        let locks = EventLocks::new();
        drop(locks.acquire(&EventId::new("a")).await);
        drop(locks.acquire(&EventId::new("b")).await);
        assert_eq!(locks.tracked(), 1);

        let _held = locks.acquire(&EventId::new("c")).await;
        drop(locks.acquire(&EventId::new("d")).await);
        assert_eq!(locks.tracked(), 2);
    }
}
