//! In-memory collaborators.
//!
//! - [`InMemoryEventRepository`]: `HashMap`-backed event storage that records
//!   every write and can be switched into a failing mode
//! - [`RecordingNotifier`]: captures notifications, optionally rejecting some
//!   recipients

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use waitlist_lottery_core::{
    EntrantId, Event, EventId, EventRepository, Notification, Notifier, NotifyError,
    StorageError, StorageFuture,
};

/// In-memory event storage for fast, deterministic tests.
///
/// Writes pass through the same JSON document encoding a real document store
/// applies, so a field that does not survive serialization is caught here.
/// Successful writes are appended to a write log. `write_count` counts those;
/// `attempt_count` counts every call, including rejected ones.
///
/// # Example
///
/// ```
/// use waitlist_lottery_testing::InMemoryEventRepository;
/// use waitlist_lottery_core::{Event, EventId, EventRepository};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let repository = InMemoryEventRepository::new();
/// repository.update_event(Event::new(EventId::new("evt"), "Gala", 10)).await?;
///
/// assert_eq!(repository.write_count(), 1);
/// assert!(repository.load_event(&EventId::new("evt")).await?.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryEventRepository {
    events: Arc<Mutex<HashMap<EventId, Event>>>,
    writes: Arc<Mutex<Vec<Event>>>,
    attempts: Arc<AtomicUsize>,
    fail_writes: Arc<AtomicBool>,
    fail_loads: Arc<AtomicBool>,
    write_delay: Option<Duration>,
}

impl InMemoryEventRepository {
    /// Create a new empty repository
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every write by `delay` (for exercising in-flight writes)
    #[must_use]
    pub const fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// Store an event without recording it as a write
    pub fn insert(&self, event: Event) {
        lock(&self.events).insert(event.event_id.clone(), event);
    }

    /// Current stored copy of an event
    #[must_use]
    pub fn get(&self, event_id: &EventId) -> Option<Event> {
        lock(&self.events).get(event_id).cloned()
    }

    /// Make subsequent writes fail with [`StorageError::Unavailable`]
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent loads fail with [`StorageError::Unavailable`]
    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes
    #[must_use]
    pub fn write_count(&self) -> usize {
        lock(&self.writes).len()
    }

    /// Number of `update_event` calls, successful or not
    #[must_use]
    pub fn attempt_count(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// The most recent successful write
    #[must_use]
    pub fn last_write(&self) -> Option<Event> {
        lock(&self.writes).last().cloned()
    }

    /// All successful writes, oldest first
    #[must_use]
    pub fn writes(&self) -> Vec<Event> {
        lock(&self.writes).clone()
    }
}

impl EventRepository for InMemoryEventRepository {
    fn update_event(&self, event: Event) -> StorageFuture<'_, ()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if let Some(delay) = self.write_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StorageError::Unavailable(format!(
                    "write rejected for event {}",
                    event.event_id
                )));
            }
            let document = serde_json::to_value(&event)?;
            let stored: Event = serde_json::from_value(document)?;
            lock(&self.events).insert(stored.event_id.clone(), stored.clone());
            lock(&self.writes).push(stored);
            Ok(())
        })
    }

    fn load_event(&self, event_id: &EventId) -> StorageFuture<'_, Option<Event>> {
        let event_id = event_id.clone();
        Box::pin(async move {
            if self.fail_loads.load(Ordering::SeqCst) {
                return Err(StorageError::Unavailable(format!(
                    "read rejected for event {event_id}"
                )));
            }
            Ok(lock(&self.events).get(&event_id).cloned())
        })
    }
}

/// Notifier that records every delivered notification.
#[derive(Clone, Debug, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    unreachable: Arc<Mutex<HashSet<EntrantId>>>,
}

impl RecordingNotifier {
    /// Create a notifier that accepts every recipient
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject notifications addressed to `entrant`
    pub fn mark_unreachable(&self, entrant: EntrantId) {
        lock(&self.unreachable).insert(entrant);
    }

    /// Delivered notifications, in delivery order
    #[must_use]
    pub fn sent(&self) -> Vec<Notification> {
        lock(&self.sent).clone()
    }

    /// Recipients of delivered notifications
    #[must_use]
    pub fn recipients(&self) -> Vec<EntrantId> {
        lock(&self.sent).iter().map(|n| n.recipient.clone()).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(
        &self,
        notification: Notification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>> {
        Box::pin(async move {
            if lock(&self.unreachable).contains(&notification.recipient) {
                return Err(NotifyError::Unreachable(notification.recipient));
            }
            lock(&self.sent).push(notification);
            Ok(())
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use waitlist_lottery_core::NotificationKind;

    #[tokio::test]
    async fn failed_writes_are_attempted_but_not_recorded() {
        let repository = InMemoryEventRepository::new();
        repository.fail_writes(true);

        let result = repository
            .update_event(Event::new(EventId::new("evt"), "Gala", 1))
            .await;

        assert!(matches!(result, Err(StorageError::Unavailable(_))));
        assert_eq!(repository.attempt_count(), 1);
        assert_eq!(repository.write_count(), 0);
        assert!(repository.get(&EventId::new("evt")).is_none());
    }

    #[tokio::test]
    async fn insert_is_not_a_write() {
        let repository = InMemoryEventRepository::new();
        repository.insert(Event::new(EventId::new("evt"), "Gala", 1));

        assert_eq!(repository.write_count(), 0);
        let loaded = repository.load_event(&EventId::new("evt")).await.unwrap();
        assert_eq!(loaded.unwrap().title, "Gala");
    }

    #[tokio::test]
    async fn unreachable_recipients_are_rejected() {
        let notifier = RecordingNotifier::new();
        notifier.mark_unreachable(EntrantId::new("w2"));

        let notification = |who: &str| Notification {
            recipient: EntrantId::new(who),
            event_id: EventId::new("evt"),
            event_title: "Gala".to_string(),
            kind: NotificationKind::Selected,
        };

        assert!(notifier.notify(notification("w1")).await.is_ok());
        assert!(notifier.notify(notification("w2")).await.is_err());
        assert_eq!(notifier.recipients(), vec![EntrantId::new("w1")]);
    }
}
