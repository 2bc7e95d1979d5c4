//! Caller-side orchestration of lottery operations.
//!
//! [`LotteryCoordinator`] is what an organizer or entrant session talks to.
//! For every operation it:
//!
//! 1. Takes the event's lock from [`EventLocks`]
//! 2. Loads the event from storage
//! 3. Runs the draw or transition
//! 4. Waits for the storage write, then releases the lock
//! 5. Notifies entrants, only after a successful draw write
//!
//! The write runs on its own task which owns the event's lock, so the event
//! stays locked until the write settles even when the caller stops waiting.
//! A second operation on the same event always reads the state the first one
//! produced.

use crate::config::DrawConfig;
use crate::error::LotteryError;
use crate::locks::{EventGuard, EventLocks};
use crate::lottery::{Draw, DrawKind, DrawOutcome, LotteryService, SkipReason, skip};
use crate::metrics::LotteryMetrics;
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use waitlist_lottery_core::environment::Clock;
use waitlist_lottery_core::{
    DateTime, EntrantId, Event, EventId, EventRepository, GeoPoint, Notification, NotificationKind,
    Notifier, StorageError, Utc, Waitlist,
};

/// Notification delivery counts for one draw.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Delivered
    pub sent: usize,
    /// Rejected by the notifier
    pub failed: usize,
}

/// A draw that was committed in memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedDraw {
    /// Algorithm that ran
    pub kind: DrawKind,
    /// Entrants admitted
    pub selected: Vec<EntrantId>,
    /// Entrants left waiting
    pub still_waiting: Vec<EntrantId>,
    /// Whether the storage write succeeded
    pub persisted: bool,
    /// Notifications sent after the write
    pub notifications: DispatchSummary,
}

/// Result of a coordinated draw.
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub enum DrawReport {
    /// Nothing changed and nothing was written
    Skipped(SkipReason),
    /// The draw admitted entrants
    Completed(CompletedDraw),
}

impl DrawReport {
    /// Whether at least one entrant was admitted
    #[must_use]
    pub fn drew_any(&self) -> bool {
        matches!(self, Self::Completed(draw) if !draw.selected.is_empty())
    }

    /// The completed draw, if any
    #[must_use]
    pub const fn completed(&self) -> Option<&CompletedDraw> {
        match self {
            Self::Completed(draw) => Some(draw),
            Self::Skipped(_) => None,
        }
    }

    /// Why nothing happened, if nothing did
    #[must_use]
    pub const fn skip_reason(&self) -> Option<&SkipReason> {
        match self {
            Self::Completed(_) => None,
            Self::Skipped(reason) => Some(reason),
        }
    }
}

/// Serializes lottery operations per event and notifies entrants.
pub struct LotteryCoordinator {
    service: Arc<LotteryService>,
    repository: Arc<dyn EventRepository>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    locks: EventLocks,
    notify_not_selected: bool,
}

impl std::fmt::Debug for LotteryCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LotteryCoordinator")
            .field("service", &self.service)
            .field("locks", &self.locks)
            .field("notify_not_selected", &self.notify_not_selected)
            .finish_non_exhaustive()
    }
}

impl LotteryCoordinator {
    /// Create a coordinator around `service`, sharing its storage.
    #[must_use]
    pub fn new(
        service: Arc<LotteryService>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository: service.repository(),
            service,
            notifier,
            clock,
            locks: EventLocks::new(),
            notify_not_selected: true,
        }
    }

    /// Apply draw configuration.
    #[must_use]
    pub const fn with_config(mut self, config: &DrawConfig) -> Self {
        self.notify_not_selected = config.notify_not_selected;
        self
    }

    /// Whether entrants left waiting after the initial draw are told so.
    #[must_use]
    pub const fn with_not_selected_notifications(mut self, enabled: bool) -> Self {
        self.notify_not_selected = enabled;
        self
    }

    /// Run the initial draw for `event_id`.
    ///
    /// An unknown event is a no-op reported as [`SkipReason::EventNotFound`].
    ///
    /// # Errors
    ///
    /// Returns [`LotteryError::Storage`] if the event cannot be loaded.
    #[tracing::instrument(skip(self, event_id), fields(event_id = %event_id))]
    pub async fn run_lottery(&self, event_id: &EventId) -> Result<DrawReport, LotteryError> {
        self.locked_draw(event_id, |service, event| service.run_lottery(event))
            .await
    }

    /// Draw replacements for cancelled entrants of `event_id`.
    ///
    /// # Errors
    ///
    /// Returns [`LotteryError::Storage`] if the event cannot be loaded.
    #[tracing::instrument(skip(self, event_id), fields(event_id = %event_id))]
    pub async fn draw_replacements(&self, event_id: &EventId) -> Result<DrawReport, LotteryError> {
        self.locked_draw(event_id, |service, event| service.draw_replacements(event))
            .await
    }

    /// Run the initial draw if registration has closed and it never ran.
    ///
    /// # Errors
    ///
    /// Returns [`LotteryError::Storage`] if the event cannot be loaded.
    #[tracing::instrument(skip(self, event_id), fields(event_id = %event_id))]
    pub async fn maybe_auto_run_lottery(
        &self,
        event_id: &EventId,
    ) -> Result<DrawReport, LotteryError> {
        let now = self.clock.now();
        self.locked_draw(event_id, move |service, event| auto_run(service, event, now))
            .await
    }

    /// Put an entrant on the waiting list.
    ///
    /// Returns `false` if the entrant was already registered, the waiting
    /// list is full, or the event requires a location (see
    /// [`register_entrant_at`](Self::register_entrant_at)).
    ///
    /// # Errors
    ///
    /// Returns [`LotteryError::EventNotFound`] for an unknown event and
    /// [`LotteryError::Storage`] if loading or saving fails.
    pub async fn register_entrant(
        &self,
        event_id: &EventId,
        entrant: EntrantId,
    ) -> Result<bool, LotteryError> {
        self.transition(event_id, "register", |waitlist| {
            waitlist.add_entrant_to_waitlist(entrant)
        })
        .await
    }

    /// Put an entrant on the waiting list together with where they joined.
    ///
    /// Required for events with `geolocation_required`; accepted for any
    /// event. Returns `false` under the same conditions as
    /// [`register_entrant`](Self::register_entrant).
    ///
    /// # Errors
    ///
    /// Returns [`LotteryError::EventNotFound`] for an unknown event and
    /// [`LotteryError::Storage`] if loading or saving fails.
    pub async fn register_entrant_at(
        &self,
        event_id: &EventId,
        entrant: EntrantId,
        location: GeoPoint,
    ) -> Result<bool, LotteryError> {
        self.transition(event_id, "register", |waitlist| {
            waitlist.add_entrant_with_location(entrant, location)
        })
        .await
    }

    /// Take a waiting entrant off the waiting list, dropping their location.
    ///
    /// Returns `false` if the entrant was not waiting.
    ///
    /// # Errors
    ///
    /// Returns [`LotteryError::EventNotFound`] for an unknown event and
    /// [`LotteryError::Storage`] if loading or saving fails.
    pub async fn leave_waitlist(
        &self,
        event_id: &EventId,
        entrant: &EntrantId,
    ) -> Result<bool, LotteryError> {
        self.transition(event_id, "leave", |waitlist| waitlist.leave_waitlist(entrant))
            .await
    }

    /// Record that a selected entrant declined, opening a slot.
    ///
    /// # Errors
    ///
    /// Returns [`LotteryError::EventNotFound`] for an unknown event and
    /// [`LotteryError::Storage`] if loading or saving fails.
    pub async fn decline_selection(
        &self,
        event_id: &EventId,
        entrant: &EntrantId,
    ) -> Result<bool, LotteryError> {
        self.transition(event_id, "decline", |waitlist| {
            waitlist.move_to_cancelled(entrant)
        })
        .await
    }

    /// Record that a selected entrant accepted their slot.
    ///
    /// # Errors
    ///
    /// Returns [`LotteryError::EventNotFound`] for an unknown event and
    /// [`LotteryError::Storage`] if loading or saving fails.
    pub async fn accept_selection(
        &self,
        event_id: &EventId,
        entrant: &EntrantId,
    ) -> Result<bool, LotteryError> {
        self.transition(event_id, "accept", |waitlist| waitlist.add_to_confirmed(entrant))
            .await
    }

    async fn locked_draw<F>(&self, event_id: &EventId, draw: F) -> Result<DrawReport, LotteryError>
    where
        F: FnOnce(&LotteryService, &mut Event) -> DrawOutcome,
    {
        let guard = self.locks.acquire(event_id).await;
        let Some(mut event) = self.repository.load_event(event_id).await? else {
            tracing::warn!("Event not found, nothing to draw");
            return Ok(DrawReport::Skipped(SkipReason::EventNotFound));
        };

        let Draw {
            kind,
            selected,
            still_waiting,
            write,
        } = match draw(&self.service, &mut event) {
            DrawOutcome::Drawn(draw) => draw,
            DrawOutcome::Skipped(reason) => return Ok(DrawReport::Skipped(reason)),
        };

        let persisted = match release_after(guard, write.outcome()).await {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(%error, "Draw not persisted, skipping notifications");
                false
            },
        };

        let notifications = if persisted {
            let mut batch = notifications_for(&event, &selected, NotificationKind::Selected);
            if self.notify_not_selected && kind == DrawKind::Initial {
                batch.extend(notifications_for(
                    &event,
                    &still_waiting,
                    NotificationKind::NotSelected,
                ));
            }
            self.dispatch(batch).await
        } else {
            DispatchSummary::default()
        };

        Ok(DrawReport::Completed(CompletedDraw {
            kind,
            selected,
            still_waiting,
            persisted,
            notifications,
        }))
    }

    async fn dispatch(&self, batch: Vec<Notification>) -> DispatchSummary {
        let deliveries = batch.into_iter().map(|notification| async move {
            let recipient = notification.recipient.clone();
            let kind = notification.kind;
            (recipient, kind, self.notifier.notify(notification).await)
        });

        let mut summary = DispatchSummary::default();
        for (recipient, kind, result) in join_all(deliveries).await {
            match result {
                Ok(()) => {
                    tracing::debug!(entrant = %recipient, ?kind, "Notification sent");
                    summary.sent += 1;
                },
                Err(error) => {
                    tracing::warn!(entrant = %recipient, ?kind, %error, "Failed to notify entrant");
                    summary.failed += 1;
                },
            }
        }
        LotteryMetrics::record_notifications(summary.sent, summary.failed);
        summary
    }

    async fn transition<F>(
        &self,
        event_id: &EventId,
        action: &'static str,
        apply: F,
    ) -> Result<bool, LotteryError>
    where
        F: FnOnce(&mut Waitlist) -> bool,
    {
        let guard = self.locks.acquire(event_id).await;
        let mut event = self
            .repository
            .load_event(event_id)
            .await?
            .ok_or_else(|| LotteryError::EventNotFound(event_id.clone()))?;

        let mut waitlist = Waitlist::from_event(&event);
        if !apply(&mut waitlist) {
            tracing::debug!(%event_id, action, "Transition not applicable");
            return Ok(false);
        }
        waitlist.check_invariants()?;
        waitlist.apply_to(&mut event);

        let repository = Arc::clone(&self.repository);
        release_after(guard, async move { repository.update_event(event).await }).await?;
        tracing::info!(%event_id, action, "Entrant lists updated");
        Ok(true)
    }
}

/// Runs the initial draw once registration has closed.
fn auto_run(service: &LotteryService, event: &mut Event, now: DateTime<Utc>) -> DrawOutcome {
    let kind = DrawKind::Initial;
    if event.lottery_completed() {
        tracing::debug!("Auto-run skipped, lottery already ran");
        return skip(kind, SkipReason::AlreadyCompleted);
    }
    match event.registration_end {
        None => skip(kind, SkipReason::NoRegistrationDeadline),
        Some(end) if now <= end => skip(kind, SkipReason::RegistrationOpen),
        Some(_) => {
            tracing::debug!("Registration closed, auto-running lottery");
            service.run_lottery(event)
        },
    }
}

/// Spawns `write` on a task that owns `guard`.
///
/// The task is spawned before this returns, so the event stays locked until
/// the write settles even if the returned future is dropped.
fn release_after<F>(
    guard: EventGuard,
    write: F,
) -> impl Future<Output = Result<(), StorageError>> + Send
where
    F: Future<Output = Result<(), StorageError>> + Send + 'static,
{
    let task = tokio::spawn(async move {
        let result = write.await;
        tracing::trace!(event_id = %guard.event_id(), "Releasing event lock");
        drop(guard);
        result
    });
    async move {
        task.await
            .unwrap_or_else(|join_error| Err(StorageError::Interrupted(join_error.to_string())))
    }
}

fn notifications_for(
    event: &Event,
    entrants: &[EntrantId],
    kind: NotificationKind,
) -> Vec<Notification> {
    entrants
        .iter()
        .map(|entrant| Notification {
            recipient: entrant.clone(),
            event_id: event.event_id.clone(),
            event_title: event.title.clone(),
            kind,
        })
        .collect()
}
