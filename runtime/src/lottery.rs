//! Admission control: the initial draw and replacement draws.
//!
//! [`LotteryService`] runs synchronously against a [`Waitlist`] built from the
//! event, writes the result back onto the event, and hands the event to the
//! storage collaborator on a spawned task. The caller gets a [`WriteHandle`]
//! for the durable write; the in-memory event is final as soon as the draw
//! returns.
//!
//! Steady-state no-ops (empty waiting list, nothing cancelled, no capacity)
//! are reported as [`DrawOutcome::Skipped`], never as errors, and never touch
//! storage.
//!
//! This service assumes a single writer per event. Use
//! [`LotteryCoordinator`](crate::coordinator::LotteryCoordinator) when several
//! callers may act on the same event.

use crate::config::DrawConfig;
use crate::metrics::LotteryMetrics;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use waitlist_lottery_core::{
    EntrantId, Event, EventId, EventRepository, EventStatus, InvariantViolation, StorageError,
    Waitlist,
};

/// Builds the [`Waitlist`] a draw operates on.
///
/// Defaults to [`Waitlist::from_event`]; tests substitute their own.
pub type WaitlistProvider = Arc<dyn Fn(&Event) -> Waitlist + Send + Sync>;

/// Which algorithm produced a draw
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DrawKind {
    /// First draw, filling all available capacity
    Initial,
    /// Backfill of slots vacated by cancellations
    Replacement,
}

impl DrawKind {
    /// Metric and log label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Replacement => "replacement",
        }
    }
}

/// Why a draw did nothing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// No event with the requested id
    EventNotFound,
    /// The initial draw already ran for this event
    AlreadyCompleted,
    /// A replacement draw was requested before the initial draw
    LotteryNotRun,
    /// Nobody is waiting
    EmptyWaitlist,
    /// Every slot is taken
    NoCapacity,
    /// No unreplaced cancellations
    NoOpenSlots,
    /// The event has no registration deadline to auto-run against
    NoRegistrationDeadline,
    /// Registration has not closed yet
    RegistrationOpen,
    /// The resulting lists would break an invariant, so nothing was committed
    Inconsistent(InvariantViolation),
}

impl SkipReason {
    /// Metric and log label
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::EventNotFound => "event_not_found",
            Self::AlreadyCompleted => "already_completed",
            Self::LotteryNotRun => "lottery_not_run",
            Self::EmptyWaitlist => "empty_waitlist",
            Self::NoCapacity => "no_capacity",
            Self::NoOpenSlots => "no_open_slots",
            Self::NoRegistrationDeadline => "no_registration_deadline",
            Self::RegistrationOpen => "registration_open",
            Self::Inconsistent(_) => "inconsistent",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inconsistent(violation) => write!(f, "inconsistent: {violation}"),
            other => f.write_str(other.label()),
        }
    }
}

/// Handle to the asynchronous storage write of a draw.
///
/// Dropping the handle detaches the write; it still runs to completion and
/// its failure is still logged.
#[derive(Debug)]
pub struct WriteHandle {
    event_id: EventId,
    task: JoinHandle<Result<(), StorageError>>,
}

impl WriteHandle {
    /// Event being written
    #[must_use]
    pub const fn event_id(&self) -> &EventId {
        &self.event_id
    }

    /// Whether the write has finished, successfully or not
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the write to settle.
    ///
    /// # Errors
    ///
    /// Returns the storage collaborator's error, or
    /// [`StorageError::Interrupted`] if the write task was aborted.
    pub async fn outcome(self) -> Result<(), StorageError> {
        match self.task.await {
            Ok(result) => result,
            Err(join_error) => Err(StorageError::Interrupted(join_error.to_string())),
        }
    }
}

/// A committed draw.
#[derive(Debug)]
pub struct Draw {
    /// Algorithm that ran
    pub kind: DrawKind,
    /// Entrants admitted by this draw, in draw order
    pub selected: Vec<EntrantId>,
    /// Entrants left on the waiting list
    pub still_waiting: Vec<EntrantId>,
    /// Pending storage write carrying the updated event
    pub write: WriteHandle,
}

/// Result of [`LotteryService::run_lottery`] or
/// [`LotteryService::draw_replacements`].
#[derive(Debug)]
#[must_use]
pub enum DrawOutcome {
    /// Entrants were admitted and the event was submitted to storage
    Drawn(Draw),
    /// Nothing changed and nothing was written
    Skipped(SkipReason),
}

impl DrawOutcome {
    /// Whether at least one entrant was admitted
    #[must_use]
    pub fn drew_any(&self) -> bool {
        matches!(self, Self::Drawn(draw) if !draw.selected.is_empty())
    }

    /// Entrants admitted by this draw
    #[must_use]
    pub fn selected(&self) -> &[EntrantId] {
        match self {
            Self::Drawn(draw) => &draw.selected,
            Self::Skipped(_) => &[],
        }
    }

    /// Why nothing happened, if nothing did
    #[must_use]
    pub const fn skip_reason(&self) -> Option<&SkipReason> {
        match self {
            Self::Drawn(_) => None,
            Self::Skipped(reason) => Some(reason),
        }
    }

    /// The committed draw, if any
    #[must_use]
    pub fn into_draw(self) -> Option<Draw> {
        match self {
            Self::Drawn(draw) => Some(draw),
            Self::Skipped(_) => None,
        }
    }
}

/// Draws `count` distinct entrants from `pool`, uniformly without replacement.
///
/// Returns fewer than `count` entrants when the pool is smaller. Every
/// entrant of the pool is equally likely to be drawn regardless of position.
pub fn draw_distinct<R: Rng + ?Sized>(
    rng: &mut R,
    pool: &[EntrantId],
    count: usize,
) -> Vec<EntrantId> {
    let amount = count.min(pool.len());
    rand::seq::index::sample(rng, pool.len(), amount)
        .into_iter()
        .map(|index| pool[index].clone())
        .collect()
}

/// Runs lottery draws and submits the results to storage.
pub struct LotteryService {
    repository: Arc<dyn EventRepository>,
    waitlist_provider: WaitlistProvider,
    rng: Mutex<StdRng>,
}

impl fmt::Debug for LotteryService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LotteryService").finish_non_exhaustive()
    }
}

impl LotteryService {
    /// Create a service writing to `repository`, seeded from OS entropy.
    #[must_use]
    pub fn new(repository: Arc<dyn EventRepository>) -> Self {
        Self {
            repository,
            waitlist_provider: Arc::new(Waitlist::from_event),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Create a service from configuration.
    #[must_use]
    pub fn from_config(repository: Arc<dyn EventRepository>, config: &DrawConfig) -> Self {
        let service = Self::new(repository);
        match config.rng_seed {
            Some(seed) => service.with_seed(seed),
            None => service,
        }
    }

    /// Use a deterministic random sequence.
    #[must_use]
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    /// Replace the waitlist provider.
    #[must_use]
    pub fn with_waitlist_provider(self, waitlist_provider: WaitlistProvider) -> Self {
        Self {
            waitlist_provider,
            ..self
        }
    }

    /// Storage collaborator this service writes to
    #[must_use]
    pub fn repository(&self) -> Arc<dyn EventRepository> {
        Arc::clone(&self.repository)
    }

    /// Run the initial draw.
    ///
    /// Admits up to the remaining capacity from the waiting list, marks the
    /// event `LOTTERY_COMPLETED` and submits it to storage once.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime, since the storage write is
    /// spawned onto it.
    #[tracing::instrument(skip(self, event), fields(event_id = %event.event_id))]
    pub fn run_lottery(&self, event: &mut Event) -> DrawOutcome {
        let kind = DrawKind::Initial;
        if event.lottery_completed() {
            tracing::info!("Lottery already completed");
            return skip(kind, SkipReason::AlreadyCompleted);
        }

        let mut waitlist = (self.waitlist_provider)(event);
        if waitlist.waiting_list().is_empty() {
            tracing::info!("No entrants on waiting list");
            return skip(kind, SkipReason::EmptyWaitlist);
        }

        let slots = waitlist.remaining_capacity();
        if slots == 0 {
            tracing::info!(
                max_attendees = waitlist.max_attendees(),
                occupied = waitlist.occupied(),
                "No available slots"
            );
            return skip(kind, SkipReason::NoCapacity);
        }

        let drawn = self.draw(waitlist.waiting_list(), slots);
        let selected = admit(&mut waitlist, drawn);
        if let Err(violation) = waitlist.check_invariants() {
            tracing::error!(%violation, "Draw would corrupt entrant lists, not committing");
            return skip(kind, SkipReason::Inconsistent(violation));
        }

        let still_waiting = waitlist.waiting_list().to_vec();
        waitlist.apply_to(event);
        event.status = EventStatus::LotteryCompleted;
        event.lottery_has_run = true;

        tracing::info!(
            selected = selected.len(),
            not_selected = still_waiting.len(),
            "Lottery completed"
        );
        LotteryMetrics::record_draw(kind, selected.len());

        let write = self.submit(event, kind);
        DrawOutcome::Drawn(Draw {
            kind,
            selected,
            still_waiting,
            write,
        })
    }

    /// Backfill slots vacated by cancellations.
    ///
    /// One slot opens per cancellation not yet replaced. The event is
    /// submitted to storage only when at least one entrant was admitted.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime, since the storage write is
    /// spawned onto it.
    #[tracing::instrument(skip(self, event), fields(event_id = %event.event_id))]
    pub fn draw_replacements(&self, event: &mut Event) -> DrawOutcome {
        let kind = DrawKind::Replacement;
        if !event.lottery_completed() {
            tracing::info!("Lottery has not been run yet");
            return skip(kind, SkipReason::LotteryNotRun);
        }

        let mut waitlist = (self.waitlist_provider)(event);
        let open_slots = event
            .unreplaced_cancellations()
            .min(waitlist.remaining_capacity());
        if open_slots == 0 {
            tracing::info!(
                cancelled = event.cancelled_attendees.len(),
                replaced = event.replaced_cancellations,
                "No open slots for replacements"
            );
            return skip(kind, SkipReason::NoOpenSlots);
        }

        let drawn = self.draw(waitlist.waiting_list(), open_slots);
        let selected = admit(&mut waitlist, drawn);
        if selected.is_empty() {
            tracing::info!(open_slots, "No entrants left to draw as replacements");
            return skip(kind, SkipReason::EmptyWaitlist);
        }
        if let Err(violation) = waitlist.check_invariants() {
            tracing::error!(%violation, "Replacement draw would corrupt entrant lists, not committing");
            return skip(kind, SkipReason::Inconsistent(violation));
        }

        let still_waiting = waitlist.waiting_list().to_vec();
        waitlist.apply_to(event);
        let replaced = u32::try_from(selected.len()).unwrap_or(u32::MAX);
        event.replaced_cancellations = event.replaced_cancellations.saturating_add(replaced);

        tracing::info!(drawn = selected.len(), open_slots, "Replacements drawn");
        LotteryMetrics::record_draw(kind, selected.len());

        let write = self.submit(event, kind);
        DrawOutcome::Drawn(Draw {
            kind,
            selected,
            still_waiting,
            write,
        })
    }

    fn draw(&self, pool: &[EntrantId], count: usize) -> Vec<EntrantId> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        draw_distinct(&mut *rng, pool, count)
    }

    fn submit(&self, event: &Event, kind: DrawKind) -> WriteHandle {
        let repository = Arc::clone(&self.repository);
        let snapshot = event.clone();
        let event_id = event.event_id.clone();

        let task = tokio::spawn(async move {
            let event_id = snapshot.event_id.clone();
            let result = repository.update_event(snapshot).await;
            match &result {
                Ok(()) => {
                    tracing::info!(%event_id, draw = kind.label(), "Event updated in storage");
                },
                Err(error) => {
                    tracing::error!(%event_id, draw = kind.label(), %error, "Failed to update event");
                },
            }
            LotteryMetrics::record_write(result.is_ok());
            result
        });

        WriteHandle { event_id, task }
    }
}

fn admit(waitlist: &mut Waitlist, drawn: Vec<EntrantId>) -> Vec<EntrantId> {
    let mut admitted = Vec::with_capacity(drawn.len());
    for entrant in drawn {
        if waitlist.move_to_selected(&entrant) {
            admitted.push(entrant);
        }
    }
    admitted
}

/// Records a skipped draw and wraps `reason`.
pub(crate) fn skip(kind: DrawKind, reason: SkipReason) -> DrawOutcome {
    LotteryMetrics::record_skip(kind, &reason);
    DrawOutcome::Skipped(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    fn pool(n: usize) -> Vec<EntrantId> {
        (0..n).map(|i| EntrantId::new(format!("e{i}"))).collect()
    }

    #[test]
    fn draw_distinct_never_repeats() {
        let mut rng = StdRng::seed_from_u64(11);
        let pool = pool(10);
        for count in 0..=12 {
            let mut drawn = draw_distinct(&mut rng, &pool, count);
            assert_eq!(drawn.len(), count.min(pool.len()));
            assert!(drawn.iter().all(|e| pool.contains(e)));
            drawn.sort();
            drawn.dedup();
            assert_eq!(drawn.len(), count.min(pool.len()));
        }
    }

    #[test]
    fn draw_distinct_from_empty_pool() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(draw_distinct(&mut rng, &[], 3).is_empty());
    }

    #[test]
    fn draw_distinct_is_uniform_over_positions() {
        let mut rng = StdRng::seed_from_u64(2024);
        let pool = pool(5);
        let trials = 20_000;
        let mut counts = [0usize; 5];

        for _ in 0..trials {
            let drawn = draw_distinct(&mut rng, &pool, 1);
            let index = pool.iter().position(|e| *e == drawn[0]).unwrap_or(0);
            counts[index] += 1;
        }

        // Expected 4000 each, standard deviation ~57
        for count in counts {
            assert!((3_700..=4_300).contains(&count), "skewed counts: {counts:?}");
        }
    }

    #[test]
    fn skips_are_counted_by_reason() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            let outcome = skip(DrawKind::Replacement, SkipReason::NoOpenSlots);
            assert_eq!(outcome.skip_reason(), Some(&SkipReason::NoOpenSlots));
        });

        let rendered = handle.render();
        assert!(rendered.contains("lottery_draws_skipped_total"), "{rendered}");
        assert!(rendered.contains("reason=\"no_open_slots\""), "{rendered}");
        assert!(rendered.contains("kind=\"replacement\""), "{rendered}");
    }

    #[test]
    fn skip_reason_labels_are_stable() {
        assert_eq!(SkipReason::EmptyWaitlist.to_string(), "empty_waitlist");
        assert_eq!(DrawKind::Replacement.label(), "replacement");
    }
}
