//! # Waitlist Lottery Testing
//!
//! Testing utilities for the waitlist lottery.
//!
//! This crate provides:
//! - In-memory implementations of the collaborator traits
//! - A fixed clock for deterministic time
//! - Fixtures for common event shapes
//!
//! ## Example
//!
//! ```ignore
//! use waitlist_lottery_testing::{fixtures, InMemoryEventRepository};
//!
//! #[tokio::test]
//! async fn draws_to_capacity() {
//!     let repository = Arc::new(InMemoryEventRepository::new());
//!     let service = LotteryService::new(repository.clone()).with_seed(7);
//!     let mut event = fixtures::event_with_waitlist("evt", 2, 6);
//!
//!     let outcome = service.run_lottery(&mut event);
//!     outcome.into_draw().unwrap().write.outcome().await.unwrap();
//!     assert_eq!(repository.write_count(), 1);
//! }
//! ```

use chrono::{DateTime, Utc};
use waitlist_lottery_core::environment::Clock;

pub mod mocks;

/// Fixed and adjustable clocks
pub mod clock {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Returns the configured time until [`FixedClock::set`] moves it.
    ///
    /// # Example
    ///
    /// ```
    /// use waitlist_lottery_testing::clock::FixedClock;
    /// use waitlist_lottery_core::environment::Clock;
    /// use chrono::{Duration, Utc};
    ///
    /// let start = Utc::now();
    /// let clock = FixedClock::new(start);
    /// assert_eq!(clock.now(), start);
    ///
    /// clock.advance(Duration::hours(1));
    /// assert_eq!(clock.now(), start + Duration::hours(1));
    /// ```
    #[derive(Debug)]
    pub struct FixedClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Mutex::new(time),
            }
        }

        /// Move the clock to `time`
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = time;
        }

        /// Move the clock forward by `delta`
        pub fn advance(&self, delta: chrono::Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += delta;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_epoch())
    }

    /// The instant [`test_clock`] starts at
    #[must_use]
    pub fn test_epoch() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap_or_default()
    }
}

/// Event fixtures
pub mod fixtures {
    use waitlist_lottery_core::{EntrantId, Event, EventId, EventStatus};

    /// Entrant ids `w1..=wn`
    #[must_use]
    pub fn entrants(count: usize) -> Vec<EntrantId> {
        (1..=count).map(|n| EntrantId::new(format!("w{n}"))).collect()
    }

    /// An open event with `waiting` entrants named `w1..=wn`
    #[must_use]
    pub fn event_with_waitlist(event_id: &str, max_attendees: u32, waiting: usize) -> Event {
        Event::new(EventId::new(event_id), format!("Event {event_id}"), max_attendees)
            .with_status(EventStatus::OpenForRegistration)
            .with_waiting_list(entrants(waiting))
    }
}

pub use clock::{FixedClock, test_clock};
pub use mocks::{InMemoryEventRepository, RecordingNotifier};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
        assert_eq!(time1, clock::test_epoch());
    }

    #[test]
    fn fixture_names_entrants_in_order() {
        let event = fixtures::event_with_waitlist("evt", 2, 3);
        let names: Vec<&str> = event.waiting_list.iter().map(|e| e.as_str()).collect();
        assert_eq!(names, ["w1", "w2", "w3"]);
        assert_eq!(event.max_attendees, 2);
    }
}
