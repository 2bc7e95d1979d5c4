//! # Waitlist Lottery Core
//!
//! Domain types and the entrant state machine for capacity-constrained event
//! registration decided by a randomized lottery.
//!
//! ## Core Concepts
//!
//! - **Event**: a document with a capacity and four entrant lists
//! - **Waitlist**: in-memory owner of those lists for one operation, exposing
//!   the only legal transitions between them
//! - **`EventRepository`**: injected storage collaborator
//! - **Notifier**: injected delivery of entrant-facing messages
//! - **Clock**: injected time source
//!
//! The draw algorithms themselves live in `waitlist-lottery-runtime`.
//!
//! ## Example
//!
//! ```
//! use waitlist_lottery_core::{EntrantId, Event, EventId, ListKind, Waitlist};
//!
//! let event = Event::new(EventId::new("evt-1"), "Pottery Class", 2)
//!     .with_waiting_list(["ana", "ben", "cho"]);
//!
//! let mut waitlist = Waitlist::from_event(&event);
//! let ben = EntrantId::new("ben");
//! assert!(waitlist.move_to_selected(&ben));
//! assert_eq!(waitlist.state_of(&ben), Some(ListKind::Selected));
//! assert!(waitlist.check_invariants().is_ok());
//! ```

pub use chrono::{DateTime, Utc};

pub mod event_repository;
pub mod notification;
pub mod types;
pub mod waitlist;

/// Environment module - injected dependencies other than storage and delivery
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use waitlist_lottery_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let before = chrono::Utc::now();
    /// assert!(clock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

pub use event_repository::{EventRepository, StorageError, StorageFuture};
pub use notification::{Notification, NotificationKind, Notifier, NotifyError};
pub use types::{EntrantId, Event, EventId, EventStatus, GeoPoint, ListKind};
pub use waitlist::{InvariantViolation, Waitlist};
