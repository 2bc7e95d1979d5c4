//! # Waitlist Lottery Runtime
//!
//! Admission control for capacity-constrained events.
//!
//! ## Core Components
//!
//! - **`LotteryService`**: initial and replacement draws against a waitlist,
//!   with the storage write spawned in the background
//! - **`LotteryCoordinator`**: loads events, serializes operations per event,
//!   awaits writes and notifies entrants
//! - **`EventLocks`**: one async mutex per event id
//! - **`LotteryConfig`**: environment-driven configuration
//!
//! ## Example
//!
//! ```ignore
//! use waitlist_lottery_runtime::{LotteryCoordinator, LotteryService};
//!
//! let service = Arc::new(LotteryService::new(repository));
//! let coordinator = LotteryCoordinator::new(service, notifier, Arc::new(SystemClock));
//!
//! let report = coordinator.run_lottery(&event_id).await?;
//! if let Some(draw) = report.completed() {
//!     println!("selected {:?}", draw.selected);
//! }
//! ```

/// Environment-driven configuration
pub mod config;

/// Caller-side orchestration with per-event serialization
pub mod coordinator;

/// Per-event mutual exclusion
pub mod locks;

/// Initial and replacement draws
pub mod lottery;

/// Prometheus metrics for observability
pub mod metrics;

/// Error types for coordinated operations
pub mod error {
    use thiserror::Error;
    use waitlist_lottery_core::{EventId, InvariantViolation, StorageError};

    /// Errors that can occur during coordinated lottery operations
    ///
    /// Draw no-ops are not errors; they are reported as skip reasons.
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum LotteryError {
        /// The event does not exist
        #[error("Event not found: {0}")]
        EventNotFound(EventId),

        /// Loading or saving the event failed
        #[error(transparent)]
        Storage(#[from] StorageError),

        /// The stored lists are inconsistent
        #[error("Entrant lists are inconsistent: {0}")]
        Invariant(#[from] InvariantViolation),
    }
}

pub use config::{DrawConfig, LotteryConfig, ObservabilityConfig};
pub use coordinator::{CompletedDraw, DispatchSummary, DrawReport, LotteryCoordinator};
pub use error::LotteryError;
pub use locks::{EventGuard, EventLocks};
pub use lottery::{
    Draw, DrawKind, DrawOutcome, LotteryService, SkipReason, WaitlistProvider, WriteHandle,
    draw_distinct,
};
