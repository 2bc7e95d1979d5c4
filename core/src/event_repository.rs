//! Storage collaborator for event documents.
//!
//! The lottery depends only on this narrow trait, never on a concrete
//! database client. Production code plugs in a document-store adapter; tests
//! use `InMemoryEventRepository` from the `waitlist-lottery-testing` crate.
//!
//! # Example
//!
//! ```no_run
//! use waitlist_lottery_core::event_repository::{EventRepository, StorageError};
//! use waitlist_lottery_core::types::EventId;
//!
//! async fn rename<R: EventRepository>(repo: &R) -> Result<(), StorageError> {
//!     let id = EventId::new("evt-42");
//!     if let Some(mut event) = repo.load_event(&id).await? {
//!         event.title = "Spring Gala".to_string();
//!         repo.update_event(event).await?;
//!     }
//!     Ok(())
//! }
//! ```

use crate::types::{Event, EventId};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur while reading or writing event documents.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The backing store could not be reached or refused the request.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// The document could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The write task ended before reporting a result.
    #[error("Write interrupted: {0}")]
    Interrupted(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

/// Boxed future returned by [`EventRepository`] methods.
pub type StorageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StorageError>> + Send + 'a>>;

/// Durable storage of event records.
///
/// # Dyn Compatibility
///
/// Methods return boxed futures so the repository can be shared as
/// `Arc<dyn EventRepository>` and moved into spawned write tasks.
pub trait EventRepository: Send + Sync {
    /// Persist the full event record, replacing the stored copy.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] when the write does not become durable.
    fn update_event(&self, event: Event) -> StorageFuture<'_, ()>;

    /// Load an event by id. A missing event is `Ok(None)`, not an error.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] when the store cannot be read.
    fn load_event(&self, event_id: &EventId) -> StorageFuture<'_, Option<Event>>;
}
