//! Entrant notifications.
//!
//! Delivery is fire-and-forget: a failed notification is logged by the caller
//! and never affects admission decisions.

use crate::types::{EntrantId, EventId};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// What happened to the entrant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Drawn in the initial lottery or as a replacement
    Selected,
    /// Still on the waiting list after the initial lottery
    NotSelected,
}

/// A message addressed to one entrant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Recipient
    pub recipient: EntrantId,
    /// Event the message is about
    pub event_id: EventId,
    /// Event title for display
    pub event_title: String,
    /// Message kind
    pub kind: NotificationKind,
}

impl Notification {
    /// Human-readable message body
    #[must_use]
    pub fn message(&self) -> String {
        match self.kind {
            NotificationKind::Selected => {
                format!("You have been selected for {}", self.event_title)
            },
            NotificationKind::NotSelected => format!(
                "You were not selected for {} and remain on the waiting list",
                self.event_title
            ),
        }
    }
}

/// Notification delivery failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The recipient has no reachable device or address.
    #[error("No delivery target for entrant {0}")]
    Unreachable(EntrantId),

    /// The delivery service rejected or dropped the message.
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Sends notifications to entrants.
pub trait Notifier: Send + Sync {
    /// Deliver one notification.
    ///
    /// # Errors
    ///
    /// Returns a [`NotifyError`] when delivery fails.
    fn notify(
        &self,
        notification: Notification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_mentions_event_title() {
        let notification = Notification {
            recipient: EntrantId::new("w1"),
            event_id: EventId::new("evt"),
            event_title: "Swim Lessons".to_string(),
            kind: NotificationKind::NotSelected,
        };
        assert!(notification.message().contains("Swim Lessons"));
        assert!(notification.message().contains("waiting list"));
    }
}
