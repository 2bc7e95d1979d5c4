//! Domain types for the waitlist lottery.
//!
//! Identifiers are opaque strings: the lottery never interprets them beyond
//! equality. The [`Event`] record mirrors the document kept by the storage
//! collaborator; the lottery only reads and mutates the fields related to
//! registration and admission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an event
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Wraps an existing identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates a new random `EventId`
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identifier of an entrant (a user registered for an event)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntrantId(String);

impl EntrantId {
    /// Wraps an existing identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntrantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntrantId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EntrantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ============================================================================
// Event lifecycle
// ============================================================================

/// Lifecycle of an event.
///
/// The lottery only ever moves an event to [`EventStatus::LotteryCompleted`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    /// Not yet published
    #[default]
    Draft,
    /// Accepting entrants on the waiting list
    OpenForRegistration,
    /// Registration period is over
    RegistrationClosed,
    /// The initial draw has selected entrants
    LotteryCompleted,
    /// The event took place
    EventCompleted,
    /// The event was called off
    Cancelled,
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Draft => "DRAFT",
            Self::OpenForRegistration => "OPEN_FOR_REGISTRATION",
            Self::RegistrationClosed => "REGISTRATION_CLOSED",
            Self::LotteryCompleted => "LOTTERY_COMPLETED",
            Self::EventCompleted => "EVENT_COMPLETED",
            Self::Cancelled => "CANCELLED",
        };
        f.write_str(label)
    }
}

/// The four entrant lists kept per event.
///
/// An entrant is in at most one list at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    /// Registered, not yet admitted
    Waiting,
    /// Admitted by a draw, consuming capacity
    Selected,
    /// Declined or withdrew after being selected
    Cancelled,
    /// Accepted a selected slot
    Confirmed,
}

impl ListKind {
    /// All list kinds, in lifecycle order
    pub const ALL: [Self; 4] = [
        Self::Waiting,
        Self::Selected,
        Self::Cancelled,
        Self::Confirmed,
    ];
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Waiting => "waiting",
            Self::Selected => "selected",
            Self::Cancelled => "cancelled",
            Self::Confirmed => "confirmed",
        };
        f.write_str(label)
    }
}

/// Where an entrant was when they joined a waiting list
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Degrees north of the equator
    pub latitude: f64,
    /// Degrees east of Greenwich
    pub longitude: f64,
}

impl GeoPoint {
    /// Creates a point from latitude and longitude in degrees
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

// ============================================================================
// Event record
// ============================================================================

/// An event as stored by the document store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Unique event identifier
    pub event_id: EventId,
    /// Display title, used in notifications
    #[serde(default)]
    pub title: String,
    /// Admission capacity
    pub max_attendees: u32,
    /// Cap on the waiting list (`None` = unbounded)
    #[serde(default)]
    pub max_waiting_list_size: Option<u32>,
    /// Lifecycle status
    #[serde(default)]
    pub status: EventStatus,
    /// Set once the initial draw has completed
    #[serde(default)]
    pub lottery_has_run: bool,
    /// After this instant the lottery may be run automatically
    #[serde(default)]
    pub registration_end: Option<DateTime<Utc>>,
    /// Entrants registered but not admitted
    #[serde(default)]
    pub waiting_list: Vec<EntrantId>,
    /// Entrants admitted by a draw
    #[serde(default)]
    pub selected_attendees: Vec<EntrantId>,
    /// Entrants who declined a selected slot
    #[serde(default)]
    pub cancelled_attendees: Vec<EntrantId>,
    /// Entrants who accepted a selected slot
    #[serde(default)]
    pub confirmed_attendees: Vec<EntrantId>,
    /// How many entries of `cancelled_attendees` already had their slot refilled
    #[serde(default)]
    pub replaced_cancellations: u32,
    /// Entrants must share their location to join the waiting list
    #[serde(default)]
    pub geolocation_required: bool,
    /// Join location of each entrant who shared one
    #[serde(default)]
    pub waiting_list_locations: BTreeMap<EntrantId, GeoPoint>,
}

impl Event {
    /// Creates a draft event with empty lists
    #[must_use]
    pub fn new(event_id: EventId, title: impl Into<String>, max_attendees: u32) -> Self {
        Self {
            event_id,
            title: title.into(),
            max_attendees,
            max_waiting_list_size: None,
            status: EventStatus::Draft,
            lottery_has_run: false,
            registration_end: None,
            waiting_list: Vec::new(),
            selected_attendees: Vec::new(),
            cancelled_attendees: Vec::new(),
            confirmed_attendees: Vec::new(),
            replaced_cancellations: 0,
            geolocation_required: false,
            waiting_list_locations: BTreeMap::new(),
        }
    }

    /// Sets the initial waiting list
    #[must_use]
    pub fn with_waiting_list<I, T>(mut self, entrants: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<EntrantId>,
    {
        self.waiting_list = entrants.into_iter().map(Into::into).collect();
        self
    }

    /// Caps the waiting list
    #[must_use]
    pub const fn with_max_waiting_list_size(mut self, max: u32) -> Self {
        self.max_waiting_list_size = Some(max);
        self
    }

    /// Sets the registration deadline
    #[must_use]
    pub const fn with_registration_end(mut self, end: DateTime<Utc>) -> Self {
        self.registration_end = Some(end);
        self
    }

    /// Requires a location from every entrant joining the waiting list
    #[must_use]
    pub const fn with_geolocation_required(mut self) -> Self {
        self.geolocation_required = true;
        self
    }

    /// Sets the lifecycle status
    #[must_use]
    pub const fn with_status(mut self, status: EventStatus) -> Self {
        self.status = status;
        self
    }

    /// Whether the initial draw has already been performed
    #[must_use]
    pub fn lottery_completed(&self) -> bool {
        self.lottery_has_run || self.status == EventStatus::LotteryCompleted
    }

    /// Cancellations whose slot has not been refilled yet
    #[must_use]
    pub fn unreplaced_cancellations(&self) -> usize {
        self.cancelled_attendees
            .len()
            .saturating_sub(self.replaced_cancellations as usize)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn status_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&EventStatus::LotteryCompleted).unwrap();
        assert_eq!(json, "\"LOTTERY_COMPLETED\"");
        assert_eq!(EventStatus::LotteryCompleted.to_string(), "LOTTERY_COMPLETED");
    }

    #[test]
    fn event_document_fills_missing_lists() {
        let json = r#"{"eventId":"evt-1","maxAttendees":3}"#;
        let event: Event = serde_json::from_str(json).unwrap();

        assert_eq!(event.event_id.as_str(), "evt-1");
        assert_eq!(event.status, EventStatus::Draft);
        assert!(event.waiting_list.is_empty());
        assert!(event.cancelled_attendees.is_empty());
        assert_eq!(event.replaced_cancellations, 0);
        assert!(!event.geolocation_required);
        assert!(event.waiting_list_locations.is_empty());
    }

    #[test]
    fn locations_are_keyed_by_entrant_in_the_document() {
        let mut event = Event::new(EventId::new("evt"), "Hike", 4).with_geolocation_required();
        event
            .waiting_list_locations
            .insert(EntrantId::new("w1"), GeoPoint::new(53.5, -113.5));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["geolocationRequired"], true);
        assert_eq!(json["waitingListLocations"]["w1"]["latitude"], 53.5);

        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn unreplaced_cancellations_saturates() {
        let mut event = Event::new(EventId::new("evt"), "Gala", 2);
        event.cancelled_attendees = vec![EntrantId::new("a")];
        event.replaced_cancellations = 3;
        assert_eq!(event.unreplaced_cancellations(), 0);

        event.replaced_cancellations = 0;
        assert_eq!(event.unreplaced_cancellations(), 1);
    }
}
