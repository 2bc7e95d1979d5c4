//! The entrant state machine for one event.
//!
//! A [`Waitlist`] owns the four entrant lists of an event for the duration of
//! one operation. It is built from the event's current lists, mutated through
//! the transition methods, and written back with [`Waitlist::apply_to`]. It
//! performs no I/O.
//!
//! ```text
//! waiting ──► selected ──► confirmed
//!    │           │  ▲
//!    ▼           ▼  │
//!  (left)     cancelled
//! ```
//!
//! Events that require geolocation only accept entrants who share a
//! [`GeoPoint`]; the point is kept until the entrant leaves the waiting list.
//!
//! Every transition is a no-op (returning `false`) when its source membership
//! does not hold, so replaying an operation never duplicates an entrant.

use crate::types::{EntrantId, Event, GeoPoint, ListKind};
use std::collections::BTreeMap;
use thiserror::Error;

/// A list state that breaks one of the waitlist invariants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// The same entrant is recorded in two lists.
    #[error("entrant {entrant} is in both the {first} and {second} lists")]
    NotDisjoint {
        /// Offending entrant
        entrant: EntrantId,
        /// First list containing it
        first: ListKind,
        /// Second list containing it
        second: ListKind,
    },

    /// The same entrant appears twice in one list.
    #[error("entrant {entrant} appears more than once in the {list} list")]
    Duplicate {
        /// Offending entrant
        entrant: EntrantId,
        /// List containing the duplicate
        list: ListKind,
    },

    /// More entrants hold a slot than the event admits.
    #[error("{occupied} admitted entrants exceed capacity {capacity}")]
    OverCapacity {
        /// Selected plus confirmed entrants
        occupied: usize,
        /// Event capacity
        capacity: u32,
    },
}

/// Waiting, selected, cancelled and confirmed entrants of one event.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Waitlist {
    max_attendees: u32,
    max_waiting: Option<u32>,
    geolocation_required: bool,
    locations: BTreeMap<EntrantId, GeoPoint>,
    waiting: Vec<EntrantId>,
    selected: Vec<EntrantId>,
    cancelled: Vec<EntrantId>,
    confirmed: Vec<EntrantId>,
}

impl Waitlist {
    /// Creates an empty waitlist admitting at most `max_attendees` entrants.
    #[must_use]
    pub const fn new(max_attendees: u32) -> Self {
        Self {
            max_attendees,
            max_waiting: None,
            geolocation_required: false,
            locations: BTreeMap::new(),
            waiting: Vec::new(),
            selected: Vec::new(),
            cancelled: Vec::new(),
            confirmed: Vec::new(),
        }
    }

    /// Builds a waitlist from the event's current lists.
    #[must_use]
    pub fn from_event(event: &Event) -> Self {
        Self {
            max_attendees: event.max_attendees,
            max_waiting: event.max_waiting_list_size,
            geolocation_required: event.geolocation_required,
            locations: event.waiting_list_locations.clone(),
            waiting: event.waiting_list.clone(),
            selected: event.selected_attendees.clone(),
            cancelled: event.cancelled_attendees.clone(),
            confirmed: event.confirmed_attendees.clone(),
        }
    }

    /// Writes the lists back onto `event`.
    pub fn apply_to(self, event: &mut Event) {
        event.waiting_list = self.waiting;
        event.selected_attendees = self.selected;
        event.cancelled_attendees = self.cancelled;
        event.confirmed_attendees = self.confirmed;
        event.waiting_list_locations = self.locations;
    }

    /// Registers an entrant on the waiting list.
    ///
    /// Returns `false` without changes when the entrant is already in any
    /// list, the waiting list is full, or the event requires a location.
    pub fn add_entrant_to_waitlist(&mut self, entrant: EntrantId) -> bool {
        if self.geolocation_required {
            return false;
        }
        self.enqueue(entrant)
    }

    /// Registers an entrant together with where they joined from.
    ///
    /// Same rules as [`Waitlist::add_entrant_to_waitlist`], except that a
    /// location is accepted whether or not the event requires one.
    pub fn add_entrant_with_location(&mut self, entrant: EntrantId, location: GeoPoint) -> bool {
        if !self.enqueue(entrant.clone()) {
            return false;
        }
        self.locations.insert(entrant, location);
        true
    }

    /// Removes a waiting entrant, forgetting their join location.
    ///
    /// Returns `false` when the entrant is not waiting. Selected entrants
    /// decline through [`Waitlist::move_to_cancelled`] instead.
    pub fn leave_waitlist(&mut self, entrant: &EntrantId) -> bool {
        if !remove(&mut self.waiting, entrant) {
            return false;
        }
        self.locations.remove(entrant);
        true
    }

    fn enqueue(&mut self, entrant: EntrantId) -> bool {
        if self.state_of(&entrant).is_some() {
            return false;
        }
        if self
            .max_waiting
            .is_some_and(|max| self.waiting.len() >= max as usize)
        {
            return false;
        }
        self.waiting.push(entrant);
        true
    }

    /// Admits an entrant from the waiting list, or re-admits a cancelled one.
    ///
    /// Returns `false` when the entrant is in neither source list or no
    /// capacity remains.
    pub fn move_to_selected(&mut self, entrant: &EntrantId) -> bool {
        if self.remaining_capacity() == 0 {
            return false;
        }
        let taken = remove(&mut self.waiting, entrant) || remove(&mut self.cancelled, entrant);
        if taken {
            self.selected.push(entrant.clone());
        }
        taken
    }

    /// Records that a selected entrant declined their slot.
    pub fn move_to_cancelled(&mut self, entrant: &EntrantId) -> bool {
        if !remove(&mut self.selected, entrant) {
            return false;
        }
        self.cancelled.push(entrant.clone());
        true
    }

    /// Records that a selected entrant accepted their slot.
    ///
    /// The entrant leaves the selected list but keeps consuming capacity.
    pub fn add_to_confirmed(&mut self, entrant: &EntrantId) -> bool {
        if !remove(&mut self.selected, entrant) {
            return false;
        }
        self.confirmed.push(entrant.clone());
        true
    }

    /// Entrants waiting for a draw
    #[must_use]
    pub fn waiting_list(&self) -> &[EntrantId] {
        &self.waiting
    }

    /// Entrants admitted by a draw
    #[must_use]
    pub fn selected_list(&self) -> &[EntrantId] {
        &self.selected
    }

    /// Entrants who declined
    #[must_use]
    pub fn cancelled_list(&self) -> &[EntrantId] {
        &self.cancelled
    }

    /// Entrants who accepted
    #[must_use]
    pub fn confirmed_list(&self) -> &[EntrantId] {
        &self.confirmed
    }

    /// The list of the given kind
    #[must_use]
    pub fn list(&self, kind: ListKind) -> &[EntrantId] {
        match kind {
            ListKind::Waiting => &self.waiting,
            ListKind::Selected => &self.selected,
            ListKind::Cancelled => &self.cancelled,
            ListKind::Confirmed => &self.confirmed,
        }
    }

    /// Where the entrant joined from, if they shared a location
    #[must_use]
    pub fn location_of(&self, entrant: &EntrantId) -> Option<GeoPoint> {
        self.locations.get(entrant).copied()
    }

    /// Which list the entrant is currently in, if any
    #[must_use]
    pub fn state_of(&self, entrant: &EntrantId) -> Option<ListKind> {
        ListKind::ALL
            .into_iter()
            .find(|kind| self.list(*kind).contains(entrant))
    }

    /// Event capacity
    #[must_use]
    pub const fn max_attendees(&self) -> u32 {
        self.max_attendees
    }

    /// Entrants holding a slot (selected plus confirmed)
    #[must_use]
    pub fn occupied(&self) -> usize {
        self.selected.len() + self.confirmed.len()
    }

    /// Slots still available for admission
    #[must_use]
    pub fn remaining_capacity(&self) -> usize {
        (self.max_attendees as usize).saturating_sub(self.occupied())
    }

    /// Verifies disjointness, uniqueness and capacity.
    ///
    /// # Errors
    ///
    /// Returns the first [`InvariantViolation`] found.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut seen: std::collections::HashMap<&EntrantId, ListKind> =
            std::collections::HashMap::new();
        for kind in ListKind::ALL {
            for entrant in self.list(kind) {
                if let Some(first) = seen.insert(entrant, kind) {
                    return Err(if first == kind {
                        InvariantViolation::Duplicate {
                            entrant: entrant.clone(),
                            list: kind,
                        }
                    } else {
                        InvariantViolation::NotDisjoint {
                            entrant: entrant.clone(),
                            first,
                            second: kind,
                        }
                    });
                }
            }
        }

        let occupied = self.occupied();
        if occupied > self.max_attendees as usize {
            return Err(InvariantViolation::OverCapacity {
                occupied,
                capacity: self.max_attendees,
            });
        }
        Ok(())
    }
}

fn remove(list: &mut Vec<EntrantId>, entrant: &EntrantId) -> bool {
    match list.iter().position(|e| e == entrant) {
        Some(index) => {
            list.remove(index);
            true
        },
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventId;

    fn id(s: &str) -> EntrantId {
        EntrantId::new(s)
    }

    #[test]
    fn enqueue_is_idempotent() {
        let mut waitlist = Waitlist::new(2);
        assert!(waitlist.add_entrant_to_waitlist(id("a")));
        assert!(!waitlist.add_entrant_to_waitlist(id("a")));
        assert_eq!(waitlist.waiting_list(), &[id("a")]);
    }

    #[test]
    fn enqueue_rejects_entrant_already_admitted() {
        let mut waitlist = Waitlist::new(2);
        waitlist.add_entrant_to_waitlist(id("a"));
        assert!(waitlist.move_to_selected(&id("a")));

        assert!(!waitlist.add_entrant_to_waitlist(id("a")));
        assert!(waitlist.waiting_list().is_empty());
        assert!(waitlist.check_invariants().is_ok());
    }

    #[test]
    fn enqueue_respects_waiting_cap() {
        let event = Event::new(EventId::new("evt"), "Cap", 1).with_max_waiting_list_size(2);
        let mut waitlist = Waitlist::from_event(&event);
        assert!(waitlist.add_entrant_to_waitlist(id("a")));
        assert!(waitlist.add_entrant_to_waitlist(id("b")));
        assert!(!waitlist.add_entrant_to_waitlist(id("c")));
        assert_eq!(waitlist.waiting_list().len(), 2);
    }

    #[test]
    fn move_to_selected_from_waiting() {
        let mut waitlist = Waitlist::new(2);
        waitlist.add_entrant_to_waitlist(id("a"));
        waitlist.add_entrant_to_waitlist(id("b"));

        assert!(waitlist.move_to_selected(&id("b")));
        assert_eq!(waitlist.waiting_list(), &[id("a")]);
        assert_eq!(waitlist.selected_list(), &[id("b")]);
        assert_eq!(waitlist.state_of(&id("b")), Some(ListKind::Selected));
    }

    #[test]
    fn move_to_selected_ignores_unknown_entrant() {
        let mut waitlist = Waitlist::new(2);
        assert!(!waitlist.move_to_selected(&id("ghost")));
        assert!(waitlist.selected_list().is_empty());
    }

    #[test]
    fn move_to_selected_stops_at_capacity() {
        let mut waitlist = Waitlist::new(1);
        waitlist.add_entrant_to_waitlist(id("a"));
        waitlist.add_entrant_to_waitlist(id("b"));

        assert!(waitlist.move_to_selected(&id("a")));
        assert!(!waitlist.move_to_selected(&id("b")));
        assert_eq!(waitlist.waiting_list(), &[id("b")]);
        assert_eq!(waitlist.remaining_capacity(), 0);
    }

    #[test]
    fn cancelled_entrant_can_be_readmitted() {
        let mut waitlist = Waitlist::new(1);
        waitlist.add_entrant_to_waitlist(id("a"));
        waitlist.move_to_selected(&id("a"));

        assert!(waitlist.move_to_cancelled(&id("a")));
        assert_eq!(waitlist.cancelled_list(), &[id("a")]);
        assert!(waitlist.move_to_selected(&id("a")));
        assert!(waitlist.cancelled_list().is_empty());
        assert_eq!(waitlist.selected_list(), &[id("a")]);
    }

    #[test]
    fn waiting_entrant_cannot_be_cancelled() {
        let mut waitlist = Waitlist::new(1);
        waitlist.add_entrant_to_waitlist(id("a"));

        assert!(!waitlist.move_to_cancelled(&id("a")));
        assert_eq!(waitlist.state_of(&id("a")), Some(ListKind::Waiting));
    }

    #[test]
    fn confirmation_requires_selection_and_keeps_capacity() {
        let mut waitlist = Waitlist::new(1);
        waitlist.add_entrant_to_waitlist(id("a"));
        waitlist.add_entrant_to_waitlist(id("b"));
        assert!(!waitlist.add_to_confirmed(&id("a")));

        waitlist.move_to_selected(&id("a"));
        assert!(waitlist.add_to_confirmed(&id("a")));
        assert!(!waitlist.add_to_confirmed(&id("a")));
        assert_eq!(waitlist.confirmed_list(), &[id("a")]);
        assert!(waitlist.selected_list().is_empty());

        assert_eq!(waitlist.remaining_capacity(), 0);
        assert!(!waitlist.move_to_selected(&id("b")));
    }

    #[test]
    fn list_by_kind_matches_accessors() {
        let mut waitlist = Waitlist::new(3);
        for name in ["a", "b", "c", "d"] {
            waitlist.add_entrant_to_waitlist(id(name));
        }
        waitlist.move_to_selected(&id("a"));
        waitlist.move_to_selected(&id("b"));
        waitlist.move_to_cancelled(&id("b"));
        waitlist.move_to_selected(&id("c"));
        waitlist.add_to_confirmed(&id("c"));

        assert_eq!(waitlist.list(ListKind::Waiting), waitlist.waiting_list());
        assert_eq!(waitlist.list(ListKind::Selected), &[id("a")]);
        assert_eq!(waitlist.list(ListKind::Cancelled), &[id("b")]);
        assert_eq!(waitlist.list(ListKind::Confirmed), &[id("c")]);
    }

    #[test]
    fn round_trips_through_event() {
        let mut event =
            Event::new(EventId::new("evt"), "Trip", 2).with_waiting_list(["a", "b", "c"]);
        let mut waitlist = Waitlist::from_event(&event);
        waitlist.move_to_selected(&id("b"));
        waitlist.apply_to(&mut event);

        assert_eq!(event.waiting_list, vec![id("a"), id("c")]);
        assert_eq!(event.selected_attendees, vec![id("b")]);
    }

    #[test]
    fn detects_corrupted_lists() {
        let mut event = Event::new(EventId::new("evt"), "Bad", 1).with_waiting_list(["a"]);
        event.selected_attendees = vec![id("a")];
        assert_eq!(
            Waitlist::from_event(&event).check_invariants(),
            Err(InvariantViolation::NotDisjoint {
                entrant: id("a"),
                first: ListKind::Waiting,
                second: ListKind::Selected,
            })
        );

        event.waiting_list = vec![id("b"), id("b")];
        event.selected_attendees.clear();
        assert!(matches!(
            Waitlist::from_event(&event).check_invariants(),
            Err(InvariantViolation::Duplicate { .. })
        ));

        event.waiting_list.clear();
        event.selected_attendees = vec![id("x"), id("y")];
        assert!(matches!(
            Waitlist::from_event(&event).check_invariants(),
            Err(InvariantViolation::OverCapacity { occupied: 2, capacity: 1 })
        ));
    }

    #[test]
    fn leaving_removes_waiting_entrant_and_location() {
        let mut waitlist = Waitlist::new(2);
        let here = GeoPoint::new(51.05, -114.07);
        assert!(waitlist.add_entrant_with_location(id("a"), here));
        waitlist.add_entrant_to_waitlist(id("b"));
        assert_eq!(waitlist.location_of(&id("a")), Some(here));

        assert!(waitlist.leave_waitlist(&id("a")));
        assert_eq!(waitlist.state_of(&id("a")), None);
        assert_eq!(waitlist.location_of(&id("a")), None);
        assert!(!waitlist.leave_waitlist(&id("a")));

        // Selected entrants decline instead of leaving
        waitlist.move_to_selected(&id("b"));
        assert!(!waitlist.leave_waitlist(&id("b")));
        assert_eq!(waitlist.selected_list(), &[id("b")]);
    }

    #[test]
    fn required_location_blocks_plain_registration() {
        let event = Event::new(EventId::new("evt"), "Hike", 3).with_geolocation_required();
        let mut waitlist = Waitlist::from_event(&event);

        assert!(!waitlist.add_entrant_to_waitlist(id("a")));
        assert!(waitlist.add_entrant_with_location(id("a"), GeoPoint::new(0.0, 0.0)));
        assert!(!waitlist.add_entrant_with_location(id("a"), GeoPoint::new(1.0, 1.0)));
        assert_eq!(waitlist.location_of(&id("a")), Some(GeoPoint::new(0.0, 0.0)));

        let mut event = event;
        waitlist.apply_to(&mut event);
        assert_eq!(event.waiting_list, vec![id("a")]);
        assert_eq!(event.waiting_list_locations.len(), 1);
    }

    #[test]
    fn location_survives_admission() {
        let mut waitlist = Waitlist::new(1);
        waitlist.add_entrant_with_location(id("a"), GeoPoint::new(10.0, 20.0));
        waitlist.move_to_selected(&id("a"));

        assert!(waitlist.location_of(&id("a")).is_some());
        assert_eq!(waitlist.max_attendees(), 1);
    }
}
