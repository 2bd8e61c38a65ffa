use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// A bookable slot on one ground: calendar date + time-slot label.
pub type SlotKey = (NaiveDate, String);

/// Canonical booking record — the source of truth for one reservation.
///
/// Created only by the ledger; the only mutation ever applied is setting
/// `canceled = true`. Canceled records are retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub ground_id: Ulid,
    pub user_id: Ulid,
    pub date: NaiveDate,
    pub time_slot: String,
    pub canceled: bool,
}

/// A booking request staged for admin approval. All fields come from the
/// request itself; nothing is shared across requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSlot {
    pub id: Ulid,
    pub ground_id: Ulid,
    pub user_id: Ulid,
    pub date: NaiveDate,
    /// `"HH:MM"` — doubles as the time-slot label at promotion.
    pub start_time: String,
    pub end_time: String,
    pub requested: bool,
}

#[derive(Debug, Clone)]
pub struct GroundState {
    pub id: Ulid,
    pub admin_id: Ulid,
    pub name: String,
    /// Configured time-slot labels, e.g. `"10:00"`.
    pub available_slots: Vec<String>,
    pub sports: Vec<String>,
    pub published: bool,
    /// Denormalized booking references in insertion order.
    pub bookings: Vec<Ulid>,
    /// Occupancy: (date, slot) → booking id, non-canceled bookings only.
    pub slots_taken: HashMap<SlotKey, Ulid>,
}

impl GroundState {
    pub fn new(
        id: Ulid,
        admin_id: Ulid,
        name: String,
        available_slots: Vec<String>,
        sports: Vec<String>,
        published: bool,
    ) -> Self {
        Self {
            id,
            admin_id,
            name,
            available_slots,
            sports,
            published,
            bookings: Vec::new(),
            slots_taken: HashMap::new(),
        }
    }

    pub fn has_slot_label(&self, slot: &str) -> bool {
        self.available_slots.iter().any(|s| s == slot)
    }

    /// Booking currently holding `(date, slot)`, if any.
    pub fn occupant(&self, date: NaiveDate, slot: &str) -> Option<Ulid> {
        self.slots_taken.get(&(date, slot.to_string())).copied()
    }

    /// Record a booking reference and its occupancy entry.
    /// Callers check freeness first; occupancy is never silently overwritten.
    pub fn occupy(&mut self, booking_id: Ulid, date: NaiveDate, slot: &str) {
        debug_assert!(
            !self.slots_taken.contains_key(&(date, slot.to_string())),
            "occupy over a taken slot"
        );
        self.bookings.push(booking_id);
        self.slots_taken.insert((date, slot.to_string()), booking_id);
    }

    /// Drop a booking reference and its occupancy entry. The occupancy entry
    /// is only removed while it still points at this booking, so a cancel
    /// can never clobber a later re-book of the freed slot.
    pub fn release(&mut self, booking_id: Ulid, date: NaiveDate, slot: &str) {
        self.bookings.retain(|b| *b != booking_id);
        let key = (date, slot.to_string());
        if self.slots_taken.get(&key) == Some(&booking_id) {
            self.slots_taken.remove(&key);
        }
    }

    /// Count of live (non-canceled) bookings.
    pub fn active_bookings(&self) -> usize {
        self.slots_taken.len()
    }
}

#[derive(Debug, Clone)]
pub struct UserState {
    pub id: Ulid,
    pub username: String,
    /// Denormalized booking references, mirrors the ground's copy.
    pub bookings: Vec<Ulid>,
    /// Case-normalized sport tags from search history. Order irrelevant,
    /// duplicates suppressed.
    pub history: BTreeSet<String>,
}

impl UserState {
    pub fn new(id: Ulid, username: String) -> Self {
        Self {
            id,
            username,
            bookings: Vec::new(),
            history: BTreeSet::new(),
        }
    }
}

/// The event types — flat, no nesting. This is the WAL record format.
///
/// Cancellation events carry the slot coordinates so applying them can undo
/// the denormalized entries without consulting the canonical store mid-apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    GroundCreated {
        id: Ulid,
        admin_id: Ulid,
        name: String,
        available_slots: Vec<String>,
        sports: Vec<String>,
        published: bool,
    },
    GroundUpdated {
        id: Ulid,
        name: String,
        available_slots: Vec<String>,
        sports: Vec<String>,
        published: bool,
    },
    GroundDeleted {
        id: Ulid,
    },
    UserRegistered {
        id: Ulid,
        username: String,
    },
    InterestRecorded {
        user_id: Ulid,
        sport: String,
    },
    BookingCreated {
        id: Ulid,
        ground_id: Ulid,
        user_id: Ulid,
        date: NaiveDate,
        time_slot: String,
    },
    BookingCanceled {
        id: Ulid,
        ground_id: Ulid,
        user_id: Ulid,
        date: NaiveDate,
        time_slot: String,
    },
    PendingRequested {
        id: Ulid,
        ground_id: Ulid,
        user_id: Ulid,
        date: NaiveDate,
        start_time: String,
        end_time: String,
    },
    PendingResolved {
        id: Ulid,
    },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroundInfo {
    pub id: Ulid,
    pub admin_id: Ulid,
    pub name: String,
    pub available_slots: Vec<String>,
    pub sports: Vec<String>,
    pub published: bool,
}

impl GroundInfo {
    pub fn from_state(gs: &GroundState) -> Self {
        Self {
            id: gs.id,
            admin_id: gs.admin_id,
            name: gs.name.clone(),
            available_slots: gs.available_slots.clone(),
            sports: gs.sports.clone(),
            published: gs.published,
        }
    }
}

/// Booking with display names resolved at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingView {
    pub id: Ulid,
    pub ground_id: Ulid,
    pub ground_name: String,
    pub user_id: Ulid,
    pub username: String,
    pub date: NaiveDate,
    pub time_slot: String,
    pub canceled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn ground() -> GroundState {
        GroundState::new(
            Ulid::new(),
            Ulid::new(),
            "City Arena".into(),
            vec!["10:00".into(), "11:00".into()],
            vec!["Football".into()],
            true,
        )
    }

    #[test]
    fn slot_label_membership() {
        let gs = ground();
        assert!(gs.has_slot_label("10:00"));
        assert!(!gs.has_slot_label("12:00"));
    }

    #[test]
    fn occupy_and_release() {
        let mut gs = ground();
        let id = Ulid::new();
        let d = date("2030-01-01");

        gs.occupy(id, d, "10:00");
        assert_eq!(gs.occupant(d, "10:00"), Some(id));
        assert_eq!(gs.bookings, vec![id]);
        assert_eq!(gs.active_bookings(), 1);

        gs.release(id, d, "10:00");
        assert_eq!(gs.occupant(d, "10:00"), None);
        assert!(gs.bookings.is_empty());
        assert_eq!(gs.active_bookings(), 0);
    }

    #[test]
    fn same_slot_different_dates_are_distinct() {
        let mut gs = ground();
        let a = Ulid::new();
        let b = Ulid::new();
        gs.occupy(a, date("2030-01-01"), "10:00");
        gs.occupy(b, date("2030-01-02"), "10:00");
        assert_eq!(gs.occupant(date("2030-01-01"), "10:00"), Some(a));
        assert_eq!(gs.occupant(date("2030-01-02"), "10:00"), Some(b));
    }

    #[test]
    fn release_ignores_stale_occupant() {
        let mut gs = ground();
        let old = Ulid::new();
        let new = Ulid::new();
        let d = date("2030-01-01");

        gs.occupy(old, d, "10:00");
        gs.release(old, d, "10:00");
        gs.occupy(new, d, "10:00");

        // A repeated release of the old booking must not evict the new one.
        gs.release(old, d, "10:00");
        assert_eq!(gs.occupant(d, "10:00"), Some(new));
    }

    #[test]
    fn release_removes_only_matching_reference() {
        let mut gs = ground();
        let a = Ulid::new();
        let b = Ulid::new();
        gs.occupy(a, date("2030-01-01"), "10:00");
        gs.occupy(b, date("2030-01-01"), "11:00");

        gs.release(a, date("2030-01-01"), "10:00");
        assert_eq!(gs.bookings, vec![b]);
        assert_eq!(gs.occupant(date("2030-01-01"), "11:00"), Some(b));
    }

    #[test]
    fn user_history_dedups() {
        let mut user = UserState::new(Ulid::new(), "ada".into());
        assert!(user.history.insert("cricket".to_string()));
        assert!(!user.history.insert("cricket".to_string()));
        assert_eq!(user.history.len(), 1);
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::BookingCreated {
            id: Ulid::new(),
            ground_id: Ulid::new(),
            user_id: Ulid::new(),
            date: date("2030-01-01"),
            time_slot: "10:00".into(),
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
