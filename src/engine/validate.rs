use chrono::{NaiveDate, NaiveTime, Utc};

use crate::limits::*;
use crate::model::GroundState;

use super::EngineError;

/// Today's calendar date at evaluation time (UTC).
pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// A reservation date qualifies only when strictly after `today`: midnight
/// of the current day has already passed, so same-day bookings are rejected
/// along with past dates.
pub fn is_valid_date(date: NaiveDate, today: NaiveDate) -> bool {
    date > today
}

/// The slot label must be one of the ground's configured labels.
pub fn is_available_slot(ground: &GroundState, time_slot: &str) -> bool {
    ground.has_slot_label(time_slot)
}

/// No non-canceled booking may already hold the (date, slot) pair.
pub fn is_free(ground: &GroundState, date: NaiveDate, time_slot: &str) -> bool {
    ground.occupant(date, time_slot).is_none()
}

/// Run the three predicates in order, short-circuiting on the first failure.
/// Each failure surfaces its own error. Callers hold the ground's write lock
/// so the freeness answer stays true until the occupancy insert.
pub(crate) fn validate_slot(
    ground: &GroundState,
    date: NaiveDate,
    time_slot: &str,
    today: NaiveDate,
) -> Result<(), EngineError> {
    if !is_valid_date(date, today) {
        return Err(EngineError::InvalidDate(date));
    }
    if !is_available_slot(ground, time_slot) {
        return Err(EngineError::UnavailableSlot(time_slot.to_string()));
    }
    if !is_free(ground, date, time_slot) {
        return Err(EngineError::SlotTaken {
            date,
            time_slot: time_slot.to_string(),
        });
    }
    Ok(())
}

/// `"HH:MM"` wall-clock times; start must precede end.
pub(crate) fn validate_time_range(start: &str, end: &str) -> Result<(), EngineError> {
    let parse = |t: &str| NaiveTime::parse_from_str(t, "%H:%M").ok();
    match (parse(start), parse(end)) {
        (Some(s), Some(e)) if s < e => Ok(()),
        _ => Err(EngineError::InvalidTimeRange {
            start: start.to_string(),
            end: end.to_string(),
        }),
    }
}

pub(crate) fn validate_ground_fields(
    name: &str,
    available_slots: &[String],
    sports: &[String],
) -> Result<(), EngineError> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("ground name length"));
    }
    if available_slots.len() > MAX_SLOTS_PER_GROUND {
        return Err(EngineError::LimitExceeded("too many slot labels"));
    }
    if available_slots
        .iter()
        .any(|s| s.is_empty() || s.len() > MAX_SLOT_LABEL_LEN)
    {
        return Err(EngineError::LimitExceeded("slot label length"));
    }
    if sports.len() > MAX_SPORTS_PER_GROUND {
        return Err(EngineError::LimitExceeded("too many sport tags"));
    }
    if sports.iter().any(|s| s.is_empty() || s.len() > MAX_SPORT_TAG_LEN) {
        return Err(EngineError::LimitExceeded("sport tag length"));
    }
    Ok(())
}

pub(crate) fn validate_username(username: &str) -> Result<(), EngineError> {
    if username.is_empty() || username.len() > MAX_USERNAME_LEN {
        return Err(EngineError::LimitExceeded("username length"));
    }
    Ok(())
}

/// Sport tags compare case-insensitively everywhere.
pub(crate) fn normalize_sport(sport: &str) -> String {
    sport.to_lowercase()
}
