use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::validate::{self, validate_slot};
use super::{Engine, EngineError};

impl Engine {
    /// Create a booking: ground lookup, the validator sequence, user lookup,
    /// then canonical record + both denormalized references through the one
    /// write path. The freeness check and the occupancy insert both happen
    /// under the ground's write lock, so two concurrent creates for the same
    /// (date, slot) serialize and the loser fails `SlotTaken`.
    pub async fn create_booking(
        &self,
        ground_id: Ulid,
        user_id: Ulid,
        date: NaiveDate,
        time_slot: &str,
    ) -> Result<Booking, EngineError> {
        let gs = self
            .get_ground(&ground_id)
            .ok_or(EngineError::GroundNotFound(ground_id))?;
        let mut guard = gs.write().await;
        // The ground may have been deleted while we waited for the lock.
        if !self.grounds.contains_key(&ground_id) {
            return Err(EngineError::GroundNotFound(ground_id));
        }
        if guard.bookings.len() >= MAX_BOOKINGS_PER_GROUND {
            return Err(EngineError::LimitExceeded("too many bookings on ground"));
        }

        validate_slot(&guard, date, time_slot, validate::today())?;

        if !self.user_exists(&user_id) {
            return Err(EngineError::UserNotFound(user_id));
        }

        let id = Ulid::new();
        let event = Event::BookingCreated {
            id,
            ground_id,
            user_id,
            date,
            time_slot: time_slot.to_string(),
        };
        self.persist_and_apply(&mut guard, &event).await?;

        Ok(Booking {
            id,
            ground_id,
            user_id,
            date,
            time_slot: time_slot.to_string(),
            canceled: false,
        })
    }

    /// Cancel a booking. Both cancellation paths (user-initiated and admin
    /// override) land here; the admin path skips only the ownership check.
    /// Soft-delete: the occupancy entry and both reference lists go, the
    /// canonical record stays with `canceled = true`.
    pub async fn cancel_booking(
        &self,
        booking_id: Ulid,
        requester: Ulid,
        admin_override: bool,
    ) -> Result<(), EngineError> {
        let ground_id = {
            let booking = self
                .get_booking(&booking_id)
                .ok_or(EngineError::BookingNotFound(booking_id))?;
            if booking.canceled {
                return Err(EngineError::AlreadyCanceled(booking_id));
            }
            if !admin_override && booking.user_id != requester {
                return Err(EngineError::NotOwner(booking_id));
            }
            booking.ground_id
        };

        let gs = self
            .get_ground(&ground_id)
            .ok_or(EngineError::GroundNotFound(ground_id))?;
        let mut guard = gs.write().await;

        // Re-read under the ground lock: a concurrent cancel may have won,
        // and cancel must serialize against re-book of the freed slot.
        let booking = self
            .get_booking(&booking_id)
            .ok_or(EngineError::BookingNotFound(booking_id))?;
        if booking.canceled {
            return Err(EngineError::AlreadyCanceled(booking_id));
        }

        let event = Event::BookingCanceled {
            id: booking.id,
            ground_id: booking.ground_id,
            user_id: booking.user_id,
            date: booking.date,
            time_slot: booking.time_slot.clone(),
        };
        self.persist_and_apply(&mut guard, &event).await
    }
}
