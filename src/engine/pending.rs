use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::validate::validate_time_range;
use super::{Engine, EngineError};

impl Engine {
    /// Stage a booking request for admin approval. Only existence of the
    /// ground and user is checked here — the slot validators run at
    /// promotion time. No reference list is touched. Every field of the
    /// staged record comes from this request alone.
    pub async fn request_slot(
        &self,
        ground_id: Ulid,
        user_id: Ulid,
        date: NaiveDate,
        start_time: String,
        end_time: String,
    ) -> Result<PendingSlot, EngineError> {
        if self.pending.len() >= MAX_PENDING_SLOTS {
            return Err(EngineError::LimitExceeded("too many pending slots"));
        }
        validate_time_range(&start_time, &end_time)?;
        if self.get_ground(&ground_id).is_none() {
            return Err(EngineError::GroundNotFound(ground_id));
        }
        if !self.user_exists(&user_id) {
            return Err(EngineError::UserNotFound(user_id));
        }

        let id = Ulid::new();
        let event = Event::PendingRequested {
            id,
            ground_id,
            user_id,
            date,
            start_time: start_time.clone(),
            end_time: end_time.clone(),
        };
        self.persist_record(&event).await?;

        Ok(PendingSlot {
            id,
            ground_id,
            user_id,
            date,
            start_time,
            end_time,
            requested: true,
        })
    }

    /// Promote a pending slot into a confirmed booking through the ledger's
    /// create path (same validators, same lock), then discard it. The start
    /// time is the slot label.
    ///
    /// Promotion and discard are separate WAL records — per-document
    /// atomicity only. If the discard is lost to a crash the pending record
    /// survives next to the booking; a re-approve then fails on the taken
    /// slot and reject is the cleanup.
    pub async fn approve_pending(&self, id: Ulid) -> Result<Booking, EngineError> {
        let p = self
            .get_pending(&id)
            .ok_or(EngineError::PendingNotFound(id))?;

        let booking = self
            .create_booking(p.ground_id, p.user_id, p.date, &p.start_time)
            .await?;
        self.persist_record(&Event::PendingResolved { id }).await?;
        Ok(booking)
    }

    /// Discard a pending slot with no further effect.
    pub async fn reject_pending(&self, id: Ulid) -> Result<(), EngineError> {
        if self.get_pending(&id).is_none() {
            return Err(EngineError::PendingNotFound(id));
        }
        self.persist_record(&Event::PendingResolved { id }).await
    }
}
