use std::collections::BTreeSet;

use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::validate::normalize_sport;
use super::{Engine, EngineError};

impl Engine {
    pub async fn get_ground_info(&self, id: Ulid) -> Option<GroundInfo> {
        let gs = self.get_ground(&id)?;
        let guard = gs.read().await;
        Some(GroundInfo::from_state(&guard))
    }

    /// Grounds visible to users. `published_only = false` lists everything.
    pub async fn list_grounds(&self, published_only: bool) -> Vec<GroundInfo> {
        let mut out = Vec::new();
        for entry in self.grounds.iter() {
            let gs = entry.value().clone();
            let guard = gs.read().await;
            if !published_only || guard.published {
                out.push(GroundInfo::from_state(&guard));
            }
        }
        out
    }

    /// Grounds owned by one admin (the admin console's listing).
    pub async fn list_grounds_by_admin(&self, admin_id: Ulid) -> Vec<GroundInfo> {
        let mut out = Vec::new();
        for entry in self.grounds.iter() {
            let gs = entry.value().clone();
            let guard = gs.read().await;
            if guard.admin_id == admin_id {
                out.push(GroundInfo::from_state(&guard));
            }
        }
        out
    }

    /// Add a sport tag to the user's history. Case-normalized; a tag already
    /// present is a no-op that writes nothing.
    pub async fn record_interest(&self, user_id: Ulid, sport: &str) -> Result<(), EngineError> {
        let tag = normalize_sport(sport);
        if tag.is_empty() || tag.len() > MAX_SPORT_TAG_LEN {
            return Err(EngineError::LimitExceeded("sport tag length"));
        }
        {
            let user = self
                .users
                .get(&user_id)
                .ok_or(EngineError::UserNotFound(user_id))?;
            if user.history.contains(&tag) {
                return Ok(());
            }
            if user.history.len() >= MAX_HISTORY_PER_USER {
                return Err(EngineError::LimitExceeded("too many history tags"));
            }
        }
        self.persist_record(&Event::InterestRecorded { user_id, sport: tag })
            .await
    }

    /// Sport-filtered ground search. Recording the tag into the user's
    /// history is a deliberate side effect — recommendations feed on it.
    pub async fn search_grounds(
        &self,
        user_id: Ulid,
        sport: &str,
    ) -> Result<Vec<GroundInfo>, EngineError> {
        self.record_interest(user_id, sport).await?;
        let tag = normalize_sport(sport);
        let mut out = Vec::new();
        for entry in self.grounds.iter() {
            let gs = entry.value().clone();
            let guard = gs.read().await;
            if guard.published && guard.sports.iter().any(|s| normalize_sport(s) == tag) {
                out.push(GroundInfo::from_state(&guard));
            }
        }
        Ok(out)
    }

    /// Published grounds whose sport tags intersect the user's history.
    /// An empty history yields an empty list, not an error.
    pub async fn recommend(&self, user_id: Ulid) -> Result<Vec<GroundInfo>, EngineError> {
        let history: BTreeSet<String> = self
            .users
            .get(&user_id)
            .ok_or(EngineError::UserNotFound(user_id))?
            .history
            .clone();
        if history.is_empty() {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        for entry in self.grounds.iter() {
            let gs = entry.value().clone();
            let guard = gs.read().await;
            if guard.published
                && guard
                    .sports
                    .iter()
                    .any(|s| history.contains(&normalize_sport(s)))
            {
                out.push(GroundInfo::from_state(&guard));
            }
        }
        Ok(out)
    }

    /// The case-normalized set of all sport tags across all grounds.
    pub async fn list_sports(&self) -> Vec<String> {
        let mut tags = BTreeSet::new();
        for entry in self.grounds.iter() {
            let gs = entry.value().clone();
            let guard = gs.read().await;
            for sport in &guard.sports {
                tags.insert(normalize_sport(sport));
            }
        }
        tags.into_iter().collect()
    }

    /// The caller's live bookings, read through the user's denormalized
    /// references and resolved against the canonical store.
    pub async fn list_user_bookings(&self, user_id: Ulid) -> Result<Vec<BookingView>, EngineError> {
        let refs: Vec<Ulid> = self
            .users
            .get(&user_id)
            .ok_or(EngineError::UserNotFound(user_id))?
            .bookings
            .clone();

        let mut out = Vec::new();
        for id in refs {
            if let Some(booking) = self.get_booking(&id)
                && !booking.canceled
            {
                out.push(self.booking_view(&booking).await);
            }
        }
        Ok(out)
    }

    /// One ground's live bookings, through its denormalized references.
    pub async fn list_ground_bookings(
        &self,
        ground_id: Ulid,
    ) -> Result<Vec<BookingView>, EngineError> {
        let refs: Vec<Ulid> = {
            let gs = self
                .get_ground(&ground_id)
                .ok_or(EngineError::GroundNotFound(ground_id))?;
            let guard = gs.read().await;
            guard.bookings.clone()
        };

        let mut out = Vec::new();
        for id in refs {
            if let Some(booking) = self.get_booking(&id)
                && !booking.canceled
            {
                out.push(self.booking_view(&booking).await);
            }
        }
        Ok(out)
    }

    /// Every canonical booking, canceled ones included (the admin's audit
    /// view).
    pub async fn list_all_bookings(&self) -> Vec<BookingView> {
        let records: Vec<Booking> = self.bookings.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::with_capacity(records.len());
        for booking in &records {
            out.push(self.booking_view(booking).await);
        }
        out
    }

    pub fn list_pending(&self) -> Vec<PendingSlot> {
        self.pending.iter().map(|e| e.value().clone()).collect()
    }

    /// Resolve display names at read time. A ground deleted after its
    /// bookings were canceled falls back to the raw id.
    async fn booking_view(&self, booking: &Booking) -> BookingView {
        let ground_name = match self.get_ground(&booking.ground_id) {
            Some(gs) => gs.read().await.name.clone(),
            None => booking.ground_id.to_string(),
        };
        let username = self
            .users
            .get(&booking.user_id)
            .map(|u| u.username.clone())
            .unwrap_or_else(|| booking.user_id.to_string());

        BookingView {
            id: booking.id,
            ground_id: booking.ground_id,
            ground_name,
            user_id: booking.user_id,
            username,
            date: booking.date,
            time_slot: booking.time_slot.clone(),
            canceled: booking.canceled,
        }
    }
}
