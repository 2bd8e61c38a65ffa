use std::sync::Arc;

use tokio::sync::RwLock;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::validate::{validate_ground_fields, validate_username};
use super::{Engine, EngineError};

impl Engine {
    pub async fn create_ground(
        &self,
        admin_id: Ulid,
        name: String,
        available_slots: Vec<String>,
        sports: Vec<String>,
        published: bool,
    ) -> Result<GroundInfo, EngineError> {
        if self.grounds.len() >= MAX_GROUNDS {
            return Err(EngineError::LimitExceeded("too many grounds"));
        }
        validate_ground_fields(&name, &available_slots, &sports)?;

        let id = Ulid::new();
        let event = Event::GroundCreated {
            id,
            admin_id,
            name: name.clone(),
            available_slots: available_slots.clone(),
            sports: sports.clone(),
            published,
        };
        self.wal_append(&event).await?;
        let gs = GroundState::new(id, admin_id, name, available_slots, sports, published);
        let info = GroundInfo::from_state(&gs);
        self.grounds.insert(id, Arc::new(RwLock::new(gs)));
        metrics::gauge!(crate::observability::GROUNDS_ACTIVE).set(self.grounds.len() as f64);
        Ok(info)
    }

    pub async fn update_ground(
        &self,
        id: Ulid,
        name: String,
        available_slots: Vec<String>,
        sports: Vec<String>,
        published: bool,
    ) -> Result<GroundInfo, EngineError> {
        validate_ground_fields(&name, &available_slots, &sports)?;
        let gs = self.get_ground(&id).ok_or(EngineError::GroundNotFound(id))?;
        let mut guard = gs.write().await;

        let event = Event::GroundUpdated {
            id,
            name,
            available_slots,
            sports,
            published,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(GroundInfo::from_state(&guard))
    }

    /// Delete a ground. Refused while any non-canceled booking exists;
    /// canonical booking records (canceled ones included) survive deletion.
    pub async fn delete_ground(&self, id: Ulid) -> Result<(), EngineError> {
        let gs = self.get_ground(&id).ok_or(EngineError::GroundNotFound(id))?;
        let guard = gs.write().await;
        if guard.active_bookings() > 0 {
            return Err(EngineError::GroundInUse(id));
        }

        let event = Event::GroundDeleted { id };
        self.wal_append(&event).await?;
        self.grounds.remove(&id);
        metrics::gauge!(crate::observability::GROUNDS_ACTIVE).set(self.grounds.len() as f64);
        drop(guard);
        Ok(())
    }

    /// Create the user profile record. Identity (the id) comes from the
    /// authentication collaborator; only the profile lives here.
    pub async fn register_user(&self, id: Ulid, username: String) -> Result<(), EngineError> {
        if self.users.len() >= MAX_USERS {
            return Err(EngineError::LimitExceeded("too many users"));
        }
        validate_username(&username)?;
        if self.user_exists(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        if self.usernames.contains_key(&username) {
            return Err(EngineError::UsernameTaken(username));
        }

        let event = Event::UserRegistered { id, username };
        self.persist_record(&event).await
    }
}
