use thiserror::Error;

use crate::models::event::{Event, Role, get_db_location};
use crate::storage::{DB, save_db};

#[derive(Debug, Error, PartialEq)]
pub enum SignupError {
    #[error("event not found")]
    EventNotFound,
    #[error("no such role on this event")]
    RoleNotFound,
    #[error("role is already full")]
    RoleFull,
    #[error("a role with that name already exists")]
    DuplicateRole,
    #[error("storage error: {0}")]
    Storage(String),
}

pub struct SignupService;

impl SignupService {
    /// Signs a user up for a role. A repeat signup for the same role is an
    /// idempotent success; a signup for a different role moves the user
    /// (removed from every other role first, then added), so a user holds at
    /// most one role per event.
    pub fn signup(
        db: &mut DB<Event>,
        event_id: &str,
        user_id: &str,
        role_name: &str,
    ) -> Result<Event, SignupError> {
        let event = db.get_mut(event_id).ok_or(SignupError::EventNotFound)?;
        let role = event
            .roles
            .iter()
            .find(|role| role.name == role_name)
            .cloned()
            .ok_or(SignupError::RoleNotFound)?;

        let already_in_role = event
            .signups
            .get(role_name)
            .is_some_and(|users| users.iter().any(|u| u == user_id));
        if already_in_role {
            return Ok(event.clone());
        }

        if let Some(max_slots) = role.max_slots {
            let taken = event.signups.get(role_name).map_or(0, |users| users.len());
            if taken >= max_slots as usize {
                return Err(SignupError::RoleFull);
            }
        }

        for users in event.signups.values_mut() {
            users.retain(|u| u != user_id);
        }
        event
            .signups
            .entry(role_name.to_string())
            .or_default()
            .push(user_id.to_string());

        let updated = event.clone();
        persist(db)?;
        Ok(updated)
    }

    /// Removes the user from whichever role holds them. Returns false when
    /// the user was not signed up anywhere in the event.
    pub fn leave(db: &mut DB<Event>, event_id: &str, user_id: &str) -> Result<bool, SignupError> {
        let event = db.get_mut(event_id).ok_or(SignupError::EventNotFound)?;
        let mut removed = false;
        for users in event.signups.values_mut() {
            let before = users.len();
            users.retain(|u| u != user_id);
            removed |= users.len() != before;
        }
        if removed {
            persist(db)?;
        }
        Ok(removed)
    }

    pub fn add_role(db: &mut DB<Event>, event_id: &str, role: Role) -> Result<Event, SignupError> {
        let event = db.get_mut(event_id).ok_or(SignupError::EventNotFound)?;
        if event.roles.iter().any(|existing| existing.name == role.name) {
            return Err(SignupError::DuplicateRole);
        }
        event.signups.insert(role.name.clone(), Vec::new());
        event.roles.push(role);
        let updated = event.clone();
        persist(db)?;
        Ok(updated)
    }
}

fn persist(db: &DB<Event>) -> Result<(), SignupError> {
    save_db(&get_db_location(), db).map_err(|e| SignupError::Storage(e.to_string()))
}
