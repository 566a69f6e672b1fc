use chrono::DateTime;
use thiserror::Error;
use uuid::Uuid;

use crate::calendar::NormalizedOccurrence;
use crate::models::event::{Event, EventOrigin, ImportedFrom, Role, get_db_location};
use crate::storage::{DB, save_db};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid event: {0}")]
    Validation(String),
    #[error("event not found")]
    NotFound,
    #[error("storage error: {0}")]
    Storage(String),
}

/// Input for creating a manual event. `start_time` is an RFC3339 string and
/// `duration_minutes` is signed so that bad caller input is rejected here
/// instead of panicking at a cast.
#[derive(Debug, Clone)]
pub struct EventSpec {
    pub title: String,
    pub description: String,
    pub start_time: String,
    pub duration_minutes: i64,
    pub max_participants: u32,
    pub roles: Vec<Role>,
    pub channel: String,
    pub space: String,
}

#[derive(Debug, Clone, Default)]
pub struct EventUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<String>,
    pub duration_minutes: Option<i64>,
    pub max_participants: Option<u32>,
    pub channel: Option<String>,
}

pub struct EventStore;

impl EventStore {
    pub fn create(db: &mut DB<Event>, spec: EventSpec) -> Result<Event, StoreError> {
        let start_time = parse_start_time(&spec.start_time)?;
        if spec.duration_minutes < 0 {
            return Err(StoreError::Validation(format!(
                "duration must be non-negative, got {}",
                spec.duration_minutes
            )));
        }
        for (idx, role) in spec.roles.iter().enumerate() {
            if role.name.trim().is_empty() {
                return Err(StoreError::Validation("role name must not be empty".to_string()));
            }
            if spec.roles[..idx].iter().any(|other| other.name == role.name) {
                return Err(StoreError::Validation(format!(
                    "duplicate role name: {}",
                    role.name
                )));
            }
        }

        let id = Uuid::new_v4().to_string();
        let signups = spec
            .roles
            .iter()
            .map(|role| (role.name.clone(), Vec::new()))
            .collect();
        let event = Event {
            id: id.clone(),
            title: spec.title,
            description: spec.description,
            start_time,
            duration_minutes: spec.duration_minutes as u32,
            max_participants: spec.max_participants,
            roles: spec.roles,
            signups,
            channel: spec.channel,
            space: spec.space,
            origin: EventOrigin::Manual,
            posted_message_ref: None,
        };
        db.insert(id, event.clone());
        persist(db)?;
        Ok(event)
    }

    pub fn get(db: &DB<Event>, id: &str) -> Option<Event> {
        db.get(id).cloned()
    }

    pub fn update(db: &mut DB<Event>, id: &str, fields: EventUpdate) -> Result<Event, StoreError> {
        let start_time = match &fields.start_time {
            Some(raw) => Some(parse_start_time(raw)?),
            None => None,
        };
        if let Some(duration) = fields.duration_minutes {
            if duration < 0 {
                return Err(StoreError::Validation(format!(
                    "duration must be non-negative, got {}",
                    duration
                )));
            }
        }

        let event = db.get_mut(id).ok_or(StoreError::NotFound)?;
        if let Some(title) = fields.title {
            event.title = title;
        }
        if let Some(description) = fields.description {
            event.description = description;
        }
        if let Some(start) = start_time {
            event.start_time = start;
        }
        if let Some(duration) = fields.duration_minutes {
            event.duration_minutes = duration as u32;
        }
        if let Some(max) = fields.max_participants {
            event.max_participants = max;
        }
        if let Some(channel) = fields.channel {
            event.channel = channel;
        }
        let updated = event.clone();
        persist(db)?;
        Ok(updated)
    }

    pub fn delete(db: &mut DB<Event>, id: &str) -> Result<bool, StoreError> {
        let removed = db.remove(id).is_some();
        if removed {
            persist(db)?;
        }
        Ok(removed)
    }

    pub fn list_by_space(db: &DB<Event>, space: &str) -> Vec<Event> {
        db.values()
            .filter(|event| event.space == space)
            .cloned()
            .collect()
    }

    /// Dedup-aware insert for externally sourced occurrences. Returns
    /// `Ok(None)` without touching the store when the occurrence was imported
    /// before; the sync cycle relies on this for idempotence.
    pub fn import_if_new(
        db: &mut DB<Event>,
        occurrence: &NormalizedOccurrence,
        channel: &str,
        space: &str,
    ) -> Result<Option<Event>, StoreError> {
        let key = occurrence.dedup_key();
        let already_imported = db.values().any(|event| {
            event
                .imported_from()
                .is_some_and(|info| info.dedup_key == key)
        });
        if already_imported {
            return Ok(None);
        }

        // Deterministic id so repeated imports of the same occurrence would
        // collide instead of multiplying.
        let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string();
        let event = Event {
            id: id.clone(),
            title: occurrence.title.clone(),
            description: occurrence.description.clone(),
            start_time: occurrence.start_time,
            duration_minutes: occurrence.duration_minutes().max(0) as u32,
            max_participants: 0,
            roles: Vec::new(),
            signups: std::collections::HashMap::new(),
            channel: channel.to_string(),
            space: space.to_string(),
            origin: EventOrigin::Imported(ImportedFrom {
                source_name: occurrence.source_name.clone(),
                source_id: occurrence.source_id.clone(),
                external_occurrence_id: occurrence.external_occurrence_id.clone(),
                dedup_key: key,
                link: occurrence.link.clone(),
            }),
            posted_message_ref: None,
        };
        db.insert(id, event.clone());
        persist(db)?;
        Ok(Some(event))
    }

    /// Marks an event as announced. An unknown id is logged and swallowed:
    /// the event may have been deleted between fetch and post.
    pub fn record_posted_reference(
        db: &mut DB<Event>,
        id: &str,
        reference: &str,
    ) -> Result<(), StoreError> {
        match db.get_mut(id) {
            Some(event) => {
                event.posted_message_ref = Some(reference.to_string());
                persist(db)
            }
            None => {
                println!(
                    "Event {} vanished before its posted reference could be recorded",
                    id
                );
                Ok(())
            }
        }
    }
}

fn parse_start_time(raw: &str) -> Result<chrono::DateTime<chrono::Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&chrono::Utc))
        .map_err(|e| StoreError::Validation(format!("invalid start time {:?}: {}", raw, e)))
}

fn persist(db: &DB<Event>) -> Result<(), StoreError> {
    save_db(&get_db_location(), db).map_err(|e| StoreError::Storage(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn temp_db_location() -> std::sync::MutexGuard<'static, ()> {
        let guard = ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap();
        let temp_dir = env::temp_dir().join(format!("eventbot_store_{}", uuid::Uuid::new_v4()));
        unsafe {
            env::set_var("DB_LOCATION", &temp_dir);
        }
        guard
    }

    fn spec() -> EventSpec {
        EventSpec {
            title: "Raid night".to_string(),
            description: "Weekly raid".to_string(),
            start_time: "2026-03-01T20:00:00Z".to_string(),
            duration_minutes: 90,
            max_participants: 10,
            roles: vec![Role {
                name: "Tank".to_string(),
                emoji: "🛡️".to_string(),
                max_slots: Some(2),
            }],
            channel: "123".to_string(),
            space: "456".to_string(),
        }
    }

    #[test]
    fn create_initializes_empty_signups_per_role() {
        let _guard = temp_db_location();
        let mut db: DB<Event> = HashMap::new();
        let event = EventStore::create(&mut db, spec()).expect("create should succeed");
        assert_eq!(event.signups.get("Tank"), Some(&Vec::new()));
        assert!(db.contains_key(&event.id));
    }

    #[test]
    fn create_rejects_unparseable_start_time() {
        let _guard = temp_db_location();
        let mut db: DB<Event> = HashMap::new();
        let mut bad = spec();
        bad.start_time = "next tuesday".to_string();
        let err = EventStore::create(&mut db, bad).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(db.is_empty());
    }

    #[test]
    fn create_rejects_negative_duration_and_duplicate_roles() {
        let _guard = temp_db_location();
        let mut db: DB<Event> = HashMap::new();

        let mut negative = spec();
        negative.duration_minutes = -5;
        assert!(matches!(
            EventStore::create(&mut db, negative),
            Err(StoreError::Validation(_))
        ));

        let mut duplicated = spec();
        duplicated.roles.push(Role {
            name: "Tank".to_string(),
            emoji: "🗡️".to_string(),
            max_slots: None,
        });
        assert!(matches!(
            EventStore::create(&mut db, duplicated),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn update_patches_fields_and_rejects_unknown_id() {
        let _guard = temp_db_location();
        let mut db: DB<Event> = HashMap::new();
        let event = EventStore::create(&mut db, spec()).unwrap();

        let updated = EventStore::update(
            &mut db,
            &event.id,
            EventUpdate {
                title: Some("Raid night (moved)".to_string()),
                duration_minutes: Some(120),
                ..Default::default()
            },
        )
        .expect("update should succeed");
        assert_eq!(updated.title, "Raid night (moved)");
        assert_eq!(updated.duration_minutes, 120);

        assert!(matches!(
            EventStore::update(&mut db, "missing", EventUpdate::default()),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn delete_reports_presence() {
        let _guard = temp_db_location();
        let mut db: DB<Event> = HashMap::new();
        let event = EventStore::create(&mut db, spec()).unwrap();
        assert!(EventStore::delete(&mut db, &event.id).unwrap());
        assert!(!EventStore::delete(&mut db, &event.id).unwrap());
    }
}
