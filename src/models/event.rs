use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;

// Returns the directory where the event DB lives.
// Defaults to a relative "./data/events" directory.
pub fn get_db_location() -> String {
    if let Ok(path) = env::var("EVENT_DB_LOCATION") {
        return path;
    }
    let base = env::var("DB_LOCATION").unwrap_or("./data".to_string());
    format!("{}/events", base)
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Role {
    pub name: String,
    pub emoji: String,
    pub max_slots: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ImportedFrom {
    pub source_name: String,
    pub source_id: String,
    pub external_occurrence_id: String,
    pub dedup_key: String,
    pub link: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EventOrigin {
    Manual,
    Imported(ImportedFrom),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: u32,
    /// 0 means unlimited.
    pub max_participants: u32,
    pub roles: Vec<Role>,
    /// Role name -> user ids, insertion order preserved.
    pub signups: HashMap<String, Vec<String>>,
    pub channel: String,
    pub space: String,
    pub origin: EventOrigin,
    pub posted_message_ref: Option<String>,
}

pub fn dedup_key(source_id: &str, external_occurrence_id: &str) -> String {
    format!("{}::{}", source_id, external_occurrence_id)
}

impl Event {
    pub fn role(&self, name: &str) -> Option<&Role> {
        self.roles.iter().find(|role| role.name == name)
    }

    /// The role currently holding the user, if any.
    pub fn signed_role(&self, user_id: &str) -> Option<&str> {
        self.signups
            .iter()
            .find(|(_, users)| users.iter().any(|u| u == user_id))
            .map(|(name, _)| name.as_str())
    }

    pub fn imported_from(&self) -> Option<&ImportedFrom> {
        match &self.origin {
            EventOrigin::Imported(info) => Some(info),
            EventOrigin::Manual => None,
        }
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + chrono::Duration::minutes(self.duration_minutes as i64)
    }
}
