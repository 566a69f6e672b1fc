use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub type DB<T> = HashMap<String, T>;

#[derive(Debug, Error)]
pub enum DBError {
    #[error("db io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("db serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

fn db_file(location: &str) -> std::path::PathBuf {
    Path::new(location).join("db.json")
}

// A missing file is an empty database, not an error.
pub fn load_db<T: DeserializeOwned>(location: &str) -> Result<DB<T>, DBError> {
    let path = db_file(location);
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn save_db<T: Serialize>(location: &str, db: &DB<T>) -> Result<(), DBError> {
    fs::create_dir_all(location)?;
    let content = serde_json::to_string_pretty(db)?;
    fs::write(db_file(location), content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
    struct Entry {
        value: String,
    }

    #[test]
    fn save_and_load_round_trips() {
        let dir = std::env::temp_dir().join(format!("eventbot_db_{}", uuid::Uuid::new_v4()));
        let location = dir.to_string_lossy().to_string();

        let mut db: DB<Entry> = HashMap::new();
        db.insert(
            "a".to_string(),
            Entry {
                value: "hello".to_string(),
            },
        );
        save_db(&location, &db).expect("save should succeed");

        let loaded: DB<Entry> = load_db(&location).expect("load should succeed");
        assert_eq!(loaded, db);
    }

    #[test]
    fn load_missing_location_is_empty() {
        let dir = std::env::temp_dir().join(format!("eventbot_db_{}", uuid::Uuid::new_v4()));
        let loaded: DB<Entry> = load_db(&dir.to_string_lossy()).expect("missing dir is empty db");
        assert!(loaded.is_empty());
    }
}
