use std::collections::HashMap;
use std::env;
use std::fs;

use crate::models::source::{CalendarSource, parse_sources};

pub const DEFAULT_SYNC_INTERVAL_MS: u64 = 10 * 60 * 1000;
pub const DEFAULT_SYNC_WINDOW_SECONDS: u64 = 14 * 24 * 3600;

#[derive(Debug, Default, Clone)]
pub struct AppConfig {
    values: HashMap<String, String>,
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self, String> {
        let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
        let mut values = HashMap::new();
        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(format!("Invalid config line {}: {}", idx + 1, line));
            };
            let key = key.trim();
            let mut value = value.trim().to_string();
            if (value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\''))
            {
                value = value[1..value.len() - 1].to_string();
            }
            values.insert(key.to_string(), value);
        }
        Ok(Self { values })
    }

    /// File value first, process environment second.
    pub fn get(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .cloned()
            .or_else(|| env::var(key).ok())
    }

    pub fn calendar_sources(&self) -> Result<Vec<CalendarSource>, String> {
        match self.get("CALENDAR_SOURCES") {
            Some(raw) => parse_sources(&raw),
            None => Ok(Vec::new()),
        }
    }

    pub fn sync_interval_ms(&self) -> u64 {
        self.get("SYNC_INTERVAL_MS")
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(DEFAULT_SYNC_INTERVAL_MS)
    }

    pub fn sync_window_seconds(&self) -> u64 {
        self.get("SYNC_WINDOW_SECONDS")
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(DEFAULT_SYNC_WINDOW_SECONDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> std::path::PathBuf {
        let path = env::temp_dir().join(format!("eventbot_cfg_{}.env", uuid::Uuid::new_v4()));
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn parses_env_file_with_exports_and_quotes() {
        let path = write_config(
            "# comment\nexport SYNC_INTERVAL_MS=5000\nCALENDAR_SOURCES=\"Guild=abc;Feed=https://x/cal.ics\"\n",
        );
        let config = AppConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.sync_interval_ms(), 5000);
        let sources = config.calendar_sources().unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].name, "Guild");
    }

    #[test]
    fn missing_values_fall_back_to_defaults() {
        let config = AppConfig::default();
        // The process env may carry these keys in CI; only assert the
        // fallback when they are absent.
        if env::var("SYNC_INTERVAL_MS").is_err() {
            assert_eq!(config.sync_interval_ms(), DEFAULT_SYNC_INTERVAL_MS);
        }
        if env::var("SYNC_WINDOW_SECONDS").is_err() {
            assert_eq!(config.sync_window_seconds(), DEFAULT_SYNC_WINDOW_SECONDS);
        }
    }

    #[test]
    fn rejects_malformed_lines() {
        let path = write_config("NOT A KEY VALUE\n");
        assert!(AppConfig::from_file(path.to_str().unwrap()).is_err());
    }
}
