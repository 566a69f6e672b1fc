use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Authenticated calendar API, locator is a calendar id.
    Api,
    /// Anonymous ICS feed, locator is an http(s) URL.
    Feed,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CalendarSource {
    pub name: String,
    pub locator: String,
}

impl CalendarSource {
    pub fn kind(&self) -> SourceKind {
        if self.locator.starts_with("http://") || self.locator.starts_with("https://") {
            SourceKind::Feed
        } else {
            SourceKind::Api
        }
    }

    pub fn matches_filter(&self, filter: &str) -> bool {
        let needle = filter.to_lowercase();
        self.name.to_lowercase().contains(&needle) || self.locator.to_lowercase().contains(&needle)
    }
}

/// Parses the CALENDAR_SOURCES config value: "Name=locator;Name2=locator2".
pub fn parse_sources(raw: &str) -> Result<Vec<CalendarSource>, String> {
    let mut sources = Vec::new();
    for entry in raw.split(';') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let Some((name, locator)) = entry.split_once('=') else {
            return Err(format!("Invalid calendar source entry: {}", entry));
        };
        let name = name.trim();
        let locator = locator.trim();
        if name.is_empty() || locator.is_empty() {
            return Err(format!("Invalid calendar source entry: {}", entry));
        }
        sources.push(CalendarSource {
            name: name.to_string(),
            locator: locator.to_string(),
        });
    }
    Ok(sources)
}
