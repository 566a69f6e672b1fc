pub mod aggregator;
pub mod api_source;
pub mod feed_source;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serenity::async_trait;
use uuid::Uuid;

use crate::models::event::dedup_key;
use crate::models::source::CalendarSource;

/// A single concrete calendar entry, already expanded from any recurrence
/// rule, in the canonical shape shared by every source adapter. Entries
/// without both a start and an end instant (all-day entries) never make it
/// into this shape.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NormalizedOccurrence {
    pub source_name: String,
    pub source_id: String,
    pub external_occurrence_id: String,
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub link: Option<String>,
}

impl NormalizedOccurrence {
    pub fn dedup_key(&self) -> String {
        dedup_key(&self.source_id, &self.external_occurrence_id)
    }

    pub fn duration_minutes(&self) -> i64 {
        let seconds = (self.end_time - self.start_time).num_seconds();
        (seconds as f64 / 60.0).round() as i64
    }
}

/// Stable identifier for occurrences whose source supplies none, so dedup
/// survives repeated fetches of the same logical entry.
pub fn synthetic_occurrence_id(source_id: &str, start: DateTime<Utc>, title: &str) -> String {
    let material = format!("{}|{}|{}", source_id, start.to_rfc3339(), title);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, material.as_bytes()).to_string()
}

pub fn within_window(start: DateTime<Utc>, now: DateTime<Utc>, window_seconds: u64) -> bool {
    start >= now && start < now + chrono::Duration::seconds(window_seconds as i64)
}

#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetches every occurrence of one source whose start falls within
    /// `[now, now + window_seconds)`. Errors are reported back as values;
    /// the aggregator isolates them per source.
    async fn fetch_window(
        &self,
        source: &CalendarSource,
        now: DateTime<Utc>,
        window_seconds: u64,
    ) -> Result<Vec<NormalizedOccurrence>, String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn duration_rounds_to_whole_minutes() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap();
        let occurrence = NormalizedOccurrence {
            source_name: "Guild".to_string(),
            source_id: "cal-a".to_string(),
            external_occurrence_id: "e1".to_string(),
            title: "Raid".to_string(),
            description: "".to_string(),
            start_time: start,
            end_time: start + chrono::Duration::seconds(29 * 60 + 40),
            link: None,
        };
        assert_eq!(occurrence.duration_minutes(), 30);
    }

    #[test]
    fn synthetic_ids_are_stable_across_calls() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap();
        let first = synthetic_occurrence_id("cal-a", start, "Raid");
        let second = synthetic_occurrence_id("cal-a", start, "Raid");
        assert_eq!(first, second);
        assert_ne!(first, synthetic_occurrence_id("cal-b", start, "Raid"));
    }

    #[test]
    fn window_is_half_open() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        assert!(within_window(now, now, 3600));
        assert!(within_window(now + chrono::Duration::minutes(59), now, 3600));
        assert!(!within_window(now + chrono::Duration::hours(1), now, 3600));
        assert!(!within_window(now - chrono::Duration::minutes(1), now, 3600));
    }
}
