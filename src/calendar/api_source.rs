use chrono::{DateTime, Utc};
use serde::Deserialize;
use serenity::async_trait;
use std::time::Duration;

use crate::calendar::{NormalizedOccurrence, SourceFetcher, synthetic_occurrence_id};
use crate::models::source::CalendarSource;

const API_BASE: &str = "https://www.googleapis.com/calendar/v3/calendars";
const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Deserialize)]
struct ApiEventList {
    #[serde(default)]
    items: Vec<ApiEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEvent {
    id: Option<String>,
    status: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    html_link: Option<String>,
    start: Option<ApiEventTime>,
    end: Option<ApiEventTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    // Timed entries carry dateTime; all-day entries carry only date.
    date_time: Option<String>,
}

/// Calendar-API adapter. The token is supplied externally and reused for the
/// whole process; the upstream API expands recurring entries into single
/// instances (singleEvents) and windows server-side, so this adapter only
/// normalizes.
pub struct ApiSourceClient {
    token: String,
    client: reqwest::Client,
}

impl ApiSourceClient {
    pub fn new(token: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { token, client }
    }
}

#[async_trait]
impl SourceFetcher for ApiSourceClient {
    async fn fetch_window(
        &self,
        source: &CalendarSource,
        now: DateTime<Utc>,
        window_seconds: u64,
    ) -> Result<Vec<NormalizedOccurrence>, String> {
        let time_min = now.to_rfc3339();
        let time_max = (now + chrono::Duration::seconds(window_seconds as i64)).to_rfc3339();
        let url = format!("{}/{}/events", API_BASE, source.locator);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[
                ("timeMin", time_min.as_str()),
                ("timeMax", time_max.as_str()),
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
            ])
            .send()
            .await
            .map_err(|e| format!("calendar API request failed: {}", e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| format!("failed to read calendar API response: {}", e))?;
        if !status.is_success() {
            return Err(format!("calendar API returned {}: {}", status, text));
        }

        let parsed: ApiEventList = serde_json::from_str(&text)
            .map_err(|e| format!("failed to parse calendar API response: {}", e))?;

        let mut occurrences = Vec::new();
        for item in parsed.items {
            if item.status.as_deref() == Some("cancelled") {
                continue;
            }
            // All-day entries have no dateTime and cannot be scheduled with
            // a duration-based model.
            let (Some(start_raw), Some(end_raw)) = (
                item.start.as_ref().and_then(|t| t.date_time.as_deref()),
                item.end.as_ref().and_then(|t| t.date_time.as_deref()),
            ) else {
                continue;
            };
            let (Ok(start), Ok(end)) = (
                DateTime::parse_from_rfc3339(start_raw),
                DateTime::parse_from_rfc3339(end_raw),
            ) else {
                println!(
                    "Skipping occurrence with unparseable times from source {}",
                    source.name
                );
                continue;
            };
            let start = start.with_timezone(&Utc);
            let end = end.with_timezone(&Utc);
            let title = item.summary.unwrap_or_else(|| "(untitled)".to_string());
            let external_occurrence_id = item
                .id
                .unwrap_or_else(|| synthetic_occurrence_id(&source.locator, start, &title));

            occurrences.push(NormalizedOccurrence {
                source_name: source.name.clone(),
                source_id: source.locator.clone(),
                external_occurrence_id,
                title,
                description: item.description.unwrap_or_default(),
                start_time: start,
                end_time: end,
                link: item.html_link,
            });
        }
        Ok(occurrences)
    }
}
