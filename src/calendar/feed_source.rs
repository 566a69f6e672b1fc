use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use icalendar::parser::{read_calendar, unfold};
use icalendar::{CalendarDateTime, DatePerhapsTime};
use serenity::async_trait;
use std::time::Duration;

use crate::calendar::{NormalizedOccurrence, SourceFetcher, synthetic_occurrence_id, within_window};
use crate::models::source::CalendarSource;

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// ICS feed adapter. Feeds have no server-side windowing, so the document is
/// fetched whole and filtered locally.
pub struct FeedSourceClient {
    client: reqwest::Client,
}

impl FeedSourceClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }
}

impl Default for FeedSourceClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceFetcher for FeedSourceClient {
    async fn fetch_window(
        &self,
        source: &CalendarSource,
        now: DateTime<Utc>,
        window_seconds: u64,
    ) -> Result<Vec<NormalizedOccurrence>, String> {
        let response = self
            .client
            .get(&source.locator)
            .send()
            .await
            .map_err(|e| format!("feed request failed: {}", e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| format!("failed to read feed body: {}", e))?;
        if !status.is_success() {
            return Err(format!("feed returned {}", status));
        }

        occurrences_from_feed(&text, source, now, window_seconds)
    }
}

/// Normalizes the raw feed document: all-day (date-only) entries are dropped,
/// cancelled entries are dropped, and only entries starting within the window
/// survive.
pub fn occurrences_from_feed(
    content: &str,
    source: &CalendarSource,
    now: DateTime<Utc>,
    window_seconds: u64,
) -> Result<Vec<NormalizedOccurrence>, String> {
    let unfolded = unfold(content);
    let calendar =
        read_calendar(&unfolded).map_err(|e| format!("failed to parse feed document: {}", e))?;

    let mut occurrences = Vec::new();
    for entry in calendar.components.iter().filter(|c| c.name == "VEVENT") {
        if entry
            .find_prop("STATUS")
            .is_some_and(|p| p.val.as_ref() == "CANCELLED")
        {
            continue;
        }
        let (Some(start), Some(end)) = (prop_instant(entry, "DTSTART"), prop_instant(entry, "DTEND"))
        else {
            continue;
        };
        if !within_window(start, now, window_seconds) {
            continue;
        }
        let title = entry
            .find_prop("SUMMARY")
            .map(|p| p.val.to_string())
            .unwrap_or_else(|| "(untitled)".to_string());
        let external_occurrence_id = entry
            .find_prop("UID")
            .map(|p| p.val.to_string())
            .unwrap_or_else(|| synthetic_occurrence_id(&source.locator, start, &title));

        occurrences.push(NormalizedOccurrence {
            source_name: source.name.clone(),
            source_id: source.locator.clone(),
            external_occurrence_id,
            title,
            description: entry
                .find_prop("DESCRIPTION")
                .map(|p| p.val.to_string())
                .unwrap_or_default(),
            start_time: start,
            end_time: end,
            link: entry.find_prop("URL").map(|p| p.val.to_string()),
        });
    }
    Ok(occurrences)
}

fn prop_instant(
    entry: &icalendar::parser::Component<'_>,
    name: &str,
) -> Option<DateTime<Utc>> {
    let prop = entry.find_prop(name)?;
    let parsed = DatePerhapsTime::try_from(prop).ok()?;
    to_utc(parsed)
}

// Date-only values come back as None: an all-day entry has no concrete
// instant to schedule against. Floating times are taken as UTC.
fn to_utc(value: DatePerhapsTime) -> Option<DateTime<Utc>> {
    match value {
        DatePerhapsTime::DateTime(dt) => match dt {
            CalendarDateTime::Utc(instant) => Some(instant),
            CalendarDateTime::Floating(naive) => Some(Utc.from_utc_datetime(&naive)),
            CalendarDateTime::WithTimezone { date_time, tzid } => tzid
                .parse::<Tz>()
                .ok()
                .and_then(|tz| tz.from_local_datetime(&date_time).single())
                .map(|zoned| zoned.with_timezone(&Utc)),
        },
        DatePerhapsTime::Date(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn source() -> CalendarSource {
        CalendarSource {
            name: "Public".to_string(),
            locator: "https://example.com/cal.ics".to_string(),
        }
    }

    #[test]
    fn all_day_entries_are_dropped() {
        let body = "BEGIN:VCALENDAR\r\n\
             BEGIN:VEVENT\r\n\
             UID:allday-1\r\n\
             SUMMARY:All day thing\r\n\
             DTSTART;VALUE=DATE:20260301\r\n\
             DTEND;VALUE=DATE:20260302\r\n\
             END:VEVENT\r\n\
             BEGIN:VEVENT\r\n\
             UID:timed-1\r\n\
             SUMMARY:Timed thing\r\n\
             DTSTART:20260301T200000Z\r\n\
             DTEND:20260301T203000Z\r\n\
             END:VEVENT\r\n\
             END:VCALENDAR\r\n";
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let occurrences =
            occurrences_from_feed(body, &source(), now, 7 * 24 * 3600).expect("feed parses");
        assert_eq!(occurrences.len(), 1);
        assert_eq!(occurrences[0].external_occurrence_id, "timed-1");
        assert_eq!(occurrences[0].duration_minutes(), 30);
    }

    #[test]
    fn entries_outside_the_window_are_filtered_locally() {
        let body = "BEGIN:VCALENDAR\r\n\
             BEGIN:VEVENT\r\n\
             UID:soon\r\n\
             SUMMARY:Soon\r\n\
             DTSTART:20260301T120000Z\r\n\
             DTEND:20260301T130000Z\r\n\
             END:VEVENT\r\n\
             BEGIN:VEVENT\r\n\
             UID:far\r\n\
             SUMMARY:Far\r\n\
             DTSTART:20260401T120000Z\r\n\
             DTEND:20260401T130000Z\r\n\
             END:VEVENT\r\n\
             END:VCALENDAR\r\n";
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let occurrences =
            occurrences_from_feed(body, &source(), now, 24 * 3600).expect("feed parses");
        assert_eq!(occurrences.len(), 1);
        assert_eq!(occurrences[0].external_occurrence_id, "soon");
    }

    #[test]
    fn cancelled_entries_are_dropped() {
        let body = "BEGIN:VCALENDAR\r\n\
             BEGIN:VEVENT\r\n\
             UID:cancelled-1\r\n\
             SUMMARY:Cancelled thing\r\n\
             STATUS:CANCELLED\r\n\
             DTSTART:20260301T120000Z\r\n\
             DTEND:20260301T130000Z\r\n\
             END:VEVENT\r\n\
             END:VCALENDAR\r\n";
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let occurrences =
            occurrences_from_feed(body, &source(), now, 24 * 3600).expect("feed parses");
        assert!(occurrences.is_empty());
    }

    #[test]
    fn missing_uid_gets_a_stable_synthetic_id() {
        let body = "BEGIN:VCALENDAR\r\n\
             BEGIN:VEVENT\r\n\
             SUMMARY:No uid\r\n\
             DTSTART:20260301T120000Z\r\n\
             DTEND:20260301T130000Z\r\n\
             END:VEVENT\r\n\
             END:VCALENDAR\r\n";
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let first = occurrences_from_feed(body, &source(), now, 24 * 3600).unwrap();
        let second = occurrences_from_feed(body, &source(), now, 24 * 3600).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(
            first[0].external_occurrence_id,
            second[0].external_occurrence_id
        );
    }

    #[test]
    fn zoned_times_resolve_through_their_tzid() {
        let body = "BEGIN:VCALENDAR\r\n\
             BEGIN:VEVENT\r\n\
             UID:zoned-1\r\n\
             SUMMARY:Zoned\r\n\
             DTSTART;TZID=America/New_York:20260301T120000\r\n\
             DTEND;TZID=America/New_York:20260301T130000\r\n\
             END:VEVENT\r\n\
             END:VCALENDAR\r\n";
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let occurrences =
            occurrences_from_feed(body, &source(), now, 24 * 3600).expect("feed parses");
        assert_eq!(occurrences.len(), 1);
        // Noon Eastern (UTC-5 on that date) is 17:00 UTC.
        assert_eq!(
            occurrences[0].start_time,
            Utc.with_ymd_and_hms(2026, 3, 1, 17, 0, 0).unwrap()
        );
    }
}
