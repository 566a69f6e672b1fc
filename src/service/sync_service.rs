use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::calendar::aggregator::{AggregateError, CalendarAggregator, SourceError};
use crate::models::event::Event;
use crate::service::event_store::EventStore;
use crate::service::notifier::Notifier;
use crate::storage::DB;

/// Where imported events land and get announced.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncDestination {
    pub channel: String,
    pub space: String,
}

#[derive(Debug, Clone)]
pub struct SyncReport {
    pub success: bool,
    pub message: String,
    pub imported_count: usize,
    pub source_errors: Vec<SourceError>,
}

impl SyncReport {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            imported_count: 0,
            source_errors: Vec::new(),
        }
    }
}

/// One fetch → import → post cycle. Imports happen under the store lock;
/// announcements are posted with the lock released so signups are never
/// blocked behind network calls, and the posted reference is recorded
/// afterwards (tolerating deletion in between).
///
/// Besides freshly imported events, any earlier import for the same channel
/// whose announcement failed (no posted reference yet) is attempted again.
pub async fn run_sync_cycle(
    db: &Arc<Mutex<DB<Event>>>,
    aggregator: &CalendarAggregator,
    notifier: &dyn Notifier,
    destination: &SyncDestination,
    window_seconds: u64,
    filter: Option<&str>,
    now: DateTime<Utc>,
) -> SyncReport {
    let report = match aggregator.fetch_all(now, window_seconds, filter).await {
        Ok(report) => report,
        Err(AggregateError::NoMatchingSource) => {
            return SyncReport::failed("no calendar source matches the requested filter");
        }
    };

    let mut imported_count = 0;
    let to_post: Vec<Event> = {
        let mut db = db.lock().await;
        for occurrence in &report.occurrences {
            match EventStore::import_if_new(&mut db, occurrence, &destination.channel, &destination.space)
            {
                Ok(Some(_)) => imported_count += 1,
                Ok(None) => {}
                Err(e) => {
                    eprintln!("Failed to import occurrence {}: {}", occurrence.dedup_key(), e);
                }
            }
        }
        let mut unposted: Vec<Event> = db
            .values()
            .filter(|event| {
                event.channel == destination.channel
                    && event.imported_from().is_some()
                    && event.posted_message_ref.is_none()
            })
            .cloned()
            .collect();
        unposted.sort_by_key(|event| event.start_time);
        unposted
    };

    let mut posted = 0;
    for event in &to_post {
        match notifier.post(event).await {
            Ok(reference) => {
                let mut db = db.lock().await;
                if let Err(e) = EventStore::record_posted_reference(&mut db, &event.id, &reference) {
                    eprintln!("Failed to record posted reference for {}: {}", event.id, e);
                } else {
                    posted += 1;
                }
            }
            Err(e) => {
                // Stays stored and unposted; the next cycle will try again.
                eprintln!("Failed to post event {}: {}", event.id, e);
            }
        }
    }

    SyncReport {
        success: true,
        message: format!(
            "imported {} new event(s), posted {} announcement(s), {} source error(s)",
            imported_count,
            posted,
            report.source_errors.len()
        ),
        imported_count,
        source_errors: report.source_errors,
    }
}
