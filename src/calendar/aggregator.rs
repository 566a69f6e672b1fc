use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

use crate::calendar::{NormalizedOccurrence, SourceFetcher};
use crate::models::source::{CalendarSource, SourceKind};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SourceError {
    pub source_name: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    pub occurrences: Vec<NormalizedOccurrence>,
    pub source_errors: Vec<SourceError>,
}

#[derive(Debug, Error, PartialEq)]
pub enum AggregateError {
    #[error("no configured calendar source matches the filter")]
    NoMatchingSource,
}

/// Fans one fetch window out across every configured source and merges the
/// results. A broken source contributes an error record instead of aborting
/// its siblings.
pub struct CalendarAggregator {
    sources: Vec<CalendarSource>,
    api: Arc<dyn SourceFetcher>,
    feed: Arc<dyn SourceFetcher>,
}

impl CalendarAggregator {
    pub fn new(
        sources: Vec<CalendarSource>,
        api: Arc<dyn SourceFetcher>,
        feed: Arc<dyn SourceFetcher>,
    ) -> Self {
        Self { sources, api, feed }
    }

    pub fn sources(&self) -> &[CalendarSource] {
        &self.sources
    }

    pub async fn fetch_all(
        &self,
        now: DateTime<Utc>,
        window_seconds: u64,
        filter: Option<&str>,
    ) -> Result<FetchReport, AggregateError> {
        let selected: Vec<&CalendarSource> = match filter {
            Some(needle) => self
                .sources
                .iter()
                .filter(|source| source.matches_filter(needle))
                .collect(),
            None => self.sources.iter().collect(),
        };
        if filter.is_some() && selected.is_empty() {
            return Err(AggregateError::NoMatchingSource);
        }

        let mut report = FetchReport::default();
        let mut seen_keys: HashSet<String> = HashSet::new();
        for source in selected {
            let fetcher = match source.kind() {
                SourceKind::Api => &self.api,
                SourceKind::Feed => &self.feed,
            };
            match fetcher.fetch_window(source, now, window_seconds).await {
                Ok(occurrences) => {
                    for occurrence in occurrences {
                        // First occurrence of a dedup key wins within the batch.
                        if seen_keys.insert(occurrence.dedup_key()) {
                            report.occurrences.push(occurrence);
                        }
                    }
                }
                Err(message) => {
                    eprintln!("Calendar source {} failed: {}", source.name, message);
                    report.source_errors.push(SourceError {
                        source_name: source.name.clone(),
                        message,
                    });
                }
            }
        }
        Ok(report)
    }
}
