use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{MissedTickBehavior, interval};

use crate::calendar::aggregator::CalendarAggregator;
use crate::models::event::Event;
use crate::service::notifier::Notifier;
use crate::service::sync_service::{SyncDestination, SyncReport, run_sync_cycle};
use crate::storage::DB;

#[derive(Debug, Clone, PartialEq)]
pub struct SyncStatus {
    pub running: bool,
    pub interval_ms: u64,
}

struct LoopHandle {
    interval_ms: u64,
    stop: Arc<AtomicBool>,
}

/// Owns the periodic sync loop: one immediate cycle on start, then one per
/// interval tick. At most one cycle is ever in flight; a tick or manual
/// trigger arriving mid-cycle is skipped, never queued.
pub struct SyncScheduler {
    db: Arc<Mutex<DB<Event>>>,
    aggregator: Arc<CalendarAggregator>,
    notifier: Arc<dyn Notifier>,
    window_seconds: u64,
    cycle_running: Arc<AtomicBool>,
    current: Mutex<Option<LoopHandle>>,
}

impl SyncScheduler {
    pub fn new(
        db: Arc<Mutex<DB<Event>>>,
        aggregator: Arc<CalendarAggregator>,
        notifier: Arc<dyn Notifier>,
        window_seconds: u64,
    ) -> Self {
        Self {
            db,
            aggregator,
            notifier,
            window_seconds,
            cycle_running: Arc::new(AtomicBool::new(false)),
            current: Mutex::new(None),
        }
    }

    /// Starts periodic syncing. Returns false (and changes nothing) when a
    /// loop is already running.
    pub async fn start(&self, destination: SyncDestination, interval_ms: u64) -> bool {
        let mut current = self.current.lock().await;
        if current.is_some() {
            return false;
        }

        let stop = Arc::new(AtomicBool::new(false));
        *current = Some(LoopHandle {
            interval_ms,
            stop: stop.clone(),
        });

        let db = self.db.clone();
        let aggregator = self.aggregator.clone();
        let notifier = self.notifier.clone();
        let cycle_running = self.cycle_running.clone();
        let window_seconds = self.window_seconds;
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(interval_ms.max(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                // First tick fires immediately, giving the initial cycle.
                ticker.tick().await;
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                // Previous cycle overran: skip the tick, never queue it.
                if cycle_running
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
                {
                    println!("Previous sync cycle still running, skipping tick");
                    continue;
                }
                let report = run_sync_cycle(
                    &db,
                    &aggregator,
                    notifier.as_ref(),
                    &destination,
                    window_seconds,
                    None,
                    Utc::now(),
                )
                .await;
                cycle_running.store(false, Ordering::SeqCst);
                println!("Sync cycle finished: {}", report.message);
            }
        });
        true
    }

    /// Stops the periodic loop. An in-flight cycle completes; no future tick
    /// starts a new one. Returns false when nothing was running.
    pub async fn stop(&self) -> bool {
        let mut current = self.current.lock().await;
        match current.take() {
            Some(handle) => {
                handle.stop.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    pub async fn status(&self) -> SyncStatus {
        let current = self.current.lock().await;
        match current.as_ref() {
            Some(handle) => SyncStatus {
                running: true,
                interval_ms: handle.interval_ms,
            },
            None => SyncStatus {
                running: false,
                interval_ms: 0,
            },
        }
    }

    /// Manual one-shot sync through the same guarded cycle path the loop
    /// uses. Reports failure instead of queueing when a cycle is in flight.
    pub async fn trigger(
        &self,
        destination: &SyncDestination,
        filter: Option<&str>,
    ) -> SyncReport {
        match self.run_guarded_cycle(destination, filter).await {
            Some(report) => report,
            None => SyncReport {
                success: false,
                message: "a sync cycle is already running".to_string(),
                imported_count: 0,
                source_errors: Vec::new(),
            },
        }
    }

    // Returns None when another cycle holds the guard.
    async fn run_guarded_cycle(
        &self,
        destination: &SyncDestination,
        filter: Option<&str>,
    ) -> Option<SyncReport> {
        if self
            .cycle_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return None;
        }
        let report = run_sync_cycle(
            &self.db,
            &self.aggregator,
            self.notifier.as_ref(),
            destination,
            self.window_seconds,
            filter,
            Utc::now(),
        )
        .await;
        self.cycle_running.store(false, Ordering::SeqCst);
        Some(report)
    }
}
