//! Map sync engine: periodic refresh of the Zones/Points layers.
//!
//! DESIGN
//! ======
//! A background loop ticks every `sync_interval` (first tick immediately).
//! Each tick runs as its own task so a slow fetch never delays the timer;
//! the `idle -> syncing` transition is a compare-and-set, so a tick that
//! finds a fetch in flight is skipped and at most one fetch runs at a time.
//!
//! ERROR HANDLING
//! ==============
//! A failed fetch is logged and the cycle is dropped. The layers keep showing
//! the last successful cycle; there is no retry beyond the next tick.

#[cfg(test)]
#[path = "sync_test.rs"]
mod sync_test;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::client::{GeoDataClient, NetworkError};
use crate::session::SessionEvent;
use crate::task::TaskHandle;
use crate::viewport::SharedViewport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Syncing,
}

/// Result of a single sync attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Layers replaced with `zones` zones and `points` points.
    Synced { zones: usize, points: usize },
    /// Another fetch was already in flight.
    Skipped,
    Failed(NetworkError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
}

pub struct MapSyncEngine {
    client: Arc<dyn GeoDataClient>,
    viewport: SharedViewport,
    interval: Duration,
    events: Option<broadcast::Sender<SessionEvent>>,
    syncing: AtomicBool,
    completed: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

/// Returns the engine to `Idle` however the fetch ends, including abort.
struct SyncingGuard<'a>(&'a AtomicBool);

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl MapSyncEngine {
    #[must_use]
    pub fn new(client: Arc<dyn GeoDataClient>, viewport: SharedViewport, interval: Duration) -> Self {
        Self {
            client,
            viewport,
            interval,
            events: None,
            syncing: AtomicBool::new(false),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        }
    }

    /// Publish completed and failed cycles on `events`.
    #[must_use]
    pub fn with_events(mut self, events: broadcast::Sender<SessionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub fn state(&self) -> SyncState {
        if self.syncing.load(Ordering::Acquire) { SyncState::Syncing } else { SyncState::Idle }
    }

    #[must_use]
    pub fn stats(&self) -> SyncStats {
        SyncStats {
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one sync cycle now, unless one is already in flight.
    pub async fn tick(&self) -> TickOutcome {
        if self.syncing.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            debug!("sync already in flight; skipping tick");
            return TickOutcome::Skipped;
        }
        let _guard = SyncingGuard(&self.syncing);

        let outcome = match self.client.fetch_map_data().await {
            Ok(data) => {
                let (zones, points) = (data.zones.len(), data.points.len());
                self.viewport.apply_map_data(data);
                self.completed.fetch_add(1, Ordering::Relaxed);
                debug!(zones, points, "map data synced");
                TickOutcome::Synced { zones, points }
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "map data sync failed; keeping previous layers");
                TickOutcome::Failed(e)
            }
        };

        if let Some(events) = &self.events {
            let event = match &outcome {
                TickOutcome::Synced { zones, points } => Some(SessionEvent::LayersSynced { zones: *zones, points: *points }),
                TickOutcome::Failed(e) => Some(SessionEvent::SyncFailed(e.clone())),
                TickOutcome::Skipped => None,
            };
            if let Some(event) = event {
                // No subscribers is fine.
                let _ = events.send(event);
            }
        }
        outcome
    }

    /// Start the periodic loop. Dropping or cancelling the handle stops the
    /// timer and aborts any fetch still in flight.
    #[must_use]
    pub fn spawn(self: &Arc<Self>) -> TaskHandle {
        let engine = Arc::clone(self);
        info!(interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX), "map sync started");

        TaskHandle::spawn("map-sync", async move {
            let mut ticker = tokio::time::interval(engine.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut in_flight = JoinSet::new();

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let engine = Arc::clone(&engine);
                        in_flight.spawn(async move {
                            engine.tick().await;
                        });
                    }
                    Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
                }
            }
        })
    }
}
