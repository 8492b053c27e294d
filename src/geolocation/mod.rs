//! Device location tracking.
//!
//! DESIGN
//! ======
//! `GeolocationTracker` owns the session's single [`SelfPosition`] and wraps a
//! [`PositionSource`] with two capabilities:
//! - `locate()`: one-shot fix under a 10 s budget, cached fixes up to 60 s.
//! - `watch()`: continuous updates, cached fixes up to 30 s, forwarded to the
//!   caller after the shared `SelfPosition` is updated in place.
//!
//! A host without location capability fails both immediately with
//! `CapabilityUnavailable`; the source is never touched in that case.
//! The watch subscription is released by `unwatch()` (the session calls it on
//! dispose) and also when the tracker is dropped.

pub mod nmea;
pub mod source;


use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

pub use nmea::NmeaPositionSource;
pub use source::{
    Fix, GeolocationError, PositionOptions, PositionSource, UnavailablePositionSource, WatchId, WatchSubscription,
};

use crate::geo::LatLng;
use crate::task::TaskHandle;

const WATCH_CHANNEL_CAPACITY: usize = 16;

/// The device's current position. One per session, updated in place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelfPosition {
    pub position: LatLng,
    pub accuracy_m: Option<f64>,
    pub timestamp: Instant,
    /// Number of fixes folded into this position so far.
    pub revision: u64,
}

/// Update delivered to the watch consumer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionUpdate {
    pub position: SelfPosition,
    /// Whether the fix moved further than the tracker's threshold since the
    /// last one that moved.
    pub moved: bool,
}

struct ActiveWatch {
    id: WatchId,
    forwarder: TaskHandle,
}

pub struct GeolocationTracker {
    source: Arc<dyn PositionSource>,
    position: Arc<Mutex<Option<SelfPosition>>>,
    active: Mutex<Option<ActiveWatch>>,
    move_threshold_deg: f64,
}

impl GeolocationTracker {
    #[must_use]
    pub fn new(source: Arc<dyn PositionSource>) -> Self {
        Self::with_move_threshold(source, 0.0)
    }

    #[must_use]
    pub fn with_move_threshold(source: Arc<dyn PositionSource>, move_threshold_deg: f64) -> Self {
        Self {
            source,
            position: Arc::new(Mutex::new(None)),
            active: Mutex::new(None),
            move_threshold_deg,
        }
    }

    /// Latest known position, if any fix has arrived.
    #[must_use]
    pub fn position(&self) -> Option<SelfPosition> {
        *self.position.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|w| !w.forwarder.is_finished())
    }

    /// Request the current position once.
    ///
    /// # Errors
    ///
    /// `CapabilityUnavailable` without touching the source when the host has
    /// no location capability; `Timeout` when no fix arrives within the
    /// budget; otherwise the source's error.
    pub async fn locate(&self) -> Result<SelfPosition, GeolocationError> {
        if !self.source.is_available() {
            return Err(GeolocationError::CapabilityUnavailable);
        }

        let options = PositionOptions::ONE_SHOT;
        let fix = tokio::time::timeout(options.timeout, self.source.current_position(options))
            .await
            .map_err(|_| GeolocationError::Timeout)??;

        let (position, _) = fold_fix(&self.position, fix, self.move_threshold_deg);
        debug!(lat = position.position.lat, lng = position.position.lng, "located device");
        Ok(position)
    }

    /// Subscribe to continuous updates. Replaces any existing subscription.
    ///
    /// # Errors
    ///
    /// `CapabilityUnavailable` without touching the source when the host has
    /// no location capability, or the source's error if it refuses to watch.
    pub fn watch(&self) -> Result<mpsc::Receiver<Result<PositionUpdate, GeolocationError>>, GeolocationError> {
        if !self.source.is_available() {
            return Err(GeolocationError::CapabilityUnavailable);
        }
        self.unwatch();

        let WatchSubscription { id, mut updates } = self.source.watch_position(PositionOptions::WATCH)?;
        let (tx, rx) = mpsc::channel(WATCH_CHANNEL_CAPACITY);
        let position = self.position.clone();
        let threshold = self.move_threshold_deg;

        let forwarder = TaskHandle::spawn("geolocation-watch", async move {
            while let Some(update) = updates.recv().await {
                let update = match update {
                    Ok(fix) => {
                        let (position, moved) = fold_fix(&position, fix, threshold);
                        Ok(PositionUpdate { position, moved })
                    }
                    Err(e) => {
                        warn!(error = %e, "watch position error");
                        Err(e)
                    }
                };
                if tx.send(update).await.is_err() {
                    break;
                }
            }
        });

        debug!(watch_id = id.0, "geolocation watch started");
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = Some(ActiveWatch { id, forwarder });
        Ok(rx)
    }

    /// Cancel the active subscription, if any. Returns whether one was active.
    pub fn unwatch(&self) -> bool {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(ActiveWatch { id, forwarder }) = active else {
            return false;
        };
        forwarder.cancel();
        self.source.clear_watch(id);
        debug!(watch_id = id.0, "geolocation watch cleared");
        true
    }
}

impl Drop for GeolocationTracker {
    fn drop(&mut self) {
        self.unwatch();
    }
}

/// Fold a fix into the shared position. Returns the new value and whether it
/// moved beyond `threshold` relative to the previous one.
fn fold_fix(slot: &Mutex<Option<SelfPosition>>, fix: Fix, threshold: f64) -> (SelfPosition, bool) {
    let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
    match slot.as_mut() {
        Some(current) => {
            let moved = fix.position.moved_beyond(&current.position, threshold);
            if moved || threshold <= 0.0 {
                current.position = fix.position;
            }
            current.accuracy_m = fix.accuracy_m;
            current.timestamp = fix.captured_at;
            current.revision += 1;
            (*current, moved)
        }
        None => {
            let created = SelfPosition {
                position: fix.position,
                accuracy_m: fix.accuracy_m,
                timestamp: fix.captured_at,
                revision: 1,
            };
            *slot = Some(created);
            (created, true)
        }
    }
}
