//! Map session: lifecycle owner for one live map view.
//!
//! DESIGN
//! ======
//! `MapSession` wires the components together and owns everything that
//! outlives a single call: the sync loop, the one-shot locate task, the watch
//! consumer, the geolocation subscription and the cosmetic timers.
//!
//! `start()` spawns:
//! - the sync loop (first cycle immediately, then every `sync_interval`)
//! - a locate task (success pans to zoom 12 and places the self marker);
//!   [`MapSession::locate`] repeats it on demand
//! - the watch consumer (repositions the self marker as the device moves)
//!
//! `dispose()` cancels all of them, releases the watch subscription, aborts
//! pending timers and clears the ripples and banner those timers would have
//! removed. In-flight submissions run to completion; they are not
//! cancellable, and skip their ripple and banner once the session is closed.
//! Dropping a session disposes it.
//!
//! Hosts observe the session through [`SessionEvent`]s, the `reserve_info`
//! read model and [`MapSession::snapshot`].

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::client::{GeoDataClient, NetworkError};
use crate::config::FieldConfig;
use crate::error::ErrorCode;
use crate::geo::{LatLng, ReserveClassification, ReserveInfo};
use crate::geolocation::{GeolocationError, GeolocationTracker, PositionSource, SelfPosition};
use crate::submission::{CoordinateInput, PointSubmissionWorkflow, SubmissionId, SubmissionOutcome, SubmissionReport};
use crate::sync::MapSyncEngine;
use crate::task::{Scheduler, TaskHandle};
use crate::viewport::{MapSnapshot, MapViewport, SharedViewport};

/// Camera zoom after a successful one-shot locate.
pub const LOCATE_ZOOM: f64 = 12.0;
const EVENT_CHANNEL_CAPACITY: usize = 64;

// =============================================================================
// EVENTS & ERRORS
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    LayersSynced { zones: usize, points: usize },
    SyncFailed(NetworkError),
    /// One-shot locate succeeded.
    Located(SelfPosition),
    /// A watch update moved the self marker.
    SelfMoved(SelfPosition),
    LocationError(GeolocationError),
    /// A submission completed with a classification.
    PointClassified { id: SubmissionId, position: LatLng, classification: ReserveClassification },
    SubmissionFailed { id: SubmissionId, code: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session already disposed")]
    Disposed,
}

impl ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Disposed => "E_SESSION_DISPOSED",
        }
    }

    fn user_message(&self) -> String {
        "the map is closed".to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Running,
    Disposed,
}

#[derive(Default)]
struct SessionTasks {
    sync: Option<TaskHandle>,
    locate: Option<TaskHandle>,
    watch: Option<TaskHandle>,
}

impl SessionTasks {
    fn cancel_all(&mut self) {
        for task in [self.sync.take(), self.locate.take(), self.watch.take()].into_iter().flatten() {
            task.cancel();
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

pub struct MapSession {
    viewport: SharedViewport,
    engine: Arc<MapSyncEngine>,
    tracker: Arc<GeolocationTracker>,
    workflow: Arc<PointSubmissionWorkflow>,
    scheduler: Arc<Scheduler>,
    events: broadcast::Sender<SessionEvent>,
    location_error: Arc<Mutex<Option<GeolocationError>>>,
    lifecycle: Mutex<Lifecycle>,
    tasks: Mutex<SessionTasks>,
}

impl MapSession {
    #[must_use]
    pub fn new(client: Arc<dyn GeoDataClient>, source: Arc<dyn PositionSource>, config: &FieldConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let viewport = MapViewport::shared(config.viewport);
        let scheduler = Arc::new(Scheduler::new());

        let engine = MapSyncEngine::new(client.clone(), viewport.clone(), config.timing.sync_interval)
            .with_events(events.clone());
        let tracker = GeolocationTracker::with_move_threshold(source, config.move_threshold_deg);
        let workflow = PointSubmissionWorkflow::new(client, viewport.clone(), scheduler.clone(), config.timing);

        Self {
            viewport,
            engine: Arc::new(engine),
            tracker: Arc::new(tracker),
            workflow: Arc::new(workflow),
            scheduler,
            events,
            location_error: Arc::new(Mutex::new(None)),
            lifecycle: Mutex::new(Lifecycle::Created),
            tasks: Mutex::new(SessionTasks::default()),
        }
    }

    fn tasks(&self) -> MutexGuard<'_, SessionTasks> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- Lifecycle ---

    /// Start syncing and tracking. Returns `false` if the session was
    /// already started or disposed.
    pub fn start(&self) -> bool {
        {
            let mut lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
            if *lifecycle != Lifecycle::Created {
                return false;
            }
            *lifecycle = Lifecycle::Running;
        }

        let sync = self.engine.spawn();
        let locate = self.spawn_locate();
        let watch = self.spawn_watch();

        let mut tasks = self.tasks();
        tasks.sync = Some(sync);
        tasks.locate = Some(locate);
        tasks.watch = watch;
        info!("map session started");
        true
    }

    /// Cancel every timer and subscription. Idempotent; returns `false` if the
    /// session was already disposed.
    pub fn dispose(&self) -> bool {
        {
            let mut lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
            if *lifecycle == Lifecycle::Disposed {
                return false;
            }
            *lifecycle = Lifecycle::Disposed;
        }

        self.tasks().cancel_all();
        let watching = self.tracker.unwatch();
        let timers = self.scheduler.cancel_all();
        // Their dismissal timers are gone.
        let effects = self.viewport.clear_effects();
        info!(watching, timers, effects, "map session disposed");
        true
    }

    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- Geolocation ---

    /// Ask for the device position again, e.g. after the user granted
    /// permission or a previous attempt timed out. A locate still in flight
    /// is replaced.
    ///
    /// # Errors
    ///
    /// [`SessionError::Disposed`] once the session has been disposed.
    pub fn locate(&self) -> Result<(), SessionError> {
        // Held across the check so a concurrent dispose always sees the new task.
        let mut tasks = self.tasks();
        if self.lifecycle() == Lifecycle::Disposed {
            return Err(SessionError::Disposed);
        }
        // Replacing the handle aborts the previous attempt.
        tasks.locate = Some(self.spawn_locate());
        Ok(())
    }

    fn spawn_locate(&self) -> TaskHandle {
        let tracker = self.tracker.clone();
        let viewport = self.viewport.clone();
        let events = self.events.clone();
        let location_error = self.location_error.clone();

        TaskHandle::spawn("locate", async move {
            match tracker.locate().await {
                Ok(position) => {
                    viewport.upsert_self_marker(position.position);
                    viewport.pan_to(position.position, LOCATE_ZOOM);
                    clear_location_error(&location_error);
                    let _ = events.send(SessionEvent::Located(position));
                }
                Err(e) => report_location_error(&location_error, &events, e),
            }
        })
    }

    fn spawn_watch(&self) -> Option<TaskHandle> {
        let mut updates = match self.tracker.watch() {
            Ok(updates) => updates,
            Err(e) => {
                report_location_error(&self.location_error, &self.events, e);
                return None;
            }
        };

        let viewport = self.viewport.clone();
        let events = self.events.clone();
        let location_error = self.location_error.clone();

        Some(TaskHandle::spawn("watch-consumer", async move {
            while let Some(update) = updates.recv().await {
                let update = match update {
                    Ok(update) => update,
                    Err(e) => {
                        report_location_error(&location_error, &events, e);
                        continue;
                    }
                };
                // Any fix means the device is reporting again.
                clear_location_error(&location_error);
                if update.moved {
                    viewport.upsert_self_marker(update.position.position);
                    let _ = events.send(SessionEvent::SelfMoved(update.position));
                }
            }
        }))
    }

    /// Last geolocation failure, cleared by the next successful fix from
    /// either `locate` or the watch.
    #[must_use]
    pub fn location_error(&self) -> Option<GeolocationError> {
        self.location_error.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn self_position(&self) -> Option<SelfPosition> {
        self.tracker.position()
    }

    // --- Submissions ---

    /// Submit a coordinate pair typed by the user. The submission runs on its
    /// own task and completes even if the session is disposed meanwhile.
    ///
    /// # Errors
    ///
    /// [`SessionError::Disposed`] once the session has been disposed.
    pub fn submit_coordinates(
        &self,
        lat: impl Into<String>,
        lng: impl Into<String>,
    ) -> Result<JoinHandle<SubmissionReport>, SessionError> {
        if self.lifecycle() == Lifecycle::Disposed {
            return Err(SessionError::Disposed);
        }

        let input = CoordinateInput::new(lat, lng);
        let workflow = self.workflow.clone();
        let events = self.events.clone();

        Ok(tokio::spawn(async move {
            let report = workflow.submit_input(input).await;
            if let Some(event) = submission_event(&report) {
                let _ = events.send(event);
            }
            report
        }))
    }

    #[must_use]
    pub fn reserve_info(&self) -> Option<ReserveInfo> {
        self.workflow.reserve_info()
    }

    #[must_use]
    pub fn watch_reserve_info(&self) -> watch::Receiver<Option<ReserveInfo>> {
        self.workflow.subscribe_reserve_info()
    }

    // --- Accessors ---

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> MapSnapshot {
        self.viewport.snapshot()
    }

    #[must_use]
    pub fn viewport(&self) -> &SharedViewport {
        &self.viewport
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<MapSyncEngine> {
        &self.engine
    }

    #[must_use]
    pub fn workflow(&self) -> &Arc<PointSubmissionWorkflow> {
        &self.workflow
    }
}

impl Drop for MapSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn report_location_error(
    slot: &Mutex<Option<GeolocationError>>,
    events: &broadcast::Sender<SessionEvent>,
    error: GeolocationError,
) {
    warn!(code = error.error_code(), error = %error, "geolocation unavailable");
    *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(error.clone());
    let _ = events.send(SessionEvent::LocationError(error));
}

fn clear_location_error(slot: &Mutex<Option<GeolocationError>>) {
    *slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
}

fn submission_event(report: &SubmissionReport) -> Option<SessionEvent> {
    match (&report.outcome, report.position) {
        (SubmissionOutcome::Classified(classification), Some(position)) => Some(SessionEvent::PointClassified {
            id: report.id,
            position,
            classification: classification.clone(),
        }),
        (SubmissionOutcome::Classified(_), None) => None,
        (SubmissionOutcome::Invalid(e), _) => {
            Some(SessionEvent::SubmissionFailed { id: report.id, code: e.error_code(), message: e.user_message() })
        }
        (SubmissionOutcome::Failed(e), _) => {
            Some(SessionEvent::SubmissionFailed { id: report.id, code: e.error_code(), message: e.user_message() })
        }
    }
}
