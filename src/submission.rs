//! Point submission workflow.
//!
//! DESIGN
//! ======
//! Each submission walks a five-state machine:
//!
//! ```text
//! entered -> validating -> submitting -> classified
//!                 |              |
//!                 +-> failed <---+
//! ```
//!
//! Validation is local; malformed input never reaches the network. Entering
//! `submitting` clears the input fields, pans the camera to the target and
//! drops a ripple there. The classification colors a confirmation marker
//! that lives outside the sync-managed layers, so later sync cycles do not
//! remove it. Banners and ripples are dismissed by timers owned by the
//! session's [`Scheduler`].
//!
//! Submissions are independent: each has its own id, none blocks or cancels
//! another, and none is retried.

#[cfg(test)]
#[path = "submission_test.rs"]
mod submission_test;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::{info, warn};

use crate::client::{GeoDataClient, NetworkError};
use crate::config::MapTiming;
use crate::error::ErrorCode;
use crate::geo::{LAT_RANGE, LNG_RANGE, LatLng, ReserveClassification, ReserveInfo};
use crate::task::Scheduler;
use crate::viewport::{BannerKind, MarkerHandle, SharedViewport, style};

/// Camera zoom used when flying to a submitted point.
pub const SUBMIT_ZOOM: f64 = 10.0;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubmissionId(pub u64);

impl std::fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Entered,
    Validating,
    Submitting,
    Classified,
    Failed,
}

impl SubmissionState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Classified | Self::Failed)
    }
}

/// Raw text of the two coordinate fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinateInput {
    pub lat: String,
    pub lng: String,
}

impl CoordinateInput {
    #[must_use]
    pub fn new(lat: impl Into<String>, lng: impl Into<String>) -> Self {
        Self { lat: lat.into(), lng: lng.into() }
    }

    /// Split one typed line, `"lat,lng"` or `"lat lng"`, into the two fields.
    /// Returns `None` unless the line holds exactly two tokens.
    #[must_use]
    pub fn from_line(line: &str) -> Option<Self> {
        let mut parts = line.split(|c: char| c == ',' || c.is_whitespace()).filter(|p| !p.is_empty());
        let (lat, lng) = (parts.next()?, parts.next()?);
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(lat, lng))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lat.is_empty() && self.lng.is_empty()
    }
}

/// A submission that passed validation and awaits its classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingSubmission {
    pub id: SubmissionId,
    pub position: LatLng,
    pub state: SubmissionState,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("{field} is not a decimal number: {raw:?}")]
    NotANumber { field: &'static str, raw: String },
    #[error("{field} {value} is out of range")]
    OutOfRange { field: &'static str, value: String },
}

impl ErrorCode for InputError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotANumber { .. } => "E_INPUT_NOT_A_NUMBER",
            Self::OutOfRange { .. } => "E_INPUT_OUT_OF_RANGE",
        }
    }

    fn user_message(&self) -> String {
        "invalid coordinates".to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Classified(ReserveClassification),
    Invalid(InputError),
    Failed(NetworkError),
}

/// Everything a caller needs to know about one finished submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReport {
    pub id: SubmissionId,
    pub input: CoordinateInput,
    pub position: Option<LatLng>,
    /// States in the order they were entered, ending in a terminal one.
    pub transitions: Vec<SubmissionState>,
    pub marker: Option<MarkerHandle>,
    pub outcome: SubmissionOutcome,
}

impl SubmissionReport {
    #[must_use]
    pub fn state(&self) -> SubmissionState {
        self.transitions.last().copied().unwrap_or(SubmissionState::Entered)
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Parse the two input fields as finite, in-range decimal degrees.
///
/// # Errors
///
/// [`InputError::NotANumber`] for empty, non-numeric or non-finite text;
/// [`InputError::OutOfRange`] outside `[-90, 90]` / `[-180, 180]`.
pub fn parse_coordinates(lat: &str, lng: &str) -> Result<LatLng, InputError> {
    let lat = parse_component("latitude", lat, &LAT_RANGE)?;
    let lng = parse_component("longitude", lng, &LNG_RANGE)?;
    Ok(LatLng::new(lat, lng))
}

fn parse_component(
    field: &'static str,
    raw: &str,
    range: &std::ops::RangeInclusive<f64>,
) -> Result<f64, InputError> {
    let value = raw
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| InputError::NotANumber { field, raw: raw.to_string() })?;
    if !range.contains(&value) {
        return Err(InputError::OutOfRange { field, value: value.to_string() });
    }
    Ok(value)
}

// =============================================================================
// WORKFLOW
// =============================================================================

pub struct PointSubmissionWorkflow {
    client: Arc<dyn GeoDataClient>,
    viewport: SharedViewport,
    scheduler: Arc<Scheduler>,
    timing: MapTiming,
    input: Mutex<CoordinateInput>,
    pending: Mutex<BTreeMap<SubmissionId, PendingSubmission>>,
    next_id: AtomicU64,
    reserve_info: watch::Sender<Option<ReserveInfo>>,
}

impl PointSubmissionWorkflow {
    #[must_use]
    pub fn new(
        client: Arc<dyn GeoDataClient>,
        viewport: SharedViewport,
        scheduler: Arc<Scheduler>,
        timing: MapTiming,
    ) -> Self {
        let (reserve_info, _) = watch::channel(None);
        Self {
            client,
            viewport,
            scheduler,
            timing,
            input: Mutex::new(CoordinateInput::default()),
            pending: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            reserve_info,
        }
    }

    /// Replace the text of the coordinate fields.
    pub fn set_input(&self, lat: impl Into<String>, lng: impl Into<String>) {
        *self.input.lock().unwrap_or_else(PoisonError::into_inner) = CoordinateInput::new(lat, lng);
    }

    #[must_use]
    pub fn input(&self) -> CoordinateInput {
        self.input.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Latest classification as a read model; `None` before the first one.
    #[must_use]
    pub fn reserve_info(&self) -> Option<ReserveInfo> {
        self.reserve_info.borrow().clone()
    }

    #[must_use]
    pub fn subscribe_reserve_info(&self) -> watch::Receiver<Option<ReserveInfo>> {
        self.reserve_info.subscribe()
    }

    #[must_use]
    pub fn pending(&self) -> Vec<PendingSubmission> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).values().copied().collect()
    }

    /// Submit whatever is currently in the input fields.
    pub async fn submit(&self) -> SubmissionReport {
        let input = self.input();
        self.submit_input(input).await
    }

    /// Run one submission for `input`, independent of the input fields'
    /// current content (they are still cleared on `submitting`).
    pub async fn submit_input(&self, input: CoordinateInput) -> SubmissionReport {
        let id = SubmissionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut transitions = vec![SubmissionState::Entered, SubmissionState::Validating];

        let position = match parse_coordinates(&input.lat, &input.lng) {
            Ok(position) => position,
            Err(e) => {
                info!(submission = %id, error = %e, "submission rejected locally");
                self.flash_banner(BannerKind::Danger, e.user_message());
                transitions.push(SubmissionState::Failed);
                return SubmissionReport {
                    id,
                    input,
                    position: None,
                    transitions,
                    marker: None,
                    outcome: SubmissionOutcome::Invalid(e),
                };
            }
        };

        // PHASE: SUBMITTING
        transitions.push(SubmissionState::Submitting);
        self.set_pending(id, position);
        self.set_input("", "");
        self.viewport.pan_to(position, SUBMIT_ZOOM);
        self.flash_ripple(position);

        let result = self.client.submit_point(position).await;
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).remove(&id);

        // PHASE: CLASSIFIED | FAILED
        let (marker, outcome) = match result {
            Ok(classification) => {
                let marker =
                    self.viewport.add_transient_marker(position, style::confirmation_color(classification.is_inside));
                self.viewport.restyle_marker(marker, style::confirmation_style(&classification, position));
                self.flash_banner(classified_banner_kind(&classification), success_message(&classification));
                self.reserve_info.send_replace(Some(ReserveInfo::from(&classification)));

                info!(
                    submission = %id,
                    lat = position.lat,
                    lng = position.lng,
                    inside = classification.is_inside,
                    zone = classification.display_name(),
                    "point classified"
                );
                transitions.push(SubmissionState::Classified);
                (Some(marker), SubmissionOutcome::Classified(classification))
            }
            Err(e) => {
                warn!(submission = %id, error = %e, "point submission failed");
                self.flash_banner(BannerKind::Danger, e.user_message());
                transitions.push(SubmissionState::Failed);
                (None, SubmissionOutcome::Failed(e))
            }
        };

        SubmissionReport { id, input, position: Some(position), transitions, marker, outcome }
    }

    fn set_pending(&self, id: SubmissionId, position: LatLng) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, PendingSubmission { id, position, state: SubmissionState::Submitting });
    }

    // Transient effects need a live scheduler to remove them. Once the session
    // is disposed they are skipped rather than left on the map for good.

    fn flash_ripple(&self, position: LatLng) {
        if self.scheduler.is_closed() {
            return;
        }
        let ripple = self.viewport.add_ripple(self.viewport.project(position));
        let viewport = self.viewport.clone();
        self.scheduler.after(self.timing.ripple_duration, move || {
            viewport.remove_ripple(ripple);
        });
    }

    /// Show a banner and schedule its dismissal.
    fn flash_banner(&self, kind: BannerKind, message: String) {
        if self.scheduler.is_closed() {
            return;
        }
        let banner = self.viewport.show_banner(kind, message);
        let viewport = self.viewport.clone();
        self.scheduler.after(self.timing.banner_duration, move || {
            viewport.dismiss_banner(banner);
        });
    }
}

/// Points outside every zone are flagged as danger even though the submission succeeded.
fn classified_banner_kind(classification: &ReserveClassification) -> BannerKind {
    if classification.is_inside { BannerKind::Success } else { BannerKind::Danger }
}

fn success_message(classification: &ReserveClassification) -> String {
    if !classification.is_inside {
        return "point added: outside protected zones".to_string();
    }
    match classification.protection_level {
        Some(level) => format!("point added: inside {} ({level} protection)", classification.display_name()),
        None => format!("point added: inside {}", classification.display_name()),
    }
}
