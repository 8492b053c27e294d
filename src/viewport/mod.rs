//! Headless map surface.
//!
//! DESIGN
//! ======
//! `MapViewport` is the single owner of everything a renderer draws: the
//! Zones and Points layers, the self marker, transient markers, ripples, the
//! banner slot and the camera. All state sits behind one mutex that is never
//! held across an `.await`, so every mutation is atomic from a reader's point
//! of view. Layer replacement builds the styled features first and swaps them
//! in under the lock; a reader never sees half of a sync cycle.
//!
//! Hosts read the surface through [`MapViewport::snapshot`], an owned copy they
//! can render at their own pace.

pub mod camera;
pub mod style;


use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

pub use camera::{Camera, ScreenPoint};
pub use style::{MarkerStyle, PathStyle};

use crate::config::ViewportSize;
use crate::geo::{LatLng, MapData, MapPoint, Zone};

pub type SharedViewport = Arc<MapViewport>;

// =============================================================================
// FEATURES
// =============================================================================

/// A zone polygon with its resolved style.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneFeature {
    pub zone: Zone,
    pub style: PathStyle,
}

/// A backend point with its resolved style.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointFeature {
    pub point: MapPoint,
    pub style: MarkerStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub position: LatLng,
    pub style: MarkerStyle,
}

/// Handle to a marker outside the sync-managed layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MarkerHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RippleId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BannerId(pub u64);

/// Expanding-circle effect drawn at a fixed screen position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Ripple {
    pub id: RippleId,
    pub at: ScreenPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BannerKind {
    Success,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Banner {
    pub id: BannerId,
    pub kind: BannerKind,
    pub message: String,
}

/// Camera movement requested by `pan_to`. Hosts animate towards it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PanRequest {
    pub seq: u64,
    pub center: LatLng,
    pub zoom: f64,
}

/// Owned copy of everything on the surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapSnapshot {
    pub camera: Camera,
    pub last_pan: Option<PanRequest>,
    pub zones: Vec<ZoneFeature>,
    pub points: Vec<PointFeature>,
    pub self_marker: Option<Marker>,
    pub markers: Vec<(MarkerHandle, Marker)>,
    pub ripples: Vec<Ripple>,
    pub banner: Option<Banner>,
    /// Number of completed layer replacements.
    pub layer_generation: u64,
}

// =============================================================================
// VIEWPORT
// =============================================================================

struct ViewportState {
    camera: Camera,
    last_pan: Option<PanRequest>,
    pans: u64,
    zones: Vec<ZoneFeature>,
    points: Vec<PointFeature>,
    self_marker: Option<Marker>,
    markers: BTreeMap<MarkerHandle, Marker>,
    ripples: Vec<Ripple>,
    banner: Option<Banner>,
    layer_generation: u64,
    next_id: u64,
}

impl ViewportState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

pub struct MapViewport {
    state: Mutex<ViewportState>,
}

impl MapViewport {
    #[must_use]
    pub fn new(size: ViewportSize) -> Self {
        Self {
            state: Mutex::new(ViewportState {
                camera: Camera::new(size),
                last_pan: None,
                pans: 0,
                zones: Vec::new(),
                points: Vec::new(),
                self_marker: None,
                markers: BTreeMap::new(),
                ripples: Vec::new(),
                banner: None,
                layer_generation: 0,
                next_id: 0,
            }),
        }
    }

    #[must_use]
    pub fn shared(size: ViewportSize) -> SharedViewport {
        Arc::new(Self::new(size))
    }

    fn lock(&self) -> MutexGuard<'_, ViewportState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- Layers ---

    /// Replace the Zones layer with exactly `zones`.
    pub fn replace_zones(&self, zones: Vec<Zone>) {
        let features = zone_features(zones);
        let mut state = self.lock();
        state.zones = features;
        state.layer_generation += 1;
    }

    /// Replace the Points layer with exactly `points`.
    pub fn replace_points(&self, points: Vec<MapPoint>) {
        let features = point_features(points);
        let mut state = self.lock();
        state.points = features;
        state.layer_generation += 1;
    }

    /// Replace both layers in one critical section.
    pub fn apply_map_data(&self, data: MapData) {
        let zones = zone_features(data.zones);
        let points = point_features(data.points);
        let mut state = self.lock();
        state.zones = zones;
        state.points = points;
        state.layer_generation += 1;
    }

    #[must_use]
    pub fn zones(&self) -> Vec<ZoneFeature> {
        self.lock().zones.clone()
    }

    #[must_use]
    pub fn points(&self) -> Vec<PointFeature> {
        self.lock().points.clone()
    }

    /// `(zones, points)` currently on the layers.
    #[must_use]
    pub fn layer_counts(&self) -> (usize, usize) {
        let state = self.lock();
        (state.zones.len(), state.points.len())
    }

    // --- Self marker ---

    /// Create the self marker on first call, move it afterwards.
    /// Returns `true` when the marker was created.
    pub fn upsert_self_marker(&self, position: LatLng) -> bool {
        let mut state = self.lock();
        match state.self_marker.as_mut() {
            Some(marker) => {
                marker.position = position;
                false
            }
            None => {
                state.self_marker = Some(Marker { position, style: style::self_marker_style() });
                true
            }
        }
    }

    #[must_use]
    pub fn self_marker(&self) -> Option<Marker> {
        self.lock().self_marker.clone()
    }

    // --- Camera ---

    /// Record a camera target. Returns immediately; the host animates.
    pub fn pan_to(&self, center: LatLng, zoom: f64) -> PanRequest {
        let mut state = self.lock();
        state.camera.set_view(center, zoom);
        state.pans += 1;
        let request = PanRequest { seq: state.pans, center, zoom: state.camera.zoom };
        state.last_pan = Some(request);
        request
    }

    #[must_use]
    pub fn camera(&self) -> Camera {
        self.lock().camera
    }

    #[must_use]
    pub fn project(&self, position: LatLng) -> ScreenPoint {
        self.lock().camera.project(position)
    }

    // --- Transient markers ---

    pub fn add_transient_marker(&self, position: LatLng, color: &str) -> MarkerHandle {
        let mut state = self.lock();
        let handle = MarkerHandle(state.next_id());
        state.markers.insert(handle, Marker { position, style: MarkerStyle::solid(color) });
        handle
    }

    /// Returns `false` if the marker no longer exists.
    pub fn restyle_marker(&self, handle: MarkerHandle, style: MarkerStyle) -> bool {
        match self.lock().markers.get_mut(&handle) {
            Some(marker) => {
                marker.style = style;
                true
            }
            None => false,
        }
    }

    pub fn remove_marker(&self, handle: MarkerHandle) -> bool {
        self.lock().markers.remove(&handle).is_some()
    }

    #[must_use]
    pub fn marker(&self, handle: MarkerHandle) -> Option<Marker> {
        self.lock().markers.get(&handle).cloned()
    }

    #[must_use]
    pub fn marker_count(&self) -> usize {
        self.lock().markers.len()
    }

    // --- Effects ---

    pub fn add_ripple(&self, at: ScreenPoint) -> RippleId {
        let mut state = self.lock();
        let id = RippleId(state.next_id());
        state.ripples.push(Ripple { id, at });
        id
    }

    pub fn remove_ripple(&self, id: RippleId) -> bool {
        let mut state = self.lock();
        let before = state.ripples.len();
        state.ripples.retain(|r| r.id != id);
        state.ripples.len() != before
    }

    #[must_use]
    pub fn ripples(&self) -> Vec<Ripple> {
        self.lock().ripples.clone()
    }

    /// Show `message`, replacing whatever banner was visible.
    pub fn show_banner(&self, kind: BannerKind, message: impl Into<String>) -> BannerId {
        let mut state = self.lock();
        let id = BannerId(state.next_id());
        state.banner = Some(Banner { id, kind, message: message.into() });
        id
    }

    /// Dismiss banner `id` if it is still the visible one.
    pub fn dismiss_banner(&self, id: BannerId) -> bool {
        let mut state = self.lock();
        if state.banner.as_ref().is_some_and(|b| b.id == id) {
            state.banner = None;
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn banner(&self) -> Option<Banner> {
        self.lock().banner.clone()
    }

    /// Drop every ripple and the banner. Returns how many effects were removed.
    pub fn clear_effects(&self) -> usize {
        let mut state = self.lock();
        let removed = state.ripples.len() + usize::from(state.banner.is_some());
        state.ripples.clear();
        state.banner = None;
        removed
    }

    #[must_use]
    pub fn snapshot(&self) -> MapSnapshot {
        let state = self.lock();
        MapSnapshot {
            camera: state.camera,
            last_pan: state.last_pan,
            zones: state.zones.clone(),
            points: state.points.clone(),
            self_marker: state.self_marker.clone(),
            markers: state.markers.iter().map(|(h, m)| (*h, m.clone())).collect(),
            ripples: state.ripples.clone(),
            banner: state.banner.clone(),
            layer_generation: state.layer_generation,
        }
    }
}

fn zone_features(zones: Vec<Zone>) -> Vec<ZoneFeature> {
    zones
        .into_iter()
        .map(|zone| {
            let style = style::zone_style(zone.protection_level);
            ZoneFeature { zone, style }
        })
        .collect()
}

fn point_features(points: Vec<MapPoint>) -> Vec<PointFeature> {
    points
        .into_iter()
        .map(|point| {
            let style = style::point_style(&point.visual);
            PointFeature { point, style }
        })
        .collect()
}
