#[cfg(test)]
#[path = "camera_test.rs"]
mod camera_test;

use std::f64::consts::PI;

use serde::Serialize;

use crate::config::ViewportSize;
use crate::geo::LatLng;

/// Opening view: centered on the Arabian Peninsula.
pub const INITIAL_CENTER: LatLng = LatLng { lat: 25.13, lng: 46.57 };
pub const INITIAL_ZOOM: f64 = 6.0;
pub const MIN_ZOOM: f64 = 0.0;
pub const MAX_ZOOM: f64 = 19.0;

/// Web-Mercator stops being defined past this latitude.
const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;
const TILE_SIZE: f64 = 256.0;

/// A point in screen space (pixels from the top-left of the viewport).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Map camera: geographic center, zoom level and viewport size.
///
/// `zoom` follows slippy-map convention: the world is `256 * 2^zoom` pixels wide.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Camera {
    pub center: LatLng,
    pub zoom: f64,
    #[serde(skip)]
    pub size: ViewportSize,
}

impl Camera {
    #[must_use]
    pub fn new(size: ViewportSize) -> Self {
        Self { center: INITIAL_CENTER, zoom: INITIAL_ZOOM, size }
    }

    /// Move to `center` at `zoom`, clamping zoom to the supported range.
    pub fn set_view(&mut self, center: LatLng, zoom: f64) {
        self.center = center;
        self.zoom = clamp_zoom(zoom);
    }

    /// Convert a geographic position to screen coordinates.
    #[must_use]
    pub fn project(&self, position: LatLng) -> ScreenPoint {
        let (x, y) = world_pixels(position, self.zoom);
        let (cx, cy) = world_pixels(self.center, self.zoom);
        ScreenPoint { x: x - cx + self.size.width / 2.0, y: y - cy + self.size.height / 2.0 }
    }

    /// Inverse of [`Self::project`].
    #[must_use]
    pub fn unproject(&self, screen: ScreenPoint) -> LatLng {
        let (cx, cy) = world_pixels(self.center, self.zoom);
        let x = screen.x - self.size.width / 2.0 + cx;
        let y = screen.y - self.size.height / 2.0 + cy;
        let scale = world_size(self.zoom);

        let lng = x / scale * 360.0 - 180.0;
        let n = PI * (1.0 - 2.0 * y / scale);
        let lat = n.sinh().atan().to_degrees();
        LatLng::new(lat, lng)
    }

    /// True when `position` projects inside the viewport rectangle.
    #[must_use]
    pub fn contains(&self, position: LatLng) -> bool {
        let p = self.project(position);
        (0.0..=self.size.width).contains(&p.x) && (0.0..=self.size.height).contains(&p.y)
    }
}

#[must_use]
pub fn clamp_zoom(zoom: f64) -> f64 {
    if zoom.is_nan() { MIN_ZOOM } else { zoom.clamp(MIN_ZOOM, MAX_ZOOM) }
}

fn world_size(zoom: f64) -> f64 {
    TILE_SIZE * zoom.exp2()
}

fn world_pixels(position: LatLng, zoom: f64) -> (f64, f64) {
    let scale = world_size(zoom);
    let lat = position.lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
    let x = (position.lng + 180.0) / 360.0 * scale;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * scale;
    (x, y)
}
