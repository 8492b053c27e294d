//! Declarative style rules for map features.

#[cfg(test)]
#[path = "style_test.rs"]
mod style_test;

use serde::Serialize;

use crate::geo::{LatLng, PointVisual, ProtectionLevel, ReserveClassification};

// ── Zones ───────────────────────────────────────────────────────

pub const ZONE_HIGH_COLOR: &str = "#dc2626";
pub const ZONE_MEDIUM_COLOR: &str = "#d97706";
/// Low protection and zones without a level.
pub const ZONE_LOW_COLOR: &str = "#0ea5e9";
pub const ZONE_WEIGHT: f64 = 2.0;
pub const ZONE_FILL_OPACITY: f64 = 0.15;

// ── Markers ─────────────────────────────────────────────────────

pub const SELF_MARKER_COLOR: &str = "#1e3a5f";
pub const SELF_MARKER_RADIUS: f64 = 10.0;
pub const SELF_MARKER_WEIGHT: f64 = 3.0;
pub const SELF_MARKER_POPUP: &str = "your current location";

pub const INSIDE_COLOR: &str = "#22c55e";
pub const OUTSIDE_COLOR: &str = "#ef4444";
pub const CONFIRMATION_RADIUS: f64 = 8.0;

const MARKER_WEIGHT: f64 = 2.0;
const MARKER_FILL_OPACITY: f64 = 1.0;

/// Stroke and fill of a zone polygon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PathStyle {
    pub color: &'static str,
    pub fill_color: &'static str,
    pub weight: f64,
    pub fill_opacity: f64,
}

/// Circle marker appearance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerStyle {
    pub color: String,
    pub radius: f64,
    pub weight: f64,
    pub fill_opacity: f64,
    pub popup: String,
}

impl MarkerStyle {
    /// Solid circle of `color` with the default transient-marker geometry.
    #[must_use]
    pub fn solid(color: &str) -> Self {
        Self {
            color: color.to_string(),
            radius: CONFIRMATION_RADIUS,
            weight: MARKER_WEIGHT,
            fill_opacity: MARKER_FILL_OPACITY,
            popup: String::new(),
        }
    }
}

#[must_use]
pub fn zone_color(level: Option<ProtectionLevel>) -> &'static str {
    match level {
        Some(ProtectionLevel::High) => ZONE_HIGH_COLOR,
        Some(ProtectionLevel::Medium) => ZONE_MEDIUM_COLOR,
        Some(ProtectionLevel::Low) | None => ZONE_LOW_COLOR,
    }
}

#[must_use]
pub fn zone_style(level: Option<ProtectionLevel>) -> PathStyle {
    let color = zone_color(level);
    PathStyle { color, fill_color: color, weight: ZONE_WEIGHT, fill_opacity: ZONE_FILL_OPACITY }
}

/// Backend points are drawn exactly as the backend describes them.
#[must_use]
pub fn point_style(visual: &PointVisual) -> MarkerStyle {
    MarkerStyle {
        color: visual.color.clone(),
        radius: visual.radius,
        weight: MARKER_WEIGHT,
        fill_opacity: MARKER_FILL_OPACITY,
        popup: visual.popup.clone(),
    }
}

#[must_use]
pub fn self_marker_style() -> MarkerStyle {
    MarkerStyle {
        color: SELF_MARKER_COLOR.to_string(),
        radius: SELF_MARKER_RADIUS,
        weight: SELF_MARKER_WEIGHT,
        fill_opacity: MARKER_FILL_OPACITY,
        popup: SELF_MARKER_POPUP.to_string(),
    }
}

#[must_use]
pub fn confirmation_color(is_inside: bool) -> &'static str {
    if is_inside { INSIDE_COLOR } else { OUTSIDE_COLOR }
}

/// Final look of a submitted point once its classification is known.
#[must_use]
pub fn confirmation_style(classification: &ReserveClassification, position: LatLng) -> MarkerStyle {
    let verdict = if classification.is_inside { "inside" } else { "outside" };
    MarkerStyle {
        popup: format!("{verdict}: {}\n{position}", classification.display_name()),
        ..MarkerStyle::solid(confirmation_color(classification.is_inside))
    }
}
