//! Geographic domain types.
//!
//! Zones and points are immutable snapshots of backend state: each sync cycle
//! replaces them wholesale. `ReserveClassification` is the transient result of
//! a single point submission and is never stored in the map model.

#[cfg(test)]
#[path = "geo_test.rs"]
mod geo_test;

use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// Valid latitude range in decimal degrees.
pub const LAT_RANGE: RangeInclusive<f64> = -90.0..=90.0;
/// Valid longitude range in decimal degrees.
pub const LNG_RANGE: RangeInclusive<f64> = -180.0..=180.0;

/// Popup text and `reserve_info` name used when a point is in no zone.
pub const UNPROTECTED_AREA: &str = "unprotected area";

// =============================================================================
// COORDINATES
// =============================================================================

/// A WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    #[must_use]
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// True when both components are finite and inside their ranges.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite() && LAT_RANGE.contains(&self.lat) && LNG_RANGE.contains(&self.lng)
    }

    /// True when `other` differs from `self` by more than `threshold` degrees
    /// on either axis.
    #[must_use]
    pub fn moved_beyond(&self, other: &LatLng, threshold: f64) -> bool {
        (self.lat - other.lat).abs() > threshold || (self.lng - other.lng).abs() > threshold
    }
}

impl fmt::Display for LatLng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.lat, self.lng)
    }
}

// =============================================================================
// PROTECTION LEVEL
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtectionLevel {
    High,
    Medium,
    Low,
}

impl ProtectionLevel {
    /// Case-insensitive parse of the backend's level string. Unknown values
    /// yield `None` and are styled like an absent level.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for ProtectionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ZONES & POINTS
// =============================================================================

/// A protected zone polygon. The ring is always closed (first == last).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
    pub protection_level: Option<ProtectionLevel>,
    pub ring: Vec<LatLng>,
}

impl Zone {
    /// Build a zone from an outer ring, closing it if needed.
    ///
    /// Returns `None` when the ring has fewer than three distinct vertices.
    #[must_use]
    pub fn from_ring(
        id: impl Into<String>,
        name: impl Into<String>,
        protection_level: Option<ProtectionLevel>,
        mut ring: Vec<LatLng>,
    ) -> Option<Self> {
        if !has_three_distinct(&ring) {
            return None;
        }

        if ring.first() != ring.last() {
            ring.push(ring[0]);
        }

        Some(Self { id: id.into(), name: name.into(), protection_level, ring })
    }

    /// Vertices without the closing duplicate.
    #[must_use]
    pub fn vertices(&self) -> &[LatLng] {
        &self.ring[..self.ring.len().saturating_sub(1)]
    }
}

/// Whether `ring` has at least three distinct vertices. Returns at the third.
fn has_three_distinct(ring: &[LatLng]) -> bool {
    let mut first: Option<LatLng> = None;
    let mut second: Option<LatLng> = None;
    for &vertex in ring {
        match (first, second) {
            (None, _) => first = Some(vertex),
            (Some(a), None) if a != vertex => second = Some(vertex),
            (Some(a), Some(b)) if a != vertex && b != vertex => return true,
            _ => {}
        }
    }
    false
}

/// Backend-supplied styling for a recorded point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointVisual {
    pub color: String,
    pub radius: f64,
    pub popup: String,
}

impl Default for PointVisual {
    fn default() -> Self {
        Self { color: "#ef4444".into(), radius: 6.0, popup: String::new() }
    }
}

/// A previously recorded coordinate as served by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapPoint {
    pub id: String,
    pub position: LatLng,
    pub visual: PointVisual,
    pub inside_geofence: Option<bool>,
    pub zone_name: Option<String>,
    pub protection_level: Option<ProtectionLevel>,
}

/// One sync cycle's worth of backend data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapData {
    pub zones: Vec<Zone>,
    pub points: Vec<MapPoint>,
}

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// Backend geofence verdict for one submitted point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveClassification {
    pub zone_name: Option<String>,
    pub protection_level: Option<ProtectionLevel>,
    pub is_inside: bool,
}

impl ReserveClassification {
    /// Zone name, or [`UNPROTECTED_AREA`] when the point is in no zone.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.zone_name.as_deref().filter(|n| !n.is_empty()).unwrap_or(UNPROTECTED_AREA)
    }
}

/// Read model the host renders outside the map ("current reserve" card).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReserveInfo {
    pub name: String,
    pub protection_level: ProtectionLevel,
    pub is_inside: bool,
}

impl From<&ReserveClassification> for ReserveInfo {
    fn from(value: &ReserveClassification) -> Self {
        Self {
            name: value.display_name().to_string(),
            protection_level: value.protection_level.unwrap_or(ProtectionLevel::Low),
            is_inside: value.is_inside,
        }
    }
}
