//! Wire types for the map-data and add-point endpoints.
//!
//! The backend serves zones and points as GeoJSON `FeatureCollection`s built
//! straight from PostGIS (`ST_AsGeoJSON`), so positions arrive in
//! `[lng, lat]` order and ids may be numbers or strings. Parsing is pure and
//! lenient per feature: a bad feature is skipped with a warning, a bad
//! envelope fails the whole response.

#[cfg(test)]
#[path = "wire_test.rs"]
mod wire_test;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::NetworkError;
use crate::geo::{LatLng, MapData, MapPoint, PointVisual, ProtectionLevel, ReserveClassification, Zone};

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct AddPointRequest {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Deserialize)]
struct AddPointResponse {
    inside: bool,
    #[serde(default)]
    zone_name: Option<String>,
    #[serde(default)]
    protection_level: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MapDataResponse {
    #[serde(default)]
    zones: Option<FeatureCollection<ZoneProperties>>,
    #[serde(default)]
    points: Option<FeatureCollection<PointProperties>>,
}

#[derive(Debug, Deserialize)]
struct FeatureCollection<P> {
    #[serde(default = "Vec::new")]
    features: Vec<Feature<P>>,
}

#[derive(Debug, Deserialize)]
struct Feature<P> {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    geometry: Option<Geometry>,
    #[serde(default = "Option::default")]
    properties: Option<P>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Point { coordinates: Vec<f64> },
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Default, Deserialize)]
struct ZoneProperties {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    protection_level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PointProperties {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    visual: Option<VisualProperties>,
    #[serde(default)]
    inside_geofence: Option<bool>,
    #[serde(default)]
    zone_name: Option<String>,
    #[serde(default)]
    protection_level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct VisualProperties {
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    radius: Option<f64>,
    #[serde(default)]
    popup: Option<String>,
}

// =============================================================================
// PARSING
// =============================================================================

/// Parse a `map-data` response body.
pub(crate) fn parse_map_data(json: &str) -> Result<MapData, NetworkError> {
    let response: MapDataResponse = serde_json::from_str(json).map_err(|e| NetworkError::Parse(e.to_string()))?;

    let zones = response
        .zones
        .map(|fc| fc.features)
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .flat_map(|(index, feature)| zones_from_feature(index, feature))
        .collect();

    let points = response
        .points
        .map(|fc| fc.features)
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .filter_map(|(index, feature)| point_from_feature(index, feature))
        .collect();

    Ok(MapData { zones, points })
}

/// Parse an `add-point` response body.
pub(crate) fn parse_classification(json: &str) -> Result<ReserveClassification, NetworkError> {
    let response: AddPointResponse = serde_json::from_str(json).map_err(|e| NetworkError::Parse(e.to_string()))?;

    Ok(ReserveClassification {
        zone_name: response.zone_name.filter(|name| !name.trim().is_empty()),
        protection_level: response.protection_level.as_deref().and_then(parse_level),
        is_inside: response.inside,
    })
}

fn zones_from_feature(index: usize, feature: Feature<ZoneProperties>) -> Vec<Zone> {
    let props = feature.properties.unwrap_or_default();
    let id = feature_id(feature.id.as_ref().or(props.id.as_ref()), "zone", index);
    let name = props.name.unwrap_or_else(|| id.clone());
    let level = props.protection_level.as_deref().and_then(parse_level);

    let polygons = match feature.geometry {
        Some(Geometry::Polygon { coordinates }) => vec![coordinates],
        Some(Geometry::MultiPolygon { coordinates }) => coordinates,
        other => {
            warn!(zone_id = %id, geometry = ?other.map(|g| geometry_kind(&g)), "skipping zone without polygon geometry");
            return Vec::new();
        }
    };

    let multi = polygons.len() > 1;
    let mut zones = Vec::with_capacity(polygons.len());
    for (part, rings) in polygons.into_iter().enumerate() {
        let part_id = if multi { format!("{id}/{part}") } else { id.clone() };
        let Some(outer) = rings.into_iter().next() else {
            warn!(zone_id = %part_id, "skipping zone part without rings");
            continue;
        };
        let Some(ring) = outer.iter().map(|pos| position(pos)).collect::<Option<Vec<LatLng>>>() else {
            warn!(zone_id = %part_id, "skipping zone with malformed coordinates");
            continue;
        };
        match Zone::from_ring(part_id.clone(), name.clone(), level, ring) {
            Some(zone) => zones.push(zone),
            None => warn!(zone_id = %part_id, "skipping degenerate zone ring"),
        }
    }
    zones
}

fn point_from_feature(index: usize, feature: Feature<PointProperties>) -> Option<MapPoint> {
    let props = feature.properties.unwrap_or_default();
    let id = feature_id(feature.id.as_ref().or(props.id.as_ref()), "point", index);

    let Some(Geometry::Point { coordinates }) = feature.geometry else {
        warn!(point_id = %id, "skipping point without Point geometry");
        return None;
    };
    let Some(position) = position(&coordinates) else {
        warn!(point_id = %id, "skipping point with malformed coordinates");
        return None;
    };

    let defaults = PointVisual::default();
    let visual = props.visual.unwrap_or_default();
    let visual = PointVisual {
        color: visual.color.filter(|c| !c.is_empty()).unwrap_or(defaults.color),
        radius: visual.radius.filter(|r| r.is_finite() && *r > 0.0).unwrap_or(defaults.radius),
        popup: visual.popup.unwrap_or(defaults.popup),
    };

    Some(MapPoint {
        id,
        position,
        visual,
        inside_geofence: props.inside_geofence,
        zone_name: props.zone_name,
        protection_level: props.protection_level.as_deref().and_then(parse_level),
    })
}

/// GeoJSON position `[lng, lat, ...]` → `LatLng`, rejecting out-of-range values.
fn position(coords: &[f64]) -> Option<LatLng> {
    let [lng, lat, ..] = coords else {
        return None;
    };
    let pos = LatLng::new(*lat, *lng);
    pos.is_valid().then_some(pos)
}

fn feature_id(raw: Option<&Value>, kind: &str, index: usize) -> String {
    match raw {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => format!("{kind}-{index}"),
    }
}

fn parse_level(raw: &str) -> Option<ProtectionLevel> {
    let level = ProtectionLevel::parse(raw);
    if level.is_none() {
        debug!(raw, "unknown protection level");
    }
    level
}

fn geometry_kind(geometry: &Geometry) -> &'static str {
    match geometry {
        Geometry::Point { .. } => "Point",
        Geometry::Polygon { .. } => "Polygon",
        Geometry::MultiPolygon { .. } => "MultiPolygon",
        Geometry::Unsupported => "unsupported",
    }
}
