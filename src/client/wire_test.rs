#![allow(clippy::float_cmp)]

use super::*;
use serde_json::json;

fn map_data_json(zones: &Value, points: &Value) -> String {
    json!({ "zones": zones, "points": points }).to_string()
}

// =============================================================================
// parse_map_data: zones
// =============================================================================

#[test]
fn zone_polygon_swaps_lng_lat_and_closes() {
    let zones = json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "geometry": { "type": "Polygon", "coordinates": [[[44.0, 26.5], [45.0, 27.0], [45.5, 26.0], [44.5, 25.5]]] },
            "properties": { "id": 7, "name": "Imam Turki", "protection_level": "high" }
        }]
    });
    let data = parse_map_data(&map_data_json(&zones, &json!({ "features": [] }))).unwrap();

    assert_eq!(data.zones.len(), 1);
    let zone = &data.zones[0];
    assert_eq!(zone.id, "7");
    assert_eq!(zone.name, "Imam Turki");
    assert_eq!(zone.protection_level, Some(ProtectionLevel::High));
    assert_eq!(zone.ring[0], LatLng::new(26.5, 44.0));
    assert_eq!(zone.ring.len(), 5);
    assert_eq!(zone.ring.first(), zone.ring.last());
    assert!(data.points.is_empty());
}

#[test]
fn zone_multipolygon_splits_into_parts() {
    let zones = json!({
        "features": [{
            "geometry": { "type": "MultiPolygon", "coordinates": [
                [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]],
                [[[5.0, 5.0], [6.0, 5.0], [6.0, 6.0], [5.0, 5.0]]]
            ]},
            "properties": { "id": "ahsa", "name": "Al-Ahsa", "protection_level": "medium" }
        }]
    });
    let data = parse_map_data(&map_data_json(&zones, &json!(null))).unwrap();

    let ids: Vec<&str> = data.zones.iter().map(|z| z.id.as_str()).collect();
    assert_eq!(ids, vec!["ahsa/0", "ahsa/1"]);
    assert!(data.zones.iter().all(|z| z.protection_level == Some(ProtectionLevel::Medium)));
}

#[test]
fn zone_unknown_level_and_missing_name() {
    let zones = json!({
        "features": [{
            "geometry": { "type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]] },
            "properties": { "protection_level": "extreme" }
        }]
    });
    let data = parse_map_data(&map_data_json(&zones, &json!(null))).unwrap();

    assert_eq!(data.zones[0].id, "zone-0");
    assert_eq!(data.zones[0].name, "zone-0");
    assert_eq!(data.zones[0].protection_level, None);
}

#[test]
fn zone_features_with_bad_geometry_are_skipped() {
    let zones = json!({
        "features": [
            { "geometry": null, "properties": { "id": 1 } },
            { "geometry": { "type": "Point", "coordinates": [1.0, 1.0] }, "properties": { "id": 2 } },
            { "geometry": { "type": "LineString", "coordinates": [[1.0, 1.0], [2.0, 2.0]] }, "properties": { "id": 3 } },
            { "geometry": { "type": "Polygon", "coordinates": [[[1.0, 1.0], [2.0, 2.0], [1.0, 1.0]]] }, "properties": { "id": 4 } },
            { "geometry": { "type": "Polygon", "coordinates": [[[1.0, 95.0], [2.0, 2.0], [3.0, 1.0]]] }, "properties": { "id": 5 } },
            { "geometry": { "type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]] }, "properties": { "id": 6 } }
        ]
    });
    let data = parse_map_data(&map_data_json(&zones, &json!(null))).unwrap();

    assert_eq!(data.zones.len(), 1);
    assert_eq!(data.zones[0].id, "6");
}

// =============================================================================
// parse_map_data: points
// =============================================================================

#[test]
fn point_uses_backend_visual() {
    let points = json!({
        "features": [{
            "geometry": { "type": "Point", "coordinates": [46.7, 24.7] },
            "properties": {
                "id": 12,
                "inside_geofence": true,
                "zone_name": "X",
                "protection_level": "high",
                "visual": { "color": "#22c55e", "radius": 6, "popup": "inside X" }
            }
        }]
    });
    let data = parse_map_data(&map_data_json(&json!(null), &points)).unwrap();

    assert_eq!(data.points.len(), 1);
    let point = &data.points[0];
    assert_eq!(point.id, "12");
    assert_eq!(point.position, LatLng::new(24.7, 46.7));
    assert_eq!(point.visual.color, "#22c55e");
    assert_eq!(point.visual.radius, 6.0);
    assert_eq!(point.visual.popup, "inside X");
    assert_eq!(point.inside_geofence, Some(true));
    assert_eq!(point.zone_name.as_deref(), Some("X"));
    assert_eq!(point.protection_level, Some(ProtectionLevel::High));
}

#[test]
fn point_missing_visual_gets_defaults() {
    let points = json!({
        "features": [{ "id": "p1", "geometry": { "type": "Point", "coordinates": [10.0, 20.0] }, "properties": null }]
    });
    let data = parse_map_data(&map_data_json(&json!(null), &points)).unwrap();

    let point = &data.points[0];
    assert_eq!(point.id, "p1");
    assert_eq!(point.visual, PointVisual::default());
    assert_eq!(point.inside_geofence, None);
}

#[test]
fn point_invalid_radius_falls_back() {
    let points = json!({
        "features": [{
            "geometry": { "type": "Point", "coordinates": [10.0, 20.0] },
            "properties": { "visual": { "color": "", "radius": -3 } }
        }]
    });
    let data = parse_map_data(&map_data_json(&json!(null), &points)).unwrap();

    assert_eq!(data.points[0].visual.color, "#ef4444");
    assert_eq!(data.points[0].visual.radius, 6.0);
}

#[test]
fn point_bad_coordinates_skipped() {
    let points = json!({
        "features": [
            { "geometry": { "type": "Point", "coordinates": [10.0] } },
            { "geometry": { "type": "Point", "coordinates": [200.0, 20.0] } },
            { "geometry": { "type": "Polygon", "coordinates": [] } }
        ]
    });
    let data = parse_map_data(&map_data_json(&json!(null), &points)).unwrap();
    assert!(data.points.is_empty());
}

#[test]
fn map_data_missing_collections_is_empty() {
    let data = parse_map_data("{}").unwrap();
    assert_eq!(data, MapData::default());
}

#[test]
fn map_data_malformed_envelope_errors() {
    let err = parse_map_data("not json").unwrap_err();
    assert!(matches!(err, NetworkError::Parse(_)));

    let err = parse_map_data(r#"{"zones": 5}"#).unwrap_err();
    assert!(matches!(err, NetworkError::Parse(_)));
}

// =============================================================================
// parse_classification
// =============================================================================

#[test]
fn classification_inside() {
    let body = r#"{"status":"saved","inside":true,"zone_name":"X","protection_level":"high"}"#;
    let c = parse_classification(body).unwrap();
    assert!(c.is_inside);
    assert_eq!(c.zone_name.as_deref(), Some("X"));
    assert_eq!(c.protection_level, Some(ProtectionLevel::High));
}

#[test]
fn classification_outside_nulls() {
    let body = r#"{"status":"saved","inside":false,"zone_name":null,"protection_level":null}"#;
    let c = parse_classification(body).unwrap();
    assert!(!c.is_inside);
    assert_eq!(c.zone_name, None);
    assert_eq!(c.protection_level, None);
}

#[test]
fn classification_blank_zone_name_is_none() {
    let body = r#"{"inside":false,"zone_name":"  "}"#;
    assert_eq!(parse_classification(body).unwrap().zone_name, None);
}

#[test]
fn classification_missing_inside_errors() {
    assert!(matches!(parse_classification(r#"{"status":"saved"}"#), Err(NetworkError::Parse(_))));
}

#[test]
fn add_point_request_serializes_lat_lng() {
    let body = serde_json::to_value(AddPointRequest { lat: 24.7, lng: 46.7 }).unwrap();
    assert_eq!(body, json!({ "lat": 24.7, "lng": 46.7 }));
}
