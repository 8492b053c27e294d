#![allow(clippy::float_cmp)]

use super::*;

#[test]
fn zone_colors_follow_protection_level() {
    assert_eq!(zone_color(Some(ProtectionLevel::High)), "#dc2626");
    assert_eq!(zone_color(Some(ProtectionLevel::Medium)), "#d97706");
    assert_eq!(zone_color(Some(ProtectionLevel::Low)), "#0ea5e9");
    assert_eq!(zone_color(None), "#0ea5e9");
}

#[test]
fn zone_style_uses_shared_stroke_and_fill() {
    let style = zone_style(Some(ProtectionLevel::High));
    assert_eq!(style.color, style.fill_color);
    assert_eq!(style.weight, 2.0);
    assert_eq!(style.fill_opacity, 0.15);
}

#[test]
fn point_style_copies_backend_visual() {
    let visual = PointVisual { color: "#123456".into(), radius: 4.5, popup: "well 7".into() };
    let style = point_style(&visual);
    assert_eq!(style.color, "#123456");
    assert_eq!(style.radius, 4.5);
    assert_eq!(style.popup, "well 7");
}

#[test]
fn self_marker_style_is_fixed() {
    let style = self_marker_style();
    assert_eq!(style.color, "#1e3a5f");
    assert_eq!(style.radius, 10.0);
    assert_eq!(style.weight, 3.0);
    assert_eq!(style.popup, "your current location");
}

#[test]
fn confirmation_inside_is_green_and_names_zone() {
    let classification = ReserveClassification {
        zone_name: Some("Imam Turki Reserve".into()),
        protection_level: Some(ProtectionLevel::High),
        is_inside: true,
    };
    let style = confirmation_style(&classification, LatLng::new(24.7, 46.7));
    assert_eq!(style.color, "#22c55e");
    assert_eq!(style.radius, 8.0);
    assert!(style.popup.contains("Imam Turki Reserve"));
    assert!(style.popup.starts_with("inside"));
}

#[test]
fn confirmation_outside_is_red_and_unprotected() {
    let classification = ReserveClassification { zone_name: None, protection_level: None, is_inside: false };
    let style = confirmation_style(&classification, LatLng::new(21.0, 39.0));
    assert_eq!(style.color, "#ef4444");
    assert!(style.popup.contains("unprotected area"));
}
