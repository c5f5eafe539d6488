//! Tests for BoundingBox parsing and geometry.

use scene_common::bbox::{BboxParseError, BoundingBox};

// ============================================================================
// Parsing
// ============================================================================

#[test]
fn test_parse_floating() {
    let bbox: BoundingBox = "-125.5,24.75,-66.25,50.125".parse().unwrap();
    assert!((bbox.min_x - (-125.5)).abs() < 0.001);
    assert!((bbox.min_y - 24.75).abs() < 0.001);
    assert!((bbox.max_x - (-66.25)).abs() < 0.001);
    assert!((bbox.max_y - 50.125).abs() < 0.001);
}

#[test]
fn test_parse_tolerates_spaces() {
    let bbox: BoundingBox = " -100, 30, -90, 40 ".parse().unwrap();
    assert_eq!(bbox.min_x, -100.0);
    assert_eq!(bbox.max_y, 40.0);
}

#[test]
fn test_parse_too_few_parts() {
    let result = "0,0,100".parse::<BoundingBox>();
    assert!(matches!(result, Err(BboxParseError::InvalidFormat(_))));
}

#[test]
fn test_parse_invalid_number() {
    let result = "abc,0,100,100".parse::<BoundingBox>();
    assert!(matches!(result, Err(BboxParseError::InvalidNumber(_))));
}

#[test]
fn test_parse_inverted_box() {
    let result = "10,0,0,10".parse::<BoundingBox>();
    assert!(matches!(result, Err(BboxParseError::Degenerate(_))));
}

// ============================================================================
// Geometry
// ============================================================================

#[test]
fn test_width_height_center() {
    let bbox = BoundingBox::new(-10.0, 5.0, 10.0, 25.0);
    assert_eq!(bbox.width(), 20.0);
    assert_eq!(bbox.height(), 20.0);
    assert_eq!(bbox.center(), (0.0, 15.0));
}

#[test]
fn test_adjacent_edges_do_not_intersect() {
    let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
    let b = BoundingBox::new(10.0, 0.0, 20.0, 10.0);
    assert!(!a.intersects(&b));
    assert!(a.intersection(&b).is_none());
}

#[test]
fn test_contains_with_tolerance() {
    let outer = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
    let inner = BoundingBox::new(-0.05, 1.0, 9.0, 10.04);
    assert!(!outer.contains(&inner, 0.0));
    assert!(outer.contains(&inner, 0.1));
}

#[test]
fn test_from_lonlat_order() {
    let bbox = BoundingBox::from_lonlat(-105.0, 30.0, -85.0, 45.0);
    assert!(bbox.is_valid());
    assert!(bbox.contains_point(-95.0, 40.0));
    assert!(!bbox.contains_point(-80.0, 40.0));
}
