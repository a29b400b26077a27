//! Spatial operations and utilities leveraging the geo crate.
//!
//! This module provides the handful of geometric helpers the fence engine needs
//! on top of `geo`: distances in meters, bounding boxes, and the approximate
//! degree envelope around a radius used to pre-filter index lookups.

use crate::error::{FenceError, Result};
use geo::{Closest, ClosestPoint, Distance, Geometry, Haversine, Point, Rect};

/// Mean meters per degree of latitude.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Haversine distance between two lon/lat points.
///
/// # Returns
///
/// Distance in meters
///
/// # Examples
///
/// ```rust
/// use spatio_fence::spatial::distance_between;
/// use geo::Point;
///
/// let nyc = Point::new(-74.0060, 40.7128);
/// let la = Point::new(-118.2437, 34.0522);
///
/// let dist = distance_between(&nyc, &la);
/// assert!(dist > 3_900_000.0); // ~3,944 km
/// ```
pub fn distance_between(point1: &Point, point2: &Point) -> f64 {
    Haversine.distance(*point1, *point2)
}

/// Haversine meters from `point` to the nearest part of `geometry`.
///
/// Zero when the point lies on or inside the geometry. The closest point is
/// found in degree space, so this is an approximation for long segments.
pub fn distance_to_geometry(point: &Point, geometry: &Geometry) -> f64 {
    match geometry.closest_point(point) {
        Closest::Intersection(_) => 0.0,
        Closest::SinglePoint(closest) => Haversine.distance(*point, closest),
        Closest::Indeterminate => f64::INFINITY,
    }
}

/// Create a bounding box (Rect) from min/max coordinates.
///
/// # Errors
///
/// Returns an error if min > max for either coordinate, or any value is not finite.
///
/// # Examples
///
/// ```rust
/// use spatio_fence::spatial::bounding_box;
///
/// // Manhattan bounding box
/// let bbox = bounding_box(-74.02, 40.70, -73.93, 40.80).unwrap();
/// assert!(bounding_box(-73.0, 40.0, -74.0, 41.0).is_err());
/// ```
pub fn bounding_box(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Result<Rect> {
    if ![min_lon, min_lat, max_lon, max_lat]
        .iter()
        .all(|v| v.is_finite())
    {
        return Err(FenceError::InvalidInput(
            "bounding box coordinates must be finite".into(),
        ));
    }
    if min_lon > max_lon {
        return Err(FenceError::InvalidInput(format!(
            "min_lon ({}) must be <= max_lon ({})",
            min_lon, max_lon
        )));
    }
    if min_lat > max_lat {
        return Err(FenceError::InvalidInput(format!(
            "min_lat ({}) must be <= max_lat ({})",
            min_lat, max_lat
        )));
    }

    Ok(Rect::new(
        geo::coord! { x: min_lon, y: min_lat },
        geo::coord! { x: max_lon, y: max_lat },
    ))
}

/// Inclusive containment of `inner` within `outer`.
pub fn rect_within(inner: &Rect, outer: &Rect) -> bool {
    inner.min().x >= outer.min().x
        && inner.min().y >= outer.min().y
        && inner.max().x <= outer.max().x
        && inner.max().y <= outer.max().y
}

/// Degree envelopes that together enclose every point within `meters` of `center`.
///
/// Rough approximation: one degree of latitude is ~111km, longitude shrinks
/// with the cosine of the latitude. Near the poles the envelope spans every
/// longitude. A radius reaching past the antimeridian yields a second envelope
/// on the far side; the envelopes never overlap.
pub fn radius_envelopes(center: &Point, meters: f64) -> Vec<Rect> {
    let lat_offset = meters / METERS_PER_DEGREE;
    let cos_lat = center.y().to_radians().cos();
    let lon_offset = if cos_lat.abs() < 1e-9 {
        360.0
    } else {
        meters / (METERS_PER_DEGREE * cos_lat.abs())
    };
    let min_y = (center.y() - lat_offset).max(-90.0);
    let max_y = (center.y() + lat_offset).min(90.0);
    let span = |min_x: f64, max_x: f64| {
        Rect::new(
            geo::coord! { x: min_x, y: min_y },
            geo::coord! { x: max_x, y: max_y },
        )
    };

    if lon_offset >= 180.0 {
        return vec![span(-180.0, 180.0)];
    }
    let west = center.x() - lon_offset;
    let east = center.x() + lon_offset;
    let mut envelopes = vec![span(west.max(-180.0), east.min(180.0))];
    if west < -180.0 {
        envelopes.push(span(west + 360.0, 180.0));
    }
    if east > 180.0 {
        envelopes.push(span(-180.0, east - 360.0));
    }
    envelopes
}

/// Round meters to millimetre precision for output.
pub fn round_meters(meters: f64) -> f64 {
    (meters * 1000.0).round() / 1000.0
}
