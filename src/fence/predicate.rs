//! Geometry predicates.
//!
//! Each query kind is a small strategy exposing `matches`. The detector picks
//! one from the fence's [`QueryKind`] and, for crossing tests, always builds an
//! [`IntersectsPredicate`] explicitly rather than touching the fence config.

use crate::config::{FenceArea, QueryKind};
use crate::spatial::{bounding_box, distance_between, distance_to_geometry, rect_within};
use geo::{BoundingRect, Centroid, Geometry, Intersects, Point, Rect, Relate};
use spatio_types::Object;

pub trait FencePredicate {
    fn matches_geometry(&self, geometry: &Geometry) -> bool;

    /// Objects without geometry (or no object at all) never match.
    fn matches(&self, object: Option<&Object>) -> bool {
        object
            .and_then(Object::geometry)
            .is_some_and(|geometry| self.matches_geometry(geometry))
    }
}

fn representative_point(geometry: &Geometry) -> Option<Point> {
    match geometry {
        Geometry::Point(point) => Some(*point),
        other => other.centroid(),
    }
}

/// Rectangle of a bounds area. `None` for other areas and inverted bounds.
fn area_bounds(area: &FenceArea) -> Option<Rect> {
    match area {
        FenceArea::Bounds {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        } => bounding_box(*min_lon, *min_lat, *max_lon, *max_lat).ok(),
        _ => None,
    }
}

/// Representative point within `meters` of `center`.
#[derive(Debug, Clone, Copy)]
pub struct NearbyPredicate {
    center: Point,
    meters: f64,
}

impl NearbyPredicate {
    pub fn new(center: Point, meters: f64) -> Self {
        Self { center, meters }
    }
}

impl FencePredicate for NearbyPredicate {
    fn matches_geometry(&self, geometry: &Geometry) -> bool {
        representative_point(geometry)
            .is_some_and(|point| distance_between(&self.center, &point) <= self.meters)
    }
}

/// Geometry fully contained in the area, boundary included.
#[derive(Debug, Clone, Copy)]
pub struct WithinPredicate<'a> {
    area: &'a FenceArea,
}

impl<'a> WithinPredicate<'a> {
    pub fn new(area: &'a FenceArea) -> Self {
        Self { area }
    }
}

impl FencePredicate for WithinPredicate<'_> {
    fn matches_geometry(&self, geometry: &Geometry) -> bool {
        match self.area {
            FenceArea::Circle { lat, lon, meters } => {
                NearbyPredicate::new(Point::new(*lon, *lat), *meters).matches_geometry(geometry)
            }
            FenceArea::Bounds { .. } => match (area_bounds(self.area), geometry.bounding_rect()) {
                (Some(bounds), Some(rect)) => rect_within(&rect, &bounds),
                _ => false,
            },
            FenceArea::Shape { geometry: shape } => shape.relate(geometry).is_covers(),
        }
    }
}

/// Geometry touching the area, boundary included.
#[derive(Debug, Clone, Copy)]
pub struct IntersectsPredicate<'a> {
    area: &'a FenceArea,
}

impl<'a> IntersectsPredicate<'a> {
    pub fn new(area: &'a FenceArea) -> Self {
        Self { area }
    }
}

impl FencePredicate for IntersectsPredicate<'_> {
    fn matches_geometry(&self, geometry: &Geometry) -> bool {
        match self.area {
            FenceArea::Circle { lat, lon, meters } => {
                distance_to_geometry(&Point::new(*lon, *lat), geometry) <= *meters
            }
            FenceArea::Bounds { .. } => area_bounds(self.area)
                .is_some_and(|bounds| Geometry::Rect(bounds).intersects(geometry)),
            FenceArea::Shape { geometry: shape } => shape.intersects(geometry),
        }
    }
}

/// The strategy selected by a fence's query kind.
#[derive(Debug, Clone, Copy)]
pub enum Predicate<'a> {
    Nearby(NearbyPredicate),
    Within(WithinPredicate<'a>),
    Intersects(IntersectsPredicate<'a>),
    /// No area configured.
    Never,
}

impl<'a> Predicate<'a> {
    pub fn for_query(query: QueryKind, area: Option<&'a FenceArea>) -> Self {
        let Some(area) = area else {
            return Predicate::Never;
        };
        match (query, area) {
            (QueryKind::Nearby, FenceArea::Circle { lat, lon, meters }) => {
                Predicate::Nearby(NearbyPredicate::new(Point::new(*lon, *lat), *meters))
            }
            (QueryKind::Nearby | QueryKind::Within, _) => {
                Predicate::Within(WithinPredicate::new(area))
            }
            (QueryKind::Intersects, _) => Predicate::Intersects(IntersectsPredicate::new(area)),
        }
    }

    /// Predicate used to test the segment between an old and new position.
    pub fn crossing(area: Option<&'a FenceArea>) -> Self {
        match area {
            Some(area) => Predicate::Intersects(IntersectsPredicate::new(area)),
            None => Predicate::Never,
        }
    }
}

impl FencePredicate for Predicate<'_> {
    fn matches_geometry(&self, geometry: &Geometry) -> bool {
        match self {
            Predicate::Nearby(p) => p.matches_geometry(geometry),
            Predicate::Within(p) => p.matches_geometry(geometry),
            Predicate::Intersects(p) => p.matches_geometry(geometry),
            Predicate::Never => false,
        }
    }
}
