use geo::{BoundingRect, Centroid, Geometry, Point, Rect};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A value stored under `(key, id)` in a collection.
///
/// Most objects are geometries. String objects are stored alongside them but never
/// take part in spatial evaluation.
///
/// # Examples
///
/// ```
/// use spatio_types::object::Object;
/// use geo::Point;
///
/// let truck = Object::point(-112.26, 33.46);
/// assert!(truck.is_geometry());
/// assert_eq!(truck.representative_point(), Some(Point::new(-112.26, 33.46)));
///
/// let note = Object::String("parked".into());
/// assert!(note.geometry().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Object {
    Geometry(Geometry<f64>),
    String(String),
}

impl Object {
    /// Point object from longitude/latitude.
    pub fn point(lon: f64, lat: f64) -> Self {
        Object::Geometry(Geometry::Point(Point::new(lon, lat)))
    }

    pub fn is_geometry(&self) -> bool {
        matches!(self, Object::Geometry(_))
    }

    pub fn geometry(&self) -> Option<&Geometry<f64>> {
        match self {
            Object::Geometry(geometry) => Some(geometry),
            Object::String(_) => None,
        }
    }

    /// The single point used for distance and radius tests.
    ///
    /// Points stand for themselves; every other geometry is reduced to its centroid.
    /// Returns `None` for string objects and empty geometries.
    pub fn representative_point(&self) -> Option<Point<f64>> {
        match self.geometry()? {
            Geometry::Point(point) => Some(*point),
            other => other.centroid(),
        }
    }

    /// Bounding rectangle of the geometry, `None` for string objects.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.geometry()?.bounding_rect()
    }
}

impl From<Geometry<f64>> for Object {
    fn from(geometry: Geometry<f64>) -> Self {
        Object::Geometry(geometry)
    }
}

impl From<Point<f64>> for Object {
    fn from(point: Point<f64>) -> Self {
        Object::Geometry(Geometry::Point(point))
    }
}

/// Named numeric field values attached to an object.
///
/// A field that was never set reads as `0.0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fields(BTreeMap<String, f64>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> f64 {
        self.0.get(name).copied().unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(name, value)| (name.as_str(), *value))
    }

    /// Overlay `other` on top of these fields.
    pub fn merge(&mut self, other: &Fields) {
        for (name, value) in other.iter() {
            self.set(name, value);
        }
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for Fields {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn test_polygon_representative_point_is_centroid() {
        let square: Geometry<f64> = polygon![
            (x: 0.0, y: 0.0),
            (x: 2.0, y: 0.0),
            (x: 2.0, y: 2.0),
            (x: 0.0, y: 2.0),
            (x: 0.0, y: 0.0),
        ]
        .into();
        let object = Object::from(square);

        let point = object.representative_point().unwrap();
        assert!((point.x() - 1.0).abs() < 1e-9);
        assert!((point.y() - 1.0).abs() < 1e-9);
        assert_eq!(object.bounds().unwrap().max().x, 2.0);
    }

    #[test]
    fn test_string_object_has_no_geometry() {
        let object = Object::String("hello".into());
        assert!(!object.is_geometry());
        assert!(object.representative_point().is_none());
        assert!(object.bounds().is_none());
    }

    #[test]
    fn test_missing_field_reads_zero() {
        let mut fields = Fields::new().with("speed", 42.0);
        assert_eq!(fields.get("speed"), 42.0);
        assert_eq!(fields.get("heading"), 0.0);

        fields.merge(&Fields::new().with("heading", 90.0).with("speed", 10.0));
        assert_eq!(fields.len(), 2);
        assert_eq!(fields.get("speed"), 10.0);
    }
}
