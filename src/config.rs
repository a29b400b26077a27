//! Fence configuration.
//!
//! A [`FenceSpec`] is the static half of a live fence: which collection it
//! watches, the geometry it tests against, and the filters and roam settings
//! that shape its notifications. It is designed to be loaded from JSON or TOML
//! when a subscription is registered.
//!
//! # Example
//!
//! ```rust
//! use spatio_fence::{FenceSpec, QueryKind};
//!
//! let json = r#"{
//!     "key": "fleet",
//!     "query": "within",
//!     "area": {
//!         "type": "bounds",
//!         "min_lat": -0.5, "min_lon": -0.5, "max_lat": 0.5, "max_lon": 0.5
//!     },
//!     "id_pattern": "truck*",
//!     "detect": ["enter", "exit"]
//! }"#;
//! let spec = FenceSpec::from_json(json).unwrap();
//! assert_eq!(spec.query, QueryKind::Within);
//! ```

use crate::error::{FenceError, Result};
use crate::fence::detect::DetectSet;
use crate::glob::Pattern;
use crate::spatial::bounding_box;
use geo::{Geometry, Point};
use serde::{Deserialize, Serialize};
use spatio_types::Fields;
use std::collections::BTreeSet;
use std::path::Path;

/// The spatial relationship a fence tests for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// Representative point within a radius of the fence centre.
    #[default]
    Nearby,
    /// Object fully contained in the area.
    Within,
    /// Object touches the area.
    Intersects,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Nearby => "nearby",
            QueryKind::Within => "within",
            QueryKind::Intersects => "intersects",
        }
    }
}

/// The geometry a fence is evaluated against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FenceArea {
    Circle {
        lat: f64,
        lon: f64,
        meters: f64,
    },
    Bounds {
        min_lat: f64,
        min_lon: f64,
        max_lat: f64,
        max_lon: f64,
    },
    /// Any GeoJSON geometry.
    Shape {
        #[serde(with = "geojson_geometry")]
        geometry: Geometry<f64>,
    },
}

impl FenceArea {
    /// Centre of a circle area.
    pub fn center(&self) -> Option<Point> {
        match self {
            FenceArea::Circle { lat, lon, .. } => Some(Point::new(*lon, *lat)),
            _ => None,
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            FenceArea::Circle { lat, lon, meters } => {
                if !lat.is_finite() || !lon.is_finite() {
                    return Err(FenceError::InvalidInput(
                        "circle centre must be finite".into(),
                    ));
                }
                if !meters.is_finite() || *meters < 0.0 {
                    return Err(FenceError::InvalidInput(format!(
                        "circle radius must be a non-negative number of meters, got {}",
                        meters
                    )));
                }
                Ok(())
            }
            FenceArea::Bounds {
                min_lat,
                min_lon,
                max_lat,
                max_lon,
            } => bounding_box(*min_lon, *min_lat, *max_lon, *max_lat).map(|_| ()),
            FenceArea::Shape { .. } => Ok(()),
        }
    }
}

/// Roam settings: track proximity of the fence's targets to the members of
/// another collection instead of testing a static area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoamSpec {
    #[serde(default = "RoamSpec::default_enabled")]
    pub enabled: bool,
    /// Collection searched for nearby objects.
    pub key: String,
    /// Literal id or glob selecting which members count.
    pub id: String,
    pub meters: f64,
    /// Report each nearby object only when it first appears.
    #[serde(default)]
    pub no_dwell: bool,
    /// Glob suffix appended to a match id to bundle its escorts into the message.
    #[serde(default)]
    pub scan: Option<String>,
}

impl RoamSpec {
    const fn default_enabled() -> bool {
        true
    }

    pub fn new(key: impl Into<String>, id: impl Into<String>, meters: f64) -> Self {
        Self {
            enabled: true,
            key: key.into(),
            id: id.into(),
            meters,
            no_dwell: false,
            scan: None,
        }
    }

    pub fn with_no_dwell(mut self) -> Self {
        self.no_dwell = true;
        self
    }

    pub fn with_scan(mut self, suffix: impl Into<String>) -> Self {
        self.scan = Some(suffix.into());
        self
    }
}

/// Inclusive numeric range over one object field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhereFilter {
    pub field: String,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl WhereFilter {
    pub fn matches(&self, fields: &Fields) -> bool {
        let value = fields.get(&self.field);
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

/// Static configuration of one live fence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FenceSpec {
    /// Collection the fence watches.
    pub key: String,

    #[serde(default)]
    pub query: QueryKind,

    /// Geometry tested by the predicate. Optional only for roaming fences.
    #[serde(default)]
    pub area: Option<FenceArea>,

    /// Glob restricting the ids the fence reacts to.
    #[serde(default = "FenceSpec::default_id_pattern")]
    pub id_pattern: String,

    /// Detect states to report (None means all).
    #[serde(default)]
    pub detect: Option<DetectSet>,

    /// Accepted message commands (None means no filtering).
    #[serde(default)]
    pub commands: Option<BTreeSet<String>>,

    #[serde(default)]
    pub roam: Option<RoamSpec>,

    #[serde(default, rename = "where")]
    pub where_filters: Vec<WhereFilter>,

    /// Include the distance to the fence centre in rendered objects.
    #[serde(default)]
    pub distance: bool,
}

impl FenceSpec {
    fn default_id_pattern() -> String {
        "*".to_string()
    }

    fn with_area(key: impl Into<String>, query: QueryKind, area: FenceArea) -> Self {
        Self {
            key: key.into(),
            query,
            area: Some(area),
            id_pattern: Self::default_id_pattern(),
            detect: None,
            commands: None,
            roam: None,
            where_filters: Vec::new(),
            distance: false,
        }
    }

    /// Fence over everything within `meters` of `(lat, lon)`.
    pub fn nearby(key: impl Into<String>, lat: f64, lon: f64, meters: f64) -> Self {
        Self::with_area(key, QueryKind::Nearby, FenceArea::Circle { lat, lon, meters })
    }

    pub fn within_bounds(
        key: impl Into<String>,
        min_lat: f64,
        min_lon: f64,
        max_lat: f64,
        max_lon: f64,
    ) -> Self {
        Self::with_area(
            key,
            QueryKind::Within,
            FenceArea::Bounds {
                min_lat,
                min_lon,
                max_lat,
                max_lon,
            },
        )
    }

    pub fn intersects_bounds(
        key: impl Into<String>,
        min_lat: f64,
        min_lon: f64,
        max_lat: f64,
        max_lon: f64,
    ) -> Self {
        Self::with_area(
            key,
            QueryKind::Intersects,
            FenceArea::Bounds {
                min_lat,
                min_lon,
                max_lat,
                max_lon,
            },
        )
    }

    pub fn within_shape(key: impl Into<String>, geometry: impl Into<Geometry<f64>>) -> Self {
        Self::with_area(
            key,
            QueryKind::Within,
            FenceArea::Shape {
                geometry: geometry.into(),
            },
        )
    }

    pub fn intersects_shape(key: impl Into<String>, geometry: impl Into<Geometry<f64>>) -> Self {
        Self::with_area(
            key,
            QueryKind::Intersects,
            FenceArea::Shape {
                geometry: geometry.into(),
            },
        )
    }

    /// Roaming fence: targets in `key` are tracked against members of `roam.key`.
    pub fn roaming(key: impl Into<String>, roam: RoamSpec) -> Self {
        Self {
            key: key.into(),
            query: QueryKind::Nearby,
            area: None,
            id_pattern: Self::default_id_pattern(),
            detect: None,
            commands: None,
            roam: Some(roam),
            where_filters: Vec::new(),
            distance: false,
        }
    }

    pub fn with_id_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.id_pattern = pattern.into();
        self
    }

    pub fn with_detect(mut self, detect: DetectSet) -> Self {
        self.detect = Some(detect);
        self
    }

    pub fn with_commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands = Some(commands.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_where(mut self, field: impl Into<String>, min: f64, max: f64) -> Self {
        self.where_filters.push(WhereFilter {
            field: field.into(),
            min: Some(min),
            max: Some(max),
        });
        self
    }

    pub fn with_distance(mut self) -> Self {
        self.distance = true;
        self
    }

    /// Whether roam tracking replaces static-area evaluation.
    pub fn is_roaming(&self) -> bool {
        self.roam.as_ref().is_some_and(|roam| roam.enabled)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.key.is_empty() {
            return Err(FenceError::InvalidInput("fence key cannot be empty".into()));
        }

        Pattern::try_parse(&self.id_pattern)?;

        if let Some(area) = &self.area {
            area.validate()?;
        }

        match (&self.query, &self.area) {
            (QueryKind::Nearby, Some(FenceArea::Circle { .. })) => {}
            (QueryKind::Nearby, None) if self.is_roaming() => {}
            (QueryKind::Nearby, _) => {
                return Err(FenceError::InvalidInput(
                    "nearby fences need a circle area".into(),
                ));
            }
            (_, Some(FenceArea::Bounds { .. }) | Some(FenceArea::Shape { .. })) => {}
            (query, _) => {
                return Err(FenceError::InvalidInput(format!(
                    "{} fences need a bounds or shape area",
                    query.as_str()
                )));
            }
        }

        if let Some(roam) = &self.roam {
            if self.query != QueryKind::Nearby {
                return Err(FenceError::InvalidInput(
                    "roam is only supported on nearby fences".into(),
                ));
            }
            if roam.key.is_empty() {
                return Err(FenceError::InvalidInput("roam key cannot be empty".into()));
            }
            if !roam.meters.is_finite() || roam.meters <= 0.0 {
                return Err(FenceError::InvalidInput(format!(
                    "roam radius must be positive, got {}",
                    roam.meters
                )));
            }
            Pattern::try_parse(&roam.id)?;
            if let Some(scan) = &roam.scan {
                Pattern::try_parse(&format!("x{}", scan))?;
            }
        }

        for filter in &self.where_filters {
            if let (Some(min), Some(max)) = (filter.min, filter.max)
                && min > max
            {
                return Err(FenceError::InvalidInput(format!(
                    "where filter on '{}' has min ({}) > max ({})",
                    filter.field, min, max
                )));
            }
        }

        Ok(())
    }

    /// Load configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let spec: FenceSpec = serde_json::from_str(json)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Save configuration as JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load configuration from TOML string (requires toml feature)
    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let spec: FenceSpec =
            toml::from_str(toml_str).map_err(|e| FenceError::Toml(e.to_string()))?;
        spec.validate()?;
        Ok(spec)
    }

    /// Save configuration as TOML string (requires toml feature)
    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| FenceError::Toml(e.to_string()))
    }

    /// Load a spec from a file, picking the format from its extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            #[cfg(feature = "toml")]
            Some("toml") => Self::from_toml(&text),
            Some("json") | None => Self::from_json(&text),
            Some(other) => Err(FenceError::InvalidInput(format!(
                "unsupported fence config extension '{}'",
                other
            ))),
        }
    }
}

/// Serde adapter storing a `geo` geometry as GeoJSON.
mod geojson_geometry {
    use geo::Geometry;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        geometry: &Geometry<f64>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        geojson::Geometry::new(geojson::Value::from(geometry)).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Geometry<f64>, D::Error> {
        let geometry = geojson::Geometry::deserialize(deserializer)?;
        Geometry::<f64>::try_from(geometry).map_err(D::Error::custom)
    }
}
