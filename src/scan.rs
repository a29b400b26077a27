//! Object rendering.
//!
//! A [`ScanWriter`] turns stored objects into JSON records in one of several
//! output modes. Records are written as elements of a streamed array, so every
//! record after the first carries a leading `,` separator; callers that want a
//! standalone record strip it.
//!
//! The writer owns a lock held only while one record is serialized.

use crate::spatial::round_meters;
use parking_lot::Mutex;
use serde_json::Value;
use spatio_types::{Fields, Object};

/// How matched objects are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// `{"id":..,"object":<geojson>,"fields":{..}}`
    #[default]
    Objects,
    /// A bare JSON string id.
    Ids,
    /// `{"id":..,"point":{"lat":..,"lon":..}}`
    Points,
    /// `{"id":..,"bounds":{"sw":{..},"ne":{..}}}`
    Bounds,
    /// `{"id":..,"hash":".."}` at the given geohash precision.
    Hashes(usize),
}

/// Input for rendering one object.
#[derive(Debug, Clone, Copy)]
pub struct RenderParams<'a> {
    pub id: &'a str,
    pub object: &'a Object,
    pub fields: &'a Fields,
    /// Distance to the fence centre, when requested.
    pub distance: Option<f64>,
}

#[derive(Debug, Default)]
struct ScanBuffer {
    buf: String,
    records: u64,
}

#[derive(Debug, Default)]
pub struct ScanWriter {
    output: OutputMode,
    no_fields: bool,
    state: Mutex<ScanBuffer>,
}

impl ScanWriter {
    pub fn new(output: OutputMode) -> Self {
        Self {
            output,
            no_fields: false,
            state: Mutex::new(ScanBuffer::default()),
        }
    }

    /// Omit fields from rendered records.
    pub fn without_fields(mut self) -> Self {
        self.no_fields = true;
        self
    }

    pub fn output(&self) -> OutputMode {
        self.output
    }

    pub fn no_fields(&self) -> bool {
        self.no_fields
    }

    /// Records rendered so far.
    pub fn records_written(&self) -> u64 {
        self.state.lock().records
    }

    /// Render one record, preceded by `,` unless it is the first one written.
    ///
    /// Returns `None` when the object cannot be rendered in this output mode.
    pub fn render_object(&self, params: &RenderParams<'_>) -> Option<String> {
        let record = self.record(params)?;
        let mut state = self.state.lock();
        if state.records > 0 {
            state.buf.push(',');
        }
        state.buf.push_str(&record);
        state.records += 1;
        Some(std::mem::take(&mut state.buf))
    }

    fn record(&self, params: &RenderParams<'_>) -> Option<String> {
        let mut out = String::with_capacity(64);
        let body = match self.output {
            OutputMode::Ids => {
                push_json_str(&mut out, params.id);
                return Some(out);
            }
            OutputMode::Objects => format!(",\"object\":{}", object_json(params.object)),
            OutputMode::Points => {
                let point = params.object.representative_point()?;
                let mut body = String::from(",\"point\":");
                push_lat_lon(&mut body, point.y(), point.x());
                body
            }
            OutputMode::Bounds => {
                let rect = params.object.bounds()?;
                let mut body = String::from(",\"bounds\":{\"sw\":");
                push_lat_lon(&mut body, rect.min().y, rect.min().x);
                body.push_str(",\"ne\":");
                push_lat_lon(&mut body, rect.max().y, rect.max().x);
                body.push('}');
                body
            }
            OutputMode::Hashes(precision) => {
                let point = params.object.representative_point()?;
                let hash = geohash::encode(point.0, precision).ok()?;
                let mut body = String::from(",\"hash\":");
                push_json_str(&mut body, &hash);
                body
            }
        };

        out.push_str("{\"id\":");
        push_json_str(&mut out, params.id);
        out.push_str(&body);
        if !self.no_fields && !params.fields.is_empty() {
            out.push_str(",\"fields\":{");
            for (i, (name, value)) in params.fields.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                push_json_str(&mut out, name);
                out.push(':');
                push_json_num(&mut out, value);
            }
            out.push('}');
        }
        if let Some(distance) = params.distance {
            out.push_str(",\"distance\":");
            push_json_num(&mut out, round_meters(distance));
        }
        out.push('}');
        Some(out)
    }
}

/// JSON text of an object: GeoJSON for geometries, a JSON string otherwise.
pub fn object_json(object: &Object) -> String {
    match object {
        Object::Geometry(geometry) => {
            let geojson = geojson::Geometry::new(geojson::Value::from(geometry));
            serde_json::to_string(&geojson).unwrap_or_else(|_| "null".to_string())
        }
        Object::String(text) => Value::from(text.as_str()).to_string(),
    }
}

pub(crate) fn push_json_str(out: &mut String, text: &str) {
    out.push_str(&Value::from(text).to_string());
}

/// Non-finite numbers have no JSON form and render as `null`.
pub(crate) fn push_json_num(out: &mut String, value: f64) {
    match serde_json::Number::from_f64(value) {
        Some(number) => out.push_str(&number.to_string()),
        None => out.push_str("null"),
    }
}

fn push_lat_lon(out: &mut String, lat: f64, lon: f64) {
    out.push_str("{\"lat\":");
    push_json_num(out, lat);
    out.push_str(",\"lon\":");
    push_json_num(out, lon);
    out.push('}');
}
