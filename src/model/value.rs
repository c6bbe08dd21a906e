//! Attribute value type covering everything a generated graph can carry.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A (lat, lon) pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.lat, self.lon)
    }
}

/// Value assigned to one attribute of a generated entity.
///
/// Covers the scalar kinds constraints can produce:
/// - `Text`: opaque strings and tokens
/// - `Float`: numeric bounds (LESS_THAN and friends)
/// - `Timestamp`: temporal attributes moved around by day offsets
/// - `Geo`: geodesic attributes, rendered as GeoJSON points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum AttrValue {
    Text(String),
    Float(f64),
    Timestamp(DateTime<Utc>),
    Geo(GeoPoint),
}

impl AttrValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            AttrValue::Text(_) => "TEXT",
            AttrValue::Float(_) => "FLOAT",
            AttrValue::Timestamp(_) => "TIMESTAMP",
            AttrValue::Geo(_) => "GEO",
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, AttrValue::Text(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view: floats directly, text parsed if it holds a number.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            AttrValue::Float(f) => Some(*f),
            AttrValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            AttrValue::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_geo(&self) -> Option<GeoPoint> {
        match self {
            AttrValue::Geo(p) => Some(*p),
            _ => None,
        }
    }

    /// Accumulate a second constraint result into this value.
    ///
    /// Multiple constraints on the same attribute collapse into one value:
    /// texts concatenate, numbers add. Mismatched kinds keep the first value.
    pub fn combine(self, other: AttrValue) -> AttrValue {
        match (self, other) {
            (AttrValue::Text(a), AttrValue::Text(b)) => AttrValue::Text(a + &b),
            (AttrValue::Float(a), AttrValue::Float(b)) => AttrValue::Float(a + b),
            (first, other) => {
                tracing::debug!(
                    kept = first.type_name(),
                    dropped = other.type_name(),
                    "cannot combine mismatched attribute kinds; keeping first"
                );
                first
            }
        }
    }

    /// Stable string form used as the dedup key at projection time.
    ///
    /// Geo pairs normalize to a tuple-like form so list-valued attributes
    /// hash the same way every time.
    pub fn canonical_key(&self) -> String {
        match self {
            AttrValue::Text(s) => s.clone(),
            AttrValue::Float(f) => format!("{f}"),
            AttrValue::Timestamp(t) => t.to_rfc3339_opts(SecondsFormat::Secs, true),
            AttrValue::Geo(p) => format!("({},{})", p.lat, p.lon),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Text(v.to_owned())
    }
}
impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Text(v)
    }
}
impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}
impl From<DateTime<Utc>> for AttrValue {
    fn from(v: DateTime<Utc>) -> Self {
        AttrValue::Timestamp(v)
    }
}
impl From<GeoPoint> for AttrValue {
    fn from(v: GeoPoint) -> Self {
        AttrValue::Geo(v)
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Text(s) => write!(f, "{s}"),
            AttrValue::Float(v) => write!(f, "{v}"),
            AttrValue::Timestamp(t) => {
                write!(f, "{}", t.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            AttrValue::Geo(p) => write!(f, "{p}"),
        }
    }
}
