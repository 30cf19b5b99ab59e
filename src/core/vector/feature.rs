//! Polygon features with attribute tables.

use std::collections::HashMap;

use geo::Intersects;
use geo_types::{Geometry, MultiPolygon};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    /// Numeric view of the value; `None` for Null, Bool and String.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(v) => Some(*v as f64),
            AttributeValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }
}

impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeValue::Null => write!(f, "null"),
            AttributeValue::Bool(v) => write!(f, "{v}"),
            AttributeValue::Int(v) => write!(f, "{v}"),
            AttributeValue::Float(v) => write!(f, "{v}"),
            AttributeValue::String(v) => write!(f, "{v}"),
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone)]
pub struct Feature {
    pub geometry: Option<Geometry<f64>>,
    pub properties: HashMap<String, AttributeValue>,
    pub id: Option<String>,
}

impl Feature {
    pub fn new(geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            geometry: Some(geometry.into()),
            properties: HashMap::new(),
            id: None,
        }
    }

    /// Builder-style attribute setter
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.set_property(key, value.into());
        self
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }

    /// Numeric attribute `key` of the feature at position `index` in its layer.
    ///
    /// `Ok(None)` for a Null value; errors when the attribute is absent or not a number.
    pub fn numeric_property(&self, index: usize, key: &str) -> Result<Option<f64>> {
        match self.properties.get(key) {
            None => Err(Error::MissingAttribute {
                feature: index,
                key: key.to_string(),
            }),
            Some(AttributeValue::Null) => Ok(None),
            Some(value) => value.as_f64().map(Some).ok_or_else(|| Error::NonNumericAttribute {
                feature: index,
                key: key.to_string(),
                value: value.to_string(),
            }),
        }
    }

    /// The polygonal part of the geometry as a MultiPolygon.
    ///
    /// Polygons, MultiPolygons, Rects and Triangles qualify; a GeometryCollection
    /// qualifies when every member does. Anything else, or a missing geometry,
    /// is [`Error::NonPolygonal`].
    pub fn polygons(&self, index: usize) -> Result<MultiPolygon<f64>> {
        self.geometry
            .as_ref()
            .and_then(polygonal)
            .ok_or(Error::NonPolygonal { feature: index })
    }

    pub fn intersects(&self, other: &Feature) -> bool {
        match (&self.geometry, &other.geometry) {
            (Some(a), Some(b)) => a.intersects(b),
            _ => false,
        }
    }
}

fn polygonal(geometry: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p.clone()])),
        Geometry::MultiPolygon(mp) => Some(mp.clone()),
        Geometry::Rect(r) => Some(MultiPolygon::new(vec![r.to_polygon()])),
        Geometry::Triangle(t) => Some(MultiPolygon::new(vec![t.to_polygon()])),
        Geometry::GeometryCollection(gc) => {
            let mut parts = Vec::new();
            for member in gc.iter() {
                parts.extend(polygonal(member)?.0);
            }
            Some(MultiPolygon::new(parts))
        }
        _ => None,
    }
}

/// Collection of features
#[derive(Debug, Clone, Default)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self { features: Vec::new() }
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    /// Sum of numeric attribute `key` over every feature, skipping Nulls.
    pub fn sum(&self, key: &str) -> Result<f64> {
        let mut total = 0.0;
        for (i, feature) in self.features.iter().enumerate() {
            if let Some(v) = feature.numeric_property(i, key)? {
                total += v;
            }
        }
        Ok(total)
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self {
            features: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}
