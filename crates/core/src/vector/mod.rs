//! Vector features as managed by the drawing toolkit.

mod geojson;
mod properties;

pub use geojson::{export_geojson, geojson_value, import_geojson, ImportedGeoJson};
pub use properties::{is_reserved, strip_internal_prefix, CustomProperties, RESERVED_KEYS, USER_PREFIX};

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::geometry::Bounds;
use crate::style::FeatureStyle;

/// A feature id as assigned by the drawing toolkit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(String);

impl FeatureId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FeatureId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for FeatureId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Renderer-level geometry class, the value a layer filter sees as `$type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryType {
    Point,
    LineString,
    Polygon,
}

/// A `[x, y]` or `[x, y, z]` position.
pub type Position = Vec<f64>;

/// RFC 7946 geometry object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    MultiPoint { coordinates: Vec<Position> },
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    GeometryCollection { geometries: Vec<Geometry> },
}

impl Geometry {
    /// The renderer geometry class; multi-geometries report their member
    /// class. Collections have none.
    pub fn geometry_type(&self) -> Option<GeometryType> {
        match self {
            Self::Point { .. } | Self::MultiPoint { .. } => Some(GeometryType::Point),
            Self::LineString { .. } | Self::MultiLineString { .. } => {
                Some(GeometryType::LineString)
            }
            Self::Polygon { .. } | Self::MultiPolygon { .. } => Some(GeometryType::Polygon),
            Self::GeometryCollection { .. } => None,
        }
    }

    /// Visit every position.
    pub fn for_each_position<'a>(&'a self, f: &mut impl FnMut(&'a [f64])) {
        match self {
            Self::Point { coordinates } => f(coordinates.as_slice()),
            Self::MultiPoint { coordinates } | Self::LineString { coordinates } => {
                coordinates.iter().for_each(|p| f(p.as_slice()))
            }
            Self::MultiLineString { coordinates } | Self::Polygon { coordinates } => coordinates
                .iter()
                .flatten()
                .for_each(|p| f(p.as_slice())),
            Self::MultiPolygon { coordinates } => coordinates
                .iter()
                .flatten()
                .flatten()
                .for_each(|p| f(p.as_slice())),
            Self::GeometryCollection { geometries } => {
                geometries.iter().for_each(|g| g.for_each_position(f))
            }
        }
    }

    /// Rewrite every position in place.
    pub fn map_positions(&mut self, f: &mut impl FnMut(&mut Position)) {
        match self {
            Self::Point { coordinates } => f(coordinates),
            Self::MultiPoint { coordinates } | Self::LineString { coordinates } => {
                coordinates.iter_mut().for_each(|p| f(p))
            }
            Self::MultiLineString { coordinates } | Self::Polygon { coordinates } => coordinates
                .iter_mut()
                .flatten()
                .for_each(|p| f(p)),
            Self::MultiPolygon { coordinates } => coordinates
                .iter_mut()
                .flatten()
                .flatten()
                .for_each(|p| f(p)),
            Self::GeometryCollection { geometries } => {
                geometries.iter_mut().for_each(|g| g.map_positions(f))
            }
        }
    }

    pub fn bounds(&self) -> Option<Bounds> {
        let mut positions = Vec::new();
        self.for_each_position(&mut |p| positions.push(p));
        Bounds::enclosing(positions)
    }
}

/// A drawn or imported feature.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorFeature {
    pub id: FeatureId,
    pub geometry: Geometry,
    /// Attribute map: style keys plus arbitrary user metadata.
    pub properties: Map<String, Value>,
}

impl VectorFeature {
    pub fn new(id: impl Into<FeatureId>, geometry: Geometry) -> Self {
        Self {
            id: id.into(),
            geometry,
            properties: Map::new(),
        }
    }

    pub fn with_properties(mut self, properties: Map<String, Value>) -> Self {
        self.properties = properties;
        self
    }

    pub fn geometry_type(&self) -> Option<GeometryType> {
        self.geometry.geometry_type()
    }

    /// Style attributes currently present in the property bag.
    pub fn style(&self) -> FeatureStyle {
        FeatureStyle::from_properties(&self.properties)
    }

    /// User metadata, i.e. every non-reserved property rendered as text.
    pub fn custom_properties(&self) -> CustomProperties {
        CustomProperties::from_properties(&self.properties)
    }

    /// Replace the user metadata, leaving reserved keys untouched.
    pub fn set_custom_properties(&mut self, custom: &CustomProperties) {
        custom.write_to(&mut self.properties);
    }
}

/// Ordered set of features, unique by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    features: Vec<VectorFeature>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a feature, replacing any existing one with the same id in place.
    pub fn upsert(&mut self, feature: VectorFeature) {
        match self.features.iter_mut().find(|f| f.id == feature.id) {
            Some(slot) => *slot = feature,
            None => self.features.push(feature),
        }
    }

    /// Replace an existing feature by id. Returns `false` when absent.
    pub fn replace(&mut self, feature: VectorFeature) -> bool {
        match self.features.iter_mut().find(|f| f.id == feature.id) {
            Some(slot) => {
                *slot = feature;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &FeatureId) -> Option<VectorFeature> {
        let idx = self.features.iter().position(|f| &f.id == id)?;
        Some(self.features.remove(idx))
    }

    pub fn get(&self, id: &FeatureId) -> Option<&VectorFeature> {
        self.features.iter().find(|f| &f.id == id)
    }

    pub fn get_mut(&mut self, id: &FeatureId) -> Option<&mut VectorFeature> {
        self.features.iter_mut().find(|f| &f.id == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VectorFeature> {
        self.features.iter()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Bounds of every feature, or `None` for an empty collection.
    pub fn bounds(&self) -> Option<Bounds> {
        self.features
            .iter()
            .filter_map(|f| f.geometry.bounds())
            .reduce(|a, b| a.union(&b))
    }
}

impl FromIterator<VectorFeature> for FeatureCollection {
    fn from_iter<T: IntoIterator<Item = VectorFeature>>(iter: T) -> Self {
        let mut collection = Self::new();
        for feature in iter {
            collection.upsert(feature);
        }
        collection
    }
}

impl IntoIterator for FeatureCollection {
    type Item = VectorFeature;
    type IntoIter = std::vec::IntoIter<VectorFeature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

impl<'a> IntoIterator for &'a FeatureCollection {
    type Item = &'a VectorFeature;
    type IntoIter = std::slice::Iter<'a, VectorFeature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}
