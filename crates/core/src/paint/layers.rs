//! Declarative renderer source and layer descriptions.

use serde::Serialize;
use serde_json::{json, Map, Value};

use super::{DrawLayer, PaintProperty, POINT_RADIUS};
use crate::geometry::Bounds;
use crate::style::StyleKey;
use crate::vector::{GeometryType, USER_PREFIX};

/// Source ids of the drawing toolkit's two render sources.
pub const HOT_SOURCE: &str = "mapbox-gl-draw-hot";
pub const COLD_SOURCE: &str = "mapbox-gl-draw-cold";

/// Renderer layer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Circle,
    Line,
    Fill,
    Raster,
}

/// A renderer data source.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceSpec {
    /// Georeferenced image draped over four corners
    /// (top-left, top-right, bottom-right, bottom-left).
    Image {
        url: String,
        coordinates: [[f64; 2]; 4],
    },
    GeoJson {
        data: Value,
    },
}

impl SourceSpec {
    pub fn image(url: impl Into<String>, bounds: &Bounds) -> Self {
        Self::Image {
            url: url.into(),
            coordinates: bounds.image_corners(),
        }
    }
}

/// A renderer style layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: LayerKind,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub layout: Map<String, Value>,
    pub paint: Map<String, Value>,
}

impl LayerSpec {
    /// Raster layer over an image source.
    pub fn raster(id: impl Into<String>, source: impl Into<String>, opacity: f64) -> Self {
        let mut paint = Map::new();
        paint.insert("raster-opacity".into(), json!(opacity));
        Self {
            id: id.into(),
            kind: LayerKind::Raster,
            source: source.into(),
            filter: None,
            layout: Map::new(),
            paint,
        }
    }

    /// Static layer for an imported reference collection, styled from each
    /// feature's own properties.
    pub fn reference(
        id: impl Into<String>,
        source: impl Into<String>,
        geometry: GeometryType,
    ) -> Self {
        let (kind, paint) = match geometry {
            GeometryType::Polygon => (
                LayerKind::Fill,
                json!({
                    "fill-color": ["coalesce", ["get", "fillColor"], "#3bb2d0"],
                    "fill-opacity": ["coalesce", ["get", "fillOpacity"], 0.3],
                }),
            ),
            GeometryType::LineString => (
                LayerKind::Line,
                json!({
                    "line-color": ["coalesce", ["get", "strokeColor"], "#3bb2d0"],
                    "line-width": ["coalesce", ["get", "strokeWidth"], 2],
                }),
            ),
            GeometryType::Point => (
                LayerKind::Circle,
                json!({
                    "circle-color": ["coalesce", ["get", "fillColor"], "#3bb2d0"],
                    "circle-radius": POINT_RADIUS,
                }),
            ),
        };
        Self {
            id: id.into(),
            kind,
            source: source.into(),
            filter: Some(json!(["==", "$type", geometry_name(geometry)])),
            layout: Map::new(),
            paint: into_map(paint),
        }
    }
}

fn geometry_name(geometry: GeometryType) -> &'static str {
    match geometry {
        GeometryType::Point => "Point",
        GeometryType::LineString => "LineString",
        GeometryType::Polygon => "Polygon",
    }
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn user_get(key: StyleKey) -> Value {
    json!(["get", format!("{USER_PREFIX}{}", key.as_str())])
}

impl DrawLayer {
    /// Layer declaration as installed next to the toolkit's own layers.
    ///
    /// Data-driven paint starts out reading the toolkit's `user_` copies of
    /// the style keys; paint compilation replaces it afterwards.
    pub fn spec(&self) -> LayerSpec {
        let active = matches!(
            self,
            Self::HighlightActivePoints
                | Self::LineActive
                | Self::PolygonFillActive
                | Self::PolygonStrokeActive
        );
        let active_flag = if active { "true" } else { "false" };

        let filter = match self.geometry() {
            Some(GeometryType::Point) => json!([
                "all",
                ["==", "$type", "Point"],
                ["==", "meta", "feature"],
                ["==", "active", active_flag]
            ]),
            Some(geometry) => json!([
                "all",
                ["==", "active", active_flag],
                ["==", "$type", geometry_name(geometry)],
                ["!=", "mode", "static"]
            ]),
            None => json!(["all", ["==", "meta", "vertex"], ["==", "$type", "Point"]]),
        };

        let mut paint = Map::new();
        for property in self.properties() {
            let value = match property.style_key() {
                Some(key) => user_get(key),
                None => json!(POINT_RADIUS),
            };
            paint.insert(property.name().to_string(), value);
        }
        if self.geometry().is_none() {
            paint.insert("circle-radius".into(), json!(POINT_RADIUS));
            paint.insert("circle-color".into(), json!("#1a1a2e"));
        }

        let mut layout = Map::new();
        if self.kind() == LayerKind::Line {
            layout.insert("line-cap".into(), json!("round"));
            layout.insert("line-join".into(), json!("round"));
        }

        LayerSpec {
            id: self.id().to_string(),
            kind: self.kind(),
            source: self.source().to_string(),
            filter: Some(filter),
            layout,
            paint,
        }
    }

    pub fn kind(&self) -> LayerKind {
        match self.properties().first() {
            Some(PaintProperty::LineColor | PaintProperty::LineWidth) => LayerKind::Line,
            Some(PaintProperty::FillColor | PaintProperty::FillOpacity) => LayerKind::Fill,
            _ => LayerKind::Circle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_source_uses_corner_order() {
        let source = SourceSpec::image("https://x/a.png", &Bounds::new(10.0, -10.0, 0.0, 10.0));
        assert_eq!(
            serde_json::to_value(&source).unwrap(),
            json!({
                "type": "image",
                "url": "https://x/a.png",
                "coordinates": [[-10.0, 10.0], [10.0, 10.0], [10.0, 0.0], [-10.0, 0.0]],
            })
        );
    }

    #[test]
    fn line_layers_round_their_caps() {
        let spec = DrawLayer::LineInactive.spec();
        assert_eq!(spec.kind, LayerKind::Line);
        assert_eq!(spec.source, COLD_SOURCE);
        assert_eq!(spec.layout["line-cap"], json!("round"));
        assert_eq!(spec.paint["line-width"], json!(["get", "user_strokeWidth"]));
    }

    #[test]
    fn vertex_halo_has_static_paint() {
        let spec = DrawLayer::VertexHaloActive.spec();
        assert_eq!(spec.kind, LayerKind::Circle);
        assert_eq!(spec.source, HOT_SOURCE);
        assert_eq!(spec.paint["circle-color"], json!("#1a1a2e"));
        assert_eq!(spec.paint["circle-radius"], json!(7.0));
    }

    #[test]
    fn raster_layer_carries_opacity() {
        let spec = LayerSpec::raster("uploaded-image-layer-1", "uploaded-image-source-1", 0.85);
        assert_eq!(
            serde_json::to_value(&spec).unwrap(),
            json!({
                "id": "uploaded-image-layer-1",
                "type": "raster",
                "source": "uploaded-image-source-1",
                "paint": {"raster-opacity": 0.85},
            })
        );
    }
}
