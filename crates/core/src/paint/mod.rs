//! Paint compilation.
//!
//! [`project`] turns the live feature set plus the current style selection
//! into one data-driven expression per (draw layer, paint property). It is a
//! pure function: identical inputs produce identical plans, and nothing here
//! touches a renderer.

mod expression;
mod layers;

pub use expression::Expression;
pub use layers::{LayerKind, LayerSpec, SourceSpec, COLD_SOURCE, HOT_SOURCE};

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::style::{StyleKey, StyleState};
use crate::vector::{FeatureId, GeometryType, VectorFeature, USER_PREFIX};

/// Constant point radius in pixels.
pub const POINT_RADIUS: f64 = 7.0;

/// Custom layers installed alongside the drawing toolkit's own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawLayer {
    HighlightActivePoints,
    PointsAreBlue,
    LineInactive,
    LineActive,
    PolygonFillInactive,
    PolygonFillActive,
    PolygonStrokeInactive,
    PolygonStrokeActive,
    VertexHaloActive,
}

impl DrawLayer {
    pub const ALL: [DrawLayer; 9] = [
        Self::HighlightActivePoints,
        Self::PointsAreBlue,
        Self::LineInactive,
        Self::LineActive,
        Self::VertexHaloActive,
        Self::PolygonFillInactive,
        Self::PolygonFillActive,
        Self::PolygonStrokeActive,
        Self::PolygonStrokeInactive,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Self::HighlightActivePoints => "highlight-active-points",
            Self::PointsAreBlue => "points-are-blue",
            Self::LineInactive => "gl-draw-line-inactive",
            Self::LineActive => "gl-draw-line-active",
            Self::PolygonFillInactive => "gl-draw-polygon-fill-inactive",
            Self::PolygonFillActive => "gl-draw-polygon-fill-active",
            Self::PolygonStrokeInactive => "gl-draw-polygon-stroke-inactive",
            Self::PolygonStrokeActive => "gl-draw-polygon-stroke-active",
            Self::VertexHaloActive => "gl-draw-polygon-and-line-vertex-halo-active",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.id() == id)
    }

    pub fn source(&self) -> &'static str {
        match self {
            Self::PointsAreBlue
            | Self::LineInactive
            | Self::PolygonFillInactive
            | Self::PolygonStrokeInactive => COLD_SOURCE,
            _ => HOT_SOURCE,
        }
    }

    /// Feature class this layer draws; `None` for the vertex halo.
    pub fn geometry(&self) -> Option<GeometryType> {
        match self {
            Self::HighlightActivePoints | Self::PointsAreBlue => Some(GeometryType::Point),
            Self::LineInactive | Self::LineActive => Some(GeometryType::LineString),
            Self::PolygonFillInactive
            | Self::PolygonFillActive
            | Self::PolygonStrokeInactive
            | Self::PolygonStrokeActive => Some(GeometryType::Polygon),
            Self::VertexHaloActive => None,
        }
    }

    /// Data-driven paint properties recompiled on every change.
    pub fn properties(&self) -> &'static [PaintProperty] {
        match self {
            Self::HighlightActivePoints | Self::PointsAreBlue => {
                &[PaintProperty::CircleColor, PaintProperty::CircleRadius]
            }
            Self::LineInactive
            | Self::LineActive
            | Self::PolygonStrokeInactive
            | Self::PolygonStrokeActive => &[PaintProperty::LineColor, PaintProperty::LineWidth],
            Self::PolygonFillInactive | Self::PolygonFillActive => {
                &[PaintProperty::FillColor, PaintProperty::FillOpacity]
            }
            Self::VertexHaloActive => &[],
        }
    }
}

/// A renderer paint property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaintProperty {
    CircleColor,
    CircleRadius,
    LineColor,
    LineWidth,
    FillColor,
    FillOpacity,
}

impl PaintProperty {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CircleColor => "circle-color",
            Self::CircleRadius => "circle-radius",
            Self::LineColor => "line-color",
            Self::LineWidth => "line-width",
            Self::FillColor => "fill-color",
            Self::FillOpacity => "fill-opacity",
        }
    }

    /// Style attribute feeding this property; `None` when it is constant.
    pub fn style_key(&self) -> Option<StyleKey> {
        match self {
            Self::CircleColor | Self::FillColor => Some(StyleKey::FillColor),
            Self::LineColor => Some(StyleKey::StrokeColor),
            Self::LineWidth => Some(StyleKey::StrokeWidth),
            Self::FillOpacity => Some(StyleKey::FillOpacity),
            Self::CircleRadius => None,
        }
    }
}

/// One `setPaintProperty` call.
#[derive(Debug, Clone, PartialEq)]
pub struct PaintWrite {
    pub layer: DrawLayer,
    pub property: PaintProperty,
    pub expression: Expression,
}

/// Every paint write for one compilation, grouped by layer in
/// [`DrawLayer::ALL`] order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaintPlan {
    writes: Vec<PaintWrite>,
}

impl PaintPlan {
    pub fn writes(&self) -> &[PaintWrite] {
        &self.writes
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Layers that receive at least one write.
    pub fn layers(&self) -> Vec<DrawLayer> {
        let mut out: Vec<DrawLayer> = Vec::new();
        for w in &self.writes {
            if out.last() != Some(&w.layer) {
                out.push(w.layer);
            }
        }
        out
    }

    pub fn for_layer(&self, layer: DrawLayer) -> impl Iterator<Item = &PaintWrite> {
        self.writes.iter().filter(move |w| w.layer == layer)
    }

    pub fn get(&self, layer: DrawLayer, property: PaintProperty) -> Option<&Expression> {
        self.writes
            .iter()
            .find(|w| w.layer == layer && w.property == property)
            .map(|w| &w.expression)
    }

    /// Value the renderer would compute for `feature` on `layer`.
    ///
    /// The feature is presented the way the drawing toolkit exposes it to
    /// its render sources: `id` plus every property under a `user_` key.
    pub fn evaluate(
        &self,
        layer: DrawLayer,
        property: PaintProperty,
        feature: &VectorFeature,
    ) -> Option<Value> {
        let expr = self.get(layer, property)?;
        expr.evaluate(&render_properties(feature))
    }
}

/// The property bag a drawing-toolkit render feature carries.
pub fn render_properties(feature: &VectorFeature) -> Map<String, Value> {
    let mut props = Map::new();
    props.insert("id".into(), Value::String(feature.id.as_str().to_string()));
    for (k, v) in &feature.properties {
        props.insert(format!("{USER_PREFIX}{k}"), v.clone());
    }
    props
}

/// Compile paint expressions for every draw layer.
///
/// For each data-driven property the expression is a `match` on the feature
/// id listing every feature of the layer's geometry class, each mapped to its
/// own stored style value (or the default when it lacks one), with the
/// default as fallback. A layer with no matching features gets
/// `["coalesce", ["get", "user_<key>"], default]` since a `match` needs at
/// least one label.
pub fn project<'a>(
    features: impl IntoIterator<Item = &'a VectorFeature>,
    defaults: &StyleState,
) -> PaintPlan {
    let features: Vec<&VectorFeature> = features.into_iter().collect();
    let mut writes = Vec::new();

    for layer in DrawLayer::ALL {
        let Some(geometry) = layer.geometry() else {
            continue;
        };
        let members = members_of(&features, geometry);

        for &property in layer.properties() {
            let expression = match property.style_key() {
                None => Expression::literal(POINT_RADIUS),
                Some(key) => compile(&members, key, defaults),
            };
            writes.push(PaintWrite {
                layer,
                property,
                expression,
            });
        }
    }

    PaintPlan { writes }
}

/// Features of one geometry class, first occurrence of each id wins.
fn members_of<'a>(features: &[&'a VectorFeature], geometry: GeometryType) -> Vec<&'a VectorFeature> {
    let mut seen: HashSet<&FeatureId> = HashSet::new();
    features
        .iter()
        .copied()
        .filter(|f| f.geometry_type() == Some(geometry))
        .filter(|f| seen.insert(&f.id))
        .collect()
}

fn compile(members: &[&VectorFeature], key: StyleKey, defaults: &StyleState) -> Expression {
    let fallback = defaults.value(key);
    if members.is_empty() {
        return Expression::Coalesce(vec![
            Expression::get(format!("{USER_PREFIX}{}", key.as_str())),
            Expression::Literal(fallback),
        ]);
    }

    let arms = members
        .iter()
        .map(|f| {
            let value = f.style().value(key).unwrap_or_else(|| fallback.clone());
            (Value::String(f.id.as_str().to_string()), Expression::Literal(value))
        })
        .collect();

    Expression::Match {
        input: Box::new(Expression::get("id")),
        arms,
        fallback: Box::new(Expression::Literal(fallback)),
    }
}
