//! The map renderer seam.
//!
//! [`MapRenderer`] is the subset of a style-based map renderer's API the
//! engine drives. [`HeadlessRenderer`] keeps the resulting style in memory;
//! the CLI renders into it and tests assert against it.

use std::collections::HashMap;

use geocanvas_core::paint::{LayerSpec, SourceSpec};
use geocanvas_core::Bounds;
use serde_json::{Map, Value};
use tracing::debug;

pub trait MapRenderer {
    /// Whether the current style finished loading; sources and layers
    /// cannot be added before that.
    fn is_style_loaded(&self) -> bool;

    fn has_source(&self, id: &str) -> bool;
    fn has_layer(&self, id: &str) -> bool;

    fn add_source(&mut self, id: &str, source: SourceSpec);
    fn add_layer(&mut self, layer: LayerSpec);
    fn remove_layer(&mut self, id: &str);
    fn remove_source(&mut self, id: &str);

    fn set_paint_property(&mut self, layer_id: &str, name: &str, value: Value);
    fn set_layout_property(&mut self, layer_id: &str, name: &str, value: Value);

    fn fit_bounds(&mut self, bounds: &Bounds);
}

/// One mutating call, as recorded by [`HeadlessRenderer`].
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOp {
    AddSource(String),
    AddLayer(String),
    RemoveLayer(String),
    RemoveSource(String),
    SetPaint {
        layer: String,
        name: String,
        value: Value,
    },
    SetLayout {
        layer: String,
        name: String,
        value: Value,
    },
    FitBounds(Bounds),
}

/// In-memory renderer state.
#[derive(Debug, Clone, Default)]
pub struct HeadlessRenderer {
    style_loaded: bool,
    sources: HashMap<String, SourceSpec>,
    /// Layers in insertion (draw) order.
    layers: Vec<LayerSpec>,
    ops: Vec<RenderOp>,
}

impl HeadlessRenderer {
    /// A renderer whose style has already loaded.
    pub fn loaded() -> Self {
        Self {
            style_loaded: true,
            ..Self::default()
        }
    }

    /// Signal that the style finished loading.
    pub fn finish_loading(&mut self) {
        self.style_loaded = true;
    }

    /// Begin loading a new basemap style: every source and layer is dropped,
    /// as a renderer does on a style switch.
    pub fn set_style(&mut self) {
        self.style_loaded = false;
        self.sources.clear();
        self.layers.clear();
    }

    pub fn source(&self, id: &str) -> Option<&SourceSpec> {
        self.sources.get(id)
    }

    pub fn layer(&self, id: &str) -> Option<&LayerSpec> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn layer_ids(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.id.as_str()).collect()
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn paint(&self, layer_id: &str, name: &str) -> Option<&Value> {
        self.layer(layer_id).and_then(|l| l.paint.get(name))
    }

    pub fn layout(&self, layer_id: &str, name: &str) -> Option<&Value> {
        self.layer(layer_id).and_then(|l| l.layout.get(name))
    }

    /// Every mutating call so far, oldest first.
    pub fn ops(&self) -> &[RenderOp] {
        &self.ops
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// Bounds passed to the most recent camera fit.
    pub fn last_fit(&self) -> Option<Bounds> {
        self.ops.iter().rev().find_map(|op| match op {
            RenderOp::FitBounds(b) => Some(*b),
            _ => None,
        })
    }

    /// Current style as JSON, for inspection.
    pub fn style_json(&self) -> Value {
        let sources: Map<String, Value> = self
            .sources
            .iter()
            .map(|(id, s)| (id.clone(), serde_json::to_value(s).unwrap_or(Value::Null)))
            .collect();
        let layers: Vec<Value> = self
            .layers
            .iter()
            .map(|l| serde_json::to_value(l).unwrap_or(Value::Null))
            .collect();
        serde_json::json!({ "version": 8, "sources": sources, "layers": layers })
    }
}

impl MapRenderer for HeadlessRenderer {
    fn is_style_loaded(&self) -> bool {
        self.style_loaded
    }

    fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    fn has_layer(&self, id: &str) -> bool {
        self.layers.iter().any(|l| l.id == id)
    }

    fn add_source(&mut self, id: &str, source: SourceSpec) {
        self.sources.insert(id.to_string(), source);
        self.ops.push(RenderOp::AddSource(id.to_string()));
    }

    fn add_layer(&mut self, layer: LayerSpec) {
        self.ops.push(RenderOp::AddLayer(layer.id.clone()));
        self.layers.retain(|l| l.id != layer.id);
        self.layers.push(layer);
    }

    fn remove_layer(&mut self, id: &str) {
        self.layers.retain(|l| l.id != id);
        self.ops.push(RenderOp::RemoveLayer(id.to_string()));
    }

    fn remove_source(&mut self, id: &str) {
        self.sources.remove(id);
        self.ops.push(RenderOp::RemoveSource(id.to_string()));
    }

    fn set_paint_property(&mut self, layer_id: &str, name: &str, value: Value) {
        let Some(layer) = self.layers.iter_mut().find(|l| l.id == layer_id) else {
            debug!(layer_id, name, "paint on missing layer ignored");
            return;
        };
        layer.paint.insert(name.to_string(), value.clone());
        self.ops.push(RenderOp::SetPaint {
            layer: layer_id.to_string(),
            name: name.to_string(),
            value,
        });
    }

    fn set_layout_property(&mut self, layer_id: &str, name: &str, value: Value) {
        let Some(layer) = self.layers.iter_mut().find(|l| l.id == layer_id) else {
            debug!(layer_id, name, "layout on missing layer ignored");
            return;
        };
        layer.layout.insert(name.to_string(), value.clone());
        self.ops.push(RenderOp::SetLayout {
            layer: layer_id.to_string(),
            name: name.to_string(),
            value,
        });
    }

    fn fit_bounds(&mut self, bounds: &Bounds) {
        self.ops.push(RenderOp::FitBounds(*bounds));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn style_switch_drops_everything() {
        let mut r = HeadlessRenderer::loaded();
        r.add_source("s", SourceSpec::image("u", &Bounds::new(1.0, 0.0, 0.0, 1.0)));
        r.add_layer(LayerSpec::raster("l", "s", 0.85));
        assert!(r.has_layer("l") && r.has_source("s"));

        r.set_style();
        assert!(!r.is_style_loaded());
        assert!(!r.has_layer("l"));
        assert_eq!(r.source_count(), 0);
    }

    #[test]
    fn paint_on_missing_layer_is_a_no_op() {
        let mut r = HeadlessRenderer::loaded();
        r.set_paint_property("nope", "fill-color", json!("#fff"));
        assert!(r.ops().is_empty());
    }
}
