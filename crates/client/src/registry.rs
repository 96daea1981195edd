//! Raster overlay registry: uploaded and processed images, their renderer
//! source/layer pairs, visibility and opacity.

use std::collections::{HashMap, VecDeque};

use geocanvas_core::paint::{LayerSpec, SourceSpec};
use geocanvas_core::Bounds;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::renderer::MapRenderer;

pub const LAYER_ID_PREFIX: &str = "uploaded-image-layer";
pub const SOURCE_ID_PREFIX: &str = "uploaded-image-source";
pub const DEFAULT_OPACITY: f64 = 0.85;

/// An image overlay and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterLayerRecord {
    pub layer_id: String,
    pub source_id: String,
    pub bounds: Bounds,
    pub image_url: String,
    /// Object key of the image in remote storage, when it has one.
    pub remote_object_key: Option<String>,
    /// Label shown in the layer control.
    pub display_name: String,
    pub upload_uuid: Option<String>,
    /// Raster opacity [0.0, 1.0].
    pub opacity: f64,
    pub visible: bool,
}

/// Metadata for a new overlay.
#[derive(Debug, Clone)]
pub struct NewRasterLayer {
    pub bounds: Bounds,
    pub image_url: String,
    pub remote_object_key: Option<String>,
    pub display_name: String,
    pub upload_uuid: Option<String>,
}

/// One row of the layer control.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerControlEntry {
    pub layer_id: String,
    pub label: String,
    pub visible: bool,
    pub opacity: f64,
}

/// Actions from the layer control.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerAction {
    /// Set visibility of a layer.
    SetVisibility(String, bool),
    /// Change opacity of a layer.
    ChangeOpacity(String, f64),
    /// Move the camera to a layer.
    Zoom(String),
    /// Remove a layer and its source.
    Remove(String),
}

/// What `add_or_update_layer` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Source and layer were created.
    Added,
    /// Both already existed; nothing changed on the renderer.
    AlreadyPresent,
    /// The style is still loading; the add is queued.
    Deferred,
}

/// The registry holds every overlay and the queue of adds waiting for the
/// style to load.
#[derive(Debug, Clone)]
pub struct RasterLayerRegistry {
    records: HashMap<String, RasterLayerRecord>,
    /// Creation order, bottom to top.
    layer_order: Vec<String>,
    /// Layer ids waiting for the style to load, in submission order.
    pending: VecDeque<String>,
    /// Counter for generating unique ids.
    next_id: u64,
}

impl Default for RasterLayerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RasterLayerRegistry {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            layer_order: Vec::new(),
            pending: VecDeque::new(),
            next_id: 1,
        }
    }

    /// Record a new overlay under the next free layer id and return the id.
    /// Nothing is added to the renderer yet.
    pub fn register(&mut self, layer: NewRasterLayer) -> String {
        let (n, layer_id) = loop {
            let n = self.next_id;
            self.next_id += 1;
            let layer_id = format!("{LAYER_ID_PREFIX}-{n}");
            if !self.records.contains_key(&layer_id) {
                break (n, layer_id);
            }
        };
        let record = RasterLayerRecord {
            layer_id: layer_id.clone(),
            source_id: format!("{SOURCE_ID_PREFIX}-{n}"),
            bounds: layer.bounds,
            image_url: layer.image_url,
            remote_object_key: layer.remote_object_key,
            display_name: layer.display_name,
            upload_uuid: layer.upload_uuid,
            opacity: DEFAULT_OPACITY,
            visible: true,
        };
        self.layer_order.push(layer_id.clone());
        self.records.insert(layer_id.clone(), record);
        layer_id
    }

    /// Make sure `layer_id` is on the map with the given image.
    ///
    /// Creates the source/layer pair only when neither exists; calling it
    /// again is a no-op. Before the style has loaded the add is queued and
    /// replayed by [`on_style_loaded`](Self::on_style_loaded). An unknown
    /// id is registered under its own name with `bounds` and `image_url`;
    /// a known id keeps its recorded image.
    pub fn add_or_update_layer<R: MapRenderer>(
        &mut self,
        renderer: &mut R,
        layer_id: &str,
        bounds: Bounds,
        image_url: &str,
    ) -> AddOutcome {
        match self.records.get(layer_id) {
            Some(record) if record.image_url != image_url || record.bounds != bounds => {
                debug!(layer_id, "layer already recorded, keeping its image");
            }
            Some(_) => {}
            None => {
                let record = RasterLayerRecord {
                    layer_id: layer_id.to_string(),
                    source_id: format!("{layer_id}-source"),
                    bounds,
                    image_url: image_url.to_string(),
                    remote_object_key: None,
                    display_name: layer_id.to_string(),
                    upload_uuid: None,
                    opacity: DEFAULT_OPACITY,
                    visible: true,
                };
                self.layer_order.push(layer_id.to_string());
                self.records.insert(layer_id.to_string(), record);
            }
        }

        if !renderer.is_style_loaded() {
            if !self.pending.iter().any(|p| p == layer_id) {
                debug!(layer_id, "style not loaded, deferring raster add");
                self.pending.push_back(layer_id.to_string());
            }
            return AddOutcome::Deferred;
        }

        self.materialize(renderer, layer_id)
    }

    /// Replay deferred adds in submission order, then restore any overlay
    /// the renderer lost (a basemap switch drops every source and layer).
    /// Returns the number of layers added.
    pub fn on_style_loaded<R: MapRenderer>(&mut self, renderer: &mut R) -> usize {
        let mut added = 0;
        while let Some(layer_id) = self.pending.pop_front() {
            if self.materialize(renderer, &layer_id) == AddOutcome::Added {
                added += 1;
            }
        }
        for layer_id in &self.layer_order {
            if self.materialize(renderer, layer_id) == AddOutcome::Added {
                added += 1;
            }
        }
        if added > 0 {
            info!(added, "raster layers restored after style load");
        }
        added
    }

    fn materialize<R: MapRenderer>(&self, renderer: &mut R, layer_id: &str) -> AddOutcome {
        let Some(record) = self.records.get(layer_id) else {
            return AddOutcome::AlreadyPresent;
        };
        let has_source = renderer.has_source(&record.source_id);
        let has_layer = renderer.has_layer(&record.layer_id);
        if has_source && has_layer {
            return AddOutcome::AlreadyPresent;
        }
        // A half-present pair is torn down and rebuilt.
        if has_layer {
            warn!(layer_id, "layer without source, recreating");
            renderer.remove_layer(&record.layer_id);
        }
        if has_source {
            warn!(layer_id, "source without layer, recreating");
            renderer.remove_source(&record.source_id);
        }

        renderer.add_source(
            &record.source_id,
            SourceSpec::image(record.image_url.clone(), &record.bounds),
        );
        let mut layer = LayerSpec::raster(&record.layer_id, &record.source_id, record.opacity);
        if !record.visible {
            layer.layout.insert("visibility".into(), json!("none"));
        }
        renderer.add_layer(layer);
        debug!(layer_id, "raster layer added");
        AddOutcome::Added
    }

    /// Show or hide a layer. Returns false for an unknown id.
    pub fn set_visibility<R: MapRenderer>(
        &mut self,
        renderer: &mut R,
        layer_id: &str,
        visible: bool,
    ) -> bool {
        let Some(record) = self.records.get_mut(layer_id) else {
            return false;
        };
        record.visible = visible;
        if renderer.has_layer(layer_id) {
            let value = if visible { "visible" } else { "none" };
            renderer.set_layout_property(layer_id, "visibility", json!(value));
        }
        true
    }

    /// Set a layer's opacity, clamped to [0, 1]. Returns false for an
    /// unknown id.
    pub fn set_opacity<R: MapRenderer>(
        &mut self,
        renderer: &mut R,
        layer_id: &str,
        opacity: f64,
    ) -> bool {
        let Some(record) = self.records.get_mut(layer_id) else {
            return false;
        };
        let opacity = if opacity.is_nan() { DEFAULT_OPACITY } else { opacity.clamp(0.0, 1.0) };
        record.opacity = opacity;
        if renderer.has_layer(layer_id) {
            renderer.set_paint_property(layer_id, "raster-opacity", json!(opacity));
        }
        true
    }

    /// Move the camera to a layer's bounds.
    pub fn fit_to_bounds<R: MapRenderer>(&self, renderer: &mut R, layer_id: &str) -> bool {
        match self.records.get(layer_id) {
            Some(record) => {
                renderer.fit_bounds(&record.bounds);
                true
            }
            None => false,
        }
    }

    /// Remove a layer and its source together.
    pub fn remove_layer<R: MapRenderer>(
        &mut self,
        renderer: &mut R,
        layer_id: &str,
    ) -> Option<RasterLayerRecord> {
        let record = self.records.remove(layer_id)?;
        self.layer_order.retain(|id| id != layer_id);
        self.pending.retain(|id| id != layer_id);
        if renderer.has_layer(&record.layer_id) {
            renderer.remove_layer(&record.layer_id);
        }
        if renderer.has_source(&record.source_id) {
            renderer.remove_source(&record.source_id);
        }
        info!(layer_id, "raster layer removed");
        Some(record)
    }

    /// Apply an action from the layer control.
    pub fn apply<R: MapRenderer>(&mut self, renderer: &mut R, action: LayerAction) -> bool {
        match action {
            LayerAction::SetVisibility(id, visible) => self.set_visibility(renderer, &id, visible),
            LayerAction::ChangeOpacity(id, opacity) => self.set_opacity(renderer, &id, opacity),
            LayerAction::Zoom(id) => self.fit_to_bounds(renderer, &id),
            LayerAction::Remove(id) => self.remove_layer(renderer, &id).is_some(),
        }
    }

    pub fn get(&self, layer_id: &str) -> Option<&RasterLayerRecord> {
        self.records.get(layer_id)
    }

    /// Iterate records in creation order.
    pub fn records(&self) -> impl Iterator<Item = &RasterLayerRecord> {
        self.layer_order.iter().filter_map(|id| self.records.get(id))
    }

    /// Layer control rows, top layer first.
    pub fn entries(&self) -> Vec<LayerControlEntry> {
        self.layer_order
            .iter()
            .rev()
            .filter_map(|id| self.records.get(id))
            .map(|r| LayerControlEntry {
                layer_id: r.layer_id.clone(),
                label: r.display_name.clone(),
                visible: r.visible,
                opacity: r.opacity,
            })
            .collect()
    }

    /// Number of adds waiting for the style to load.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
