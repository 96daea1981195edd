//! Vector editing on top of the drawing toolkit: default style stamping,
//! style persistence across edits, the custom-property editor and GeoJSON
//! import/export.

use geocanvas_core::paint::{project, DrawLayer, LayerSpec, SourceSpec, COLD_SOURCE, HOT_SOURCE};
use geocanvas_core::vector::{self, CustomProperties};
use geocanvas_core::{
    Bounds, FeatureCollection, FeatureId, FeatureStyle, FeatureStyleStore, GeometryType, StyleKey,
    VectorFeature,
};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::context::MapContext;
use crate::draw::{DrawEvent, DrawMode, DrawToolkit};
use crate::error::{ExportError, SessionError, SessionResult};
use crate::renderer::MapRenderer;
use crate::results::LogEntry;

/// Interaction state of the session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Drawing(GeometryType),
    Editing(FeatureId),
}

/// The property editor opened for a single selected feature.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyEditor {
    pub feature_id: FeatureId,
    /// Key/value rows, reserved keys excluded.
    pub rows: Vec<(String, String)>,
}

impl PropertyEditor {
    fn open(feature: &VectorFeature) -> Self {
        Self {
            feature_id: feature.id.clone(),
            rows: feature
                .custom_properties()
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// A static GeoJSON reference layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedLayer {
    pub source_id: String,
    /// One renderer layer per geometry class present in the data.
    pub layer_ids: Vec<String>,
    pub feature_count: usize,
    pub bounds: Option<Bounds>,
    data: Value,
    geometries: Vec<GeometryType>,
}

/// Which draw layers received paint in one recompilation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaintReport {
    pub applied: Vec<DrawLayer>,
    /// Layers the renderer does not have yet; their writes were skipped.
    pub skipped: Vec<DrawLayer>,
}

pub struct VectorEditSession<T> {
    toolkit: T,
    styles: FeatureStyleStore,
    state: SessionState,
    editor: Option<PropertyEditor>,
    imported: Vec<ImportedLayer>,
    next_import: u64,
}

impl<T: DrawToolkit> VectorEditSession<T> {
    pub fn new(toolkit: T) -> Self {
        Self {
            toolkit,
            styles: FeatureStyleStore::new(),
            state: SessionState::Idle,
            editor: None,
            imported: Vec::new(),
            next_import: 1,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn editor(&self) -> Option<&PropertyEditor> {
        self.editor.as_ref()
    }

    pub fn styles(&self) -> &FeatureStyleStore {
        &self.styles
    }

    pub fn toolkit(&self) -> &T {
        &self.toolkit
    }

    pub fn toolkit_mut(&mut self) -> &mut T {
        &mut self.toolkit
    }

    pub fn imported(&self) -> &[ImportedLayer] {
        &self.imported
    }

    /// Add the custom draw layers (and the toolkit's render sources) that the
    /// renderer does not have yet. Returns the number of layers added.
    pub fn install_draw_layers<R: MapRenderer>(&self, ctx: &MapContext<R>) -> usize {
        let mut renderer = ctx.renderer_mut();
        for source in [COLD_SOURCE, HOT_SOURCE] {
            if !renderer.has_source(source) {
                renderer.add_source(source, empty_source());
            }
        }
        let mut added = 0;
        for layer in DrawLayer::ALL {
            if !renderer.has_layer(layer.id()) {
                renderer.add_layer(layer.spec());
                added += 1;
            }
        }
        debug!(added, "draw layers installed");
        added
    }

    /// Enter drawing mode for one geometry class.
    pub fn start_drawing(&mut self, kind: GeometryType) {
        self.editor = None;
        self.state = SessionState::Drawing(kind);
        self.toolkit.change_mode(DrawMode::Draw(kind));
    }

    /// Dispatch one toolkit event.
    pub fn handle_event<R: MapRenderer>(&mut self, ctx: &MapContext<R>, event: DrawEvent) {
        match event {
            DrawEvent::Create(features) => {
                self.on_create(ctx, features);
            }
            DrawEvent::Update(features) => {
                self.on_update(ctx, features);
            }
            DrawEvent::SelectionChange(features) => {
                self.on_selection_change(features);
            }
            DrawEvent::Delete(features) => {
                let ids: Vec<FeatureId> = features.into_iter().map(|f| f.id).collect();
                self.on_feature_deleted(ctx, &ids);
            }
            DrawEvent::ModeChange(DrawMode::Draw(kind)) => {
                self.editor = None;
                self.state = SessionState::Drawing(kind);
            }
            DrawEvent::ModeChange(_) => {
                if matches!(self.state, SessionState::Drawing(_)) {
                    self.state = SessionState::Idle;
                }
            }
        }
    }

    /// Stamp the current style selection onto new features and repaint.
    pub fn on_create<R: MapRenderer>(
        &mut self,
        ctx: &MapContext<R>,
        features: Vec<VectorFeature>,
    ) -> PaintReport {
        for created in features {
            let mut feature = self.toolkit.get(&created.id).unwrap_or(created);
            let style = self.styles.stamp(&mut feature, &ctx.style());
            self.write_back(&feature, &style);
            info!(feature = %feature.id, "feature created");
        }
        if matches!(self.state, SessionState::Drawing(_)) {
            self.state = SessionState::Idle;
            self.toolkit.change_mode(DrawMode::SimpleSelect);
        }
        self.recompile(ctx)
    }

    /// Re-stamp persisted styles after the toolkit rewrote features.
    pub fn on_update<R: MapRenderer>(
        &mut self,
        ctx: &MapContext<R>,
        features: Vec<VectorFeature>,
    ) -> PaintReport {
        for updated in features {
            let mut feature = self.toolkit.get(&updated.id).unwrap_or(updated);
            let style = self.styles.restamp(&mut feature, &ctx.style());
            self.write_back(&feature, &style);
        }
        self.recompile(ctx)
    }

    /// Open the property editor for a single selection; close it otherwise.
    pub fn on_selection_change(&mut self, features: Vec<VectorFeature>) -> Option<&PropertyEditor> {
        if matches!(self.state, SessionState::Drawing(_)) {
            return None;
        }
        match features.as_slice() {
            [selected] => {
                let feature = self.toolkit.get(&selected.id).unwrap_or_else(|| selected.clone());
                self.state = SessionState::Editing(feature.id.clone());
                self.editor = Some(PropertyEditor::open(&feature));
            }
            _ => {
                self.state = SessionState::Idle;
                self.editor = None;
            }
        }
        self.editor.as_ref()
    }

    /// Save the editor rows onto the feature being edited.
    ///
    /// Keys lose any toolkit prefix; reserved keys are rejected and reported
    /// in the results panel. The feature is replaced in place by id.
    pub fn save_properties<R, K, V>(
        &mut self,
        ctx: &MapContext<R>,
        rows: impl IntoIterator<Item = (K, V)>,
    ) -> SessionResult<()>
    where
        R: MapRenderer,
        K: AsRef<str>,
        V: Into<String>,
    {
        let Some(editor) = &self.editor else {
            return Err(SessionError::NotEditing);
        };
        let id = editor.feature_id.clone();

        let custom = match CustomProperties::from_pairs(rows) {
            Ok(custom) => custom,
            Err(e) => {
                ctx.report(LogEntry::error(e.to_string()));
                return Err(e.into());
            }
        };
        let mut feature = self
            .toolkit
            .get(&id)
            .ok_or_else(|| SessionError::UnknownFeature(id.clone()))?;

        feature.set_custom_properties(&custom);
        self.styles.restamp(&mut feature, &ctx.style());
        self.toolkit.add(feature);
        info!(feature = %id, count = custom.len(), "custom properties saved");

        self.editor = None;
        self.state = SessionState::Idle;
        self.recompile(ctx);
        Ok(())
    }

    /// Give the selected features the current style selection.
    /// Returns the number of features restyled.
    pub fn apply_style_to_selection<R: MapRenderer>(&mut self, ctx: &MapContext<R>) -> usize {
        let style = ctx.style().to_feature_style();
        let mut restyled = 0;
        for id in self.toolkit.selected_ids() {
            let Some(mut feature) = self.toolkit.get(&id) else {
                continue;
            };
            self.styles.apply(&mut feature, style.clone());
            self.write_back(&feature, &style);
            restyled += 1;
        }
        if restyled > 0 {
            self.recompile(ctx);
        }
        restyled
    }

    /// Forget deleted features' styles and repaint.
    pub fn on_feature_deleted<R: MapRenderer>(
        &mut self,
        ctx: &MapContext<R>,
        ids: &[FeatureId],
    ) -> PaintReport {
        for id in ids {
            self.styles.remove(id);
            if self.editor.as_ref().is_some_and(|e| &e.feature_id == id) {
                self.editor = None;
                self.state = SessionState::Idle;
            }
        }
        self.recompile(ctx)
    }

    /// Put features back after a basemap switch wiped the style: reinstall
    /// the draw layers and reference layers, restore the collection and
    /// repaint.
    pub fn restore<R: MapRenderer>(
        &mut self,
        ctx: &MapContext<R>,
        features: FeatureCollection,
    ) -> PaintReport {
        self.install_draw_layers(ctx);
        self.reinstall_imports(ctx);

        if !features.is_empty() {
            self.toolkit.set_all(features);
        }
        let live = self.toolkit.get_all();
        for mut feature in live.iter().cloned() {
            let style = self.styles.restamp(&mut feature, &ctx.style());
            self.write_back(&feature, &style);
        }
        self.styles.retain_ids(live.iter().map(|f| &f.id));
        self.editor = None;
        self.state = SessionState::Idle;
        self.recompile(ctx)
    }

    /// Compile paint expressions from every feature and push them to the
    /// renderer. A draw layer the renderer lacks is skipped as a whole.
    pub fn recompile<R: MapRenderer>(&self, ctx: &MapContext<R>) -> PaintReport {
        let features = self.toolkit.get_all();
        let plan = project(features.iter(), &ctx.style());

        let mut report = PaintReport::default();
        let mut renderer = ctx.renderer_mut();
        for layer in plan.layers() {
            if !renderer.has_layer(layer.id()) {
                debug!(layer = layer.id(), "draw layer not on the map, paint skipped");
                report.skipped.push(layer);
                continue;
            }
            for write in plan.for_layer(layer) {
                renderer.set_paint_property(
                    layer.id(),
                    write.property.name(),
                    write.expression.to_json(),
                );
            }
            report.applied.push(layer);
        }
        report
    }

    /// Import a GeoJSON document as a static reference layer and fit the
    /// view to it.
    pub fn import_geojson<R: MapRenderer>(
        &mut self,
        ctx: &MapContext<R>,
        text: &str,
    ) -> SessionResult<ImportedLayer> {
        let imported = match vector::import_geojson(text) {
            Ok(imported) => imported,
            Err(e) => {
                ctx.report(LogEntry::error(format!("Could not import GeoJSON: {e}")));
                return Err(e.into());
            }
        };
        if imported.was_reprojected() {
            info!(crs = %imported.source_crs, "GeoJSON reprojected to EPSG:4326");
        }

        let n = self.next_import;
        self.next_import += 1;
        let source_id = format!("imported-geojson-{n}");

        let mut geometries: Vec<GeometryType> = Vec::new();
        for kind in [GeometryType::Polygon, GeometryType::LineString, GeometryType::Point] {
            if imported.features.iter().any(|f| f.geometry_type() == Some(kind)) {
                geometries.push(kind);
            }
        }

        let layer = ImportedLayer {
            layer_ids: geometries
                .iter()
                .map(|g| reference_layer_id(&source_id, *g))
                .collect(),
            source_id,
            feature_count: imported.features.len(),
            bounds: imported.bounds(),
            data: vector::geojson_value(&imported.features)?,
            geometries,
        };

        install_reference_layer(&mut *ctx.renderer_mut(), &layer);
        match layer.bounds {
            Some(bounds) => ctx.renderer_mut().fit_bounds(&bounds),
            None => warn!(source = %layer.source_id, "imported GeoJSON has no extent"),
        }
        ctx.report(LogEntry::success(format!(
            "Imported {} feature(s).",
            layer.feature_count
        )));

        self.imported.push(layer.clone());
        Ok(layer)
    }

    /// Serialize the editable collection. An empty collection is refused and
    /// reported in the results panel.
    pub fn export_geojson<R: MapRenderer>(&self, ctx: &MapContext<R>) -> SessionResult<String> {
        let features = self.toolkit.get_all();
        if features.is_empty() {
            ctx.report(LogEntry::warning("No features to export."));
            return Err(ExportError::Empty.into());
        }
        let text = vector::export_geojson(&features).map_err(ExportError::Codec)?;
        info!(count = features.len(), "exported GeoJSON");
        Ok(text)
    }

    fn reinstall_imports<R: MapRenderer>(&self, ctx: &MapContext<R>) {
        let mut renderer = ctx.renderer_mut();
        for layer in &self.imported {
            install_reference_layer(&mut *renderer, layer);
        }
    }

    /// Push a feature's style keys back into the toolkit, or add the feature
    /// when the toolkit does not hold it.
    fn write_back(&mut self, feature: &VectorFeature, style: &FeatureStyle) {
        if self.toolkit.get(&feature.id).is_none() {
            self.toolkit.add(feature.clone());
            return;
        }
        for key in StyleKey::ALL {
            if let Some(value) = style.value(key) {
                self.toolkit.set_feature_property(&feature.id, key.as_str(), value);
            }
        }
    }
}

fn empty_source() -> SourceSpec {
    SourceSpec::GeoJson {
        data: json!({ "type": "FeatureCollection", "features": [] }),
    }
}

fn reference_layer_id(source_id: &str, geometry: GeometryType) -> String {
    let suffix = match geometry {
        GeometryType::Polygon => "fill",
        GeometryType::LineString => "line",
        GeometryType::Point => "circle",
    };
    format!("{source_id}-{suffix}")
}

fn install_reference_layer<R: MapRenderer>(renderer: &mut R, layer: &ImportedLayer) {
    if !renderer.has_source(&layer.source_id) {
        renderer.add_source(
            &layer.source_id,
            SourceSpec::GeoJson {
                data: layer.data.clone(),
            },
        );
    }
    for geometry in &layer.geometries {
        let id = reference_layer_id(&layer.source_id, *geometry);
        if !renderer.has_layer(&id) {
            renderer.add_layer(LayerSpec::reference(id, &layer.source_id, *geometry));
        }
    }
}
