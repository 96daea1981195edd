//! The drawing toolkit seam.
//!
//! The toolkit owns the editable feature collection and the interaction
//! modes; the edit session reacts to its events. [`MemoryToolkit`] is a
//! plain in-memory implementation.

use geocanvas_core::{FeatureCollection, FeatureId, GeometryType, VectorFeature};
use serde_json::Value;

/// Interaction mode of the drawing toolkit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DrawMode {
    #[default]
    SimpleSelect,
    DirectSelect(FeatureId),
    Draw(GeometryType),
}

/// Events the toolkit emits.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawEvent {
    Create(Vec<VectorFeature>),
    Update(Vec<VectorFeature>),
    SelectionChange(Vec<VectorFeature>),
    Delete(Vec<VectorFeature>),
    ModeChange(DrawMode),
}

pub trait DrawToolkit {
    fn get_all(&self) -> FeatureCollection;
    fn get(&self, id: &FeatureId) -> Option<VectorFeature>;

    /// Set one property on a feature. Returns false when the id is unknown.
    fn set_feature_property(&mut self, id: &FeatureId, key: &str, value: Value) -> bool;

    /// Add a feature, replacing any feature with the same id in place.
    fn add(&mut self, feature: VectorFeature);
    fn delete(&mut self, id: &FeatureId) -> Option<VectorFeature>;

    /// Replace the whole collection.
    fn set_all(&mut self, features: FeatureCollection);

    fn selected_ids(&self) -> Vec<FeatureId>;
    fn mode(&self) -> DrawMode;
    fn change_mode(&mut self, mode: DrawMode);
}

#[derive(Debug, Clone, Default)]
pub struct MemoryToolkit {
    features: FeatureCollection,
    selected: Vec<FeatureId>,
    mode: DrawMode,
}

impl MemoryToolkit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select features by id, dropping ids the toolkit does not hold.
    pub fn select(&mut self, ids: &[FeatureId]) -> Vec<VectorFeature> {
        self.selected = ids
            .iter()
            .filter(|id| self.features.get(id).is_some())
            .cloned()
            .collect();
        self.selected
            .iter()
            .filter_map(|id| self.features.get(id).cloned())
            .collect()
    }
}

impl DrawToolkit for MemoryToolkit {
    fn get_all(&self) -> FeatureCollection {
        self.features.clone()
    }

    fn get(&self, id: &FeatureId) -> Option<VectorFeature> {
        self.features.get(id).cloned()
    }

    fn set_feature_property(&mut self, id: &FeatureId, key: &str, value: Value) -> bool {
        match self.features.get_mut(id) {
            Some(feature) => {
                feature.properties.insert(key.to_string(), value);
                true
            }
            None => false,
        }
    }

    fn add(&mut self, feature: VectorFeature) {
        self.features.upsert(feature);
    }

    fn delete(&mut self, id: &FeatureId) -> Option<VectorFeature> {
        self.selected.retain(|s| s != id);
        self.features.remove(id)
    }

    fn set_all(&mut self, features: FeatureCollection) {
        self.selected.clear();
        self.features = features;
    }

    fn selected_ids(&self) -> Vec<FeatureId> {
        self.selected.clone()
    }

    fn mode(&self) -> DrawMode {
        self.mode.clone()
    }

    fn change_mode(&mut self, mode: DrawMode) {
        self.mode = mode;
    }
}
