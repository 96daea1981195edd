use std::collections::HashMap;

use tracing::debug;

use super::{FeatureStyle, StyleState};
use crate::vector::{FeatureId, VectorFeature};

/// Persisted per-feature styles, keyed by feature id.
///
/// The drawing toolkit rewrites a feature's property bag whenever it mutates
/// geometry, so the store is the authority for a feature's style; the bag is
/// re-stamped from here after every update.
#[derive(Debug, Clone, Default)]
pub struct FeatureStyleStore {
    styles: HashMap<FeatureId, FeatureStyle>,
}

impl FeatureStyleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp the current style selection onto a newly created feature and
    /// persist it.
    pub fn stamp(&mut self, feature: &mut VectorFeature, defaults: &StyleState) -> FeatureStyle {
        let style = defaults.to_feature_style();
        style.write_to(&mut feature.properties);
        debug!(feature = %feature.id, "stamped default style");
        self.styles.insert(feature.id.clone(), style.clone());
        style
    }

    /// Re-apply the persisted style after an update.
    ///
    /// Precedence per attribute: the persisted style, then whatever the
    /// property bag still carries, then the current style selection.
    pub fn restamp(&mut self, feature: &mut VectorFeature, defaults: &StyleState) -> FeatureStyle {
        let from_bag = FeatureStyle::from_properties(&feature.properties);
        let style = match self.styles.get(&feature.id) {
            Some(persisted) => persisted.clone().or(&from_bag),
            None => from_bag,
        }
        .resolve(defaults);

        style.write_to(&mut feature.properties);
        self.styles.insert(feature.id.clone(), style.clone());
        style
    }

    /// Replace a feature's style outright and write it into its bag.
    pub fn apply(&mut self, feature: &mut VectorFeature, style: FeatureStyle) {
        style.write_to(&mut feature.properties);
        self.styles.insert(feature.id.clone(), style);
    }

    pub fn get(&self, id: &FeatureId) -> Option<&FeatureStyle> {
        self.styles.get(id)
    }

    pub fn remove(&mut self, id: &FeatureId) -> Option<FeatureStyle> {
        self.styles.remove(id)
    }

    /// Drop styles of features that no longer exist.
    pub fn retain_ids<'a>(&mut self, live: impl IntoIterator<Item = &'a FeatureId>) {
        let live: std::collections::HashSet<&FeatureId> = live.into_iter().collect();
        self.styles.retain(|id, _| live.contains(id));
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Color;
    use crate::vector::Geometry;
    use serde_json::json;

    fn polygon(id: &str) -> VectorFeature {
        VectorFeature::new(
            id,
            Geometry::Polygon {
                coordinates: vec![vec![
                    vec![0.0, 0.0],
                    vec![1.0, 0.0],
                    vec![1.0, 1.0],
                    vec![0.0, 0.0],
                ]],
            },
        )
    }

    #[test]
    fn stamp_writes_defaults() {
        let mut store = FeatureStyleStore::new();
        let mut f = polygon("a");
        store.stamp(&mut f, &StyleState::default());
        assert_eq!(f.properties["fillColor"], json!("#ff0000"));
        assert_eq!(f.properties["strokeWidth"], json!(2.0));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn restamp_prefers_persisted_style() {
        let mut store = FeatureStyleStore::new();
        let mut f = polygon("a");
        store.stamp(&mut f, &StyleState::default());

        // The toolkit dropped the style keys during a vertex drag and the user
        // has since picked a different fill.
        f.properties.clear();
        let mut picker = StyleState::default();
        picker.set_fill_color(Color::parse("#00ff00").unwrap());

        let style = store.restamp(&mut f, &picker);
        assert_eq!(style.fill_color.unwrap().as_str(), "#ff0000");
        assert_eq!(f.properties["fillColor"], json!("#ff0000"));
    }

    #[test]
    fn restamp_unknown_feature_falls_back_to_bag_then_defaults() {
        let mut store = FeatureStyleStore::new();
        let mut f = polygon("b");
        f.properties.insert("strokeColor".into(), json!("#123456"));
        let style = store.restamp(&mut f, &StyleState::default());
        assert_eq!(style.stroke_color.unwrap().as_str(), "#123456");
        assert_eq!(style.fill_opacity, Some(0.5));
        assert!(store.get(&FeatureId::from("b")).is_some());
    }

    #[test]
    fn retain_drops_deleted_features() {
        let mut store = FeatureStyleStore::new();
        let mut a = polygon("a");
        let mut b = polygon("b");
        store.stamp(&mut a, &StyleState::default());
        store.stamp(&mut b, &StyleState::default());
        store.retain_ids([&a.id]);
        assert_eq!(store.len(), 1);
        assert!(store.get(&b.id).is_none());
    }
}
