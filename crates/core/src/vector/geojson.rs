//! GeoJSON import and export.
//!
//! Import honours the legacy named `crs` member and reprojects to EPSG:4326;
//! export always writes plain RFC 7946 without a `crs` member.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::properties::{strip_internal_prefix, USER_PREFIX};
use super::{FeatureCollection, FeatureId, Geometry, VectorFeature};
use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::geometry::Bounds;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
enum CollectionTag {
    FeatureCollection,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
enum FeatureTag {
    Feature,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Document {
    Collection(CollectionDoc),
    Single(FeatureDoc),
}

#[derive(Debug, Serialize, Deserialize)]
struct CollectionDoc {
    #[serde(rename = "type")]
    kind: CollectionTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    crs: Option<CrsMember>,
    features: Vec<FeatureDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FeatureDoc {
    #[serde(rename = "type")]
    kind: FeatureTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<Value>,
    geometry: Option<Geometry>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CrsMember {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    properties: Map<String, Value>,
}

/// Result of parsing a GeoJSON document.
#[derive(Debug, Clone)]
pub struct ImportedGeoJson {
    /// Features in EPSG:4326.
    pub features: FeatureCollection,
    /// CRS the document declared (EPSG:4326 when it declared none).
    pub source_crs: CRS,
    /// Number of features dropped for having no geometry.
    pub skipped: usize,
}

impl ImportedGeoJson {
    pub fn bounds(&self) -> Option<Bounds> {
        self.features.bounds()
    }

    pub fn was_reprojected(&self) -> bool {
        !self.source_crs.is_geographic()
    }
}

/// Parse a GeoJSON `FeatureCollection` (or a single `Feature`).
///
/// Features without an id get `feature-<n>`; toolkit `user_` prefixes are
/// stripped from property keys. Geometries are reprojected to EPSG:4326 when
/// the document declares a projected CRS.
pub fn import_geojson(text: &str) -> Result<ImportedGeoJson> {
    let doc: Document =
        serde_json::from_str(text).map_err(|e| Error::InvalidGeoJson(e.to_string()))?;

    let (crs_member, docs) = match doc {
        Document::Collection(c) => (c.crs, c.features),
        Document::Single(f) => (None, vec![f]),
    };

    let source_crs = match crs_member {
        Some(member) => crs_from_member(&member)?,
        None => CRS::wgs84(),
    };
    let projection = source_crs
        .projection()
        .ok_or_else(|| Error::UnsupportedCrs(source_crs.identifier()))?;

    let mut features = FeatureCollection::new();
    let mut skipped = 0;
    for (index, doc) in docs.into_iter().enumerate() {
        let Some(mut geometry) = doc.geometry else {
            skipped += 1;
            continue;
        };
        if !source_crs.is_geographic() {
            geometry.map_positions(&mut |p| {
                if p.len() >= 2 {
                    let (lon, lat) = projection.to_wgs84(p[0], p[1]);
                    p[0] = lon;
                    p[1] = lat;
                }
            });
        }

        let id = match doc.id {
            Some(Value::String(s)) if !s.is_empty() => FeatureId::from(s),
            Some(Value::Number(n)) => FeatureId::from(n.to_string()),
            _ => FeatureId::from(format!("feature-{}", index + 1)),
        };
        let properties = normalize_keys(doc.properties.unwrap_or_default());
        features.upsert(VectorFeature::new(id, geometry).with_properties(properties));
    }

    if skipped > 0 {
        warn!(skipped, "dropped GeoJSON features without geometry");
    }
    debug!(count = features.len(), crs = %source_crs, "imported GeoJSON");

    Ok(ImportedGeoJson {
        features,
        source_crs,
        skipped,
    })
}

/// Serialize features as a pretty-printed RFC 7946 `FeatureCollection`.
pub fn export_geojson(features: &FeatureCollection) -> Result<String> {
    Ok(serde_json::to_string_pretty(&collection_doc(features))?)
}

/// The same document as [`export_geojson`], as a JSON value (renderer
/// GeoJSON sources take the data inline).
pub fn geojson_value(features: &FeatureCollection) -> Result<Value> {
    Ok(serde_json::to_value(collection_doc(features))?)
}

fn collection_doc(features: &FeatureCollection) -> CollectionDoc {
    CollectionDoc {
        kind: CollectionTag::FeatureCollection,
        crs: None,
        features: features
            .iter()
            .map(|f| FeatureDoc {
                kind: FeatureTag::Feature,
                id: Some(Value::String(f.id.as_str().to_string())),
                geometry: Some(f.geometry.clone()),
                properties: Some(normalize_keys(f.properties.clone())),
            })
            .collect(),
    }
}

fn crs_from_member(member: &CrsMember) -> Result<CRS> {
    if !member.kind.eq_ignore_ascii_case("name") {
        return Err(Error::UnsupportedCrs(format!("crs type {:?}", member.kind)));
    }
    member
        .properties
        .get("name")
        .and_then(Value::as_str)
        .map(CRS::from_name)
        .ok_or_else(|| Error::InvalidGeoJson("named crs without a name".into()))
}

/// Strip toolkit prefixes; a plain key wins over a prefixed duplicate.
fn normalize_keys(props: Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    let (prefixed, plain): (Vec<_>, Vec<_>) =
        props.into_iter().partition(|(k, _)| k.starts_with(USER_PREFIX));
    for (k, v) in plain {
        out.insert(k, v);
    }
    for (k, v) in prefixed {
        let key = strip_internal_prefix(&k);
        if !key.is_empty() && !out.contains_key(key) {
            out.insert(key.to_string(), v);
        }
    }
    out
}
