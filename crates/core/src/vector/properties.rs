use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Keys owned by the drawing toolkit or the style model.
pub const RESERVED_KEYS: [&str; 8] = [
    "id",
    "meta",
    "active",
    "mode",
    "fillColor",
    "strokeColor",
    "fillOpacity",
    "strokeWidth",
];

/// Prefix the drawing toolkit puts in front of user properties when it
/// copies them onto its render sources.
pub const USER_PREFIX: &str = "user_";

pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// Remove any number of leading `user_` prefixes.
pub fn strip_internal_prefix(key: &str) -> &str {
    let mut key = key;
    while let Some(rest) = key.strip_prefix(USER_PREFIX) {
        key = rest;
    }
    key
}

/// User-defined feature metadata: plain, non-reserved keys mapped to text.
///
/// Keys are normalized and validated on insert, so a value of this type
/// never carries a reserved key or a toolkit prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomProperties(BTreeMap<String, String>);

impl CustomProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from editor rows; rows with a blank key are skipped.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut props = Self::new();
        for (key, value) in pairs {
            if key.as_ref().trim().is_empty() {
                continue;
            }
            props.insert(key.as_ref(), value)?;
        }
        Ok(props)
    }

    /// Read the non-reserved part of a property bag. Non-string values are
    /// kept as their JSON text; prefixed keys are normalized, with a plain
    /// key winning over its prefixed duplicate.
    pub fn from_properties(props: &Map<String, Value>) -> Self {
        let mut out = BTreeMap::new();
        let mut entries: Vec<(&String, &Value)> = props.iter().collect();
        // Plain keys first so they take precedence.
        entries.sort_by_key(|(k, _)| k.starts_with(USER_PREFIX));

        for (raw_key, value) in entries {
            let key = strip_internal_prefix(raw_key.trim());
            if key.is_empty() || is_reserved(key) || out.contains_key(key) {
                continue;
            }
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            out.insert(key.to_string(), text);
        }
        Self(out)
    }

    /// Insert one entry, normalizing the key.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        let key = strip_internal_prefix(key.trim());
        if key.is_empty() {
            return Err(Error::EmptyPropertyKey);
        }
        if is_reserved(key) {
            return Err(Error::ReservedProperty(key.to_string()));
        }
        self.0.insert(key.to_string(), value.into());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Replace every non-reserved key of `props` with these entries.
    pub fn write_to(&self, props: &mut Map<String, Value>) {
        props.retain(|k, _| is_reserved(k));
        for (k, v) in &self.0 {
            props.insert(k.clone(), Value::String(v.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prefix_stripping() {
        assert_eq!(strip_internal_prefix("user_name"), "name");
        assert_eq!(strip_internal_prefix("user_user_name"), "name");
        assert_eq!(strip_internal_prefix("username"), "username");
    }

    #[test]
    fn reserved_keys_are_rejected() {
        let mut props = CustomProperties::new();
        assert!(matches!(
            props.insert("fillColor", "#fff"),
            Err(Error::ReservedProperty(k)) if k == "fillColor"
        ));
        assert!(matches!(
            props.insert("user_meta", "x"),
            Err(Error::ReservedProperty(_))
        ));
        assert!(matches!(props.insert("  ", "x"), Err(Error::EmptyPropertyKey)));
        props.insert("user_owner", "ana").unwrap();
        assert_eq!(props.get("owner"), Some("ana"));
    }

    #[test]
    fn from_properties_skips_reserved_and_normalizes() {
        let bag = json!({
            "id": "abc",
            "fillColor": "#ff0000",
            "user_name": "old",
            "name": "field",
            "area": 12.5,
            "user_crop": "wheat",
        });
        let props = CustomProperties::from_properties(bag.as_object().unwrap());
        assert_eq!(props.len(), 3);
        assert_eq!(props.get("name"), Some("field"));
        assert_eq!(props.get("area"), Some("12.5"));
        assert_eq!(props.get("crop"), Some("wheat"));
    }

    #[test]
    fn write_to_preserves_reserved_keys() {
        let mut bag = json!({"fillColor": "#ff0000", "stale": "x"})
            .as_object()
            .cloned()
            .unwrap();
        let props = CustomProperties::from_pairs([("crop", "rice"), ("", "ignored")]).unwrap();
        props.write_to(&mut bag);
        assert_eq!(
            Value::Object(bag),
            json!({"fillColor": "#ff0000", "crop": "rice"})
        );
    }
}
