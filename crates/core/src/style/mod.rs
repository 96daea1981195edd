//! Drawing style model.
//!
//! [`StyleState`] is the style currently picked by the user; it stamps
//! defaults onto new features and is the fallback in compiled paint
//! expressions. [`FeatureStyle`] is the (possibly partial) style stored in a
//! feature's property bag.

mod store;

pub use store::FeatureStyleStore;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// A validated CSS hex color, normalized to lowercase `#rrggbb`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(String);

impl Color {
    /// Parse `#rgb` or `#rrggbb` (case-insensitive).
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let hex = trimmed
            .strip_prefix('#')
            .filter(|h| h.chars().all(|c| c.is_ascii_hexdigit()))
            .ok_or_else(|| Error::InvalidColor(input.to_string()))?;

        let expanded = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect::<String>(),
            6 => hex.to_string(),
            _ => return Err(Error::InvalidColor(input.to_string())),
        };
        Ok(Self(format!("#{}", expanded.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Color {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Color {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The four style attributes every drawn feature carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleKey {
    FillColor,
    StrokeColor,
    FillOpacity,
    StrokeWidth,
}

impl StyleKey {
    pub const ALL: [StyleKey; 4] = [
        Self::FillColor,
        Self::StrokeColor,
        Self::FillOpacity,
        Self::StrokeWidth,
    ];

    /// Property key as stored in the feature's attribute map.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FillColor => "fillColor",
            Self::StrokeColor => "strokeColor",
            Self::FillOpacity => "fillOpacity",
            Self::StrokeWidth => "strokeWidth",
        }
    }
}

/// The style currently selected in the style picker.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleState {
    fill_color: Color,
    stroke_color: Color,
    fill_opacity: f64,
    stroke_width: f64,
}

impl Default for StyleState {
    fn default() -> Self {
        Self {
            fill_color: Color("#ff0000".into()),
            stroke_color: Color("#000000".into()),
            fill_opacity: 0.5,
            stroke_width: 2.0,
        }
    }
}

impl StyleState {
    pub fn fill_color(&self) -> &Color {
        &self.fill_color
    }

    pub fn stroke_color(&self) -> &Color {
        &self.stroke_color
    }

    pub fn fill_opacity(&self) -> f64 {
        self.fill_opacity
    }

    pub fn stroke_width(&self) -> f64 {
        self.stroke_width
    }

    pub fn set_fill_color(&mut self, color: Color) {
        self.fill_color = color;
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        self.stroke_color = color;
    }

    /// Set fill opacity; must lie in `[0, 1]`.
    pub fn set_fill_opacity(&mut self, opacity: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&opacity) {
            return Err(Error::InvalidParameter {
                name: "fill_opacity",
                value: opacity.to_string(),
                reason: "must be within [0, 1]".into(),
            });
        }
        self.fill_opacity = opacity;
        Ok(())
    }

    /// Set stroke width in pixels; must be finite and non-negative.
    pub fn set_stroke_width(&mut self, width: f64) -> Result<()> {
        if !width.is_finite() || width < 0.0 {
            return Err(Error::InvalidParameter {
                name: "stroke_width",
                value: width.to_string(),
                reason: "must be a finite, non-negative number".into(),
            });
        }
        self.stroke_width = width;
        Ok(())
    }

    /// The default value for one style attribute, as a JSON value.
    pub fn value(&self, key: StyleKey) -> Value {
        match key {
            StyleKey::FillColor => Value::from(self.fill_color.as_str()),
            StyleKey::StrokeColor => Value::from(self.stroke_color.as_str()),
            StyleKey::FillOpacity => Value::from(self.fill_opacity),
            StyleKey::StrokeWidth => Value::from(self.stroke_width),
        }
    }

    /// A fully-populated feature style carrying the current selection.
    pub fn to_feature_style(&self) -> FeatureStyle {
        FeatureStyle {
            fill_color: Some(self.fill_color.clone()),
            stroke_color: Some(self.stroke_color.clone()),
            fill_opacity: Some(self.fill_opacity),
            stroke_width: Some(self.stroke_width),
        }
    }
}

/// Per-feature style as found in a feature's attribute map.
///
/// Every field is optional: features imported from elsewhere, or mutated by
/// the drawing toolkit, may lack some of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
}

impl FeatureStyle {
    /// Read style attributes from a property bag.
    ///
    /// Values that do not parse (bad colors, non-numeric widths) are treated
    /// as absent. Numbers stored as strings, which is what form inputs
    /// produce, are accepted.
    pub fn from_properties(props: &Map<String, Value>) -> Self {
        let color = |key: StyleKey| {
            props
                .get(key.as_str())
                .and_then(Value::as_str)
                .and_then(|s| Color::parse(s).ok())
        };
        let number = |key: StyleKey| {
            props.get(key.as_str()).and_then(|v| match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            })
        };

        Self {
            fill_color: color(StyleKey::FillColor),
            stroke_color: color(StyleKey::StrokeColor),
            fill_opacity: number(StyleKey::FillOpacity).filter(|v| (0.0..=1.0).contains(v)),
            stroke_width: number(StyleKey::StrokeWidth).filter(|v| v.is_finite() && *v >= 0.0),
        }
    }

    /// Whether every attribute is present.
    pub fn is_complete(&self) -> bool {
        self.fill_color.is_some()
            && self.stroke_color.is_some()
            && self.fill_opacity.is_some()
            && self.stroke_width.is_some()
    }

    /// Fill any missing attribute from `fallback`.
    pub fn or(self, fallback: &FeatureStyle) -> FeatureStyle {
        FeatureStyle {
            fill_color: self.fill_color.or_else(|| fallback.fill_color.clone()),
            stroke_color: self.stroke_color.or_else(|| fallback.stroke_color.clone()),
            fill_opacity: self.fill_opacity.or(fallback.fill_opacity),
            stroke_width: self.stroke_width.or(fallback.stroke_width),
        }
    }

    /// Fill any missing attribute from the current style selection.
    pub fn resolve(self, defaults: &StyleState) -> FeatureStyle {
        self.or(&defaults.to_feature_style())
    }

    /// The stored value for one attribute, if present.
    pub fn value(&self, key: StyleKey) -> Option<Value> {
        match key {
            StyleKey::FillColor => self.fill_color.as_ref().map(|c| Value::from(c.as_str())),
            StyleKey::StrokeColor => self.stroke_color.as_ref().map(|c| Value::from(c.as_str())),
            StyleKey::FillOpacity => self.fill_opacity.map(Value::from),
            StyleKey::StrokeWidth => self.stroke_width.map(Value::from),
        }
    }

    /// Write every present attribute into a property bag.
    pub fn write_to(&self, props: &mut Map<String, Value>) {
        for key in StyleKey::ALL {
            if let Some(value) = self.value(key) {
                props.insert(key.as_str().to_string(), value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn color_parsing() {
        assert_eq!(Color::parse("#FF0000").unwrap().as_str(), "#ff0000");
        assert_eq!(Color::parse("#0f8").unwrap().as_str(), "#00ff88");
        assert!(Color::parse("red").is_err());
        assert!(Color::parse("#12345").is_err());
        assert!(Color::parse("#gg0000").is_err());
    }

    #[test]
    fn defaults_match_picker_initial_values() {
        let style = StyleState::default();
        assert_eq!(style.fill_color().as_str(), "#ff0000");
        assert_eq!(style.stroke_color().as_str(), "#000000");
        assert_eq!(style.fill_opacity(), 0.5);
        assert_eq!(style.stroke_width(), 2.0);
        assert!(style.to_feature_style().is_complete());
    }

    #[test]
    fn setters_validate() {
        let mut style = StyleState::default();
        assert!(style.set_fill_opacity(1.5).is_err());
        assert!(style.set_fill_opacity(f64::NAN).is_err());
        assert!(style.set_stroke_width(-1.0).is_err());
        style.set_fill_opacity(0.2).unwrap();
        style.set_stroke_width(4.0).unwrap();
        assert_eq!(style.value(StyleKey::FillOpacity), json!(0.2));
        assert_eq!(style.value(StyleKey::StrokeWidth), json!(4.0));
    }

    #[test]
    fn feature_style_reads_lenient_values() {
        let props = json!({
            "fillColor": "#00F",
            "strokeColor": "not-a-color",
            "fillOpacity": "0.25",
            "strokeWidth": 3,
        });
        let style = FeatureStyle::from_properties(props.as_object().unwrap());
        assert_eq!(style.fill_color.as_ref().map(Color::as_str), Some("#0000ff"));
        assert!(style.stroke_color.is_none());
        assert_eq!(style.fill_opacity, Some(0.25));
        assert_eq!(style.stroke_width, Some(3.0));
        assert!(!style.is_complete());

        let resolved = style.resolve(&StyleState::default());
        assert!(resolved.is_complete());
        assert_eq!(resolved.stroke_color.unwrap().as_str(), "#000000");
    }

    #[test]
    fn write_to_uses_plain_keys() {
        let mut props = Map::new();
        StyleState::default().to_feature_style().write_to(&mut props);
        assert_eq!(
            Value::Object(props),
            json!({
                "fillColor": "#ff0000",
                "strokeColor": "#000000",
                "fillOpacity": 0.5,
                "strokeWidth": 2.0,
            })
        );
    }
}
