//! Response models for the processing service and the third-party APIs.

use geocanvas_core::Bounds;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CloudError, Result};

// ---------------------------------------------------------------------------
// Processing service
// ---------------------------------------------------------------------------

/// Every processing endpoint answers either with its payload or with
/// `{"error": ...}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ServiceReply<T> {
    Error { error: Value },
    Ok(T),
}

impl<T> ServiceReply<T> {
    pub fn into_result(self) -> Result<T> {
        match self {
            Self::Ok(v) => Ok(v),
            Self::Error { error } => Err(CloudError::Service(error_text(&error))),
        }
    }
}

fn error_text(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `GET /generate-presigned-url`
#[derive(Debug, Clone, Deserialize)]
pub struct PresignedUrl {
    pub url: String,
    #[serde(default)]
    pub object_name: Option<String>,
}

/// `GET /get-processed-image-info` and `GET /get-segmented-image-info`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub png_url: String,
    pub bounds: Bounds,
}

/// `POST /export-tiff`
#[derive(Debug, Clone, Deserialize)]
pub struct TiffExport {
    pub tiff_url: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SegmentationRequest<'a> {
    pub image_key: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExportRequest<'a> {
    pub s3_key: &'a str,
}

/// A file fetched from a URL reference.
#[derive(Debug, Clone)]
pub struct FetchedObject {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

// ---------------------------------------------------------------------------
// Weather
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherResponse {
    #[serde(default)]
    pub name: String,
    pub main: WeatherMain,
    #[serde(default)]
    pub weather: Vec<WeatherCondition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherMain {
    pub temp: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherCondition {
    pub description: String,
    pub icon: String,
}

/// Current conditions at a point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherReport {
    pub location: String,
    /// Degrees Celsius.
    pub temperature: f64,
    pub description: String,
    pub icon: Option<String>,
}

impl WeatherReport {
    pub fn icon_url(&self) -> Option<String> {
        self.icon
            .as_ref()
            .map(|icon| format!("https://openweathermap.org/img/wn/{icon}.png"))
    }
}

impl From<WeatherResponse> for WeatherReport {
    fn from(resp: WeatherResponse) -> Self {
        let condition = resp.weather.into_iter().next();
        Self {
            location: resp.name,
            temperature: resp.main.temp,
            description: condition
                .as_ref()
                .map(|c| c.description.clone())
                .unwrap_or_default(),
            icon: condition.map(|c| c.icon),
        }
    }
}

// ---------------------------------------------------------------------------
// Reverse geocoding
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct GeocodeResponse {
    #[serde(default)]
    pub results: Vec<GeocodeResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeocodeResult {
    pub formatted: String,
}

impl GeocodeResponse {
    pub fn first_place(&self) -> Option<&str> {
        self.results
            .first()
            .map(|r| r.formatted.as_str())
            .filter(|s| !s.trim().is_empty())
    }
}
