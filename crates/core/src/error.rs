//! Error types for geocanvas core

use thiserror::Error;

/// Main error type for core operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid GeoJSON: {0}")]
    InvalidGeoJson(String),

    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),

    #[error("Invalid color {0:?}: expected #rgb or #rrggbb")]
    InvalidColor(String),

    #[error("Property key {0:?} is reserved and cannot be edited")]
    ReservedProperty(String),

    #[error("Property key must not be empty")]
    EmptyPropertyKey,

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;
