//! Coordinate Reference System handling

mod project;

pub use project::{parse_utm_epsg, utm_to_wgs84, web_mercator_to_wgs84, Projection};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// EPSG code if known
    epsg: Option<u32>,
    /// Identifier as written in the source document, if it was not an EPSG code
    name: Option<String>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            epsg: Some(code),
            name: None,
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Web Mercator (EPSG:3857)
    pub fn web_mercator() -> Self {
        Self::from_epsg(3857)
    }

    /// Parse the `name` of a GeoJSON named CRS member.
    ///
    /// Accepts `EPSG:<code>`, `urn:ogc:def:crs:EPSG::<code>` (with or without
    /// a version segment) and the `CRS84` aliases, which map to EPSG:4326.
    /// Anything else is kept verbatim and reported as unknown.
    pub fn from_name(name: &str) -> Self {
        let trimmed = name.trim();
        let upper = trimmed.to_ascii_uppercase();

        if upper.ends_with("CRS84") {
            return Self::wgs84();
        }

        let code = if let Some(rest) = upper.strip_prefix("EPSG:") {
            rest.parse::<u32>().ok()
        } else if upper.starts_with("URN:OGC:DEF:CRS:EPSG:") {
            upper.rsplit(':').next().and_then(|c| c.parse::<u32>().ok())
        } else {
            None
        };

        match code {
            Some(code) => Self::from_epsg(code),
            None => Self {
                epsg: None,
                name: Some(trimmed.to_string()),
            },
        }
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Whether coordinates in this CRS are already longitude/latitude degrees.
    pub fn is_geographic(&self) -> bool {
        matches!(self.projection(), Some(Projection::Geographic))
    }

    /// The inverse projection to EPSG:4326, if this CRS is supported.
    pub fn projection(&self) -> Option<Projection> {
        self.epsg.and_then(Projection::from_epsg)
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(name) = &self.name {
            return name.clone();
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}
