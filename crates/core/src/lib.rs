//! # geocanvas core
//!
//! Domain types shared by the geocanvas map client.
//!
//! This crate provides:
//! - `Bounds` / `LngLat`: EPSG:4326 extents and points
//! - `CRS`: coordinate reference system detection and inverse projections
//! - `StyleState` / `FeatureStyleStore`: drawing style model
//! - Vector features and a GeoJSON codec
//! - `paint`: projection of per-feature styles into renderer paint expressions
//!
//! Nothing in here talks to a renderer or the network; every function is a
//! pure transformation over its inputs.

pub mod crs;
pub mod error;
pub mod geodesy;
pub mod geometry;
pub mod paint;
pub mod style;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, Result};
pub use geometry::{Bounds, LngLat};
pub use style::{Color, FeatureStyle, FeatureStyleStore, StyleKey, StyleState};
pub use vector::{FeatureCollection, FeatureId, Geometry, GeometryType, VectorFeature};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::geometry::{Bounds, LngLat};
    pub use crate::paint::{project, DrawLayer, PaintPlan, PaintProperty};
    pub use crate::style::{Color, FeatureStyle, FeatureStyleStore, StyleKey, StyleState};
    pub use crate::vector::{
        CustomProperties, FeatureCollection, FeatureId, Geometry, GeometryType, VectorFeature,
    };
}
