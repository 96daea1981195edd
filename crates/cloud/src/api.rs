//! Seams between the client engine and its remote collaborators.
//!
//! The engine is single-threaded, so none of these futures need to be
//! `Send`. Tests substitute scripted in-memory implementations.

#![allow(async_fn_in_trait)]

use crate::error::Result;
use crate::models::{FetchedObject, ImageInfo, WeatherReport};

/// The remote upload / processing service.
pub trait ProcessingApi {
    /// Obtain a presigned PUT URL for `object_key`.
    async fn presign_upload(&self, object_key: &str) -> Result<String>;

    /// PUT raw bytes to a presigned URL.
    async fn put_object(&self, url: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;

    /// Reprojected PNG for an upload; `Ok(None)` while it is not ready.
    async fn processed_image_info(&self, png_key: &str) -> Result<Option<ImageInfo>>;

    /// Start classification of an uploaded image.
    async fn invoke_segmentation(&self, image_key: &str) -> Result<()>;

    /// Classified PNG; `Ok(None)` while it is not ready.
    async fn segmented_image_info(&self, segment_key: &str) -> Result<Option<ImageInfo>>;

    /// Convert an object to GeoTIFF and return a download URL.
    async fn export_tiff(&self, object_key: &str) -> Result<String>;

    /// Download a file referenced by URL.
    async fn fetch(&self, url: &str) -> Result<FetchedObject>;
}

/// Current-weather lookup.
pub trait WeatherApi {
    async fn current_weather(&self, lat: f64, lon: f64) -> Result<WeatherReport>;
}

/// Reverse geocoding; `Ok(None)` when nothing is known at the point.
pub trait GeocodeApi {
    async fn reverse_geocode(&self, lat: f64, lon: f64) -> Result<Option<String>>;
}
