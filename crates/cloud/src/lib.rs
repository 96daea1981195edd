//! # geocanvas cloud
//!
//! HTTP collaborators of the geocanvas map client: the upload / processing
//! service, OpenWeatherMap and OpenCage reverse geocoding.
//!
//! The client engine talks to all of them through the traits in [`api`],
//! so tests can swap in scripted fakes.

pub mod api;
pub mod cache;
pub mod error;
pub mod geocode;
pub mod http;
pub mod keys;
pub mod models;
pub mod weather;

pub use api::{GeocodeApi, ProcessingApi, WeatherApi};
pub use error::{CloudError, Result};
pub use geocode::{CachedGeocoder, OpenCageClient};
pub use http::{ServiceClient, ServiceClientOptions};
pub use keys::ObjectKeys;
pub use models::{FetchedObject, ImageInfo, WeatherReport};
pub use weather::OpenWeatherClient;
