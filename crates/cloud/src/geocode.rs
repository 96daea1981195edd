//! OpenCage reverse-geocoding client, plus an LRU-cached wrapper.

use std::cell::RefCell;

use reqwest::Client;
use tracing::debug;

use crate::api::GeocodeApi;
use crate::cache::{PlaceCache, PlaceKey};
use crate::error::{CloudError, Result};
use crate::http::{build_client, ServiceClientOptions};
use crate::models::GeocodeResponse;

pub const OPENCAGE_BASE_URL: &str = "https://api.opencagedata.com";

pub struct OpenCageClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenCageClient {
    pub fn new(api_key: impl Into<String>, options: &ServiceClientOptions) -> Result<Self> {
        Ok(Self {
            client: build_client(options)?,
            base_url: OPENCAGE_BASE_URL.to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

impl GeocodeApi for OpenCageClient {
    async fn reverse_geocode(&self, lat: f64, lon: f64) -> Result<Option<String>> {
        // `q=<lat>+<lon>`: the space is form-encoded as `+`.
        let resp = self
            .client
            .get(format!("{}/geocode/v1/json", self.base_url))
            .query(&[("q", format!("{lat} {lon}")), ("key", self.api_key.clone())])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(CloudError::status(resp.status()));
        }
        let body: GeocodeResponse = resp
            .json()
            .await
            .map_err(|e| CloudError::Parse(format!("geocode response: {e}")))?;
        Ok(body.first_place().map(str::to_string))
    }
}

/// Reverse geocoder that remembers answers for nearby coordinates.
///
/// Only successful lookups are cached; failures are retried next time.
pub struct CachedGeocoder<G> {
    inner: G,
    cache: RefCell<PlaceCache>,
}

impl<G: GeocodeApi> CachedGeocoder<G> {
    pub fn new(inner: G, capacity: usize) -> Self {
        Self {
            inner,
            cache: RefCell::new(PlaceCache::new(capacity)),
        }
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    pub fn cached_len(&self) -> usize {
        self.cache.borrow().len()
    }
}

impl<G: GeocodeApi> GeocodeApi for CachedGeocoder<G> {
    async fn reverse_geocode(&self, lat: f64, lon: f64) -> Result<Option<String>> {
        let key = PlaceKey::new(lat, lon);
        if let Some(hit) = self.cache.borrow_mut().get(&key) {
            debug!(lat, lon, "geocode cache hit");
            return Ok(hit.clone());
        }

        let place = self.inner.reverse_geocode(lat, lon).await?;
        self.cache.borrow_mut().insert(key, place.clone());
        Ok(place)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct CountingGeocoder {
        calls: Cell<usize>,
    }

    impl GeocodeApi for CountingGeocoder {
        async fn reverse_geocode(&self, lat: f64, _lon: f64) -> Result<Option<String>> {
            self.calls.set(self.calls.get() + 1);
            if lat > 80.0 {
                return Err(CloudError::Network("unreachable".into()));
            }
            Ok(Some(format!("place near {lat:.1}")))
        }
    }

    #[tokio::test]
    async fn nearby_lookups_hit_the_cache() {
        let geocoder = CachedGeocoder::new(CountingGeocoder { calls: Cell::new(0) }, 8);
        let a = geocoder.reverse_geocode(38.72231, -9.13931).await.unwrap();
        let b = geocoder.reverse_geocode(38.72233, -9.13933).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(geocoder.inner().calls.get(), 1);
        assert_eq!(geocoder.cached_len(), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let geocoder = CachedGeocoder::new(CountingGeocoder { calls: Cell::new(0) }, 8);
        assert!(geocoder.reverse_geocode(85.0, 0.0).await.is_err());
        assert!(geocoder.reverse_geocode(85.0, 0.0).await.is_err());
        assert_eq!(geocoder.inner().calls.get(), 2);
        assert_eq!(geocoder.cached_len(), 0);
    }
}
