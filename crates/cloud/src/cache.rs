//! LRU cache for reverse-geocoded place names.

use lru::LruCache;
use std::num::NonZeroUsize;

/// Coordinates rounded to 1e-4 degrees (about 11 m at the equator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaceKey {
    lat_e4: i64,
    lon_e4: i64,
}

impl PlaceKey {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat_e4: (lat * 1e4).round() as i64,
            lon_e4: (lon * 1e4).round() as i64,
        }
    }
}

/// LRU cache of lookup answers; `None` records "nothing found here".
pub struct PlaceCache {
    inner: LruCache<PlaceKey, Option<String>>,
}

impl PlaceCache {
    /// Create a new cache holding at most `capacity` places.
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: LruCache::new(cap),
        }
    }

    pub fn get(&mut self, key: &PlaceKey) -> Option<&Option<String>> {
        self.inner.get(key)
    }

    pub fn insert(&mut self, key: PlaceKey, place: Option<String>) {
        self.inner.put(key, place);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }
}
