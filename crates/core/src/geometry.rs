//! Geographic points and axis-aligned extents in EPSG:4326 degrees.

use serde::{Deserialize, Serialize};

/// A longitude/latitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// Great-circle distance to `other` in kilometres.
    pub fn distance_km(&self, other: &LngLat) -> f64 {
        crate::geodesy::haversine_distance_km(self.lat, self.lng, other.lat, other.lng)
    }
}

/// Geographic bounds of an image overlay, as returned by the processing
/// service: `{top, left, bottom, right}` in degrees.
///
/// The client treats this as an opaque axis-aligned quadrilateral; it never
/// reasons about the pixels inside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub top: f64,
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
}

impl Bounds {
    pub const fn new(top: f64, left: f64, bottom: f64, right: f64) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
        }
    }

    /// Build bounds from a `(min_x, min_y, max_x, max_y)` extent.
    pub fn from_extent(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self::new(max_y, min_x, min_y, max_x)
    }

    /// Smallest bounds enclosing every `[lng, lat, ..]` position, or `None`
    /// when the iterator yields no usable position.
    pub fn enclosing<'a>(positions: impl IntoIterator<Item = &'a [f64]>) -> Option<Self> {
        let mut acc: Option<Bounds> = None;
        for pos in positions {
            let (Some(&x), Some(&y)) = (pos.first(), pos.get(1)) else {
                continue;
            };
            if !x.is_finite() || !y.is_finite() {
                continue;
            }
            acc = Some(match acc {
                None => Bounds::new(y, x, y, x),
                Some(b) => b.including(x, y),
            });
        }
        acc
    }

    /// Copy of these bounds grown to include `(lng, lat)`.
    pub fn including(&self, lng: f64, lat: f64) -> Self {
        Self {
            top: self.top.max(lat),
            left: self.left.min(lng),
            bottom: self.bottom.min(lat),
            right: self.right.max(lng),
        }
    }

    /// Union of two bounds.
    pub fn union(&self, other: &Bounds) -> Self {
        Self {
            top: self.top.max(other.top),
            left: self.left.min(other.left),
            bottom: self.bottom.min(other.bottom),
            right: self.right.max(other.right),
        }
    }

    /// Centre of the rectangle.
    pub fn centroid(&self) -> LngLat {
        LngLat::new((self.left + self.right) / 2.0, (self.top + self.bottom) / 2.0)
    }

    /// Corner coordinates in the order image sources expect:
    /// top-left, top-right, bottom-right, bottom-left.
    pub fn image_corners(&self) -> [[f64; 2]; 4] {
        [
            [self.left, self.top],
            [self.right, self.top],
            [self.right, self.bottom],
            [self.left, self.bottom],
        ]
    }

    /// South-west / north-east pair used for camera fitting.
    pub fn fit_box(&self) -> [[f64; 2]; 2] {
        [[self.left, self.bottom], [self.right, self.top]]
    }

    /// Whether all edges are finite and the rectangle is not inverted.
    pub fn is_valid(&self) -> bool {
        [self.top, self.left, self.bottom, self.right]
            .iter()
            .all(|v| v.is_finite())
            && self.top >= self.bottom
            && self.right >= self.left
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centroid_and_corners() {
        let b = Bounds::new(10.0, -10.0, 0.0, 10.0);
        assert_eq!(b.centroid(), LngLat::new(0.0, 5.0));
        assert_eq!(
            b.image_corners(),
            [[-10.0, 10.0], [10.0, 10.0], [10.0, 0.0], [-10.0, 0.0]]
        );
        assert_eq!(b.fit_box(), [[-10.0, 0.0], [10.0, 10.0]]);
        assert!(b.is_valid());
    }

    #[test]
    fn enclosing_skips_short_positions() {
        let pts: Vec<Vec<f64>> = vec![vec![1.0, 2.0], vec![5.0], vec![-3.0, 7.0, 100.0]];
        let b = Bounds::enclosing(pts.iter().map(|p| p.as_slice())).unwrap();
        assert_eq!(b, Bounds::new(7.0, -3.0, 2.0, 1.0));

        let empty: Vec<Vec<f64>> = Vec::new();
        assert!(Bounds::enclosing(empty.iter().map(|p| p.as_slice())).is_none());
    }

    #[test]
    fn inverted_bounds_are_invalid() {
        assert!(!Bounds::new(0.0, 0.0, 1.0, 1.0).is_valid());
        assert!(!Bounds::new(f64::NAN, 0.0, 0.0, 1.0).is_valid());
    }
}
