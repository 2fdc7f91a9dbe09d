//! Geometric helper functions for rectangle algebra in the support plane.
//!
//! Support surfaces, item footprints and the cut algebra of the surface
//! manager all operate on axis-aligned rectangles in the XY plane.

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in the XY plane.
///
/// Invariant for non-degenerate rectangles: `x_min < x_max` and
/// `y_min < y_max`. Serializes as `(x_min, y_min, x_max, y_max)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(into = "(f64, f64, f64, f64)", from = "(f64, f64, f64, f64)")]
pub struct Rect {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl Rect {
    #[inline]
    pub const fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Checks that the rectangle has positive extent on both axes.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.x_min < self.x_max && self.y_min < self.y_max
    }

    /// Calculates the area; degenerate rectangles have area 0.
    #[inline]
    pub fn area(&self) -> f64 {
        if !self.is_valid() {
            return 0.0;
        }
        (self.x_max - self.x_min) * (self.y_max - self.y_min)
    }

    /// Calculates the intersection area of two rectangles.
    #[inline]
    pub fn intersection_area(&self, other: &Self) -> f64 {
        let w = overlap_1d(self.x_min, self.x_max, other.x_min, other.x_max);
        let h = overlap_1d(self.y_min, self.y_max, other.y_min, other.y_max);
        w * h
    }

    /// Clips `other` against this rectangle.
    ///
    /// The result may be degenerate when the rectangles do not intersect;
    /// callers check `is_valid` before using it.
    #[inline]
    pub fn clip(&self, other: &Self) -> Self {
        Self::new(
            self.x_min.max(other.x_min),
            self.y_min.max(other.y_min),
            self.x_max.min(other.x_max),
            self.y_max.min(other.y_max),
        )
    }

    /// Checks if `inner` is completely contained within this rectangle.
    #[inline]
    pub fn contains(&self, inner: &Self) -> bool {
        inner.x_min >= self.x_min
            && inner.y_min >= self.y_min
            && inner.x_max <= self.x_max
            && inner.y_max <= self.y_max
    }
}

impl From<(f64, f64, f64, f64)> for Rect {
    #[inline]
    fn from(t: (f64, f64, f64, f64)) -> Self {
        Self::new(t.0, t.1, t.2, t.3)
    }
}

impl From<Rect> for (f64, f64, f64, f64) {
    #[inline]
    fn from(r: Rect) -> Self {
        (r.x_min, r.y_min, r.x_max, r.y_max)
    }
}

/// Calculates the overlap of two intervals in one dimension.
///
/// # Example
/// ```ignore
/// let overlap = overlap_1d(0.0, 5.0, 3.0, 8.0); // Result: 2.0
/// let no_overlap = overlap_1d(0.0, 3.0, 5.0, 8.0); // Result: 0.0
/// ```
#[inline]
pub fn overlap_1d(a1: f64, a2: f64, b1: f64, b2: f64) -> f64 {
    (a2.min(b2) - a1.max(b1)).max(0.0)
}
