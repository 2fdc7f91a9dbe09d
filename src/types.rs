//! Common geometric types shared across the packing core.
//!
//! Positions, dimensions and bounding volumes are all expressed through
//! [`Vec3`]; every floating-point comparison in the crate goes through the
//! shared [`EPSILON_GENERAL`] tolerance.

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

/// Global numerical tolerance for floating-point comparisons.
pub const EPSILON_GENERAL: f64 = 1e-6;

/// Represents a 3D vector or point in space.
///
/// Used for positions, dimensions, and calculations in 3D space.
/// Serializes as a plain `(x, y, z)` tuple for the API boundary.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(into = "(f64, f64, f64)", from = "(f64, f64, f64)")]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Creates a new 3D vector.
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Creates a zero vector (origin).
    #[inline]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Converts to tuple format for API compatibility.
    #[inline]
    pub const fn as_tuple(&self) -> (f64, f64, f64) {
        (self.x, self.y, self.z)
    }

    /// Creates from tuple format.
    #[inline]
    pub const fn from_tuple(tuple: (f64, f64, f64)) -> Self {
        Self::new(tuple.0, tuple.1, tuple.2)
    }

    /// Calculates the volume (product of all components).
    ///
    /// Useful for dimension vectors.
    #[inline]
    pub fn volume(&self) -> f64 {
        self.x * self.y * self.z
    }

    /// Calculates the base area (X × Y product).
    #[inline]
    pub fn base_area(&self) -> f64 {
        self.x * self.y
    }

    /// Checks if all components are positive and finite.
    #[inline]
    pub fn is_valid_dimension(&self) -> bool {
        self.x > 0.0
            && self.y > 0.0
            && self.z > 0.0
            && self.x.is_finite()
            && self.y.is_finite()
            && self.z.is_finite()
    }

    /// Checks if the vector fits within another vector (component-wise <=).
    #[inline]
    pub fn fits_within(&self, container: &Self, tolerance: f64) -> bool {
        self.x <= container.x + tolerance
            && self.y <= container.y + tolerance
            && self.z <= container.z + tolerance
    }

    /// Lexicographic ordering key as (z, y, x), ascending.
    ///
    /// This is the bottom-left-floor-first scan order used by the anchor
    /// generators.
    #[inline]
    pub fn cmp_zyx(&self, other: &Self) -> std::cmp::Ordering {
        self.z
            .total_cmp(&other.z)
            .then(self.y.total_cmp(&other.y))
            .then(self.x.total_cmp(&other.x))
    }
}

impl Add for Vec3 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;

    #[inline]
    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

impl From<(f64, f64, f64)> for Vec3 {
    #[inline]
    fn from(tuple: (f64, f64, f64)) -> Self {
        Self::from_tuple(tuple)
    }
}

impl From<Vec3> for (f64, f64, f64) {
    #[inline]
    fn from(vec: Vec3) -> Self {
        vec.as_tuple()
    }
}

/// Represents an Axis-Aligned Bounding Box (AABB).
///
/// Used for collision detection along the insertion paths and for the
/// non-overlap invariant of packed items.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner (position)
    pub min: Vec3,
    /// Maximum corner (position + dimensions)
    pub max: Vec3,
}

impl BoundingBox {
    /// Creates a new bounding box.
    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Creates a bounding box from position and dimensions.
    #[inline]
    pub fn from_position_and_dims(position: Vec3, dims: Vec3) -> Self {
        Self {
            min: position,
            max: position + dims,
        }
    }

    /// Checks whether two bounding boxes overlap by more than `tolerance`
    /// on every axis.
    ///
    /// Boxes that merely share a face or an edge do not count as
    /// overlapping.
    #[inline]
    pub fn overlaps(&self, other: &Self, tolerance: f64) -> bool {
        self.min.x < other.max.x - tolerance
            && self.max.x > other.min.x + tolerance
            && self.min.y < other.max.y - tolerance
            && self.max.y > other.min.y + tolerance
            && self.min.z < other.max.z - tolerance
            && self.max.z > other.min.z + tolerance
    }

    /// Checks whether a point lies inside the box, where the lower faces
    /// count as inside and the upper faces do not.
    ///
    /// An anchor sitting on an item's lower corner is occupied by that
    /// item, while anchors on its upper faces remain usable.
    #[inline]
    pub fn contains_point_lower_closed(&self, point: &Vec3, tolerance: f64) -> bool {
        point.x > self.min.x - tolerance
            && point.x < self.max.x - tolerance
            && point.y > self.min.y - tolerance
            && point.y < self.max.y - tolerance
            && point.z > self.min.z - tolerance
            && point.z < self.max.z - tolerance
    }

    /// Returns the center point.
    #[inline]
    pub fn center(&self) -> Vec3 {
        Vec3::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
            (self.min.z + self.max.z) / 2.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);

        assert_eq!(a + b, Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(b - a, Vec3::new(3.0, 3.0, 3.0));
        assert_eq!(a * 2.0, Vec3::new(2.0, 4.0, 6.0));
    }

    #[test]
    fn test_vec3_volume_and_area() {
        let dims = Vec3::new(10.0, 20.0, 30.0);
        assert!((dims.volume() - 6000.0).abs() < EPSILON_GENERAL);
        assert!((dims.base_area() - 200.0).abs() < EPSILON_GENERAL);
    }

    #[test]
    fn test_vec3_fits_within() {
        let small = Vec3::new(5.0, 5.0, 5.0);
        let large = Vec3::new(10.0, 10.0, 10.0);

        assert!(small.fits_within(&large, EPSILON_GENERAL));
        assert!(!large.fits_within(&small, EPSILON_GENERAL));
    }

    #[test]
    fn test_zyx_ordering() {
        let mut points = vec![
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::new(5.0, 0.0, 0.0),
            Vec3::new(0.0, 5.0, 0.0),
        ];
        points.sort_by(Vec3::cmp_zyx);
        assert_eq!(points[0], Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(points[1], Vec3::new(0.0, 5.0, 0.0));
        assert_eq!(points[2], Vec3::new(0.0, 0.0, 5.0));
    }

    #[test]
    fn test_bounding_box_overlaps() {
        let a = BoundingBox::from_position_and_dims(Vec3::zero(), Vec3::new(10.0, 10.0, 10.0));
        let b = BoundingBox::from_position_and_dims(
            Vec3::new(5.0, 5.0, 5.0),
            Vec3::new(10.0, 10.0, 10.0),
        );
        let touching = BoundingBox::from_position_and_dims(
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(10.0, 10.0, 10.0),
        );

        assert!(a.overlaps(&b, EPSILON_GENERAL));
        // Sharing a face is not an overlap.
        assert!(!a.overlaps(&touching, EPSILON_GENERAL));
    }

    #[test]
    fn test_contains_point_lower_closed() {
        let bb = BoundingBox::from_position_and_dims(Vec3::zero(), Vec3::new(10.0, 10.0, 10.0));

        assert!(bb.contains_point_lower_closed(&Vec3::new(5.0, 5.0, 5.0), EPSILON_GENERAL));
        // The lower corner counts as occupied ...
        assert!(bb.contains_point_lower_closed(&Vec3::zero(), EPSILON_GENERAL));
        // ... but the upper faces do not.
        assert!(!bb.contains_point_lower_closed(&Vec3::new(10.0, 0.0, 0.0), EPSILON_GENERAL));
        assert!(!bb.contains_point_lower_closed(&Vec3::new(0.0, 0.0, 10.0), EPSILON_GENERAL));
    }
}
