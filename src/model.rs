//! Data models for the cage packing core.
//!
//! This module defines the fundamental data structures of the decision
//! core:
//! - `Item`: a physical box on the conveyor, with measurement-error
//!   inflated dimensions and the six axis-aligned orientations
//! - `SupportSurface`: a horizontal rectangle items may rest on
//! - `CageTrolley`: the cage being packed, with weight bookkeeping,
//!   support surfaces and corner points

use serde::Serialize;
use thiserror::Error;

use crate::geometry::Rect;
use crate::types::{BoundingBox, Vec3};

/// Number of axis-aligned orientations of a box.
pub const NUM_ROTATIONS: u8 = 6;

/// Validation error for item and cage input data.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("{name} must be positive and finite, got ({x}, {y}, {z})")]
    InvalidDimensions {
        name: &'static str,
        x: f64,
        y: f64,
        z: f64,
    },

    #[error("weight must be positive and finite, got {0}")]
    InvalidWeight(f64),

    #[error("allowed_rotations must be a non-empty subset of 0..=5, got {0:?}")]
    InvalidRotationSet(Vec<u8>),
}

/// Internal inconsistency of the packing state.
///
/// These are not recoverable within a session; the session must be reset.
#[derive(Debug, Error)]
pub enum PackError {
    #[error("item {0} is committed without a position")]
    MissingPlacement(u64),
}

fn validate_dimensions(name: &'static str, dims: Vec3) -> Result<(), ValidationError> {
    if dims.is_valid_dimension() {
        Ok(())
    } else {
        Err(ValidationError::InvalidDimensions {
            name,
            x: dims.x,
            y: dims.y,
            z: dims.z,
        })
    }
}

fn validate_weight(value: f64) -> Result<(), ValidationError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::InvalidWeight(value))
    }
}

/// Position and orientation an item received when it was committed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ItemPlacement {
    /// Bottom-left-floor corner inside the cage.
    pub position: Vec3,
    /// Rotation type, one of 0..=5.
    pub rotation: u8,
}

/// A physical box to be packed.
///
/// All feasibility math uses `calc_dimensions`, the base dimensions
/// inflated by the measurement-error constant of the vision system.
/// `placement` stays `None` until the item is committed to a cage.
#[derive(Clone, Debug, Serialize)]
pub struct Item {
    pub id: u64,
    /// Measured dimensions (l, w, h) in cm.
    pub base_dimensions: Vec3,
    pub weight: f64,
    /// Non-empty subset of the rotation types 0..=5.
    pub allowed_rotations: Vec<u8>,
    /// Fragile items must not be stacked upon.
    pub is_fragile: bool,
    /// Base dimensions plus measurement error, derived once.
    pub calc_dimensions: Vec3,
    pub placement: Option<ItemPlacement>,
}

impl Item {
    /// Creates a new item with validation.
    ///
    /// `measurement_error` is added to every base dimension to absorb the
    /// inaccuracy of the vision measurement.
    pub fn new(
        id: u64,
        base_dimensions: Vec3,
        weight: f64,
        allowed_rotations: Vec<u8>,
        is_fragile: bool,
        measurement_error: f64,
    ) -> Result<Self, ValidationError> {
        validate_dimensions("item dimensions", base_dimensions)?;
        validate_weight(weight)?;
        if allowed_rotations.is_empty()
            || allowed_rotations.iter().any(|&r| r >= NUM_ROTATIONS)
        {
            return Err(ValidationError::InvalidRotationSet(allowed_rotations));
        }

        let eps = Vec3::new(measurement_error, measurement_error, measurement_error);
        Ok(Self {
            id,
            base_dimensions,
            weight,
            allowed_rotations,
            is_fragile,
            calc_dimensions: base_dimensions + eps,
            placement: None,
        })
    }

    /// Returns the calculation dimensions under the given rotation type.
    ///
    /// The six orientations are the fixed permutation table of (l, w, h):
    /// 0:(l,w,h) 1:(w,l,h) 2:(l,h,w) 3:(h,l,w) 4:(w,h,l) 5:(h,w,l).
    ///
    /// # Panics
    /// Panics on a rotation type outside 0..=5. Rotation indices are
    /// validated at every input boundary, so this is an assertion on
    /// internal consistency.
    pub fn rotated_dims(&self, rotation: u8) -> Vec3 {
        let Vec3 { x: l, y: w, z: h } = self.calc_dimensions;
        match rotation {
            0 => Vec3::new(l, w, h),
            1 => Vec3::new(w, l, h),
            2 => Vec3::new(l, h, w),
            3 => Vec3::new(h, l, w),
            4 => Vec3::new(w, h, l),
            5 => Vec3::new(h, w, l),
            other => panic!("invalid rotation type: {other}"),
        }
    }

    /// Bounding box of a committed item; `None` before commit.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.placement.map(|p| {
            BoundingBox::from_position_and_dims(p.position, self.rotated_dims(p.rotation))
        })
    }

    /// XY footprint of a committed item; `None` before commit.
    pub fn footprint(&self) -> Option<Rect> {
        self.placement.map(|p| {
            let dims = self.rotated_dims(p.rotation);
            Rect::new(
                p.position.x,
                p.position.y,
                p.position.x + dims.x,
                p.position.y + dims.y,
            )
        })
    }
}

/// Identifies what carries a support surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SurfaceSupport {
    /// The cage floor.
    Floor,
    /// A packed item, by id.
    Item(u64),
}

impl Serialize for SurfaceSupport {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            SurfaceSupport::Floor => serializer.serialize_str("floor"),
            SurfaceSupport::Item(id) => serializer.serialize_u64(*id),
        }
    }
}

/// A horizontal rectangle at a fixed height on which items may rest.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SupportSurface {
    /// Height of the surface in cm.
    pub z: f64,
    /// XY extent; always has positive area.
    pub rect: Rect,
    /// Items (or the floor) that together carry this surface.
    pub supporting_items: Vec<SurfaceSupport>,
}

impl SupportSurface {
    pub fn new(z: f64, rect: Rect, supporting_items: Vec<SurfaceSupport>) -> Self {
        Self {
            z,
            rect,
            supporting_items,
        }
    }

    /// Area of the surface rectangle.
    pub fn area(&self) -> f64 {
        self.rect.area()
    }

    /// Anchor point of the surface: its bottom-left corner at height z.
    pub fn anchor(&self) -> Vec3 {
        Vec3::new(self.rect.x_min, self.rect.y_min, self.z)
    }
}

/// The cage being packed.
///
/// Mutated only through [`CageTrolley::add_item`] and the support-surface
/// rewrites of the surface manager; a new packing session starts from a
/// fresh cage.
#[derive(Clone, Debug, Serialize)]
pub struct CageTrolley {
    pub id: String,
    /// Inner usable dimensions (L, W, H) in cm.
    pub dimensions: Vec3,
    /// Maximum total weight in kg.
    pub weight_limit: f64,
    /// Placed items in insertion order.
    pub packed_items: Vec<Item>,
    pub support_surfaces: Vec<SupportSurface>,
    /// Candidate anchors of the Corner-Point engine.
    pub corner_points: Vec<Vec3>,
}

impl CageTrolley {
    /// Creates a new empty cage with validation.
    ///
    /// The initial state has a single support surface (the floor) and a
    /// single corner point at the origin.
    pub fn new(
        id: impl Into<String>,
        dimensions: Vec3,
        weight_limit: f64,
    ) -> Result<Self, ValidationError> {
        validate_dimensions("cage dimensions", dimensions)?;
        validate_weight(weight_limit)?;

        let floor = SupportSurface::new(
            0.0,
            Rect::new(0.0, 0.0, dimensions.x, dimensions.y),
            vec![SurfaceSupport::Floor],
        );
        Ok(Self {
            id: id.into(),
            dimensions,
            weight_limit,
            packed_items: Vec::new(),
            support_surfaces: vec![floor],
            corner_points: vec![Vec3::zero()],
        })
    }

    /// Calculates the total weight of all packed items.
    pub fn current_weight(&self) -> f64 {
        self.packed_items.iter().map(|item| item.weight).sum()
    }

    /// Sum of the volumes of all packed items (rotated calc dimensions).
    pub fn packed_volume(&self) -> f64 {
        self.packed_items
            .iter()
            .filter_map(|item| {
                item.placement
                    .map(|p| item.rotated_dims(p.rotation).volume())
            })
            .sum()
    }

    /// Commits an item at the given position and rotation.
    ///
    /// Does NOT validate the placement; feasibility is the constraint
    /// checker's job and support-surface maintenance is performed by the
    /// anchor engines after this call.
    pub fn add_item(&mut self, mut item: Item, position: Vec3, rotation: u8) {
        item.placement = Some(ItemPlacement { position, rotation });
        self.packed_items.push(item);
    }
}
