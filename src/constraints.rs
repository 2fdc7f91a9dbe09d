//! Feasibility checks for a candidate placement.
//!
//! A placement is valid when all five predicates hold: the item stays
//! inside the cage, the weight limit is respected, enough of the footprint
//! rests on support surfaces, the robot can still reach the position along
//! at least one insertion path, and the loaded cage keeps its balance.
//!
//! Every predicate is side-effect-free; `is_placement_valid` evaluates all
//! of them and returns the conjunction.

use crate::config::SolverConfig;
use crate::geometry::Rect;
use crate::model::{CageTrolley, Item};
use crate::types::{BoundingBox, EPSILON_GENERAL, Vec3};

/// Checks whether placing `item` at `position` under `rotation` is valid.
pub fn is_placement_valid(
    cage: &CageTrolley,
    item: &Item,
    position: Vec3,
    rotation: u8,
    config: &SolverConfig,
) -> bool {
    let dims = item.rotated_dims(rotation);

    let boundary = check_boundary(cage, position, dims);
    let weight = check_weight(cage, item);
    let stackable = check_stackable(cage, position, dims, config);
    let insertion = check_insertion_path(cage, position, dims);
    let balance = check_center_of_gravity(cage, item, position, dims, config);

    boundary && weight && stackable && insertion && balance
}

/// The item must lie inside the cage on all axes, within tolerance.
pub fn check_boundary(cage: &CageTrolley, pos: Vec3, dims: Vec3) -> bool {
    let c = cage.dimensions;
    pos.x >= -EPSILON_GENERAL
        && pos.y >= -EPSILON_GENERAL
        && pos.z >= -EPSILON_GENERAL
        && pos.x + dims.x <= c.x + EPSILON_GENERAL
        && pos.y + dims.y <= c.y + EPSILON_GENERAL
        && pos.z + dims.z <= c.z + EPSILON_GENERAL
}

/// The cage weight limit must not be exceeded.
pub fn check_weight(cage: &CageTrolley, item: &Item) -> bool {
    cage.current_weight() + item.weight <= cage.weight_limit
}

/// Enough of the item footprint must rest on support surfaces at the
/// placement height.
///
/// Sums the intersection of the footprint with every surface within the
/// merge margin of `pos.z`; the covered share must reach the stability
/// factor. A placement height without any surface gets zero support and
/// fails here, so anchors off the surface grid are rejected implicitly.
pub fn check_stackable(cage: &CageTrolley, pos: Vec3, dims: Vec3, config: &SolverConfig) -> bool {
    let footprint = Rect::new(pos.x, pos.y, pos.x + dims.x, pos.y + dims.y);
    let bottom_area = dims.base_area();
    if bottom_area <= EPSILON_GENERAL {
        return true;
    }

    let mut supported_area = 0.0;
    for surface in &cage.support_surfaces {
        if (surface.z - pos.z).abs() < config.merge_margin {
            supported_area += footprint.intersection_area(&surface.rect);
        }
    }

    supported_area >= bottom_area * config.stability_factor - EPSILON_GENERAL
}

/// The placement must be reachable by the robot.
///
/// Two insertion motions exist: straight down from the ceiling, and
/// sliding in from the conveyor-facing wall at y = W. The placement is
/// rejected only when both swept prisms collide with already-packed items;
/// the blockers may be different items.
pub fn check_insertion_path(cage: &CageTrolley, pos: Vec3, dims: Vec3) -> bool {
    let top_prism = BoundingBox::new(
        pos,
        Vec3::new(pos.x + dims.x, pos.y + dims.y, cage.dimensions.z),
    );
    let side_prism = BoundingBox::new(
        pos,
        Vec3::new(pos.x + dims.x, cage.dimensions.y, pos.z + dims.z),
    );

    let mut top_blocked = false;
    let mut side_blocked = false;
    for packed in &cage.packed_items {
        let Some(aabb) = packed.bounding_box() else {
            continue;
        };
        top_blocked = top_blocked || top_prism.overlaps(&aabb, EPSILON_GENERAL);
        side_blocked = side_blocked || side_prism.overlaps(&aabb, EPSILON_GENERAL);
        if top_blocked && side_blocked {
            return false;
        }
    }
    true
}

/// The center of gravity of the loaded cage must stay inside the centered
/// safety rectangle of the floor.
///
/// Computes the weighted centroid of all packed items plus the new one,
/// using box centers of the rotated calculation dimensions. An empty cage
/// always passes so the very first item may be placed into a corner.
pub fn check_center_of_gravity(
    cage: &CageTrolley,
    item: &Item,
    pos: Vec3,
    dims: Vec3,
    config: &SolverConfig,
) -> bool {
    if cage.packed_items.is_empty() {
        return true;
    }

    let mut total_weight = 0.0;
    let mut weighted_x = 0.0;
    let mut weighted_y = 0.0;

    for packed in &cage.packed_items {
        let Some(aabb) = packed.bounding_box() else {
            continue;
        };
        let center = aabb.center();
        total_weight += packed.weight;
        weighted_x += packed.weight * center.x;
        weighted_y += packed.weight * center.y;
    }

    let new_center = BoundingBox::from_position_and_dims(pos, dims).center();
    total_weight += item.weight;
    weighted_x += item.weight * new_center.x;
    weighted_y += item.weight * new_center.y;

    if total_weight <= 0.0 {
        return true;
    }

    let cog_x = weighted_x / total_weight;
    let cog_y = weighted_y / total_weight;

    let margin = (1.0 - config.safety_margin_ratio) / 2.0;
    let safe_x_min = cage.dimensions.x * margin;
    let safe_x_max = cage.dimensions.x * (1.0 - margin);
    let safe_y_min = cage.dimensions.y * margin;
    let safe_y_max = cage.dimensions.y * (1.0 - margin);

    cog_x >= safe_x_min && cog_x <= safe_x_max && cog_y >= safe_y_min && cog_y <= safe_y_max
}
