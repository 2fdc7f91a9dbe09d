//! Candidate anchor generation.
//!
//! An anchor is a point where an item's bottom-left-floor corner may land.
//! Two interchangeable engines produce them: Corner Points derived from
//! the already-packed items, and the corners of the maintained support
//! surfaces. A packer is bound to one engine; both expose the same
//! capability surface of generating anchors and committing a placement.

use std::collections::HashSet;

use crate::model::{CageTrolley, Item, PackError, SurfaceSupport};
use crate::surfaces::SurfaceManager;
use crate::types::{EPSILON_GENERAL, Vec3};

/// The free-space strategy a packer is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnchorEngine {
    /// Candidate points grow from the corners of packed items.
    CornerPoint,
    /// Candidate points are the corners of the support surfaces.
    SupportSurface,
}

impl AnchorEngine {
    /// Generates the ordered candidate anchors for the current cage state.
    ///
    /// Both engines scan bottom-left-floor-first: (z, y, x) ascending.
    pub fn anchors(&self, cage: &CageTrolley) -> Vec<Vec3> {
        match self {
            AnchorEngine::CornerPoint => corner_points(cage),
            AnchorEngine::SupportSurface => surface_anchors(cage),
        }
    }

    /// Commits a placement and refreshes the engine state.
    ///
    /// The surface set is rewritten for either engine (the stackability
    /// check feeds off it regardless of the anchor strategy); the
    /// Corner-Point engine additionally regenerates the cage's corner
    /// points.
    pub fn commit(
        &self,
        cage: &mut CageTrolley,
        item: Item,
        position: Vec3,
        rotation: u8,
        manager: &SurfaceManager,
    ) -> Result<(), PackError> {
        cage.add_item(item, position, rotation);
        let placed = cage.packed_items.last().expect("item was just committed");
        cage.support_surfaces = manager.update(placed, &cage.support_surfaces)?;

        if *self == AnchorEngine::CornerPoint {
            cage.corner_points = corner_points(cage);
        }
        Ok(())
    }
}

/// Generates the Corner-Point candidate set for a cage.
///
/// Seeded with the origin; every packed item contributes up to three child
/// points at its +x, +y and +z corners, the last one only for non-fragile
/// items. Points inside packed items or on the cage's far walls are
/// dropped; the result is deduplicated and (z, y, x)-ordered.
pub fn corner_points(cage: &CageTrolley) -> Vec<Vec3> {
    let mut points = vec![Vec3::zero()];

    for item in &cage.packed_items {
        let Some(placement) = item.placement else {
            continue;
        };
        let pos = placement.position;
        let dims = item.rotated_dims(placement.rotation);

        points.push(Vec3::new(pos.x + dims.x, pos.y, pos.z));
        points.push(Vec3::new(pos.x, pos.y + dims.y, pos.z));
        if !item.is_fragile {
            points.push(Vec3::new(pos.x, pos.y, pos.z + dims.z));
        }
    }

    let boxes: Vec<_> = cage
        .packed_items
        .iter()
        .filter_map(Item::bounding_box)
        .collect();
    let dims = cage.dimensions;

    points.retain(|p| {
        if p.x >= dims.x - EPSILON_GENERAL
            || p.y >= dims.y - EPSILON_GENERAL
            || p.z >= dims.z - EPSILON_GENERAL
        {
            return false;
        }
        !boxes
            .iter()
            .any(|b| b.contains_point_lower_closed(p, EPSILON_GENERAL))
    });

    points.sort_by(Vec3::cmp_zyx);
    points.dedup();
    points
}

/// Generates the surface-corner anchors for a cage.
///
/// Surfaces carried by fragile items yield no anchor: nothing may be
/// stacked on a fragile box, so its top face must not seed placements.
fn surface_anchors(cage: &CageTrolley) -> Vec<Vec3> {
    let fragile_ids: HashSet<u64> = cage
        .packed_items
        .iter()
        .filter(|item| item.is_fragile)
        .map(|item| item.id)
        .collect();

    let mut anchors: Vec<Vec3> = cage
        .support_surfaces
        .iter()
        .filter(|surface| {
            !surface.supporting_items.iter().any(|support| match support {
                SurfaceSupport::Item(id) => fragile_ids.contains(id),
                SurfaceSupport::Floor => false,
            })
        })
        .map(|surface| surface.anchor())
        .collect();

    anchors.sort_by(Vec3::cmp_zyx);
    anchors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::model::SupportSurface;

    fn cage_10() -> CageTrolley {
        CageTrolley::new("t", Vec3::new(10.0, 10.0, 10.0), 100.0).unwrap()
    }

    fn item(id: u64, dims: (f64, f64, f64), fragile: bool) -> Item {
        Item::new(id, Vec3::from_tuple(dims), 1.0, vec![0], fragile, 0.0).unwrap()
    }

    fn commit(cage: &mut CageTrolley, it: Item, pos: (f64, f64, f64)) {
        let manager = SurfaceManager::default();
        AnchorEngine::CornerPoint
            .commit(cage, it, Vec3::from_tuple(pos), 0, &manager)
            .unwrap();
    }

    #[test]
    fn test_empty_cage_has_origin_anchor() {
        assert_eq!(corner_points(&cage_10()), vec![Vec3::zero()]);
    }

    #[test]
    fn test_corner_points_after_one_item() {
        let mut cage = cage_10();
        commit(&mut cage, item(1, (5.0, 5.0, 5.0), false), (0.0, 0.0, 0.0));

        // The consumed origin is gone; the three child corners remain,
        // scanned bottom-left-floor-first.
        assert_eq!(
            cage.corner_points,
            vec![
                Vec3::new(5.0, 0.0, 0.0),
                Vec3::new(0.0, 5.0, 0.0),
                Vec3::new(0.0, 0.0, 5.0),
            ]
        );
    }

    #[test]
    fn test_fragile_item_generates_no_top_anchor() {
        let mut cage = cage_10();
        commit(&mut cage, item(1, (5.0, 5.0, 5.0), true), (0.0, 0.0, 0.0));

        assert_eq!(
            cage.corner_points,
            vec![Vec3::new(5.0, 0.0, 0.0), Vec3::new(0.0, 5.0, 0.0)]
        );
    }

    #[test]
    fn test_points_on_far_walls_are_dropped() {
        let mut cage = cage_10();
        commit(&mut cage, item(1, (10.0, 5.0, 10.0), false), (0.0, 0.0, 0.0));

        // +x corner sits on the far wall, +z corner on the ceiling; only
        // the +y corner survives.
        assert_eq!(cage.corner_points, vec![Vec3::new(0.0, 5.0, 0.0)]);
    }

    #[test]
    fn test_corner_point_purity() {
        let mut cage = cage_10();
        commit(&mut cage, item(1, (5.0, 5.0, 5.0), false), (0.0, 0.0, 0.0));
        commit(&mut cage, item(2, (5.0, 5.0, 5.0), false), (5.0, 0.0, 0.0));
        commit(&mut cage, item(3, (3.0, 3.0, 3.0), false), (0.0, 5.0, 0.0));

        for point in &cage.corner_points {
            for packed in &cage.packed_items {
                let bb = packed.bounding_box().unwrap();
                assert!(
                    !(point.x > bb.min.x + EPSILON_GENERAL
                        && point.x < bb.max.x - EPSILON_GENERAL
                        && point.y > bb.min.y + EPSILON_GENERAL
                        && point.y < bb.max.y - EPSILON_GENERAL
                        && point.z > bb.min.z + EPSILON_GENERAL
                        && point.z < bb.max.z - EPSILON_GENERAL),
                    "anchor {point:?} lies strictly inside item {}",
                    packed.id
                );
            }
        }
    }

    #[test]
    fn test_surface_anchors_ordering() {
        let mut cage = cage_10();
        cage.support_surfaces = vec![
            SupportSurface::new(
                5.0,
                Rect::new(0.0, 0.0, 5.0, 5.0),
                vec![SurfaceSupport::Item(1)],
            ),
            SupportSurface::new(
                0.0,
                Rect::new(5.0, 0.0, 10.0, 10.0),
                vec![SurfaceSupport::Floor],
            ),
            SupportSurface::new(
                0.0,
                Rect::new(0.0, 5.0, 5.0, 10.0),
                vec![SurfaceSupport::Floor],
            ),
        ];
        cage.add_item(item(1, (5.0, 5.0, 5.0), false), Vec3::zero(), 0);

        let anchors = AnchorEngine::SupportSurface.anchors(&cage);
        assert_eq!(
            anchors,
            vec![
                Vec3::new(5.0, 0.0, 0.0),
                Vec3::new(0.0, 5.0, 0.0),
                Vec3::new(0.0, 0.0, 5.0),
            ]
        );
    }

    #[test]
    fn test_surfaces_on_fragile_items_yield_no_anchor() {
        let mut cage = cage_10();
        let manager = SurfaceManager::default();
        AnchorEngine::SupportSurface
            .commit(
                &mut cage,
                item(1, (5.0, 5.0, 5.0), true),
                Vec3::zero(),
                0,
                &manager,
            )
            .unwrap();

        let anchors = AnchorEngine::SupportSurface.anchors(&cage);
        // The fragile item's top surface exists but is not offered.
        assert!(
            cage.support_surfaces.iter().any(|s| s.z == 5.0),
            "top surface missing"
        );
        assert!(anchors.iter().all(|a| a.z < 5.0));
    }
}
