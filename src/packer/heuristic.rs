//! Greedy best-score packer.
//!
//! Exhaustively scans (item × rotation × anchor), scores every feasible
//! placement and commits the global best. Ties keep the first discovery in
//! the nested scan order, which together with the (z, y, x) anchor
//! ordering yields the bottom-left-floor-first behavior.

use log::debug;

use crate::anchors::AnchorEngine;
use crate::config::SolverConfig;
use crate::constraints::is_placement_valid;
use crate::model::{CageTrolley, Item, PackError};
use crate::scoring::placement_score;
use crate::surfaces::SurfaceManager;
use crate::types::Vec3;

use super::{Packer, Placement};

/// Exhaustive best-score packer bound to one anchor engine.
pub struct HeuristicPacker {
    engine: AnchorEngine,
    manager: SurfaceManager,
    config: SolverConfig,
}

impl HeuristicPacker {
    pub fn new(engine: AnchorEngine, config: SolverConfig) -> Self {
        Self {
            engine,
            manager: SurfaceManager::new(true, config.merge_margin),
            config,
        }
    }
}

impl Packer for HeuristicPacker {
    fn pack(
        &mut self,
        cage: &mut CageTrolley,
        candidates: &[Item],
    ) -> Result<Option<Placement>, PackError> {
        let anchors = self.engine.anchors(cage);
        let weights = self.config.score_weights();

        let mut best: Option<(f64, usize, u8, Vec3)> = None;
        for (index, item) in candidates.iter().enumerate() {
            for &rotation in &item.allowed_rotations {
                for &anchor in &anchors {
                    if !is_placement_valid(cage, item, anchor, rotation, &self.config) {
                        continue;
                    }
                    let score = placement_score(anchor, &weights);
                    if best.is_none_or(|(current, ..)| score > current) {
                        best = Some((score, index, rotation, anchor));
                    }
                }
            }
        }

        let Some((score, index, rotation, position)) = best else {
            debug!(
                "no feasible placement for {} candidates over {} anchors",
                candidates.len(),
                anchors.len()
            );
            return Ok(None);
        };

        let item = candidates[index].clone();
        let placement = Placement {
            item_id: item.id,
            position,
            rotation,
        };
        debug!(
            "placing item {} at ({:.1}, {:.1}, {:.1}) rotation {} (score {:.3})",
            item.id, position.x, position.y, position.z, rotation, score
        );
        self.engine
            .commit(cage, item, position, rotation, &self.manager)?;
        Ok(Some(placement))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact_config() -> SolverConfig {
        SolverConfig::builder().measurement_error(0.0).build()
    }

    fn item(id: u64, dims: (f64, f64, f64)) -> Item {
        Item::new(id, Vec3::from_tuple(dims), 1.0, vec![0], false, 0.0).unwrap()
    }

    fn cage_10() -> CageTrolley {
        CageTrolley::new("t", Vec3::new(10.0, 10.0, 10.0), 100.0).unwrap()
    }

    #[test]
    fn test_single_item_lands_at_origin() {
        for engine in [AnchorEngine::CornerPoint, AnchorEngine::SupportSurface] {
            let mut cage = cage_10();
            let mut packer = HeuristicPacker::new(engine, exact_config());

            let placement = packer
                .pack(&mut cage, &[item(1, (1.0, 1.0, 1.0))])
                .unwrap()
                .expect("placement expected");

            assert_eq!(placement.item_id, 1);
            assert_eq!(placement.position, Vec3::zero());
            assert_eq!(placement.rotation, 0);
            assert_eq!(cage.packed_items.len(), 1);
            assert!((cage.current_weight() - 1.0).abs() < 1e-9);

            // The floor has a 1x1 hole; a new top surface sits at z = 1.
            assert!(cage.support_surfaces.iter().any(|s| s.z == 1.0));
            let floor_area: f64 = cage
                .support_surfaces
                .iter()
                .filter(|s| s.z == 0.0)
                .map(|s| s.area())
                .sum();
            assert!((floor_area - 99.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_two_identical_items_fill_along_x() {
        let mut cage = cage_10();
        let mut packer = HeuristicPacker::new(AnchorEngine::CornerPoint, exact_config());

        let first = packer
            .pack(&mut cage, &[item(1, (5.0, 5.0, 5.0))])
            .unwrap()
            .unwrap();
        assert_eq!(first.position, Vec3::zero());

        // Lowest-z, lowest-y, lowest-x anchor wins the tie on the floor.
        let second = packer
            .pack(&mut cage, &[item(2, (5.0, 5.0, 5.0))])
            .unwrap()
            .unwrap();
        assert_eq!(second.position, Vec3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn test_prefers_lower_anchor_over_stacking() {
        let mut cage = cage_10();
        let mut packer = HeuristicPacker::new(AnchorEngine::SupportSurface, exact_config());

        packer
            .pack(&mut cage, &[item(1, (5.0, 10.0, 5.0))])
            .unwrap()
            .unwrap();
        let second = packer
            .pack(&mut cage, &[item(2, (5.0, 10.0, 5.0))])
            .unwrap()
            .unwrap();

        // The floor anchor at (5, 0, 0) beats the top of the first item.
        assert_eq!(second.position, Vec3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn test_no_fit_leaves_cage_untouched() {
        let mut cage = cage_10();
        let mut packer = HeuristicPacker::new(AnchorEngine::CornerPoint, exact_config());

        let result = packer
            .pack(&mut cage, &[item(1, (11.0, 11.0, 11.0))])
            .unwrap();

        assert!(result.is_none());
        assert!(cage.packed_items.is_empty());
        assert_eq!(cage.corner_points, vec![Vec3::zero()]);
        assert_eq!(cage.support_surfaces.len(), 1);
    }

    #[test]
    fn test_rotation_unlocks_placement() {
        // A 12x5x5 box only fits a 10-wide cage after rotation.
        let mut cage = CageTrolley::new("t", Vec3::new(10.0, 14.0, 10.0), 100.0).unwrap();
        let rotatable = Item::new(
            1,
            Vec3::new(12.0, 5.0, 5.0),
            1.0,
            vec![0, 1],
            false,
            0.0,
        )
        .unwrap();
        let mut packer = HeuristicPacker::new(AnchorEngine::SupportSurface, exact_config());

        let placement = packer.pack(&mut cage, &[rotatable]).unwrap().unwrap();
        assert_eq!(placement.rotation, 1);
        assert_eq!(placement.position, Vec3::zero());
    }
}
