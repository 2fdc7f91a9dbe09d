//! End-to-end packing sessions with invariant sweeps.
//!
//! Drives whole sessions through the public API of the crate and checks
//! the physical invariants of the cage after every decision: packed items
//! never overlap, stay inside the cage, respect the weight limit, and
//! every stacked item was sufficiently supported when it was placed.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use cage_packer::anchors::AnchorEngine;
use cage_packer::config::SolverConfig;
use cage_packer::constraints::check_stackable;
use cage_packer::driver::{ConveyorDriver, SessionReport};
use cage_packer::model::{CageTrolley, Item};
use cage_packer::packer::{HeuristicPacker, MctsPacker, Packer};
use cage_packer::types::{EPSILON_GENERAL, Vec3};

fn exact_config() -> SolverConfig {
    SolverConfig::builder().measurement_error(0.0).build()
}

fn item(id: u64, dims: (f64, f64, f64), weight: f64) -> Item {
    Item::new(id, Vec3::from_tuple(dims), weight, vec![0], false, 0.0).unwrap()
}

fn assert_cage_invariants(cage: &CageTrolley) {
    // Containment.
    for packed in &cage.packed_items {
        let bb = packed.bounding_box().expect("packed item has a placement");
        assert!(bb.min.x >= -EPSILON_GENERAL && bb.min.y >= -EPSILON_GENERAL);
        assert!(bb.min.z >= -EPSILON_GENERAL);
        assert!(
            bb.max.x <= cage.dimensions.x + EPSILON_GENERAL
                && bb.max.y <= cage.dimensions.y + EPSILON_GENERAL
                && bb.max.z <= cage.dimensions.z + EPSILON_GENERAL,
            "item {} sticks out of the cage",
            packed.id
        );
    }

    // Pairwise non-overlap (shared faces are fine).
    for i in 0..cage.packed_items.len() {
        for j in (i + 1)..cage.packed_items.len() {
            let a = cage.packed_items[i].bounding_box().unwrap();
            let b = cage.packed_items[j].bounding_box().unwrap();
            assert!(
                !a.overlaps(&b, EPSILON_GENERAL),
                "items {} and {} overlap",
                cage.packed_items[i].id,
                cage.packed_items[j].id
            );
        }
    }

    // Weight limit.
    assert!(cage.current_weight() <= cage.weight_limit + EPSILON_GENERAL);

    // Corner-point purity: no anchor strictly inside a packed item.
    for point in &cage.corner_points {
        for packed in &cage.packed_items {
            let bb = packed.bounding_box().unwrap();
            let strictly_inside = point.x > bb.min.x + EPSILON_GENERAL
                && point.x < bb.max.x - EPSILON_GENERAL
                && point.y > bb.min.y + EPSILON_GENERAL
                && point.y < bb.max.y - EPSILON_GENERAL
                && point.z > bb.min.z + EPSILON_GENERAL
                && point.z < bb.max.z - EPSILON_GENERAL;
            assert!(
                !strictly_inside,
                "corner point {point:?} inside item {}",
                packed.id
            );
        }
    }
}

/// Drives single decisions and checks support before every commit.
fn pack_stream_with_invariants(
    cage: &mut CageTrolley,
    packer: &mut dyn Packer,
    mut items: Vec<Item>,
    config: &SolverConfig,
) -> usize {
    let mut placed = 0;
    loop {
        let surfaces_before = cage.support_surfaces.clone();
        let candidates: Vec<Item> = items.iter().take(3).cloned().collect();
        if candidates.is_empty() {
            break;
        }
        let Some(placement) = packer.pack(cage, &candidates).unwrap() else {
            // Skip the head and try the rest of the stream.
            items.remove(0);
            continue;
        };

        // The committed item must have been supported on the surfaces
        // that existed before the commit.
        let committed = cage.packed_items.last().unwrap();
        let p = committed.placement.unwrap();
        let mut probe = cage.clone();
        probe.packed_items.pop();
        probe.support_surfaces = surfaces_before;
        assert!(
            check_stackable(&probe, p.position, committed.rotated_dims(p.rotation), config),
            "item {} was committed without sufficient support",
            committed.id
        );

        items.retain(|i| i.id != placement.item_id);
        placed += 1;
        assert_cage_invariants(cage);
    }
    placed
}

fn random_stream(seed: u64, count: u64) -> Vec<Item> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    (1..=count)
        .map(|id| {
            let dims = (
                rng.random_range(2..=8) as f64,
                rng.random_range(2..=8) as f64,
                rng.random_range(2..=8) as f64,
            );
            item(id, dims, rng.random_range(1..=5) as f64)
        })
        .collect()
}

#[test]
fn heuristic_sessions_hold_invariants_for_all_engines() {
    for engine in [AnchorEngine::CornerPoint, AnchorEngine::SupportSurface] {
        for seed in [1_u64, 7, 42] {
            let config = exact_config();
            let mut cage = CageTrolley::new("inv", Vec3::new(20.0, 20.0, 20.0), 60.0).unwrap();
            let mut packer = HeuristicPacker::new(engine, config);

            let placed = pack_stream_with_invariants(
                &mut cage,
                &mut packer,
                random_stream(seed, 12),
                &config,
            );
            assert!(placed > 0, "nothing was placed for engine {engine:?}");
        }
    }
}

#[test]
fn mcts_sessions_hold_invariants_for_all_engines() {
    for engine in [AnchorEngine::CornerPoint, AnchorEngine::SupportSurface] {
        let config = SolverConfig::builder()
            .measurement_error(0.0)
            .num_simulations(40)
            .build();
        let mut cage = CageTrolley::new("inv", Vec3::new(20.0, 20.0, 20.0), 60.0).unwrap();
        let mut packer = MctsPacker::new(engine, config, 42);

        let placed =
            pack_stream_with_invariants(&mut cage, &mut packer, random_stream(3, 8), &config);
        assert!(placed > 0, "nothing was placed for engine {engine:?}");
    }
}

#[test]
fn single_unit_box_lands_in_the_origin_corner() {
    // Scenario: 1x1x1 item into an empty (10,10,10) cage.
    for engine in [AnchorEngine::CornerPoint, AnchorEngine::SupportSurface] {
        let mut cage = CageTrolley::new("s1", Vec3::new(10.0, 10.0, 10.0), 100.0).unwrap();
        let mut packer = HeuristicPacker::new(engine, exact_config());

        let placement = packer
            .pack(&mut cage, &[item(1, (1.0, 1.0, 1.0), 1.0)])
            .unwrap()
            .expect("the unit box fits");

        assert_eq!(placement.position, Vec3::zero());
        assert_eq!(placement.rotation, 0);
        assert!((cage.current_weight() - 1.0).abs() < EPSILON_GENERAL);

        // The floor keeps a 1x1 hole split into at most two remainders,
        // and a new top surface appears at z = 1.
        let floor_parts = cage
            .support_surfaces
            .iter()
            .filter(|s| s.z == 0.0)
            .count();
        assert!(floor_parts <= 2);
        let floor_area: f64 = cage
            .support_surfaces
            .iter()
            .filter(|s| s.z == 0.0)
            .map(|s| s.area())
            .sum();
        assert!((floor_area - 99.0).abs() < EPSILON_GENERAL);
        assert!(cage.support_surfaces.iter().any(|s| s.z == 1.0));
    }
}

#[test]
fn two_identical_boxes_line_up_along_x() {
    // Scenario: two 5x5x5 boxes, corner-point heuristic.
    let mut cage = CageTrolley::new("s2", Vec3::new(10.0, 10.0, 10.0), 100.0).unwrap();
    let mut packer = HeuristicPacker::new(AnchorEngine::CornerPoint, exact_config());

    let first = packer
        .pack(&mut cage, &[item(1, (5.0, 5.0, 5.0), 1.0)])
        .unwrap()
        .unwrap();
    let second = packer
        .pack(&mut cage, &[item(2, (5.0, 5.0, 5.0), 1.0)])
        .unwrap()
        .unwrap();

    assert_eq!(first.position, Vec3::zero());
    assert_eq!(second.position, Vec3::new(5.0, 0.0, 0.0));
}

#[test]
fn full_shelf_blocks_both_insertion_paths() {
    // Scenario: a full-footprint shelf at z = 5 makes the space below it
    // unreachable for a box whose inflated height pokes into the shelf
    // band on the side path too.
    let config = SolverConfig::default();
    let mut cage = CageTrolley::new("s3", Vec3::new(10.0, 10.0, 10.0), 100.0).unwrap();
    let shelf = Item::new(90, Vec3::new(10.0, 10.0, 1.0), 1.0, vec![0], false, 0.0).unwrap();
    cage.add_item(shelf, Vec3::new(0.0, 0.0, 5.0), 0);

    // Default measurement error inflates the 5x5x5 box to 8x8x8.
    let boxed = Item::new(
        1,
        Vec3::new(5.0, 5.0, 5.0),
        1.0,
        vec![0],
        false,
        config.measurement_error,
    )
    .unwrap();
    assert!(!cage_packer::constraints::is_placement_valid(
        &cage,
        &boxed,
        Vec3::zero(),
        0,
        &config
    ));
}

#[test]
fn stability_factor_rejects_overhang() {
    // Scenario: a 10x10x1 pallet, then a 5x5x5 box fully on it vs. 40%
    // on it.
    let config = exact_config();
    let mut cage = CageTrolley::new("s4", Vec3::new(10.0, 10.0, 10.0), 100.0).unwrap();
    let manager = cage_packer::surfaces::SurfaceManager::new(true, config.merge_margin);
    AnchorEngine::SupportSurface
        .commit(
            &mut cage,
            item(90, (10.0, 10.0, 1.0), 5.0),
            Vec3::zero(),
            0,
            &manager,
        )
        .unwrap();

    let boxed = item(1, (5.0, 5.0, 5.0), 1.0);
    assert!(cage_packer::constraints::is_placement_valid(
        &cage,
        &boxed,
        Vec3::new(0.0, 0.0, 1.0),
        0,
        &config
    ));
    assert!(!cage_packer::constraints::is_placement_valid(
        &cage,
        &boxed,
        Vec3::new(8.0, 0.0, 1.0),
        0,
        &config
    ));
}

#[test]
fn center_of_gravity_keeps_the_cage_balanced() {
    // Scenario: a 50kg box in one corner accepts a mirrored counterweight
    // but rejects doubling down on the same corner.
    let config = exact_config();
    let mut cage = CageTrolley::new("s5", Vec3::new(10.0, 10.0, 10.0), 1000.0).unwrap();
    let manager = cage_packer::surfaces::SurfaceManager::new(true, config.merge_margin);
    AnchorEngine::SupportSurface
        .commit(
            &mut cage,
            item(1, (2.0, 2.0, 2.0), 50.0),
            Vec3::zero(),
            0,
            &manager,
        )
        .unwrap();

    let mirrored = item(2, (2.0, 2.0, 2.0), 50.0);
    assert!(cage_packer::constraints::is_placement_valid(
        &cage,
        &mirrored,
        Vec3::new(8.0, 8.0, 0.0),
        0,
        &config
    ));

    let unbalanced = item(3, (1.0, 1.0, 1.0), 500.0);
    assert!(!cage_packer::constraints::is_placement_valid(
        &cage,
        &unbalanced,
        Vec3::new(2.0, 0.0, 0.0),
        0,
        &config
    ));
}

#[test]
fn mcts_with_fixed_seed_is_reproducible() {
    // Scenario: four identical 5x5x5 candidates, seed 42.
    let run = || {
        let config = SolverConfig::builder()
            .measurement_error(0.0)
            .num_simulations(100)
            .build();
        let mut cage = CageTrolley::new("s6", Vec3::new(10.0, 10.0, 10.0), 100.0).unwrap();
        let mut packer = MctsPacker::new(AnchorEngine::SupportSurface, config, 42);

        let candidates: Vec<Item> = (1..=4).map(|id| item(id, (5.0, 5.0, 5.0), 1.0)).collect();
        packer.pack(&mut cage, &candidates).unwrap().unwrap()
    };

    let first = run();
    let second = run();
    assert_eq!(first, second);
    assert_eq!(first.position, Vec3::zero());
    assert_eq!(first.rotation, 0);
}

#[test]
fn driver_report_accounts_for_every_item() {
    let mut cage = CageTrolley::new("drv", Vec3::new(10.0, 10.0, 10.0), 100.0).unwrap();
    let mut packer = HeuristicPacker::new(AnchorEngine::SupportSurface, exact_config());

    let stream = vec![
        item(1, (5.0, 10.0, 10.0), 1.0),
        item(2, (11.0, 1.0, 1.0), 1.0),
        item(3, (5.0, 10.0, 10.0), 1.0),
    ];
    let total = stream.len();

    let mut driver = ConveyorDriver::new(stream, 2, 3);
    let SessionReport {
        placements,
        unplaced,
    } = driver.run(&mut cage, &mut packer).unwrap();

    assert_eq!(placements.len() + unplaced.len(), total);
    assert_eq!(placements.len(), 2);
    assert_eq!(unplaced[0].id, 2);
    assert_cage_invariants(&cage);
}
