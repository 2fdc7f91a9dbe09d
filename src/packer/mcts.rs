//! Monte-Carlo Tree Search packer.
//!
//! Searches over the orderings of the lookahead window: every tree node
//! fixes one more (item, rotation, anchor) decision, rollouts complete the
//! remaining items with a greedy policy, and the reward is the packed
//! volume. The first action of the best root child is committed to the
//! real cage.
//!
//! All randomness flows through an injected seed, so identical inputs
//! reproduce identical decisions.

use log::debug;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::anchors::AnchorEngine;
use crate::config::SolverConfig;
use crate::constraints::is_placement_valid;
use crate::model::{CageTrolley, Item, PackError};
use crate::surfaces::SurfaceManager;
use crate::types::{EPSILON_GENERAL, Vec3};

use super::{Packer, Placement};

/// The packer never looks further than this many candidates.
pub const MAX_CANDIDATES: usize = 4;

/// One fixed (item, rotation, anchor) decision.
#[derive(Clone, Debug, PartialEq)]
struct Action {
    item_id: u64,
    position: Vec3,
    rotation: u8,
    /// Rotated-box volume, the reward contribution of this action.
    volume: f64,
}

/// A node of the search tree, stored in an index arena.
struct Node {
    parent: Option<usize>,
    children: Vec<usize>,
    /// Visit count (n).
    visits: u64,
    /// Cumulative reward (w).
    reward: f64,
    /// The action that led to this node; `None` at the root.
    action: Option<Action>,
    /// Candidate ids not yet fixed on the path from the root.
    remaining: Vec<u64>,
    /// Cage state after the path's placements.
    sim_cage: CageTrolley,
    /// Total volume placed on the path from the root.
    added: f64,
    /// Best valid action per placeable remaining item, computed lazily on
    /// first expansion of this node.
    possible_actions: Option<Vec<Action>>,
}

/// Merged statistics of one root child action.
struct RootStat {
    action: Action,
    reward: f64,
    visits: u64,
}

/// Fixed-budget MCTS packer bound to one anchor engine.
pub struct MctsPacker {
    engine: AnchorEngine,
    manager: SurfaceManager,
    config: SolverConfig,
    rng: Xoshiro256PlusPlus,
}

impl MctsPacker {
    /// Creates a packer with an injected RNG seed.
    ///
    /// The same seed, configuration and inputs reproduce the same
    /// decision.
    pub fn new(engine: AnchorEngine, config: SolverConfig, seed: u64) -> Self {
        Self {
            engine,
            manager: SurfaceManager::new(true, config.merge_margin),
            config,
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }
}

impl Packer for MctsPacker {
    fn pack(
        &mut self,
        cage: &mut CageTrolley,
        candidates: &[Item],
    ) -> Result<Option<Placement>, PackError> {
        if candidates.is_empty() {
            return Ok(None);
        }
        let window = &candidates[..candidates.len().min(MAX_CANDIDATES)];

        let trees = self.config.parallel_trees.max(1);
        let stats = if trees == 1 {
            search(
                self.engine,
                &self.manager,
                &self.config,
                cage,
                window,
                self.config.num_simulations,
                &mut self.rng,
            )?
        } else {
            self.search_parallel(cage, window, trees)?
        };

        // Pick the root action with the best mean reward.
        let mut best: Option<&RootStat> = None;
        for stat in stats.iter().filter(|s| s.visits > 0) {
            let is_better = best.is_none_or(|current| {
                stat.reward / stat.visits as f64 > current.reward / current.visits as f64
            });
            if is_better {
                best = Some(stat);
            }
        }
        let Some(best) = best else {
            debug!("mcts found no feasible first action");
            return Ok(None);
        };

        debug!(
            "mcts picked item {} at ({:.1}, {:.1}, {:.1}) rotation {} (mean reward {:.1}, {} visits)",
            best.action.item_id,
            best.action.position.x,
            best.action.position.y,
            best.action.position.z,
            best.action.rotation,
            best.reward / best.visits as f64,
            best.visits
        );

        let item = window
            .iter()
            .find(|i| i.id == best.action.item_id)
            .expect("best action refers to a candidate")
            .clone();
        let placement = Placement {
            item_id: item.id,
            position: best.action.position,
            rotation: best.action.rotation,
        };
        self.engine.commit(
            cage,
            item,
            best.action.position,
            best.action.rotation,
            &self.manager,
        )?;
        Ok(Some(placement))
    }
}

impl MctsPacker {
    /// Root parallelization: independent trees with derived seeds, root
    /// statistics merged per action.
    ///
    /// The merge is order-independent, so the result only depends on the
    /// master seed and the tree count, not on thread scheduling.
    fn search_parallel(
        &mut self,
        cage: &CageTrolley,
        window: &[Item],
        trees: usize,
    ) -> Result<Vec<RootStat>, PackError> {
        let per_tree = self.config.num_simulations.div_ceil(trees);
        let seeds: Vec<u64> = (0..trees).map(|_| self.rng.random()).collect();

        let engine = self.engine;
        let manager = &self.manager;
        let config = &self.config;

        let results: Vec<Result<Vec<RootStat>, PackError>> = std::thread::scope(|scope| {
            let handles: Vec<_> = seeds
                .into_iter()
                .map(|seed| {
                    scope.spawn(move || {
                        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
                        search(engine, manager, config, cage, window, per_tree, &mut rng)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("mcts worker panicked"))
                .collect()
        });

        let mut merged: Vec<RootStat> = Vec::new();
        for result in results {
            for stat in result? {
                match merged.iter_mut().find(|m| m.action == stat.action) {
                    Some(existing) => {
                        existing.reward += stat.reward;
                        existing.visits += stat.visits;
                    }
                    None => merged.push(stat),
                }
            }
        }
        Ok(merged)
    }
}

/// Runs one search tree and returns the root-child statistics.
fn search(
    engine: AnchorEngine,
    manager: &SurfaceManager,
    config: &SolverConfig,
    cage: &CageTrolley,
    candidates: &[Item],
    iterations: usize,
    rng: &mut Xoshiro256PlusPlus,
) -> Result<Vec<RootStat>, PackError> {
    let mut arena = vec![Node {
        parent: None,
        children: Vec::new(),
        visits: 0,
        reward: 0.0,
        action: None,
        remaining: candidates.iter().map(|i| i.id).collect(),
        sim_cage: cage.clone(),
        added: 0.0,
        possible_actions: None,
    }];

    for _ in 0..iterations {
        // 1. Selection: descend through fully expanded nodes.
        let mut index = 0;
        loop {
            ensure_possible_actions(&mut arena, index, candidates, engine, config);
            let node = &arena[index];
            let action_count = node
                .possible_actions
                .as_ref()
                .map(Vec::len)
                .unwrap_or_default();
            if node.children.is_empty() || node.children.len() < action_count {
                break;
            }
            index = best_uct_child(&arena, index, config.uct_c);
        }

        // 2. Expansion: try one untried first action.
        if let Some(child) = expand(&mut arena, index, candidates, engine, manager, config, rng)? {
            index = child;
        }

        // 3. Rollout from the (possibly expanded) node.
        let reward =
            arena[index].added + rollout(&arena[index], candidates, engine, manager, config, rng)?;

        // 4. Backpropagation along the path to the root.
        let mut cursor = Some(index);
        while let Some(i) = cursor {
            arena[i].visits += 1;
            arena[i].reward += reward;
            cursor = arena[i].parent;
        }
    }

    let stats = arena[0]
        .children
        .iter()
        .map(|&child| {
            let node = &arena[child];
            RootStat {
                action: node.action.clone().expect("non-root node has an action"),
                reward: node.reward,
                visits: node.visits,
            }
        })
        .collect();
    Ok(stats)
}

/// Computes the node's possible actions once: the best valid action of
/// every placeable remaining item on the node's cage state.
fn ensure_possible_actions(
    arena: &mut [Node],
    index: usize,
    candidates: &[Item],
    engine: AnchorEngine,
    config: &SolverConfig,
) {
    if arena[index].possible_actions.is_some() {
        return;
    }
    let node = &arena[index];
    let mut actions = Vec::new();
    for id in &node.remaining {
        let item = candidates
            .iter()
            .find(|i| i.id == *id)
            .expect("remaining ids come from the candidate window");
        if let Some(action) = best_valid_action(&node.sim_cage, item, engine, config) {
            actions.push(action);
        }
    }
    arena[index].possible_actions = Some(actions);
}

/// Creates one child for a randomly chosen untried action, committing the
/// placement on a cloned cage. Returns `None` when every placeable item
/// already has a child (or nothing is placeable).
fn expand(
    arena: &mut Vec<Node>,
    index: usize,
    candidates: &[Item],
    engine: AnchorEngine,
    manager: &SurfaceManager,
    config: &SolverConfig,
    rng: &mut Xoshiro256PlusPlus,
) -> Result<Option<usize>, PackError> {
    let node = &arena[index];
    if node.remaining.is_empty() {
        return Ok(None);
    }

    let actions = node
        .possible_actions
        .as_ref()
        .expect("selection computed the actions");
    let untried: Vec<&Action> = actions
        .iter()
        .filter(|action| {
            !node.children.iter().any(|&child| {
                arena[child]
                    .action
                    .as_ref()
                    .is_some_and(|a| a.item_id == action.item_id)
            })
        })
        .collect();
    if untried.is_empty() {
        return Ok(None);
    }

    let choice = untried[rng.random_range(0..untried.len())].clone();
    let item = candidates
        .iter()
        .find(|i| i.id == choice.item_id)
        .expect("action refers to a candidate")
        .clone();

    let mut sim_cage = node.sim_cage.clone();
    engine.commit(&mut sim_cage, item, choice.position, choice.rotation, manager)?;

    let remaining: Vec<u64> = node
        .remaining
        .iter()
        .copied()
        .filter(|&id| id != choice.item_id)
        .collect();
    let added = node.added + choice.volume;

    arena.push(Node {
        parent: Some(index),
        children: Vec::new(),
        visits: 0,
        reward: 0.0,
        action: Some(choice),
        remaining,
        sim_cage,
        added,
        possible_actions: None,
    });
    let child = arena.len() - 1;
    arena[index].children.push(child);
    Ok(Some(child))
}

/// Greedy completion of the remaining items in random order.
///
/// Returns the volume placed during the rollout; items that fit nowhere
/// are skipped.
fn rollout(
    node: &Node,
    candidates: &[Item],
    engine: AnchorEngine,
    manager: &SurfaceManager,
    config: &SolverConfig,
    rng: &mut Xoshiro256PlusPlus,
) -> Result<f64, PackError> {
    let mut cage = node.sim_cage.clone();
    let mut order = node.remaining.clone();
    order.shuffle(rng);

    let mut volume = 0.0;
    for id in order.into_iter().take(config.rollout_depth) {
        let item = candidates
            .iter()
            .find(|i| i.id == id)
            .expect("remaining ids come from the candidate window");
        if let Some(action) = best_valid_action(&cage, item, engine, config) {
            engine.commit(&mut cage, item.clone(), action.position, action.rotation, manager)?;
            volume += action.volume;
        }
    }
    Ok(volume)
}

/// Best valid action of a single item on a cage: the feasible
/// (rotation × anchor) pair with maximum rotated-box volume; ties prefer
/// the lower z, then y, then x anchor.
fn best_valid_action(
    cage: &CageTrolley,
    item: &Item,
    engine: AnchorEngine,
    config: &SolverConfig,
) -> Option<Action> {
    let anchors = engine.anchors(cage);

    let mut best: Option<Action> = None;
    for &rotation in &item.allowed_rotations {
        let volume = item.rotated_dims(rotation).volume();
        for &anchor in &anchors {
            if !is_placement_valid(cage, item, anchor, rotation, config) {
                continue;
            }
            let action = Action {
                item_id: item.id,
                position: anchor,
                rotation,
                volume,
            };
            if best.as_ref().is_none_or(|b| action_is_better(&action, b)) {
                best = Some(action);
            }
        }
    }
    best
}

fn action_is_better(candidate: &Action, current: &Action) -> bool {
    if candidate.volume > current.volume + EPSILON_GENERAL {
        return true;
    }
    if candidate.volume < current.volume - EPSILON_GENERAL {
        return false;
    }
    candidate.position.cmp_zyx(&current.position) == std::cmp::Ordering::Less
}

/// UCT selection among the children of a node.
///
/// Unvisited children score infinity and are explored first.
fn best_uct_child(arena: &[Node], index: usize, c: f64) -> usize {
    let parent_visits = arena[index].visits.max(1) as f64;

    let mut best_index = arena[index].children[0];
    let mut best_score = f64::NEG_INFINITY;
    for &child_index in &arena[index].children {
        let child = &arena[child_index];
        let score = if child.visits == 0 {
            f64::INFINITY
        } else {
            let exploit = child.reward / child.visits as f64;
            let explore = c * (parent_visits.ln() / child.visits as f64).sqrt();
            exploit + explore
        };
        if score > best_score {
            best_score = score;
            best_index = child_index;
        }
    }
    best_index
}
