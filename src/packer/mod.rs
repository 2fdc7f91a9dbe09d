//! The packing decision makers.
//!
//! A packer receives the cage and a small lookahead window of candidate
//! items and decides which item to place next, in which orientation, at
//! which anchor. Implementations must leave the cage untouched when no
//! feasible placement exists.

use serde::Serialize;

use crate::model::{CageTrolley, Item, PackError};
use crate::types::Vec3;

pub mod heuristic;
pub mod mcts;

pub use heuristic::HeuristicPacker;
pub use mcts::MctsPacker;

/// A committed placement decision.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Placement {
    pub item_id: u64,
    pub position: Vec3,
    pub rotation: u8,
}

/// A packer decides and commits the next placement.
///
/// On success the cage has been mutated: the item is appended to the
/// packed list and the free-space state (surfaces, corner points) has been
/// refreshed. `Ok(None)` is the normal "nothing fits" outcome, never an
/// error.
pub trait Packer {
    fn pack(
        &mut self,
        cage: &mut CageTrolley,
        candidates: &[Item],
    ) -> Result<Option<Placement>, PackError>;
}
