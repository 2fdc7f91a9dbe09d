//! Scalar scoring of candidate placements.

use crate::types::Vec3;

/// Weights of the placement score terms.
///
/// Only the height term is active; stability and center-of-gravity shift
/// terms plug in here without touching any call site.
#[derive(Clone, Copy, Debug)]
pub struct ScoreWeights {
    pub w_z: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self { w_z: 1.0 }
    }
}

/// Calculates the score of a placement. Higher is better.
///
/// The height term prefers filling low pockets first: the lower the
/// anchor, the higher the score. The `+ 1` keeps the term finite at the
/// floor.
pub fn placement_score(position: Vec3, weights: &ScoreWeights) -> f64 {
    weights.w_z * (1.0 / (1.0 + position.z))
}
