//! Conveyor session driver.
//!
//! Runs a whole packing session against one cage: items arrive on a
//! conveyor queue, the packer sees the temp buffer plus a small lookahead
//! window, and items the packer cannot place are pushed into the bounded
//! temp buffer for a later retry. The session ends when the buffer is full
//! or the conveyor runs dry.

use std::collections::VecDeque;

use log::{debug, info};

use crate::model::{CageTrolley, Item, PackError};
use crate::packer::{Packer, Placement};

/// Lifecycle of a packing session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No decision requested yet.
    Idle,
    /// A pack() call is in flight.
    Deciding,
    /// The last decision placed an item.
    Committed,
    /// The last decision found no feasible placement.
    Stuck,
}

/// Outcome of a single driver step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StepOutcome {
    /// An item was placed into the cage.
    Placed(Placement),
    /// Nothing fit; the conveyor head moved into the temp buffer.
    Deferred(u64),
    /// Nothing fit and no retry is possible; the session is over.
    Exhausted,
}

/// Summary of a finished session.
#[derive(Debug)]
pub struct SessionReport {
    /// Every committed placement, in order.
    pub placements: Vec<Placement>,
    /// Items left on the conveyor or in the temp buffer.
    pub unplaced: Vec<Item>,
}

impl SessionReport {
    pub fn is_complete(&self) -> bool {
        self.unplaced.is_empty()
    }
}

/// Drives a packer over a conveyor stream with a bounded temp buffer.
pub struct ConveyorDriver {
    conveyor: VecDeque<Item>,
    temp_area: Vec<Item>,
    capacity: usize,
    lookahead: usize,
    state: SessionState,
}

impl ConveyorDriver {
    pub fn new(conveyor: Vec<Item>, capacity: usize, lookahead: usize) -> Self {
        Self {
            conveyor: conveyor.into(),
            temp_area: Vec::with_capacity(capacity),
            capacity,
            lookahead,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Items the packer may choose from: the whole temp buffer plus the
    /// head window of the conveyor.
    fn candidates(&self) -> Vec<Item> {
        self.temp_area
            .iter()
            .chain(self.conveyor.iter().take(self.lookahead))
            .cloned()
            .collect()
    }

    /// Requests one decision and applies its consequences.
    pub fn step(
        &mut self,
        cage: &mut CageTrolley,
        packer: &mut dyn Packer,
    ) -> Result<StepOutcome, PackError> {
        let candidates = self.candidates();
        if candidates.is_empty() {
            return Ok(StepOutcome::Exhausted);
        }

        self.state = SessionState::Deciding;
        match packer.pack(cage, &candidates)? {
            Some(placement) => {
                self.state = SessionState::Committed;
                self.remove_item(placement.item_id);
                Ok(StepOutcome::Placed(placement))
            }
            None => {
                self.state = SessionState::Stuck;
                if !self.conveyor.is_empty() && self.temp_area.len() < self.capacity {
                    let deferred = self.conveyor.pop_front().expect("conveyor checked non-empty");
                    let id = deferred.id;
                    debug!("deferring item {} into the temp buffer", id);
                    self.temp_area.push(deferred);
                    Ok(StepOutcome::Deferred(id))
                } else {
                    Ok(StepOutcome::Exhausted)
                }
            }
        }
    }

    /// Runs until the session terminates and reports the result.
    pub fn run(
        &mut self,
        cage: &mut CageTrolley,
        packer: &mut dyn Packer,
    ) -> Result<SessionReport, PackError> {
        let mut placements = Vec::new();
        loop {
            match self.step(cage, packer)? {
                StepOutcome::Placed(placement) => placements.push(placement),
                StepOutcome::Deferred(_) => {}
                StepOutcome::Exhausted => break,
            }
        }

        let unplaced: Vec<Item> = self
            .temp_area
            .drain(..)
            .chain(self.conveyor.drain(..))
            .collect();
        info!(
            "session finished: {} placed, {} unplaced, cage at {:.1}kg",
            placements.len(),
            unplaced.len(),
            cage.current_weight()
        );
        Ok(SessionReport {
            placements,
            unplaced,
        })
    }

    /// Removes a placed item from the temp buffer or the conveyor.
    fn remove_item(&mut self, id: u64) {
        if let Some(index) = self.temp_area.iter().position(|item| item.id == id) {
            self.temp_area.remove(index);
        } else if let Some(index) = self.conveyor.iter().position(|item| item.id == id) {
            self.conveyor.remove(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchors::AnchorEngine;
    use crate::config::SolverConfig;
    use crate::packer::HeuristicPacker;
    use crate::types::Vec3;

    fn exact_config() -> SolverConfig {
        SolverConfig::builder().measurement_error(0.0).build()
    }

    fn item(id: u64, dims: (f64, f64, f64)) -> Item {
        Item::new(id, Vec3::from_tuple(dims), 1.0, vec![0], false, 0.0).unwrap()
    }

    #[test]
    fn test_session_packs_everything_that_fits() {
        let mut cage = CageTrolley::new("t", Vec3::new(10.0, 10.0, 10.0), 100.0).unwrap();
        let mut packer = HeuristicPacker::new(AnchorEngine::SupportSurface, exact_config());
        let stream = vec![
            item(1, (5.0, 10.0, 10.0)),
            item(2, (5.0, 5.0, 10.0)),
            item(3, (5.0, 5.0, 10.0)),
        ];

        let mut driver = ConveyorDriver::new(stream, 3, 3);
        let report = driver.run(&mut cage, &mut packer).unwrap();

        assert!(report.is_complete());
        assert_eq!(report.placements.len(), 3);
        assert_eq!(cage.packed_items.len(), 3);
        assert_eq!(driver.state(), SessionState::Committed);
    }

    #[test]
    fn test_stuck_item_moves_to_temp_buffer() {
        let mut cage = CageTrolley::new("t", Vec3::new(10.0, 10.0, 10.0), 100.0).unwrap();
        let mut packer = HeuristicPacker::new(AnchorEngine::SupportSurface, exact_config());

        // The oversized head of the conveyor blocks until it is deferred;
        // the small item behind it still gets placed.
        let stream = vec![item(1, (11.0, 11.0, 11.0)), item(2, (5.0, 5.0, 5.0))];
        let mut driver = ConveyorDriver::new(stream, 3, 1);

        let first = driver.step(&mut cage, &mut packer).unwrap();
        assert_eq!(first, StepOutcome::Deferred(1));
        assert_eq!(driver.state(), SessionState::Stuck);

        let second = driver.step(&mut cage, &mut packer).unwrap();
        assert!(matches!(second, StepOutcome::Placed(p) if p.item_id == 2));
        assert_eq!(driver.state(), SessionState::Committed);

        let report = driver.run(&mut cage, &mut packer).unwrap();
        assert_eq!(report.unplaced.len(), 1);
        assert_eq!(report.unplaced[0].id, 1);
    }

    #[test]
    fn test_full_buffer_terminates_session() {
        let mut cage = CageTrolley::new("t", Vec3::new(10.0, 10.0, 10.0), 100.0).unwrap();
        let mut packer = HeuristicPacker::new(AnchorEngine::SupportSurface, exact_config());

        // Nothing fits and the buffer only holds one item.
        let stream = vec![item(1, (11.0, 11.0, 11.0)), item(2, (12.0, 12.0, 12.0))];
        let mut driver = ConveyorDriver::new(stream, 1, 2);

        let report = driver.run(&mut cage, &mut packer).unwrap();
        assert!(report.placements.is_empty());
        assert_eq!(report.unplaced.len(), 2);
        assert!(cage.packed_items.is_empty());
    }

    #[test]
    fn test_empty_conveyor_is_exhausted_immediately() {
        let mut cage = CageTrolley::new("t", Vec3::new(10.0, 10.0, 10.0), 100.0).unwrap();
        let mut packer = HeuristicPacker::new(AnchorEngine::CornerPoint, exact_config());

        let mut driver = ConveyorDriver::new(Vec::new(), 3, 3);
        let outcome = driver.step(&mut cage, &mut packer).unwrap();
        assert_eq!(outcome, StepOutcome::Exhausted);
        assert_eq!(driver.state(), SessionState::Idle);
    }
}
