//! Support-surface maintenance.
//!
//! After every successful placement, the set of support surfaces is
//! rewritten: surfaces under the new item are cut around its footprint,
//! a new surface appears on the item's top face, and coplanar edge-aligned
//! neighbors are merged back together.
//!
//! The cut emits disjoint remainders, so the total surface area per height
//! stays conserved across updates (minus what disappears under footprints,
//! plus the new tops).

use log::debug;

use crate::geometry::Rect;
use crate::model::{Item, PackError, SupportSurface, SurfaceSupport};

/// Rewrites support surfaces after each placement.
#[derive(Clone, Debug)]
pub struct SurfaceManager {
    /// Merge coplanar edge-aligned neighbors after every update.
    merge_surfaces: bool,
    /// Height tolerance for grouping surfaces.
    merge_margin: f64,
}

impl SurfaceManager {
    pub fn new(merge_surfaces: bool, merge_margin: f64) -> Self {
        Self {
            merge_surfaces,
            merge_margin,
        }
    }

    /// Updates the surface set for a freshly committed item.
    ///
    /// Surfaces at the item's bottom height that intersect its footprint
    /// are cut into up to four remainders each; a new top surface is
    /// emitted over the footprint; unaffected surfaces pass through
    /// untouched.
    ///
    /// Returns an error when the item has no committed position; that is
    /// an internal inconsistency and the session must be reset.
    pub fn update(
        &self,
        placed_item: &Item,
        all_surfaces: &[SupportSurface],
    ) -> Result<Vec<SupportSurface>, PackError> {
        let placement = placed_item
            .placement
            .ok_or(PackError::MissingPlacement(placed_item.id))?;
        let dims = placed_item.rotated_dims(placement.rotation);
        let footprint = Rect::new(
            placement.position.x,
            placement.position.y,
            placement.position.x + dims.x,
            placement.position.y + dims.y,
        );
        let bottom_z = placement.position.z;
        let top_z = bottom_z + dims.z;

        let mut result = Vec::with_capacity(all_surfaces.len() + 4);
        for surface in all_surfaces {
            let affected = (surface.z - bottom_z).abs() < self.merge_margin
                && surface.rect.intersection_area(&footprint) > 0.0;
            if affected {
                result.extend(cut_surface(surface, &footprint));
            } else {
                result.push(surface.clone());
            }
        }

        result.push(SupportSurface::new(
            top_z,
            footprint,
            vec![SurfaceSupport::Item(placed_item.id)],
        ));

        let result = if self.merge_surfaces {
            self.merge_pass(result)
        } else {
            result
        };

        debug!(
            "surfaces updated for item {}: {} surfaces, new top at z={:.1}",
            placed_item.id,
            result.len(),
            top_z
        );
        Ok(result)
    }

    /// Greedy merge of coplanar, edge-aligned neighbors.
    ///
    /// Within each height group, any pair that shares a full edge is
    /// replaced by the union rectangle until no pair merges. Applying the
    /// pass twice gives the same result as applying it once.
    fn merge_pass(&self, surfaces: Vec<SupportSurface>) -> Vec<SupportSurface> {
        let mut remaining = surfaces;
        let mut merged: Vec<SupportSurface> = Vec::with_capacity(remaining.len());

        while let Some(seed) = remaining.first().cloned() {
            // Collect the height group of the seed surface.
            let mut group: Vec<SupportSurface> = Vec::new();
            let mut rest: Vec<SupportSurface> = Vec::new();
            for s in remaining {
                if (s.z - seed.z).abs() < self.merge_margin {
                    group.push(s);
                } else {
                    rest.push(s);
                }
            }
            remaining = rest;

            // Repeatedly merge any pair until the group is stable.
            'scan: loop {
                for i in 0..group.len() {
                    for j in (i + 1)..group.len() {
                        if let Some(rect) = try_merge_rects(&group[i].rect, &group[j].rect) {
                            let mut supports = group[i].supporting_items.clone();
                            supports.extend(group[j].supporting_items.iter().copied());
                            supports.sort();
                            supports.dedup();

                            let z = group[i].z;
                            debug_assert!(rect.area() > 0.0);
                            group.swap_remove(j);
                            group.swap_remove(i);
                            group.push(SupportSurface::new(z, rect, supports));
                            continue 'scan;
                        }
                    }
                }
                break;
            }

            merged.extend(group);
        }

        merged
    }
}

impl Default for SurfaceManager {
    fn default() -> Self {
        Self::new(true, crate::config::SolverConfig::DEFAULT_MERGE_MARGIN)
    }
}

/// Cuts `footprint` out of a surface and returns the disjoint remainders.
///
/// The cutter is clipped to the surface first; the remainders are the
/// full-width strips below and above the cut plus the side pieces within
/// the cut's y-range. Degenerate pieces are dropped.
fn cut_surface(surface: &SupportSurface, footprint: &Rect) -> Vec<SupportSurface> {
    let s = surface.rect;
    let c = s.clip(footprint);

    let candidates = [
        // Below
        Rect::new(s.x_min, s.y_min, s.x_max, c.y_min),
        // Above
        Rect::new(s.x_min, c.y_max, s.x_max, s.y_max),
        // Left
        Rect::new(s.x_min, c.y_min, c.x_min, c.y_max),
        // Right
        Rect::new(c.x_max, c.y_min, s.x_max, c.y_max),
    ];

    candidates
        .into_iter()
        .filter(Rect::is_valid)
        .map(|rect| SupportSurface::new(surface.z, rect, surface.supporting_items.clone()))
        .collect()
}

/// Tries to merge two rectangles sharing a full edge.
///
/// Cut coordinates are produced by min/max of the inputs, so the edge
/// comparison uses exact equality.
fn try_merge_rects(r1: &Rect, r2: &Rect) -> Option<Rect> {
    // Adjacent along X (left/right neighbors, same y-span).
    if r1.y_min == r2.y_min && r1.y_max == r2.y_max {
        if r1.x_max == r2.x_min {
            return Some(Rect::new(r1.x_min, r1.y_min, r2.x_max, r1.y_max));
        }
        if r2.x_max == r1.x_min {
            return Some(Rect::new(r2.x_min, r1.y_min, r1.x_max, r1.y_max));
        }
    }

    // Adjacent along Y (below/above neighbors, same x-span).
    if r1.x_min == r2.x_min && r1.x_max == r2.x_max {
        if r1.y_max == r2.y_min {
            return Some(Rect::new(r1.x_min, r1.y_min, r1.x_max, r2.y_max));
        }
        if r2.y_max == r1.y_min {
            return Some(Rect::new(r1.x_min, r2.y_min, r1.x_max, r1.y_max));
        }
    }

    None
}
