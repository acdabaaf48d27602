//! Spatial hash of the global bounding box onto ranks.
//!
//! The global box is cut into a regular grid of at most `P` cells. Starting
//! from a single cell, the axis whose cells are currently longest gains one
//! more slice, as long as the total cell count stays within `P`. Axes with
//! zero extent are never cut. Cells are numbered with x varying fastest and
//! cell `c` is owned by rank `c mod P`.
//!
//! Cells are closed, so a point on a seam belongs to every cell that touches
//! it. [`RendezvousPartition::owner_of_point`] picks the lowest of those
//! ranks; [`RendezvousPartition::ranks_overlapping`] reports all of them.
//! Coordinates outside the global box are clamped onto it.

use itertools::{EitherOrBoth, Itertools};

use crate::debug_invariants::DebugInvariants;
use crate::geometry::bounding_box::{BoundingBox, pad};
use crate::mesh_error::MeshTransferError;

#[derive(Clone, Debug, PartialEq)]
pub struct RendezvousPartition {
    global: BoundingBox,
    dims: [usize; 3],
    num_ranks: usize,
}

impl RendezvousPartition {
    /// Partition `global` over `num_ranks` ranks. An empty box collapses to a
    /// single cell at the origin.
    pub fn new(global: BoundingBox, num_ranks: usize) -> Result<Self, MeshTransferError> {
        if num_ranks == 0 {
            return Err(MeshTransferError::InvalidConfig(
                "rendezvous partition needs at least one rank".into(),
            ));
        }
        let global = if global.is_empty() {
            BoundingBox::from_point(&[0.0; 3])
        } else {
            global
        };
        let dims = grid_dims(&global, num_ranks);
        let part = Self {
            global,
            dims,
            num_ranks,
        };
        part.debug_assert_invariants();
        Ok(part)
    }

    pub fn global_box(&self) -> &BoundingBox {
        &self.global
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn num_cells(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn num_ranks(&self) -> usize {
        self.num_ranks
    }

    /// Owner of the cell with grid coordinates `(i, j, k)`.
    pub fn cell_owner(&self, cell: [usize; 3]) -> usize {
        let [nx, ny, _] = self.dims;
        (cell[0] + cell[1] * nx + cell[2] * nx * ny) % self.num_ranks
    }

    /// Closed box of cell `(i, j, k)`.
    pub fn cell_box(&self, cell: [usize; 3]) -> BoundingBox {
        let mut out = self.global;
        for a in 0..3 {
            if self.dims[a] > 1 {
                let h = self.global.extent(a) / self.dims[a] as f64;
                out.min[a] = self.global.min[a] + h * cell[a] as f64;
                out.max[a] = if cell[a] + 1 == self.dims[a] {
                    self.global.max[a]
                } else {
                    self.global.min[a] + h * (cell[a] + 1) as f64
                };
            }
        }
        out
    }

    /// Grid position of `x` along `axis` in cell units, clamped to the box.
    fn grid_coord(&self, axis: usize, x: f64) -> f64 {
        let n = self.dims[axis];
        let ext = self.global.extent(axis);
        if n == 1 || ext <= 0.0 {
            return 0.0;
        }
        let x = x.clamp(self.global.min[axis], self.global.max[axis]);
        ((x - self.global.min[axis]) / ext * n as f64).clamp(0.0, n as f64)
    }

    /// Inclusive range of cells along `axis` whose closed extent meets `[lo, hi]`.
    fn cell_range(&self, axis: usize, lo: f64, hi: f64) -> (usize, usize) {
        let n = self.dims[axis];
        let tl = self.grid_coord(axis, lo);
        let th = self.grid_coord(axis, hi);
        let first = (tl.ceil() as usize).saturating_sub(1).min(n - 1);
        let last = (th.floor() as usize).min(n - 1);
        (first, last.max(first))
    }

    /// Lowest rank among the closed cells containing `point`.
    pub fn owner_of_point(&self, point: &[f64]) -> usize {
        let p = pad(point);
        self.ranks_overlapping(&BoundingBox::from_point(&p))
            .first()
            .copied()
            .unwrap_or(0)
    }

    /// Every rank owning a cell that meets `bbox`, sorted and deduplicated.
    pub fn ranks_overlapping(&self, bbox: &BoundingBox) -> Vec<usize> {
        if bbox.is_empty() {
            return Vec::new();
        }
        let r: [(usize, usize); 3] =
            std::array::from_fn(|a| self.cell_range(a, bbox.min[a], bbox.max[a]));
        (r[2].0..=r[2].1)
            .cartesian_product(r[1].0..=r[1].1)
            .cartesian_product(r[0].0..=r[0].1)
            .map(|((k, j), i)| self.cell_owner([i, j, k]))
            .sorted_unstable()
            .dedup()
            .collect()
    }

    /// Lowest rank that receives both an item with box `a` and one with box
    /// `b`, if any.
    pub fn shared_owner(&self, a: &BoundingBox, b: &BoundingBox) -> Option<usize> {
        self.ranks_overlapping(a)
            .into_iter()
            .merge_join_by(self.ranks_overlapping(b), |x, y| x.cmp(y))
            .find_map(|pair| match pair {
                EitherOrBoth::Both(r, _) => Some(r),
                _ => None,
            })
    }
}

/// Greedy refinement: slice the axis with the longest cells while the cell
/// count stays within `num_ranks`. Ties go to the lowest axis.
fn grid_dims(global: &BoundingBox, num_ranks: usize) -> [usize; 3] {
    let mut dims = [1usize; 3];
    loop {
        let best = (0..3)
            .filter(|&a| global.extent(a) > 0.0)
            .map(|a| (a, global.extent(a) / dims[a] as f64))
            .fold(None::<(usize, f64)>, |acc, (a, h)| match acc {
                Some((_, bh)) if bh >= h => acc,
                _ => Some((a, h)),
            });
        let Some((axis, _)) = best else { break };
        let grown: usize = dims.iter().product::<usize>() / dims[axis] * (dims[axis] + 1);
        if grown > num_ranks {
            break;
        }
        dims[axis] += 1;
    }
    dims
}

impl DebugInvariants for RendezvousPartition {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "RendezvousPartition invalid");
    }

    fn validate_invariants(&self) -> Result<(), MeshTransferError> {
        if self.dims.iter().any(|&d| d == 0) || self.num_cells() > self.num_ranks {
            return Err(MeshTransferError::InvalidConfig(format!(
                "grid {:?} does not fit {} ranks",
                self.dims, self.num_ranks
            )));
        }
        if self.global.is_empty() {
            return Err(MeshTransferError::InvalidConfig(
                "partition over an empty box".into(),
            ));
        }
        Ok(())
    }
}
