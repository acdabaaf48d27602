//! Axis-aligned bounding boxes.
//!
//! Boxes are always stored with three components; 2D data pads the third axis
//! with zero so the same code path serves both dimensions. Degenerate
//! (single-point) boxes are legal. The *empty* box (`min = +inf`,
//! `max = -inf`) is the identity for [`BoundingBox::union`].

use serde::{Deserialize, Serialize};

/// Axis-aligned min/max box.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoundingBox {
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Self { min, max }
    }

    /// Identity for `union`: contains nothing.
    pub fn empty() -> Self {
        Self {
            min: [f64::INFINITY; 3],
            max: [f64::NEG_INFINITY; 3],
        }
    }

    pub fn is_empty(&self) -> bool {
        (0..3).any(|d| self.min[d] > self.max[d])
    }

    /// Degenerate box around a 2- or 3-component point.
    pub fn from_point(p: &[f64]) -> Self {
        let q = pad(p);
        Self { min: q, max: q }
    }

    /// Tight box around a set of points; empty for an empty iterator.
    pub fn from_points<'a, I>(points: I) -> Self
    where
        I: IntoIterator<Item = &'a [f64; 3]>,
    {
        let mut bb = Self::empty();
        for p in points {
            bb.include(p);
        }
        bb
    }

    /// Grow in place to cover `p`.
    pub fn include(&mut self, p: &[f64; 3]) {
        for d in 0..3 {
            self.min[d] = self.min[d].min(p[d]);
            self.max[d] = self.max[d].max(p[d]);
        }
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let mut out = *self;
        for d in 0..3 {
            out.min[d] = out.min[d].min(other.min[d]);
            out.max[d] = out.max[d].max(other.max[d]);
        }
        out
    }

    /// Overlap of two boxes, `None` when they are disjoint.
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        let mut out = BoundingBox::empty();
        for d in 0..3 {
            out.min[d] = self.min[d].max(other.min[d]);
            out.max[d] = self.max[d].min(other.max[d]);
        }
        if out.is_empty() { None } else { Some(out) }
    }

    /// Closed-box overlap test.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        (0..3).all(|d| self.min[d] <= other.max[d] && other.min[d] <= self.max[d])
    }

    /// Closed containment of `p` after growing the box by `tol` on every side.
    pub fn contains_point(&self, p: &[f64], tol: f64) -> bool {
        let q = pad(p);
        (0..3).all(|d| q[d] >= self.min[d] - tol && q[d] <= self.max[d] + tol)
    }

    /// Copy grown by `tol` on every side; empty stays empty.
    pub fn expanded(&self, tol: f64) -> BoundingBox {
        if self.is_empty() {
            return *self;
        }
        let mut out = *self;
        for d in 0..3 {
            out.min[d] -= tol;
            out.max[d] += tol;
        }
        out
    }

    pub fn extent(&self, axis: usize) -> f64 {
        (self.max[axis] - self.min[axis]).max(0.0)
    }

    pub fn center(&self) -> [f64; 3] {
        [
            0.5 * (self.min[0] + self.max[0]),
            0.5 * (self.min[1] + self.max[1]),
            0.5 * (self.min[2] + self.max[2]),
        ]
    }

    /// Length of the main diagonal (0 for empty or degenerate boxes).
    pub fn diagonal(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        (0..3).map(|d| self.extent(d).powi(2)).sum::<f64>().sqrt()
    }
}

/// Widen a 1-, 2- or 3-component point to three components.
pub(crate) fn pad(p: &[f64]) -> [f64; 3] {
    let mut q = [0.0; 3];
    for (dst, src) in q.iter_mut().zip(p.iter()) {
        *dst = *src;
    }
    q
}
