//! Node (vertex) capability.

use crate::topology::handle::Handle;

/// A mesh vertex: a handle plus `DIM` coordinates.
///
/// `DIM` is static, so every node of one concrete type has the same
/// dimension by construction.
pub trait NodeTraits {
    /// Spatial dimension (2 or 3).
    const DIM: usize;
    /// Iterator over the `DIM` coordinates.
    type CoordIter<'a>: Iterator<Item = f64> + 'a
    where
        Self: 'a;

    fn handle(&self) -> Handle;
    fn coords(&self) -> Self::CoordIter<'_>;
}

/// Plain 3D node used by tests and simple callers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Node3 {
    pub handle: Handle,
    pub xyz: [f64; 3],
}

impl NodeTraits for Node3 {
    const DIM: usize = 3;
    type CoordIter<'a> = std::iter::Copied<std::slice::Iter<'a, f64>>;

    fn handle(&self) -> Handle {
        self.handle
    }
    fn coords(&self) -> Self::CoordIter<'_> {
        self.xyz.iter().copied()
    }
}

/// Plain 2D node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Node2 {
    pub handle: Handle,
    pub xy: [f64; 2],
}

impl NodeTraits for Node2 {
    const DIM: usize = 2;
    type CoordIter<'a> = std::iter::Copied<std::slice::Iter<'a, f64>>;

    fn handle(&self) -> Handle {
        self.handle
    }
    fn coords(&self) -> Self::CoordIter<'_> {
        self.xy.iter().copied()
    }
}
