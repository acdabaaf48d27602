//! Element capability.

use crate::topology::cell_type::CellType;
use crate::topology::handle::Handle;

/// A mesh element of one static topology.
///
/// `connectivity` yields vertex handles in the adapter's own local node
/// order; the owning mesh's permutation list maps that order onto the
/// canonical reference ordering.
pub trait ElementTraits {
    const TOPOLOGY: CellType;
    const NODES_PER_ELEMENT: usize = Self::TOPOLOGY.node_count();
    type ConnectivityIter<'a>: Iterator<Item = Handle> + 'a
    where
        Self: 'a;

    fn handle(&self) -> Handle;
    fn connectivity(&self) -> Self::ConnectivityIter<'_>;
}

/// Fixed-size element with `N` vertex handles and topology chosen by `T`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Element<T: TopologyMarker, const N: usize> {
    pub handle: Handle,
    pub vertices: [Handle; N],
    _topology: std::marker::PhantomData<T>,
}

impl<T: TopologyMarker, const N: usize> Element<T, N> {
    pub fn new(handle: Handle, vertices: [Handle; N]) -> Self {
        Self {
            handle,
            vertices,
            _topology: std::marker::PhantomData,
        }
    }
}

impl<T: TopologyMarker, const N: usize> ElementTraits for Element<T, N> {
    const TOPOLOGY: CellType = T::TOPOLOGY;
    const NODES_PER_ELEMENT: usize = N;
    type ConnectivityIter<'a>
        = std::iter::Copied<std::slice::Iter<'a, Handle>>
    where
        Self: 'a;

    fn handle(&self) -> Handle {
        self.handle
    }
    fn connectivity(&self) -> Self::ConnectivityIter<'_> {
        self.vertices.iter().copied()
    }
}

/// Zero-sized tag carrying a topology at the type level.
pub trait TopologyMarker: Copy + std::fmt::Debug + PartialEq {
    const TOPOLOGY: CellType;
}

macro_rules! topology_markers {
    ($($name:ident => $ct:ident),* $(,)?) => {
        $(
            #[derive(Clone, Copy, Debug, PartialEq)]
            pub struct $name;
            impl TopologyMarker for $name {
                const TOPOLOGY: CellType = CellType::$ct;
            }
        )*
    };
}

topology_markers! {
    SegmentTag => Segment,
    TriangleTag => Triangle,
    QuadTag => Quadrilateral,
    TetTag => Tetrahedron,
    HexTag => Hexahedron,
    PyramidTag => Pyramid,
    WedgeTag => Wedge,
}

pub type Tet4 = Element<TetTag, 4>;
pub type Hex8 = Element<HexTag, 8>;
pub type Pyramid5 = Element<PyramidTag, 5>;
pub type Wedge6 = Element<WedgeTag, 6>;
pub type Tri3 = Element<TriangleTag, 3>;
pub type Quad4 = Element<QuadTag, 4>;
