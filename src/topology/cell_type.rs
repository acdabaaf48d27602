//! Element topology tags.
//!
//! Each tag has a fixed node count and a canonical reference element; the
//! vertex ordering of every reference element is documented in
//! [`crate::geometry::metrics`].

use serde::{Deserialize, Serialize};

/// Supported element topologies.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub enum CellType {
    /// 0D vertex.
    #[default]
    Vertex,
    /// 1D line segment.
    Segment,
    /// 2D simplex (triangle).
    Triangle,
    /// 2D tensor-product cell (quad).
    Quadrilateral,
    /// 3D simplex (tet).
    Tetrahedron,
    /// 3D tensor-product cell (hex).
    Hexahedron,
    /// 3D pyramid with a quadrilateral base.
    Pyramid,
    /// 3D wedge (triangular prism).
    Wedge,
}

impl CellType {
    /// All tags in wire-code order.
    pub const ALL: [CellType; 8] = [
        CellType::Vertex,
        CellType::Segment,
        CellType::Triangle,
        CellType::Quadrilateral,
        CellType::Tetrahedron,
        CellType::Hexahedron,
        CellType::Pyramid,
        CellType::Wedge,
    ];

    /// Topological dimension of the reference element.
    pub const fn dimension(self) -> usize {
        match self {
            CellType::Vertex => 0,
            CellType::Segment => 1,
            CellType::Triangle | CellType::Quadrilateral => 2,
            CellType::Tetrahedron | CellType::Hexahedron | CellType::Pyramid | CellType::Wedge => 3,
        }
    }

    /// Number of nodes of the linear element.
    pub const fn node_count(self) -> usize {
        match self {
            CellType::Vertex => 1,
            CellType::Segment => 2,
            CellType::Triangle => 3,
            CellType::Quadrilateral | CellType::Tetrahedron => 4,
            CellType::Pyramid => 5,
            CellType::Wedge => 6,
            CellType::Hexahedron => 8,
        }
    }

    /// Stable code used on the wire.
    pub fn wire_code(self) -> u16 {
        match self {
            CellType::Vertex => 0,
            CellType::Segment => 1,
            CellType::Triangle => 2,
            CellType::Quadrilateral => 3,
            CellType::Tetrahedron => 4,
            CellType::Hexahedron => 5,
            CellType::Pyramid => 6,
            CellType::Wedge => 7,
        }
    }

    /// Inverse of [`CellType::wire_code`].
    pub fn from_wire_code(code: u16) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }
}
