//! Ordered collection of the mesh blocks one rank contributes to a transfer.

use crate::adapter::mesh::MeshTraits;
use crate::data::mesh_view::GenericMeshView;
use crate::geometry::bounding_box::BoundingBox;
use crate::mesh_error::MeshTransferError;

/// Local mesh blocks plus the spatial dimension they share.
///
/// Every rank lists the same blocks in the same order; a rank that owns none
/// of a block supplies a null view of the block's topology.
#[derive(Clone, Debug)]
pub struct MeshManager {
    blocks: Vec<GenericMeshView>,
    dimension: usize,
}

impl MeshManager {
    pub fn new(blocks: Vec<GenericMeshView>, dimension: usize) -> Result<Self, MeshTransferError> {
        if dimension != 2 && dimension != 3 {
            return Err(MeshTransferError::InvalidDimension(dimension));
        }
        if let Some(b) = blocks.iter().find(|b| b.dimension() != dimension) {
            return Err(MeshTransferError::DimensionMismatch {
                expected: dimension,
                found: b.dimension(),
            });
        }
        Ok(Self { blocks, dimension })
    }

    /// Snapshot an adapter mesh and append it as the next block.
    pub fn add_block<M: MeshTraits>(&mut self, mesh: &M) -> Result<usize, MeshTransferError> {
        let view = GenericMeshView::build(mesh)?;
        if view.dimension() != self.dimension {
            return Err(MeshTransferError::DimensionMismatch {
                expected: self.dimension,
                found: view.dimension(),
            });
        }
        self.blocks.push(view);
        Ok(self.blocks.len() - 1)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }
    pub fn block(&self, i: usize) -> Option<&GenericMeshView> {
        self.blocks.get(i)
    }
    pub fn blocks(&self) -> &[GenericMeshView] {
        &self.blocks
    }

    pub fn num_local_elements(&self) -> usize {
        self.blocks.iter().map(|b| b.num_elements()).sum()
    }

    /// Union of every local block's box; empty when all blocks are null.
    pub fn local_bounding_box(&self) -> BoundingBox {
        self.blocks
            .iter()
            .fold(BoundingBox::empty(), |acc, b| acc.union(&b.bounding_box()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::cell_type::CellType;

    #[test]
    fn rejects_mixed_dimensions() {
        let blocks = vec![
            GenericMeshView::null(3, CellType::Tetrahedron),
            GenericMeshView::null(2, CellType::Triangle),
        ];
        assert!(matches!(
            MeshManager::new(blocks, 3),
            Err(MeshTransferError::DimensionMismatch { expected: 3, found: 2 })
        ));
        assert!(matches!(MeshManager::new(vec![], 4), Err(MeshTransferError::InvalidDimension(4))));
    }

    #[test]
    fn null_blocks_have_empty_extent() {
        let mm = MeshManager::new(
            vec![
                GenericMeshView::null(3, CellType::Hexahedron),
                GenericMeshView::null(3, CellType::Wedge),
            ],
            3,
        )
        .unwrap();
        assert_eq!(mm.num_blocks(), 2);
        assert_eq!(mm.num_local_elements(), 0);
        assert!(mm.local_bounding_box().is_empty());
    }
}
