//! Local target geometries tagged with their global ids.

use crate::adapter::geometry::GeometryTraits;
use crate::geometry::bounding_box::BoundingBox;
use crate::mesh_error::MeshTransferError;
use std::collections::HashSet;

/// The geometries one rank owns, each with a globally unique id.
#[derive(Clone, Debug)]
pub struct GeometryManager<G> {
    geometries: Vec<G>,
    gids: Vec<u64>,
    dimension: usize,
}

impl<G: GeometryTraits> GeometryManager<G> {
    pub fn new(
        geometries: Vec<G>,
        gids: Vec<u64>,
        dimension: usize,
    ) -> Result<Self, MeshTransferError> {
        if dimension != 2 && dimension != 3 {
            return Err(MeshTransferError::InvalidDimension(dimension));
        }
        if G::DIM != dimension {
            return Err(MeshTransferError::DimensionMismatch {
                expected: dimension,
                found: G::DIM,
            });
        }
        if geometries.len() != gids.len() {
            return Err(MeshTransferError::InvalidGeometry(format!(
                "{} geometries but {} ids",
                geometries.len(),
                gids.len()
            )));
        }
        let mut seen = HashSet::with_capacity(gids.len());
        if let Some(dup) = gids.iter().find(|g| !seen.insert(**g)) {
            return Err(MeshTransferError::InvalidGeometry(format!(
                "duplicate geometry id {dup}"
            )));
        }
        Ok(Self {
            geometries,
            gids,
            dimension,
        })
    }

    /// A rank that owns no geometries still takes part in every exchange.
    pub fn empty(dimension: usize) -> Result<Self, MeshTransferError> {
        Self::new(Vec::new(), Vec::new(), dimension)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
    pub fn len(&self) -> usize {
        self.geometries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }
    pub fn geometries(&self) -> &[G] {
        &self.geometries
    }
    pub fn gids(&self) -> &[u64] {
        &self.gids
    }

    /// Local position of a global id.
    pub fn local_index(&self, gid: u64) -> Option<usize> {
        self.gids.iter().position(|&g| g == gid)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &G)> + '_ {
        self.gids.iter().copied().zip(self.geometries.iter())
    }

    pub fn local_bounding_box(&self) -> BoundingBox {
        self.geometries
            .iter()
            .fold(BoundingBox::empty(), |acc, g| acc.union(&g.bounding_box()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::shapes::Cylinder;

    #[test]
    fn validates_ids_and_dimension() {
        let c = Cylinder::new(1.0, 1.0, [0.0; 3]).unwrap();
        assert!(GeometryManager::new(vec![c, c], vec![3, 3], 3).is_err());
        assert!(GeometryManager::new(vec![c], vec![3, 4], 3).is_err());
        assert!(matches!(
            GeometryManager::new(vec![c], vec![3], 2),
            Err(MeshTransferError::DimensionMismatch { expected: 2, found: 3 })
        ));
        let gm = GeometryManager::new(vec![c, c], vec![7, 2], 3).unwrap();
        assert_eq!(gm.local_index(2), Some(1));
        assert_eq!(gm.local_bounding_box().max, [1.0, 1.0, 0.5]);
        assert!(GeometryManager::<Cylinder>::empty(3).unwrap().is_empty());
    }
}
