//! Geometry capability for integral-assembly targets.

use crate::geometry::bounding_box::BoundingBox;
use crate::mesh_error::MeshTransferError;
use bytemuck::Pod;

/// A query region: answers point-inside and bounding-box queries and has a
/// measure (length/area/volume).
pub trait GeometryTraits {
    const DIM: usize;

    fn measure(&self) -> f64;
    fn bounding_box(&self) -> BoundingBox;
    /// Closed containment, widened by the absolute distance `tolerance`.
    fn point_in_geometry(&self, point: &[f64], tolerance: f64) -> bool;

    fn centroid(&self) -> [f64; 3] {
        self.bounding_box().center()
    }
}

/// Geometries that can travel between ranks as one fixed-size record.
pub trait WireGeometry: GeometryTraits + Sized {
    type Wire: Pod;

    fn to_wire(&self) -> Self::Wire;
    fn from_wire(w: &Self::Wire) -> Result<Self, MeshTransferError>;
}
