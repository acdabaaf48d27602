//! Built-in target geometries: a point, an axis-aligned box and a
//! z-aligned cylinder.
//!
//! All three are 3D and cross ranks as a single wire record.

use crate::adapter::geometry::{GeometryTraits, WireGeometry};
use crate::algs::wire::{WireCuboid, WireCylinder, WirePointGeometry};
use crate::geometry::bounding_box::{BoundingBox, pad};
use crate::mesh_error::MeshTransferError;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// A single point; zero measure.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointGeometry {
    pub xyz: [f64; 3],
}

impl PointGeometry {
    pub fn new(xyz: [f64; 3]) -> Self {
        Self { xyz }
    }
}

impl GeometryTraits for PointGeometry {
    const DIM: usize = 3;

    fn measure(&self) -> f64 {
        0.0
    }
    fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_point(&self.xyz)
    }
    fn point_in_geometry(&self, point: &[f64], tolerance: f64) -> bool {
        let p = pad(point);
        let d2: f64 = (0..3).map(|d| (p[d] - self.xyz[d]).powi(2)).sum();
        d2.sqrt() <= tolerance
    }
    fn centroid(&self) -> [f64; 3] {
        self.xyz
    }
}

impl WireGeometry for PointGeometry {
    type Wire = WirePointGeometry;

    fn to_wire(&self) -> WirePointGeometry {
        WirePointGeometry::new(self.xyz)
    }
    fn from_wire(w: &WirePointGeometry) -> Result<Self, MeshTransferError> {
        Ok(Self::new(w.xyz()))
    }
}

/// Axis-aligned box.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cuboid {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Cuboid {
    /// Rejects boxes with `min > max` on any axis.
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Result<Self, MeshTransferError> {
        if (0..3).any(|d| !(min[d] <= max[d])) {
            return Err(MeshTransferError::InvalidGeometry(format!(
                "box min {min:?} exceeds max {max:?}"
            )));
        }
        Ok(Self { min, max })
    }
}

impl GeometryTraits for Cuboid {
    const DIM: usize = 3;

    fn measure(&self) -> f64 {
        (0..3).map(|d| self.max[d] - self.min[d]).product()
    }
    fn bounding_box(&self) -> BoundingBox {
        BoundingBox::new(self.min, self.max)
    }
    fn point_in_geometry(&self, point: &[f64], tolerance: f64) -> bool {
        self.bounding_box().contains_point(point, tolerance)
    }
}

impl WireGeometry for Cuboid {
    type Wire = WireCuboid;

    fn to_wire(&self) -> WireCuboid {
        WireCuboid::new(self.min, self.max)
    }
    fn from_wire(w: &WireCuboid) -> Result<Self, MeshTransferError> {
        Cuboid::new(w.min(), w.max())
    }
}

/// Right circular cylinder with its axis parallel to z.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cylinder {
    pub length: f64,
    pub radius: f64,
    pub center: [f64; 3],
}

impl Cylinder {
    pub fn new(length: f64, radius: f64, center: [f64; 3]) -> Result<Self, MeshTransferError> {
        if !(length >= 0.0) || !(radius >= 0.0) {
            return Err(MeshTransferError::InvalidGeometry(format!(
                "cylinder needs non-negative length and radius, got {length} and {radius}"
            )));
        }
        Ok(Self {
            length,
            radius,
            center,
        })
    }
}

impl GeometryTraits for Cylinder {
    const DIM: usize = 3;

    fn measure(&self) -> f64 {
        PI * self.radius * self.radius * self.length
    }
    fn bounding_box(&self) -> BoundingBox {
        let [x, y, z] = self.center;
        let (r, h) = (self.radius, 0.5 * self.length);
        BoundingBox::new([x - r, y - r, z - h], [x + r, y + r, z + h])
    }
    fn point_in_geometry(&self, point: &[f64], tolerance: f64) -> bool {
        let p = pad(point);
        let dx = p[0] - self.center[0];
        let dy = p[1] - self.center[1];
        let radial = (dx * dx + dy * dy).sqrt();
        radial <= self.radius + tolerance
            && (p[2] - self.center[2]).abs() <= 0.5 * self.length + tolerance
    }
    fn centroid(&self) -> [f64; 3] {
        self.center
    }
}

impl WireGeometry for Cylinder {
    type Wire = WireCylinder;

    fn to_wire(&self) -> WireCylinder {
        WireCylinder::new(self.length, self.radius, self.center)
    }
    fn from_wire(w: &WireCylinder) -> Result<Self, MeshTransferError> {
        Cylinder::new(w.length(), w.radius(), w.center())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cylinder_containment_and_measure() {
        let c = Cylinder::new(4.0, 4.5, [4.5, 4.5, 2.0]).unwrap();
        assert!(c.point_in_geometry(&[4.5, 4.5, 0.0], 1e-6));
        assert!(c.point_in_geometry(&[9.0, 4.5, 4.0], 1e-6));
        assert!(!c.point_in_geometry(&[9.0, 9.0, 2.0], 1e-6));
        assert!(!c.point_in_geometry(&[4.5, 4.5, 4.1], 1e-6));
        assert!((c.measure() - PI * 4.5 * 4.5 * 4.0).abs() < 1e-12);
        let bb = c.bounding_box();
        assert_eq!(bb.min, [0.0, 0.0, 0.0]);
        assert_eq!(bb.max, [9.0, 9.0, 4.0]);
    }

    #[test]
    fn cuboid_rejects_inverted_bounds() {
        assert!(Cuboid::new([0.0; 3], [1.0, -1.0, 1.0]).is_err());
        let b = Cuboid::new([0.0; 3], [9.0, 9.0, 4.0]).unwrap();
        assert_eq!(b.measure(), 324.0);
        assert!(b.point_in_geometry(&[9.0, 0.0, 4.0], 0.0));
    }

    #[test]
    fn wire_records_rebuild_geometry() {
        let c = Cylinder::new(2.0, 1.0, [0.0, 1.0, 2.0]).unwrap();
        assert_eq!(Cylinder::from_wire(&c.to_wire()).unwrap(), c);
        let b = Cuboid::new([-1.0; 3], [1.0; 3]).unwrap();
        assert_eq!(Cuboid::from_wire(&b.to_wire()).unwrap(), b);
        let p = PointGeometry::new([1.0, 2.0, 3.0]);
        assert!(p.point_in_geometry(&[1.0, 2.0, 3.0 + 1e-9], 1e-6));
    }
}
