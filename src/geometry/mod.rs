//! Geometric primitives: bounding boxes, reference-element mappings and the
//! built-in target geometries.

pub mod bounding_box;
pub mod metrics;
pub mod shapes;

pub use bounding_box::BoundingBox;
pub use shapes::{Cuboid, Cylinder, PointGeometry};
