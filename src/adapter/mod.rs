//! Capability contracts that external mesh, field and geometry types satisfy
//! to participate in a transfer.
//!
//! Every contract is static: dimension, topology and node counts are
//! associated constants, iteration goes through generic associated iterator
//! types, and nothing here allocates or dispatches dynamically. The only data
//! the core ever copies out of an adapter is handles and coordinates, and only
//! once, when a [`GenericMeshView`](crate::data::mesh_view::GenericMeshView)
//! is built.

pub mod element;
pub mod field;
pub mod geometry;
pub mod mesh;
pub mod node;

pub use element::ElementTraits;
pub use field::{FieldTraits, FieldTraitsMut};
pub use geometry::{GeometryTraits, WireGeometry};
pub use mesh::MeshTraits;
pub use node::NodeTraits;
