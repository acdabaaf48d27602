//! Data module: mesh views, managers and concrete field storage.

pub mod field;
pub mod field_manager;
pub mod geometry_manager;
pub mod mesh_manager;
pub mod mesh_view;

pub use field::FieldContainer;
pub use field_manager::FieldManager;
pub use geometry_manager::GeometryManager;
pub use mesh_manager::MeshManager;
pub use mesh_view::GenericMeshView;
