#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-rendezvous
//!
//! mesh-rendezvous moves field data between independently partitioned meshes
//! and geometries in parallel scientific codes. It locates points in
//! unstructured meshes with a KD-tree, redistributes source elements and
//! target queries onto a shared spatial partition (the rendezvous step), and
//! assembles element integrals onto target geometries.
//!
//! ## Features
//! - Static adapter traits ([`adapter`]) so any mesh, field or geometry type
//!   can take part without copying beyond handles and coordinates
//! - [`GenericMeshView`](data::GenericMeshView): canonical snapshot of one
//!   single-topology mesh block
//! - [`KdTree`](search::KdTree) point location with an explicit
//!   `PointNotFound` outcome
//! - [`Rendezvous`](rendezvous::Rendezvous) decomposition over any
//!   [`Communicator`](algs::Communicator): serial, in-process threads, or MPI
//! - [`IntegralAssemblyMap`](map::IntegralAssemblyMap) and
//!   [`SharedDomainMap`](map::SharedDomainMap) transfer operators
//!
//! ## Collectives
//!
//! Every `setup`/`apply` and every rendezvous step is collective: all ranks
//! call it in the same order, including ranks that hold no data. There are no
//! timeouts; a rank that skips a collective hangs the others.
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! mesh-rendezvous = "0.3"
//! # Optional features:
//! # features = ["mpi-support", "rayon"]
//! ```

pub mod adapter;
pub mod algs;
pub mod config;
pub mod data;
pub mod debug_invariants;
pub mod geometry;
pub mod map;
pub mod mesh_error;
pub mod rendezvous;
pub mod search;
pub mod topology;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::adapter::{
        ElementTraits, FieldTraits, FieldTraitsMut, GeometryTraits, MeshTraits, NodeTraits,
        WireGeometry,
    };
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::communicator::{CommTag, Communicator, NoComm, RayonComm, ReduceOp};
    pub use crate::config::{MapConfig, Normalization};
    pub use crate::data::{
        FieldContainer, FieldManager, GenericMeshView, GeometryManager, MeshManager,
    };
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::geometry::{BoundingBox, Cuboid, Cylinder, PointGeometry};
    pub use crate::map::{
        ElementMeasure, FieldEvaluator, FieldIntegrator, IntegralAssemblyMap, SharedDomainMap,
    };
    pub use crate::mesh_error::MeshTransferError;
    pub use crate::rendezvous::{PointLocation, Rendezvous, RendezvousPartition};
    pub use crate::search::KdTree;
    pub use crate::topology::cell_type::CellType;
    pub use crate::topology::handle::Handle;
}
