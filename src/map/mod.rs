//! Source-to-target mapping operators and the capabilities they call back.
//!
//! Both maps follow the same lifecycle: construct, `setup` (collective,
//! records which source elements feed which targets), then `apply` any
//! number of times (collective, moves field values). `apply` before `setup`
//! fails with [`MeshTransferError::NotSetUp`](crate::mesh_error::MeshTransferError::NotSetUp).

pub mod integral_assembly;
pub mod shared_domain;

use crate::adapter::field::FieldTraits;
use crate::topology::handle::Handle;

pub use integral_assembly::IntegralAssemblyMap;
pub use shared_domain::SharedDomainMap;

/// Measures (length/area/volume) of source elements owned by this rank.
pub trait ElementMeasure {
    /// One measure per handle, in order.
    fn measure(&self, elements: &[Handle]) -> Vec<f64>;
}

/// Integrates the source field over elements owned by this rank.
pub trait FieldIntegrator {
    type Field: FieldTraits;

    /// Component-major field with one entity per handle.
    fn integrate(&self, elements: &[Handle]) -> Self::Field;
}

/// Evaluates the source field at points inside elements owned by this rank.
pub trait FieldEvaluator {
    type Field: FieldTraits;

    /// `coords` is blocked (`coords[d * n + i]`, `n = elements.len()`); point
    /// `i` lies in element `elements[i]`. Returns one entity per point.
    fn evaluate(&self, elements: &[Handle], coords: &[f64]) -> Self::Field;
}
