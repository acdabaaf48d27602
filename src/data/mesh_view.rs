//! `GenericMeshView`: canonical, adapter-independent snapshot of one mesh block.
//!
//! Layout
//! - `coordinates` is blocked per axis: all x, then all y, then (3D) all z,
//!   so its length is `dimension * num_vertices`.
//! - `connectivity` is blocked per local node index: local node 0 of every
//!   element, then local node 1 of every element, and so on, so its length
//!   is `nodes_per_element * num_elements`.
//! - `permutation[i]` names the adapter's local node that plays the role of
//!   canonical reference node `i`.
//!
//! A view with zero vertices and zero elements is *null*: a valid state
//! meaning "this rank holds nothing of this block". Null views still carry
//! their topology and permutation so every rank agrees on block layout.

use crate::adapter::element::ElementTraits;
use crate::adapter::mesh::MeshTraits;
use crate::adapter::node::NodeTraits;
use crate::debug_invariants::DebugInvariants;
use crate::geometry::bounding_box::BoundingBox;
use crate::geometry::metrics;
use crate::mesh_error::MeshTransferError;
use crate::topology::cell_type::CellType;
use crate::topology::handle::Handle;
use std::collections::HashMap;

/// Snapshot of one single-topology mesh block.
#[derive(Clone, Debug)]
pub struct GenericMeshView {
    dimension: usize,
    vertex_handles: Vec<Handle>,
    coordinates: Vec<f64>,
    element_handles: Vec<Handle>,
    connectivity: Vec<Handle>,
    topology: CellType,
    permutation: Vec<usize>,
    // derived: element-major local vertex indices in canonical order
    canonical: Vec<usize>,
    vertex_lookup: HashMap<Handle, usize>,
    element_lookup: HashMap<Handle, usize>,
}

impl PartialEq for GenericMeshView {
    fn eq(&self, other: &Self) -> bool {
        self.dimension == other.dimension
            && self.vertex_handles == other.vertex_handles
            && self.coordinates == other.coordinates
            && self.element_handles == other.element_handles
            && self.connectivity == other.connectivity
            && self.topology == other.topology
            && self.permutation == other.permutation
    }
}

impl GenericMeshView {
    /// Snapshot an adapter mesh. Nodes and elements are each iterated once;
    /// the result owns all of its data.
    pub fn build<M: MeshTraits>(mesh: &M) -> Result<Self, MeshTransferError> {
        let dim = <M::Node as NodeTraits>::DIM;
        let topology = <M::Element as ElementTraits>::TOPOLOGY;
        let npe = <M::Element as ElementTraits>::NODES_PER_ELEMENT;
        if dim != 2 && dim != 3 {
            return Err(MeshTransferError::InvalidDimension(dim));
        }
        if npe != topology.node_count() {
            return Err(MeshTransferError::InvalidGeometry(format!(
                "{topology:?} elements have {} nodes, adapter declares {npe}",
                topology.node_count()
            )));
        }

        let mut vertex_handles = Vec::new();
        let mut interleaved = Vec::new();
        for node in mesh.nodes() {
            vertex_handles.push(node.handle());
            let before = interleaved.len();
            interleaved.extend(node.coords().take(dim));
            if interleaved.len() - before != dim {
                return Err(MeshTransferError::DimensionMismatch {
                    expected: dim,
                    found: interleaved.len() - before,
                });
            }
        }
        let nv = vertex_handles.len();
        let mut coordinates = vec![0.0; dim * nv];
        for (i, xyz) in interleaved.chunks_exact(dim).enumerate() {
            for (d, x) in xyz.iter().enumerate() {
                coordinates[d * nv + i] = *x;
            }
        }

        let mut element_handles = Vec::new();
        let mut element_major = Vec::new();
        for element in mesh.elements() {
            element_handles.push(element.handle());
            let before = element_major.len();
            element_major.extend(element.connectivity().take(npe));
            if element_major.len() - before != npe {
                return Err(MeshTransferError::ConnectivityLengthMismatch {
                    expected: npe,
                    found: element_major.len() - before,
                });
            }
        }
        let ne = element_handles.len();
        if ne == 0 {
            // orphan nodes are dropped; an element-less block is a null view
            let permutation = mesh.permutation().into_owned();
            check_permutation(&permutation, npe)?;
            return Ok(Self::null_with_permutation(dim, topology, permutation));
        }
        let mut connectivity = vec![Handle::default(); npe * ne];
        for (e, nodes) in element_major.chunks_exact(npe.max(1)).enumerate() {
            for (n, h) in nodes.iter().enumerate() {
                connectivity[n * ne + e] = *h;
            }
        }

        Self::from_parts(
            dim,
            vertex_handles,
            coordinates,
            topology,
            element_handles,
            connectivity,
            mesh.permutation().into_owned(),
        )
    }

    /// Assemble a view from already-blocked arrays, validating every layout
    /// invariant.
    pub fn from_parts(
        dimension: usize,
        vertex_handles: Vec<Handle>,
        coordinates: Vec<f64>,
        topology: CellType,
        element_handles: Vec<Handle>,
        connectivity: Vec<Handle>,
        permutation: Vec<usize>,
    ) -> Result<Self, MeshTransferError> {
        if dimension != 2 && dimension != 3 {
            return Err(MeshTransferError::InvalidDimension(dimension));
        }
        let npe = topology.node_count();
        check_permutation(&permutation, npe)?;

        let nv = vertex_handles.len();
        if coordinates.len() != dimension * nv {
            return Err(MeshTransferError::CoordinateLengthMismatch {
                expected: dimension * nv,
                found: coordinates.len(),
            });
        }
        let ne = element_handles.len();
        if connectivity.len() != npe * ne {
            return Err(MeshTransferError::ConnectivityLengthMismatch {
                expected: npe * ne,
                found: connectivity.len(),
            });
        }

        let vertex_lookup = index_handles(&vertex_handles, "vertex")?;
        let element_lookup = index_handles(&element_handles, "element")?;

        let mut canonical = Vec::with_capacity(npe * ne);
        for e in 0..ne {
            for &local in &permutation {
                let h = connectivity[local * ne + e];
                let idx = *vertex_lookup
                    .get(&h)
                    .ok_or(MeshTransferError::UnknownVertex(h))?;
                canonical.push(idx);
            }
        }

        let view = Self {
            dimension,
            vertex_handles,
            coordinates,
            element_handles,
            connectivity,
            topology,
            permutation,
            canonical,
            vertex_lookup,
            element_lookup,
        };
        view.debug_assert_invariants();
        Ok(view)
    }

    /// Empty view of the given topology with the identity permutation.
    pub fn null(dimension: usize, topology: CellType) -> Self {
        Self::null_with_permutation(dimension, topology, (0..topology.node_count()).collect())
    }

    /// Empty view that keeps a caller-supplied permutation.
    pub fn null_with_permutation(
        dimension: usize,
        topology: CellType,
        permutation: Vec<usize>,
    ) -> Self {
        Self {
            dimension,
            vertex_handles: Vec::new(),
            coordinates: Vec::new(),
            element_handles: Vec::new(),
            connectivity: Vec::new(),
            topology,
            permutation,
            canonical: Vec::new(),
            vertex_lookup: HashMap::new(),
            element_lookup: HashMap::new(),
        }
    }

    pub fn is_null(&self) -> bool {
        self.vertex_handles.is_empty() && self.element_handles.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
    pub fn topology(&self) -> CellType {
        self.topology
    }
    pub fn nodes_per_element(&self) -> usize {
        self.topology.node_count()
    }
    pub fn permutation(&self) -> &[usize] {
        &self.permutation
    }
    pub fn num_vertices(&self) -> usize {
        self.vertex_handles.len()
    }
    pub fn num_elements(&self) -> usize {
        self.element_handles.len()
    }
    pub fn vertex_handles(&self) -> &[Handle] {
        &self.vertex_handles
    }
    pub fn element_handles(&self) -> &[Handle] {
        &self.element_handles
    }
    /// Blocked coordinates (see module docs).
    pub fn coordinates(&self) -> &[f64] {
        &self.coordinates
    }
    /// Blocked connectivity in adapter node order (see module docs).
    pub fn connectivity(&self) -> &[Handle] {
        &self.connectivity
    }

    pub fn vertex_index(&self, h: Handle) -> Option<usize> {
        self.vertex_lookup.get(&h).copied()
    }
    pub fn element_index(&self, h: Handle) -> Option<usize> {
        self.element_lookup.get(&h).copied()
    }

    /// Coordinates of local vertex `i`, padded to three components.
    pub fn vertex_coords(&self, i: usize) -> [f64; 3] {
        let nv = self.num_vertices();
        let mut xyz = [0.0; 3];
        for (d, x) in xyz.iter_mut().enumerate().take(self.dimension) {
            *x = self.coordinates[d * nv + i];
        }
        xyz
    }

    /// Local vertex indices of element `e` in canonical reference order.
    pub fn element_vertex_indices(&self, e: usize) -> &[usize] {
        let npe = self.nodes_per_element();
        &self.canonical[e * npe..(e + 1) * npe]
    }

    /// Vertex handles of element `e` in canonical reference order.
    pub fn element_vertex_handles(&self, e: usize) -> impl Iterator<Item = Handle> + '_ {
        self.element_vertex_indices(e)
            .iter()
            .map(|&i| self.vertex_handles[i])
    }

    /// Vertex coordinates of element `e` in canonical reference order.
    pub fn element_vertices(&self, e: usize) -> Vec<[f64; 3]> {
        self.element_vertex_indices(e)
            .iter()
            .map(|&i| self.vertex_coords(i))
            .collect()
    }

    pub fn element_bounding_box(&self, e: usize) -> BoundingBox {
        let mut bb = BoundingBox::empty();
        for &i in self.element_vertex_indices(e) {
            bb.include(&self.vertex_coords(i));
        }
        bb
    }

    /// Box around every vertex; empty for a null view.
    pub fn bounding_box(&self) -> BoundingBox {
        let mut bb = BoundingBox::empty();
        for i in 0..self.num_vertices() {
            bb.include(&self.vertex_coords(i));
        }
        bb
    }

    /// Geometric measure (length/area/volume) of element `e`.
    pub fn element_measure(&self, e: usize) -> Result<f64, MeshTransferError> {
        metrics::cell_volume(self.topology, &self.element_vertices(e))
    }

    /// Exact containment of `point` in element `e`.
    pub fn element_contains(
        &self,
        e: usize,
        point: &[f64; 3],
        tol: f64,
    ) -> Result<bool, MeshTransferError> {
        metrics::point_in_cell(self.topology, &self.element_vertices(e), point, tol)
    }
}

impl DebugInvariants for GenericMeshView {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "GenericMeshView invalid");
    }

    fn validate_invariants(&self) -> Result<(), MeshTransferError> {
        let nv = self.num_vertices();
        let ne = self.num_elements();
        let npe = self.nodes_per_element();
        if self.coordinates.len() != self.dimension * nv {
            return Err(MeshTransferError::CoordinateLengthMismatch {
                expected: self.dimension * nv,
                found: self.coordinates.len(),
            });
        }
        if self.connectivity.len() != npe * ne {
            return Err(MeshTransferError::ConnectivityLengthMismatch {
                expected: npe * ne,
                found: self.connectivity.len(),
            });
        }
        check_permutation(&self.permutation, npe)?;
        if self.vertex_lookup.len() != nv {
            index_handles(&self.vertex_handles, "vertex")?;
        }
        if self.element_lookup.len() != ne {
            index_handles(&self.element_handles, "element")?;
        }
        if let Some(h) = self
            .connectivity
            .iter()
            .find(|h| !self.vertex_lookup.contains_key(h))
        {
            return Err(MeshTransferError::UnknownVertex(*h));
        }
        if self.canonical.len() != npe * ne {
            return Err(MeshTransferError::ConnectivityLengthMismatch {
                expected: npe * ne,
                found: self.canonical.len(),
            });
        }
        Ok(())
    }
}

/// Position of every handle; handles must be unique within the block.
fn index_handles(
    handles: &[Handle],
    kind: &'static str,
) -> Result<HashMap<Handle, usize>, MeshTransferError> {
    let mut lookup = HashMap::with_capacity(handles.len());
    for (i, &handle) in handles.iter().enumerate() {
        if lookup.insert(handle, i).is_some() {
            return Err(MeshTransferError::DuplicateHandle { kind, handle });
        }
    }
    Ok(lookup)
}

fn check_permutation(permutation: &[usize], npe: usize) -> Result<(), MeshTransferError> {
    if permutation.len() != npe {
        return Err(MeshTransferError::InvalidPermutation(format!(
            "expected {npe} entries, found {}",
            permutation.len()
        )));
    }
    let mut seen = vec![false; npe];
    for &p in permutation {
        if p >= npe || std::mem::replace(&mut seen[p], true) {
            return Err(MeshTransferError::InvalidPermutation(format!(
                "{permutation:?} is not a permutation of 0..{npe}"
            )));
        }
    }
    Ok(())
}
