//! KD-tree over the elements of one [`GenericMeshView`].
//!
//! The tree is an arena: `nodes[0]` is the root, internal nodes refer to
//! their children by index, and leaves own a contiguous range of `order`,
//! which is a permutation of the view's element indices. The tree stores no
//! mesh data, only indices into a view it does not own, so every query takes
//! that view again. Passing a different view than the one the tree was built
//! from is a logic error; [`KdTree::validate_against`] catches the obvious
//! cases.
//!
//! Splits are taken at the median element centroid along the axis of
//! greatest centroid spread. A range becomes a leaf once it holds at most
//! `leaf_capacity` elements or its centroids all coincide.

use crate::data::mesh_view::GenericMeshView;
use crate::debug_invariants::DebugInvariants;
use crate::geometry::bounding_box::{BoundingBox, pad};
use crate::mesh_error::MeshTransferError;
use crate::topology::handle::Handle;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

pub const DEFAULT_LEAF_CAPACITY: usize = 8;

#[derive(Clone, Debug)]
enum KdNode {
    Leaf {
        start: usize,
        end: usize,
        bbox: BoundingBox,
    },
    Internal {
        axis: usize,
        split: f64,
        bbox: BoundingBox,
        left: usize,
        right: usize,
    },
}

impl KdNode {
    fn bbox(&self) -> &BoundingBox {
        match self {
            KdNode::Leaf { bbox, .. } | KdNode::Internal { bbox, .. } => bbox,
        }
    }
}

/// Bounding-volume hierarchy over mesh elements.
#[derive(Clone, Debug)]
pub struct KdTree {
    nodes: Vec<KdNode>,
    order: Vec<usize>,
    boxes: Vec<BoundingBox>,
    leaf_capacity: usize,
}

impl KdTree {
    pub fn build(view: &GenericMeshView) -> Self {
        Self::build_with_leaf_capacity(view, DEFAULT_LEAF_CAPACITY)
    }

    pub fn build_with_leaf_capacity(view: &GenericMeshView, leaf_capacity: usize) -> Self {
        let leaf_capacity = leaf_capacity.max(1);
        let ne = view.num_elements();

        #[cfg(feature = "rayon")]
        let boxes: Vec<BoundingBox> = (0..ne)
            .into_par_iter()
            .map(|e| view.element_bounding_box(e))
            .collect();
        #[cfg(not(feature = "rayon"))]
        let boxes: Vec<BoundingBox> = (0..ne).map(|e| view.element_bounding_box(e)).collect();

        let centroids: Vec<[f64; 3]> = boxes.iter().map(BoundingBox::center).collect();
        let mut tree = Self {
            nodes: Vec::new(),
            order: (0..ne).collect(),
            boxes,
            leaf_capacity,
        };
        if ne > 0 {
            tree.build_range(0, ne, &centroids);
        }
        log::trace!(
            "kd-tree over {ne} {:?} elements: {} nodes",
            view.topology(),
            tree.nodes.len()
        );
        tree.debug_assert_invariants();
        tree
    }

    /// Builds the subtree over `order[start..end]` and returns its node index.
    fn build_range(&mut self, start: usize, end: usize, centroids: &[[f64; 3]]) -> usize {
        let bbox = self.order[start..end]
            .iter()
            .fold(BoundingBox::empty(), |acc, &e| acc.union(&self.boxes[e]));

        let spread = self.order[start..end]
            .iter()
            .fold(BoundingBox::empty(), |mut acc, &e| {
                acc.include(&centroids[e]);
                acc
            });
        let axis = (0..3)
            .max_by(|&a, &b| {
                spread
                    .extent(a)
                    .total_cmp(&spread.extent(b))
                    .then(b.cmp(&a))
            })
            .unwrap_or(0);

        let idx = self.nodes.len();
        if end - start <= self.leaf_capacity || spread.extent(axis) <= 0.0 {
            self.nodes.push(KdNode::Leaf { start, end, bbox });
            return idx;
        }

        let mid = start + (end - start) / 2;
        self.order[start..end].select_nth_unstable_by(mid - start, |&a, &b| {
            centroids[a][axis]
                .total_cmp(&centroids[b][axis])
                .then(a.cmp(&b))
        });
        let split = centroids[self.order[mid]][axis];

        // reserve the slot so the parent precedes its children
        self.nodes.push(KdNode::Leaf { start, end, bbox });
        let left = self.build_range(start, mid, centroids);
        let right = self.build_range(mid, end, centroids);
        self.nodes[idx] = KdNode::Internal {
            axis,
            split,
            bbox,
            left,
            right,
        };
        idx
    }

    pub fn num_elements(&self) -> usize {
        self.order.len()
    }

    pub fn leaf_capacity(&self) -> usize {
        self.leaf_capacity
    }

    /// Box of the whole tree; empty for a tree over a null view.
    pub fn bounding_box(&self) -> BoundingBox {
        self.nodes.first().map_or_else(BoundingBox::empty, |n| *n.bbox())
    }

    /// Cheap check that `view` is plausibly the view this tree indexes.
    pub fn validate_against(&self, view: &GenericMeshView) -> Result<(), MeshTransferError> {
        if view.num_elements() == self.num_elements() {
            Ok(())
        } else {
            Err(MeshTransferError::InvalidGeometry(format!(
                "kd-tree indexes {} elements but the view has {}",
                self.num_elements(),
                view.num_elements()
            )))
        }
    }

    /// Depth of the deepest leaf (root alone is depth 1).
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[KdNode], i: usize) -> usize {
            match &nodes[i] {
                KdNode::Leaf { .. } => 1,
                KdNode::Internal { left, right, .. } => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
            }
        }
        if self.nodes.is_empty() { 0 } else { walk(&self.nodes, 0) }
    }

    /// Local index of the first element containing `point`, or `None`.
    ///
    /// Children are visited left before right and leaf candidates in range
    /// order, so a point on a face shared by several elements resolves to the
    /// same element every time.
    ///
    /// `tolerance` is used twice with different units: the box tests widen
    /// every element box by `tolerance` as an absolute distance, and the
    /// containment test accepts reference coordinates up to `tolerance`
    /// outside the reference element. On strongly stretched elements the two
    /// differ; see [`metrics::point_in_cell`](crate::geometry::metrics::point_in_cell).
    pub fn locate(
        &self,
        view: &GenericMeshView,
        point: &[f64],
        tolerance: f64,
    ) -> Result<Option<usize>, MeshTransferError> {
        self.validate_against(view)?;
        if self.nodes.is_empty() {
            return Ok(None);
        }
        let p = pad(point);
        let mut stack = vec![0usize];
        while let Some(i) = stack.pop() {
            let node = &self.nodes[i];
            if !node.bbox().contains_point(&p, tolerance) {
                continue;
            }
            match node {
                KdNode::Internal { left, right, .. } => {
                    stack.push(*right);
                    stack.push(*left);
                }
                KdNode::Leaf { start, end, .. } => {
                    for &e in &self.order[*start..*end] {
                        if self.boxes[e].contains_point(&p, tolerance)
                            && view.element_contains(e, &p, tolerance)?
                        {
                            return Ok(Some(e));
                        }
                    }
                }
            }
        }
        Ok(None)
    }

    /// Handle of the element containing `point`.
    ///
    /// Fails with [`MeshTransferError::PointNotFound`] when no element
    /// contains the point within tolerance; that is an ordinary outcome for
    /// points outside the mesh. `tolerance` is an absolute distance for the
    /// element boxes and a reference-coordinate slack for the containment
    /// test, as in [`KdTree::locate`].
    pub fn find_point(
        &self,
        view: &GenericMeshView,
        point: &[f64],
        tolerance: f64,
    ) -> Result<Handle, MeshTransferError> {
        match self.locate(view, point, tolerance)? {
            Some(e) => Ok(view.element_handles()[e]),
            None => Err(MeshTransferError::PointNotFound {
                point: point.to_vec(),
            }),
        }
    }

    /// [`KdTree::locate`] over many points. Results are in input order.
    pub fn locate_all(
        &self,
        view: &GenericMeshView,
        points: &[[f64; 3]],
        tolerance: f64,
    ) -> Result<Vec<Option<usize>>, MeshTransferError> {
        #[cfg(feature = "rayon")]
        let it = points.par_iter();
        #[cfg(not(feature = "rayon"))]
        let it = points.iter();
        it.map(|p| self.locate(view, p, tolerance)).collect()
    }

    /// Elements whose bounding box intersects `query`, in ascending order.
    pub fn elements_in_box(&self, query: &BoundingBox) -> Vec<usize> {
        let mut out = Vec::new();
        if self.nodes.is_empty() || query.is_empty() {
            return out;
        }
        let mut stack = vec![0usize];
        while let Some(i) = stack.pop() {
            let node = &self.nodes[i];
            if !node.bbox().intersects(query) {
                continue;
            }
            match node {
                KdNode::Internal { left, right, .. } => {
                    stack.push(*right);
                    stack.push(*left);
                }
                KdNode::Leaf { start, end, .. } => out.extend(
                    self.order[*start..*end]
                        .iter()
                        .copied()
                        .filter(|&e| self.boxes[e].intersects(query)),
                ),
            }
        }
        out.sort_unstable();
        out
    }

    /// Bounding box of local element `e`.
    pub fn element_box(&self, e: usize) -> &BoundingBox {
        &self.boxes[e]
    }
}

impl DebugInvariants for KdTree {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "KdTree invalid");
    }

    fn validate_invariants(&self) -> Result<(), MeshTransferError> {
        let n = self.order.len();
        let mut seen = vec![false; n];
        for &e in &self.order {
            if e >= n || std::mem::replace(&mut seen[e], true) {
                return Err(MeshTransferError::InvalidGeometry(format!(
                    "kd-tree order is not a permutation (element {e})"
                )));
            }
        }
        let mut covered = 0usize;
        for node in &self.nodes {
            match node {
                KdNode::Leaf { start, end, .. } => {
                    if start > end || *end > n {
                        return Err(MeshTransferError::InvalidGeometry(format!(
                            "kd-tree leaf range {start}..{end} out of bounds"
                        )));
                    }
                    covered += end - start;
                }
                KdNode::Internal {
                    axis,
                    split,
                    bbox,
                    left,
                    right,
                } => {
                    let count = self.nodes.len();
                    if *axis > 2 || !split.is_finite() || *left >= count || *right >= count {
                        return Err(MeshTransferError::InvalidGeometry(
                            "kd-tree internal node is malformed".into(),
                        ));
                    }
                    for child in [*left, *right] {
                        let cb = self.nodes[child].bbox();
                        if cb.union(bbox) != *bbox {
                            return Err(MeshTransferError::InvalidGeometry(
                                "kd-tree child box escapes its parent".into(),
                            ));
                        }
                    }
                }
            }
        }
        if covered != n {
            return Err(MeshTransferError::InvalidGeometry(format!(
                "kd-tree leaves cover {covered} of {n} elements"
            )));
        }
        Ok(())
    }
}
