//! Mesh-block capability: one node range plus one single-topology element range.

use super::element::ElementTraits;
use super::node::NodeTraits;
use std::borrow::Cow;

/// A mesh block as seen by the view builder.
pub trait MeshTraits {
    type Node: NodeTraits;
    type Element: ElementTraits;
    type NodeIter<'a>: Iterator<Item = &'a Self::Node> + 'a
    where
        Self: 'a;
    type ElementIter<'a>: Iterator<Item = &'a Self::Element> + 'a
    where
        Self: 'a;

    fn nodes(&self) -> Self::NodeIter<'_>;
    fn elements(&self) -> Self::ElementIter<'_>;

    /// Maps canonical node `i` to the adapter's local node `permutation[i]`.
    fn permutation(&self) -> Cow<'_, [usize]> {
        Cow::Owned((0..<Self::Element as ElementTraits>::NODES_PER_ELEMENT).collect())
    }
}

/// Owned node and element lists.
#[derive(Clone, Debug)]
pub struct VecMesh<N, E> {
    pub nodes: Vec<N>,
    pub elements: Vec<E>,
    pub permutation: Option<Vec<usize>>,
}

impl<N, E> Default for VecMesh<N, E> {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

impl<N, E> VecMesh<N, E> {
    pub fn new(nodes: Vec<N>, elements: Vec<E>) -> Self {
        Self {
            nodes,
            elements,
            permutation: None,
        }
    }

    pub fn with_permutation(mut self, permutation: Vec<usize>) -> Self {
        self.permutation = Some(permutation);
        self
    }
}

impl<N: NodeTraits, E: ElementTraits> MeshTraits for VecMesh<N, E> {
    type Node = N;
    type Element = E;
    type NodeIter<'a>
        = std::slice::Iter<'a, N>
    where
        Self: 'a;
    type ElementIter<'a>
        = std::slice::Iter<'a, E>
    where
        Self: 'a;

    fn nodes(&self) -> Self::NodeIter<'_> {
        self.nodes.iter()
    }
    fn elements(&self) -> Self::ElementIter<'_> {
        self.elements.iter()
    }
    fn permutation(&self) -> Cow<'_, [usize]> {
        match &self.permutation {
            Some(p) => Cow::Borrowed(p),
            None => Cow::Owned((0..E::NODES_PER_ELEMENT).collect()),
        }
    }
}
