//! Rendezvous decomposition: redistribute source elements and target queries
//! onto a shared spatial partition so that purely local search is globally
//! complete.
//!
//! Every element is shipped to the owner of every partition cell its
//! tolerance-expanded box touches, and so is every geometry. A rank therefore
//! holds every element and geometry that could meet inside the cells it owns.
//! Items straddling a seam arrive on several ranks; callers deduplicate with
//! [`RendezvousPartition::shared_owner`].
//!
//! All methods taking a communicator are collective. Ranks without local
//! data still take part and exchange empty payloads.

use std::collections::HashMap;

use crate::adapter::geometry::WireGeometry;
use crate::algs::collective;
use crate::algs::communicator::{CommTag, Communicator, ReduceOp};
use crate::algs::wire::{
    WireElement, WireGeometryHdr, WirePointHit, WirePointQuery, WireReader,
    WireVertex, WireWriter, kind,
};
use crate::config::MapConfig;
use crate::data::geometry_manager::GeometryManager;
use crate::data::mesh_manager::MeshManager;
use crate::data::mesh_view::GenericMeshView;
use crate::geometry::bounding_box::BoundingBox;
use crate::mesh_error::MeshTransferError;
use crate::rendezvous::partition::RendezvousPartition;
use crate::search::KdTree;
use crate::topology::cell_type::CellType;
use crate::topology::handle::Handle;

const TAG_LAYOUT: CommTag = CommTag::new(0x5200);
const TAG_EXTENT: CommTag = CommTag::new(0x5202);
const TAG_ELEMENTS: CommTag = CommTag::new(0x5204);
const TAG_GEOMETRIES: CommTag = CommTag::new(0x5206);
const TAG_QUERIES: CommTag = CommTag::new(0x5208);
const TAG_HITS: CommTag = CommTag::new(0x520A);
const TAG_BUILT: CommTag = CommTag::new(0x520C);

/// One source block as seen by this rendezvous rank.
#[derive(Clone, Debug)]
pub struct RendezvousBlock {
    view: GenericMeshView,
    tree: KdTree,
    source_ranks: Vec<usize>,
}

impl RendezvousBlock {
    pub fn view(&self) -> &GenericMeshView {
        &self.view
    }
    pub fn tree(&self) -> &KdTree {
        &self.tree
    }
    /// Rank that owns local element `e` in the source decomposition.
    pub fn source_rank(&self, e: usize) -> usize {
        self.source_ranks[e]
    }
}

/// A target geometry received during rendezvous.
#[derive(Clone, Debug)]
pub struct RendezvousGeometry<G> {
    pub gid: u64,
    pub owner_rank: usize,
    pub geometry: G,
}

/// Where a target point was found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PointLocation {
    pub element: Handle,
    pub block: usize,
    pub source_rank: usize,
}

/// Elements of one source mesh, redistributed by spatial partition.
#[derive(Clone, Debug)]
pub struct Rendezvous {
    partition: RendezvousPartition,
    blocks: Vec<RendezvousBlock>,
    dimension: usize,
    tolerance: f64,
}

impl Rendezvous {
    /// Collective. Redistribute `mesh` with the default configuration for its
    /// dimension and tolerance `tolerance`.
    pub fn build<C: Communicator>(
        comm: &C,
        mesh: &MeshManager,
        target_boxes: &[BoundingBox],
        tolerance: f64,
    ) -> Result<Self, MeshTransferError> {
        let config = MapConfig::default()
            .with_dimension(mesh.dimension())
            .with_tolerance(tolerance);
        Self::build_with_config(comm, mesh, target_boxes, &config)
    }

    /// Collective. `target_boxes` are the local target queries; they only
    /// widen the global extent.
    pub fn build_with_config<C: Communicator>(
        comm: &C,
        mesh: &MeshManager,
        target_boxes: &[BoundingBox],
        config: &MapConfig,
    ) -> Result<Self, MeshTransferError> {
        config.validate()?;
        check_block_layout(comm, mesh)?;
        let tol = config.tolerance;

        let local = target_boxes
            .iter()
            .fold(mesh.local_bounding_box(), |acc, b| acc.union(b));
        let global = global_box(comm, &local)?;
        let partition = RendezvousPartition::new(global, comm.size())?;
        log::debug!(
            "[rank {}] rendezvous grid {:?} over {:?}",
            comm.rank(),
            partition.dims(),
            partition.global_box()
        );

        let me = comm.rank();
        let mut writers: Vec<WireWriter> = (0..comm.size())
            .map(|_| WireWriter::new(kind::ELEMENTS))
            .collect();
        let mut sent = 0usize;
        for (b, view) in mesh.blocks().iter().enumerate() {
            for e in 0..view.num_elements() {
                let bbox = view.element_bounding_box(e).expanded(tol);
                for r in partition.ranks_overlapping(&bbox) {
                    let w = &mut writers[r];
                    w.push(&WireElement::new(view.element_handles()[e].get(), me, b));
                    for &v in view.element_vertex_indices(e) {
                        w.push(&WireVertex::new(
                            view.vertex_handles()[v].get(),
                            view.vertex_coords(v),
                        ));
                    }
                    sent += 1;
                }
            }
        }
        let recvs = comm.all_to_allv(
            TAG_ELEMENTS,
            writers.into_iter().map(WireWriter::finish).collect(),
        )?;

        let built = rebuild_blocks(mesh, &recvs, config.leaf_capacity);
        let blocks = collective::agree(comm, TAG_BUILT, built)?;
        log::debug!(
            "[rank {me}] rendezvous sent {sent} element copies, holds {}",
            blocks.iter().map(|b| b.view.num_elements()).sum::<usize>()
        );

        Ok(Self {
            partition,
            blocks,
            dimension: mesh.dimension(),
            tolerance: tol,
        })
    }

    pub fn partition(&self) -> &RendezvousPartition {
        &self.partition
    }

    pub fn blocks(&self) -> &[RendezvousBlock] {
        &self.blocks
    }

    pub fn block(&self, b: usize) -> Option<&RendezvousBlock> {
        self.blocks.get(b)
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Collective. Ship every local geometry to the owners of the cells its
    /// expanded box touches. Result is ordered by sending rank, then by the
    /// sender's local order.
    pub fn distribute_geometries<C, G>(
        &self,
        comm: &C,
        geometries: &GeometryManager<G>,
    ) -> Result<Vec<RendezvousGeometry<G>>, MeshTransferError>
    where
        C: Communicator,
        G: WireGeometry,
    {
        let me = comm.rank();
        let mut writers: Vec<WireWriter> = (0..comm.size())
            .map(|_| WireWriter::new(kind::GEOMETRIES))
            .collect();
        for (gid, g) in geometries.iter() {
            let bbox = g.bounding_box().expanded(self.tolerance);
            let ranks = self.partition.ranks_overlapping(&bbox);
            if ranks.is_empty() {
                log::warn!("[rank {me}] geometry {gid} has an empty bounding box");
            }
            for r in ranks {
                writers[r].push(&WireGeometryHdr::new(gid, me));
                writers[r].push(&g.to_wire());
            }
        }
        let recvs = comm.all_to_allv(
            TAG_GEOMETRIES,
            writers.into_iter().map(WireWriter::finish).collect(),
        )?;

        let mut out = Vec::new();
        for buf in &recvs {
            let mut r = WireReader::open(buf, kind::GEOMETRIES)?;
            while !r.is_empty() {
                let hdr: WireGeometryHdr = r.read()?;
                let wire: G::Wire = r.read()?;
                out.push(RendezvousGeometry {
                    gid: hdr.gid(),
                    owner_rank: hdr.owner_rank(),
                    geometry: G::from_wire(&wire)?,
                });
            }
        }
        log::debug!("[rank {me}] rendezvous holds {} geometries", out.len());
        Ok(out)
    }

    /// Local. `(block, element)` pairs of every element that lies in
    /// `geometry`: any vertex inside, or every vertex when `all_vertices`.
    pub fn elements_in_geometry<G: WireGeometry>(
        &self,
        geometry: &G,
        all_vertices: bool,
    ) -> Vec<(usize, usize)> {
        let tol = self.tolerance;
        let query = geometry.bounding_box().expanded(tol);
        let mut out = Vec::new();
        for (b, block) in self.blocks.iter().enumerate() {
            for e in block.tree.elements_in_box(&query) {
                let verts = block.view.element_vertices(e);
                let inside = |v: &[f64; 3]| geometry.point_in_geometry(&v[..self.dimension], tol);
                let hit = if all_vertices {
                    verts.iter().all(inside)
                } else {
                    verts.iter().any(inside)
                };
                if hit {
                    out.push((b, e));
                }
            }
        }
        out
    }

    /// Local. First element containing `point`, searching blocks in order.
    pub fn locate_local(&self, point: &[f64]) -> Result<Option<PointLocation>, MeshTransferError> {
        for (b, block) in self.blocks.iter().enumerate() {
            if let Some(e) = block.tree.locate(&block.view, point, self.tolerance)? {
                return Ok(Some(PointLocation {
                    element: block.view.element_handles()[e],
                    block: b,
                    source_rank: block.source_ranks[e],
                }));
            }
        }
        Ok(None)
    }

    /// Collective. Locate blocked target points (`coords[d * n + i]`).
    ///
    /// Each point is searched only by the owner of its partition cell, which
    /// holds every element that can contain it, so the answer does not
    /// depend on how the source mesh was distributed. `None` marks points
    /// outside the source domain.
    pub fn locate_points<C: Communicator>(
        &self,
        comm: &C,
        coords: &[f64],
    ) -> Result<Vec<Option<PointLocation>>, MeshTransferError> {
        let dim = self.dimension;
        if coords.len() % dim != 0 {
            return Err(MeshTransferError::CoordinateLengthMismatch {
                expected: coords.len() / dim * dim,
                found: coords.len(),
            });
        }
        let n = coords.len() / dim;
        let point = |i: usize| -> [f64; 3] {
            let mut p = [0.0; 3];
            for (d, x) in p.iter_mut().enumerate().take(dim) {
                *x = coords[d * n + i];
            }
            p
        };

        let mut writers: Vec<WireWriter> = (0..comm.size())
            .map(|_| WireWriter::new(kind::POINT_QUERIES))
            .collect();
        for i in 0..n {
            let p = point(i);
            writers[self.partition.owner_of_point(&p)].push(&WirePointQuery::new(i, p));
        }
        let queries = comm.all_to_allv(
            TAG_QUERIES,
            writers.into_iter().map(WireWriter::finish).collect(),
        )?;

        let mut replies: Vec<WireWriter> = (0..comm.size())
            .map(|_| WireWriter::new(kind::POINT_HITS))
            .collect();
        for (src, buf) in queries.iter().enumerate() {
            let mut r = WireReader::open(buf, kind::POINT_QUERIES)?;
            while !r.is_empty() {
                let q: WirePointQuery = r.read()?;
                let xyz = q.xyz();
                if let Some(loc) = self.locate_local(&xyz[..dim])? {
                    replies[src].push(&WirePointHit::new(
                        q.index(),
                        loc.element.get(),
                        loc.block,
                        loc.source_rank,
                    ));
                }
            }
        }
        let hits = comm.all_to_allv(
            TAG_HITS,
            replies.into_iter().map(WireWriter::finish).collect(),
        )?;

        let mut out = vec![None; n];
        for buf in &hits {
            let mut r = WireReader::open(buf, kind::POINT_HITS)?;
            while !r.is_empty() {
                let h: WirePointHit = r.read()?;
                let slot = out.get_mut(h.index()).ok_or_else(|| {
                    MeshTransferError::WireFormat(format!("hit for unknown point {}", h.index()))
                })?;
                *slot = Some(PointLocation {
                    element: Handle::new(h.element()),
                    block: h.block(),
                    source_rank: h.source_rank(),
                });
            }
        }
        let found = out.iter().filter(|l| l.is_some()).count();
        log::debug!("[rank {}] located {found} of {n} points", comm.rank());
        Ok(out)
    }
}

/// Rebuild every block from the element copies received from all ranks.
fn rebuild_blocks(
    mesh: &MeshManager,
    recvs: &[Vec<u8>],
    leaf_capacity: usize,
) -> Result<Vec<RendezvousBlock>, MeshTransferError> {
    let mut builders: Vec<BlockBuilder> = mesh
        .blocks()
        .iter()
        .map(|v| BlockBuilder::new(mesh.dimension(), v.topology()))
        .collect();
    for (src, buf) in recvs.iter().enumerate() {
        let mut r = WireReader::open(buf, kind::ELEMENTS)?;
        while !r.is_empty() {
            let el: WireElement = r.read()?;
            let builder = builders.get_mut(el.block()).ok_or_else(|| {
                MeshTransferError::WireFormat(format!(
                    "rank {src} sent element for unknown block {}",
                    el.block()
                ))
            })?;
            builder.push_element(&mut r, &el)?;
        }
    }
    builders
        .into_iter()
        .map(|b| b.finish(leaf_capacity))
        .collect()
}

/// Accumulates received elements of one block.
struct BlockBuilder {
    dimension: usize,
    topology: CellType,
    vertex_index: HashMap<(usize, Handle), usize>,
    vertex_handles: Vec<Handle>,
    coords: Vec<[f64; 3]>,
    element_handles: Vec<Handle>,
    // element-major, canonical order, indices into `vertex_handles`
    corners: Vec<usize>,
    source_ranks: Vec<usize>,
}

impl BlockBuilder {
    fn new(dimension: usize, topology: CellType) -> Self {
        Self {
            dimension,
            topology,
            vertex_index: HashMap::new(),
            vertex_handles: Vec::new(),
            coords: Vec::new(),
            element_handles: Vec::new(),
            corners: Vec::new(),
            source_ranks: Vec::new(),
        }
    }

    fn push_element(
        &mut self,
        r: &mut WireReader<'_>,
        el: &WireElement,
    ) -> Result<(), MeshTransferError> {
        let src = el.source_rank();
        for _ in 0..self.topology.node_count() {
            let v: WireVertex = r.read()?;
            let key = (src, Handle::new(v.handle()));
            let next = self.vertex_handles.len();
            let idx = *self.vertex_index.entry(key).or_insert(next);
            if idx == next {
                // vertices are renumbered; handles only need to be unique per view
                self.vertex_handles.push(Handle::new(next as u64));
                self.coords.push(v.xyz());
            }
            self.corners.push(idx);
        }
        self.element_handles.push(Handle::new(el.handle()));
        self.source_ranks.push(src);
        Ok(())
    }

    fn finish(self, leaf_capacity: usize) -> Result<RendezvousBlock, MeshTransferError> {
        let view = if self.element_handles.is_empty() {
            GenericMeshView::null(self.dimension, self.topology)
        } else {
            let nv = self.vertex_handles.len();
            let ne = self.element_handles.len();
            let npe = self.topology.node_count();
            let mut coordinates = vec![0.0; self.dimension * nv];
            for (i, p) in self.coords.iter().enumerate() {
                for d in 0..self.dimension {
                    coordinates[d * nv + i] = p[d];
                }
            }
            let mut connectivity = vec![Handle::default(); npe * ne];
            for e in 0..ne {
                for c in 0..npe {
                    connectivity[c * ne + e] = self.vertex_handles[self.corners[e * npe + c]];
                }
            }
            GenericMeshView::from_parts(
                self.dimension,
                self.vertex_handles,
                coordinates,
                self.topology,
                self.element_handles,
                connectivity,
                (0..npe).collect(),
            )?
        };
        let tree = KdTree::build_with_leaf_capacity(&view, leaf_capacity);
        Ok(RendezvousBlock {
            view,
            tree,
            source_ranks: self.source_ranks,
        })
    }
}

/// Every rank must hold the same number of blocks with the same topologies
/// and dimension; all ranks detect a mismatch together.
fn check_block_layout<C: Communicator>(
    comm: &C,
    mesh: &MeshManager,
) -> Result<(), MeshTransferError> {
    let nb = mesh.num_blocks();
    let mut lo = [nb as f64, mesh.dimension() as f64];
    let mut hi = lo;
    comm.all_reduce(TAG_LAYOUT, &mut lo, ReduceOp::Min)?;
    comm.all_reduce(TAG_LAYOUT, &mut hi, ReduceOp::Max)?;
    if lo[1] != hi[1] {
        return Err(MeshTransferError::DimensionMismatch {
            expected: hi[1] as usize,
            found: mesh.dimension(),
        });
    }
    if lo[0] != hi[0] {
        return Err(MeshTransferError::BlockCountMismatch {
            expected: hi[0] as usize,
            found: nb,
        });
    }

    let codes: Vec<f64> = mesh
        .blocks()
        .iter()
        .map(|v| f64::from(v.topology().wire_code()))
        .collect();
    let mut lo = codes.clone();
    let mut hi = codes;
    comm.all_reduce(TAG_LAYOUT, &mut lo, ReduceOp::Min)?;
    comm.all_reduce(TAG_LAYOUT, &mut hi, ReduceOp::Max)?;
    for (b, view) in mesh.blocks().iter().enumerate() {
        if lo[b] != hi[b] {
            let mine = f64::from(view.topology().wire_code());
            let expected = if mine == lo[b] { hi[b] } else { lo[b] };
            return Err(MeshTransferError::TopologyMismatch {
                block: b,
                expected: CellType::from_wire_code(expected as u16).unwrap_or_default(),
                found: view.topology(),
            });
        }
    }
    Ok(())
}

/// Collective min/max reduction of a local box. Empty boxes are neutral.
fn global_box<C: Communicator>(
    comm: &C,
    local: &BoundingBox,
) -> Result<BoundingBox, MeshTransferError> {
    let mut v = [
        local.min[0],
        local.min[1],
        local.min[2],
        -local.max[0],
        -local.max[1],
        -local.max[2],
    ];
    comm.all_reduce(TAG_EXTENT, &mut v, ReduceOp::Min)?;
    Ok(BoundingBox::new([v[0], v[1], v[2]], [-v[3], -v[4], -v[5]]))
}
