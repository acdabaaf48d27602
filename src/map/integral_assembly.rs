//! Integral assembly: reduce element integrals of a source field onto target
//! geometries.
//!
//! `setup` runs the rendezvous decomposition of the source mesh against the
//! target geometries and finds every (geometry, element) pair where the
//! element lies in the geometry. A pair can be found on several rendezvous
//! ranks when both items straddle a seam; it is kept only on the lowest rank
//! that received both, which is a pure function of the two bounding boxes.
//! Kept pairs are routed to the rank owning the element, which records the
//! element measure. The geometry owner records the geometry measure.
//!
//! `apply` asks the integrator for every recorded element once per block,
//! sends one contribution per (geometry id, element handle) to the geometry
//! owner, sums there in sorted key order and writes the normalized totals
//! component-major into the target field.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::adapter::field::{FieldTraits, FieldTraitsMut};
use crate::adapter::geometry::WireGeometry;
use crate::algs::collective;
use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::wire::{
    WireContribution, WireCount, WirePair, WireReader, WireScalar, WireWriter, kind,
};
use crate::config::{MapConfig, Normalization};
use crate::data::field_manager::FieldManager;
use crate::data::geometry_manager::GeometryManager;
use crate::data::mesh_manager::MeshManager;
use crate::map::{ElementMeasure, FieldIntegrator};
use crate::mesh_error::MeshTransferError;
use crate::rendezvous::Rendezvous;
use crate::topology::handle::Handle;

const TAG_PAIRS: CommTag = CommTag::new(0x5220);
const TAG_CONTRIBUTIONS: CommTag = CommTag::new(0x5222);
const TAG_SETUP_STATUS: CommTag = CommTag::new(0x5224);
const TAG_RECORD_STATUS: CommTag = CommTag::new(0x5226);
const TAG_APPLY_STATUS: CommTag = CommTag::new(0x5228);

/// Pairs recorded for one local source block.
#[derive(Clone, Debug, Default)]
struct RecordedBlock {
    /// Sorted, unique.
    elements: Vec<Handle>,
    measures: Vec<f64>,
    /// `(geometry owner, gid, index into elements)`, sorted.
    pairs: Vec<(usize, u64, usize)>,
}

#[derive(Clone, Debug)]
struct Assembly {
    blocks: Vec<RecordedBlock>,
    gid_index: HashMap<u64, usize>,
    geometry_measures: Vec<f64>,
}

impl Assembly {
    /// Check the target layout, integrate every recorded element and pack one
    /// contribution buffer per geometry owner.
    fn pack<I: FieldIntegrator>(
        &self,
        integrator: &I,
        dim: usize,
        target_size: usize,
        ranks: usize,
    ) -> Result<Vec<Vec<u8>>, MeshTransferError> {
        if dim == 0 {
            return Err(MeshTransferError::InvalidDimension(0));
        }
        let ng = self.geometry_measures.len();
        if target_size != ng {
            return Err(MeshTransferError::FieldSizeMismatch {
                expected: ng,
                found: target_size,
            });
        }

        let mut writers: Vec<WireWriter> = (0..ranks)
            .map(|_| {
                let mut w = WireWriter::new(kind::CONTRIBUTIONS);
                w.push(&WireCount::new(dim));
                w
            })
            .collect();
        for block in &self.blocks {
            if block.elements.is_empty() {
                continue;
            }
            let field = integrator.integrate(&block.elements);
            if field.dim() != dim {
                return Err(MeshTransferError::DimensionMismatch {
                    expected: dim,
                    found: field.dim(),
                });
            }
            if field.size() != block.elements.len() {
                return Err(MeshTransferError::FieldSizeMismatch {
                    expected: block.elements.len(),
                    found: field.size(),
                });
            }
            for &(owner, gid, i) in &block.pairs {
                let w = &mut writers[owner];
                w.push(&WireContribution::new(
                    gid,
                    block.elements[i].get(),
                    block.measures[i],
                ));
                for d in 0..dim {
                    w.push(&WireScalar::new(field.value(i, d)));
                }
            }
        }
        Ok(writers.into_iter().map(WireWriter::finish).collect())
    }
}

/// Group received pairs by local block and record element measures.
fn record_blocks<M: ElementMeasure>(
    mesh: &MeshManager,
    measure: &M,
    recvs: &[Vec<u8>],
) -> Result<Vec<RecordedBlock>, MeshTransferError> {
    let mut by_block: Vec<BTreeSet<(usize, u64, Handle)>> =
        vec![BTreeSet::new(); mesh.num_blocks()];
    for (src, buf) in recvs.iter().enumerate() {
        let mut r = WireReader::open(buf, kind::PAIRS)?;
        while !r.is_empty() {
            let p: WirePair = r.read()?;
            let element = Handle::new(p.element());
            let known = mesh
                .block(p.block())
                .is_some_and(|v| v.element_index(element).is_some());
            if !known {
                return Err(MeshTransferError::WireFormat(format!(
                    "rank {src} paired element {element} of block {} not held here",
                    p.block()
                )));
            }
            by_block[p.block()].insert((p.geometry_owner(), p.gid(), element));
        }
    }

    let mut blocks = Vec::with_capacity(by_block.len());
    for set in by_block {
        let elements: Vec<Handle> = set
            .iter()
            .map(|&(_, _, h)| h)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let measures = if elements.is_empty() {
            Vec::new()
        } else {
            measure.measure(&elements)
        };
        if measures.len() != elements.len() {
            return Err(MeshTransferError::FieldSizeMismatch {
                expected: elements.len(),
                found: measures.len(),
            });
        }
        let pairs = set
            .into_iter()
            .map(|(owner, gid, h)| {
                let i = elements.binary_search(&h).unwrap_or_default();
                (owner, gid, i)
            })
            .collect();
        blocks.push(RecordedBlock {
            elements,
            measures,
            pairs,
        });
    }
    Ok(blocks)
}

/// Maps a distributed source field onto integral averages over target
/// geometries.
#[derive(Debug)]
pub struct IntegralAssemblyMap<C: Communicator> {
    comm: C,
    config: MapConfig,
    state: Option<Assembly>,
}

impl<C: Communicator> IntegralAssemblyMap<C> {
    pub fn new(comm: C, config: MapConfig) -> Result<Self, MeshTransferError> {
        config.validate()?;
        Ok(Self {
            comm,
            config,
            state: None,
        })
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_some()
    }

    /// Pairs whose source element lives on this rank.
    pub fn num_local_pairs(&self) -> usize {
        self.state
            .as_ref()
            .map_or(0, |s| s.blocks.iter().map(|b| b.pairs.len()).sum())
    }

    /// Collective. Record which local elements feed which geometries.
    ///
    /// Replaces the result of any earlier `setup`; on error the map is left
    /// un-set-up on every rank.
    pub fn setup<M, G>(
        &mut self,
        mesh: &MeshManager,
        measure: &M,
        geometries: &GeometryManager<G>,
    ) -> Result<(), MeshTransferError>
    where
        M: ElementMeasure,
        G: WireGeometry,
    {
        self.state = None;
        let dim = self.config.dimension;
        let comm = &self.comm;
        let checked = [mesh.dimension(), geometries.dimension()]
            .into_iter()
            .find(|&found| found != dim)
            .map_or(Ok(()), |found| {
                Err(MeshTransferError::DimensionMismatch {
                    expected: dim,
                    found,
                })
            });
        collective::agree(comm, TAG_SETUP_STATUS, checked)?;
        let me = comm.rank();
        let tol = self.config.tolerance;

        let boxes: Vec<_> = geometries
            .geometries()
            .iter()
            .map(|g| g.bounding_box().expanded(tol))
            .collect();
        let rv = Rendezvous::build_with_config(comm, mesh, &boxes, &self.config)?;
        let received = rv.distribute_geometries(comm, geometries)?;

        let mut writers: Vec<WireWriter> = (0..comm.size())
            .map(|_| WireWriter::new(kind::PAIRS))
            .collect();
        let all_vertices = self.config.all_vertices_for_inclusion;
        let mut kept = 0usize;
        for g in &received {
            let gbox = g.geometry.bounding_box().expanded(tol);
            for (b, e) in rv.elements_in_geometry(&g.geometry, all_vertices) {
                let Some(block) = rv.block(b) else { continue };
                let ebox = block.view().element_bounding_box(e).expanded(tol);
                if rv.partition().shared_owner(&ebox, &gbox) != Some(me) {
                    continue;
                }
                writers[block.source_rank(e)].push(&WirePair::new(
                    g.gid,
                    block.view().element_handles()[e].get(),
                    g.owner_rank,
                    b,
                ));
                kept += 1;
            }
        }
        let recvs = comm.all_to_allv(
            TAG_PAIRS,
            writers.into_iter().map(WireWriter::finish).collect(),
        )?;

        let blocks = collective::agree(
            comm,
            TAG_RECORD_STATUS,
            record_blocks(mesh, measure, &recvs),
        )?;

        let state = Assembly {
            blocks,
            gid_index: geometries.gids().iter().enumerate().map(|(i, &g)| (g, i)).collect(),
            geometry_measures: geometries.geometries().iter().map(|g| g.measure()).collect(),
        };
        log::debug!(
            "[rank {me}] integral assembly setup: {kept} pairs resolved here, {} recorded locally",
            state.blocks.iter().map(|b| b.pairs.len()).sum::<usize>()
        );
        self.state = Some(state);
        Ok(())
    }

    /// Collective. Integrate, reduce and write into `target`, which must
    /// hold one entity per local geometry.
    pub fn apply<I, F>(
        &self,
        integrator: &I,
        target: &mut FieldManager<F>,
    ) -> Result<(), MeshTransferError>
    where
        I: FieldIntegrator,
        F: FieldTraitsMut,
    {
        let comm = &self.comm;
        let dim = target.dim();
        // every rank checks its inputs and integrates before anyone exchanges
        let packed = self
            .state
            .as_ref()
            .ok_or(MeshTransferError::NotSetUp)
            .and_then(|state| {
                let sends = state.pack(integrator, dim, target.size(), comm.size())?;
                Ok((state, sends))
            });
        let (state, sends) = collective::agree(comm, TAG_APPLY_STATUS, packed)?;
        let ng = state.geometry_measures.len();
        let recvs = comm.all_to_allv(TAG_CONTRIBUTIONS, sends)?;

        // (gid, element) -> (measure, values); the first copy wins
        let mut contributions: BTreeMap<(u64, u64), (f64, Vec<f64>)> = BTreeMap::new();
        for buf in &recvs {
            let mut r = WireReader::open(buf, kind::CONTRIBUTIONS)?;
            let sent_dim = r.read::<WireCount>()?.get();
            if sent_dim != dim && !r.is_empty() {
                return Err(MeshTransferError::DimensionMismatch {
                    expected: dim,
                    found: sent_dim,
                });
            }
            while !r.is_empty() {
                let c: WireContribution = r.read()?;
                let values = (0..dim)
                    .map(|_| r.read::<WireScalar>().map(|s| s.get()))
                    .collect::<Result<Vec<_>, _>>()?;
                contributions
                    .entry((c.gid(), c.element()))
                    .or_insert((c.measure(), values));
            }
        }

        let mut integral = vec![0.0; dim * ng];
        let mut measure = vec![0.0; ng];
        let mut count = vec![0usize; ng];
        for ((gid, _), (m, values)) in &contributions {
            let gi = *state.gid_index.get(gid).ok_or_else(|| {
                MeshTransferError::WireFormat(format!("contribution for foreign geometry {gid}"))
            })?;
            measure[gi] += m;
            count[gi] += 1;
            for (d, v) in values.iter().enumerate() {
                integral[d * ng + gi] += v;
            }
        }

        let out = target.field_mut().values_mut();
        for gi in 0..ng {
            let denom = match self.config.normalization {
                Normalization::ElementMeasure => Some(measure[gi]),
                Normalization::GeometryMeasure => Some(state.geometry_measures[gi]),
                Normalization::None => None,
            };
            let usable = count[gi] > 0 && denom.is_none_or(|m| m != 0.0);
            if count[gi] == 0 {
                log::warn!("[rank {}] geometry #{gi} received no contributions", comm.rank());
            } else if !usable {
                log::warn!("[rank {}] geometry #{gi} has zero normalization measure", comm.rank());
            }
            for d in 0..dim {
                out[d * ng + gi] = match (usable, denom) {
                    (false, _) => 0.0,
                    (true, Some(m)) => integral[d * ng + gi] / m,
                    (true, None) => integral[d * ng + gi],
                };
            }
        }
        log::debug!(
            "[rank {}] integral assembly apply: {} contributions onto {ng} geometries",
            comm.rank(),
            contributions.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::data::field::FieldContainer;
    use crate::data::mesh_view::GenericMeshView;
    use crate::geometry::shapes::Cuboid;
    use crate::topology::cell_type::CellType;

    struct UnitMeasure;
    impl ElementMeasure for UnitMeasure {
        fn measure(&self, elements: &[Handle]) -> Vec<f64> {
            vec![1.0; elements.len()]
        }
    }

    /// Integrates to the element handle value in component 0 and 1.0 in 1.
    struct HandleIntegrator;
    impl FieldIntegrator for HandleIntegrator {
        type Field = FieldContainer;
        fn integrate(&self, elements: &[Handle]) -> FieldContainer {
            let mut data: Vec<f64> = elements.iter().map(|h| h.get() as f64).collect();
            data.extend(std::iter::repeat_n(1.0, elements.len()));
            FieldContainer::from_data(2, data).unwrap()
        }
    }

    /// Three unit segments-as-hexes along x: [0,1], [1,2], [2,3].
    fn row_of_hexes() -> MeshManager {
        let nv = 16;
        let mut coords = vec![0.0; 3 * nv];
        for i in 0..4 {
            for (c, (y, z)) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)].iter().enumerate() {
                let v = i * 4 + c;
                coords[v] = i as f64;
                coords[nv + v] = *y;
                coords[2 * nv + v] = *z;
            }
        }
        let ne = 3;
        let mut conn = vec![Handle::default(); 8 * ne];
        for e in 0..ne {
            let a = e * 4;
            let b = a + 4;
            let corners = [a, b, b + 1, a + 1, a + 3, b + 3, b + 2, a + 2];
            for (c, v) in corners.iter().enumerate() {
                conn[c * ne + e] = Handle::new(*v as u64);
            }
        }
        let view = GenericMeshView::from_parts(
            3,
            (0..nv as u64).map(Handle::new).collect(),
            coords,
            CellType::Hexahedron,
            vec![Handle::new(10), Handle::new(20), Handle::new(30)],
            conn,
            (0..8).collect(),
        )
        .unwrap();
        MeshManager::new(vec![view], 3).unwrap()
    }

    fn boxes() -> GeometryManager<Cuboid> {
        GeometryManager::new(
            vec![
                Cuboid::new([-0.5, -0.5, -0.5], [1.5, 1.5, 1.5]).unwrap(),
                Cuboid::new([5.0; 3], [6.0; 3]).unwrap(),
            ],
            vec![100, 200],
            3,
        )
        .unwrap()
    }

    #[test]
    fn apply_before_setup_fails() {
        let map = IntegralAssemblyMap::new(NoComm, MapConfig::default()).unwrap();
        let mut target = FieldManager::new(FieldContainer::new(2, 2));
        assert_eq!(
            map.apply(&HandleIntegrator, &mut target),
            Err(MeshTransferError::NotSetUp)
        );
    }

    #[test]
    fn any_vertex_inclusion_averages_touching_elements() {
        let mut map = IntegralAssemblyMap::new(NoComm, MapConfig::default()).unwrap();
        map.setup(&row_of_hexes(), &UnitMeasure, &boxes()).unwrap();
        assert!(map.is_ready());
        // box covers all of element 10 and the x = 1 face of element 20
        assert_eq!(map.num_local_pairs(), 2);

        let mut target = FieldManager::new(FieldContainer::new(2, 2));
        map.apply(&HandleIntegrator, &mut target).unwrap();
        let f = target.field();
        assert_eq!(f.component(0), &[15.0, 0.0]);
        assert_eq!(f.component(1), &[1.0, 0.0]);
    }

    #[test]
    fn all_vertex_inclusion_and_raw_sums() {
        let config = MapConfig::default()
            .with_all_vertices_for_inclusion(true)
            .with_normalization(Normalization::None);
        let mut map = IntegralAssemblyMap::new(NoComm, config).unwrap();
        map.setup(&row_of_hexes(), &UnitMeasure, &boxes()).unwrap();
        assert_eq!(map.num_local_pairs(), 1);
        let mut target = FieldManager::new(FieldContainer::new(2, 2));
        map.apply(&HandleIntegrator, &mut target).unwrap();
        assert_eq!(target.field().values(), &[10.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn geometry_measure_normalization() {
        let config = MapConfig::default().with_normalization(Normalization::GeometryMeasure);
        let mut map = IntegralAssemblyMap::new(NoComm, config).unwrap();
        map.setup(&row_of_hexes(), &UnitMeasure, &boxes()).unwrap();
        let mut target = FieldManager::new(FieldContainer::new(2, 2));
        map.apply(&HandleIntegrator, &mut target).unwrap();
        // box volume is 8
        assert_eq!(target.field().value(0, 0), 30.0 / 8.0);
    }

    #[test]
    fn target_size_and_dimension_are_checked() {
        let mut map = IntegralAssemblyMap::new(NoComm, MapConfig::default()).unwrap();
        map.setup(&row_of_hexes(), &UnitMeasure, &boxes()).unwrap();
        let mut wrong_size = FieldManager::new(FieldContainer::new(2, 3));
        assert_eq!(
            map.apply(&HandleIntegrator, &mut wrong_size),
            Err(MeshTransferError::FieldSizeMismatch { expected: 2, found: 3 })
        );
        let mut wrong_dim = FieldManager::new(FieldContainer::new(3, 2));
        assert_eq!(
            map.apply(&HandleIntegrator, &mut wrong_dim),
            Err(MeshTransferError::DimensionMismatch { expected: 3, found: 2 })
        );

        let config = MapConfig::default().with_dimension(2);
        let mut flat = IntegralAssemblyMap::new(NoComm, config).unwrap();
        assert_eq!(
            flat.setup(&row_of_hexes(), &UnitMeasure, &boxes()),
            Err(MeshTransferError::DimensionMismatch { expected: 2, found: 3 })
        );
        assert!(!flat.is_ready());
    }
}
