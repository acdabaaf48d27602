//! Shared-domain map: evaluate a source field at target points.
//!
//! `setup` locates every local target point through the rendezvous
//! decomposition and forwards each hit to the rank owning the containing
//! element. Points outside the source domain are remembered as missed and
//! receive zeros. `apply` evaluates on the source ranks and sends the values
//! back to the ranks that own the points.

use std::collections::BTreeMap;

use crate::adapter::field::{FieldTraits, FieldTraitsMut};
use crate::algs::collective;
use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::wire::{
    WireCount, WireEvalRequest, WireEvaluation, WireReader, WireScalar, WireWriter, kind,
};
use crate::config::MapConfig;
use crate::data::field_manager::FieldManager;
use crate::data::mesh_manager::MeshManager;
use crate::geometry::bounding_box::BoundingBox;
use crate::map::FieldEvaluator;
use crate::mesh_error::MeshTransferError;
use crate::rendezvous::Rendezvous;
use crate::topology::handle::Handle;

const TAG_REQUESTS: CommTag = CommTag::new(0x5230);
const TAG_VALUES: CommTag = CommTag::new(0x5232);
const TAG_SETUP_STATUS: CommTag = CommTag::new(0x5234);
const TAG_ROUTE_STATUS: CommTag = CommTag::new(0x5236);
const TAG_APPLY_STATUS: CommTag = CommTag::new(0x5238);

/// A target point this rank must evaluate for `requester`.
#[derive(Clone, Debug)]
struct Request {
    requester: usize,
    index: usize,
    element: Handle,
    xyz: [f64; 3],
}

#[derive(Clone, Debug)]
struct Routing {
    num_targets: usize,
    missed: Vec<usize>,
    /// Requests per local source block, sorted by (requester, index).
    requests: Vec<Vec<Request>>,
}

impl Routing {
    /// Check the target layout, evaluate every request and pack the values
    /// for their requesters.
    fn pack<E: FieldEvaluator>(
        &self,
        evaluator: &E,
        sdim: usize,
        dim: usize,
        target_size: usize,
        ranks: usize,
    ) -> Result<Vec<Vec<u8>>, MeshTransferError> {
        if dim == 0 {
            return Err(MeshTransferError::InvalidDimension(0));
        }
        if target_size != self.num_targets {
            return Err(MeshTransferError::FieldSizeMismatch {
                expected: self.num_targets,
                found: target_size,
            });
        }

        let mut writers: Vec<WireWriter> = (0..ranks)
            .map(|_| {
                let mut w = WireWriter::new(kind::EVALUATIONS);
                w.push(&WireCount::new(dim));
                w
            })
            .collect();
        for reqs in &self.requests {
            if reqs.is_empty() {
                continue;
            }
            let m = reqs.len();
            let elements: Vec<Handle> = reqs.iter().map(|r| r.element).collect();
            let mut coords = vec![0.0; sdim * m];
            for (i, r) in reqs.iter().enumerate() {
                for d in 0..sdim {
                    coords[d * m + i] = r.xyz[d];
                }
            }
            let field = evaluator.evaluate(&elements, &coords);
            if field.dim() != dim {
                return Err(MeshTransferError::DimensionMismatch {
                    expected: dim,
                    found: field.dim(),
                });
            }
            if field.size() != m {
                return Err(MeshTransferError::FieldSizeMismatch {
                    expected: m,
                    found: field.size(),
                });
            }
            for (i, r) in reqs.iter().enumerate() {
                let w = &mut writers[r.requester];
                w.push(&WireEvaluation::new(r.index));
                for d in 0..dim {
                    w.push(&WireScalar::new(field.value(i, d)));
                }
            }
        }
        Ok(writers.into_iter().map(WireWriter::finish).collect())
    }
}

/// Evaluation requests per local block, sorted by (requester, index).
fn collect_requests(
    num_blocks: usize,
    recvs: &[Vec<u8>],
) -> Result<Vec<Vec<Request>>, MeshTransferError> {
    let mut requests: Vec<Vec<Request>> = vec![Vec::new(); num_blocks];
    for buf in recvs {
        let mut r = WireReader::open(buf, kind::EVAL_REQUESTS)?;
        while !r.is_empty() {
            let q: WireEvalRequest = r.read()?;
            let slot = requests.get_mut(q.block()).ok_or_else(|| {
                MeshTransferError::WireFormat(format!("request for unknown block {}", q.block()))
            })?;
            slot.push(Request {
                requester: q.requester(),
                index: q.index(),
                element: Handle::new(q.element()),
                xyz: q.xyz(),
            });
        }
    }
    for reqs in &mut requests {
        reqs.sort_by_key(|r| (r.requester, r.index));
    }
    Ok(requests)
}

/// Point-wise transfer from a source mesh to a cloud of target points.
#[derive(Debug)]
pub struct SharedDomainMap<C: Communicator> {
    comm: C,
    config: MapConfig,
    state: Option<Routing>,
}

impl<C: Communicator> SharedDomainMap<C> {
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

    pub fn is_ready(&self) -> bool {
        self.state.is_some()
    }

    /// Local target indices that no source element contains.
    pub fn missed_points(&self) -> &[usize] {
        self.state.as_ref().map_or(&[], |s| s.missed.as_slice())
    }

    /// Collective. `target_coords` is blocked: `target_coords[d * n + i]`.
    pub fn setup(
        &mut self,
        mesh: &MeshManager,
        target_coords: &[f64],
    ) -> Result<(), MeshTransferError> {
        self.state = None;
        let dim = self.config.dimension;
        let checked = if mesh.dimension() != dim {
            Err(MeshTransferError::DimensionMismatch {
                expected: dim,
                found: mesh.dimension(),
            })
        } else if target_coords.len() % dim != 0 {
            Err(MeshTransferError::CoordinateLengthMismatch {
                expected: target_coords.len() / dim * dim,
                found: target_coords.len(),
            })
        } else {
            Ok(())
        };
        collective::agree(&self.comm, TAG_SETUP_STATUS, checked)?;
        let n = target_coords.len() / dim;
        let point = |i: usize| -> [f64; 3] {
            let mut p = [0.0; 3];
            for (d, x) in p.iter_mut().enumerate().take(dim) {
                *x = target_coords[d * n + i];
            }
            p
        };
        let cloud = BoundingBox::from_points((0..n).map(point).collect::<Vec<_>>().iter());

        let comm = &self.comm;
        let me = comm.rank();
        let rv = Rendezvous::build_with_config(comm, mesh, &[cloud], &self.config)?;
        let hits = rv.locate_points(comm, target_coords)?;

        let mut writers: Vec<WireWriter> = (0..comm.size())
            .map(|_| WireWriter::new(kind::EVAL_REQUESTS))
            .collect();
        let mut missed = Vec::new();
        for (i, hit) in hits.iter().enumerate() {
            match hit {
                Some(loc) => writers[loc.source_rank].push(&WireEvalRequest::new(
                    i,
                    loc.element.get(),
                    point(i),
                    loc.block,
                    me,
                )),
                None => missed.push(i),
            }
        }
        let recvs = comm.all_to_allv(
            TAG_REQUESTS,
            writers.into_iter().map(WireWriter::finish).collect(),
        )?;

        let requests = collective::agree(
            comm,
            TAG_ROUTE_STATUS,
            collect_requests(mesh.num_blocks(), &recvs),
        )?;
        if !missed.is_empty() {
            log::debug!(
                "[rank {me}] {} of {n} target points are outside the source mesh",
                missed.len()
            );
        }
        self.state = Some(Routing {
            num_targets: n,
            missed,
            requests,
        });
        Ok(())
    }

    /// Collective. Evaluate the source field and write it into `target`,
    /// which must hold one entity per local target point.
    pub fn apply<E, F>(
        &self,
        evaluator: &E,
        target: &mut FieldManager<F>,
    ) -> Result<(), MeshTransferError>
    where
        E: FieldEvaluator,
        F: FieldTraitsMut,
    {
        let comm = &self.comm;
        let dim = target.dim();
        // every rank checks its inputs and evaluates before anyone exchanges
        let packed = self
            .state
            .as_ref()
            .ok_or(MeshTransferError::NotSetUp)
            .and_then(|state| {
                let sdim = self.config.dimension;
                let sends = state.pack(evaluator, sdim, dim, target.size(), comm.size())?;
                Ok((state, sends))
            });
        let (state, sends) = collective::agree(comm, TAG_APPLY_STATUS, packed)?;
        let recvs = comm.all_to_allv(TAG_VALUES, sends)?;

        let mut values: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
        for buf in &recvs {
            let mut r = WireReader::open(buf, kind::EVALUATIONS)?;
            let sent_dim = r.read::<WireCount>()?.get();
            if sent_dim != dim && !r.is_empty() {
                return Err(MeshTransferError::DimensionMismatch {
                    expected: dim,
                    found: sent_dim,
                });
            }
            while !r.is_empty() {
                let ev: WireEvaluation = r.read()?;
                let vals = (0..dim)
                    .map(|_| r.read::<WireScalar>().map(|s| s.get()))
                    .collect::<Result<Vec<_>, _>>()?;
                values.insert(ev.index(), vals);
            }
        }

        let n = state.num_targets;
        let out = target.field_mut().values_mut();
        out.fill(0.0);
        for (i, vals) in values {
            if i >= n {
                return Err(MeshTransferError::WireFormat(format!(
                    "evaluation for unknown target point {i}"
                )));
            }
            for (d, v) in vals.into_iter().enumerate() {
                out[d * n + i] = v;
            }
        }
        Ok(())
    }
}
