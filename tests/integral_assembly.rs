mod util;
use std::collections::HashSet;

use mesh_rendezvous::prelude::*;
use util::*;

const RANKS: usize = 4;
const TOL: f64 = 1.0e-6;

/// 2.0 per component for elements of the local block, junk for anything else.
struct KnownElements(HashSet<Handle>);

impl KnownElements {
    fn new(mesh: &MeshManager) -> Self {
        Self(
            mesh.blocks()
                .iter()
                .flat_map(|b| b.element_handles().iter().copied())
                .collect(),
        )
    }
}

impl FieldIntegrator for KnownElements {
    type Field = FieldContainer;
    fn integrate(&self, elements: &[Handle]) -> FieldContainer {
        let n = elements.len();
        let mut data = vec![0.0; 3 * n];
        for (i, e) in elements.iter().enumerate() {
            let v = if self.0.contains(e) { 2.0 } else { 6789.443 };
            for d in 0..3 {
                data[d * n + i] = v;
            }
        }
        FieldContainer::from_data(3, data).unwrap()
    }
}

impl ElementMeasure for KnownElements {
    fn measure(&self, elements: &[Handle]) -> Vec<f64> {
        elements
            .iter()
            .map(|e| if self.0.contains(e) { 1.0 } else { -1.0 })
            .collect()
    }
}

/// Local elements with at least one vertex inside `g`.
fn brute_force_count<G: GeometryTraits>(mesh: &MeshManager, g: &G) -> usize {
    mesh.blocks()
        .iter()
        .map(|b| {
            (0..b.num_elements())
                .filter(|&e| {
                    b.element_vertex_indices(e)
                        .iter()
                        .any(|&v| g.point_in_geometry(&b.vertex_coords(v), TOL))
                })
                .count()
        })
        .sum()
}

/// Run the four-rank mixed-topology transfer with one geometry on rank 0.
/// Returns, per rank, the target values and the number of local pairs.
fn assemble<G>(geometry: G) -> Vec<(Vec<f64>, usize, usize)>
where
    G: WireGeometry + Clone + Sync,
{
    run_world(RANKS, |comm| {
        let rank = comm.rank();
        let mesh = mixed_topology_mesh(rank);
        let known = KnownElements::new(&mesh);
        let (geometries, size) = if rank == 0 {
            (GeometryManager::new(vec![geometry.clone()], vec![0], 3).unwrap(), 1)
        } else {
            (GeometryManager::empty(3).unwrap(), 0)
        };
        let mut target = FieldManager::new(FieldContainer::new(3, size));

        let config = MapConfig::default().with_tolerance(TOL);
        let mut map = IntegralAssemblyMap::new(comm, config).unwrap();
        map.setup(&mesh, &known, &geometries).unwrap();
        map.apply(&known, &mut target).unwrap();

        let expected = brute_force_count(&mesh, &geometry);
        (target.into_inner().into_data(), map.num_local_pairs(), expected)
    })
}

fn check(results: &[(Vec<f64>, usize, usize)]) {
    assert_eq!(results[0].0, vec![2.0, 2.0, 2.0]);
    for (values, _, _) in &results[1..] {
        assert!(values.is_empty());
    }
    let pairs: usize = results.iter().map(|r| r.1).sum();
    let expected: usize = results.iter().map(|r| r.2).sum();
    assert!(expected > 0);
    assert_eq!(pairs, expected);
}

#[test]
fn cylinder_over_mixed_topologies() {
    let cylinder = Cylinder::new(RANKS as f64, 4.5, [4.5, 4.5, RANKS as f64 / 2.0]).unwrap();
    check(&assemble(cylinder));
}

#[test]
fn box_over_mixed_topologies() {
    let cuboid = Cuboid::new([0.0; 3], [9.0, 9.0, RANKS as f64]).unwrap();
    let results = assemble(cuboid);
    check(&results);
    // the box covers every vertex of every slab
    for (rank, r) in results.iter().enumerate() {
        assert_eq!(r.1, mixed_topology_mesh(rank).num_local_elements());
    }
}

#[test]
fn apply_is_repeatable() {
    let out = run_world(2, |comm| {
        let rank = comm.rank();
        let mesh = hex_slab_mesh(rank);
        let known = KnownElements::new(&mesh);
        let geometries = if rank == 1 {
            let g = Cuboid::new([2.0, 2.0, 0.5], [4.0, 4.0, 1.5]).unwrap();
            GeometryManager::new(vec![g], vec![7], 3).unwrap()
        } else {
            GeometryManager::empty(3).unwrap()
        };
        let size = usize::from(rank == 1);
        let mut map = IntegralAssemblyMap::new(comm, MapConfig::default()).unwrap();
        map.setup(&mesh, &known, &geometries).unwrap();

        let mut first = FieldManager::new(FieldContainer::new(3, size));
        let mut second = FieldManager::new(FieldContainer::new(3, size));
        map.apply(&known, &mut first).unwrap();
        map.apply(&known, &mut second).unwrap();
        (first.into_inner(), second.into_inner())
    });
    for (first, second) in &out {
        assert_eq!(first, second);
    }
    assert_eq!(out[1].0.values(), &[2.0, 2.0, 2.0]);
}

#[test]
fn geometry_outside_the_mesh_gets_zero() {
    let out = run_world(2, |comm| {
        let rank = comm.rank();
        let mesh = hex_slab_mesh(rank);
        let known = KnownElements::new(&mesh);
        let geometries = if rank == 0 {
            let g = Cuboid::new([50.0; 3], [51.0; 3]).unwrap();
            GeometryManager::new(vec![g], vec![3], 3).unwrap()
        } else {
            GeometryManager::empty(3).unwrap()
        };
        let size = usize::from(rank == 0);
        let mut map = IntegralAssemblyMap::new(comm, MapConfig::default()).unwrap();
        map.setup(&mesh, &known, &geometries).unwrap();
        let mut target = FieldManager::new(FieldContainer::new(3, size));
        map.apply(&known, &mut target).unwrap();
        (map.num_local_pairs(), target.into_inner().into_data())
    });
    assert_eq!(out[0], (0, vec![0.0, 0.0, 0.0]));
    assert_eq!(out[1], (0, vec![]));
}

/// Returns one entity more than requested.
struct Oversized;

impl FieldIntegrator for Oversized {
    type Field = FieldContainer;
    fn integrate(&self, elements: &[Handle]) -> FieldContainer {
        FieldContainer::new(3, elements.len() + 1)
    }
}

#[test]
fn bad_integrator_on_one_rank_fails_every_rank() {
    let out = run_world(2, |comm| {
        let rank = comm.rank();
        let mesh = hex_slab_mesh(rank);
        let known = KnownElements::new(&mesh);
        let geometries = if rank == 1 {
            let g = Cuboid::new([2.0, 2.0, 0.5], [4.0, 4.0, 1.5]).unwrap();
            GeometryManager::new(vec![g], vec![7], 3).unwrap()
        } else {
            GeometryManager::empty(3).unwrap()
        };
        let size = usize::from(rank == 1);
        let mut map = IntegralAssemblyMap::new(comm, MapConfig::default()).unwrap();
        map.setup(&mesh, &known, &geometries).unwrap();
        assert!(map.num_local_pairs() > 0);

        let mut target = FieldManager::new(FieldContainer::new(3, size));
        if rank == 1 {
            map.apply(&Oversized, &mut target)
        } else {
            map.apply(&known, &mut target)
        }
    });
    assert!(matches!(out[0], Err(MeshTransferError::CommError { neighbor: 1, .. })));
    assert!(matches!(out[1], Err(MeshTransferError::FieldSizeMismatch { .. })));
}
