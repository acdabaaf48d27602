mod util;
use mesh_rendezvous::prelude::*;
use util::*;

/// Linear field `x + 2y + 3z`; the second component is the evaluating rank.
struct Linear {
    rank: usize,
}

impl FieldEvaluator for Linear {
    type Field = FieldContainer;
    fn evaluate(&self, elements: &[Handle], coords: &[f64]) -> FieldContainer {
        let n = elements.len();
        let mut data: Vec<f64> = (0..n)
            .map(|i| coords[i] + 2.0 * coords[n + i] + 3.0 * coords[2 * n + i])
            .collect();
        data.extend(std::iter::repeat(self.rank as f64).take(n));
        FieldContainer::from_data(2, data).unwrap()
    }
}

fn blocked(points: &[[f64; 3]]) -> Vec<f64> {
    let n = points.len();
    let mut out = vec![0.0; 3 * n];
    for (i, p) in points.iter().enumerate() {
        for d in 0..3 {
            out[d * n + i] = p[d];
        }
    }
    out
}

#[test]
fn values_come_back_to_the_requesting_rank() {
    let out = run_world(2, |comm| {
        let rank = comm.rank();
        let mesh = hex_slab_mesh(rank);
        // each rank asks for points in the other rank's slab, plus one miss
        let z = if rank == 0 { 1.5 } else { 0.5 };
        let points = [[1.25, 3.5, z], [8.0, 0.5, z], [20.0, 0.0, z]];
        let mut map = SharedDomainMap::new(comm, MapConfig::default()).unwrap();
        map.setup(&mesh, &blocked(&points)).unwrap();
        let mut target = FieldManager::new(FieldContainer::new(2, points.len()));
        map.apply(&Linear { rank }, &mut target).unwrap();
        (map.missed_points().to_vec(), target.into_inner())
    });

    let (missed, f) = &out[0];
    assert_eq!(missed, &[2]);
    assert_eq!(f.component(0), &[1.25 + 7.0 + 4.5, 8.0 + 1.0 + 4.5, 0.0]);
    assert_eq!(f.component(1), &[1.0, 1.0, 0.0]);

    let (missed, f) = &out[1];
    assert_eq!(missed, &[2]);
    assert_eq!(f.component(0), &[1.25 + 7.0 + 1.5, 8.0 + 1.0 + 1.5, 0.0]);
    assert_eq!(f.component(1), &[0.0, 0.0, 0.0]);
}

#[test]
fn ranks_without_targets_still_serve_evaluations() {
    let out = run_world(3, |comm| {
        let rank = comm.rank();
        let mesh = hex_slab_mesh(rank);
        let points: Vec<[f64; 3]> = if rank == 2 {
            (0..3).map(|r| [4.5, 4.5, r as f64 + 0.5]).collect()
        } else {
            Vec::new()
        };
        let mut map = SharedDomainMap::new(comm, MapConfig::default()).unwrap();
        map.setup(&mesh, &blocked(&points)).unwrap();
        let mut target = FieldManager::new(FieldContainer::new(2, points.len()));
        map.apply(&Linear { rank }, &mut target).unwrap();
        target.into_inner()
    });
    assert!(out[0].is_empty());
    assert!(out[1].is_empty());
    assert_eq!(out[2].component(1), &[0.0, 1.0, 2.0]);
}

#[test]
fn target_size_must_match_setup() {
    let out = run_world(2, |comm| {
        let mesh = hex_slab_mesh(comm.rank());
        let mut map = SharedDomainMap::new(comm, MapConfig::default()).unwrap();
        map.setup(&mesh, &blocked(&[[1.0, 1.0, 0.5]])).unwrap();
        let mut target = FieldManager::new(FieldContainer::new(2, 2));
        map.apply(&Linear { rank: 0 }, &mut target)
    });
    for r in out {
        assert_eq!(r, Err(MeshTransferError::FieldSizeMismatch { expected: 1, found: 2 }));
    }
}

/// Scalar where two components are expected.
struct Scalar;

impl FieldEvaluator for Scalar {
    type Field = FieldContainer;
    fn evaluate(&self, elements: &[Handle], _coords: &[f64]) -> FieldContainer {
        FieldContainer::new(1, elements.len())
    }
}

#[test]
fn bad_evaluator_on_one_rank_fails_every_rank() {
    let out = run_world(2, |comm| {
        let rank = comm.rank();
        let mesh = hex_slab_mesh(rank);
        let z = if rank == 0 { 1.5 } else { 0.5 };
        let points = [[1.25, 3.5, z]];
        let mut map = SharedDomainMap::new(comm, MapConfig::default()).unwrap();
        map.setup(&mesh, &blocked(&points)).unwrap();
        let mut target = FieldManager::new(FieldContainer::new(2, points.len()));
        if rank == 0 {
            map.apply(&Scalar, &mut target)
        } else {
            map.apply(&Linear { rank }, &mut target)
        }
    });
    assert_eq!(
        out[0],
        Err(MeshTransferError::DimensionMismatch { expected: 2, found: 1 })
    );
    assert!(matches!(out[1], Err(MeshTransferError::CommError { neighbor: 0, .. })));
}

#[test]
fn mismatched_setup_fails_every_rank() {
    let out = run_world(2, |comm| {
        let rank = comm.rank();
        let mesh = hex_slab_mesh(rank);
        let mut map = SharedDomainMap::new(comm, MapConfig::default()).unwrap();
        // rank 1 hands over a ragged coordinate array
        let coords = if rank == 1 { vec![0.5; 4] } else { vec![0.5; 3] };
        let result = map.setup(&mesh, &coords);
        (result, map.is_ready())
    });
    assert!(matches!(out[0].0, Err(MeshTransferError::CommError { neighbor: 1, .. })));
    assert!(matches!(out[1].0, Err(MeshTransferError::CoordinateLengthMismatch { .. })));
    assert!(!out[0].1 && !out[1].1);
}
