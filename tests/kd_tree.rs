mod util;
use mesh_rendezvous::geometry::metrics::reference_to_physical;
use mesh_rendezvous::prelude::*;
use proptest::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use util::*;

/// Two stacked unit hexes with scrambled vertex handles.
fn two_hexes() -> GenericMeshView {
    let vertices: [([f64; 3], u64); 12] = [
        ([0.0, 0.0, 0.0], 0),
        ([1.0, 0.0, 0.0], 4),
        ([1.0, 1.0, 0.0], 9),
        ([0.0, 1.0, 0.0], 2),
        ([0.0, 0.0, 1.0], 3),
        ([1.0, 0.0, 1.0], 8),
        ([1.0, 1.0, 1.0], 1),
        ([0.0, 1.0, 1.0], 6),
        ([0.0, 0.0, 2.0], 12),
        ([1.0, 0.0, 2.0], 7),
        ([1.0, 1.0, 2.0], 13),
        ([0.0, 1.0, 2.0], 5),
    ];
    let nv = vertices.len();
    let mut coords = vec![0.0; 3 * nv];
    for (i, (p, _)) in vertices.iter().enumerate() {
        for d in 0..3 {
            coords[d * nv + i] = p[d];
        }
    }
    let hexes: [[u64; 8]; 2] = [[0, 4, 9, 2, 3, 8, 1, 6], [3, 8, 1, 6, 12, 7, 13, 5]];
    let mut connectivity = vec![h(0); 16];
    for (e, hex) in hexes.iter().enumerate() {
        for (n, v) in hex.iter().enumerate() {
            connectivity[n * 2 + e] = h(*v);
        }
    }
    GenericMeshView::from_parts(
        3,
        vertices.iter().map(|(_, v)| h(*v)).collect(),
        coords,
        CellType::Hexahedron,
        vec![h(0), h(1)],
        connectivity,
        (0..8).collect(),
    )
    .unwrap()
}

#[test]
fn finds_the_containing_hex() {
    let view = two_hexes();
    let tree = KdTree::build(&view);
    assert_eq!(tree.find_point(&view, &[0.5, 0.45, 0.98], 1e-6).unwrap(), h(0));
    assert_eq!(tree.find_point(&view, &[0.2, 0.9, 1.32], 1e-6).unwrap(), h(1));
}

#[test]
fn points_outside_the_mesh_are_not_found() {
    let view = two_hexes();
    let tree = KdTree::build(&view);
    for p in [[2.9, -0.5, 9.5], [0.1, 1.5, -4.8]] {
        assert!(matches!(
            tree.find_point(&view, &p, 1e-6),
            Err(MeshTransferError::PointNotFound { .. })
        ));
    }
}

#[test]
fn every_slab_topology_resolves_interior_points() {
    let mut rng = SmallRng::seed_from_u64(42);
    for view in [tet_block(0), hex_block(0), pyramid_block(0), wedge_block(0)] {
        let tree = KdTree::build_with_leaf_capacity(&view, 4);
        for _ in 0..200 {
            let p = [
                rng.gen_range(0.0..9.0),
                rng.gen_range(0.0..9.0),
                rng.gen_range(0.0..1.0),
            ];
            let found = tree.find_point(&view, &p, 1e-9).unwrap();
            let e = view.element_index(found).unwrap();
            assert!(view.element_contains(e, &p, 1e-9).unwrap());
        }
        assert!(tree.locate(&view, &[4.0, 4.0, 1.5], 1e-9).unwrap().is_none());
    }
}

proptest! {
    #[test]
    fn mapped_reference_points_land_in_their_hex(
        r in 0.01f64..0.99,
        s in 0.01f64..0.99,
        t in 0.01f64..0.99,
        which in 0usize..2,
    ) {
        let view = two_hexes();
        let tree = KdTree::build(&view);
        let corners: Vec<[f64; 3]> = view
            .element_vertex_indices(which)
            .iter()
            .map(|&v| view.vertex_coords(v))
            .collect();
        let p = reference_to_physical(CellType::Hexahedron, &corners, &[r, s, t]).unwrap();
        prop_assert_eq!(tree.find_point(&view, &p, 1e-9).unwrap(), h(which as u64));
    }
}
