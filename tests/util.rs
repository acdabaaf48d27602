#![allow(dead_code)]
use mesh_rendezvous::{
    algs::communicator::RayonComm,
    data::{GenericMeshView, MeshManager},
    topology::{cell_type::CellType, handle::Handle},
};

/// Vertices per edge of the structured slabs.
pub const EDGE: usize = 10;

pub const TET_OFFSET: u64 = 0;
pub const HEX_OFFSET: u64 = ((EDGE + 1) * (EDGE + 1) * 5) as u64;
pub const PYRAMID_OFFSET: u64 = HEX_OFFSET + ((EDGE + 1) * (EDGE + 1)) as u64;
pub const WEDGE_OFFSET: u64 = PYRAMID_OFFSET + ((EDGE + 1) * (EDGE + 1) * 6) as u64;

pub fn h(u: u64) -> Handle {
    Handle::new(u)
}

/// Run `f` on every rank of a fresh `n`-rank thread world; results come
/// back in rank order.
pub fn run_world<T, F>(n: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(RayonComm) -> T + Sync,
{
    let f = &f;
    std::thread::scope(|s| {
        let handles: Vec<_> = RayonComm::world(n)
            .into_iter()
            .map(|c| s.spawn(move || f(c)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("rank panicked"))
            .collect()
    })
}

/// Slab vertices: two `EDGE x EDGE` layers at `z = rank` and `z = rank + 1`,
/// optionally followed by the cell centres at `z = rank + 0.5`.
struct Slab {
    handles: Vec<Handle>,
    xyz: Vec<[f64; 3]>,
}

impl Slab {
    fn new(rank: usize, offset: u64, with_centres: bool) -> Self {
        let mut xyz = Vec::new();
        for layer in 0..2 {
            for j in 0..EDGE {
                for i in 0..EDGE {
                    xyz.push([i as f64, j as f64, (rank + layer) as f64]);
                }
            }
        }
        if with_centres {
            for j in 0..EDGE - 1 {
                for i in 0..EDGE - 1 {
                    xyz.push([i as f64 + 0.5, j as f64 + 0.5, rank as f64 + 0.5]);
                }
            }
        }
        let nv = xyz.len() as u64;
        let handles = (0..nv).map(|idx| h(nv * rank as u64 + idx + offset)).collect();
        Self { handles, xyz }
    }

    /// The eight hex corners of cell `(i, j)` followed by its centre index.
    fn corners(i: usize, j: usize) -> [usize; 9] {
        let base = i + j * EDGE;
        let up = EDGE * EDGE;
        [
            base,
            base + 1,
            base + 1 + EDGE,
            base + EDGE,
            base + up,
            base + 1 + up,
            base + 1 + EDGE + up,
            base + EDGE + up,
            i + j * (EDGE - 1) + 2 * up,
        ]
    }

    /// Assemble a block: `pattern[k]` lists the corner slots of the `k`-th
    /// sub-element of every cell. Element `k * cells + cell` has handle
    /// `index + offset`.
    fn block(self, topology: CellType, pattern: &[&[usize]], offset: u64) -> GenericMeshView {
        let cells = (EDGE - 1) * (EDGE - 1);
        let ne = cells * pattern.len();
        let npe = topology.node_count();
        let mut elements = Vec::with_capacity(ne);
        let mut rows = vec![Vec::with_capacity(npe); ne];
        for (k, slots) in pattern.iter().enumerate() {
            for j in 0..EDGE - 1 {
                for i in 0..EDGE - 1 {
                    let v = Self::corners(i, j);
                    let e = k * cells + i + j * (EDGE - 1);
                    rows[e] = slots.iter().map(|&s| self.handles[v[s]]).collect();
                }
            }
        }
        for e in 0..ne {
            elements.push(h(e as u64 + offset));
        }
        let mut connectivity = vec![h(0); npe * ne];
        for (e, row) in rows.iter().enumerate() {
            for (n, v) in row.iter().enumerate() {
                connectivity[n * ne + e] = *v;
            }
        }
        let nv = self.xyz.len();
        let mut coords = vec![0.0; 3 * nv];
        for (i, p) in self.xyz.iter().enumerate() {
            for d in 0..3 {
                coords[d * nv + i] = p[d];
            }
        }
        GenericMeshView::from_parts(
            3,
            self.handles,
            coords,
            topology,
            elements,
            connectivity,
            (0..npe).collect(),
        )
        .expect("structured slab")
    }
}

pub fn tet_block(rank: usize) -> GenericMeshView {
    Slab::new(rank, TET_OFFSET, false).block(
        CellType::Tetrahedron,
        &[
            &[0, 1, 3, 4],
            &[1, 2, 3, 6],
            &[6, 5, 4, 1],
            &[4, 7, 6, 3],
            &[3, 1, 6, 4],
        ],
        TET_OFFSET,
    )
}

pub fn hex_block(rank: usize) -> GenericMeshView {
    Slab::new(rank, HEX_OFFSET, false).block(
        CellType::Hexahedron,
        &[&[0, 1, 2, 3, 4, 5, 6, 7]],
        HEX_OFFSET,
    )
}

pub fn pyramid_block(rank: usize) -> GenericMeshView {
    Slab::new(rank, PYRAMID_OFFSET, true).block(
        CellType::Pyramid,
        &[
            &[0, 1, 2, 3, 8],
            &[1, 5, 6, 2, 8],
            &[2, 6, 7, 3, 8],
            &[4, 0, 3, 7, 8],
            &[4, 5, 1, 0, 8],
            &[4, 7, 6, 5, 8],
        ],
        PYRAMID_OFFSET,
    )
}

pub fn wedge_block(rank: usize) -> GenericMeshView {
    Slab::new(rank, WEDGE_OFFSET, false).block(
        CellType::Wedge,
        &[&[0, 4, 1, 3, 7, 2], &[1, 4, 5, 2, 7, 6]],
        WEDGE_OFFSET,
    )
}

const TOPOLOGIES: [CellType; 4] = [
    CellType::Tetrahedron,
    CellType::Hexahedron,
    CellType::Pyramid,
    CellType::Wedge,
];

/// Four blocks (tet, hex, pyramid, wedge); rank `r < 4` holds block `r` as
/// the slab `z in [r, r + 1]` and null views of the other three.
pub fn mixed_topology_mesh(rank: usize) -> MeshManager {
    let blocks = TOPOLOGIES
        .iter()
        .enumerate()
        .map(|(b, &topo)| {
            if b != rank {
                return GenericMeshView::null(3, topo);
            }
            match b {
                0 => tet_block(rank),
                1 => hex_block(rank),
                2 => pyramid_block(rank),
                _ => wedge_block(rank),
            }
        })
        .collect();
    MeshManager::new(blocks, 3).expect("mixed mesh")
}

/// Hex slab of `rank` with element handles unique across ranks.
pub fn hex_slab(rank: usize) -> GenericMeshView {
    Slab::new(rank, HEX_OFFSET, false).block(
        CellType::Hexahedron,
        &[&[0, 1, 2, 3, 4, 5, 6, 7]],
        100 * rank as u64,
    )
}

/// Single hex block; every rank holds its own slab.
pub fn hex_slab_mesh(rank: usize) -> MeshManager {
    MeshManager::new(vec![hex_slab(rank)], 3).expect("hex mesh")
}
