//! Reference-element mappings and exact point containment.
//!
//! The reference elements use the following vertex ordering:
//! - Segment: `[v0, v1]` with `\xi \in [0, 1]`.
//! - Triangle: `[v0, v1, v2]` with `(r, s)` in the unit right triangle.
//! - Quadrilateral: `[v0, v1, v2, v3]` with `(r, s)` in `[0, 1]^2`.
//! - Tetrahedron: `[v0, v1, v2, v3]` with `(r, s, t)` in the unit tetrahedron.
//! - Hexahedron: `[v0, .., v7]` with `(r, s, t)` in `[0, 1]^3`; `v0..v3` is the
//!   bottom face counter-clockwise, `v4..v7` the top face above it.
//! - Wedge: `[v0, .., v5]` with `(r, s)` in the unit triangle and `t` in `[0, 1]`;
//!   `v0..v2` is one triangle, `v3..v5` the opposite one.
//! - Pyramid: `[v0, .., v4]` with `(r, s)` in `[0, 1]^2` and apex `v4` at `t = 1`.
//!
//! Vertices are always passed as `[f64; 3]`; 2D meshes pad with `z = 0`.

use crate::mesh_error::MeshTransferError;
use crate::topology::cell_type::CellType;

const EPS: f64 = 1e-12;
const NEWTON_MAX_ITERS: usize = 20;
const NEWTON_TOL: f64 = 1e-10;

/// Unsigned cell volume/area/length.
pub fn cell_volume(cell_type: CellType, vertices: &[[f64; 3]]) -> Result<f64, MeshTransferError> {
    check_vertex_count(cell_type, vertices)?;
    let v = vertices;
    Ok(match cell_type {
        CellType::Vertex => 0.0,
        CellType::Segment => norm(sub(v[1], v[0])),
        CellType::Triangle => 0.5 * norm(cross(sub(v[1], v[0]), sub(v[2], v[0]))),
        CellType::Quadrilateral => {
            0.5 * norm(cross(sub(v[1], v[0]), sub(v[2], v[0])))
                + 0.5 * norm(cross(sub(v[2], v[0]), sub(v[3], v[0])))
        }
        CellType::Tetrahedron => signed_volume(v[0], v[1], v[2], v[3]).abs(),
        CellType::Hexahedron => hex_volume(v).abs(),
        CellType::Wedge => wedge_volume(v).abs(),
        CellType::Pyramid => pyramid_volume(v).abs(),
    })
}

/// Arithmetic mean of the vertices.
pub fn vertex_centroid(vertices: &[[f64; 3]]) -> [f64; 3] {
    let mut c = [0.0; 3];
    if vertices.is_empty() {
        return c;
    }
    for v in vertices {
        c[0] += v[0];
        c[1] += v[1];
        c[2] += v[2];
    }
    let n = vertices.len() as f64;
    [c[0] / n, c[1] / n, c[2] / n]
}

/// Map a point in reference coordinates to physical coordinates.
pub fn reference_to_physical(
    cell_type: CellType,
    vertices: &[[f64; 3]],
    reference_point: &[f64],
) -> Result<[f64; 3], MeshTransferError> {
    let (weights, _) = shape_functions(cell_type, reference_point)?;
    check_vertex_count(cell_type, vertices)?;
    let mut out = [0.0; 3];
    for (weight, vertex) in weights.iter().zip(vertices.iter()) {
        out[0] += weight * vertex[0];
        out[1] += weight * vertex[1];
        out[2] += weight * vertex[2];
    }
    Ok(out)
}

/// Jacobian at a reference point, row-major with shape `(3, cell_dim)`.
pub fn jacobian(
    cell_type: CellType,
    vertices: &[[f64; 3]],
    reference_point: &[f64],
) -> Result<Vec<f64>, MeshTransferError> {
    let (_, grads) = shape_functions(cell_type, reference_point)?;
    check_vertex_count(cell_type, vertices)?;
    let dim = cell_type.dimension();
    let mut out = vec![0.0; 3 * dim];
    for (vertex, grad) in vertices.iter().zip(grads.iter()) {
        for ref_dim in 0..dim {
            for row in 0..3 {
                out[row * dim + ref_dim] += vertex[row] * grad[ref_dim];
            }
        }
    }
    Ok(out)
}

/// Pull a physical vector back into reference space (least squares).
pub fn pull_back_vector(
    cell_type: CellType,
    vertices: &[[f64; 3]],
    reference_point: &[f64],
    physical_vector: &[f64; 3],
) -> Result<Vec<f64>, MeshTransferError> {
    let jac = jacobian(cell_type, vertices, reference_point)?;
    let dim = jac.len() / 3;
    let cols: Vec<[f64; 3]> = (0..dim)
        .map(|c| [jac[c], jac[dim + c], jac[2 * dim + c]])
        .collect();
    match dim {
        0 => Ok(Vec::new()),
        1 => {
            let denom = dot(cols[0], cols[0]);
            if denom <= EPS {
                return Err(degenerate());
            }
            Ok(vec![dot(cols[0], *physical_vector) / denom])
        }
        2 => {
            let a = dot(cols[0], cols[0]);
            let b = dot(cols[0], cols[1]);
            let c = dot(cols[1], cols[1]);
            let det = a * c - b * b;
            if det.abs() <= EPS {
                return Err(degenerate());
            }
            let r0 = dot(cols[0], *physical_vector);
            let r1 = dot(cols[1], *physical_vector);
            Ok(vec![(c * r0 - b * r1) / det, (a * r1 - b * r0) / det])
        }
        _ => {
            // square system: solve J x = v directly
            let mat = [
                cols[0][0], cols[1][0], cols[2][0], //
                cols[0][1], cols[1][1], cols[2][1], //
                cols[0][2], cols[1][2], cols[2][2],
            ];
            let inv = invert_3x3(mat)?;
            let v = physical_vector;
            Ok(vec![
                inv[0] * v[0] + inv[1] * v[1] + inv[2] * v[2],
                inv[3] * v[0] + inv[4] * v[1] + inv[5] * v[2],
                inv[6] * v[0] + inv[7] * v[1] + inv[8] * v[2],
            ])
        }
    }
}

/// Map a physical point back to reference coordinates with Newton iteration.
///
/// Linear simplices converge in one step; bilinear/trilinear cells usually
/// need a few. The last iterate is returned when the iteration budget is
/// exhausted, so callers must check the residual themselves (see
/// [`point_in_cell`]).
pub fn physical_to_reference(
    cell_type: CellType,
    vertices: &[[f64; 3]],
    physical_point: &[f64; 3],
) -> Result<Vec<f64>, MeshTransferError> {
    let dim = cell_type.dimension();
    if dim == 0 {
        return Ok(Vec::new());
    }
    let mut ref_point = initial_guess(cell_type);
    for _ in 0..NEWTON_MAX_ITERS {
        let mapped = reference_to_physical(cell_type, vertices, &ref_point)?;
        let residual = sub(mapped, *physical_point);
        if norm(residual) <= NEWTON_TOL {
            break;
        }
        let correction = pull_back_vector(cell_type, vertices, &ref_point, &residual)?;
        for (r, c) in ref_point.iter_mut().zip(correction.iter()) {
            *r -= c;
        }
    }
    Ok(ref_point)
}

/// Is `reference_point` inside the reference element, grown by `tol`?
pub fn reference_contains(cell_type: CellType, reference_point: &[f64], tol: f64) -> bool {
    if reference_point.len() < cell_type.dimension() {
        return false;
    }
    let in_unit = |x: f64| x >= -tol && x <= 1.0 + tol;
    let r = reference_point;
    match cell_type {
        CellType::Vertex => true,
        CellType::Segment => in_unit(r[0]),
        CellType::Quadrilateral => in_unit(r[0]) && in_unit(r[1]),
        CellType::Hexahedron | CellType::Pyramid => r[..3].iter().all(|&x| in_unit(x)),
        CellType::Triangle => r[0] >= -tol && r[1] >= -tol && r[0] + r[1] <= 1.0 + tol,
        CellType::Tetrahedron => {
            r[..3].iter().all(|&x| x >= -tol) && r[0] + r[1] + r[2] <= 1.0 + tol
        }
        CellType::Wedge => {
            r[0] >= -tol && r[1] >= -tol && r[0] + r[1] <= 1.0 + tol && in_unit(r[2])
        }
    }
}

/// Exact point-in-element test through the inverse reference map.
///
/// `tol` widens the reference element (reference coordinates). A point whose
/// Newton iteration does not converge onto it is reported outside, which also
/// rejects points off the plane of 2D cells embedded in 3D.
pub fn point_in_cell(
    cell_type: CellType,
    vertices: &[[f64; 3]],
    point: &[f64; 3],
    tol: f64,
) -> Result<bool, MeshTransferError> {
    check_vertex_count(cell_type, vertices)?;
    if cell_type == CellType::Vertex {
        return Ok(norm(sub(vertices[0], *point)) <= tol);
    }
    let reference = match physical_to_reference(cell_type, vertices, point) {
        Ok(r) => r,
        Err(MeshTransferError::InvalidGeometry(msg)) => {
            log::trace!("inverse map failed for {cell_type:?} at {point:?}: {msg}");
            return Ok(false);
        }
        Err(e) => return Err(e),
    };
    if !reference.iter().all(|x| x.is_finite()) || !reference_contains(cell_type, &reference, tol)
    {
        return Ok(false);
    }
    let mapped = reference_to_physical(cell_type, vertices, &reference)?;
    let scale = 1.0 + vertex_span(vertices);
    Ok(norm(sub(mapped, *point)) <= (tol + 1e-8) * scale)
}

fn vertex_span(vertices: &[[f64; 3]]) -> f64 {
    let mut lo = [f64::INFINITY; 3];
    let mut hi = [f64::NEG_INFINITY; 3];
    for v in vertices {
        for d in 0..3 {
            lo[d] = lo[d].min(v[d]);
            hi[d] = hi[d].max(v[d]);
        }
    }
    norm(sub(hi, lo))
}

fn initial_guess(cell_type: CellType) -> Vec<f64> {
    match cell_type {
        CellType::Triangle => vec![1.0 / 3.0; 2],
        CellType::Tetrahedron => vec![0.25; 3],
        CellType::Wedge => vec![1.0 / 3.0, 1.0 / 3.0, 0.5],
        // keep away from the singular apex
        CellType::Pyramid => vec![0.5, 0.5, 0.25],
        other => vec![0.5; other.dimension()],
    }
}

fn shape_functions(
    cell_type: CellType,
    reference_point: &[f64],
) -> Result<(Vec<f64>, Vec<Vec<f64>>), MeshTransferError> {
    let dim = cell_type.dimension();
    if reference_point.len() != dim {
        return Err(MeshTransferError::InvalidGeometry(format!(
            "{cell_type:?} reference point must have {dim} components, got {}",
            reference_point.len()
        )));
    }
    let p = reference_point;
    Ok(match cell_type {
        CellType::Vertex => (vec![1.0], vec![Vec::new()]),
        CellType::Segment => (vec![1.0 - p[0], p[0]], vec![vec![-1.0], vec![1.0]]),
        CellType::Triangle => {
            let (r, s) = (p[0], p[1]);
            (
                vec![1.0 - r - s, r, s],
                vec![vec![-1.0, -1.0], vec![1.0, 0.0], vec![0.0, 1.0]],
            )
        }
        CellType::Quadrilateral => {
            let (r, s) = (p[0], p[1]);
            (
                vec![(1.0 - r) * (1.0 - s), r * (1.0 - s), r * s, (1.0 - r) * s],
                vec![
                    vec![-(1.0 - s), -(1.0 - r)],
                    vec![1.0 - s, -r],
                    vec![s, r],
                    vec![-s, 1.0 - r],
                ],
            )
        }
        CellType::Tetrahedron => {
            let (r, s, t) = (p[0], p[1], p[2]);
            (
                vec![1.0 - r - s - t, r, s, t],
                vec![
                    vec![-1.0, -1.0, -1.0],
                    vec![1.0, 0.0, 0.0],
                    vec![0.0, 1.0, 0.0],
                    vec![0.0, 0.0, 1.0],
                ],
            )
        }
        CellType::Hexahedron => {
            let (r, s, t) = (p[0], p[1], p[2]);
            let (rm, sm, tm) = (1.0 - r, 1.0 - s, 1.0 - t);
            (
                vec![
                    rm * sm * tm,
                    r * sm * tm,
                    r * s * tm,
                    rm * s * tm,
                    rm * sm * t,
                    r * sm * t,
                    r * s * t,
                    rm * s * t,
                ],
                vec![
                    vec![-sm * tm, -rm * tm, -rm * sm],
                    vec![sm * tm, -r * tm, -r * sm],
                    vec![s * tm, r * tm, -r * s],
                    vec![-s * tm, rm * tm, -rm * s],
                    vec![-sm * t, -rm * t, rm * sm],
                    vec![sm * t, -r * t, r * sm],
                    vec![s * t, r * t, r * s],
                    vec![-s * t, rm * t, rm * s],
                ],
            )
        }
        CellType::Wedge => {
            let (r, s, t) = (p[0], p[1], p[2]);
            let rm = 1.0 - r - s;
            let tm = 1.0 - t;
            (
                vec![rm * tm, r * tm, s * tm, rm * t, r * t, s * t],
                vec![
                    vec![-tm, -tm, -rm],
                    vec![tm, 0.0, -r],
                    vec![0.0, tm, -s],
                    vec![-t, -t, rm],
                    vec![t, 0.0, r],
                    vec![0.0, t, s],
                ],
            )
        }
        CellType::Pyramid => {
            let (r, s, t) = (p[0], p[1], p[2]);
            let (rm, sm, tm) = (1.0 - r, 1.0 - s, 1.0 - t);
            (
                vec![tm * rm * sm, tm * r * sm, tm * r * s, tm * rm * s, t],
                vec![
                    vec![-tm * sm, -tm * rm, -rm * sm],
                    vec![tm * sm, -tm * r, -r * sm],
                    vec![tm * s, tm * r, -r * s],
                    vec![-tm * s, tm * rm, -rm * s],
                    vec![0.0, 0.0, 1.0],
                ],
            )
        }
    })
}

fn check_vertex_count(cell_type: CellType, vertices: &[[f64; 3]]) -> Result<(), MeshTransferError> {
    let expected = cell_type.node_count();
    if vertices.len() != expected {
        return Err(MeshTransferError::InvalidGeometry(format!(
            "vertex count mismatch for {cell_type:?}: expected {expected}, got {}",
            vertices.len()
        )));
    }
    Ok(())
}

fn degenerate() -> MeshTransferError {
    MeshTransferError::InvalidGeometry("degenerate jacobian".into())
}

fn signed_volume(a: [f64; 3], b: [f64; 3], c: [f64; 3], d: [f64; 3]) -> f64 {
    dot(sub(b, a), cross(sub(c, a), sub(d, a))) / 6.0
}

fn wedge_volume(v: &[[f64; 3]]) -> f64 {
    signed_volume(v[0], v[1], v[2], v[3])
        + signed_volume(v[1], v[4], v[2], v[3])
        + signed_volume(v[2], v[4], v[5], v[3])
}

fn pyramid_volume(v: &[[f64; 3]]) -> f64 {
    signed_volume(v[0], v[1], v[2], v[4]) + signed_volume(v[0], v[2], v[3], v[4])
}

fn hex_volume(v: &[[f64; 3]]) -> f64 {
    signed_volume(v[0], v[1], v[3], v[4])
        + signed_volume(v[1], v[2], v[3], v[6])
        + signed_volume(v[1], v[3], v[4], v[6])
        + signed_volume(v[1], v[4], v[5], v[6])
        + signed_volume(v[3], v[4], v[6], v[7])
}

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

fn invert_3x3(mat: [f64; 9]) -> Result<[f64; 9], MeshTransferError> {
    let det = mat[0] * (mat[4] * mat[8] - mat[5] * mat[7])
        - mat[1] * (mat[3] * mat[8] - mat[5] * mat[6])
        + mat[2] * (mat[3] * mat[7] - mat[4] * mat[6]);
    if det.abs() <= EPS {
        return Err(degenerate());
    }
    let inv_det = 1.0 / det;
    Ok([
        (mat[4] * mat[8] - mat[5] * mat[7]) * inv_det,
        (mat[2] * mat[7] - mat[1] * mat[8]) * inv_det,
        (mat[1] * mat[5] - mat[2] * mat[4]) * inv_det,
        (mat[5] * mat[6] - mat[3] * mat[8]) * inv_det,
        (mat[0] * mat[8] - mat[2] * mat[6]) * inv_det,
        (mat[2] * mat[3] - mat[0] * mat[5]) * inv_det,
        (mat[3] * mat[7] - mat[4] * mat[6]) * inv_det,
        (mat[1] * mat[6] - mat[0] * mat[7]) * inv_det,
        (mat[0] * mat[4] - mat[1] * mat[3]) * inv_det,
    ])
}
