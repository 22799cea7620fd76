//! Regular-neighbourhood detection and bicubic patch extraction.
//!
//! A quadrilateral face whose neighbourhood is fully regular -- all
//! four corners of valence four, no creases or corners, no boundary,
//! nine quadrilateral faces around it, and continuous facevertex data
//! across the interior seams -- carries exactly the control cage of a
//! uniform bicubic B-spline patch.  Splitting such a face to a patch
//! is far cheaper than recursive subdivision, so the splitter asks
//! [`SubdivTopology::can_use_patch`] before refining.
//!
//! The neighbourhood is indexed as a 4x4 grid of vertices and a 6x6
//! grid of face-vertices:
//!
//! ```text
//!  0-----------1-----------2-----------3   <-- vertex
//!  | 0       1 | 2       3 | 4       5 |   <-- face-vertex
//!  | 6       7 | 8       9 | 10     11 |
//!  4-----------5-----------6-----------7
//!  | 12     13 | 14     15 | 16     17 |
//!  | 18     19 | 20     21 | 22     23 |
//!  8-----------9-----------10----------11
//!  | 24     25 | 26     27 | 28     29 |
//!  | 30     31 | 32     33 | 34     35 |
//!  12----------13----------14----------15
//! ```

use glam::Mat4;

use super::lath::{LathArena, LathId};
use super::primvar::{is_close, Primvar, PrimvarClass, PrimvarData, PrimvarSet};
use super::topology::SubdivTopology;

/// Pairs of face-vertex grid positions that must agree for the
/// neighbourhood to be continuous: the edge midpoints of the central
/// face, then the identifications at its four inner corners.
const CONTINUITY_PAIRS: [(usize, usize); 20] = [
    (1, 2),
    (3, 4),
    (6, 12),
    (11, 17),
    (18, 24),
    (23, 29),
    (31, 32),
    (33, 34),
    (7, 14),
    (8, 14),
    (13, 14),
    (9, 15),
    (10, 15),
    (16, 15),
    (19, 20),
    (25, 20),
    (26, 20),
    (22, 21),
    (27, 21),
    (28, 21),
];

/// Extract vertex and face-vertex indices for the neighbourhood of a
/// regular patch, in the canonical order of the module diagram.
///
/// Returns `None` if the walk crosses a boundary, in which case the
/// neighbourhood is not regular anyway.  The traversal is written out
/// in full; it is a fixed path over the lath structure and resists
/// being automated.
pub(crate) fn neighbourhood_indices(
    arena: &LathArena,
    face: LathId,
) -> Option<([u32; 16], [u32; 36])> {
    struct Cursor<'a> {
        arena: &'a LathArena,
        vertices: [u32; 16],
        face_vertices: [u32; 36],
        vi: usize,
        fvi: usize,
    }
    impl Cursor<'_> {
        fn v(&mut self, l: LathId) {
            self.vertices[self.vi] = self.arena.vertex_index(l);
            self.vi += 1;
        }
        fn fv(&mut self, l: LathId) {
            self.face_vertices[self.fvi] = self.arena.face_vertex_index(l);
            self.fvi += 1;
        }
    }
    let mut c = Cursor {
        arena,
        vertices: [0; 16],
        face_vertices: [0; 36],
        vi: 0,
        fvi: 0,
    };
    let cf = |l: LathId| arena.cf(l);
    let ccf = |l: LathId| arena.ccf(l);
    let cv = |l: LathId| arena.cv(l);
    let ccv = |l: LathId| arena.ccv(l);

    // First column of patches.
    let mut col = cf(cf(cv(cv(face)?)?));
    let mut v = col;
    c.v(v);
    c.fv(v);
    v = ccf(v);
    c.v(v);
    c.fv(v);
    v = cv(v)?;
    c.fv(v);
    v = ccf(v);
    c.v(v);
    c.fv(v);
    v = cv(v)?;
    c.fv(v);
    v = ccf(v);
    c.v(v);
    c.fv(v);
    col = cf(col);
    v = col;
    c.fv(v);
    v = cf(v);
    c.fv(v);
    v = ccv(v)?;
    c.fv(v);
    v = cf(v);
    c.fv(v);
    v = ccv(v)?;
    c.fv(v);
    v = cf(v);
    c.fv(v);

    // Second column of patches.
    col = ccv(col)?;
    v = col;
    c.v(v);
    c.fv(v);
    v = ccf(v);
    c.v(v);
    c.fv(v);
    v = cv(v)?;
    c.fv(v);
    v = ccf(v);
    c.v(v);
    c.fv(v);
    v = cv(v)?;
    c.fv(v);
    v = ccf(v);
    c.v(v);
    c.fv(v);
    col = cf(col);
    v = col;
    c.v(v);
    c.fv(v);
    v = cf(v);
    c.v(v);
    c.fv(v);
    v = ccv(v)?;
    c.fv(v);
    v = cf(v);
    c.v(v);
    c.fv(v);
    v = ccv(v)?;
    c.fv(v);
    v = cf(v);
    c.v(v);
    c.fv(v);

    // Third column of patches.
    col = ccv(col)?;
    v = col;
    c.fv(v);
    v = ccf(v);
    c.fv(v);
    v = cv(v)?;
    c.fv(v);
    v = ccf(v);
    c.fv(v);
    v = cv(v)?;
    c.fv(v);
    v = ccf(v);
    c.fv(v);
    col = cf(col);
    v = col;
    c.v(v);
    c.fv(v);
    v = cf(v);
    c.v(v);
    c.fv(v);
    v = ccv(v)?;
    c.fv(v);
    v = cf(v);
    c.v(v);
    c.fv(v);
    v = ccv(v)?;
    c.fv(v);
    v = cf(v);
    c.v(v);
    c.fv(v);

    debug_assert_eq!(c.vi, 16);
    debug_assert_eq!(c.fvi, 36);
    Some((c.vertices, c.face_vertices))
}

fn all_continuous(pv: &Primvar, pairs: &[(usize, usize)]) -> bool {
    let array_len = pv.array_len;
    macro_rules! check {
        ($buf:expr, $close:expr) => {{
            for &(a, b) in pairs {
                for k in 0..array_len {
                    if !$close($buf[a * array_len + k], $buf[b * array_len + k]) {
                        return false;
                    }
                }
            }
            true
        }};
    }
    match &pv.data {
        PrimvarData::Float(buf) => check!(buf, |x: f32, y: f32| is_close(x, y)),
        PrimvarData::Point(buf) | PrimvarData::Vector(buf) | PrimvarData::Normal(buf)
        | PrimvarData::Color(buf) => check!(buf, |x: glam::Vec3, y: glam::Vec3| {
            is_close(x.x, y.x) && is_close(x.y, y.y) && is_close(x.z, y.z)
        }),
        PrimvarData::HPoint(buf) => check!(buf, |x: glam::Vec4, y: glam::Vec4| {
            is_close(x.x, y.x) && is_close(x.y, y.y) && is_close(x.z, y.z) && is_close(x.w, y.w)
        }),
        PrimvarData::Matrix(buf) => check!(buf, |x: Mat4, y: Mat4| {
            x.to_cols_array()
                .iter()
                .zip(y.to_cols_array().iter())
                .all(|(a, b)| is_close(*a, *b))
        }),
        // Remaining types cannot be interpolated by a patch; treat
        // them as discontinuous so the face is subdivided instead.
        _ => false,
    }
}

impl SubdivTopology {
    /// Determine if the topology surrounding the face is suitable for
    /// conversion to a bicubic B-spline patch.
    pub fn can_use_patch(&self, face: LathId) -> bool {
        let arena = self.laths();

        // A quad with every corner of valence four and no special
        // features.
        if arena.face_valence(face) != 4 {
            return false;
        }

        let mut corners = Vec::new();
        arena.face_vertices(face, &mut corners);
        let mut around = Vec::new();
        for &corner in &corners {
            if arena.vertex_edge_count(corner) != 4 {
                return false;
            }

            // All edges radiating from the corner must be smooth.
            arena.vertex_edges(corner, &mut around);
            for &e in &around {
                if self.edge_sharpness(e) != 0.0 || self.corner_sharpness(e) != 0.0 {
                    return false;
                }
            }

            // No boundary in the vertex ring.
            let mut walk = arena.cv(corner);
            loop {
                match walk {
                    None => return false,
                    Some(l) if l == corner => break,
                    Some(l) => walk = arena.cv(l),
                }
            }
        }

        // The local neighbourhood must be exactly nine quads.
        let mut faces = Vec::new();
        arena.face_faces(face, &mut faces);
        if faces.len() != 9 {
            return false;
        }
        if faces.iter().any(|&f| arena.face_valence(f) != 4) {
            return false;
        }

        // Finally, facevertex data must match at the patch seams; the
        // interpolation of discontinuous facevertex data cannot be
        // represented by the vertex interpolation of a B-spline patch.
        if !self.face_vertex_params().is_empty() {
            let Some((_, face_vertex_grid)) = neighbourhood_indices(arena, face) else {
                return false;
            };

            // Resolve the grid pairs to face-vertex indices; pairs
            // that share an index are trivially continuous.
            let mut pairs = Vec::with_capacity(CONTINUITY_PAIRS.len());
            for &(a, b) in CONTINUITY_PAIRS.iter() {
                let ia = face_vertex_grid[a] as usize;
                let ib = face_vertex_grid[b] as usize;
                if ia != ib {
                    pairs.push((ia, ib));
                }
            }

            let names = self.face_vertex_params().to_vec();
            for name in names {
                let Some(pv) = self.points().slot(0).find(&name) else {
                    return false;
                };
                if !all_continuous(pv, &pairs) {
                    return false;
                }
            }
        }

        true
    }
}

/// The uniform B-spline basis.
const B_SPLINE_BASIS: [[f32; 4]; 4] = [
    [-1.0 / 6.0, 3.0 / 6.0, -3.0 / 6.0, 1.0 / 6.0],
    [3.0 / 6.0, -6.0 / 6.0, 3.0 / 6.0, 0.0],
    [-3.0 / 6.0, 0.0, 3.0 / 6.0, 0.0],
    [1.0 / 6.0, 4.0 / 6.0, 1.0 / 6.0, 0.0],
];

/// The Bezier basis.
const BEZIER_BASIS: [[f32; 4]; 4] = [
    [-1.0, 3.0, -3.0, 1.0],
    [3.0, -6.0, 3.0, 0.0],
    [-3.0, 3.0, 0.0, 0.0],
    [1.0, 0.0, 0.0, 0.0],
];

fn from_rows(rows: &[[f32; 4]; 4]) -> Mat4 {
    Mat4::from_cols_array_2d(rows).transpose()
}

/// A 4x4 bicubic control cage extracted from a regular subdivision
/// neighbourhood, together with the primvars re-indexed onto it.
#[derive(Debug, Clone)]
pub struct BicubicPatch {
    /// Per-patch primitive variables: `"P"` and every facevertex
    /// variable as 16 vertex-class control values, varying and
    /// facevarying variables as 4 corner values, uniform and constant
    /// as single values.
    pub primvars: PrimvarSet,
    /// Hull vertex indices of the 4x4 control cage, in grid order.
    pub vertex_indices: [u32; 16],
    /// Index of the originating face in the top-level hull.
    pub face_index: usize,
}

impl BicubicPatch {
    /// Re-express all 16-point vertex-class channels in the Bezier
    /// basis.  The cage is extracted as B-spline control points;
    /// downstream patch dicing works on Bezier hulls.
    pub fn convert_to_bezier_basis(&mut self) {
        let conversion = from_rows(&BEZIER_BASIS).inverse() * from_rows(&B_SPLINE_BASIS);
        let conversion_t = conversion.transpose();

        for pv in self.primvars.iter_mut() {
            if pv.class != PrimvarClass::Vertex || pv.count() != 16 {
                continue;
            }
            let array_len = pv.array_len;
            // One scalar channel at a time: G' = C * G * C^T.
            let convert_channel = |read: &dyn Fn(usize) -> f32, write: &mut dyn FnMut(usize, f32)| {
                let mut grid = [[0.0f32; 4]; 4];
                for (r, row) in grid.iter_mut().enumerate() {
                    for (col, cell) in row.iter_mut().enumerate() {
                        *cell = read(r * 4 + col);
                    }
                }
                let converted = conversion * from_rows(&grid) * conversion_t;
                for r in 0..4 {
                    for col in 0..4 {
                        write(r * 4 + col, converted.row(r)[col]);
                    }
                }
            };
            for k in 0..array_len {
                match &mut pv.data {
                    PrimvarData::Float(buf) => {
                        let snapshot = buf.clone();
                        convert_channel(&|i| snapshot[i * array_len + k], &mut |i, v| {
                            buf[i * array_len + k] = v
                        });
                    }
                    PrimvarData::Point(buf)
                    | PrimvarData::Vector(buf)
                    | PrimvarData::Normal(buf)
                    | PrimvarData::Color(buf) => {
                        for axis in 0..3 {
                            let snapshot = buf.clone();
                            convert_channel(&|i| snapshot[i * array_len + k][axis], &mut |i, v| {
                                buf[i * array_len + k][axis] = v
                            });
                        }
                    }
                    PrimvarData::HPoint(buf) => {
                        for axis in 0..4 {
                            let snapshot = buf.clone();
                            convert_channel(&|i| snapshot[i * array_len + k][axis], &mut |i, v| {
                                buf[i * array_len + k][axis] = v
                            });
                        }
                    }
                    // Integers, strings and matrices are not sensibly
                    // basis-converted.
                    _ => {}
                }
            }
        }
    }
}

/// Copy the entries of `source` selected by `indices` into a fresh
/// primvar of class `class`.
pub(crate) fn gather(source: &Primvar, indices: &[usize], class: PrimvarClass) -> Primvar {
    let mut out = Primvar::new(source.name.clone(), class, source.ty(), source.array_len);
    out.set_count(indices.len());
    for (to, &from) in indices.iter().enumerate() {
        for k in 0..source.array_len {
            out.data.copy_element(
                to * source.array_len + k,
                &source.data,
                from * source.array_len + k,
            );
        }
    }
    out
}

/// Build the bicubic patch for a face whose neighbourhood passed
/// [`SubdivTopology::can_use_patch`].
///
/// Vertex-class data is gathered over the 4x4 vertex grid; facevertex
/// data is continuous here, so it converts to vertex class over the
/// corner entries of the 6x6 face-vertex grid.  Returns `None` when
/// the neighbourhood unexpectedly fails to resolve.
pub(crate) fn extract_patch(
    topology: &SubdivTopology,
    face: LathId,
    face_index: usize,
) -> Option<BicubicPatch> {
    let (vertex_grid, face_vertex_grid) = neighbourhood_indices(topology.laths(), face)?;

    // Corner entries of the face-vertex grid, in vertex-grid order.
    const FACE_VERTEX_CORNERS: [usize; 16] =
        [0, 2, 3, 5, 12, 14, 15, 17, 18, 20, 21, 23, 30, 32, 33, 35];

    let vertex_indices: Vec<usize> = vertex_grid.iter().map(|&v| v as usize).collect();
    let varying_indices = [
        vertex_grid[5] as usize,
        vertex_grid[6] as usize,
        vertex_grid[9] as usize,
        vertex_grid[10] as usize,
    ];
    let face_varying_indices = [
        face_vertex_grid[14] as usize,
        face_vertex_grid[15] as usize,
        face_vertex_grid[20] as usize,
        face_vertex_grid[21] as usize,
    ];
    let face_vertex_indices: Vec<usize> = FACE_VERTEX_CORNERS
        .iter()
        .map(|&i| face_vertex_grid[i] as usize)
        .collect();

    let mut primvars = PrimvarSet::new();
    for pv in topology.points().slot(0).iter() {
        let gathered = match pv.class {
            PrimvarClass::Varying => gather(pv, &varying_indices, PrimvarClass::Varying),
            PrimvarClass::Vertex => gather(pv, &vertex_indices, PrimvarClass::Vertex),
            PrimvarClass::FaceVarying => {
                gather(pv, &face_varying_indices, PrimvarClass::FaceVarying)
            }
            // Continuous facevertex data becomes plain vertex data on
            // the patch.
            PrimvarClass::FaceVertex => gather(pv, &face_vertex_indices, PrimvarClass::Vertex),
            PrimvarClass::Uniform => gather(pv, &[face_index], PrimvarClass::Uniform),
            PrimvarClass::Constant => gather(pv, &[0], PrimvarClass::Constant),
        };
        primvars.push(gathered);
    }

    // Parametric defaults for shaders that ask for them.
    for (name, values) in [
        ("u", [0.0f32, 1.0, 0.0, 1.0]),
        ("v", [0.0, 0.0, 1.0, 1.0]),
        ("s", [0.0, 1.0, 0.0, 1.0]),
        ("t", [0.0, 0.0, 1.0, 1.0]),
    ] {
        if primvars.find(name).is_none() {
            primvars.push(Primvar {
                name: name.to_string(),
                class: PrimvarClass::Varying,
                array_len: 1,
                data: PrimvarData::Float(values.to_vec()),
            });
        }
    }

    let mut patch = BicubicPatch {
        primvars,
        vertex_indices: vertex_grid,
        face_index,
    };
    patch.convert_to_bezier_basis();
    Some(patch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subdiv::primvar::PrimvarType;

    #[test]
    fn basis_conversion_is_affine() {
        // Rows of the conversion matrix must sum to one, so constant
        // cages stay constant.
        let conversion = from_rows(&BEZIER_BASIS).inverse() * from_rows(&B_SPLINE_BASIS);
        for r in 0..4 {
            let sum: f32 = (0..4).map(|c| conversion.row(r)[c]).sum();
            assert!((sum - 1.0).abs() < 1e-5, "row {} sums to {}", r, sum);
        }
    }

    #[test]
    fn gather_reorders() {
        let mut pv = Primvar::new("w", PrimvarClass::Vertex, PrimvarType::Float, 1);
        pv.data = PrimvarData::Float(vec![0.0, 10.0, 20.0, 30.0]);
        let out = gather(&pv, &[3, 1], PrimvarClass::Varying);
        match out.data {
            PrimvarData::Float(v) => assert_eq!(v, vec![30.0, 10.0]),
            _ => unreachable!(),
        }
    }
}
