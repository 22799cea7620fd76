//! Limit-surface evaluation.
//!
//! Catmull-Clark subdivision pushes every control vertex towards a
//! limiting position on the limit surface.  The masks used here are
//! the classic ones from the literature (Halstead, DeRose and Kass,
//! "Efficient, Fair Interpolation using Catmull-Clark Surfaces",
//! SIGGRAPH 1993), extended for the creasing, sharp corner and
//! boundary interpolation features of the generalised scheme:
//!
//! * Sharp corners are stationary under subdivision; the limit point
//!   is the vertex itself.
//! * For a boundary vertex the subdivision matrix of the neighbourhood
//!   `[v, e1, e2]` is `1/8 [[6,1,1],[4,4,0],[4,0,4]]`; the left
//!   eigenvector for eigenvalue 1, normalised to sum to one, gives the
//!   limit mask `1/6 [4, 1, 1]`.
//! * Interior vertices use `(n^2 v + sum_i (4 e_i + f_i)) / (n (n+5))`
//!   which is only valid on a quadrilateral 1-ring; non-quad incident
//!   faces substitute a fake `f_i` preserving the centroid
//!   contribution (Thall, TR02-001, UNC-Chapel Hill, 2003).
//!
//! Creases are ignored by the limit masks, since only the masks for
//! the standard rules are given in the literature; the refinement
//! rules still honour them.

use glam::{Vec3, Vec4};

use super::primvar::{PrimvarData, PrimvarSet};
use super::topology::SubdivTopology;
use crate::error::{Error, Result};
use crate::subdiv::lath::LathId;

/// View over the position primvar, tolerant of both point and hpoint
/// storage.
enum Positions<'a> {
    Point(&'a [Vec3]),
    HPoint(&'a [Vec4]),
}

impl Positions<'_> {
    fn get(&self, index: usize) -> Vec3 {
        match self {
            Positions::Point(p) => p[index],
            Positions::HPoint(p) => {
                let v = p[index];
                if v.w != 0.0 && v.w != 1.0 {
                    v.truncate() / v.w
                } else {
                    v.truncate()
                }
            }
        }
    }
}

fn positions(set: &PrimvarSet) -> Result<Positions<'_>> {
    let pv = set
        .find("P")
        .ok_or_else(|| Error::MissingPrimvar("P".to_string()))?;
    match &pv.data {
        PrimvarData::Point(p) => Ok(Positions::Point(p)),
        PrimvarData::HPoint(p) => Ok(Positions::HPoint(p)),
        _ => Err(Error::MissingPrimvar("P".to_string())),
    }
}

impl SubdivTopology {
    /// Position of the vertex a lath references, at time slot 0.
    pub fn position(&self, lath: LathId) -> Result<Vec3> {
        self.position_at(0, lath)
    }

    /// Position of the vertex a lath references, at the given time
    /// slot.
    pub fn position_at(&self, time_index: usize, lath: LathId) -> Result<Vec3> {
        let p = positions(self.points().slot(time_index))?;
        Ok(p.get(self.arena.vertex_index(lath) as usize))
    }

    /// Compute the position of a vertex on the limit surface.
    ///
    /// Takes `&mut self` because the interior mask needs a
    /// quadrilateral 1-ring, which is only guaranteed once all faces
    /// around the vertex's parent facet have been subdivided; that
    /// refinement is performed here on demand.  Any outstanding
    /// indices into the point buffers must be re-resolved afterwards,
    /// since the buffers may have grown.
    pub fn limit_point(&mut self, vertex: LathId) -> Result<Vec3> {
        let pos = self.position(vertex)?;

        // Sharp corners don't move under subdivision.
        if self.corner_sharpness(vertex) > 0.0 {
            return Ok(pos);
        }

        // All parent faces of the vertex must be subdivided before the
        // 1-ring is read.
        if let Some(parent) = self.arena.parent_facet(vertex) {
            let mut v = parent;
            loop {
                self.subdivide_neighbour_faces(v);
                v = self.arena.cf(v);
                if v == parent {
                    break;
                }
            }
        }
        // Resolve the positions only now; the refinement above may
        // have reallocated the buffers.
        let p = positions(self.points().slot(0))?;
        let arena = &self.arena;

        if arena.is_boundary_vertex(vertex) {
            if arena.is_corner_vertex(vertex) {
                // Two edges, one face: stationary.
                return Ok(pos);
            }

            // Boundary with more than two edges: 1/6 (4 v + e1 + e2)
            // over the two boundary neighbours.
            let mut v = vertex;
            while let Some(next) = arena.cv(v) {
                v = next;
            }
            let mut edge_sum = p.get(arena.vertex_index(arena.ccf(v)) as usize);

            let mut v = vertex;
            while let Some(next) = arena.ccv(v) {
                v = next;
            }
            edge_sum += p.get(arena.vertex_index(arena.cf(v)) as usize);

            Ok(pos * (4.0 / 6.0) + edge_sum * (1.0 / 6.0))
        } else {
            let mut edge_sum = Vec3::ZERO;
            let mut face_sum = Vec3::ZERO;
            let mut valence = 0usize;

            let mut face_vert = vertex;
            loop {
                let e = arena.cf(face_vert);
                edge_sum += p.get(arena.vertex_index(e) as usize);

                let mut f = arena.cf(e);
                if arena.cf(arena.cf(f)) == face_vert {
                    // Quadrilateral face: a single far vertex.
                    face_sum += p.get(arena.vertex_index(f) as usize);
                } else {
                    // Non-quadrilateral face.  Only the centroid of
                    // the face feeds the neighbourhood after one
                    // subdivision step, so substitute a value for the
                    // far vertex that leaves the centroid unchanged:
                    // (4/m - 1)(v + e + e') + 4/m sum_j g_j.
                    let mut extra_sum = Vec3::ZERO;
                    let mut face_arity = 3usize;
                    let e_next = arena.ccf(face_vert);
                    while f != e_next {
                        extra_sum += p.get(arena.vertex_index(f) as usize);
                        face_arity += 1;
                        f = arena.cf(f);
                    }
                    let m = face_arity as f32;
                    face_sum += (4.0 / m - 1.0)
                        * (pos
                            + p.get(arena.vertex_index(e) as usize)
                            + p.get(arena.vertex_index(e_next) as usize))
                        + (4.0 / m) * extra_sum;
                }

                valence += 1;
                match arena.cv(face_vert) {
                    Some(next) if next != vertex => face_vert = next,
                    Some(_) => break,
                    // The caller guaranteed an interior vertex above.
                    None => break,
                }
            }

            let n = valence as f32;
            Ok((n * n * pos + 4.0 * edge_sum + face_sum) * (1.0 / (n * (n + 5.0))))
        }
    }
}
