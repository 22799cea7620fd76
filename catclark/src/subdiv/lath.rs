//! The lath: a corner-anchored half-edge record.
//!
//! A *lath* holds topological information about a mesh neighbourhood.
//! There is exactly one lath per corner of each face, and linked
//! structures of laths let adjoining faces, vertices and edges be
//! reached in constant time.  The variant used here is the "corner
//! lath" of Joy, Legakis and MacCracken ("Data Structures for
//! Multiresolution Representation of Unstructured Meshes"), extended
//! with pointers up and down the subdivision hierarchy.
//!
//! The two primitive links are *clockwise around the face* ([`cf`]) and
//! *clockwise around the vertex* ([`cv`]):
//!
//! ```text
//!        |          |
//!   -----+----------+-----
//!        | cf       |
//!        | A----->  |
//!        | ^  face  |
//!        | | cv     |
//!   -----+----------+-----
//!        |          |
//! ```
//!
//! Each lath is associated with a unique vertex, a unique face, and the
//! edge its `cv` link crosses.  A non-boundary edge therefore carries
//! two laths; given one, the other is its *edge companion* ([`ec`]).
//! A missing `cv` link marks a boundary.
//!
//! Laths live in an arena owned by the topology and are addressed by
//! [`LathId`]; they are created by face construction and refinement and
//! never removed.
//!
//! [`cf`]: LathArena::cf
//! [`cv`]: LathArena::cv
//! [`ec`]: LathArena::ec

/// Handle of a lath in its owning [`LathArena`].
///
/// Stable for the lifetime of the topology; laths are never removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
#[derive(bytemuck::Pod, bytemuck::Zeroable)]
pub struct LathId(pub u32);

impl LathId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<LathId> for usize {
    fn from(id: LathId) -> Self {
        id.index()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Lath {
    /// Index into the vertex/varying primvar pools.
    pub vertex: u32,
    /// Index into the facevarying/facevertex primvar pools.
    pub face_vertex: u32,
    /// Next lath clockwise around the face.  Initially a self-loop;
    /// face construction closes the real ring.
    pub cw_facet: LathId,
    /// Next lath clockwise around the vertex; `None` marks a boundary.
    pub cw_vertex: Option<LathId>,
    /// Corner lath of the facet this one was refined from.
    pub parent_facet: Option<LathId>,
    /// Lath representing this vertex at the next refinement level.
    pub child_vertex: Option<LathId>,
    /// Lath representing the midpoint of this edge at the next level.
    pub mid_vertex: Option<LathId>,
    /// Lath representing the centroid of this face at the next level.
    pub face_vertex_lath: Option<LathId>,
}

/// Arena of laths with the neighbourhood operators defined on it.
///
/// All navigation is relative to an id; the arena itself carries no
/// notion of "current" lath.
#[derive(Debug, Default)]
pub struct LathArena {
    laths: Vec<Lath>,
}

/// ### Construction and raw access
impl LathArena {
    /// Allocate a lath referencing the given vertex and face-vertex
    /// indices.  The face ring starts out as a self-loop.
    pub(crate) fn alloc(&mut self, vertex: u32, face_vertex: u32) -> LathId {
        let id = LathId(self.laths.len() as u32);
        self.laths.push(Lath {
            vertex,
            face_vertex,
            cw_facet: id,
            cw_vertex: None,
            parent_facet: None,
            child_vertex: None,
            mid_vertex: None,
            face_vertex_lath: None,
        });
        id
    }

    /// Number of laths allocated so far.
    pub fn len(&self) -> usize {
        self.laths.len()
    }

    /// `true` if no laths have been allocated.
    pub fn is_empty(&self) -> bool {
        self.laths.is_empty()
    }

    /// All lath ids, in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = LathId> + '_ {
        (0..self.laths.len() as u32).map(LathId)
    }

    #[inline]
    pub(crate) fn get(&self, id: LathId) -> &Lath {
        &self.laths[id.index()]
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: LathId) -> &mut Lath {
        &mut self.laths[id.index()]
    }
}

/// ### Index accessors
impl LathArena {
    /// Index of the vertex this lath references.
    #[inline]
    pub fn vertex_index(&self, l: LathId) -> u32 {
        self.get(l).vertex
    }

    /// Index of the face-vertex this lath references.
    #[inline]
    pub fn face_vertex_index(&self, l: LathId) -> u32 {
        self.get(l).face_vertex
    }

    /// Corner lath of the facet this lath was refined from, if any.
    #[inline]
    pub fn parent_facet(&self, l: LathId) -> Option<LathId> {
        self.get(l).parent_facet
    }

    /// Lath representing this vertex at the next refinement level.
    #[inline]
    pub fn child_vertex(&self, l: LathId) -> Option<LathId> {
        self.get(l).child_vertex
    }

    /// Lath representing the midpoint of this edge at the next level.
    #[inline]
    pub fn mid_vertex(&self, l: LathId) -> Option<LathId> {
        self.get(l).mid_vertex
    }

    /// Lath representing the centroid of this face at the next level.
    /// Also the "already refined" marker for the face.
    #[inline]
    pub fn face_vertex_lath(&self, l: LathId) -> Option<LathId> {
        self.get(l).face_vertex_lath
    }
}

/// ### One-step neighbourhood operators
impl LathArena {
    /// Next lath clockwise around the face.  Inherent in the data
    /// structure.
    #[inline]
    pub fn cf(&self, l: LathId) -> LathId {
        self.get(l).cw_facet
    }

    /// Next lath clockwise around the vertex, or `None` on a boundary.
    /// Inherent in the data structure.
    #[inline]
    pub fn cv(&self, l: LathId) -> Option<LathId> {
        self.get(l).cw_vertex
    }

    /// The edge companion: the lath on the same edge pointing at the
    /// opposite vertex.  `None` if the edge is a boundary.
    #[inline]
    pub fn ec(&self, l: LathId) -> Option<LathId> {
        self.cv(l).map(|c| self.cf(c))
    }

    /// Next lath counter-clockwise around the vertex, or `None` on a
    /// boundary.  Constant time in all cases.
    #[inline]
    pub fn ccv(&self, l: LathId) -> Option<LathId> {
        self.ec(self.cf(l))
    }

    /// Next lath counter-clockwise around the face.  Constant time in
    /// the interior; linear in the face valence when the associated
    /// edge is a boundary edge.
    pub fn ccf(&self, l: LathId) -> LathId {
        if let Some(e) = self.ec(l) {
            if let Some(c) = self.cv(e) {
                return c;
            }
        }
        self.ccf_boundary(l)
    }

    /// The boundary case of [`ccf`](Self::ccf): search backwards along
    /// the face ring.
    fn ccf_boundary(&self, l: LathId) -> LathId {
        let mut prev = self.cf(l);
        loop {
            let next = self.cf(prev);
            if next == l {
                break;
            }
            prev = next;
        }
        prev
    }
}

/// ### Bulk neighbourhood queries
///
/// Each query appends laths to a caller-supplied scratch buffer (which
/// is cleared first) so the hot refinement paths can reuse storage.
impl LathArena {
    /// Laths for the edges (equivalently, vertices) making up the face,
    /// starting at `l` and proceeding clockwise.
    pub fn face_edges(&self, l: LathId, out: &mut Vec<LathId>) {
        out.clear();
        out.push(l);
        let mut next = self.cf(l);
        while next != l {
            out.push(next);
            next = self.cf(next);
        }
    }

    /// Laths for the vertices making up the face.  Identical to
    /// [`face_edges`](Self::face_edges); each lath names one corner.
    #[inline]
    pub fn face_vertices(&self, l: LathId, out: &mut Vec<LathId>) {
        self.face_edges(l, out);
    }

    /// Laths for the two faces bounding the edge; one entry only when
    /// the edge is a boundary.
    pub fn edge_faces(&self, l: LathId, out: &mut Vec<LathId>) {
        out.clear();
        out.push(l);
        if let Some(e) = self.ec(l) {
            out.push(e);
        }
    }

    /// Laths for the two endpoints of the edge.  The far endpoint is
    /// reached through the face ring, which exists even on a boundary
    /// where the edge companion does not.
    pub fn edge_vertices(&self, l: LathId, out: &mut Vec<LathId>) {
        out.clear();
        out.push(l);
        out.push(self.ccf(l));
    }

    /// Laths for the edges emanating from the vertex.
    ///
    /// The walk runs clockwise from `l`; if it hits a boundary it
    /// restarts from `l` running counter-clockwise, and finally appends
    /// the face companion of the far boundary edge.  That last entry
    /// references the *opposite* endpoint of its edge, not this vertex.
    pub fn vertex_edges(&self, l: LathId, out: &mut Vec<LathId>) {
        out.clear();
        out.push(l);
        let mut next = self.cv(l);
        while let Some(n) = next {
            if n == l {
                return;
            }
            out.push(n);
            next = self.cv(n);
        }
        // Hit a boundary; sweep the other way round.
        let mut last = l;
        let mut next = self.ccv(l);
        while let Some(n) = next {
            out.push(n);
            last = n;
            next = self.ccv(n);
        }
        out.push(self.cf(last));
    }

    /// Laths for the vertices at the far end of each edge emanating
    /// from the vertex.
    pub fn vertex_vertices(&self, l: LathId, out: &mut Vec<LathId>) {
        self.vertex_edges(l, out);
        // Laths that still reference this vertex are stepped across
        // their edge; the boundary terminator from `vertex_edges`
        // already names the opposite endpoint.
        let vertex = self.vertex_index(l);
        for lath in out.iter_mut() {
            if self.vertex_index(*lath) == vertex {
                *lath = self.ccf(*lath);
            }
        }
    }

    /// Laths for the faces sharing the vertex.
    pub fn vertex_faces(&self, l: LathId, out: &mut Vec<LathId>) {
        out.clear();
        out.push(l);
        let mut next = self.cv(l);
        while let Some(n) = next {
            if n == l {
                return;
            }
            out.push(n);
            next = self.cv(n);
        }
        let mut next = self.ccv(l);
        while let Some(n) = next {
            out.push(n);
            next = self.ccv(n);
        }
    }

    /// Laths for the edges sharing a vertex with this edge: the union
    /// of the [`vertex_edges`](Self::vertex_edges) of both endpoints,
    /// with this edge's own two laths not repeated.
    pub fn edge_edges(&self, l: LathId, out: &mut Vec<LathId>) {
        self.vertex_edges(l, out);
        let mut far = Vec::new();
        self.vertex_edges(self.ccf(l), &mut far);
        let companion = self.ec(l);
        for cand in far {
            if Some(cand) != companion && cand != l {
                out.push(cand);
            }
        }
    }

    /// Laths for the faces sharing a vertex or an edge with this face.
    ///
    /// Candidates are deduplicated by walking each one's face ring
    /// against the faces already accepted, so every face appears once
    /// regardless of which corner lath discovered it.
    pub fn face_faces(&self, l: LathId, out: &mut Vec<LathId>) {
        let mut corners = Vec::new();
        self.face_edges(l, &mut corners);

        out.clear();
        let mut around = Vec::new();
        for corner in corners {
            self.vertex_edges(corner, &mut around);
            'candidate: for &cand in &around {
                for &accepted in out.iter() {
                    let mut visit = accepted;
                    loop {
                        if visit == cand {
                            continue 'candidate;
                        }
                        visit = self.cf(visit);
                        if visit == accepted {
                            break;
                        }
                    }
                }
                out.push(cand);
            }
        }
    }
}

/// ### Counting queries
impl LathArena {
    /// Number of corners of the face.
    pub fn face_valence(&self, l: LathId) -> usize {
        let mut count = 1;
        let mut next = self.cf(l);
        while next != l {
            count += 1;
            next = self.cf(next);
        }
        count
    }

    /// Number of entries [`vertex_edges`](Self::vertex_edges) would
    /// produce, including the boundary terminator.
    pub fn vertex_edge_count(&self, l: LathId) -> usize {
        let mut count = 1;
        let mut next = self.cv(l);
        while let Some(n) = next {
            if n == l {
                return count;
            }
            count += 1;
            next = self.cv(n);
        }
        let mut next = self.ccv(l);
        while let Some(n) = next {
            count += 1;
            next = self.ccv(n);
        }
        count + 1
    }

    /// Number of faces sharing the vertex.
    pub fn vertex_face_count(&self, l: LathId) -> usize {
        let mut count = 1;
        let mut next = self.cv(l);
        while let Some(n) = next {
            if n == l {
                return count;
            }
            count += 1;
            next = self.cv(n);
        }
        let mut next = self.ccv(l);
        while let Some(n) = next {
            count += 1;
            next = self.ccv(n);
        }
        count
    }
}

/// ### Boundary predicates
impl LathArena {
    /// `true` iff the edge has no companion.
    #[inline]
    pub fn is_boundary_edge(&self, l: LathId) -> bool {
        self.ec(l).is_none()
    }

    /// `true` iff the counter-clockwise walk around the vertex
    /// terminates instead of cycling back to `l`.
    pub fn is_boundary_vertex(&self, l: LathId) -> bool {
        let mut next = self.ccv(l);
        while let Some(n) = next {
            if n == l {
                return false;
            }
            next = self.ccv(n);
        }
        true
    }

    /// `true` iff any vertex of the face is a boundary vertex.
    pub fn is_boundary_facet(&self, l: LathId) -> bool {
        let mut corners = Vec::new();
        self.face_vertices(l, &mut corners);
        corners.iter().any(|&c| self.is_boundary_vertex(c))
    }

    /// `true` iff the vertex has exactly two edges and one face.
    #[inline]
    pub fn is_corner_vertex(&self, l: LathId) -> bool {
        self.cv(l).is_none() && self.cv(self.cf(l)).is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two quads sharing an edge:
    ///
    /// ```text
    /// 3 --- 2 --- 5
    /// |  A  |  B  |
    /// 0 --- 1 --- 4
    /// ```
    fn two_quads() -> (LathArena, Vec<LathId>, Vec<LathId>) {
        let mut arena = LathArena::default();
        let mut buckets: Vec<Vec<LathId>> = vec![Vec::new(); 6];
        let mut facets = Vec::new();
        for face in [[0u32, 1, 2, 3], [1, 4, 5, 2]] {
            let mut first = None;
            let mut last = None;
            for (i, &v) in face.iter().enumerate() {
                let l = arena.alloc(v, v);
                if let Some(prev) = last {
                    arena.get_mut(l).cw_facet = prev;
                }
                buckets[v as usize].push(l);
                last = Some(l);
                if i == 0 {
                    first = Some(l);
                }
            }
            let (first, last) = (first.unwrap(), last.unwrap());
            arena.get_mut(first).cw_facet = last;
            facets.push(first);
        }
        // Minimal `cv` linkage for the shared edge and corners, as
        // finalise would produce it.
        for bucket in &buckets {
            for i in 0..bucket.len() {
                let a = bucket[i];
                let target = arena.vertex_index(arena.ccf(a));
                for j in 0..bucket.len() {
                    if i == j {
                        continue;
                    }
                    let b = bucket[j];
                    if arena.vertex_index(arena.cf(b)) == target {
                        arena.get_mut(a).cw_vertex = Some(b);
                    }
                }
            }
        }
        (arena, facets, buckets.into_iter().map(|b| b[0]).collect())
    }

    #[test]
    fn face_ring_closes() {
        let (arena, facets, _) = two_quads();
        for &f in &facets {
            assert_eq!(arena.face_valence(f), 4);
            let mut l = f;
            for _ in 0..4 {
                l = arena.cf(l);
            }
            assert_eq!(l, f);
            assert_ne!(arena.cf(f), f);
        }
    }

    #[test]
    fn companion_symmetry() {
        let (arena, _, _) = two_quads();
        for l in arena.ids() {
            if let Some(e) = arena.ec(l) {
                assert_eq!(arena.ec(e), Some(l));
            }
        }
    }

    #[test]
    fn ccf_inverts_cf() {
        let (arena, facets, _) = two_quads();
        for &f in &facets {
            let mut corners = Vec::new();
            arena.face_edges(f, &mut corners);
            for &c in &corners {
                assert_eq!(arena.ccf(arena.cf(c)), c);
            }
        }
    }

    #[test]
    fn boundary_predicates() {
        let (arena, facets, verts) = two_quads();
        // Every vertex of the open two-quad strip is on the boundary.
        for &v in &verts {
            assert!(arena.is_boundary_vertex(v));
        }
        assert!(arena.is_boundary_facet(facets[0]));
        // Corner vertices have one face; the shared-edge vertices two.
        let counts: Vec<_> = verts.iter().map(|&v| arena.vertex_face_count(v)).collect();
        assert_eq!(counts.iter().filter(|&&c| c == 2).count(), 2);
        assert_eq!(counts.iter().filter(|&&c| c == 1).count(), 4);
    }

    #[test]
    fn vertex_edges_crosses_boundary() {
        let (arena, _, verts) = two_quads();
        // Vertex 1 is shared: two faces, three edges; the query yields
        // one lath per edge with the far-boundary terminator included.
        let mut out = Vec::new();
        arena.vertex_edges(verts[1], &mut out);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn face_faces_deduplicates() {
        let (arena, facets, _) = two_quads();
        let mut out = Vec::new();
        arena.face_faces(facets[0], &mut out);
        // Face A sees itself and face B exactly once each.
        assert_eq!(out.len(), 2);
    }
}
