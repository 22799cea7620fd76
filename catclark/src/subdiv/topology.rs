//! The subdivision control hull: build, manifold repair, hierarchical
//! refinement.
//!
//! A [`SubdivTopology`] is built facet by facet from a face list,
//! then [`finalise`]d: the laths incident on each vertex are linked
//! into a clockwise fan, boundaries are detected, and non-manifold
//! vertices are split by duplication so that every fan references its
//! own vertex.  After finalisation the hull only ever grows, through
//! [`subdivide_face`] -- one face at a time, on demand, with
//! edge-midpoint and corner-child vertices shared with already-refined
//! neighbours through the hierarchical back-pointers on the laths.
//!
//! [`finalise`]: SubdivTopology::finalise
//! [`subdivide_face`]: SubdivTopology::subdivide_face

use std::collections::{HashMap, HashSet};

use log::{error, warn};

use super::lath::{LathArena, LathId};
use super::primvar::{Element, PointPool, Primvar, PrimvarClass, PrimvarData};
use crate::error::{Error, Result};

/// Container for the topology description of a subdivision mesh.
///
/// Owns the lath arena, the per-vertex lath buckets, the tag state
/// (creases, corners, holes, boundary interpolation) and the keyframed
/// point pool the refinement rules write into.
#[derive(Debug)]
pub struct SubdivTopology {
    pub(crate) arena: LathArena,
    /// One representative lath per face, in creation order.
    facets: Vec<LathId>,
    /// For every vertex index, all laths incident on it.
    vertex_laths: Vec<Vec<LathId>>,
    /// Faces that must not be rendered.
    holes: HashSet<usize>,
    /// Edge sharpness, keyed per lath; companions carry equal values.
    sharp_edges: HashMap<LathId, f32>,
    /// Corner sharpness, stamped on every lath of the tagged vertex.
    sharp_corners: HashMap<LathId, f32>,
    interpolate_boundary: bool,
    /// Names of the facevertex-class primvars, cached for the patch
    /// extraction test.
    face_vertex_params: Vec<String>,
    points: PointPool,
    finalised: bool,
    name: String,
}

/// ### Construction
impl SubdivTopology {
    /// Create a topology over the given point pool.  `name` is used in
    /// diagnostics only.
    pub fn new(points: PointPool, name: impl Into<String>) -> Self {
        let face_vertex_params = points
            .slot(0)
            .iter()
            .filter(|pv| pv.class == PrimvarClass::FaceVertex)
            .map(|pv| pv.name.clone())
            .collect();
        SubdivTopology {
            arena: LathArena::default(),
            facets: Vec::new(),
            vertex_laths: Vec::new(),
            holes: HashSet::new(),
            sharp_edges: HashMap::new(),
            sharp_corners: HashMap::new(),
            interpolate_boundary: false,
            face_vertex_params,
            points,
            finalised: false,
            name: name.into(),
        }
    }

    /// Reserve the per-vertex lath buckets for `vertex_count` vertices.
    /// Must be called before the first [`add_facet`](Self::add_facet).
    pub fn prepare(&mut self, vertex_count: usize) {
        self.vertex_laths.resize(vertex_count, Vec::new());
        self.finalised = false;
    }

    /// Add a facet whose face-vertex indices run sequentially from
    /// `face_vertex_start`.
    ///
    /// Vertex indices are passed counter-clockwise, as stored outside
    /// the topology; the laths are chained clockwise by reversing them
    /// here.
    pub fn add_facet(&mut self, indices: &[u32], face_vertex_start: u32) -> Result<LathId> {
        self.add_facet_impl(indices, |corner| face_vertex_start + corner as u32)
    }

    /// Add a facet with explicit per-corner face-vertex indices.
    pub fn add_facet_with_face_vertices(
        &mut self,
        indices: &[u32],
        face_vertex_indices: &[u32],
    ) -> Result<LathId> {
        debug_assert_eq!(indices.len(), face_vertex_indices.len());
        self.add_facet_impl(indices, |corner| face_vertex_indices[corner])
    }

    fn add_facet_impl(
        &mut self,
        indices: &[u32],
        face_vertex: impl Fn(usize) -> u32,
    ) -> Result<LathId> {
        if indices.len() < 3 {
            warn!(
                "dropping degenerate face with {} vertices in \"{}\"",
                indices.len(),
                self.name
            );
            return Err(Error::DegenerateFace {
                arity: indices.len(),
            });
        }
        for &v in indices {
            if v as usize >= self.vertex_laths.len() {
                return Err(Error::IndexOutOfBounds {
                    index: v as usize,
                    max: self.vertex_laths.len().saturating_sub(1),
                });
            }
        }
        let mut laths = Vec::with_capacity(indices.len());
        for (corner, &v) in indices.iter().enumerate() {
            let l = self.arena.alloc(v, face_vertex(corner));
            self.vertex_laths[v as usize].push(l);
            laths.push(l);
        }
        // The caller passes vertices counter-clockwise; linking each
        // lath's clockwise pointer to its predecessor reverses them.
        for k in 1..laths.len() {
            self.arena.get_mut(laths[k]).cw_facet = laths[k - 1];
        }
        self.arena.get_mut(laths[0]).cw_facet = laths[laths.len() - 1];

        self.facets.push(laths[0]);
        Ok(laths[0])
    }
}

/// ### Inspection
impl SubdivTopology {
    /// A lath on the facet with the given index.
    pub fn facet(&self, index: usize) -> LathId {
        self.facets[index]
    }

    /// A lath referencing the vertex with the given index.
    pub fn vertex(&self, index: usize) -> LathId {
        self.vertex_laths[index][0]
    }

    /// Number of facets, across all refinement levels built so far.
    pub fn facet_count(&self) -> usize {
        self.facets.len()
    }

    /// Number of vertices, across all refinement levels built so far.
    pub fn vertex_count(&self) -> usize {
        self.vertex_laths.len()
    }

    /// Number of laths allocated.
    pub fn lath_count(&self) -> usize {
        self.arena.len()
    }

    /// The lath arena, for neighbourhood navigation.
    pub fn laths(&self) -> &LathArena {
        &self.arena
    }

    /// The point pool.
    pub fn points(&self) -> &PointPool {
        &self.points
    }

    /// The point pool, mutably.
    pub fn points_mut(&mut self) -> &mut PointPool {
        &mut self.points
    }

    /// Identifier used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` once [`finalise`](Self::finalise) has run.
    pub fn is_finalised(&self) -> bool {
        self.finalised
    }

    /// Names of the facevertex-class primvars.
    pub(crate) fn face_vertex_params(&self) -> &[String] {
        &self.face_vertex_params
    }
}

/// ### Tags
impl SubdivTopology {
    /// Set whether boundary faces are rendered with interpolated
    /// boundary rules.
    pub fn set_interpolate_boundary(&mut self, state: bool) {
        self.interpolate_boundary = state;
    }

    /// `true` if the hull interpolates its boundaries.
    pub fn interpolate_boundary(&self) -> bool {
        self.interpolate_boundary
    }

    /// Mark the face with the given index as a hole.
    pub fn set_hole_face(&mut self, face_index: usize) {
        self.holes.insert(face_index);
    }

    /// `true` if the face with the given index is a hole.
    pub fn is_hole_face(&self, face_index: usize) -> bool {
        self.holes.contains(&face_index)
    }

    /// Record edge sharpness on a lath.  The companion lath must be
    /// given the same value by the caller.
    pub fn add_sharp_edge(&mut self, lath: LathId, sharpness: f32) {
        self.sharp_edges.insert(lath, sharpness);
    }

    /// Sharpness of the edge associated with the lath; 0 when smooth.
    pub fn edge_sharpness(&self, lath: LathId) -> f32 {
        self.sharp_edges.get(&lath).copied().unwrap_or(0.0)
    }

    /// Record corner sharpness on a vertex; the value is stamped on
    /// every lath currently emanating from it.
    pub fn add_sharp_corner(&mut self, lath: LathId, sharpness: f32) {
        let mut around = Vec::new();
        self.arena.vertex_edges(lath, &mut around);
        for l in around {
            self.sharp_corners.insert(l, sharpness);
        }
    }

    /// Corner sharpness at the lath's vertex; 0 when smooth.
    pub fn corner_sharpness(&self, lath: LathId) -> f32 {
        self.sharp_corners.get(&lath).copied().unwrap_or(0.0)
    }
}

/// ### Finalisation
impl SubdivTopology {
    /// Complete the lath linkage after all facets have been added.
    ///
    /// Links each vertex's laths into a clockwise fan, walking
    /// backwards from the start when a boundary stalls the forward
    /// walk.  A vertex whose laths do not form a single fan is
    /// non-manifold; it is repaired by duplicating the vertex and
    /// reassigning the unreached laths to the duplicate, whose bucket
    /// is then processed by the same loop.
    pub fn finalise(&mut self) -> Result<()> {
        let mut i = 0;
        while i < self.vertex_laths.len() {
            let laths = self.vertex_laths[i].clone();
            let count = laths.len();
            if count <= 1 {
                i += 1;
                continue;
            }

            let mut visited = vec![false; count];
            let mut visited_count = 0usize;

            let mut current = laths[0];
            let mut start = laths[0];
            let mut start_slot = 0usize;

            // Forward: link each lath to the unvisited one whose face
            // ring continues it clockwise.
            loop {
                let ccw_vertex = self.arena.vertex_index(self.arena.ccf(current));
                let mut matched = false;
                for (slot, &cand) in laths.iter().enumerate() {
                    if !visited[slot] && self.arena.vertex_index(self.arena.cf(cand)) == ccw_vertex
                    {
                        self.arena.get_mut(current).cw_vertex = Some(cand);
                        current = cand;
                        visited[slot] = true;
                        visited_count += 1;
                        matched = true;
                        break;
                    }
                }
                if !matched {
                    break;
                }
            }

            // The walk stalled on a boundary: restart at the original
            // lath and link counter-clockwise.
            if self.arena.cv(current).is_none() {
                loop {
                    let cw_vertex = self.arena.vertex_index(self.arena.cf(start));
                    let mut matched = false;
                    for (slot, &cand) in laths.iter().enumerate() {
                        if !visited[slot]
                            && self.arena.vertex_index(self.arena.ccf(cand)) == cw_vertex
                        {
                            self.arena.get_mut(cand).cw_vertex = Some(start);
                            visited[start_slot] = true;
                            visited_count += 1;
                            start = cand;
                            start_slot = slot;
                            matched = true;
                            break;
                        }
                    }
                    if !matched {
                        break;
                    }
                }
            }
            visited[start_slot] = true;
            visited_count += 1;

            if visited_count < count {
                // Non-manifold: split the fan.
                error!(
                    "found a non-manifold vertex in the control hull of object \"{}\" at vertex {}",
                    self.name,
                    self.arena.vertex_index(current)
                );
                let (new_vertex, new_face_vertex) = self.duplicate_vertex(current);
                let mut keep = Vec::with_capacity(visited_count);
                let mut moved = Vec::with_capacity(count - visited_count);
                for (slot, &l) in laths.iter().enumerate() {
                    if visited[slot] {
                        keep.push(l);
                    } else {
                        self.arena.get_mut(l).vertex = new_vertex;
                        self.arena.get_mut(l).face_vertex = new_face_vertex;
                        moved.push(l);
                    }
                }
                self.vertex_laths[i] = keep;
                self.vertex_laths[new_vertex as usize] = moved;
            }
            i += 1;
        }

        self.finalised = true;
        Ok(())
    }
}

/// ### Hierarchical refinement
impl SubdivTopology {
    /// Subdivide one face, producing one quadrilateral sub-face per
    /// corner.  `sub_faces` receives a lath per sub-face, rotated so
    /// each retains the parent's orientation.
    ///
    /// Idempotent: an already refined face only reads back its child
    /// structure.  Refining a face of level > 0 first ensures all
    /// faces around the parent's vertices are refined, so shared edge
    /// midpoints and corner children exist exactly once.
    pub fn subdivide_face(&mut self, face: LathId, sub_faces: &mut Vec<LathId>) {
        // Already subdivided: read the children back through the face
        // vertex.  The sub-faces come out with their centre corner
        // first, so rotate each by its index to restore the parent
        // orientation.
        if let Some(face_vertex) = self.arena.face_vertex_lath(face) {
            sub_faces.clear();
            let mut around = Vec::new();
            self.arena.vertex_faces(face_vertex, &mut around);
            for (i, &centre) in around.iter().enumerate() {
                let mut f = self.arena.ccf(self.arena.ccf(centre));
                for _ in 0..i {
                    f = self.arena.ccf(f);
                }
                sub_faces.push(f);
            }
            return;
        }

        // Make sure the neighbour facets at the previous level have
        // been subdivided, so their midpoints and children exist for
        // reuse.  Stepping over the parent's vertices reaches every
        // neighbour, at the cost of visiting some twice; that is
        // cheaper here than a deduplicated face query.
        if let Some(parent) = self.arena.parent_facet(face) {
            let mut parent_vertices = Vec::new();
            self.arena.face_vertices(parent, &mut parent_vertices);
            for &v in &parent_vertices {
                self.subdivide_neighbour_faces(v);
            }
        }

        let mut corners = Vec::new();
        self.arena.face_vertices(face, &mut corners);
        let n = corners.len();

        // Indices of the new points: [0,n) corner children, [n,2n)
        // edge midpoints, [2n] the face centroid.
        let mut vertices = vec![0u32; 2 * n + 1];
        let mut face_vertices = vec![0u32; 2 * n + 1];
        sub_faces.clear();

        let (v, fv) = self.add_face_vertex(face);
        vertices[2 * n] = v;
        face_vertices[2 * n] = fv;

        for i in 0..n {
            // Reuse the companion's midpoint vertex if the neighbour
            // across this edge is already subdivided.
            let reuse = self
                .arena
                .ec(corners[i])
                .and_then(|e| self.arena.mid_vertex(e))
                .map(|m| self.arena.vertex_index(m));
            let (v, fv) = self.add_edge_vertex(corners[i], reuse);
            vertices[i + n] = v;
            face_vertices[i + n] = fv;
        }

        for i in 0..n {
            let reuse = self
                .arena
                .child_vertex(corners[i])
                .map(|c| self.arena.vertex_index(c));
            let (v, fv) = self.add_vertex(corners[i], reuse);
            vertices[i] = v;
            face_vertices[i] = fv;
        }

        // One quadrilateral per corner: A the corner child, B the next
        // edge midpoint, C the centroid, D this edge's midpoint.
        struct SubFace {
            a: LathId,
            b: LathId,
            c: LathId,
            d: LathId,
        }
        let mut new_faces = Vec::with_capacity(n);

        for i in 0..n {
            let a = self.arena.alloc(vertices[i], face_vertices[i]);
            let b = self.arena.alloc(
                vertices[(i + 1) % n + n],
                face_vertices[(i + 1) % n + n],
            );
            let c = self.arena.alloc(vertices[2 * n], face_vertices[2 * n]);
            let d = self.arena.alloc(vertices[i + n], face_vertices[i + n]);
            self.arena.get_mut(a).cw_facet = b;
            self.arena.get_mut(b).cw_facet = c;
            self.arena.get_mut(c).cw_facet = d;
            self.arena.get_mut(d).cw_facet = a;
            for l in [a, b, c, d] {
                self.arena.get_mut(l).parent_facet = Some(corners[i]);
                let v = self.arena.vertex_index(l) as usize;
                self.vertex_laths[v].push(l);
            }

            // Every lath of the parent vertex fan learns its child, so
            // later subdivisions of neighbours find it.
            let mut next = corners[i];
            loop {
                self.arena.get_mut(next).child_vertex = Some(a);
                match self.arena.cv(next) {
                    Some(l) if l != corners[i] => next = l,
                    Some(_) => break,
                    None => {
                        let mut back = self.arena.ccv(corners[i]);
                        while let Some(l) = back {
                            self.arena.get_mut(l).child_vertex = Some(a);
                            back = self.arena.ccv(l);
                        }
                        break;
                    }
                }
            }

            // And this edge learns its midpoint, for the neighbour
            // across it.
            self.arena.get_mut(corners[i]).mid_vertex = Some(d);

            // Sharpness decays quadratically per level; corners copy.
            let sharpness = self.edge_sharpness(corners[i]);
            if sharpness > 0.0 {
                self.add_sharp_edge(a, sharpness * sharpness);
            }
            let sharpness = self.edge_sharpness(corners[(i + 1) % n]);
            if sharpness > 0.0 {
                self.add_sharp_edge(b, sharpness * sharpness);
            }
            let corner = self.corner_sharpness(corners[i]);
            if corner > 0.0 {
                self.add_sharp_corner(a, corner);
            }

            // Rotate the representative lath so sub-face i keeps the
            // parent's orientation.
            let mut f = a;
            for _ in 0..i {
                f = self.arena.ccf(f);
            }
            sub_faces.push(f);
            self.facets.push(f);

            new_faces.push(SubFace { a, b, c, d });
        }

        // The clockwise face rings are complete; now connect the
        // vertex fans that are determined within this face.
        for i in 0..n {
            self.arena.get_mut(corners[i]).face_vertex_lath = Some(new_faces[i].c);
            let next = (i + 1) % n;
            self.arena.get_mut(new_faces[next].d).cw_vertex = Some(new_faces[i].b);
            self.arena.get_mut(new_faces[i].c).cw_vertex = Some(new_faces[next].c);

            // Corner children connect to laths created by previously
            // subdivided neighbours.
            let a = new_faces[i].a;
            let a_vertex = self.arena.vertex_index(a);
            let d_vertex = self.arena.vertex_index(new_faces[i].d);
            let b_vertex = self.arena.vertex_index(new_faces[i].b);
            let bucket = self.vertex_laths[a_vertex as usize].clone();
            for cand in bucket {
                if self.arena.vertex_index(self.arena.cf(cand)) == d_vertex {
                    self.arena.get_mut(a).cw_vertex = Some(cand);
                }
                if self.arena.vertex_index(self.arena.ccf(cand)) == b_vertex {
                    self.arena.get_mut(cand).cw_vertex = Some(a);
                }
            }
        }

        for i in 0..n {
            // Likewise the edge midpoints.
            let a_vertex = self.arena.vertex_index(new_faces[i].a);
            let b = new_faces[i].b;
            let b_bucket = self.vertex_laths[self.arena.vertex_index(b) as usize].clone();
            for cand in b_bucket {
                if self.arena.vertex_index(self.arena.cf(cand)) == a_vertex {
                    self.arena.get_mut(b).cw_vertex = Some(cand);
                }
            }
            let d = new_faces[i].d;
            let d_bucket = self.vertex_laths[self.arena.vertex_index(d) as usize].clone();
            for cand in d_bucket {
                if self.arena.vertex_index(self.arena.ccf(cand)) == a_vertex {
                    self.arena.get_mut(cand).cw_vertex = Some(d);
                }
            }
        }
    }

    /// Subdivide every face around the given vertex that has not been
    /// subdivided yet.
    pub fn subdivide_neighbour_faces(&mut self, vertex: LathId) {
        let mut scratch = Vec::new();
        let mut f = vertex;
        loop {
            if self.arena.face_vertex_lath(f).is_none() {
                self.subdivide_face(f, &mut scratch);
            }
            match self.arena.cv(f) {
                Some(l) if l != vertex => f = l,
                Some(_) => return,
                None => break,
            }
        }
        // Hit a boundary; sweep the other way.
        let mut f = self.arena.ccv(vertex);
        while let Some(l) = f {
            if self.arena.face_vertex_lath(l).is_none() {
                self.subdivide_face(l, &mut scratch);
            }
            f = self.arena.ccv(l);
        }
    }

    /// Rebuild an identical hull with fresh laths by replaying the
    /// face list.  Tags other than holes and boundary interpolation
    /// are not carried; callers reapply creases and corners against
    /// the rebuilt laths.
    pub fn duplicate(&self) -> Result<SubdivTopology> {
        let mut clone = SubdivTopology::new(self.points.clone(), self.name.clone());
        clone.prepare(self.vertex_count());
        clone.interpolate_boundary = self.interpolate_boundary;
        clone.holes = self.holes.clone();

        let mut corners = Vec::new();
        for i in 0..self.facet_count() {
            self.arena.face_vertices(self.facet(i), &mut corners);
            let vertices: Vec<u32> = corners
                .iter()
                .map(|&l| self.arena.vertex_index(l))
                .collect();
            let face_vertices: Vec<u32> = corners
                .iter()
                .map(|&l| self.arena.face_vertex_index(l))
                .collect();
            clone.add_facet_with_face_vertices(&vertices, &face_vertices)?;
        }
        clone.finalise()?;
        Ok(clone)
    }
}

/// ### Diagnostics
impl SubdivTopology {
    /// Dump the unrefined faces of the hull as Wavefront-style `v`
    /// and `f` records, appending the given faces as a named group.
    /// A debugging aid; the output is not a general OBJ writer.
    pub fn write_obj(&self, path: &std::path::Path, faces: Option<&[LathId]>) -> Result<()> {
        use std::io::Write;

        let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
        for index in 0..self.vertex_count() {
            let p = self.position(self.vertex(index))?;
            writeln!(file, "v {} {} {}", p.x, p.y, p.z)?;
        }

        let mut corners = Vec::new();
        let write_face = |file: &mut dyn Write, lath: LathId, corners: &mut Vec<LathId>| {
            self.arena.face_vertices(lath, corners);
            let mut line = String::from("f");
            for &corner in corners.iter() {
                line.push_str(&format!(" {}", self.arena.vertex_index(corner) + 1));
            }
            writeln!(file, "{}", line)
        };

        for index in 0..self.facet_count() {
            let facet = self.facet(index);
            if self.arena.face_vertex_lath(facet).is_none() {
                write_face(&mut file, facet, &mut corners)?;
            }
        }

        if let Some(faces) = faces {
            writeln!(file, "g CurrentFace")?;
            for &face in faces {
                write_face(&mut file, face, &mut corners)?;
            }
        }
        Ok(())
    }
}

/// Read-only topology context the interpolation masks run against.
pub(crate) struct MaskCtx<'a> {
    pub arena: &'a LathArena,
    pub sharp_edges: &'a HashMap<LathId, f32>,
    pub sharp_corners: &'a HashMap<LathId, f32>,
}

impl MaskCtx<'_> {
    fn edge_sharpness(&self, l: LathId) -> f32 {
        self.sharp_edges.get(&l).copied().unwrap_or(0.0)
    }

    fn corner_sharpness(&self, l: LathId) -> f32 {
        self.sharp_corners.get(&l).copied().unwrap_or(0.0)
    }

    fn index(&self, class: PrimvarClass, l: LathId) -> usize {
        if class.is_per_vertex() {
            self.arena.vertex_index(l) as usize
        } else {
            self.arena.face_vertex_index(l) as usize
        }
    }
}

/// `true` if a facevertex primvar does not agree across the faces
/// sharing the vertex.  Such a vertex is treated as hard.
fn discontinuous_face_vertex<T: Element>(
    ctx: &MaskCtx,
    buf: &[T],
    array_len: usize,
    k: usize,
    vertex: LathId,
) -> bool {
    let current = buf[ctx.arena.face_vertex_index(vertex) as usize * array_len + k];
    let mut faces = Vec::new();
    ctx.arena.vertex_faces(vertex, &mut faces);
    faces
        .iter()
        .any(|&f| !current.close(buf[ctx.arena.face_vertex_index(f) as usize * array_len + k]))
}

/// `true` if a facevertex primvar is discontinuous across the edge, on
/// either side.  Boundary edges cannot be discontinuous.
fn discontinuous_face_vertex_edge<T: Element>(
    ctx: &MaskCtx,
    buf: &[T],
    array_len: usize,
    k: usize,
    edge: LathId,
) -> bool {
    let Some(companion) = ctx.arena.ec(edge) else {
        return false;
    };
    let value = |l: LathId| buf[ctx.arena.face_vertex_index(l) as usize * array_len + k];
    let near = ctx.arena.cv(edge).map(value);
    let far = ctx.arena.cv(companion).map(value);
    near.is_some_and(|v| !value(edge).close(v)) || far.is_some_and(|v| !value(companion).close(v))
}

impl MaskCtx<'_> {
    /// Compute the refined value for the child of an existing vertex.
    fn vertex_values<T: Element>(
        &self,
        class: PrimvarClass,
        array_len: usize,
        buf: &mut [T],
        vertex: LathId,
        new_index: usize,
    ) {
        for k in 0..array_len {
            let idx = |l: LathId| self.index(class, l) * array_len + k;

            if class == PrimvarClass::Vertex || class == PrimvarClass::FaceVertex {
                if class == PrimvarClass::FaceVertex
                    && discontinuous_face_vertex(self, buf, array_len, k, vertex)
                {
                    buf[new_index * array_len + k] = buf[idx(vertex)];
                    continue;
                }

                if self.arena.is_boundary_vertex(vertex) {
                    // Boundary faces are only rendered with the
                    // "interpolateboundary" tag, so there is no need
                    // to test for it here.
                    let mut around = Vec::new();
                    self.arena.vertex_edges(vertex, &mut around);
                    if around.len() == 2 {
                        // Valence-2 boundary is a corner; stationary.
                        buf[new_index * array_len + k] = buf[idx(vertex)];
                    } else {
                        // Average of the two adjacent boundary edge
                        // endpoints and the original point, 1:1:6.
                        let mut r = T::zero();
                        let mut boundary_edges = 0;
                        for &e in &around {
                            if self.arena.ec(e).is_none() {
                                if self.arena.vertex_index(e) == self.arena.vertex_index(vertex) {
                                    r = r.add(buf[idx(self.arena.ccf(e))]);
                                } else {
                                    r = r.add(buf[idx(e)]);
                                }
                                boundary_edges += 1;
                            }
                        }
                        debug_assert_eq!(boundary_edges, 2);
                        let s = buf[idx(vertex)];
                        buf[new_index * array_len + k] = r.add(s.scale(6.0)).scale(1.0 / 8.0);
                    }
                } else if self.corner_sharpness(vertex) > 0.0 {
                    buf[new_index * array_len + k] = buf[idx(vertex)];
                } else {
                    let mut around = Vec::new();
                    self.arena.vertex_edges(vertex, &mut around);
                    let n = around.len();

                    // The three hardest incident edges drive the
                    // semi-sharp blend.
                    let mut hard: [Option<LathId>; 3] = [None; 3];
                    let mut sharp_count = 0;
                    for &e in &around {
                        let h = self.edge_sharpness(e);
                        if hard[0].is_none() || h > self.edge_sharpness_opt(hard[0]) {
                            hard = [Some(e), hard[0], hard[1]];
                        } else if hard[1].is_none() || h > self.edge_sharpness_opt(hard[1]) {
                            hard = [hard[0], Some(e), hard[1]];
                        } else if hard[2].is_none() || h > self.edge_sharpness_opt(hard[2]) {
                            hard[2] = Some(e);
                        }
                        if h > 0.0 {
                            sharp_count += 1;
                        }
                    }

                    // Smooth vertex rule: Q/n + 2R/n^2 + S(n-3)/n with
                    // Q the mean of the surrounding face points and R
                    // the mean of the surrounding edge midpoints.
                    let mut faces = Vec::new();
                    self.arena.vertex_faces(vertex, &mut faces);
                    let mut q = T::zero();
                    let mut face_corners = Vec::new();
                    for &f in &faces {
                        self.arena.face_vertices(f, &mut face_corners);
                        let mut val = T::zero();
                        for &c in &face_corners {
                            val = val.add(buf[idx(c)]);
                        }
                        q = q.add(val.scale(1.0 / face_corners.len() as f32));
                    }
                    let q = q.scale(1.0 / faces.len() as f32).scale(1.0 / n as f32);

                    let a = buf[idx(vertex)];
                    let mut r = T::zero();
                    for &e in &around {
                        let b = buf[idx(self.arena.ccf(e))];
                        r = r.add(a.add(b).scale(0.5));
                    }
                    let mut r = r.scale(2.0).scale(1.0 / n as f32).scale(1.0 / n as f32);

                    let mut s = buf[idx(vertex)].scale((n as f32 - 3.0) / n as f32);

                    let mut semi_sharp = r.add(s.scale(6.0)).scale(1.0 / 8.0);
                    let soft = q.add(r).add(s);

                    if sharp_count >= 2 {
                        // Crease rule over the two hardest edges.
                        if let (Some(h1), Some(h2)) = (hard[0], hard[1]) {
                            r = buf[idx(self.arena.ccf(h1))].add(buf[idx(self.arena.ccf(h2))]);
                            s = buf[idx(vertex)];
                            semi_sharp = r.add(s.scale(6.0)).scale(1.0 / 8.0);
                        }
                    }
                    let sharp = buf[idx(vertex)];

                    let h2 = self.edge_sharpness_opt(hard[1]);
                    let h3 = self.edge_sharpness_opt(hard[2]);
                    let value = soft
                        .scale(1.0 - h2)
                        .add(semi_sharp.scale(h2 - h3))
                        .add(sharp.scale(h3));
                    buf[new_index * array_len + k] = value;
                }
            } else {
                // Varying and facevarying children keep the value at
                // the vertex.
                buf[new_index * array_len + k] = buf[idx(vertex)];
            }
        }
    }

    fn edge_sharpness_opt(&self, l: Option<LathId>) -> f32 {
        l.map(|l| self.edge_sharpness(l)).unwrap_or(0.0)
    }

    /// Compute the value for a new edge midpoint vertex.
    fn edge_vertex_values<T: Element>(
        &self,
        class: PrimvarClass,
        array_len: usize,
        buf: &mut [T],
        edge: LathId,
        new_index: usize,
    ) {
        for k in 0..array_len {
            let idx = |l: LathId| self.index(class, l) * array_len + k;

            let value;
            if class == PrimvarClass::Vertex || class == PrimvarClass::FaceVertex {
                // A discontinuity on either adjoining vertex makes
                // this edge fully hard.
                let discontinuous = class == PrimvarClass::FaceVertex
                    && discontinuous_face_vertex_edge(self, buf, array_len, k, edge);

                if self.arena.ec(edge).is_some() && !discontinuous {
                    // Average of the edge midpoint and the midpoint of
                    // the two new face points, pulled towards the edge
                    // by its sharpness.
                    let mut faces = Vec::new();
                    self.arena.edge_faces(edge, &mut faces);
                    let mut c = T::zero();
                    let mut corners = Vec::new();
                    for &f in &faces {
                        self.arena.face_vertices(f, &mut corners);
                        let mut val = T::zero();
                        for &corner in &corners {
                            val = val.add(buf[idx(corner)]);
                        }
                        c = c.add(val.scale(1.0 / corners.len() as f32));
                    }
                    let c = c.scale(1.0 / faces.len() as f32);

                    let a = buf[idx(edge)];
                    let b = buf[idx(self.arena.ccf(edge))];
                    let h = self.edge_sharpness(edge);
                    let mid = a.add(b).scale((1.0 + h) * 0.5);
                    value = mid.add(c.scale(1.0 - h)).scale(0.5);
                } else {
                    // Boundary edge: plain midpoint.
                    value = buf[idx(edge)].add(buf[idx(self.arena.ccf(edge))]).scale(0.5);
                }
            } else {
                value = buf[idx(edge)].add(buf[idx(self.arena.ccf(edge))]).scale(0.5);
            }
            buf[new_index * array_len + k] = value;
        }
    }

    /// Compute the value for a new face centroid vertex.
    fn face_vertex_values<T: Element>(
        &self,
        class: PrimvarClass,
        array_len: usize,
        buf: &mut [T],
        face: LathId,
        new_index: usize,
    ) {
        let mut corners = Vec::new();
        self.arena.face_vertices(face, &mut corners);
        let inv = 1.0 / corners.len() as f32;
        for k in 0..array_len {
            let mut val = T::zero();
            for &c in &corners {
                val = val.add(buf[self.index(class, c) * array_len + k]);
            }
            buf[new_index * array_len + k] = val.scale(inv);
        }
    }

    /// Copy the value at the lath into a new entry.
    fn duplicate_values<T: Element>(
        &self,
        class: PrimvarClass,
        array_len: usize,
        buf: &mut [T],
        lath: LathId,
        new_index: usize,
    ) {
        for k in 0..array_len {
            buf[new_index * array_len + k] = buf[self.index(class, lath) * array_len + k];
        }
    }
}

/// Which interpolation rule a new-point driver applies.
#[derive(Clone, Copy)]
enum NewPoint {
    Vertex,
    Edge,
    Face,
    Duplicate,
}

impl MaskCtx<'_> {
    fn create(&self, kind: NewPoint, pv: &mut Primvar, lath: LathId, new_index: usize) {
        let class = pv.class;
        let array_len = pv.array_len;
        macro_rules! run {
            ($buf:expr) => {
                match kind {
                    NewPoint::Vertex => {
                        self.vertex_values(class, array_len, $buf, lath, new_index)
                    }
                    NewPoint::Edge => {
                        self.edge_vertex_values(class, array_len, $buf, lath, new_index)
                    }
                    NewPoint::Face => {
                        self.face_vertex_values(class, array_len, $buf, lath, new_index)
                    }
                    NewPoint::Duplicate => {
                        self.duplicate_values(class, array_len, $buf, lath, new_index)
                    }
                }
            };
        }
        match &mut pv.data {
            PrimvarData::Float(buf) => run!(buf),
            PrimvarData::Integer(buf) => run!(buf),
            PrimvarData::Point(buf)
            | PrimvarData::Vector(buf)
            | PrimvarData::Normal(buf)
            | PrimvarData::Color(buf) => run!(buf),
            PrimvarData::HPoint(buf) => run!(buf),
            // Strings and matrices do not average; they only follow a
            // vertex through duplication.
            PrimvarData::Matrix(buf) => {
                if let NewPoint::Duplicate = kind {
                    let src = self.index(class, lath);
                    for k in 0..array_len {
                        buf[new_index * array_len + k] = buf[src * array_len + k];
                    }
                }
            }
            PrimvarData::String(buf) => {
                if let NewPoint::Duplicate = kind {
                    let src = self.index(class, lath);
                    for k in 0..array_len {
                        buf[new_index * array_len + k] = buf[src * array_len + k].clone();
                    }
                }
            }
        }
    }
}

/// ### New-point drivers
///
/// Each appends one value per primvar per time slot, classed
/// appropriately, and returns the new `(vertex, face_vertex)` index
/// pair.  When `reuse` carries a vertex index from a back-pointer the
/// vertex-class buffers are left untouched and only the per-corner
/// classes grow.
impl SubdivTopology {
    fn drive_new_point(
        &mut self,
        kind: NewPoint,
        lath: LathId,
        reuse: Option<u32>,
    ) -> (u32, u32) {
        let SubdivTopology {
            arena,
            sharp_edges,
            sharp_corners,
            points,
            vertex_laths,
            ..
        } = self;
        let ctx = MaskCtx {
            arena,
            sharp_edges,
            sharp_corners,
        };

        let mut vertex_index = reuse;
        let mut face_vertex_index: Option<u32> = None;

        for slot in points.slots_mut() {
            for pv in slot.iter_mut() {
                match pv.class {
                    PrimvarClass::Constant | PrimvarClass::Uniform => continue,
                    PrimvarClass::Varying | PrimvarClass::Vertex => {
                        if reuse.is_some() {
                            continue;
                        }
                        let index = pv.count();
                        debug_assert!(
                            vertex_index.is_none() || vertex_index == Some(index as u32)
                        );
                        vertex_index = Some(index as u32);
                        pv.set_count(index + 1);
                        ctx.create(kind, pv, lath, index);
                    }
                    PrimvarClass::FaceVarying | PrimvarClass::FaceVertex => {
                        let index = pv.count();
                        debug_assert!(
                            face_vertex_index.is_none()
                                || face_vertex_index == Some(index as u32)
                        );
                        face_vertex_index = Some(index as u32);
                        pv.set_count(index + 1);
                        ctx.create(kind, pv, lath, index);
                    }
                }
            }
        }

        let vertex_index = match vertex_index {
            Some(v) => v,
            None => 0,
        };
        if vertex_laths.len() <= vertex_index as usize {
            vertex_laths.resize(vertex_index as usize + 1, Vec::new());
        }
        (vertex_index, face_vertex_index.unwrap_or(0))
    }

    /// New child vertex for the vertex the lath references.
    pub(crate) fn add_vertex(&mut self, vertex: LathId, reuse: Option<u32>) -> (u32, u32) {
        self.drive_new_point(NewPoint::Vertex, vertex, reuse)
    }

    /// New midpoint vertex for the edge the lath references.
    pub(crate) fn add_edge_vertex(&mut self, edge: LathId, reuse: Option<u32>) -> (u32, u32) {
        self.drive_new_point(NewPoint::Edge, edge, reuse)
    }

    /// New centroid vertex for the face the lath references.
    pub(crate) fn add_face_vertex(&mut self, face: LathId) -> (u32, u32) {
        self.drive_new_point(NewPoint::Face, face, None)
    }

    /// Duplicate the vertex the lath references, copying all primvars.
    pub(crate) fn duplicate_vertex(&mut self, vertex: LathId) -> (u32, u32) {
        self.drive_new_point(NewPoint::Duplicate, vertex, None)
    }
}
