//! Renderer-facing subdivision surfaces: the top-level mesh, the
//! per-face patches the splitter works on, and dicing.
//!
//! A [`SubdivMesh`] wraps a finalised [`SubdivTopology`] together with
//! the tag records of the declaration.  Splitting the mesh yields one
//! [`SubdivPatch`] per renderable face; splitting a patch either
//! extracts a bicubic B-spline patch (regular neighbourhood) or
//! refines the face into its sub-faces, which are again split
//! candidates.  Dicing evaluates the limit surface on a power-of-two
//! grid by recursive subdivision of an extracted sub-hull.

use std::collections::HashMap;

use glam::{Mat4, Vec3};
use itertools::Itertools;
use log::warn;

use super::lath::LathId;
use super::patch::{extract_patch, gather, BicubicPatch};
use super::primvar::{PointPool, Primvar, PrimvarClass, PrimvarData, PrimvarSet};
use super::topology::SubdivTopology;
use crate::context::RenderContext;
use crate::error::{Error, Result};

/// A tag record from a subdivision mesh declaration.
#[derive(Debug, Clone)]
pub enum Tag {
    /// Render boundary faces, interpolating the hull boundary.
    InterpolateBoundary,
    /// Crease the edges joining consecutive vertex pairs.
    ///
    /// The sharpness uses the renderer-interface convention of
    /// `0..infinity`; it is remapped onto the internal `0..1` scale
    /// when applied.
    Crease {
        /// Chain of vertex indices; each consecutive pair is an edge.
        vertices: Vec<u32>,
        /// Sharpness in the interface convention.
        sharpness: f32,
    },
    /// Pin the given vertices as fully sharp corners.
    Corner {
        /// The tagged vertex indices.
        vertices: Vec<u32>,
    },
    /// Exclude the given faces from rendering.
    Hole {
        /// The tagged face indices.
        faces: Vec<u32>,
    },
}

/// Remap an interface crease sharpness onto the internal `0..1`
/// scale: clamp at 5, divide by 5, then bend the curve with the
/// exponent 0.2.
pub fn crease_sharpness_from_interface(sharpness: f32) -> f32 {
    (sharpness.min(5.0) / 5.0).powf(0.2)
}

/// Dice rates map onto a power-of-two subdivision count.
const DICE_SIZES: [u32; 17] = [0, 0, 1, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 4, 4, 4, 4];

/// A subdivision surface hull as declared: topology plus tag records.
#[derive(Debug)]
pub struct SubdivMesh {
    topology: SubdivTopology,
    face_count: usize,
    sharp_edges: Vec<(u32, u32, f32)>,
    sharp_corners: Vec<(u32, f32)>,
}

impl SubdivMesh {
    /// Build and finalise a mesh from a face list.
    ///
    /// `counts` holds the arity of each face, `indices` the
    /// counter-clockwise vertex indices of all faces back to back, and
    /// `face_vertex_indices` an optional parallel array of per-corner
    /// indices into the facevarying pools (sequential when absent).
    /// Degenerate faces are dropped with a warning.
    pub fn new(
        points: PointPool,
        counts: &[u32],
        indices: &[u32],
        face_vertex_indices: Option<&[u32]>,
        name: impl Into<String>,
    ) -> Result<Self> {
        let vertex_count = points
            .slot(0)
            .find("P")
            .ok_or_else(|| Error::MissingPrimvar("P".to_string()))?
            .count();
        for time in 0..points.time_count() {
            points
                .slot(time)
                .validate(vertex_count, counts.len(), indices.len())?;
        }

        let mut topology = SubdivTopology::new(points, name);
        topology.prepare(vertex_count);

        let mut offset = 0usize;
        let mut face_count = 0usize;
        for &count in counts {
            let count = count as usize;
            let face = &indices[offset..offset + count];
            let added = match face_vertex_indices {
                Some(fv) => topology
                    .add_facet_with_face_vertices(face, &fv[offset..offset + count]),
                None => topology.add_facet(face, offset as u32),
            };
            match added {
                Ok(_) => face_count += 1,
                Err(Error::DegenerateFace { .. }) => {}
                Err(e) => return Err(e),
            }
            offset += count;
        }

        topology.finalise()?;
        Ok(SubdivMesh {
            topology,
            face_count,
            sharp_edges: Vec::new(),
            sharp_corners: Vec::new(),
        })
    }

    /// Apply declaration tags to the finalised hull.
    pub fn apply_tags(&mut self, tags: &[Tag]) {
        for tag in tags {
            match tag {
                Tag::InterpolateBoundary => self.topology.set_interpolate_boundary(true),
                Tag::Crease {
                    vertices,
                    sharpness,
                } => {
                    let sharpness = crease_sharpness_from_interface(*sharpness);
                    for (&a, &b) in vertices.iter().tuple_windows() {
                        self.add_sharp_edge(a, b, sharpness);
                    }
                }
                Tag::Corner { vertices } => {
                    for &v in vertices {
                        // Corners pin the vertex entirely.
                        self.add_sharp_corner(v, f32::INFINITY);
                    }
                }
                Tag::Hole { faces } => {
                    for &f in faces {
                        self.topology.set_hole_face(f as usize);
                    }
                }
            }
        }
    }

    fn add_sharp_edge(&mut self, a: u32, b: u32, sharpness: f32) {
        if a as usize >= self.topology.vertex_count() || b as usize >= self.topology.vertex_count()
        {
            warn!("crease tag references vertex out of range, ignored");
            return;
        }
        self.sharp_edges.push((a, b, sharpness));
        apply_sharp_edge(&mut self.topology, a, b, sharpness);
    }

    fn add_sharp_corner(&mut self, vertex: u32, sharpness: f32) {
        if vertex as usize >= self.topology.vertex_count() {
            warn!("corner tag references vertex out of range, ignored");
            return;
        }
        self.sharp_corners.push((vertex, sharpness));
        let lath = self.topology.vertex(vertex as usize);
        self.topology.add_sharp_corner(lath, sharpness);
    }

    /// Number of renderable faces in the declaration.
    pub fn face_count(&self) -> usize {
        self.face_count
    }

    /// The hull.
    pub fn topology(&self) -> &SubdivTopology {
        &self.topology
    }

    /// The hull, mutably; refinement needs this.
    pub fn topology_mut(&mut self) -> &mut SubdivTopology {
        &mut self.topology
    }

    /// Split the mesh into per-face patches.
    ///
    /// Boundary faces are dropped unless the hull interpolates its
    /// boundary; hole faces are always dropped (their vertices still
    /// take part in neighbouring subdivision masks).
    pub fn split(&self) -> Vec<SubdivPatch> {
        let mut patches = Vec::new();
        for face_index in 0..self.face_count {
            let face = self.topology.facet(face_index);
            if self.topology.laths().is_boundary_facet(face)
                && !self.topology.interpolate_boundary()
            {
                continue;
            }
            if self.topology.is_hole_face(face_index) {
                continue;
            }
            patches.push(SubdivPatch { face, face_index });
        }
        patches
    }

    /// Axis-aligned bound over every control point and time slot.
    pub fn bound(&self) -> Result<(Vec3, Vec3)> {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for time in 0..self.topology.points().time_count() {
            for index in 0..self.topology.vertex_count() {
                let p = self
                    .topology
                    .position_at(time, self.topology.vertex(index))?;
                min = min.min(p);
                max = max.max(p);
            }
        }
        Ok((min, max))
    }

    /// Deep-copy the mesh, rebuilding fresh laths and reapplying the
    /// recorded crease and corner tags against them.
    pub fn duplicate(&self) -> Result<SubdivMesh> {
        let mut topology = self.topology.duplicate()?;
        for &(a, b, s) in &self.sharp_edges {
            if (a as usize) < topology.vertex_count() && (b as usize) < topology.vertex_count() {
                apply_sharp_edge(&mut topology, a, b, s);
            }
        }
        for &(v, s) in &self.sharp_corners {
            if (v as usize) < topology.vertex_count() {
                let lath = topology.vertex(v as usize);
                topology.add_sharp_corner(lath, s);
            }
        }
        Ok(SubdivMesh {
            topology,
            face_count: self.face_count,
            sharp_edges: self.sharp_edges.clone(),
            sharp_corners: self.sharp_corners.clone(),
        })
    }
}

/// Stamp sharpness on the edge `a -> b` and its companion.
fn apply_sharp_edge(topology: &mut SubdivTopology, a: u32, b: u32, sharpness: f32) {
    let lath = topology.vertex(a as usize);
    let mut around = Vec::new();
    topology.laths().vertex_edges(lath, &mut around);
    for l in around {
        if let Some(companion) = topology.laths().ec(l) {
            if topology.laths().vertex_index(companion) == b {
                topology.add_sharp_edge(l, sharpness);
                topology.add_sharp_edge(companion, sharpness);
                return;
            }
        }
    }
}

/// Direction a too-large patch should be split along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitDir {
    /// Split along the u parametric direction.
    U,
    /// Split along the v parametric direction.
    V,
}

/// Result of sizing a patch against the shading rate.
#[derive(Debug, Clone, Copy)]
pub struct DiceEstimate {
    /// `true` when the face fits the grid-size budget and can be
    /// diced directly.
    pub diceable: bool,
    /// `true` when the face is degenerate on screen and should be
    /// discarded.
    pub discard: bool,
    /// Dice rate along u.
    pub u_dice: u32,
    /// Dice rate along v.
    pub v_dice: u32,
    /// Preferred split direction when not diceable.
    pub split_dir: SplitDir,
}

/// Result of splitting a patch.
#[derive(Debug)]
pub enum PatchSplit {
    /// The face had a regular neighbourhood and became a bicubic
    /// B-spline patch.
    Bicubic(BicubicPatch),
    /// The face was refined; each sub-face is a new split candidate.
    Faces(Vec<SubdivPatch>),
}

/// One face of a subdivision hull, as handled by the splitter.
#[derive(Debug, Clone, Copy)]
pub struct SubdivPatch {
    face: LathId,
    face_index: usize,
}

impl SubdivPatch {
    /// Wrap a face for splitting.  `face_index` names the top-level
    /// face this patch descends from, for uniform primvar lookups.
    pub fn new(face: LathId, face_index: usize) -> Self {
        SubdivPatch { face, face_index }
    }

    /// A lath on the face.
    pub fn face(&self) -> LathId {
        self.face
    }

    /// Index of the originating top-level face.
    pub fn face_index(&self) -> usize {
        self.face_index
    }

    /// Axis-aligned bound of the patch neighbourhood, over all time
    /// slots.  Neighbour faces are refined first where needed so the
    /// one-ring exists.
    pub fn bound(&self, topology: &mut SubdivTopology) -> Result<(Vec3, Vec3)> {
        if let Some(parent) = topology.laths().parent_facet(self.face) {
            let mut faces = Vec::new();
            topology.laths().face_faces(parent, &mut faces);
            let mut scratch = Vec::new();
            for f in faces {
                if topology.laths().face_vertex_lath(f).is_none() {
                    topology.subdivide_face(f, &mut scratch);
                }
            }
        }

        let mut faces = Vec::new();
        topology.laths().face_faces(self.face, &mut faces);
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        let mut corners = Vec::new();
        for &f in &faces {
            topology.laths().face_vertices(f, &mut corners);
            for &corner in &corners {
                for time in 0..topology.points().time_count() {
                    let p = topology.position_at(time, corner)?;
                    min = min.min(p);
                    max = max.max(p);
                }
            }
        }
        Ok((min, max))
    }

    /// Split the patch: extract a bicubic patch when the
    /// neighbourhood is regular, refine into sub-faces otherwise.
    pub fn split(&self, topology: &mut SubdivTopology) -> PatchSplit {
        if topology.can_use_patch(self.face) {
            if let Some(patch) = extract_patch(topology, self.face, self.face_index) {
                return PatchSplit::Bicubic(patch);
            }
        }
        let mut sub_faces = Vec::new();
        topology.subdivide_face(self.face, &mut sub_faces);
        PatchSplit::Faces(
            sub_faces
                .into_iter()
                .map(|face| SubdivPatch {
                    face,
                    face_index: self.face_index,
                })
                .collect(),
        )
    }

    /// Size the patch against the shading rate.
    ///
    /// The current corners are no guide to the diced size -- a small
    /// patch next to large neighbours can grow arbitrarily under
    /// subdivision -- so the positions on the limit surface are used.
    /// The grid budget is half the `"System" "SqrtGridSize"` option,
    /// because extracting a regular part as a B-spline patch is so
    /// much cheaper than recursive dicing that small grids are worth
    /// the extra splits.
    pub fn diceable(
        &self,
        topology: &mut SubdivTopology,
        context: &RenderContext,
        camera_to_raster: &Mat4,
        shading_rate: f32,
    ) -> Result<DiceEstimate> {
        let not_diceable = |split_dir| DiceEstimate {
            diceable: false,
            discard: false,
            u_dice: 0,
            v_dice: 0,
            split_dir,
        };

        // A regular face converts to a patch instead; patch dicing is
        // much quicker.
        if topology.can_use_patch(self.face) {
            return Ok(not_diceable(SplitDir::U));
        }

        let mut corners = Vec::new();
        topology.laths().face_vertices(self.face, &mut corners);
        if corners.len() != 4 {
            return Ok(not_diceable(SplitDir::U));
        }

        let mut hull = [Vec3::ZERO; 4];
        for (slot, &corner) in corners.iter().enumerate() {
            hull[slot] = camera_to_raster.project_point3(topology.limit_point(corner)?);
        }

        let u_len = (hull[1] - hull[0])
            .length_squared()
            .max((hull[2] - hull[3]).length_squared());
        let v_len = (hull[3] - hull[0])
            .length_squared()
            .max((hull[2] - hull[1]).length_squared());

        let u_len = (u_len / shading_rate).sqrt();
        let v_len = (v_len / shading_rate).sqrt();

        let split_dir = if u_len > v_len {
            SplitDir::U
        } else {
            SplitDir::V
        };
        let u_dice = (u_len.round() as u32).max(1);
        let v_dice = (v_len.round() as u32).max(1);

        if u_len < f32::EPSILON || v_len < f32::EPSILON {
            return Ok(DiceEstimate {
                diceable: false,
                discard: true,
                u_dice,
                v_dice,
                split_dir,
            });
        }

        let grid_size = context
            .float_option("System", "SqrtGridSize")
            .map(|v| v[0] / 2.0)
            .unwrap_or(8.0);

        Ok(DiceEstimate {
            diceable: u_dice as f32 <= grid_size && v_dice as f32 <= grid_size,
            discard: false,
            u_dice,
            v_dice,
            split_dir,
        })
    }

    /// Extract the patch neighbourhood as a standalone hull with
    /// renumbered vertices, over a single time slot.  The returned
    /// hull's facet 0 corresponds to this patch's face.
    pub fn extract(
        &self,
        topology: &SubdivTopology,
        time_index: usize,
    ) -> Result<SubdivTopology> {
        let arena = topology.laths();
        let mut neighbourhood = Vec::new();
        arena.face_faces(self.face, &mut neighbourhood);

        // Collect vertex indices in discovery order (shared vertices
        // once) and face-vertex indices per corner.  Corners are
        // reversed back to counter-clockwise for facet rebuilding.
        let mut vertex_slot: HashMap<u32, u32> = HashMap::new();
        let mut vertex_order: Vec<usize> = Vec::new();
        let mut face_vertex_order: Vec<usize> = Vec::new();
        let mut corners = Vec::new();
        for &f in &neighbourhood {
            arena.face_vertices(f, &mut corners);
            for &l in corners.iter().rev() {
                let v = arena.vertex_index(l);
                vertex_slot.entry(v).or_insert_with(|| {
                    vertex_order.push(v as usize);
                    (vertex_order.len() - 1) as u32
                });
                face_vertex_order.push(arena.face_vertex_index(l) as usize);
            }
        }

        let source = topology.points().slot(time_index);
        let mut set = PrimvarSet::new();
        for pv in source.iter() {
            let gathered = match pv.class {
                PrimvarClass::Vertex | PrimvarClass::Varying => {
                    gather(pv, &vertex_order, pv.class)
                }
                PrimvarClass::FaceVarying | PrimvarClass::FaceVertex => {
                    gather(pv, &face_vertex_order, pv.class)
                }
                PrimvarClass::Uniform => gather(pv, &[self.face_index], PrimvarClass::Uniform),
                PrimvarClass::Constant => gather(pv, &[0], PrimvarClass::Constant),
            };
            set.push(gathered);
        }

        let mut sub = SubdivTopology::new(PointPool::new(set), topology.name().to_string());
        sub.prepare(vertex_order.len());
        sub.set_interpolate_boundary(topology.interpolate_boundary());

        let mut face_vertex_start = 0u32;
        for &f in &neighbourhood {
            arena.face_vertices(f, &mut corners);
            let vertices: Vec<u32> = corners
                .iter()
                .rev()
                .map(|&l| vertex_slot[&arena.vertex_index(l)])
                .collect();
            sub.add_facet(&vertices, face_vertex_start)?;
            face_vertex_start += vertices.len() as u32;
        }
        sub.finalise()?;
        Ok(sub)
    }

    /// Dice the patch into a grid of limit-surface points.
    ///
    /// The neighbourhood is extracted into a standalone hull first, so
    /// the recursive refinement stays bounded; the face is then
    /// subdivided to the next power of two at or above the requested
    /// rate and the grid read off by walking the lath structure row by
    /// row.
    pub fn dice(
        &self,
        topology: &SubdivTopology,
        u_dice: u32,
        v_dice: u32,
    ) -> Result<MicroGrid> {
        let mut sub = self.extract(topology, 0)?;
        let face = sub.facet(0);

        let rate = u_dice.max(v_dice).min(16);
        let subdivisions = DICE_SIZES[rate as usize];
        let dice_size = 1usize << subdivisions;

        let mut current = vec![face];
        let mut sub_faces = Vec::new();
        for _ in 0..subdivisions {
            let mut next = Vec::with_capacity(current.len() * 4);
            for &f in &current {
                sub.subdivide_face(f, &mut sub_faces);
                next.extend_from_slice(&sub_faces);
            }
            current = next;
        }

        let mut grid = MicroGrid::new(dice_size, dice_size, &sub);

        let columns = dice_size;
        let rows = dice_size;
        fn broken(topology: &SubdivTopology) -> Error {
            Error::InvalidTopology {
                vertex: 0,
                mesh: topology.name().to_string(),
            }
        }

        // First row.
        let mut lath = current[0];
        let mut anchor = lath;
        store_dice(&mut sub, &mut grid, lath, 0)?;
        let mut index = 1;
        lath = sub.laths().ccf(lath);
        for c in 0..columns {
            store_dice(&mut sub, &mut grid, lath, index)?;
            if c < columns - 1 {
                let over = sub.laths().cv(lath).ok_or_else(|| broken(&sub))?;
                lath = sub.laths().ccf(over);
            }
            index += 1;
        }

        // Remaining rows.
        for r in 1..=rows {
            let mut lath = sub.laths().cf(anchor);
            if r < rows {
                anchor = sub.laths().ccv(lath).ok_or_else(|| broken(&sub))?;
            }
            let mut index = r * (columns + 1);
            store_dice(&mut sub, &mut grid, lath, index)?;
            index += 1;
            lath = sub.laths().cf(lath);
            for c in 0..columns {
                store_dice(&mut sub, &mut grid, lath, index)?;
                if c < columns - 1 {
                    let over = sub.laths().ccv(lath).ok_or_else(|| broken(&sub))?;
                    lath = sub.laths().cf(over);
                }
                index += 1;
            }
        }

        grid.fill_parametric();
        Ok(grid)
    }
}

/// A grid of limit-surface samples produced by dicing.
#[derive(Debug)]
pub struct MicroGrid {
    u_res: usize,
    v_res: usize,
    positions: Vec<Vec3>,
    s: Vec<f32>,
    t: Vec<f32>,
    u: Vec<f32>,
    v: Vec<f32>,
    has_st: bool,
    has_s: bool,
    has_t: bool,
    primvars: Vec<Primvar>,
}

impl MicroGrid {
    fn new(u_res: usize, v_res: usize, topology: &SubdivTopology) -> Self {
        let count = (u_res + 1) * (v_res + 1);
        let slot = topology.points().slot(0);
        let primvars = slot
            .iter()
            .filter(|pv| pv.name != "P")
            .map(|pv| {
                let mut out =
                    Primvar::new(pv.name.clone(), pv.class, pv.ty(), pv.array_len);
                out.set_count(count);
                out
            })
            .collect();
        MicroGrid {
            u_res,
            v_res,
            positions: vec![Vec3::ZERO; count],
            s: vec![0.0; count],
            t: vec![0.0; count],
            u: vec![0.0; count],
            v: vec![0.0; count],
            has_st: slot.find("st").is_some(),
            has_s: slot.find("s").is_some(),
            has_t: slot.find("t").is_some(),
            primvars,
        }
    }

    fn fill_parametric(&mut self) {
        let step_u = 1.0 / (self.u_res + 1) as f32;
        let step_v = 1.0 / (self.v_res + 1) as f32;
        for iv in 0..=self.v_res {
            for iu in 0..=self.u_res {
                let index = iv * (self.u_res + 1) + iu;
                self.u[index] = step_u * iu as f32;
                self.v[index] = step_v * iv as f32;
            }
        }
        if !self.has_st && !self.has_s {
            self.s.copy_from_slice(&self.u);
        }
        if !self.has_st && !self.has_t {
            self.t.copy_from_slice(&self.v);
        }
    }

    /// Grid resolution along u (the grid has `u_res + 1` columns).
    pub fn u_res(&self) -> usize {
        self.u_res
    }

    /// Grid resolution along v (the grid has `v_res + 1` rows).
    pub fn v_res(&self) -> usize {
        self.v_res
    }

    /// Number of grid vertices.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Limit position at grid coordinates.
    pub fn position(&self, iu: usize, iv: usize) -> Vec3 {
        self.positions[iv * (self.u_res + 1) + iu]
    }

    /// All limit positions, row major.
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Texture coordinates, row major.
    pub fn st(&self) -> (&[f32], &[f32]) {
        (&self.s, &self.t)
    }

    /// Parametric coordinates, row major.
    pub fn uv(&self) -> (&[f32], &[f32]) {
        (&self.u, &self.v)
    }

    /// The user primvars sampled onto the grid.
    pub fn primvars(&self) -> &[Primvar] {
        &self.primvars
    }
}

/// Store one grid vertex: the limit position plus every primvar the
/// shading system may ask for, indexed per storage class.
fn store_dice(
    topology: &mut SubdivTopology,
    grid: &mut MicroGrid,
    lath: LathId,
    index: usize,
) -> Result<()> {
    grid.positions[index] = topology.limit_point(lath)?;

    let vertex = topology.laths().vertex_index(lath) as usize;
    let face_vertex = topology.laths().face_vertex_index(lath) as usize;
    let slot = topology.points().slot(0);

    // "st", when present, overrides "s" and "t".
    let mut st_done = false;
    if let Some(st) = slot.find("st") {
        if st.array_len >= 2 {
            if let PrimvarData::Float(buf) = &st.data {
                let i = if st.class.is_per_face_vertex() {
                    face_vertex
                } else {
                    vertex
                };
                grid.s[index] = buf[i * st.array_len];
                grid.t[index] = buf[i * st.array_len + 1];
                st_done = true;
            }
        }
    }
    if !st_done {
        for (name, out) in [("s", &mut grid.s), ("t", &mut grid.t)] {
            if let Some(pv) = slot.find(name) {
                if let PrimvarData::Float(buf) = &pv.data {
                    let i = match pv.class {
                        PrimvarClass::Varying | PrimvarClass::Vertex => vertex,
                        PrimvarClass::FaceVarying | PrimvarClass::FaceVertex => face_vertex,
                        PrimvarClass::Uniform | PrimvarClass::Constant => 0,
                    };
                    out[index] = buf[i * pv.array_len];
                }
            }
        }
    }

    for out in grid.primvars.iter_mut() {
        if let Some(pv) = slot.find(&out.name) {
            let i = match pv.class {
                PrimvarClass::Constant => 0,
                PrimvarClass::Uniform => 0,
                PrimvarClass::Varying | PrimvarClass::Vertex => vertex,
                PrimvarClass::FaceVarying | PrimvarClass::FaceVertex => face_vertex,
            };
            for k in 0..pv.array_len {
                out.data
                    .copy_element(index * pv.array_len + k, &pv.data, i * pv.array_len + k);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interface_sharpness_mapping() {
        // Values above 5 clamp to the fully sharp internal value 1.
        assert_eq!(crease_sharpness_from_interface(10.0), 1.0);
        assert_eq!(crease_sharpness_from_interface(5.0), 1.0);
        // Zero stays zero, intermediate values bend upwards.
        assert_eq!(crease_sharpness_from_interface(0.0), 0.0);
        let mid = crease_sharpness_from_interface(2.5);
        assert!(mid > 0.5 && mid < 1.0);
    }

    #[test]
    fn dice_rates_are_powers_of_two() {
        for (rate, &count) in DICE_SIZES.iter().enumerate() {
            assert!(1u32 << count >= (rate as u32).div_ceil(2));
        }
    }
}
