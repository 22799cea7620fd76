//! Tests for the regular-neighbourhood predicate and bicubic patch
//! extraction.

#[path = "test_utils.rs"]
mod test_utils;

use catclark::context::RenderContext;
use catclark::subdiv::{
    PatchSplit, PointPool, Primvar, PrimvarClass, PrimvarData, PrimvarSet, SubdivMesh,
    SubdivPatch, Tag,
};
use glam::{Mat4, Vec3};
use test_utils::grid;

/// Index of the central face of the 5x5 grid.
const CENTRE: usize = 12;

#[test]
fn regular_neighbourhood_is_patchable() {
    let mesh = grid(5);
    assert!(mesh.topology().can_use_patch(mesh.topology().facet(CENTRE)));
}

#[test]
fn boundary_face_is_not_patchable() {
    let mesh = grid(5);
    assert!(!mesh.topology().can_use_patch(mesh.topology().facet(0)));
    // One ring in from the corner still touches the boundary.
    assert!(!mesh.topology().can_use_patch(mesh.topology().facet(6)));
}

#[test]
fn crease_blocks_patch_extraction() {
    let mut mesh = grid(5);
    // Crease one edge of the central face: vertices (2,2)-(2,3) of the
    // 6x6 point grid.
    mesh.apply_tags(&[Tag::Crease {
        vertices: vec![14, 15],
        sharpness: 2.0,
    }]);
    assert!(!mesh.topology().can_use_patch(mesh.topology().facet(CENTRE)));
}

#[test]
fn corner_blocks_patch_extraction() {
    let mut mesh = grid(5);
    mesh.apply_tags(&[Tag::Corner { vertices: vec![14] }]);
    assert!(!mesh.topology().can_use_patch(mesh.topology().facet(CENTRE)));
}

#[test]
fn extracted_cage_is_the_four_by_four_block() {
    let mut mesh = grid(5);
    let patch = SubdivPatch::new(mesh.topology().facet(CENTRE), CENTRE);
    let split = patch.split(mesh.topology_mut());

    let PatchSplit::Bicubic(bicubic) = split else {
        panic!("central face should extract as a patch");
    };

    // The cage is the 4x4 vertex block around the face.
    let mut expected: Vec<u32> = (1..=4)
        .flat_map(|row| (1..=4).map(move |column| (row * 6 + column) as u32))
        .collect();
    let mut actual = bicubic.vertex_indices.to_vec();
    expected.sort_unstable();
    actual.sort_unstable();
    assert_eq!(actual, expected);

    // 16 control points for P, in Bezier basis; the interior of the
    // cage still spans the original face, so the patch corners sit
    // inside the grid.
    let p = bicubic.primvars.find("P").unwrap();
    assert_eq!(p.count(), 16);
    assert_eq!(p.class, PrimvarClass::Vertex);
}

#[test]
fn irregular_face_subdivides_instead() {
    let mut mesh = grid(5);
    let patch = SubdivPatch::new(mesh.topology().facet(0), 0);
    match patch.split(mesh.topology_mut()) {
        PatchSplit::Faces(faces) => assert_eq!(faces.len(), 4),
        PatchSplit::Bicubic(_) => panic!("boundary face must not extract"),
    }
}

#[test]
fn patchable_face_is_never_diced() {
    let mut mesh = grid(5);
    let context = RenderContext::new();
    let patch = SubdivPatch::new(mesh.topology().facet(CENTRE), CENTRE);
    let estimate = patch
        .diceable(mesh.topology_mut(), &context, &Mat4::IDENTITY, 1.0)
        .unwrap();
    assert!(!estimate.diceable);
    assert!(!estimate.discard);
}

fn grid_with_face_vertex(n: usize, continuous: bool) -> SubdivMesh {
    let side = n + 1;
    let mut positions = Vec::new();
    for row in 0..side {
        for column in 0..side {
            positions.push(Vec3::new(column as f32, row as f32, 0.0));
        }
    }
    let mut counts = Vec::new();
    let mut indices = Vec::new();
    for row in 0..n {
        for column in 0..n {
            counts.push(4u32);
            indices.extend_from_slice(&[
                (row * side + column) as u32,
                (row * side + column + 1) as u32,
                ((row + 1) * side + column + 1) as u32,
                ((row + 1) * side + column) as u32,
            ]);
        }
    }

    // A facevertex channel: per corner either the vertex index (equal
    // wherever faces meet) or the face index (discontinuous at every
    // seam).
    let values: Vec<f32> = if continuous {
        indices.iter().map(|&v| v as f32).collect()
    } else {
        indices
            .chunks(4)
            .enumerate()
            .flat_map(|(face, corners)| corners.iter().map(move |_| face as f32))
            .collect()
    };

    let mut set = PrimvarSet::new();
    set.push(Primvar::points("P", positions));
    set.push(Primvar {
        name: "patina".to_string(),
        class: PrimvarClass::FaceVertex,
        array_len: 1,
        data: PrimvarData::Float(values),
    });
    SubdivMesh::new(PointPool::new(set), &counts, &indices, None, "fv-grid").unwrap()
}

#[test]
fn discontinuous_face_vertex_forces_subdivision() {
    let mesh = grid_with_face_vertex(5, false);
    assert!(!mesh.topology().can_use_patch(mesh.topology().facet(CENTRE)));

    let mesh = grid_with_face_vertex(5, true);
    assert!(mesh.topology().can_use_patch(mesh.topology().facet(CENTRE)));
}

#[test]
fn continuous_face_vertex_converts_to_vertex_class() {
    let mut mesh = grid_with_face_vertex(5, true);
    let patch = SubdivPatch::new(mesh.topology().facet(CENTRE), CENTRE);
    let PatchSplit::Bicubic(bicubic) = patch.split(mesh.topology_mut()) else {
        panic!("continuous facevertex data extracts fine");
    };
    let converted = bicubic.primvars.find("patina").unwrap();
    assert_eq!(converted.class, PrimvarClass::Vertex);
    assert_eq!(converted.count(), 16);
}
