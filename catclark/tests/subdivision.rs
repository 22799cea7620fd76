//! Tests for hierarchical refinement.

#[path = "test_utils.rs"]
mod test_utils;

use catclark::subdiv::{SubdivPatch, Tag};
use test_utils::{assert_close, cube, grid, open_square, tetrahedron};

#[test]
fn tetrahedron_first_subdivision_counts() {
    let mut mesh = tetrahedron();
    let base_vertices = mesh.topology().vertex_count();
    assert_eq!(base_vertices, 4);

    let mut quads = 0;
    let mut sub_faces = Vec::new();
    for face in 0..4 {
        let face = mesh.topology().facet(face);
        mesh.topology_mut().subdivide_face(face, &mut sub_faces);
        // A triangle refines into three quadrilaterals.
        assert_eq!(sub_faces.len(), 3);
        quads += sub_faces.len();
    }
    assert_eq!(quads, 12);

    // 4 face centroids, 6 edge midpoints, 4 vertex children.
    assert_eq!(mesh.topology().vertex_count() - base_vertices, 14);

    let arena = mesh.topology().laths();
    for face in 4..mesh.topology().facet_count() {
        assert_eq!(arena.face_valence(mesh.topology().facet(face)), 4);
    }
}

#[test]
fn tetrahedron_second_subdivision_counts() {
    let mut mesh = tetrahedron();
    let mut level1 = Vec::new();
    let mut sub_faces = Vec::new();
    for face in 0..4 {
        let face = mesh.topology().facet(face);
        mesh.topology_mut().subdivide_face(face, &mut sub_faces);
        level1.extend_from_slice(&sub_faces);
    }

    let mut quads = 0;
    for &face in &level1 {
        mesh.topology_mut().subdivide_face(face, &mut sub_faces);
        assert_eq!(sub_faces.len(), 4);
        quads += sub_faces.len();
    }
    assert_eq!(quads, 48);
}

#[test]
fn subdivision_is_idempotent() {
    let mut mesh = tetrahedron();
    let face = mesh.topology().facet(0);

    let mut first = Vec::new();
    mesh.topology_mut().subdivide_face(face, &mut first);
    let vertices = mesh.topology().vertex_count();
    let laths = mesh.topology().lath_count();
    let facets = mesh.topology().facet_count();

    let mut second = Vec::new();
    mesh.topology_mut().subdivide_face(face, &mut second);
    assert_eq!(first, second);
    assert_eq!(mesh.topology().vertex_count(), vertices);
    assert_eq!(mesh.topology().lath_count(), laths);
    assert_eq!(mesh.topology().facet_count(), facets);
}

#[test]
fn quad_refinement_produces_class_counts() {
    let mut mesh = grid(3);
    let base_vertices = mesh.topology().vertex_count();

    let mut sub_faces = Vec::new();
    let face = mesh.topology().facet(4);
    mesh.topology_mut().subdivide_face(face, &mut sub_faces);

    // One centroid, four edge midpoints, four children; nothing to
    // reuse since no neighbour is refined yet.
    assert_eq!(sub_faces.len(), 4);
    assert_eq!(mesh.topology().vertex_count() - base_vertices, 9);

    // Refining the face to the right reuses the shared edge midpoint
    // and the two shared corner children.
    let before = mesh.topology().vertex_count();
    let face = mesh.topology().facet(5);
    mesh.topology_mut().subdivide_face(face, &mut sub_faces);
    assert_eq!(mesh.topology().vertex_count() - before, 6);
}

#[test]
fn crease_sharpness_decays_quadratically() {
    let mut mesh = cube();
    // The ring 2-3-5-4 bounds one cube face; crease it at an
    // interface sharpness that maps to 0.5 internally.
    mesh.apply_tags(&[Tag::Crease {
        vertices: vec![2, 3, 5, 4, 2],
        sharpness: 0.15625,
    }]);

    let lath = mesh.topology().vertex(2);
    let arena = mesh.topology().laths();
    let mut around = Vec::new();
    arena.vertex_edges(lath, &mut around);
    let creased = around
        .iter()
        .find(|&&l| {
            arena
                .ec(l)
                .is_some_and(|c| arena.vertex_index(c) == 3)
        })
        .copied()
        .expect("edge 2-3 exists");
    assert_eq!(mesh.topology().edge_sharpness(creased), 0.5);
    let companion = arena.ec(creased).unwrap();
    assert_eq!(mesh.topology().edge_sharpness(companion), 0.5);

    // The child edge inherits the square of the parent sharpness.
    let mut sub_faces = Vec::new();
    let face = mesh.topology().facet(1);
    mesh.topology_mut().subdivide_face(face, &mut sub_faces);
    let child = sub_faces[0];
    assert_eq!(mesh.topology().edge_sharpness(child), 0.25);
}

#[test]
fn hole_face_is_skipped_by_split() {
    let mut mesh = grid(3);
    mesh.apply_tags(&[
        Tag::InterpolateBoundary,
        Tag::Hole { faces: vec![4] },
    ]);

    let patches = mesh.split();
    assert_eq!(patches.len(), 8);

    // The hole's vertices still feed the neighbouring masks: refining
    // a neighbour face works and shares the hole's corner children.
    let mut sub_faces = Vec::new();
    let face = mesh.topology().facet(1);
    mesh.topology_mut().subdivide_face(face, &mut sub_faces);
    assert_eq!(sub_faces.len(), 4);
}

#[test]
fn boundary_faces_need_interpolate_boundary() {
    let mesh = grid(3);
    // Without the tag only the interior face survives the split.
    assert_eq!(mesh.split().len(), 1);

    let mut mesh = grid(3);
    mesh.apply_tags(&[Tag::InterpolateBoundary]);
    assert_eq!(mesh.split().len(), 9);
}

#[test]
fn dice_evaluates_limit_grid() {
    let mesh = open_square();
    let patch = SubdivPatch::new(mesh.topology().facet(0), 0);
    let grid = patch.dice(mesh.topology(), 2, 2).unwrap();

    assert_eq!(grid.u_res(), 2);
    assert_eq!(grid.v_res(), 2);
    assert_eq!(grid.vertex_count(), 9);

    // Corner limit points pin to the control corners; the centre of
    // the face lands at the centre of the square.
    let corners = [
        grid.position(0, 0),
        grid.position(2, 0),
        grid.position(0, 2),
        grid.position(2, 2),
    ];
    for expected in [
        glam::Vec3::new(0.0, 0.0, 0.0),
        glam::Vec3::new(1.0, 0.0, 0.0),
        glam::Vec3::new(1.0, 1.0, 0.0),
        glam::Vec3::new(0.0, 1.0, 0.0),
    ] {
        assert!(
            corners.iter().any(|&c| (c - expected).length() < 1e-5),
            "missing corner {:?} in {:?}",
            expected,
            corners
        );
    }
    assert_close(grid.position(1, 1), glam::Vec3::new(0.5, 0.5, 0.0), 1e-5);

    // Edge midpoints stay on the boundary of the square.
    for (iu, iv) in [(1, 0), (0, 1), (2, 1), (1, 2)] {
        let p = grid.position(iu, iv);
        assert!(p.z.abs() < 1e-5);
        assert!(
            p.x.abs() < 1e-5
                || (p.x - 1.0).abs() < 1e-5
                || p.y.abs() < 1e-5
                || (p.y - 1.0).abs() < 1e-5
        );
    }
}
