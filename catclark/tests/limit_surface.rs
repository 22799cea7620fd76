//! Tests for limit-point evaluation.

#[path = "test_utils.rs"]
mod test_utils;

use catclark::subdiv::Tag;
use glam::Vec3;
use test_utils::{assert_close, cube, open_square, tetrahedron};

#[test]
fn open_square_corners_are_interpolated() {
    let mut mesh = open_square();
    for index in 0..4 {
        let lath = mesh.topology().vertex(index);
        let control = mesh.topology().position(lath).unwrap();
        let limit = mesh.topology_mut().limit_point(lath).unwrap();
        assert_close(limit, control, 1e-6);
    }
}

#[test]
fn open_square_centre_limit() {
    let mut mesh = open_square();
    let face = mesh.topology().facet(0);
    let mut sub_faces = Vec::new();
    mesh.topology_mut().subdivide_face(face, &mut sub_faces);

    let centre = mesh
        .topology()
        .laths()
        .face_vertex_lath(face)
        .expect("face was refined");
    let limit = mesh.topology_mut().limit_point(centre).unwrap();
    assert_close(limit, Vec3::new(0.5, 0.5, 0.0), 1e-5);
}

#[test]
fn boundary_limit_mask_weights() {
    // The boundary limit mask is 1/6 (4 v + e1 + e2); probing a
    // straight boundary keeps the vertex in place, which pins the
    // weights summing to one.
    let mut mesh = open_square();
    let face = mesh.topology().facet(0);
    let mut sub_faces = Vec::new();
    mesh.topology_mut().subdivide_face(face, &mut sub_faces);

    // The boundary edge midpoints are valence-3 boundary vertices.
    let arena = mesh.topology().laths();
    let mut midpoint = None;
    for index in 0..mesh.topology().vertex_count() {
        let lath = mesh.topology().vertex(index);
        if arena.is_boundary_vertex(lath) && arena.vertex_edge_count(lath) == 3 {
            midpoint = Some(lath);
            break;
        }
    }
    let midpoint = midpoint.expect("refined square has boundary midpoints");
    let control = mesh.topology().position(midpoint).unwrap();
    let limit = mesh.topology_mut().limit_point(midpoint).unwrap();
    // On a straight boundary the mask reproduces the point.
    assert_close(limit, control, 1e-5);
}

#[test]
fn sharp_corner_limit_is_stationary() {
    let mut mesh = cube();
    mesh.apply_tags(&[
        Tag::Crease {
            vertices: vec![2, 3, 5, 4, 2],
            sharpness: 10.0,
        },
        Tag::Corner {
            vertices: vec![2, 3, 5, 4],
        },
    ]);

    let control = mesh.topology().position(mesh.topology().vertex(2)).unwrap();

    // Refine the creased face a few levels, following vertex 2's
    // child chain down.
    let mut face = mesh.topology().facet(1);
    let mut sub_faces = Vec::new();
    for _ in 0..3 {
        mesh.topology_mut().subdivide_face(face, &mut sub_faces);
        face = sub_faces[0];
    }

    // Every child along the chain sits exactly on the control point.
    let mut lath = mesh.topology().vertex(2);
    loop {
        assert_close(mesh.topology().position(lath).unwrap(), control, 1e-6);
        let limit = mesh.topology_mut().limit_point(lath).unwrap();
        assert_close(limit, control, 1e-6);
        match mesh.topology().laths().child_vertex(lath) {
            Some(child) => lath = child,
            None => break,
        }
    }
}

#[test]
fn fully_sharp_crease_edges_stay_straight() {
    let mut mesh = cube();
    // Interface sharpness 10 clamps to the fully sharp internal
    // value, so the creased edges subdivide as plain midpoints.
    mesh.apply_tags(&[Tag::Crease {
        vertices: vec![2, 3, 5, 4, 2],
        sharpness: 10.0,
    }]);

    let a = mesh.topology().position(mesh.topology().vertex(2)).unwrap();
    let b = mesh.topology().position(mesh.topology().vertex(3)).unwrap();

    let face = mesh.topology().facet(1);
    let mut sub_faces = Vec::new();
    mesh.topology_mut().subdivide_face(face, &mut sub_faces);

    // The midpoint vertex of edge 2-3 lies exactly halfway.
    let corner = mesh.topology().facet(1);
    let midpoint = mesh
        .topology()
        .laths()
        .mid_vertex(corner)
        .expect("edge was refined");
    let p = mesh.topology().position(midpoint).unwrap();
    assert_close(p, (a + b) * 0.5, 1e-6);
}

#[test]
fn boundary_refinement_and_limit_masks_differ() {
    // The refinement rule for a boundary vertex is (e1 + e2 + 6v)/8;
    // the limit mask is (e1 + e2 + 4v)/6.  Probe both on a bent
    // two-quad strip where they give distinct answers.
    let positions = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 1.0],
        [2.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [1.0, 1.0, 0.0],
        [2.0, 1.0, 0.0],
    ];
    let counts = [4, 4];
    let indices = [0, 1, 4, 3, 1, 2, 5, 4];
    let mut mesh = test_utils::mesh_from(&positions, &counts, &indices);

    let bent = mesh.topology().vertex(1);
    let limit = mesh.topology_mut().limit_point(bent).unwrap();
    assert_close(limit, Vec3::new(1.0, 0.0, 2.0 / 3.0), 1e-5);

    let mut sub_faces = Vec::new();
    for face in 0..2 {
        let face = mesh.topology().facet(face);
        mesh.topology_mut().subdivide_face(face, &mut sub_faces);
    }
    let child = mesh
        .topology()
        .laths()
        .child_vertex(bent)
        .expect("incident faces were refined");
    let refined = mesh.topology().position(child).unwrap();
    assert_close(refined, Vec3::new(1.0, 0.0, 0.75), 1e-5);
}

#[test]
fn tetrahedron_limit_point_stays_in_hull() {
    let mut mesh = tetrahedron();
    let lath = mesh.topology().vertex(0);
    let limit = mesh.topology_mut().limit_point(lath).unwrap();

    // The limit of vertex 0 is a convex combination of the vertex,
    // its three neighbours and the three face centroids, all of which
    // lie inside the tetrahedron's bounds.
    let (min, max) = mesh.bound().unwrap();
    assert!(limit.cmpge(min).all() && limit.cmple(max).all());

    // And it has genuinely moved towards the centre.
    let control = mesh.topology().position(mesh.topology().vertex(0)).unwrap();
    assert!((limit - Vec3::ZERO).length() < (control - Vec3::ZERO).length());
}
