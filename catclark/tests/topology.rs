//! Tests for hull construction and manifold repair.

#[path = "test_utils.rs"]
mod test_utils;

use test_utils::{cube, grid, mesh_from, open_square};

#[test]
fn cube_face_rings_close() {
    let mesh = cube();
    let topology = mesh.topology();
    let arena = topology.laths();

    for lath in arena.ids() {
        assert_ne!(arena.cf(lath), lath);
        let valence = arena.face_valence(lath);
        assert_eq!(valence, 4);
        let mut walk = lath;
        for _ in 0..valence {
            walk = arena.cf(walk);
        }
        assert_eq!(walk, lath);
    }
}

#[test]
fn cube_edge_companions_are_symmetric() {
    let mesh = cube();
    let topology = mesh.topology();
    let arena = topology.laths();

    for lath in arena.ids() {
        let companion = arena.ec(lath).expect("closed surface has no boundary edges");
        assert_eq!(arena.ec(companion), Some(lath));
        assert_eq!(
            topology.edge_sharpness(lath),
            topology.edge_sharpness(companion)
        );
    }
}

#[test]
fn cube_vertex_fans_are_connected() {
    let mesh = cube();
    let topology = mesh.topology();
    let arena = topology.laths();

    for index in 0..topology.vertex_count() {
        let lath = topology.vertex(index);
        assert!(!arena.is_boundary_vertex(lath));
        // Three faces meet at every cube corner.
        assert_eq!(arena.vertex_face_count(lath), 3);
        assert_eq!(arena.vertex_edge_count(lath), 3);
        // The clockwise walk returns home.
        let mut walk = arena.cv(lath);
        let mut steps = 0;
        while let Some(l) = walk {
            if l == lath {
                break;
            }
            walk = arena.cv(l);
            steps += 1;
            assert!(steps <= 8, "fan walk did not close");
        }
        assert!(walk.is_some());
    }
}

#[test]
fn open_square_is_all_boundary() {
    let mesh = open_square();
    let topology = mesh.topology();
    let arena = topology.laths();
    let face = topology.facet(0);

    assert!(arena.is_boundary_facet(face));
    let mut corners = Vec::new();
    arena.face_vertices(face, &mut corners);
    for &corner in &corners {
        assert!(arena.is_boundary_vertex(corner));
        assert!(arena.is_boundary_edge(corner));
        assert!(arena.is_corner_vertex(corner));
        assert_eq!(arena.vertex_edge_count(corner), 2);
    }
}

#[test]
fn grid_interior_vertices_have_valence_four() {
    let mesh = grid(3);
    let topology = mesh.topology();
    let arena = topology.laths();

    // Vertex (1, 1) of the 4x4 point grid is interior.
    let lath = topology.vertex(5);
    assert!(!arena.is_boundary_vertex(lath));
    assert_eq!(arena.vertex_edge_count(lath), 4);
    assert_eq!(arena.vertex_face_count(lath), 4);

    // An edge vertex has three edges, two faces.
    let lath = topology.vertex(1);
    assert!(arena.is_boundary_vertex(lath));
    assert_eq!(arena.vertex_edge_count(lath), 3);
    assert_eq!(arena.vertex_face_count(lath), 2);
}

#[test]
fn bowtie_vertex_is_duplicated() {
    // Two triangles sharing only a vertex cannot form one fan; the
    // repair pass splits the vertex.
    let positions = [
        [0.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [1.0, -1.0, 0.0],
        [-1.0, 1.0, 0.0],
        [-1.0, -1.0, 0.0],
    ];
    let counts = [3, 3];
    let indices = [0, 1, 2, 0, 4, 3];
    let mesh = mesh_from(&positions, &counts, &indices);
    let topology = mesh.topology();

    assert_eq!(topology.vertex_count(), 6);
    // The duplicate sits at the same position as the original.
    let original = topology.position(topology.vertex(0)).unwrap();
    let duplicate = topology.position(topology.vertex(5)).unwrap();
    assert_eq!(original, duplicate);

    // Both faces still close.
    let arena = topology.laths();
    for face in 0..2 {
        assert_eq!(arena.face_valence(topology.facet(face)), 3);
    }
}

#[test]
fn obj_dump_writes_unrefined_faces() {
    let mut mesh = cube();
    let mut sub_faces = Vec::new();
    let face = mesh.topology().facet(0);
    mesh.topology_mut().subdivide_face(face, &mut sub_faces);

    let path = test_utils::temp_path("dump.obj");
    mesh.topology().write_obj(&path, Some(&sub_faces)).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();

    // All 17 vertices; the five unrefined cube faces plus the four
    // sub-faces, and the requested group repeating the sub-faces.
    assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(), 17);
    assert_eq!(text.lines().filter(|l| l.starts_with("f ")).count(), 13);
    assert!(text.contains("g CurrentFace"));
}

#[test]
fn degenerate_faces_are_dropped() {
    let positions = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
    // A two-vertex "face" between two valid triangles.
    let counts = [3, 2, 3];
    let indices = [0, 1, 2, 0, 1, 0, 2, 3];
    let mesh = mesh_from(&positions, &counts, &indices);
    assert_eq!(mesh.face_count(), 2);
    assert_eq!(mesh.topology().facet_count(), 2);
}
