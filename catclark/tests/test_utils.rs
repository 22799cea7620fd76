//! Shared mesh builders for the integration tests.
#![allow(dead_code)]

use std::path::PathBuf;

use catclark::subdiv::{PointPool, Primvar, PrimvarSet, SubdivMesh, Tag};
use glam::Vec3;

/// Build a finalised mesh from positions and a face list.
pub fn mesh_from(positions: &[[f32; 3]], counts: &[u32], indices: &[u32]) -> SubdivMesh {
    let mut set = PrimvarSet::new();
    set.push(Primvar::points(
        "P",
        positions.iter().map(|p| Vec3::from_array(*p)).collect(),
    ));
    SubdivMesh::new(PointPool::new(set), counts, indices, None, "test").unwrap()
}

/// The unit cube as six quads.
pub fn cube() -> SubdivMesh {
    let positions = [
        [-0.5, -0.5, 0.5],
        [0.5, -0.5, 0.5],
        [-0.5, 0.5, 0.5],
        [0.5, 0.5, 0.5],
        [-0.5, 0.5, -0.5],
        [0.5, 0.5, -0.5],
        [-0.5, -0.5, -0.5],
        [0.5, -0.5, -0.5],
    ];
    let counts = [4, 4, 4, 4, 4, 4];
    let indices = [
        0, 1, 3, 2, 2, 3, 5, 4, 4, 5, 7, 6, 6, 7, 1, 0, 1, 7, 5, 3, 6, 0, 2, 4,
    ];
    mesh_from(&positions, &counts, &indices)
}

/// A regular tetrahedron of four triangles.
pub fn tetrahedron() -> SubdivMesh {
    let positions = [
        [1.0, 1.0, 1.0],
        [1.0, -1.0, -1.0],
        [-1.0, 1.0, -1.0],
        [-1.0, -1.0, 1.0],
    ];
    let counts = [3, 3, 3, 3];
    let indices = [2, 1, 0, 3, 2, 0, 1, 3, 0, 2, 3, 1];
    mesh_from(&positions, &counts, &indices)
}

/// A single open quadrilateral with boundary interpolation on.
pub fn open_square() -> SubdivMesh {
    let positions = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
    ];
    let mut mesh = mesh_from(&positions, &[4], &[0, 1, 2, 3]);
    mesh.apply_tags(&[Tag::InterpolateBoundary]);
    mesh
}

/// An `n` by `n` grid of unit quads on the z = 0 plane.
pub fn grid(n: usize) -> SubdivMesh {
    let side = n + 1;
    let mut positions = Vec::with_capacity(side * side);
    for row in 0..side {
        for column in 0..side {
            positions.push([column as f32, row as f32, 0.0]);
        }
    }
    let mut counts = Vec::new();
    let mut indices = Vec::new();
    for row in 0..n {
        for column in 0..n {
            counts.push(4);
            indices.extend_from_slice(&[
                (row * side + column) as u32,
                (row * side + column + 1) as u32,
                ((row + 1) * side + column + 1) as u32,
                ((row + 1) * side + column) as u32,
            ]);
        }
    }
    mesh_from(&positions, &counts, &indices)
}

/// A scratch file path unique to this test process.
pub fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("catclark_{}_{}", std::process::id(), name))
}

pub fn assert_close(a: Vec3, b: Vec3, tolerance: f32) {
    assert!(
        (a - b).length() <= tolerance,
        "expected {:?} to be within {} of {:?}",
        a,
        tolerance,
        b
    );
}
