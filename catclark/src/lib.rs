#![warn(missing_docs)]
//! # Catmull-Clark Subdivision Surfaces, the Lath Way
//!
//! `catclark` implements the geometry core of a REYES-style renderer:
//! a lath-based half-edge representation of subdivision control hulls,
//! lazy hierarchical Catmull-Clark refinement with semi-sharp creases,
//! corners, holes and boundary interpolation, limit-surface evaluation,
//! extraction of regular neighbourhoods as bicubic B-spline patches, and
//! a tiled, memory-budgeted MIPMAP texture cache with environment-cube
//! lookups.
//!
//! The crate has three areas:
//! * [`subdiv`] -- topology, refinement, limit points and patch
//!   extraction.
//! * [`texture`] -- the texture map cache and its samplers.
//! * [`context`] -- the render context the other two query for
//!   coordinate systems, options, attributes and statistics.
//!
//! ## Conventions
//!
//! * Canonical Rust naming -- `num_vertices()` style counters become
//!   `vertex_count()`.
//! * Unsigned integer types (`usize`, `u32`) for anything that can only
//!   hold positive values (indices, sizes, valences, arities).  Types
//!   should express intent.
//! * Configuration `struct`s use the init-struct pattern with documented
//!   `Default` impls rather than builders.
//! * Mesh ownership is explicit: a [`subdiv::SubdivTopology`] owns its
//!   lath arena and point pool; everything handed out is an index into
//!   them.  Nothing is reference counted.

pub mod context;
pub mod error;
pub mod subdiv;
pub mod texture;

// Re-export error types for convenience.
pub use error::{Error, Result};

/// A vertex, face, or face-vertex index in a topology.
///
/// # Examples
///
/// ```
/// use catclark::Index;
///
/// let idx = Index::from(42u32);
/// assert_eq!(idx.0, 42);
///
/// let value: u32 = idx.into();
/// assert_eq!(value, 42);
///
/// let idx = Index::from(100usize);
/// let as_usize: usize = idx.into();
/// assert_eq!(as_usize, 100);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
#[derive(bytemuck::Pod, bytemuck::Zeroable)]
pub struct Index(pub u32);

impl From<u32> for Index {
    fn from(value: u32) -> Self {
        Index(value)
    }
}

impl From<Index> for u32 {
    fn from(index: Index) -> Self {
        index.0
    }
}

impl From<usize> for Index {
    fn from(value: usize) -> Self {
        Index(value as u32)
    }
}

impl From<Index> for usize {
    fn from(index: Index) -> Self {
        index.0 as usize
    }
}
