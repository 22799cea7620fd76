//! Subdivision surface topology and refinement.
//!
//! The control hull of a subdivision surface is held as a graph of
//! *laths* -- corner-anchored half-edge records (see [`lath`]) -- owned
//! by a [`SubdivTopology`].  The topology is built from a face list,
//! repaired into a manifold by [`SubdivTopology::finalise`], and then
//! lazily refined face by face on demand from the splitter.
//!
//! [`SubdivMesh`] and [`SubdivPatch`] drive the renderer-facing half:
//! splitting a hull into per-face patches, short-circuiting regular
//! neighbourhoods into bicubic B-spline patches, and dicing irregular
//! ones by recursive subdivision with limit-point evaluation at every
//! grid vertex.

pub mod lath;
pub mod limit;
pub mod mesh;
pub mod patch;
pub mod primvar;
pub mod topology;

pub use lath::LathId;
pub use mesh::{DiceEstimate, MicroGrid, PatchSplit, SplitDir, SubdivMesh, SubdivPatch, Tag};
pub use patch::BicubicPatch;
pub use primvar::{PointPool, Primvar, PrimvarClass, PrimvarData, PrimvarSet, PrimvarType};
pub use topology::SubdivTopology;
