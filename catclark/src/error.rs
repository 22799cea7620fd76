//! Error types for the catclark crate.

use thiserror::Error;

/// Main error type for catclark operations.
///
/// Only conditions that abort an operation are represented here.
/// Recoverable conditions -- an unknown filter name, an unknown wrap
/// mode, a texture-memory budget overrun -- are handled in place with a
/// logged fallback and never surface as an `Error`.
#[derive(Debug, Error)]
pub enum Error {
    /// A vertex remained non-manifold after the repair pass.
    #[error("non-manifold vertex {vertex} in control hull of \"{mesh}\"")]
    InvalidTopology {
        /// Index of the offending vertex.
        vertex: u32,
        /// Identifier of the mesh being finalised.
        mesh: String,
    },

    /// A face was declared with fewer than three vertices.
    #[error("degenerate face with {arity} vertices")]
    DegenerateFace {
        /// Number of vertices the face was declared with.
        arity: usize,
    },

    /// A tile could not be read from the backing TIFF file.  The owning
    /// texture is invalidated and subsequent samples return zero.
    #[error("failed to read tile from texture \"{0}\"")]
    MissingTile(String),

    /// The texture layout cannot be used for the requested operation,
    /// e.g. building a MIPMAP from an already tiled image.
    #[error("unsupported texture format for \"{0}\"")]
    UnsupportedFormat(String),

    /// A named primitive variable required by an operation is absent.
    #[error("missing primitive variable \"{0}\"")]
    MissingPrimvar(String),

    /// Index out of bounds.
    #[error("index {index} out of bounds (max: {max})")]
    IndexOutOfBounds {
        /// The offending index.
        index: usize,
        /// Largest valid index.
        max: usize,
    },

    /// A primitive variable buffer does not have the size its storage
    /// class implies.
    #[error("invalid buffer size for \"{name}\": expected {expected}, got {actual}")]
    InvalidBufferSize {
        /// Name of the primitive variable.
        name: String,
        /// Class-implied element count.
        expected: usize,
        /// Actual element count.
        actual: usize,
    },

    /// IO error for file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TIFF decode or encode error.
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
