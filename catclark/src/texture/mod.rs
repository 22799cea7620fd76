//! The texture map cache.
//!
//! Tiled MIPMAP reading with lazy, memory-budgeted tile residency,
//! bilinear and trilinear filtered sampling, environment-cube
//! lookups, and MIPMAP construction for plain images.
//!
//! The cache is owned by the render context; shading queries go
//! through [`TextureCache::sample_texture`] and
//! [`TextureCache::sample_environment`].  Texture files are
//! multi-directory TIFFs; directory `i` holds the level-`i` pyramid
//! image, and the Pixar `textureformat` and `wrapmodes` tags carry
//! the layout and sampling state.

pub mod buffer;
pub mod cache;
pub mod environment;
pub mod filter;
pub mod map;

pub use buffer::TileBuffer;
pub use cache::{CacheMemory, TextureCache};
pub use environment::EnvironmentMap;
pub use filter::Filter;
pub use map::{MapType, SampleOptions, TexFormat, TextureMap, WrapMode};
