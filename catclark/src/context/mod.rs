//! The render context: coordinate systems, options, attributes,
//! statistics and the motion time cursor.
//!
//! Everything the geometry and texture subsystems need from the
//! surrounding renderer flows through a [`RenderContext`]: named
//! coordinate-system lookups composed into space-to-space matrices,
//! typed option and attribute tables with the defaults bootstrapped
//! at construction, counters, and the texture cache itself.  There is
//! exactly one context per render; all core entry points borrow it.

pub mod options;
pub mod stats;
pub mod transform;

pub use options::{OptionTable, OptionValue};
pub use stats::Stats;
pub use transform::Transform;

use glam::{Mat4, Vec3};

use crate::texture::{Filter, SampleOptions, TextureCache, WrapMode};
use std::path::Path;

/// A named coordinate system with its matrices to and from world
/// space.
#[derive(Debug, Clone)]
struct CoordSystem {
    name: String,
    to_world: Mat4,
    world_to: Mat4,
}

/// The renderer state the core queries.
#[derive(Debug)]
pub struct RenderContext {
    coord_systems: Vec<CoordSystem>,
    options: OptionTable,
    attributes: OptionTable,
    stats: Stats,
    camera: Transform,
    times: Vec<f32>,
    time_cursor: usize,
    texture_cache: TextureCache,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new()
    }
}

/// ### Construction and defaults
impl RenderContext {
    /// A context with the standard coordinate systems registered and
    /// the default options in place:
    ///
    /// | Option                       | Value  |
    /// |------------------------------|--------|
    /// | `"limits" "texturememory"`   | `8192` (KiB) |
    /// | `"System" "SqrtGridSize"`    | `16.0` |
    /// | `"texture" "lerp"`           | `0`    |
    /// | `"statistics" "renderinfo"`  | `0`    |
    pub fn new() -> Self {
        let mut options = OptionTable::new();
        options.set(
            "limits",
            "texturememory",
            OptionValue::Integer(vec![8192]),
        );
        options.set("System", "SqrtGridSize", OptionValue::Float(vec![16.0]));
        options.set("texture", "lerp", OptionValue::Integer(vec![0]));
        options.set("statistics", "renderinfo", OptionValue::Integer(vec![0]));

        Self::with_options(options)
    }

    /// A context over explicit options; missing defaults are not
    /// filled in.  The texture budget and trilinear toggle are read
    /// here.
    pub fn with_options(options: OptionTable) -> Self {
        let budget_kib = options
            .integer("limits", "texturememory")
            .map(|v| v[0].max(0) as usize)
            .unwrap_or(8192);
        let lerp = options
            .integer("texture", "lerp")
            .map(|v| v[0] > 0)
            .unwrap_or(false);

        let mut context = RenderContext {
            coord_systems: Vec::new(),
            options,
            attributes: OptionTable::new(),
            stats: Stats::new(),
            camera: Transform::identity(),
            times: vec![0.0],
            time_cursor: 0,
            texture_cache: TextureCache::new(budget_kib * 1024, lerp),
        };
        for name in ["world", "screen", "NDC", "raster"] {
            context.set_coord_system(name, Mat4::IDENTITY);
        }
        context
    }
}

/// ### Coordinate systems
impl RenderContext {
    /// Register (or replace) a named coordinate system by its
    /// to-world matrix.  Returns `true` when an existing system was
    /// replaced.
    pub fn set_coord_system(&mut self, name: &str, to_world: Mat4) -> bool {
        let world_to = to_world.inverse();
        for system in self.coord_systems.iter_mut() {
            if system.name == name {
                system.to_world = to_world;
                system.world_to = world_to;
                return true;
            }
        }
        self.coord_systems.push(CoordSystem {
            name: name.to_string(),
            to_world,
            world_to,
        });
        false
    }

    /// Set the camera transform (camera-to-world, keyframed).
    pub fn set_camera(&mut self, camera: Transform) {
        self.camera = camera;
    }

    fn to_world(&self, name: &str) -> Mat4 {
        self.coord_systems
            .iter()
            .rev()
            .find(|s| s.name == name)
            .map(|s| s.to_world)
            .unwrap_or(Mat4::IDENTITY)
    }

    fn world_to(&self, name: &str) -> Mat4 {
        self.coord_systems
            .iter()
            .rev()
            .find(|s| s.name == name)
            .map(|s| s.world_to)
            .unwrap_or(Mat4::IDENTITY)
    }

    /// The composed transform between two named spaces at `time`.
    ///
    /// The special names `object`, `shader`, `camera` and `current`
    /// resolve against the caller-supplied transforms and the camera;
    /// all other names look up the registered coordinate systems.
    pub fn matrix_space_to_space(
        &self,
        from: &str,
        to: &str,
        shader_to_world: Option<&Transform>,
        object_to_world: Option<&Transform>,
        time: f32,
    ) -> Mat4 {
        let from_matrix = match from {
            "object" => object_to_world
                .map(|t| t.object_to_world(time))
                .unwrap_or(Mat4::IDENTITY),
            "shader" => shader_to_world
                .map(|t| t.object_to_world(time))
                .unwrap_or(Mat4::IDENTITY),
            "camera" | "current" => self.camera.object_to_world(time).inverse(),
            name => self.to_world(name),
        };
        let to_matrix = match to {
            "object" => object_to_world
                .map(|t| t.object_to_world(time).inverse())
                .unwrap_or(Mat4::IDENTITY),
            "shader" => shader_to_world
                .map(|t| t.object_to_world(time).inverse())
                .unwrap_or(Mat4::IDENTITY),
            "camera" | "current" => self.camera.object_to_world(time),
            name => self.world_to(name),
        };
        to_matrix * from_matrix
    }

    /// As [`matrix_space_to_space`](Self::matrix_space_to_space) but
    /// for direction vectors: the translation is stripped.
    pub fn matrix_vector_space_to_space(
        &self,
        from: &str,
        to: &str,
        shader_to_world: Option<&Transform>,
        object_to_world: Option<&Transform>,
        time: f32,
    ) -> Mat4 {
        let mut matrix =
            self.matrix_space_to_space(from, to, shader_to_world, object_to_world, time);
        matrix.w_axis = glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        matrix.x_axis.w = 0.0;
        matrix.y_axis.w = 0.0;
        matrix.z_axis.w = 0.0;
        matrix
    }

    /// As [`matrix_space_to_space`](Self::matrix_space_to_space) but
    /// for normals: inverse transpose of the vector transform.
    pub fn matrix_normal_space_to_space(
        &self,
        from: &str,
        to: &str,
        shader_to_world: Option<&Transform>,
        object_to_world: Option<&Transform>,
        time: f32,
    ) -> Mat4 {
        self.matrix_vector_space_to_space(from, to, shader_to_world, object_to_world, time)
            .inverse()
            .transpose()
    }
}

/// ### Options, attributes, statistics, time
impl RenderContext {
    /// The option table.
    pub fn options(&self) -> &OptionTable {
        &self.options
    }

    /// The option table, mutably.
    pub fn options_mut(&mut self) -> &mut OptionTable {
        &mut self.options
    }

    /// The attribute table.
    pub fn attributes(&self) -> &OptionTable {
        &self.attributes
    }

    /// The attribute table, mutably.
    pub fn attributes_mut(&mut self) -> &mut OptionTable {
        &mut self.attributes
    }

    /// Typed option lookup; `None` when absent.
    pub fn float_option(&self, table: &str, param: &str) -> Option<&[f32]> {
        self.options.float(table, param)
    }

    /// Typed option lookup; `None` when absent.
    pub fn integer_option(&self, table: &str, param: &str) -> Option<&[i32]> {
        self.options.integer(table, param)
    }

    /// Typed option lookup; `None` when absent.
    pub fn string_option(&self, table: &str, param: &str) -> Option<&[String]> {
        self.options.string(table, param)
    }

    /// Typed attribute lookup; `None` when absent.
    pub fn float_attribute(&self, table: &str, param: &str) -> Option<&[f32]> {
        self.attributes.float(table, param)
    }

    /// Typed attribute lookup; `None` when absent.
    pub fn integer_attribute(&self, table: &str, param: &str) -> Option<&[i32]> {
        self.attributes.integer(table, param)
    }

    /// Typed attribute lookup; `None` when absent.
    pub fn string_attribute(&self, table: &str, param: &str) -> Option<&[String]> {
        self.attributes.string(table, param)
    }

    /// The statistics counters.
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// The statistics counters, mutably.
    pub fn stats_mut(&mut self) -> &mut Stats {
        &mut self.stats
    }

    /// Declare the shutter times of the current motion block.
    pub fn set_motion_times(&mut self, times: &[f32]) {
        self.times = if times.is_empty() {
            vec![0.0]
        } else {
            times.to_vec()
        };
        self.time_cursor = 0;
    }

    /// The motion-block cursor's current time.
    pub fn current_time(&self) -> f32 {
        self.times[self.time_cursor.min(self.times.len() - 1)]
    }

    /// Advance the motion-block cursor to the next declared time.
    pub fn advance_time(&mut self) {
        if self.time_cursor + 1 < self.times.len() {
            self.time_cursor += 1;
        }
    }
}

/// ### Texture access
impl RenderContext {
    /// The texture cache.
    pub fn texture_cache(&self) -> &TextureCache {
        &self.texture_cache
    }

    /// The texture cache, mutably.
    pub fn texture_cache_mut(&mut self) -> &mut TextureCache {
        &mut self.texture_cache
    }

    /// Sample a texture by filename; see
    /// [`TextureCache::sample_texture`].
    #[allow(clippy::too_many_arguments)]
    pub fn sample_texture(
        &mut self,
        name: &str,
        s: f32,
        t: f32,
        s_footprint: f32,
        t_footprint: f32,
        options: &SampleOptions,
        out: &mut Vec<f32>,
    ) {
        let RenderContext {
            texture_cache,
            stats,
            ..
        } = self;
        texture_cache.sample_texture(stats, name, s, t, s_footprint, t_footprint, options, out);
    }

    /// Sample an environment map by filename; see
    /// [`TextureCache::sample_environment`].
    pub fn sample_environment(
        &mut self,
        name: &str,
        directions: [Vec3; 4],
        options: &SampleOptions,
        out: &mut Vec<f32>,
    ) {
        let RenderContext {
            texture_cache,
            stats,
            ..
        } = self;
        texture_cache.sample_environment(stats, name, directions, options, out);
    }

    /// Convert a plain image into a MIPMAP texture file; see
    /// [`TextureCache::make_texture`].
    #[allow(clippy::too_many_arguments)]
    pub fn make_texture(
        &mut self,
        input: &Path,
        output: &Path,
        s_mode: WrapMode,
        t_mode: WrapMode,
        filter: Filter,
        s_width: f32,
        t_width: f32,
    ) -> crate::Result<()> {
        let RenderContext {
            texture_cache,
            stats,
            ..
        } = self;
        texture_cache.make_texture(
            stats, input, output, s_mode, t_mode, filter, s_width, t_width,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn space_to_space_composes_through_world() {
        let mut context = RenderContext::new();
        context.set_coord_system("lamp", Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)));
        context.set_camera(Transform::new(Mat4::from_translation(Vec3::new(
            0.0, 0.0, -5.0,
        ))));

        // lamp -> world.
        let m = context.matrix_space_to_space("lamp", "world", None, None, 0.0);
        let p = m.project_point3(Vec3::ZERO);
        assert!((p - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-6);

        // lamp -> camera goes through world and the camera inverse.
        let m = context.matrix_space_to_space("lamp", "camera", None, None, 0.0);
        let p = m.project_point3(Vec3::ZERO);
        assert!((p - Vec3::new(1.0, 0.0, 5.0)).length() < 1e-6);
    }

    #[test]
    fn object_space_uses_caller_transform() {
        let context = RenderContext::new();
        let object = Transform::new(Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0)));
        let m = context.matrix_space_to_space("object", "world", None, Some(&object), 0.0);
        let p = m.project_point3(Vec3::ZERO);
        assert!((p - Vec3::new(0.0, 2.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn time_cursor_clamps() {
        let mut context = RenderContext::new();
        context.set_motion_times(&[0.0, 0.5]);
        assert_eq!(context.current_time(), 0.0);
        context.advance_time();
        assert_eq!(context.current_time(), 0.5);
        context.advance_time();
        assert_eq!(context.current_time(), 0.5);
    }
}
