//! Environment-cube lookups.
//!
//! Six square faces are packed into a 3x2 atlas: `+x +y +z` across
//! the top row, `-x -y -z` across the bottom.  A direction is
//! dispatched to the face of its dominant axis; the remaining two
//! components, divided by the dominant one, give `(u, v)` within the
//! face, which is then remapped into the face's cell of the atlas.

use glam::Vec3;
use log::error;

use super::cache::CacheMemory;
use super::map::{MapType, SampleOptions, TextureMap, sample_offsets};
use crate::context::Stats;

/// Atlas origin of each cube face, indexed `+x -x +y -y +z -z`.
const SIDES: [[f32; 2]; 6] = [
    [0.0, 0.0],
    [0.0, 0.5],
    [1.0 / 3.0, 0.0],
    [1.0 / 3.0, 0.5],
    [2.0 / 3.0, 0.0],
    [2.0 / 3.0, 0.5],
];

/// A cube-face environment map.
#[derive(Debug)]
pub struct EnvironmentMap {
    pub(crate) map: TextureMap,
    /// Field-of-view overlap factor of the faces; 1 means exact
    /// 90-degree faces.
    fov: f32,
}

impl EnvironmentMap {
    /// Wrap an opened cube-face texture.  Anything else is rejected
    /// and the map invalidated.
    pub fn new(mut map: TextureMap) -> Self {
        if map.map_type() != MapType::Environment {
            error!(
                "texture \"{}\" is not a cube-face environment",
                map.name()
            );
            map.set_invalid();
        }
        EnvironmentMap { map, fov: 1.0 }
    }

    /// Name the map was requested under.
    pub fn name(&self) -> &str {
        self.map.name()
    }

    /// `true` while the backing file decodes correctly.
    pub fn is_valid(&self) -> bool {
        self.map.is_valid()
    }

    /// Channels per texel.
    pub fn samples_per_pixel(&self) -> u32 {
        self.map.samples_per_pixel()
    }

    /// Dispatch a direction to its dominant-axis face.  Returns the
    /// face index and the in-face coordinates, both in `[0, 1]`.
    fn face_uv(direction: Vec3) -> Option<(usize, f32, f32)> {
        let d = direction;
        let (ax, ay, az) = (d.x.abs(), d.y.abs(), d.z.abs());
        if ax == 0.0 && ay == 0.0 && az == 0.0 {
            return None;
        }
        let (side, u, v) = if ax >= ay && ax >= az {
            if d.x > 0.0 {
                let t = 1.0 / d.x;
                (0, (-d.z * t + 1.0) * 0.5, (-d.y * t + 1.0) * 0.5)
            } else {
                let t = -1.0 / d.x;
                (1, (d.z * t + 1.0) * 0.5, (-d.y * t + 1.0) * 0.5)
            }
        } else if ay >= ax && ay >= az {
            if d.y > 0.0 {
                let t = 1.0 / d.y;
                (2, (d.x * t + 1.0) * 0.5, (d.z * t + 1.0) * 0.5)
            } else {
                let t = -1.0 / d.y;
                (3, (d.x * t + 1.0) * 0.5, (-d.z * t + 1.0) * 0.5)
            }
        } else if d.z > 0.0 {
            let t = 1.0 / d.z;
            (4, (d.x * t + 1.0) * 0.5, (-d.y * t + 1.0) * 0.5)
        } else {
            let t = -1.0 / d.z;
            (5, (-d.x * t + 1.0) * 0.5, (-d.y * t + 1.0) * 0.5)
        };
        Some((side, u, v))
    }

    /// Sample the environment over the reflection cone spanned by the
    /// four corner directions.
    pub(crate) fn sample(
        &mut self,
        memory: &mut CacheMemory,
        stats: &mut Stats,
        options: &SampleOptions,
        lerp_default: bool,
        directions: [Vec3; 4],
        out: &mut [f32],
    ) {
        out.fill(0.0);
        if !self.map.is_valid() {
            return;
        }
        if directions[0].length_squared() == 0.0 {
            return;
        }

        // Level selection from the footprint the corner directions
        // span on their face.  Corners landing on different faces give
        // no usable span; sample the finest level then.
        let corners: Vec<_> = directions.iter().filter_map(|&d| Self::face_uv(d)).collect();
        let (ds, dt) = if corners.len() == 4 && corners.iter().all(|c| c.0 == corners[0].0) {
            let span = |select: fn(&(usize, f32, f32)) -> f32| {
                let lo = corners.iter().map(select).fold(f32::INFINITY, f32::min);
                let hi = corners.iter().map(select).fold(f32::NEG_INFINITY, f32::max);
                hi - lo
            };
            (span(|c| c.1) / 3.0, span(|c| c.2) / 2.0)
        } else {
            (0.0, 0.0)
        };
        let choice = self.map.calculate_level(ds, dt);
        let lerp = options.lerp.unwrap_or(lerp_default) && choice.level + 1 < self.map.level_count();

        let dfov_u = (1.0 - self.fov).abs() / self.map.x_res() as f32;
        let dfov_v = (1.0 - self.fov).abs() / self.map.y_res() as f32;

        let filter = options.filter.unwrap_or(self.map.filter());
        let channels = self.map.samples_per_pixel() as usize;
        let mut level_a = vec![0.0f32; channels];
        let mut level_b = vec![0.0f32; channels];
        let mut accum = vec![0.0f32; channels];
        let mut contrib = 0.0f32;

        let offsets = sample_offsets();
        for i in 0..options.samples as usize {
            let (x, y) = if i == 0 {
                (0.5, 0.5)
            } else {
                let pair = offsets[(i - 1) % offsets.len()];
                (pair[0], pair[1])
            };

            let weight = filter.eval(x - 0.5, y - 0.5, 1.0, 1.0);
            if weight < options.pixel_variance {
                continue;
            }

            let top = directions[0].lerp(directions[1], x);
            let bottom = directions[2].lerp(directions[3], x);
            let direction = top.lerp(bottom, y);

            let Some((side, u, v)) = Self::face_uv(direction) else {
                continue;
            };

            let u = u.clamp(dfov_u, 1.0);
            let v = v.clamp(dfov_v, 1.0);
            let u = (SIDES[side][0] + u / 3.0).clamp(0.0, 1.0);
            let v = (SIDES[side][1] + v / 2.0).clamp(0.0, 1.0);

            if !self.map.bilinear(
                memory,
                stats,
                u,
                v,
                choice.u_size,
                choice.v_size,
                choice.level,
                &mut level_a,
            ) {
                out.fill(0.0);
                return;
            }
            if lerp {
                self.map.bilinear(
                    memory,
                    stats,
                    u,
                    v,
                    choice.u_size / 2,
                    choice.v_size / 2,
                    choice.level + 1,
                    &mut level_b,
                );
            }

            contrib += weight;
            for c in 0..channels {
                let value = if lerp {
                    level_a[c] + choice.interp * (level_b[c] - level_a[c])
                } else {
                    level_a[c]
                };
                accum[c] += weight * value;
            }
        }

        if contrib > 0.0 {
            for c in 0..channels {
                out[c] = accum[c] / contrib;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dominant_axis_dispatch() {
        let (side, u, v) = EnvironmentMap::face_uv(Vec3::new(1.0, 0.0, 0.0)).unwrap();
        assert_eq!(side, 0);
        assert!((u - 0.5).abs() < 1e-6 && (v - 0.5).abs() < 1e-6);

        let (side, _, _) = EnvironmentMap::face_uv(Vec3::new(0.0, -2.0, 1.0)).unwrap();
        assert_eq!(side, 3);

        let (side, _, _) = EnvironmentMap::face_uv(Vec3::new(0.1, 0.2, -3.0)).unwrap();
        assert_eq!(side, 5);

        assert!(EnvironmentMap::face_uv(Vec3::ZERO).is_none());
    }

    #[test]
    fn face_centres_map_into_their_cells() {
        // +z face centre lands in the third cell of the top row.
        let (side, u, v) = EnvironmentMap::face_uv(Vec3::new(0.0, 0.0, 1.0)).unwrap();
        let s = SIDES[side][0] + u / 3.0;
        let t = SIDES[side][1] + v / 2.0;
        assert!((s - (2.0 / 3.0 + 1.0 / 6.0)).abs() < 1e-6);
        assert!((t - 0.25).abs() < 1e-6);
    }
}
