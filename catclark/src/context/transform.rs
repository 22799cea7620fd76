//! Keyframed transforms for motion blocks.

use glam::Mat4;

/// An object-to-world transform, possibly keyframed over the shutter.
///
/// A static transform holds one sample; a motion block holds one per
/// declared time.  Lookups between keys interpolate the matrices
/// linearly, which is what a renderer wants for bounding and dicing
/// (exact rigid-motion interpolation is the concern of the sampler,
/// not of this container).
#[derive(Debug, Clone)]
pub struct Transform {
    samples: Vec<(f32, Mat4)>,
}

impl Transform {
    /// A static transform.
    pub fn new(object_to_world: Mat4) -> Self {
        Transform {
            samples: vec![(0.0, object_to_world)],
        }
    }

    /// An identity transform.
    pub fn identity() -> Self {
        Self::new(Mat4::IDENTITY)
    }

    /// A keyframed transform.  `samples` must be non-empty and sorted
    /// by time.
    pub fn keyframed(samples: Vec<(f32, Mat4)>) -> Self {
        debug_assert!(!samples.is_empty());
        Transform { samples }
    }

    /// Number of time samples.
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Time of sample `index`.
    pub fn time(&self, index: usize) -> f32 {
        self.samples[index].0
    }

    /// The object-to-world matrix at the given time, interpolating
    /// between keys and clamping outside the keyed range.
    pub fn object_to_world(&self, time: f32) -> Mat4 {
        let first = &self.samples[0];
        if self.samples.len() == 1 || time <= first.0 {
            return first.1;
        }
        for pair in self.samples.windows(2) {
            let (t0, m0) = pair[0];
            let (t1, m1) = pair[1];
            if time <= t1 {
                let f = if t1 > t0 { (time - t0) / (t1 - t0) } else { 0.0 };
                return lerp_matrix(m0, m1, f);
            }
        }
        self.samples[self.samples.len() - 1].1
    }
}

fn lerp_matrix(a: Mat4, b: Mat4, f: f32) -> Mat4 {
    Mat4::from_cols(
        a.col(0).lerp(b.col(0), f),
        a.col(1).lerp(b.col(1), f),
        a.col(2).lerp(b.col(2), f),
        a.col(3).lerp(b.col(3), f),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn keyframes_interpolate_and_clamp() {
        let t = Transform::keyframed(vec![
            (0.0, Mat4::from_translation(Vec3::new(0.0, 0.0, 0.0))),
            (1.0, Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0))),
        ]);
        let mid = t.object_to_world(0.5).project_point3(Vec3::ZERO);
        assert!((mid.x - 1.0).abs() < 1e-6);
        let before = t.object_to_world(-1.0).project_point3(Vec3::ZERO);
        assert_eq!(before.x, 0.0);
        let after = t.object_to_world(2.0).project_point3(Vec3::ZERO);
        assert_eq!(after.x, 2.0);
    }
}
