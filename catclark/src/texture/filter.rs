//! Reconstruction filters for texture sampling and MIPMAP
//! construction.
//!
//! The filter is selected by name from the texture's wrap-mode string
//! or a shader parameter; an unknown name falls back to the box
//! filter with a warning at the lookup site.  All filters are
//! evaluated as `f(x, y, x_width, y_width)` over a footprint centred
//! on the origin.

use std::f32::consts::PI;

/// A reconstruction filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filter {
    /// Unit response inside the footprint.
    #[default]
    Box,
    /// `exp(-2 d^2)` with the footprint normalised to `[-1, 1]`.
    Gaussian,
    /// Mitchell-Netravali cubic.
    Mitchell,
    /// Linear falloff from the centre.
    Triangle,
    /// Catmull-Rom cubic spline on the radial distance.
    CatmullRom,
    /// Cosine-windowed sinc, separable.
    Sinc,
    /// Unit response inside the elliptical footprint.
    Disk,
    /// Cosine-windowed Bessel (the disk's frequency response).
    Bessel,
}

impl Filter {
    /// Look up a filter by its interface name.  Returns `None` for an
    /// unknown name; callers fall back to [`Filter::Box`].
    pub fn from_name(name: &str) -> Option<Filter> {
        match name {
            "box" => Some(Filter::Box),
            "gaussian" => Some(Filter::Gaussian),
            "mitchell" => Some(Filter::Mitchell),
            "triangle" => Some(Filter::Triangle),
            "catmull-rom" => Some(Filter::CatmullRom),
            "sinc" => Some(Filter::Sinc),
            "disk" => Some(Filter::Disk),
            "bessel" => Some(Filter::Bessel),
            _ => None,
        }
    }

    /// The interface name of the filter.
    pub fn name(self) -> &'static str {
        match self {
            Filter::Box => "box",
            Filter::Gaussian => "gaussian",
            Filter::Mitchell => "mitchell",
            Filter::Triangle => "triangle",
            Filter::CatmullRom => "catmull-rom",
            Filter::Sinc => "sinc",
            Filter::Disk => "disk",
            Filter::Bessel => "bessel",
        }
    }

    /// Evaluate the filter at `(x, y)` for a footprint of
    /// `x_width` by `y_width`.
    pub fn eval(self, x: f32, y: f32, x_width: f32, y_width: f32) -> f32 {
        match self {
            Filter::Box => {
                let fx: f32 = if x.abs() <= x_width / 2.0 { 1.0 } else { 0.0 };
                let fy: f32 = if y.abs() <= y_width / 2.0 { 1.0 } else { 0.0 };
                fx.min(fy)
            }
            Filter::Gaussian => {
                let x = x * 2.0 / x_width;
                let y = y * 2.0 / y_width;
                (-2.0 * (x * x + y * y)).exp()
            }
            Filter::Mitchell => {
                mitchell_1d(2.0 * x / x_width) * mitchell_1d(2.0 * y / y_width)
            }
            Filter::Triangle => {
                let hx = x_width / 2.0;
                let hy = y_width / 2.0;
                let fx = if x.abs() <= hx { (hx - x.abs()) / hx } else { 0.0 };
                let fy = if y.abs() <= hy { (hy - y.abs()) / hy } else { 0.0 };
                fx.min(fy)
            }
            Filter::CatmullRom => {
                // Radial Catmull-Rom: (3/2)|d|^3 - (5/2)d^2 + 1 inside
                // the unit radius, (-1/2)|d|^3 + (5/2)d^2 - 4|d| + 2
                // out to two.
                let d2 = x * x + y * y;
                let d = d2.sqrt();
                if d < 1.0 {
                    1.5 * d * d2 - 2.5 * d2 + 1.0
                } else if d < 2.0 {
                    -0.5 * d * d2 + 2.5 * d2 - 4.0 * d + 2.0
                } else {
                    0.0
                }
            }
            Filter::Sinc => {
                // Windowed with the positive lobe of a cosine, per
                // axis.
                let fx = if x != 0.0 {
                    let x = x * PI;
                    (0.5 * x / x_width).cos() * x.sin() / x
                } else {
                    1.0
                };
                let fy = if y != 0.0 {
                    let y = y * PI;
                    (0.5 * y / y_width).cos() * y.sin() / y
                } else {
                    1.0
                };
                fx * fy
            }
            Filter::Disk => {
                let hx = x_width * 0.5;
                let hy = y_width * 0.5;
                let d = (x * x) / (hx * hx) + (y * y) / (hy * hy);
                if d < 1.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Filter::Bessel => {
                let hx = x_width * 0.5;
                let hy = y_width * 0.5;
                let w = (x * x) / (hx * hx) + (y * y) / (hy * hy);
                if w < 1.0 {
                    let d = (x * x + y * y).sqrt();
                    if d != 0.0 {
                        // Half cosine window.
                        (0.5 * PI * w.sqrt()).cos() * 2.0 * bessel_j1(PI * d) / d
                    } else {
                        PI
                    }
                } else {
                    0.0
                }
            }
        }
    }
}

/// Mitchell-Netravali cubic with B = 1/3, C = 2/3, on the normalised
/// distance.
fn mitchell_1d(d: f32) -> f32 {
    const B: f32 = 1.0 / 3.0;
    const C: f32 = 2.0 / 3.0;
    let d = d.abs();
    let d2 = d * d;
    let d3 = d2 * d;
    if d < 1.0 {
        ((12.0 - 9.0 * B - 6.0 * C) * d3
            + (-18.0 + 12.0 * B + 6.0 * C) * d2
            + (6.0 - 2.0 * B))
            / 6.0
    } else if d < 2.0 {
        ((-B - 6.0 * C) * d3
            + (6.0 * B + 30.0 * C) * d2
            + (-12.0 * B - 48.0 * C) * d
            + (8.0 * B + 24.0 * C))
            / 6.0
    } else {
        0.0
    }
}

/// Bessel function of the first kind, order one, by the usual
/// rational approximations (Abramowitz & Stegun 9.4).
fn bessel_j1(x: f32) -> f32 {
    let ax = x.abs() as f64;
    let result = if ax < 8.0 {
        let y = (x as f64) * (x as f64);
        let p1 = (x as f64)
            * (72362614232.0
                + y * (-7895059235.0
                    + y * (242396853.1 + y * (-2972611.439 + y * (15704.4826 + y * -30.16036606)))));
        let p2 = 144725228442.0
            + y * (2300535178.0
                + y * (18583304.74 + y * (99447.43394 + y * (376.9991397 + y))));
        p1 / p2
    } else {
        let z = 8.0 / ax;
        let y = z * z;
        let xx = ax - 2.356194491;
        let p1 = 1.0
            + y * (0.183105e-2
                + y * (-0.3516396496e-4 + y * (0.2457520174e-5 + y * -0.240337019e-6)));
        let p2 = 0.04687499995
            + y * (-0.2002690873e-3
                + y * (0.8449199096e-5 + y * (-0.88228987e-6 + y * 0.105787412e-6)));
        let result = (0.636619772 / ax).sqrt() * (xx.cos() * p1 - z * xx.sin() * p2);
        if (x as f64) < 0.0 {
            -result
        } else {
            result
        }
    };
    result as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_name_is_none() {
        assert!(Filter::from_name("lanczos").is_none());
        assert_eq!(Filter::from_name("catmull-rom"), Some(Filter::CatmullRom));
    }

    #[test]
    fn box_covers_footprint() {
        let f = Filter::Box;
        assert_eq!(f.eval(0.0, 0.0, 1.0, 1.0), 1.0);
        assert_eq!(f.eval(0.49, -0.49, 1.0, 1.0), 1.0);
        assert_eq!(f.eval(0.51, 0.0, 1.0, 1.0), 0.0);
    }

    #[test]
    fn gaussian_peaks_at_centre() {
        let f = Filter::Gaussian;
        let centre = f.eval(0.0, 0.0, 2.0, 2.0);
        let edge = f.eval(1.0, 0.0, 2.0, 2.0);
        assert_eq!(centre, 1.0);
        assert!(edge < centre && edge > 0.0);
    }

    #[test]
    fn bessel_j1_small_argument() {
        // j1(x) ~ x/2 for small x.
        assert!((bessel_j1(0.1) - 0.04993753).abs() < 1e-5);
    }
}
