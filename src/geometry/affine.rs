//! 2-D affine transforms stored as six row-major coefficients.
//!
//! The layout matches the persisted record format:
//! `x' = t0*x + t1*y + t2`, `y' = t3*x + t4*y + t5`.

use serde::{Deserialize, Serialize};

use super::point::Point;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Affine {
    pub t: [f64; 6],
}

impl Default for Affine {
    fn default() -> Self {
        Self::identity()
    }
}

impl Affine {
    pub fn identity() -> Self {
        Self {
            t: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        }
    }

    /// Pure rotation by `rad` about the origin.
    pub fn rotation(rad: f64) -> Self {
        let (s, c) = rad.sin_cos();
        Self {
            t: [c, -s, 0.0, s, c, 0.0],
        }
    }

    /// Rotation composed with a translation.
    pub fn rotation_with_translation(rad: f64, x: f64, y: f64) -> Self {
        let mut a = Self::rotation(rad);
        a.set_xy(x, y);
        a
    }

    pub fn from_coeffs(t: [f64; 6]) -> Self {
        Self { t }
    }

    /// Apply the full transform to a point.
    pub fn transform(&self, p: Point) -> Point {
        Point::new(
            self.t[0] * p.x + self.t[1] * p.y + self.t[2],
            self.t[3] * p.x + self.t[4] * p.y + self.t[5],
        )
    }

    /// Apply only the linear (rotation/scale/skew) part.
    pub fn apply_r_part(&self, p: Point) -> Point {
        Point::new(
            self.t[0] * p.x + self.t[1] * p.y,
            self.t[3] * p.x + self.t[4] * p.y,
        )
    }

    pub fn xy(&self) -> (f64, f64) {
        (self.t[2], self.t[5])
    }

    pub fn set_xy(&mut self, x: f64, y: f64) {
        self.t[2] = x;
        self.t[5] = y;
    }

    /// Scale the translation part only.
    pub fn mul_xy(&mut self, s: f64) {
        self.t[2] *= s;
        self.t[5] *= s;
    }

    /// Replace the linear part by a pure rotation, preserving translation.
    pub fn nu_set_rot(&mut self, rad: f64) {
        let (x, y) = self.xy();
        *self = Self::rotation(rad);
        self.set_xy(x, y);
    }

    /// Effective rotation angle of the linear part, in radians.
    pub fn rotation_radians(&self) -> f64 {
        self.t[3].atan2(self.t[0])
    }

    /// `self ∘ rhs`: the transform applying `rhs` first, then `self`.
    pub fn compose(&self, rhs: &Affine) -> Affine {
        let a = &self.t;
        let b = &rhs.t;
        Affine {
            t: [
                a[0] * b[0] + a[1] * b[3],
                a[0] * b[1] + a[1] * b[4],
                a[0] * b[2] + a[1] * b[5] + a[2],
                a[3] * b[0] + a[4] * b[3],
                a[3] * b[1] + a[4] * b[4],
                a[3] * b[2] + a[4] * b[5] + a[5],
            ],
        }
    }

    /// Inverse transform. The linear part must be non-singular.
    pub fn invert(&self) -> Affine {
        let t = &self.t;
        let det = t[0] * t[4] - t[1] * t[3];
        let i0 = t[4] / det;
        let i1 = -t[1] / det;
        let i3 = -t[3] / det;
        let i4 = t[0] / det;
        Affine {
            t: [
                i0,
                i1,
                -(i0 * t[2] + i1 * t[5]),
                i3,
                i4,
                -(i3 * t[2] + i4 * t[5]),
            ],
        }
    }
}

impl std::fmt::Display for Affine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let t = &self.t;
        write!(
            f,
            "[{:.6} {:.6} {:.3} / {:.6} {:.6} {:.3}]",
            t[0], t[1], t[2], t[3], t[4], t[5]
        )
    }
}
