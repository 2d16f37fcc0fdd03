// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Matrix decomposition used for transform interpolation.

use super::Transform3d;
#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

/// A 4×4 transform split into translate, scale, skew, perspective and
/// rotation (as a unit quaternion).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Decomposed3d {
    /// Translation along X, Y and Z.
    pub translate: [f64; 3],
    /// Scale along X, Y and Z.
    pub scale: [f64; 3],
    /// Skew factors `[xy, xz, yz]`.
    pub skew: [f64; 3],
    /// Perspective row.
    pub perspective: [f64; 4],
    /// Rotation quaternion `[x, y, z, w]`.
    pub quaternion: [f64; 4],
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn length(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

fn normalize(a: [f64; 3]) -> [f64; 3] {
    let len = length(a);
    if len == 0.0 {
        a
    } else {
        [a[0] / len, a[1] / len, a[2] / len]
    }
}

/// `a * sa + b * sb`
fn combine(a: [f64; 3], b: [f64; 3], sa: f64, sb: f64) -> [f64; 3] {
    [
        a[0] * sa + b[0] * sb,
        a[1] * sa + b[1] * sb,
        a[2] * sa + b[2] * sb,
    ]
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

impl Decomposed3d {
    /// Decomposes `matrix`, or returns `None` if it is singular.
    #[must_use]
    pub fn decompose(matrix: &Transform3d) -> Option<Self> {
        let mut m = matrix.cols;
        if m[3][3] == 0.0 {
            return None;
        }
        let w = m[3][3];
        for col in &mut m {
            for v in col.iter_mut() {
                *v /= w;
            }
        }

        // Perspective-free copy for the singularity check.
        let mut pm = m;
        for col in &mut pm[..3] {
            col[3] = 0.0;
        }
        pm[3][3] = 1.0;
        if Transform3d { cols: pm }.determinant() == 0.0 {
            return None;
        }

        let perspective = if m[0][3] != 0.0 || m[1][3] != 0.0 || m[2][3] != 0.0 {
            let rhs = [m[0][3], m[1][3], m[2][3], m[3][3]];
            let inverse_transposed = Transform3d { cols: pm }.inverse().map(transpose)?;
            let t = inverse_transposed.cols;
            let mut out = [0.0; 4];
            for (i, o) in out.iter_mut().enumerate() {
                *o = t[0][i] * rhs[0] + t[1][i] * rhs[1] + t[2][i] * rhs[2] + t[3][i] * rhs[3];
            }
            out
        } else {
            [0.0, 0.0, 0.0, 1.0]
        };

        let translate = [m[3][0], m[3][1], m[3][2]];

        let mut row = [
            [m[0][0], m[0][1], m[0][2]],
            [m[1][0], m[1][1], m[1][2]],
            [m[2][0], m[2][1], m[2][2]],
        ];

        let mut scale = [0.0; 3];
        let mut skew = [0.0; 3];

        scale[0] = length(row[0]);
        row[0] = normalize(row[0]);

        skew[0] = dot(row[0], row[1]);
        row[1] = combine(row[1], row[0], 1.0, -skew[0]);

        scale[1] = length(row[1]);
        row[1] = normalize(row[1]);
        if scale[1] != 0.0 {
            skew[0] /= scale[1];
        }

        skew[1] = dot(row[0], row[2]);
        row[2] = combine(row[2], row[0], 1.0, -skew[1]);
        skew[2] = dot(row[1], row[2]);
        row[2] = combine(row[2], row[1], 1.0, -skew[2]);

        scale[2] = length(row[2]);
        row[2] = normalize(row[2]);
        if scale[2] != 0.0 {
            skew[1] /= scale[2];
            skew[2] /= scale[2];
        }

        // A negative determinant means the coordinate system flipped.
        if dot(row[0], cross(row[1], row[2])) < 0.0 {
            for i in 0..3 {
                scale[i] = -scale[i];
                row[i] = [-row[i][0], -row[i][1], -row[i][2]];
            }
        }

        let mut quaternion = [
            0.5 * (1.0 + row[0][0] - row[1][1] - row[2][2]).max(0.0).sqrt(),
            0.5 * (1.0 - row[0][0] + row[1][1] - row[2][2]).max(0.0).sqrt(),
            0.5 * (1.0 - row[0][0] - row[1][1] + row[2][2]).max(0.0).sqrt(),
            0.5 * (1.0 + row[0][0] + row[1][1] + row[2][2]).max(0.0).sqrt(),
        ];
        if row[2][1] < row[1][2] {
            quaternion[0] = -quaternion[0];
        }
        if row[0][2] < row[2][0] {
            quaternion[1] = -quaternion[1];
        }
        if row[1][0] < row[0][1] {
            quaternion[2] = -quaternion[2];
        }

        Some(Self {
            translate,
            scale,
            skew,
            perspective,
            quaternion,
        })
    }

    /// Interpolates component-wise towards `other`, slerping the rotation.
    #[must_use]
    pub fn interpolate(&self, other: &Self, progress: f64) -> Self {
        let mut out = *self;
        for i in 0..3 {
            out.translate[i] = lerp(self.translate[i], other.translate[i], progress);
            out.scale[i] = lerp(self.scale[i], other.scale[i], progress);
            out.skew[i] = lerp(self.skew[i], other.skew[i], progress);
        }
        for i in 0..4 {
            out.perspective[i] = lerp(self.perspective[i], other.perspective[i], progress);
        }
        out.quaternion = slerp(self.quaternion, other.quaternion, progress);
        out
    }

    /// Rebuilds the matrix from its components.
    #[must_use]
    pub fn recompose(&self) -> Transform3d {
        let mut m = Transform3d::IDENTITY.cols;
        for (i, col) in m.iter_mut().enumerate() {
            col[3] = self.perspective[i];
        }
        for i in 0..3 {
            for j in 0..3 {
                m[3][i] += self.translate[j] * m[j][i];
            }
        }
        let mut out = Transform3d { cols: m };

        let [x, y, z, w] = self.quaternion;
        let mut rotation = Transform3d::IDENTITY;
        rotation.cols[0][0] = 1.0 - 2.0 * (y * y + z * z);
        rotation.cols[0][1] = 2.0 * (x * y - z * w);
        rotation.cols[0][2] = 2.0 * (x * z + y * w);
        rotation.cols[1][0] = 2.0 * (x * y + z * w);
        rotation.cols[1][1] = 1.0 - 2.0 * (x * x + z * z);
        rotation.cols[1][2] = 2.0 * (y * z - x * w);
        rotation.cols[2][0] = 2.0 * (x * z - y * w);
        rotation.cols[2][1] = 2.0 * (y * z + x * w);
        rotation.cols[2][2] = 1.0 - 2.0 * (x * x + y * y);
        out = out * rotation;

        if self.skew[2] != 0.0 {
            let mut skew = Transform3d::IDENTITY;
            skew.cols[2][1] = self.skew[2];
            out = out * skew;
        }
        if self.skew[1] != 0.0 {
            let mut skew = Transform3d::IDENTITY;
            skew.cols[2][0] = self.skew[1];
            out = out * skew;
        }
        if self.skew[0] != 0.0 {
            let mut skew = Transform3d::IDENTITY;
            skew.cols[1][0] = self.skew[0];
            out = out * skew;
        }

        for i in 0..3 {
            for v in &mut out.cols[i] {
                *v *= self.scale[i];
            }
        }
        out
    }
}

fn transpose(t: Transform3d) -> Transform3d {
    let mut out = [[0.0; 4]; 4];
    for (i, col) in t.cols.iter().enumerate() {
        for (j, v) in col.iter().enumerate() {
            out[j][i] = *v;
        }
    }
    Transform3d { cols: out }
}

fn slerp(a: [f64; 4], b: [f64; 4], t: f64) -> [f64; 4] {
    let mut product = a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3];
    product = product.clamp(-1.0, 1.0);
    let denom = (1.0 - product * product).sqrt();
    if denom < f64::EPSILON {
        return a;
    }
    let theta = product.acos();
    let w = (t * theta).sin() / denom;
    let a_scale = (t * theta).cos() - product * w;
    [
        a[0] * a_scale + b[0] * w,
        a[1] * a_scale + b[1] * w,
        a[2] * a_scale + b[2] * w,
        a[3] * a_scale + b[3] * w,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_composite() {
        let t = Transform3d::from_translation(3.0, -2.0, 5.0)
            * Transform3d::from_rotation(0.0, 1.0, 1.0, 0.6)
            * Transform3d::from_scale(2.0, 3.0, 0.5);
        let d = Decomposed3d::decompose(&t).expect("decomposable");
        assert!(d.recompose().approx_eq(&t, 1e-9), "{:?}", d.recompose());
    }

    #[test]
    fn skew_round_trip() {
        let t = Transform3d::from_skew(0.3, 0.0);
        let d = Decomposed3d::decompose(&t).expect("decomposable");
        assert!(d.recompose().approx_eq(&t, 1e-9));
    }

    #[test]
    fn singular_fails() {
        let t = Transform3d::from_scale(1.0, 0.0, 1.0);
        assert!(Decomposed3d::decompose(&t).is_none());
    }

    #[test]
    fn translation_interpolates_linearly() {
        let a = Decomposed3d::decompose(&Transform3d::IDENTITY).expect("identity");
        let b = Decomposed3d::decompose(&Transform3d::from_translation(10.0, 20.0, 0.0))
            .expect("translation");
        let mid = a.interpolate(&b, 0.25).recompose();
        assert!(mid.approx_eq(&Transform3d::from_translation(2.5, 5.0, 0.0), 1e-9));
    }
}
