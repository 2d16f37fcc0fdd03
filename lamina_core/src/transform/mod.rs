// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Column-major 4×4 transform with the 3-D operations a compositor needs.
//!
//! Element naming follows the usual `mCR` convention where `C` is the
//! 1-based column and `R` the 1-based row, so `m41`/`m42`/`m43` hold the
//! translation and `m34` holds the perspective term.

mod decompose;

pub use decompose::Decomposed3d;

use core::ops::Mul;
#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use kurbo::{Point, Rect};

/// Determinants smaller than this are treated as singular.
const SINGULAR_EPSILON: f64 = 1e-12;

/// A column-major 4×4 transform stored as `[[f64; 4]; 4]`.
///
/// Each inner array is one *column* of the matrix. Points are column
/// vectors, so `a * b` applies `b` first.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform3d {
    /// Four columns, each a 4-element array `[x, y, z, w]`.
    pub cols: [[f64; 4]; 4],
}

impl Transform3d {
    /// The 4×4 identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Creates a transform from four column arrays.
    #[inline]
    #[must_use]
    pub const fn from_cols(col0: [f64; 4], col1: [f64; 4], col2: [f64; 4], col3: [f64; 4]) -> Self {
        Self {
            cols: [col0, col1, col2, col3],
        }
    }

    /// Creates a 2-D affine transform from the `a b c d e f` coefficients.
    #[inline]
    #[must_use]
    pub const fn from_affine(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self {
            cols: [
                [a, b, 0.0, 0.0],
                [c, d, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [e, f, 0.0, 1.0],
            ],
        }
    }

    /// Returns column `i` (0-based).
    ///
    /// # Panics
    ///
    /// Panics if `i >= 4`.
    #[inline]
    #[must_use]
    pub const fn col(self, i: usize) -> [f64; 4] {
        self.cols[i]
    }

    /// Creates a pure translation transform.
    #[inline]
    #[must_use]
    pub const fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self {
            cols: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [x, y, z, 1.0],
            ],
        }
    }

    /// Creates a non-uniform scale transform.
    #[inline]
    #[must_use]
    pub const fn from_scale(sx: f64, sy: f64, sz: f64) -> Self {
        Self {
            cols: [
                [sx, 0.0, 0.0, 0.0],
                [0.0, sy, 0.0, 0.0],
                [0.0, 0.0, sz, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Creates a rotation around the Z axis (radians).
    #[inline]
    #[must_use]
    pub fn from_rotation_z(radians: f64) -> Self {
        let (s, c) = (radians.sin(), radians.cos());
        Self {
            cols: [
                [c, s, 0.0, 0.0],
                [-s, c, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Creates a rotation of `radians` around the axis `(x, y, z)`.
    ///
    /// A zero-length axis yields the identity.
    #[must_use]
    pub fn from_rotation(x: f64, y: f64, z: f64, radians: f64) -> Self {
        let len = (x * x + y * y + z * z).sqrt();
        if len == 0.0 {
            return Self::IDENTITY;
        }
        let (x, y, z) = (x / len, y / len, z / len);
        if x == 0.0 && y == 0.0 {
            return Self::from_rotation_z(if z < 0.0 { -radians } else { radians });
        }
        let (s, c) = (radians.sin(), radians.cos());
        let t = 1.0 - c;
        Self {
            cols: [
                [t * x * x + c, t * x * y + s * z, t * x * z - s * y, 0.0],
                [t * x * y - s * z, t * y * y + c, t * y * z + s * x, 0.0],
                [t * x * z + s * y, t * y * z - s * x, t * z * z + c, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Creates a skew transform from X and Y skew angles (radians).
    #[inline]
    #[must_use]
    pub fn from_skew(ax: f64, ay: f64) -> Self {
        Self::from_affine(1.0, ay.tan(), ax.tan(), 1.0, 0.0, 0.0)
    }

    /// Creates a perspective projection with eye distance `distance`.
    ///
    /// A zero distance yields the identity.
    #[inline]
    #[must_use]
    pub fn from_perspective(distance: f64) -> Self {
        let mut out = Self::IDENTITY;
        if distance != 0.0 {
            out.cols[2][3] = -1.0 / distance;
        }
        out
    }

    /// Maps rectangle `from` onto rectangle `to` with a scale and translation.
    #[must_use]
    pub fn rect_to_rect(from: Rect, to: Rect) -> Self {
        let sx = if from.width() == 0.0 {
            1.0
        } else {
            to.width() / from.width()
        };
        let sy = if from.height() == 0.0 {
            1.0
        } else {
            to.height() / from.height()
        };
        Self::from_affine(sx, 0.0, 0.0, sy, to.x0 - from.x0 * sx, to.y0 - from.y0 * sy)
    }

    /// Returns `self * translation(x, y, z)`.
    #[inline]
    #[must_use]
    pub fn pre_translate(self, x: f64, y: f64, z: f64) -> Self {
        self * Self::from_translation(x, y, z)
    }

    /// Returns `translation(x, y, z) * self`.
    #[inline]
    #[must_use]
    pub fn then_translate(self, x: f64, y: f64, z: f64) -> Self {
        Self::from_translation(x, y, z) * self
    }

    /// The perspective term `m34`.
    #[inline]
    #[must_use]
    pub const fn m34(&self) -> f64 {
        self.cols[2][3]
    }

    /// The depth scale term `m33`.
    #[inline]
    #[must_use]
    pub const fn m33(&self) -> f64 {
        self.cols[2][2]
    }

    /// Returns `true` if this is exactly the identity.
    #[inline]
    #[must_use]
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Returns `true` if the transform has no Z or perspective components.
    #[must_use]
    pub fn is_affine(&self) -> bool {
        let c = &self.cols;
        c[0][2] == 0.0
            && c[0][3] == 0.0
            && c[1][2] == 0.0
            && c[1][3] == 0.0
            && c[2][0] == 0.0
            && c[2][1] == 0.0
            && c[2][2] == 1.0
            && c[2][3] == 0.0
            && c[3][2] == 0.0
            && c[3][3] == 1.0
    }

    /// Returns the determinant of the full 4×4 matrix.
    #[must_use]
    pub fn determinant(&self) -> f64 {
        let m = &self.cols;
        let s0 = m[0][0] * m[1][1] - m[1][0] * m[0][1];
        let s1 = m[0][0] * m[1][2] - m[1][0] * m[0][2];
        let s2 = m[0][0] * m[1][3] - m[1][0] * m[0][3];
        let s3 = m[0][1] * m[1][2] - m[1][1] * m[0][2];
        let s4 = m[0][1] * m[1][3] - m[1][1] * m[0][3];
        let s5 = m[0][2] * m[1][3] - m[1][2] * m[0][3];
        let c5 = m[2][2] * m[3][3] - m[3][2] * m[2][3];
        let c4 = m[2][1] * m[3][3] - m[3][1] * m[2][3];
        let c3 = m[2][1] * m[3][2] - m[3][1] * m[2][2];
        let c2 = m[2][0] * m[3][3] - m[3][0] * m[2][3];
        let c1 = m[2][0] * m[3][2] - m[3][0] * m[2][2];
        let c0 = m[2][0] * m[3][1] - m[3][0] * m[2][1];
        s0 * c5 - s1 * c4 + s2 * c3 + s3 * c2 - s4 * c1 + s5 * c0
    }

    /// Returns `true` if the matrix can be inverted.
    #[inline]
    #[must_use]
    pub fn is_invertible(&self) -> bool {
        self.determinant().abs() > SINGULAR_EPSILON
    }

    /// Returns the inverse, or `None` if the matrix is singular.
    #[must_use]
    pub fn inverse(&self) -> Option<Self> {
        let m = &self.cols;
        let s0 = m[0][0] * m[1][1] - m[1][0] * m[0][1];
        let s1 = m[0][0] * m[1][2] - m[1][0] * m[0][2];
        let s2 = m[0][0] * m[1][3] - m[1][0] * m[0][3];
        let s3 = m[0][1] * m[1][2] - m[1][1] * m[0][2];
        let s4 = m[0][1] * m[1][3] - m[1][1] * m[0][3];
        let s5 = m[0][2] * m[1][3] - m[1][2] * m[0][3];
        let c5 = m[2][2] * m[3][3] - m[3][2] * m[2][3];
        let c4 = m[2][1] * m[3][3] - m[3][1] * m[2][3];
        let c3 = m[2][1] * m[3][2] - m[3][1] * m[2][2];
        let c2 = m[2][0] * m[3][3] - m[3][0] * m[2][3];
        let c1 = m[2][0] * m[3][2] - m[3][0] * m[2][2];
        let c0 = m[2][0] * m[3][1] - m[3][0] * m[2][1];
        let det = s0 * c5 - s1 * c4 + s2 * c3 + s3 * c2 - s4 * c1 + s5 * c0;
        if det.abs() <= SINGULAR_EPSILON || !det.is_finite() {
            return None;
        }
        let inv = 1.0 / det;
        let mut out = [[0.0_f64; 4]; 4];
        out[0][0] = (m[1][1] * c5 - m[1][2] * c4 + m[1][3] * c3) * inv;
        out[0][1] = (-m[0][1] * c5 + m[0][2] * c4 - m[0][3] * c3) * inv;
        out[0][2] = (m[3][1] * s5 - m[3][2] * s4 + m[3][3] * s3) * inv;
        out[0][3] = (-m[2][1] * s5 + m[2][2] * s4 - m[2][3] * s3) * inv;
        out[1][0] = (-m[1][0] * c5 + m[1][2] * c2 - m[1][3] * c1) * inv;
        out[1][1] = (m[0][0] * c5 - m[0][2] * c2 + m[0][3] * c1) * inv;
        out[1][2] = (-m[3][0] * s5 + m[3][2] * s2 - m[3][3] * s1) * inv;
        out[1][3] = (m[2][0] * s5 - m[2][2] * s2 + m[2][3] * s1) * inv;
        out[2][0] = (m[1][0] * c4 - m[1][1] * c2 + m[1][3] * c0) * inv;
        out[2][1] = (-m[0][0] * c4 + m[0][1] * c2 - m[0][3] * c0) * inv;
        out[2][2] = (m[3][0] * s4 - m[3][1] * s2 + m[3][3] * s0) * inv;
        out[2][3] = (-m[2][0] * s4 + m[2][1] * s2 - m[2][3] * s0) * inv;
        out[3][0] = (-m[1][0] * c3 + m[1][1] * c1 - m[1][2] * c0) * inv;
        out[3][1] = (m[0][0] * c3 - m[0][1] * c1 + m[0][2] * c0) * inv;
        out[3][2] = (-m[3][0] * s3 + m[3][1] * s1 - m[3][2] * s0) * inv;
        out[3][3] = (m[2][0] * s3 - m[2][1] * s1 + m[2][2] * s0) * inv;
        Some(Self { cols: out })
    }

    /// Collapses the transform onto the Z = 0 plane.
    ///
    /// X/Y translation, the 2-D linear part and the perspective terms for
    /// X/Y survive; everything that feeds or reads Z is cleared.
    #[must_use]
    pub fn flatten(mut self) -> Self {
        self.cols[0][2] = 0.0;
        self.cols[1][2] = 0.0;
        self.cols[2][0] = 0.0;
        self.cols[2][1] = 0.0;
        self.cols[2][2] = 1.0;
        self.cols[2][3] = 0.0;
        self.cols[3][2] = 0.0;
        self
    }

    /// Maps a 3-D point, dividing by `w` when it is not 1.
    #[must_use]
    pub fn map_point3(&self, p: [f64; 3]) -> [f64; 3] {
        let c = &self.cols;
        let x = c[0][0] * p[0] + c[1][0] * p[1] + c[2][0] * p[2] + c[3][0];
        let y = c[0][1] * p[0] + c[1][1] * p[1] + c[2][1] * p[2] + c[3][1];
        let z = c[0][2] * p[0] + c[1][2] * p[1] + c[2][2] * p[2] + c[3][2];
        let w = c[0][3] * p[0] + c[1][3] * p[1] + c[2][3] * p[2] + c[3][3];
        if w == 1.0 || w == 0.0 {
            [x, y, z]
        } else {
            [x / w, y / w, z / w]
        }
    }

    /// Maps a point on the Z = 0 plane and drops the resulting Z.
    #[inline]
    #[must_use]
    pub fn map_point(&self, p: Point) -> Point {
        let [x, y, _] = self.map_point3([p.x, p.y, 0.0]);
        Point::new(x, y)
    }

    /// Maps the four corners of `rect` and returns their bounding box.
    #[must_use]
    pub fn map_rect(&self, rect: Rect) -> Rect {
        if self.is_affine() && self.cols[0][1] == 0.0 && self.cols[1][0] == 0.0 {
            let a = self.map_point(Point::new(rect.x0, rect.y0));
            let b = self.map_point(Point::new(rect.x1, rect.y1));
            return Rect::from_points(a, b);
        }
        let corners = [
            Point::new(rect.x0, rect.y0),
            Point::new(rect.x1, rect.y0),
            Point::new(rect.x1, rect.y1),
            Point::new(rect.x0, rect.y1),
        ];
        let first = self.map_point(corners[0]);
        let mut out = Rect::from_points(first, first);
        for corner in &corners[1..] {
            let p = self.map_point(*corner);
            out = out.union_pt(p);
        }
        out
    }

    /// Projects a device-space point back onto the Z = 0 plane of the space
    /// this transform maps *to*, treating `self` as the inverse mapping.
    ///
    /// Returns `None` when the ray through the point is parallel to the
    /// plane or lands behind the eye.
    #[must_use]
    pub fn project_point(&self, p: Point) -> Option<Point> {
        let c = &self.cols;
        let m = |col: usize, row: usize| c[col][row];
        // Solve for the z where the mapped point lands on the plane.
        if m(2, 2) == 0.0 {
            return None;
        }
        let z = -(m(0, 2) * p.x + m(1, 2) * p.y + m(3, 2)) / m(2, 2);
        let x = m(0, 0) * p.x + m(1, 0) * p.y + m(2, 0) * z + m(3, 0);
        let y = m(0, 1) * p.x + m(1, 1) * p.y + m(2, 1) * z + m(3, 1);
        let w = m(0, 3) * p.x + m(1, 3) * p.y + m(2, 3) * z + m(3, 3);
        if w <= 0.0 {
            return None;
        }
        Some(Point::new(x / w, y / w))
    }

    /// Interpolates from `from` to `self` by `progress` using matrix
    /// decomposition.
    ///
    /// When either matrix cannot be decomposed the result snaps to whichever
    /// end is closer.
    #[must_use]
    pub fn blend(&self, from: &Self, progress: f64) -> Self {
        match (Decomposed3d::decompose(from), Decomposed3d::decompose(self)) {
            (Some(a), Some(b)) => a.interpolate(&b, progress).recompose(),
            _ => {
                if progress < 0.5 {
                    *from
                } else {
                    *self
                }
            }
        }
    }

    /// Is this transform [finite]?
    ///
    /// [finite]: f64::is_finite
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.cols.iter().flatten().all(|v| v.is_finite())
    }

    /// Is this transform [NaN]?
    ///
    /// [NaN]: f64::is_nan
    #[inline]
    #[must_use]
    pub fn is_nan(&self) -> bool {
        self.cols.iter().flatten().any(|v| v.is_nan())
    }

    /// Returns `true` if every element is within `eps` of `other`'s.
    #[must_use]
    pub fn approx_eq(&self, other: &Self, eps: f64) -> bool {
        self.cols
            .iter()
            .flatten()
            .zip(other.cols.iter().flatten())
            .all(|(a, b)| (a - b).abs() <= eps)
    }
}

impl Default for Transform3d {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Transform3d {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        let a = &self.cols;
        let b = &rhs.cols;
        let mut out = [[0.0_f64; 4]; 4];
        let mut j = 0;
        while j < 4 {
            let mut i = 0;
            while i < 4 {
                out[j][i] =
                    a[0][i] * b[j][0] + a[1][i] * b[j][1] + a[2][i] * b[j][2] + a[3][i] * b[j][3];
                i += 1;
            }
            j += 1;
        }
        Self { cols: out }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f64::consts::{FRAC_PI_2, PI};

    const EPS: f64 = 1e-9;

    #[test]
    fn identity_multiply() {
        let t = Transform3d::from_translation(1.0, 2.0, 3.0);
        assert_eq!(Transform3d::IDENTITY * t, t);
        assert_eq!(t * Transform3d::IDENTITY, t);
    }

    #[test]
    fn scale_then_translate() {
        let s = Transform3d::from_scale(2.0, 2.0, 2.0);
        let t = Transform3d::from_translation(3.0, 4.0, 0.0);
        let combined = t * s;
        assert_eq!(combined.col(0), [2.0, 0.0, 0.0, 0.0]);
        assert_eq!(combined.col(3), [3.0, 4.0, 0.0, 1.0]);
        let p = combined.map_point(Point::new(1.0, 1.0));
        assert_eq!(p, Point::new(5.0, 6.0));
    }

    #[test]
    fn rotation_z_ninety_degrees() {
        let r = Transform3d::from_rotation_z(FRAC_PI_2);
        let p = r.map_point(Point::new(1.0, 0.0));
        assert!(p.x.abs() < EPS, "x should vanish, got {}", p.x);
        assert!((p.y - 1.0).abs() < EPS, "y should be 1, got {}", p.y);
    }

    #[test]
    fn axis_rotation_matches_z_rotation() {
        let a = Transform3d::from_rotation(0.0, 0.0, 1.0, 0.7);
        let b = Transform3d::from_rotation(0.0, 0.0, 1.0, 0.7);
        assert!(a.approx_eq(&Transform3d::from_rotation_z(0.7), EPS));
        let tilted = Transform3d::from_rotation(1.0, 1.0, 0.0, 0.7);
        assert!(!tilted.approx_eq(&b, EPS));
        assert!((tilted.determinant() - 1.0).abs() < EPS);
    }

    #[test]
    fn inverse_round_trip() {
        let t = Transform3d::from_translation(10.0, -4.0, 2.0)
            * Transform3d::from_rotation(1.0, 2.0, 3.0, 0.4)
            * Transform3d::from_scale(2.0, 0.5, 3.0);
        let inv = t.inverse().expect("invertible");
        assert!((t * inv).approx_eq(&Transform3d::IDENTITY, 1e-9));
    }

    #[test]
    fn singular_has_no_inverse() {
        let t = Transform3d::from_scale(0.0, 1.0, 1.0);
        assert!(t.inverse().is_none());
        assert!(!t.is_invertible());
    }

    #[test]
    fn flatten_drops_z() {
        let t = Transform3d::from_rotation(1.0, 0.0, 0.0, 0.5).then_translate(1.0, 2.0, 3.0);
        let f = t.flatten();
        assert_eq!(f.cols[3][2], 0.0);
        assert_eq!(f.cols[2], [0.0, 0.0, 1.0, 0.0]);
        assert_eq!(f.cols[3][0], 1.0);
        assert_eq!(f.cols[3][1], 2.0);
    }

    #[test]
    fn map_rect_under_rotation_is_bounding_box() {
        let r = Transform3d::from_rotation_z(PI / 4.0);
        let out = r.map_rect(Rect::new(0.0, 0.0, 1.0, 1.0));
        let half_diag = core::f64::consts::SQRT_2 / 2.0;
        assert!((out.x0 + half_diag).abs() < EPS, "x0 {}", out.x0);
        assert!((out.x1 - half_diag).abs() < EPS, "x1 {}", out.x1);
        assert!((out.height() - core::f64::consts::SQRT_2).abs() < EPS, "height");
    }

    #[test]
    fn perspective_shrinks_points_behind_plane() {
        let p = Transform3d::from_perspective(100.0);
        let [x, _, _] = p.map_point3([10.0, 0.0, -100.0]);
        assert!((x - 5.0).abs() < EPS, "expected 5, got {x}");
    }

    #[test]
    fn rect_to_rect_maps_corners() {
        let m = Transform3d::rect_to_rect(
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Rect::new(5.0, 5.0, 25.0, 15.0),
        );
        assert_eq!(m.map_point(Point::new(10.0, 10.0)), Point::new(25.0, 15.0));
        assert_eq!(m.map_point(Point::ZERO), Point::new(5.0, 5.0));
    }

    #[test]
    fn project_point_inverts_affine_mapping() {
        let t = Transform3d::from_translation(5.0, 7.0, 0.0) * Transform3d::from_scale(2.0, 2.0, 1.0);
        let inv = t.inverse().expect("invertible");
        let local = inv.project_point(Point::new(9.0, 11.0)).expect("on plane");
        assert!((local.x - 2.0).abs() < EPS && (local.y - 2.0).abs() < EPS, "{local:?}");
    }

    #[test]
    fn blend_rotation_halfway() {
        let from = Transform3d::IDENTITY;
        let to = Transform3d::from_rotation_z(FRAC_PI_2);
        let mid = to.blend(&from, 0.5);
        assert!(mid.approx_eq(&Transform3d::from_rotation_z(PI / 4.0), 1e-9));
    }

    #[test]
    fn blend_falls_back_for_singular() {
        let from = Transform3d::from_scale(0.0, 0.0, 1.0);
        let to = Transform3d::from_translation(4.0, 0.0, 0.0);
        assert_eq!(to.blend(&from, 0.25), from);
        assert_eq!(to.blend(&from, 0.75), to);
    }

    #[test]
    fn nan_detected() {
        let mut t = Transform3d::IDENTITY;
        t.cols[2][1] = f64::NAN;
        assert!(!t.is_finite());
        assert!(t.is_nan());
    }
}
