// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lists of primitive transform functions and their interpolation.
//!
//! A [`TransformOperations`] list is resolved against a layer's box size to
//! produce a [`Transform3d`]. Interpolating two lists whose functions line
//! up one-to-one blends each function separately; otherwise the resolved
//! matrices are blended by decomposition.

use alloc::vec::Vec;
use core::f64::consts::PI;

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use kurbo::Size;

use crate::transform::Transform3d;

fn lerp(from: f64, to: f64, progress: f64) -> f64 {
    from + (to - from) * progress
}

fn radians(degrees: f64) -> f64 {
    degrees * PI / 180.0
}

/// A length made of an absolute part and a percentage of a reference size.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Length {
    /// Pixels.
    pub px: f64,
    /// Percent of the reference dimension.
    pub percent: f64,
}

impl Length {
    /// Zero length.
    pub const ZERO: Self = Self {
        px: 0.0,
        percent: 0.0,
    };

    /// An absolute length.
    #[must_use]
    pub const fn px(px: f64) -> Self {
        Self { px, percent: 0.0 }
    }

    /// A percentage length.
    #[must_use]
    pub const fn percent(percent: f64) -> Self {
        Self { px: 0.0, percent }
    }

    /// Resolves against `reference`.
    #[must_use]
    pub fn resolve(self, reference: f64) -> f64 {
        self.px + self.percent / 100.0 * reference
    }

    /// Returns `true` if any part is a percentage.
    #[must_use]
    pub fn is_relative(self) -> bool {
        self.percent != 0.0
    }

    fn blend(self, from: Self, progress: f64) -> Self {
        Self {
            px: lerp(from.px, self.px, progress),
            percent: lerp(from.percent, self.percent, progress),
        }
    }
}

/// The kind of a [`TransformOperation`], used to check list compatibility.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Translation.
    Translate,
    /// Scale.
    Scale,
    /// Axis-angle rotation.
    Rotate,
    /// Skew.
    Skew,
    /// Perspective.
    Perspective,
    /// Raw matrix.
    Matrix,
}

/// One primitive transform function. Angles are in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TransformOperation {
    /// Translate by lengths along X and Y and pixels along Z.
    Translate {
        /// X offset.
        x: Length,
        /// Y offset.
        y: Length,
        /// Z offset.
        z: f64,
    },
    /// Scale along each axis.
    Scale {
        /// X factor.
        x: f64,
        /// Y factor.
        y: f64,
        /// Z factor.
        z: f64,
    },
    /// Rotate `angle` degrees around the axis `(x, y, z)`.
    Rotate {
        /// Axis X.
        x: f64,
        /// Axis Y.
        y: f64,
        /// Axis Z.
        z: f64,
        /// Angle in degrees.
        angle: f64,
    },
    /// Skew by the given angles in degrees.
    Skew {
        /// X skew.
        x: f64,
        /// Y skew.
        y: f64,
    },
    /// Perspective with the given eye distance; zero means none.
    Perspective(f64),
    /// A raw matrix.
    Matrix(Transform3d),
}

impl TransformOperation {
    /// A 2-D rotation about Z.
    #[must_use]
    pub const fn rotate(angle: f64) -> Self {
        Self::Rotate {
            x: 0.0,
            y: 0.0,
            z: 1.0,
            angle,
        }
    }

    /// A pixel translation in X and Y.
    #[must_use]
    pub const fn translate(x: f64, y: f64) -> Self {
        Self::Translate {
            x: Length::px(x),
            y: Length::px(y),
            z: 0.0,
        }
    }

    /// A 2-D scale.
    #[must_use]
    pub const fn scale(x: f64, y: f64) -> Self {
        Self::Scale { x, y, z: 1.0 }
    }

    /// The kind of this operation.
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        match self {
            Self::Translate { .. } => OperationKind::Translate,
            Self::Scale { .. } => OperationKind::Scale,
            Self::Rotate { .. } => OperationKind::Rotate,
            Self::Skew { .. } => OperationKind::Skew,
            Self::Perspective(_) => OperationKind::Perspective,
            Self::Matrix(_) => OperationKind::Matrix,
        }
    }

    /// Returns `true` if resolving depends on the box size.
    #[must_use]
    pub fn depends_on_size(&self) -> bool {
        match self {
            Self::Translate { x, y, .. } => x.is_relative() || y.is_relative(),
            _ => false,
        }
    }

    /// The identity operation of the same kind as `self`.
    #[must_use]
    pub fn identity(&self) -> Self {
        match *self {
            Self::Translate { .. } => Self::Translate {
                x: Length::ZERO,
                y: Length::ZERO,
                z: 0.0,
            },
            Self::Scale { .. } => Self::Scale {
                x: 1.0,
                y: 1.0,
                z: 1.0,
            },
            Self::Rotate { x, y, z, .. } => Self::Rotate {
                x,
                y,
                z,
                angle: 0.0,
            },
            Self::Skew { .. } => Self::Skew { x: 0.0, y: 0.0 },
            Self::Perspective(_) => Self::Perspective(0.0),
            Self::Matrix(_) => Self::Matrix(Transform3d::IDENTITY),
        }
    }

    /// Resolves to a matrix for a box of `size`.
    #[must_use]
    pub fn to_matrix(&self, size: Size) -> Transform3d {
        match *self {
            Self::Translate { x, y, z } => {
                Transform3d::from_translation(x.resolve(size.width), y.resolve(size.height), z)
            }
            Self::Scale { x, y, z } => Transform3d::from_scale(x, y, z),
            Self::Rotate { x, y, z, angle } => Transform3d::from_rotation(x, y, z, radians(angle)),
            Self::Skew { x, y } => Transform3d::from_skew(radians(x), radians(y)),
            Self::Perspective(d) => Transform3d::from_perspective(d),
            Self::Matrix(m) => m,
        }
    }

    /// Interpolates from `from` towards `self` by `progress`.
    ///
    /// A missing `from` is the identity of the same kind. With
    /// `blend_to_identity`, `self` is the start and its identity the end.
    #[must_use]
    pub fn blend(&self, from: Option<&Self>, progress: f64, blend_to_identity: bool) -> Self {
        let identity = self.identity();
        let (start, end) = if blend_to_identity {
            (*self, identity)
        } else {
            (from.copied().unwrap_or(identity), *self)
        };
        blend_pair(&start, &end, progress)
    }
}

fn blend_pair(from: &TransformOperation, to: &TransformOperation, progress: f64) -> TransformOperation {
    use TransformOperation as Op;
    match (*from, *to) {
        (
            Op::Translate {
                x: fx,
                y: fy,
                z: fz,
            },
            Op::Translate { x, y, z },
        ) => Op::Translate {
            x: x.blend(fx, progress),
            y: y.blend(fy, progress),
            z: lerp(fz, z, progress),
        },
        (
            Op::Scale {
                x: fx,
                y: fy,
                z: fz,
            },
            Op::Scale { x, y, z },
        ) => Op::Scale {
            x: lerp(fx, x, progress),
            y: lerp(fy, y, progress),
            z: lerp(fz, z, progress),
        },
        (
            Op::Rotate {
                x: fx,
                y: fy,
                z: fz,
                angle: fa,
            },
            Op::Rotate { x, y, z, angle },
        ) if same_axis([fx, fy, fz], [x, y, z]) || fa == 0.0 || angle == 0.0 => {
            let (ax, ay, az) = if angle == 0.0 { (fx, fy, fz) } else { (x, y, z) };
            Op::Rotate {
                x: ax,
                y: ay,
                z: az,
                angle: lerp(fa, angle, progress),
            }
        }
        (Op::Skew { x: fx, y: fy }, Op::Skew { x, y }) => Op::Skew {
            x: lerp(fx, x, progress),
            y: lerp(fy, y, progress),
        },
        (Op::Perspective(fd), Op::Perspective(d)) => {
            let blended = Transform3d::from_perspective(d)
                .blend(&Transform3d::from_perspective(fd), progress);
            let m34 = blended.m34();
            Op::Perspective(if m34 == 0.0 { 0.0 } else { -1.0 / m34 })
        }
        _ => {
            let size = Size::ZERO;
            Op::Matrix(to.to_matrix(size).blend(&from.to_matrix(size), progress))
        }
    }
}

fn same_axis(a: [f64; 3], b: [f64; 3]) -> bool {
    let norm = |v: [f64; 3]| {
        let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        if len == 0.0 {
            [0.0, 0.0, 1.0]
        } else {
            [v[0] / len, v[1] / len, v[2] / len]
        }
    };
    let (a, b) = (norm(a), norm(b));
    (a[0] - b[0]).abs() < 1e-9 && (a[1] - b[1]).abs() < 1e-9 && (a[2] - b[2]).abs() < 1e-9
}

/// An ordered list of transform functions, applied left to right.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransformOperations {
    operations: Vec<TransformOperation>,
}

impl TransformOperations {
    /// Creates a list from operations.
    #[must_use]
    pub fn new(operations: Vec<TransformOperation>) -> Self {
        Self { operations }
    }

    /// The operations.
    #[must_use]
    pub fn operations(&self) -> &[TransformOperation] {
        &self.operations
    }

    /// Returns `true` if the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Returns `true` if any operation resolves against the box size.
    #[must_use]
    pub fn depends_on_size(&self) -> bool {
        self.operations.iter().any(TransformOperation::depends_on_size)
    }

    /// Returns `true` if both lists have the same length and kinds.
    #[must_use]
    pub fn operations_match(&self, other: &Self) -> bool {
        self.operations.len() == other.operations.len()
            && self
                .operations
                .iter()
                .zip(&other.operations)
                .all(|(a, b)| a.kind() == b.kind())
    }

    /// Resolves the whole list for a box of `size`.
    #[must_use]
    pub fn to_matrix(&self, size: Size) -> Transform3d {
        self.operations
            .iter()
            .fold(Transform3d::IDENTITY, |acc, op| acc * op.to_matrix(size))
    }

    /// Blends operation by operation; the shorter list is padded with
    /// identities.
    #[must_use]
    pub fn blend_by_matching(&self, from: &Self, progress: f64) -> Self {
        let len = self.operations.len().max(from.operations.len());
        let mut out = Vec::with_capacity(len);
        for i in 0..len {
            let from_op = from.operations.get(i);
            let blended = match (self.operations.get(i), from_op) {
                (Some(to), from_op) => to.blend(from_op, progress, false),
                (None, Some(from_op)) => from_op.blend(None, progress, true),
                (None, None) => continue,
            };
            out.push(blended);
        }
        Self { operations: out }
    }

    /// Interpolates from `from` towards `self` and resolves for `size`.
    ///
    /// `lists_match` selects per-operation blending; otherwise the resolved
    /// matrices are blended.
    #[must_use]
    pub fn blend(&self, from: &Self, progress: f64, size: Size, lists_match: bool) -> Transform3d {
        if lists_match {
            self.blend_by_matching(from, progress).to_matrix(size)
        } else {
            self.to_matrix(size).blend(&from.to_matrix(size), progress)
        }
    }
}

impl From<Vec<TransformOperation>> for TransformOperations {
    fn from(operations: Vec<TransformOperation>) -> Self {
        Self::new(operations)
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;
    use kurbo::Point;

    const EPS: f64 = 1e-9;

    #[test]
    fn list_applies_left_to_right() {
        let ops = TransformOperations::new(vec![
            TransformOperation::translate(10.0, 0.0),
            TransformOperation::scale(2.0, 2.0),
        ]);
        let p = ops.to_matrix(Size::ZERO).map_point(Point::new(1.0, 1.0));
        assert_eq!(p, Point::new(12.0, 2.0));
    }

    #[test]
    fn percent_translate_resolves_against_box() {
        let op = TransformOperation::Translate {
            x: Length::percent(50.0),
            y: Length::px(3.0),
            z: 0.0,
        };
        let m = op.to_matrix(Size::new(200.0, 10.0));
        assert_eq!(m.col(3), [100.0, 3.0, 0.0, 1.0]);
        assert!(op.depends_on_size());
    }

    #[test]
    fn rotate_from_empty_halfway() {
        let to = TransformOperations::new(vec![TransformOperation::rotate(180.0)]);
        let from = TransformOperations::default();
        let mid = to.blend_by_matching(&from, 0.5);
        assert_eq!(mid.operations(), &[TransformOperation::rotate(90.0)]);
        let m = to.blend(&from, 0.5, Size::ZERO, true);
        assert!(m.approx_eq(&Transform3d::from_rotation_z(PI / 2.0), EPS));
    }

    #[test]
    fn to_empty_blends_to_identity() {
        let from = TransformOperations::new(vec![TransformOperation::translate(10.0, 20.0)]);
        let to = TransformOperations::default();
        let mid = to.blend_by_matching(&from, 0.25);
        assert_eq!(mid.operations(), &[TransformOperation::translate(7.5, 15.0)]);
    }

    #[test]
    fn mismatched_lists_use_matrix_blend() {
        let from = TransformOperations::new(vec![TransformOperation::translate(10.0, 0.0)]);
        let to = TransformOperations::new(vec![TransformOperation::scale(3.0, 3.0)]);
        assert!(!to.operations_match(&from));
        let m = to.blend(&from, 0.5, Size::ZERO, false);
        let expected = Transform3d::from_translation(5.0, 0.0, 0.0) * Transform3d::from_scale(2.0, 2.0, 1.0);
        assert!(m.approx_eq(&expected, EPS), "{m:?}");
    }

    #[test]
    fn different_axes_fall_back_to_matrix() {
        let from = TransformOperation::Rotate {
            x: 1.0,
            y: 0.0,
            z: 0.0,
            angle: 90.0,
        };
        let to = TransformOperation::rotate(90.0);
        assert!(matches!(
            to.blend(Some(&from), 0.5, false),
            TransformOperation::Matrix(_)
        ));
    }

    #[test]
    fn perspective_blends_through_matrix() {
        let to = TransformOperation::Perspective(100.0);
        let from = TransformOperation::Perspective(100.0);
        let TransformOperation::Perspective(d) = to.blend(Some(&from), 0.5, false) else {
            panic!("expected perspective");
        };
        assert!((d - 100.0).abs() < 1e-6, "{d}");
    }
}
