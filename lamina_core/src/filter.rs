// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Filter operation lists attached to layers.

use alloc::string::String;
use alloc::vec::Vec;

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use kurbo::{Insets, Vec2};

use crate::color::Color;

fn lerp(from: f64, to: f64, progress: f64) -> f64 {
    from + (to - from) * progress
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "clamped to 0..=255 before the cast"
)]
fn lerp_u8(from: u8, to: u8, progress: f64) -> u8 {
    lerp(f64::from(from), f64::from(to), progress).round().clamp(0.0, 255.0) as u8
}

/// The kind of a [`FilterOperation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterKind {
    /// `grayscale()`
    Grayscale,
    /// `sepia()`
    Sepia,
    /// `saturate()`
    Saturate,
    /// `hue-rotate()`
    HueRotate,
    /// `invert()`
    Invert,
    /// `opacity()`
    Opacity,
    /// `brightness()`
    Brightness,
    /// `contrast()`
    Contrast,
    /// `blur()`
    Blur,
    /// `drop-shadow()`
    DropShadow,
    /// `url(...)`
    Reference,
}

/// One filter function.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterOperation {
    /// Desaturate by `amount` in `0..=1`.
    Grayscale(f64),
    /// Sepia tone by `amount` in `0..=1`.
    Sepia(f64),
    /// Saturation multiplier.
    Saturate(f64),
    /// Hue rotation in degrees.
    HueRotate(f64),
    /// Invert by `amount` in `0..=1`.
    Invert(f64),
    /// Alpha multiplier.
    Opacity(f64),
    /// Linear brightness multiplier.
    Brightness(f64),
    /// Contrast multiplier around mid-grey.
    Contrast(f64),
    /// Gaussian blur with the given standard deviation in pixels.
    Blur(f64),
    /// Blurred, offset, tinted copy of the alpha channel drawn beneath.
    DropShadow {
        /// Shadow offset.
        offset: Vec2,
        /// Blur standard deviation.
        std_deviation: f64,
        /// Shadow color.
        color: Color,
    },
    /// An external SVG filter reference; cannot be composited.
    Reference(String),
}

impl FilterOperation {
    /// The kind of this filter.
    #[must_use]
    pub fn kind(&self) -> FilterKind {
        match self {
            Self::Grayscale(_) => FilterKind::Grayscale,
            Self::Sepia(_) => FilterKind::Sepia,
            Self::Saturate(_) => FilterKind::Saturate,
            Self::HueRotate(_) => FilterKind::HueRotate,
            Self::Invert(_) => FilterKind::Invert,
            Self::Opacity(_) => FilterKind::Opacity,
            Self::Brightness(_) => FilterKind::Brightness,
            Self::Contrast(_) => FilterKind::Contrast,
            Self::Blur(_) => FilterKind::Blur,
            Self::DropShadow { .. } => FilterKind::DropShadow,
            Self::Reference(_) => FilterKind::Reference,
        }
    }

    /// Returns `false` for filters the compositor cannot apply.
    #[must_use]
    pub fn is_compositable(&self) -> bool {
        !matches!(self, Self::Reference(_))
    }

    /// Returns `true` if the filter can move pixels outside the layer bounds.
    #[must_use]
    pub fn moves_pixels(&self) -> bool {
        matches!(self, Self::Blur(_) | Self::DropShadow { .. })
    }

    /// The no-op filter of the same kind.
    #[must_use]
    pub fn identity(&self) -> Self {
        match self {
            Self::Grayscale(_) => Self::Grayscale(0.0),
            Self::Sepia(_) => Self::Sepia(0.0),
            Self::Saturate(_) => Self::Saturate(1.0),
            Self::HueRotate(_) => Self::HueRotate(0.0),
            Self::Invert(_) => Self::Invert(0.0),
            Self::Opacity(_) => Self::Opacity(1.0),
            Self::Brightness(_) => Self::Brightness(1.0),
            Self::Contrast(_) => Self::Contrast(1.0),
            Self::Blur(_) => Self::Blur(0.0),
            Self::DropShadow { .. } => Self::DropShadow {
                offset: Vec2::ZERO,
                std_deviation: 0.0,
                color: Color::TRANSPARENT,
            },
            Self::Reference(url) => Self::Reference(url.clone()),
        }
    }

    /// Space the filter needs around the layer bounds.
    #[must_use]
    pub fn outsets(&self) -> Insets {
        match *self {
            Self::Blur(std_deviation) => Insets::uniform(blur_radius(std_deviation)),
            Self::DropShadow {
                offset,
                std_deviation,
                ..
            } => {
                let r = blur_radius(std_deviation);
                Insets::new(
                    (r - offset.x).max(0.0),
                    (r - offset.y).max(0.0),
                    (r + offset.x).max(0.0),
                    (r + offset.y).max(0.0),
                )
            }
            _ => Insets::ZERO,
        }
    }

    /// Interpolates from `from` towards `self`; see
    /// [`TransformOperation::blend`](crate::transform_ops::TransformOperation::blend)
    /// for the meaning of the arguments.
    ///
    /// Filters of different kinds, and references, do not interpolate:
    /// the result is whichever end is nearer.
    #[must_use]
    pub fn blend(&self, from: Option<&Self>, progress: f64, blend_to_identity: bool) -> Self {
        let identity = self.identity();
        let (start, end) = if blend_to_identity {
            (self.clone(), identity)
        } else {
            (from.cloned().unwrap_or(identity), self.clone())
        };
        use FilterOperation as F;
        match (&start, &end) {
            (F::Grayscale(a), F::Grayscale(b)) => F::Grayscale(lerp(*a, *b, progress).clamp(0.0, 1.0)),
            (F::Sepia(a), F::Sepia(b)) => F::Sepia(lerp(*a, *b, progress).clamp(0.0, 1.0)),
            (F::Saturate(a), F::Saturate(b)) => F::Saturate(lerp(*a, *b, progress).max(0.0)),
            (F::HueRotate(a), F::HueRotate(b)) => F::HueRotate(lerp(*a, *b, progress)),
            (F::Invert(a), F::Invert(b)) => F::Invert(lerp(*a, *b, progress).clamp(0.0, 1.0)),
            (F::Opacity(a), F::Opacity(b)) => F::Opacity(lerp(*a, *b, progress).clamp(0.0, 1.0)),
            (F::Brightness(a), F::Brightness(b)) => F::Brightness(lerp(*a, *b, progress).max(0.0)),
            (F::Contrast(a), F::Contrast(b)) => F::Contrast(lerp(*a, *b, progress).max(0.0)),
            (F::Blur(a), F::Blur(b)) => F::Blur(lerp(*a, *b, progress).max(0.0)),
            (
                F::DropShadow {
                    offset: fo,
                    std_deviation: fs,
                    color: fc,
                },
                F::DropShadow {
                    offset,
                    std_deviation,
                    color,
                },
            ) => F::DropShadow {
                offset: fo.lerp(*offset, progress),
                std_deviation: lerp(*fs, *std_deviation, progress).max(0.0),
                color: Color::rgba(
                    lerp_u8(fc.r, color.r, progress),
                    lerp_u8(fc.g, color.g, progress),
                    lerp_u8(fc.b, color.b, progress),
                    lerp_u8(fc.a, color.a, progress),
                ),
            },
            _ => {
                if progress < 0.5 {
                    start
                } else {
                    end
                }
            }
        }
    }
}

/// Pixel reach of a Gaussian blur.
#[must_use]
pub fn blur_radius(std_deviation: f64) -> f64 {
    (std_deviation * 3.0).ceil().max(0.0)
}

/// An ordered filter chain.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterOperations {
    operations: Vec<FilterOperation>,
}

impl FilterOperations {
    /// Creates a chain.
    #[must_use]
    pub fn new(operations: Vec<FilterOperation>) -> Self {
        Self { operations }
    }

    /// The filters in application order.
    #[must_use]
    pub fn operations(&self) -> &[FilterOperation] {
        &self.operations
    }

    /// Returns `true` if there are no filters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Returns `true` if every filter can be applied by the compositor.
    #[must_use]
    pub fn can_be_composited(&self) -> bool {
        self.operations.iter().all(FilterOperation::is_compositable)
    }

    /// Returns `true` if any filter can move pixels.
    #[must_use]
    pub fn has_filter_that_moves_pixels(&self) -> bool {
        self.operations.iter().any(FilterOperation::moves_pixels)
    }

    /// Sum of every filter's outsets.
    #[must_use]
    pub fn outsets(&self) -> Insets {
        self.operations
            .iter()
            .map(FilterOperation::outsets)
            .fold(Insets::ZERO, |acc, o| {
                Insets::new(acc.x0 + o.x0, acc.y0 + o.y0, acc.x1 + o.x1, acc.y1 + o.y1)
            })
    }

    /// Returns `true` if both chains have the same length and kinds.
    #[must_use]
    pub fn operations_match(&self, other: &Self) -> bool {
        self.operations.len() == other.operations.len()
            && self
                .operations
                .iter()
                .zip(&other.operations)
                .all(|(a, b)| a.kind() == b.kind())
    }

    /// Interpolates filter by filter from `from` towards `self`; the shorter
    /// chain is padded with identities.
    #[must_use]
    pub fn blend(&self, from: &Self, progress: f64) -> Self {
        let len = self.operations.len().max(from.operations.len());
        let mut out = Vec::with_capacity(len);
        for i in 0..len {
            match (self.operations.get(i), from.operations.get(i)) {
                (Some(to), from_op) => out.push(to.blend(from_op, progress, false)),
                (None, Some(from_op)) => out.push(from_op.blend(None, progress, true)),
                (None, None) => {}
            }
        }
        Self { operations: out }
    }
}

impl From<Vec<FilterOperation>> for FilterOperations {
    fn from(operations: Vec<FilterOperation>) -> Self {
        Self::new(operations)
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    #[test]
    fn blur_outsets_are_symmetric() {
        let f = FilterOperations::new(vec![FilterOperation::Blur(2.0)]);
        assert_eq!(f.outsets(), Insets::uniform(6.0));
        assert!(f.has_filter_that_moves_pixels());
    }

    #[test]
    fn drop_shadow_outsets_follow_offset() {
        let f = FilterOperation::DropShadow {
            offset: Vec2::new(4.0, 0.0),
            std_deviation: 1.0,
            color: Color::BLACK,
        };
        let o = f.outsets();
        assert_eq!(o.x0, 0.0);
        assert_eq!(o.x1, 7.0);
        assert_eq!(o.y0, 3.0);
    }

    #[test]
    fn reference_is_not_compositable() {
        let f = FilterOperations::new(vec![
            FilterOperation::Grayscale(1.0),
            FilterOperation::Reference("#f".into()),
        ]);
        assert!(!f.can_be_composited());
    }

    #[test]
    fn blend_from_empty_uses_identity() {
        let to = FilterOperations::new(vec![FilterOperation::Opacity(0.0)]);
        let mid = to.blend(&FilterOperations::default(), 0.25);
        assert_eq!(mid.operations(), &[FilterOperation::Opacity(0.75)]);
    }

    #[test]
    fn blend_matching_chain() {
        let from = FilterOperations::new(vec![FilterOperation::Blur(0.0), FilterOperation::Sepia(1.0)]);
        let to = FilterOperations::new(vec![FilterOperation::Blur(4.0), FilterOperation::Sepia(0.0)]);
        assert!(to.operations_match(&from));
        let mid = to.blend(&from, 0.5);
        assert_eq!(
            mid.operations(),
            &[FilterOperation::Blur(2.0), FilterOperation::Sepia(0.5)]
        );
    }
}
