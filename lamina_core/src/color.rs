// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! 8-bit RGBA colors.

use bytemuck::{Pod, Zeroable};

/// A straight-alpha 8-bit RGBA color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Color {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
    /// Alpha.
    pub a: u8,
}

impl Color {
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::rgba(0, 0, 0, 0);
    /// Opaque black.
    pub const BLACK: Self = Self::rgba(0, 0, 0, 255);
    /// Opaque white.
    pub const WHITE: Self = Self::rgba(255, 255, 255, 255);

    /// Creates a color from its components.
    #[inline]
    #[must_use]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Creates an opaque color.
    #[inline]
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 255)
    }

    /// Returns `true` if alpha is zero.
    #[inline]
    #[must_use]
    pub const fn is_transparent(self) -> bool {
        self.a == 0
    }

    /// Returns `true` if alpha is 255.
    #[inline]
    #[must_use]
    pub const fn is_opaque(self) -> bool {
        self.a == 255
    }

    /// Returns this color with alpha scaled by `opacity`.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "at most 255.5 before the cast"
    )]
    pub fn with_opacity(self, opacity: f32) -> Self {
        let a = (f32::from(self.a) * opacity.clamp(0.0, 1.0) + 0.5) as u8;
        Self { a, ..self }
    }

    /// Converts to premultiplied form.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "the product divided by 255 fits in a byte"
    )]
    pub fn premultiply(self) -> PremulRgba {
        let a = u16::from(self.a);
        let mul = |c: u8| ((u16::from(c) * a + 127) / 255) as u8;
        PremulRgba {
            r: mul(self.r),
            g: mul(self.g),
            b: mul(self.b),
            a: self.a,
        }
    }
}

/// A premultiplied-alpha 8-bit RGBA pixel, laid out as four bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct PremulRgba {
    /// Red, premultiplied.
    pub r: u8,
    /// Green, premultiplied.
    pub g: u8,
    /// Blue, premultiplied.
    pub b: u8,
    /// Alpha.
    pub a: u8,
}

impl PremulRgba {
    /// Fully transparent.
    pub const TRANSPARENT: Self = Self {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };

    /// Converts back to straight alpha.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "clamped to 255 before the cast"
    )]
    pub fn unpremultiply(self) -> Color {
        if self.a == 0 {
            return Color::TRANSPARENT;
        }
        let a = u16::from(self.a);
        let div = |c: u8| ((u16::from(c) * 255 + a / 2) / a).min(255) as u8;
        Color::rgba(div(self.r), div(self.g), div(self.b), self.a)
    }

    /// Returns this pixel scaled by `factor` in `0.0..=1.0`.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "factor is below one so channels stay within a byte"
    )]
    pub fn scale(self, factor: f32) -> Self {
        if factor >= 1.0 {
            return self;
        }
        let f = factor.max(0.0);
        let s = |c: u8| (f32::from(c) * f + 0.5) as u8;
        Self {
            r: s(self.r),
            g: s(self.g),
            b: s(self.b),
            a: s(self.a),
        }
    }

    /// Composites `self` over `dst` (source-over).
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "clamped to 255 before the cast"
    )]
    pub fn over(self, dst: Self) -> Self {
        if self.a == 255 {
            return self;
        }
        if self.a == 0 {
            return dst;
        }
        let inv = 255 - u16::from(self.a);
        let blend = |s: u8, d: u8| (u16::from(s) + (u16::from(d) * inv + 127) / 255).min(255) as u8;
        Self {
            r: blend(self.r, dst.r),
            g: blend(self.g, dst.g),
            b: blend(self.b, dst.b),
            a: blend(self.a, dst.a),
        }
    }
}
