// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CPU filter effects.
//!
//! Color filters run per pixel on straight (unpremultiplied) color through a
//! 3×3 matrix or a component function. Blur is three box-blur passes per
//! axis, which approximates a Gaussian. Drop shadows blur a tinted, offset
//! copy of the alpha channel and draw the source over it.

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use kurbo::Vec2;
use lamina_core::color::{Color, PremulRgba};
use lamina_core::filter::{FilterOperation, FilterOperations};
use lamina_core::pixels::PixelBuffer;

type ColorMatrix = [[f32; 3]; 3];

/// Applies `filters` to `source` in order.
pub(crate) fn apply_chain(source: &PixelBuffer, filters: &FilterOperations) -> PixelBuffer {
    let mut out = source.clone();
    for op in filters.operations() {
        out = apply_one(&out, op);
    }
    out
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "filter amounts are small and f32 precision is enough for 8-bit color"
)]
fn apply_one(source: &PixelBuffer, op: &FilterOperation) -> PixelBuffer {
    let amount = |v: f64| v as f32;
    match *op {
        FilterOperation::Grayscale(a) => map_matrix(source, &grayscale(amount(a))),
        FilterOperation::Sepia(a) => map_matrix(source, &sepia(amount(a))),
        FilterOperation::Saturate(a) => map_matrix(source, &saturate(amount(a))),
        FilterOperation::HueRotate(deg) => map_matrix(source, &hue_rotate(deg)),
        FilterOperation::Invert(a) => {
            let a = amount(a).clamp(0.0, 1.0);
            map_components(source, |c| c + a * (1.0 - 2.0 * c), |alpha| alpha)
        }
        FilterOperation::Opacity(a) => {
            let a = amount(a).clamp(0.0, 1.0);
            map_components(source, |c| c, |alpha| alpha * a)
        }
        FilterOperation::Brightness(a) => {
            let a = amount(a).max(0.0);
            map_components(source, |c| c * a, |alpha| alpha)
        }
        FilterOperation::Contrast(a) => {
            let a = amount(a).max(0.0);
            map_components(source, |c| (c - 0.5) * a + 0.5, |alpha| alpha)
        }
        FilterOperation::Blur(std_deviation) => blur(source, std_deviation),
        FilterOperation::DropShadow {
            offset,
            std_deviation,
            color,
        } => drop_shadow(source, offset, std_deviation, color),
        FilterOperation::Reference(_) => source.clone(),
    }
}

fn grayscale(amount: f32) -> ColorMatrix {
    let o = 1.0 - amount.clamp(0.0, 1.0);
    [
        [0.2126 + 0.7874 * o, 0.7152 - 0.7152 * o, 0.0722 - 0.0722 * o],
        [0.2126 - 0.2126 * o, 0.7152 + 0.2848 * o, 0.0722 - 0.0722 * o],
        [0.2126 - 0.2126 * o, 0.7152 - 0.7152 * o, 0.0722 + 0.9278 * o],
    ]
}

fn sepia(amount: f32) -> ColorMatrix {
    let o = 1.0 - amount.clamp(0.0, 1.0);
    [
        [0.393 + 0.607 * o, 0.769 - 0.769 * o, 0.189 - 0.189 * o],
        [0.349 - 0.349 * o, 0.686 + 0.314 * o, 0.168 - 0.168 * o],
        [0.272 - 0.272 * o, 0.534 - 0.534 * o, 0.131 + 0.869 * o],
    ]
}

fn saturate(s: f32) -> ColorMatrix {
    let s = s.max(0.0);
    [
        [0.213 + 0.787 * s, 0.715 - 0.715 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 + 0.285 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 - 0.715 * s, 0.072 + 0.928 * s],
    ]
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "sine and cosine fit f32"
)]
fn hue_rotate(degrees: f64) -> ColorMatrix {
    let radians = degrees.to_radians();
    let c = radians.cos() as f32;
    let s = radians.sin() as f32;
    [
        [
            0.213 + c * 0.787 - s * 0.213,
            0.715 - c * 0.715 - s * 0.715,
            0.072 - c * 0.072 + s * 0.928,
        ],
        [
            0.213 - c * 0.213 + s * 0.143,
            0.715 + c * 0.285 + s * 0.140,
            0.072 - c * 0.072 - s * 0.283,
        ],
        [
            0.213 - c * 0.213 - s * 0.787,
            0.715 - c * 0.715 + s * 0.715,
            0.072 + c * 0.928 + s * 0.072,
        ],
    ]
}

fn to_unit(c: u8) -> f32 {
    f32::from(c) / 255.0
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "clamped to 0..=255 before the cast"
)]
fn from_unit(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}

fn map_matrix(source: &PixelBuffer, m: &ColorMatrix) -> PixelBuffer {
    map_pixels(source, |[r, g, b, a]| {
        [
            m[0][0] * r + m[0][1] * g + m[0][2] * b,
            m[1][0] * r + m[1][1] * g + m[1][2] * b,
            m[2][0] * r + m[2][1] * g + m[2][2] * b,
            a,
        ]
    })
}

fn map_components(
    source: &PixelBuffer,
    color: impl Fn(f32) -> f32,
    alpha: impl Fn(f32) -> f32,
) -> PixelBuffer {
    map_pixels(source, |[r, g, b, a]| [color(r), color(g), color(b), alpha(a)])
}

fn map_pixels(source: &PixelBuffer, f: impl Fn([f32; 4]) -> [f32; 4]) -> PixelBuffer {
    let mut out = source.clone();
    for p in out.pixels_mut() {
        if p.a == 0 {
            continue;
        }
        let straight = p.unpremultiply();
        let [r, g, b, a] = f([
            to_unit(straight.r),
            to_unit(straight.g),
            to_unit(straight.b),
            to_unit(straight.a),
        ]);
        *p = Color::rgba(from_unit(r), from_unit(g), from_unit(b), from_unit(a)).premultiply();
    }
    out
}

/// Box size whose triple application approximates a Gaussian of
/// `std_deviation`.
#[expect(
    clippy::cast_possible_truncation,
    reason = "float to int casts saturate"
)]
fn box_size(std_deviation: f64) -> usize {
    let d = (std_deviation * 3.0 * (2.0 * core::f64::consts::PI).sqrt() / 4.0 + 0.5).floor();
    if d.is_finite() && d > 0.0 { d as usize } else { 0 }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "channel sums are clamped to 0..=255 before the cast"
)]
pub(crate) fn blur(source: &PixelBuffer, std_deviation: f64) -> PixelBuffer {
    let size = box_size(std_deviation);
    if size <= 1 || source.is_empty() {
        return source.clone();
    }
    let radius = size / 2;
    let width = source.width() as usize;
    let height = source.height() as usize;
    let mut channels: [alloc::vec::Vec<f32>; 4] = core::array::from_fn(|c| {
        source
            .pixels()
            .iter()
            .map(|p| f32::from([p.r, p.g, p.b, p.a][c]))
            .collect()
    });
    let mut scratch = alloc::vec![0.0_f32; width.max(height)];
    for channel in &mut channels {
        for _ in 0..3 {
            for y in 0..height {
                let row = &mut channel[y * width..(y + 1) * width];
                box_pass(row, 1, width, radius, &mut scratch);
            }
            for x in 0..width {
                box_pass(&mut channel[x..], width, height, radius, &mut scratch);
            }
        }
    }
    let mut out = PixelBuffer::new(source.width(), source.height());
    for (i, p) in out.pixels_mut().iter_mut().enumerate() {
        let v = |c: usize| (channels[c][i].clamp(0.0, 255.0) + 0.5) as u8;
        let a = v(3);
        *p = PremulRgba {
            r: v(0).min(a),
            g: v(1).min(a),
            b: v(2).min(a),
            a,
        };
    }
    out
}

/// One running-sum box average over `len` samples spaced `stride` apart.
fn box_pass(data: &mut [f32], stride: usize, len: usize, radius: usize, scratch: &mut [f32]) {
    let window = (2 * radius + 1) as f32;
    let at = |data: &[f32], i: isize| -> f32 {
        if i < 0 || i as usize >= len {
            0.0
        } else {
            data[i as usize * stride]
        }
    };
    let r = radius as isize;
    let mut sum: f32 = (-r..=r).map(|i| at(data, i)).sum();
    for i in 0..len {
        scratch[i] = sum / window;
        let i = i as isize;
        sum += at(data, i + r + 1) - at(data, i - r);
    }
    for i in 0..len {
        data[i * stride] = scratch[i];
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "shadow offsets are small and targets are checked against the buffer"
)]
fn drop_shadow(source: &PixelBuffer, offset: Vec2, std_deviation: f64, color: Color) -> PixelBuffer {
    let tint = color.premultiply();
    let mut shadow = PixelBuffer::new(source.width(), source.height());
    let dx = offset.x.round() as i64;
    let dy = offset.y.round() as i64;
    for y in 0..source.height() {
        for x in 0..source.width() {
            let a = source.get(x, y).a;
            if a == 0 {
                continue;
            }
            let tx = i64::from(x) + dx;
            let ty = i64::from(y) + dy;
            if tx < 0 || ty < 0 {
                continue;
            }
            shadow.set(tx as u32, ty as u32, tint.scale(f32::from(a) / 255.0));
        }
    }
    let mut out = blur(&shadow, std_deviation);
    for (dst, src) in out.pixels_mut().iter_mut().zip(source.pixels()) {
        *dst = src.over(*dst);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn grayscale_equalizes_channels() {
        let src = PixelBuffer::filled(1, 1, Color::rgb(255, 0, 0));
        let out = apply_chain(&src, &FilterOperations::new(vec![FilterOperation::Grayscale(1.0)]));
        let p = out.get(0, 0);
        assert_eq!(p.r, p.g, "gray output");
        assert_eq!(p.g, p.b, "gray output");
        assert_eq!(p.a, 255);
    }

    #[test]
    fn opacity_scales_alpha() {
        let src = PixelBuffer::filled(1, 1, Color::WHITE);
        let out = apply_chain(&src, &FilterOperations::new(vec![FilterOperation::Opacity(0.5)]));
        assert!((i32::from(out.get(0, 0).a) - 128).abs() <= 1);
    }

    #[test]
    fn invert_flips_color() {
        let src = PixelBuffer::filled(1, 1, Color::BLACK);
        let out = apply_chain(&src, &FilterOperations::new(vec![FilterOperation::Invert(1.0)]));
        assert_eq!(out.get(0, 0), Color::WHITE.premultiply());
    }

    #[test]
    fn blur_spreads_coverage() {
        let mut src = PixelBuffer::new(21, 21);
        src.set(10, 10, Color::WHITE.premultiply());
        let out = blur(&src, 2.0);
        assert!(out.get(10, 10).a < 255);
        assert!(out.get(11, 10).a > 0);
        assert_eq!(out.get(0, 0).a, 0);
    }

    #[test]
    fn drop_shadow_keeps_source_on_top() {
        let mut src = PixelBuffer::new(8, 8);
        src.fill_rect(kurbo::Rect::new(0.0, 0.0, 4.0, 4.0), Color::WHITE);
        let out = drop_shadow(&src, Vec2::new(4.0, 4.0), 0.0, Color::BLACK);
        assert_eq!(out.get(1, 1), Color::WHITE.premultiply());
        assert_eq!(out.get(5, 5), Color::BLACK.premultiply());
        assert_eq!(out.get(7, 0).a, 0);
    }
}
