// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CPU pixel buffers used for painting and texture uploads.

use alloc::vec;
use alloc::vec::Vec;

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use kurbo::{Point, Rect, Size};

use crate::color::{Color, PremulRgba};

/// Rounds a length up to whole pixels. Negative and NaN lengths are zero.
#[must_use]
#[expect(
    clippy::cast_possible_truncation,
    reason = "float to int casts saturate and the value is already rounded"
)]
pub fn pixel_extent(length: f64) -> u32 {
    if length.is_nan() || length <= 0.0 {
        0
    } else {
        length.ceil() as u32
    }
}

/// Integer pixel bounds of `rect` clipped to `width × height`.
///
/// Returns `(x0, y0, x1, y1)`; empty when the clipped area is empty.
#[must_use]
pub fn pixel_bounds(rect: Rect, width: u32, height: u32) -> (u32, u32, u32, u32) {
    let clamp = |v: f64, max: u32| -> u32 { pixel_extent(v).min(max) };
    let r = rect.abs().expand();
    let x0 = clamp(r.x0, width);
    let y0 = clamp(r.y0, height);
    let x1 = clamp(r.x1, width).max(x0);
    let y1 = clamp(r.y1, height).max(y0);
    (x0, y0, x1, y1)
}

/// A premultiplied RGBA8 image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<PremulRgba>,
}

impl PixelBuffer {
    /// Creates a fully transparent buffer.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![PremulRgba::TRANSPARENT; width as usize * height as usize],
        }
    }

    /// Creates a transparent buffer covering `size`, rounding each side up.
    #[must_use]
    pub fn for_size(size: Size) -> Self {
        Self::new(pixel_extent(size.width), pixel_extent(size.height))
    }

    /// Creates a buffer filled with `color`.
    #[must_use]
    pub fn filled(width: u32, height: u32, color: Color) -> Self {
        Self {
            width,
            height,
            pixels: vec![color.premultiply(); width as usize * height as usize],
        }
    }

    /// Width in pixels.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Bounds as a rectangle at the origin.
    #[inline]
    #[must_use]
    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height))
    }

    /// Returns `true` if the buffer has no pixels.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Returns the pixel at `(x, y)`, or transparent when out of range.
    #[inline]
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> PremulRgba {
        if x >= self.width || y >= self.height {
            return PremulRgba::TRANSPARENT;
        }
        self.pixels[(y * self.width + x) as usize]
    }

    /// Writes the pixel at `(x, y)`; out-of-range writes are ignored.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, pixel: PremulRgba) {
        if x < self.width && y < self.height {
            self.pixels[(y * self.width + x) as usize] = pixel;
        }
    }

    /// Raw pixel slice, row-major.
    #[inline]
    #[must_use]
    pub fn pixels(&self) -> &[PremulRgba] {
        &self.pixels
    }

    /// Mutable raw pixel slice, row-major.
    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [PremulRgba] {
        &mut self.pixels
    }

    /// Byte view of the pixel data (RGBA order).
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// Returns `true` if any pixel is not fully opaque.
    #[must_use]
    pub fn has_alpha(&self) -> bool {
        self.pixels.iter().any(|p| p.a != 255)
    }

    /// Overwrites every pixel in `rect` with `color`.
    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        let pixel = color.premultiply();
        let (x0, y0, x1, y1) = pixel_bounds(rect, self.width, self.height);
        for y in y0..y1 {
            let row = (y * self.width) as usize;
            self.pixels[row + x0 as usize..row + x1 as usize].fill(pixel);
        }
    }

    /// Composites `color` over every pixel in `rect`.
    pub fn blend_rect(&mut self, rect: Rect, color: Color) {
        let pixel = color.premultiply();
        let (x0, y0, x1, y1) = pixel_bounds(rect, self.width, self.height);
        for y in y0..y1 {
            let row = (y * self.width) as usize;
            for p in &mut self.pixels[row + x0 as usize..row + x1 as usize] {
                *p = pixel.over(*p);
            }
        }
    }

    /// Clears every pixel to transparent.
    pub fn clear(&mut self) {
        self.pixels.fill(PremulRgba::TRANSPARENT);
    }

    /// Copies `source_rect` of `source` so its top-left lands on `target`.
    ///
    /// Both rectangles are clipped to their buffers.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "targets are checked against the buffer before indexing"
    )]
    pub fn copy_from(&mut self, source: &Self, source_rect: Rect, target: Point) {
        let (sx0, sy0, sx1, sy1) = pixel_bounds(source_rect, source.width, source.height);
        let dx = target.x.floor() as i64 - source_rect.x0.floor() as i64;
        let dy = target.y.floor() as i64 - source_rect.y0.floor() as i64;
        for sy in sy0..sy1 {
            let ty = i64::from(sy) + dy;
            if ty < 0 || ty >= i64::from(self.height) {
                continue;
            }
            for sx in sx0..sx1 {
                let tx = i64::from(sx) + dx;
                if tx < 0 || tx >= i64::from(self.width) {
                    continue;
                }
                self.pixels[(ty as u32 * self.width + tx as u32) as usize] = source.get(sx, sy);
            }
        }
    }

    /// Returns a copy of `rect` as a new buffer.
    #[must_use]
    pub fn sub_buffer(&self, rect: Rect) -> Self {
        let (x0, y0, x1, y1) = pixel_bounds(rect, self.width, self.height);
        let mut out = Self::new(x1 - x0, y1 - y0);
        let src = Rect::new(f64::from(x0), f64::from(y0), f64::from(x1), f64::from(y1));
        out.copy_from(self, src, Point::ZERO);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_and_read() {
        let mut b = PixelBuffer::new(4, 4);
        b.fill_rect(Rect::new(1.0, 1.0, 3.0, 3.0), Color::rgb(255, 0, 0));
        assert_eq!(b.get(0, 0), PremulRgba::TRANSPARENT);
        assert_eq!(b.get(1, 1).r, 255);
        assert_eq!(b.get(2, 2).a, 255);
        assert_eq!(b.get(3, 3).a, 0);
        assert!(b.has_alpha());
    }

    #[test]
    fn copy_offsets_pixels() {
        let src = PixelBuffer::filled(2, 2, Color::WHITE);
        let mut dst = PixelBuffer::new(4, 4);
        dst.copy_from(&src, src.bounds(), Point::new(2.0, 1.0));
        assert_eq!(dst.get(1, 1).a, 0);
        assert_eq!(dst.get(2, 1).a, 255);
        assert_eq!(dst.get(3, 2).a, 255);
        assert_eq!(dst.get(3, 3).a, 0);
    }

    #[test]
    fn sub_buffer_extracts_region() {
        let mut b = PixelBuffer::new(4, 4);
        b.set(2, 3, Color::BLACK.premultiply());
        let sub = b.sub_buffer(Rect::new(2.0, 2.0, 4.0, 4.0));
        assert_eq!((sub.width(), sub.height()), (2, 2));
        assert_eq!(sub.get(0, 1).a, 255);
    }

    #[test]
    fn byte_view_is_rgba() {
        let b = PixelBuffer::filled(1, 1, Color::rgba(1, 2, 3, 255));
        assert_eq!(b.as_bytes(), &[1, 2, 3, 255]);
        assert!(!b.has_alpha());
    }
}
